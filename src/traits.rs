//! Provider contracts.
//!
//! Local and remote sources share no implementation, only an output
//! contract: both are a [`TreeSource`] that produces ordered
//! [`FileRecord`]s. The coordinator picks one by tagged dispatch on the
//! request.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               ingest()                   │
//! │   IngestRequest::Local   ::Remote        │
//! └─────────┬───────────────────┬────────────┘
//!           ▼                   ▼
//!   LocalTreeReader     RemoteRepositoryFetcher
//!   (DirectoryHandle)   (contents API)
//!           └─────────┬─────────┘
//!                     ▼
//!            Vec<FileRecord> in pre-order
//! ```
//!
//! The local side is itself abstract: a [`DirectoryHandle`] lists typed
//! entries and a [`FileHandle`] exposes a declared MIME type and its text.
//! [`OsDirectory`](crate::connector_fs::OsDirectory) implements them over
//! the real filesystem; callers holding some other user-granted handle can
//! implement them directly.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::IngestError;
use crate::models::{FileRecord, IngestStats, SourceSelector};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};

/// One entry of a local directory listing.
pub enum LocalEntry {
    File(Box<dyn FileHandle>),
    Directory(Box<dyn DirectoryHandle>),
}

impl LocalEntry {
    pub fn name(&self) -> &str {
        match self {
            LocalEntry::File(f) => f.name(),
            LocalEntry::Directory(d) => d.name(),
        }
    }
}

/// A directory the user granted access to.
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    /// The raw, unsanitized entry name.
    fn name(&self) -> &str;

    /// List the entries in provider order.
    ///
    /// The order returned here is the order records appear in the output.
    async fn entries(&self) -> std::io::Result<Vec<LocalEntry>>;
}

/// A file inside a [`DirectoryHandle`].
#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    /// The provider's declared MIME type, if it has one.
    fn mime_type(&self) -> Option<&str>;

    /// Read the whole file as text. Only called for files classified as text.
    async fn read_text(&self) -> std::io::Result<String>;
}

/// A source that can be flattened into file records.
#[async_trait]
pub trait TreeSource: Send + Sync {
    fn selector(&self) -> SourceSelector;

    /// Display label: folder name, or repository identity plus branch.
    fn label(&self) -> String;

    /// Walk the whole source. Fails fast: on error no records are returned.
    async fn collect(
        &self,
        ctx: &IngestContext,
        stats: &mut IngestStats,
    ) -> Result<Vec<FileRecord>, IngestError>;
}

/// Per-ingestion context threaded through both providers.
#[derive(Clone)]
pub struct IngestContext {
    cancel: CancellationToken,
    progress: Arc<dyn IngestProgressReporter>,
}

impl IngestContext {
    pub fn new(cancel: CancellationToken, progress: Arc<dyn IngestProgressReporter>) -> Self {
        Self { cancel, progress }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with [`IngestError::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<(), IngestError> {
        if self.cancel.is_cancelled() {
            Err(IngestError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn report(&self, event: IngestProgressEvent) {
        self.progress.report(event);
    }
}

impl Default for IngestContext {
    fn default() -> Self {
        Self::new(CancellationToken::new(), Arc::new(NoProgress))
    }
}
