//! Core data models used throughout the ingestion pipeline.
//!
//! These types represent the file records, repository references, and
//! ingestion results that flow between the providers and the coordinator.

use serde::Serialize;
use std::fmt;

use crate::error::ErrorKind;

/// Content substituted for files that are not decoded as text.
pub const BINARY_PLACEHOLDER: &str = "[Binary file, preview not available]";

/// A single ingested file.
///
/// `path` is canonical: `/`-separated, relative to the ingestion root,
/// restricted to `[A-Za-z0-9._\-/]`, and unique within one result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
    pub is_binary: bool,
}

impl FileRecord {
    pub fn text(path: String, content: String) -> Self {
        Self {
            path,
            content,
            is_binary: false,
        }
    }

    /// A record whose content is the [`BINARY_PLACEHOLDER`].
    pub fn binary(path: String) -> Self {
        Self {
            path,
            content: BINARY_PLACEHOLDER.to_string(),
            is_binary: true,
        }
    }
}

/// A remote repository parsed from a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryReference {
    pub owner: String,
    pub name: String,
    pub branch: String,
}

impl RepositoryReference {
    /// Display label, e.g. `acme/widgets (branch: main)`.
    pub fn label(&self) -> String {
        format!("{}/{} (branch: {})", self.owner, self.name, self.branch)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}

/// Which provider an ingestion request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelector {
    Local,
    Remote,
}

impl fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSelector::Local => f.write_str("local"),
            SourceSelector::Remote => f.write_str("remote"),
        }
    }
}

/// Terminal status of one ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionStatus {
    Succeeded,
    Failed { kind: ErrorKind, reason: String },
}

/// Counters collected while walking a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub files: u64,
    pub text_files: u64,
    pub binary_files: u64,
    /// Files whose raw download failed and were replaced with the placeholder.
    pub degraded: u64,
    pub directories: u64,
    pub excluded: u64,
    pub requests: u64,
}

impl IngestStats {
    pub(crate) fn count_record(&mut self, record: &FileRecord) {
        self.files += 1;
        if record.is_binary {
            self.binary_files += 1;
        } else {
            self.text_files += 1;
        }
    }
}

/// The outcome of one ingestion, handed to the caller.
///
/// When `status` is [`IngestionStatus::Failed`], `records` is empty:
/// partial file lists are never returned.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub selector: SourceSelector,
    pub label: String,
    pub records: Vec<FileRecord>,
    #[serde(flatten)]
    pub status: IngestionStatus,
    pub stats: IngestStats,
    /// Resolved repository for remote ingestions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryReference>,
}

impl IngestionResult {
    pub fn is_success(&self) -> bool {
        self.status == IngestionStatus::Succeeded
    }

    /// One-line status text for presentation.
    pub fn status_message(&self) -> String {
        match (&self.status, self.selector, &self.repository) {
            (IngestionStatus::Succeeded, SourceSelector::Remote, Some(repo)) => format!(
                "{} Fetched Successfully (branch: {}).",
                repo.name, repo.branch
            ),
            (IngestionStatus::Succeeded, _, _) => {
                format!("{} Uploaded Successfully", self.label)
            }
            (IngestionStatus::Failed { reason, .. }, _, _) => reason.clone(),
        }
    }
}
