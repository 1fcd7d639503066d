//! Local directory reader.
//!
//! Walks a [`DirectoryHandle`] depth-first in pre-order: siblings appear in
//! the order the provider lists them, and a directory's whole subtree is
//! emitted as soon as the directory is reached. The walk uses an explicit
//! stack of frames instead of recursion, so deep trees do not grow the call
//! stack.
//!
//! Any listing or read failure aborts the walk. There is no partial result.
//! Cancellation interrupts a listing or read that is still in progress.
//!
//! [`OsDirectory`] adapts the real filesystem to the handle traits. It
//! lists entries sorted by name, which makes local ingestion deterministic.

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::classify::TextClassifier;
use crate::config::Config;
use crate::error::IngestError;
use crate::models::{FileRecord, IngestStats, SourceSelector};
use crate::progress::IngestProgressEvent;
use crate::sanitize::{segment, PathClaims};
use crate::traits::{DirectoryHandle, FileHandle, IngestContext, LocalEntry, TreeSource};

// ═══════════════════════════════════════════════════════════════════════
// TreeSource implementation
// ═══════════════════════════════════════════════════════════════════════

/// Reads a user-granted local directory into file records.
pub struct LocalTreeReader {
    root: Box<dyn DirectoryHandle>,
    classifier: TextClassifier,
    excludes: GlobSet,
}

impl LocalTreeReader {
    pub fn new(root: Box<dyn DirectoryHandle>, classifier: TextClassifier) -> Self {
        Self {
            root,
            classifier,
            excludes: GlobSet::empty(),
        }
    }

    /// Build a reader with the classifier and exclude globs from `config`.
    pub fn from_config(root: Box<dyn DirectoryHandle>, config: &Config) -> Result<Self, IngestError> {
        let excludes = build_globset(&config.local.exclude_globs)?;
        Ok(Self {
            root,
            classifier: config.classify.classifier(),
            excludes,
        })
    }

    pub async fn read(
        &self,
        ctx: &IngestContext,
        stats: &mut IngestStats,
    ) -> Result<Vec<FileRecord>, IngestError> {
        read_tree(self.root.as_ref(), &self.classifier, &self.excludes, ctx, stats).await
    }
}

#[async_trait]
impl TreeSource for LocalTreeReader {
    fn selector(&self) -> SourceSelector {
        SourceSelector::Local
    }

    fn label(&self) -> String {
        self.root.name().to_string()
    }

    async fn collect(
        &self,
        ctx: &IngestContext,
        stats: &mut IngestStats,
    ) -> Result<Vec<FileRecord>, IngestError> {
        self.read(ctx, stats).await
    }
}

/// One level of the walk: the path prefix and the siblings not yet visited.
struct Frame {
    prefix: String,
    entries: std::vec::IntoIter<LocalEntry>,
}

/// Walk `root` and return its files in pre-order.
pub async fn read_tree(
    root: &dyn DirectoryHandle,
    classifier: &TextClassifier,
    excludes: &GlobSet,
    ctx: &IngestContext,
    stats: &mut IngestStats,
) -> Result<Vec<FileRecord>, IngestError> {
    let source = root.name().to_string();
    let mut claims = PathClaims::new();
    let mut records = Vec::new();

    ctx.check_cancelled()?;
    ctx.report(IngestProgressEvent::Listing {
        source: source.clone(),
        path: String::new(),
    });
    let root_entries = root.entries().await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => IngestError::Permission {
            path: source.clone(),
        },
        _ => IngestError::Io {
            path: String::new(),
            source: e,
        },
    })?;
    stats.directories += 1;

    let mut stack = vec![Frame {
        prefix: String::new(),
        entries: root_entries.into_iter(),
    }];

    while let Some(frame) = stack.last_mut() {
        ctx.check_cancelled()?;

        let Some(entry) = frame.entries.next() else {
            stack.pop();
            continue;
        };
        let prefix = frame.prefix.clone();

        match entry {
            LocalEntry::Directory(dir) => {
                let dir_path = format!("{}{}", prefix, segment(dir.name()));
                debug!(path = %dir_path, "listing local directory");
                ctx.report(IngestProgressEvent::Listing {
                    source: source.clone(),
                    path: dir_path.clone(),
                });

                let entries = tokio::select! {
                    _ = ctx.cancel_token().cancelled() => return Err(IngestError::Cancelled),
                    listed = dir.entries() => listed,
                }
                .map_err(|e| IngestError::from_io(dir_path.clone(), e))?;
                stats.directories += 1;
                stack.push(Frame {
                    prefix: format!("{}/", dir_path),
                    entries: entries.into_iter(),
                });
            }
            LocalEntry::File(file) => {
                let name = segment(file.name());
                let relative = format!("{}{}", prefix, name);
                if excludes.is_match(&relative) {
                    debug!(path = %relative, "excluded");
                    stats.excluded += 1;
                    continue;
                }

                let path = claims.claim(&relative);
                let record = if classifier.is_text(file.mime_type(), &name) {
                    let content = tokio::select! {
                        _ = ctx.cancel_token().cancelled() => return Err(IngestError::Cancelled),
                        read = file.read_text() => read,
                    }
                    .map_err(|e| IngestError::from_io(path.clone(), e))?;
                    FileRecord::text(path, content)
                } else {
                    FileRecord::binary(path)
                };

                stats.count_record(&record);
                ctx.report(IngestProgressEvent::File {
                    source: source.clone(),
                    n: stats.files,
                    path: record.path.clone(),
                });
                records.push(record);
            }
        }
    }

    ctx.report(IngestProgressEvent::Finished {
        source,
        files: records.len() as u64,
    });
    Ok(records)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IngestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| IngestError::Config(format!("invalid exclude glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| IngestError::Config(format!("invalid exclude globs: {}", e)))
}

// ═══════════════════════════════════════════════════════════════════════
// Filesystem handles
// ═══════════════════════════════════════════════════════════════════════

/// A real directory on disk.
pub struct OsDirectory {
    name: String,
    path: PathBuf,
    follow_symlinks: bool,
    /// Canonical paths from the root down to this directory, for loop detection.
    ancestors: Vec<PathBuf>,
}

impl OsDirectory {
    /// Open `path` as an ingestion root.
    ///
    /// The label is the final component of the canonical path, so `.`
    /// resolves to the current directory's real name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let canonical = std::fs::canonicalize(path).map_err(|e| IngestError::from_io(&display, e))?;
        let metadata = std::fs::metadata(&canonical).map_err(|e| IngestError::from_io(&display, e))?;
        if !metadata.is_dir() {
            return Err(IngestError::Io {
                path: display,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| canonical.display().to_string());

        Ok(Self {
            name,
            path: canonical.clone(),
            follow_symlinks: false,
            ancestors: vec![canonical],
        })
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn child(&self, name: String, path: PathBuf, canonical: PathBuf) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(canonical);
        Self {
            name,
            path,
            follow_symlinks: self.follow_symlinks,
            ancestors,
        }
    }
}

#[async_trait]
impl DirectoryHandle for OsDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> std::io::Result<Vec<LocalEntry>> {
        let mut listing = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = dir.next_entry().await? {
            listing.push(entry);
        }
        listing.sort_by_key(|e| e.file_name());

        let mut entries = Vec::with_capacity(listing.len());
        for entry in listing {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let mut file_type = entry.file_type().await?;

            if file_type.is_symlink() {
                if !self.follow_symlinks {
                    debug!(path = %path.display(), "skipping symlink");
                    continue;
                }
                match tokio::fs::metadata(&path).await {
                    Ok(meta) => file_type = meta.file_type(),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping dangling symlink");
                        continue;
                    }
                }
            }

            if file_type.is_dir() {
                let canonical = tokio::fs::canonicalize(&path).await?;
                if self.ancestors.contains(&canonical) {
                    warn!(path = %path.display(), "skipping symlink cycle");
                    continue;
                }
                entries.push(LocalEntry::Directory(Box::new(self.child(name, path, canonical))));
            } else if file_type.is_file() {
                let mime_type = mime_guess::from_path(&path).first_raw();
                entries.push(LocalEntry::File(Box::new(OsFile {
                    name,
                    path,
                    mime_type,
                })));
            }
        }

        Ok(entries)
    }
}

/// A regular file on disk.
pub struct OsFile {
    name: String,
    path: PathBuf,
    mime_type: Option<&'static str>,
}

#[async_trait]
impl FileHandle for OsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> Option<&str> {
        self.mime_type
    }

    async fn read_text(&self) -> std::io::Result<String> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}
