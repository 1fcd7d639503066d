//! Ingestion coordinator.
//!
//! Selects the provider for a request, drives it to completion, and wraps
//! the outcome in an [`IngestionResult`]. The coordinator never edits or
//! reorders the records a provider returns, and it never returns a partial
//! list: any provider error becomes a `Failed` result with no records.

use tracing::{info, info_span, warn, Instrument};

use crate::config::Config;
use crate::connector_fs::{LocalTreeReader, OsDirectory};
use crate::connector_github::RemoteRepositoryFetcher;
use crate::error::IngestError;
use crate::models::{
    IngestStats, IngestionResult, IngestionStatus, RepositoryReference, SourceSelector,
};
use crate::source_ref;
use crate::traits::{DirectoryHandle, IngestContext, TreeSource};

/// A caller's ingestion request.
pub enum IngestRequest {
    /// A directory the caller already holds a handle to.
    Local { root: Box<dyn DirectoryHandle> },
    /// A repository URL such as `https://github.com/owner/repo/tree/branch`.
    Remote { url: String },
}

impl IngestRequest {
    /// Open a filesystem path as a local request, honoring `local.follow_symlinks`.
    pub fn local_path(path: &std::path::Path, config: &Config) -> Result<Self, IngestError> {
        let root = OsDirectory::open(path)?.follow_symlinks(config.local.follow_symlinks);
        Ok(IngestRequest::Local {
            root: Box::new(root),
        })
    }

    pub fn remote(url: impl Into<String>) -> Self {
        IngestRequest::Remote { url: url.into() }
    }

    pub fn selector(&self) -> SourceSelector {
        match self {
            IngestRequest::Local { .. } => SourceSelector::Local,
            IngestRequest::Remote { .. } => SourceSelector::Remote,
        }
    }
}

impl IngestionResult {
    /// A failed result carrying no records.
    pub fn failed(selector: SourceSelector, label: String, error: &IngestError) -> Self {
        Self {
            selector,
            label,
            records: Vec::new(),
            status: IngestionStatus::Failed {
                kind: error.kind(),
                reason: error.user_message(),
            },
            stats: IngestStats::default(),
            repository: None,
        }
    }
}

/// Run one ingestion to completion or failure.
pub async fn ingest(request: IngestRequest, config: &Config, ctx: &IngestContext) -> IngestionResult {
    let selector = request.selector();

    let (label, repository, source): (String, Option<RepositoryReference>, Box<dyn TreeSource>) =
        match request {
            IngestRequest::Local { root } => {
                let label = root.name().to_string();
                match LocalTreeReader::from_config(root, config) {
                    Ok(reader) => (label, None, Box::new(reader)),
                    Err(e) => return failed(selector, label, None, e),
                }
            }
            IngestRequest::Remote { url } => {
                let reference = match source_ref::parse(&url) {
                    Ok(r) => r,
                    Err(e) => return failed(selector, url.trim().to_string(), None, e),
                };
                match RemoteRepositoryFetcher::new(reference.clone(), config) {
                    Ok(fetcher) => (fetcher.label(), Some(reference), Box::new(fetcher)),
                    Err(e) => {
                        return failed(selector, reference.label(), Some(reference), e);
                    }
                }
            }
        };

    let mut result = ingest_source(source.as_ref(), ctx).await;
    result.label = label;
    result.repository = repository;
    result
}

/// Drive any [`TreeSource`], including ones defined outside this crate.
pub async fn ingest_source(source: &dyn TreeSource, ctx: &IngestContext) -> IngestionResult {
    let selector = source.selector();
    let label = source.label();
    let span = info_span!("ingest", %selector, source = %label);

    async move {
        let mut stats = IngestStats::default();
        match source.collect(ctx, &mut stats).await {
            Ok(records) => {
                info!(
                    files = stats.files,
                    text = stats.text_files,
                    binary = stats.binary_files,
                    degraded = stats.degraded,
                    requests = stats.requests,
                    "ingestion succeeded"
                );
                IngestionResult {
                    selector,
                    label,
                    records,
                    status: IngestionStatus::Succeeded,
                    stats,
                    repository: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "ingestion failed");
                let mut result = IngestionResult::failed(selector, label, &e);
                result.stats = stats;
                result
            }
        }
    }
    .instrument(span)
    .await
}

fn failed(
    selector: SourceSelector,
    label: String,
    repository: Option<RepositoryReference>,
    error: IngestError,
) -> IngestionResult {
    warn!(%selector, error = %error, "ingestion failed before walking the source");
    let mut result = IngestionResult::failed(selector, label, &error);
    result.repository = repository;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, FetchErrorKind};
    use crate::models::{FileRecord, BINARY_PLACEHOLDER};
    use crate::traits::{FileHandle, LocalEntry};
    use async_trait::async_trait;

    /// In-memory directory whose listing order is exactly the vector order.
    #[derive(Clone)]
    struct MemDir {
        name: String,
        children: Vec<MemNode>,
    }

    #[derive(Clone)]
    enum MemNode {
        File {
            name: String,
            mime: Option<&'static str>,
            body: Result<String, std::io::ErrorKind>,
        },
        Dir(MemDir),
    }

    struct MemFile {
        name: String,
        mime: Option<&'static str>,
        body: Result<String, std::io::ErrorKind>,
    }

    fn mem_dir(name: &str, children: Vec<MemNode>) -> MemDir {
        MemDir {
            name: name.to_string(),
            children,
        }
    }

    fn mem_file(name: &str, body: &str) -> MemNode {
        MemNode::File {
            name: name.to_string(),
            mime: None,
            body: Ok(body.to_string()),
        }
    }

    #[async_trait]
    impl DirectoryHandle for MemDir {
        fn name(&self) -> &str {
            &self.name
        }

        async fn entries(&self) -> std::io::Result<Vec<LocalEntry>> {
            Ok(self
                .clone()
                .children
                .into_iter()
                .map(|c| match c {
                    MemNode::File { name, mime, body } => {
                        LocalEntry::File(Box::new(MemFile { name, mime, body }))
                    }
                    MemNode::Dir(d) => LocalEntry::Directory(Box::new(d)),
                })
                .collect())
        }
    }

    #[async_trait]
    impl FileHandle for MemFile {
        fn name(&self) -> &str {
            &self.name
        }

        fn mime_type(&self) -> Option<&str> {
            self.mime
        }

        async fn read_text(&self) -> std::io::Result<String> {
            self.body.clone().map_err(std::io::Error::from)
        }
    }

    #[tokio::test]
    async fn local_ingestion_keeps_provider_order() {
        let root = mem_dir(
            "project",
            vec![
                mem_file("z.txt", "z"),
                MemNode::Dir(mem_dir(
                    "sub",
                    vec![
                        mem_file("b.md", "b"),
                        MemNode::File {
                            name: "notes".into(),
                            mime: Some("text/plain"),
                            body: Ok("plain".into()),
                        },
                    ],
                )),
                mem_file("a.bin", "should not be read"),
            ],
        );

        let result = ingest(
            IngestRequest::Local {
                root: Box::new(root),
            },
            &Config::default(),
            &IngestContext::default(),
        )
        .await;

        assert!(result.is_success());
        assert_eq!(result.label, "project");
        assert_eq!(
            result.records,
            vec![
                FileRecord::text("z.txt".into(), "z".into()),
                FileRecord::text("sub/b.md".into(), "b".into()),
                FileRecord::text("sub/notes".into(), "plain".into()),
                FileRecord::binary("a.bin".into()),
            ]
        );
        assert_eq!(result.records[3].content, BINARY_PLACEHOLDER);
        assert_eq!(result.status_message(), "project Uploaded Successfully");
    }

    #[tokio::test]
    async fn local_read_error_fails_without_partial_records() {
        let root = mem_dir(
            "project",
            vec![
                mem_file("ok.txt", "fine"),
                MemNode::File {
                    name: "locked.txt".into(),
                    mime: None,
                    body: Err(std::io::ErrorKind::Other),
                },
            ],
        );

        let result = ingest(
            IngestRequest::Local {
                root: Box::new(root),
            },
            &Config::default(),
            &IngestContext::default(),
        )
        .await;

        assert!(!result.is_success());
        assert!(result.records.is_empty());
        match &result.status {
            IngestionStatus::Failed { kind, reason } => {
                assert_eq!(*kind, ErrorKind::Io);
                assert!(reason.contains("locked.txt"));
            }
            IngestionStatus::Succeeded => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn unparseable_url_fails_before_network() {
        let mut config = Config::default();
        // Unroutable: any request would fail with a transport error, not a parse error.
        config.github.api_base = "http://127.0.0.1:9".into();

        let result = ingest(
            IngestRequest::remote("not-a-url"),
            &config,
            &IngestContext::default(),
        )
        .await;

        assert_eq!(result.selector, SourceSelector::Remote);
        assert_eq!(result.label, "not-a-url");
        assert_eq!(
            result.status,
            IngestionStatus::Failed {
                kind: ErrorKind::Parse,
                reason: IngestError::Parse {
                    input: String::new(),
                    reason: String::new()
                }
                .user_message(),
            }
        );
        assert_eq!(result.stats.requests, 0);
    }

    #[tokio::test]
    async fn unreachable_host_is_classified_as_transport() {
        let mut config = Config::default();
        config.github.api_base = "http://127.0.0.1:9".into();
        config.github.max_retries = 0;
        config.github.timeout_secs = 2;

        let result = ingest(
            IngestRequest::remote("https://github.com/acme/widgets/tree/dev"),
            &config,
            &IngestContext::default(),
        )
        .await;

        assert_eq!(result.label, "acme/widgets (branch: dev)");
        assert_eq!(result.repository.as_ref().unwrap().branch, "dev");
        assert!(matches!(
            result.status,
            IngestionStatus::Failed {
                kind: ErrorKind::Fetch(FetchErrorKind::Transport),
                ..
            }
        ));
        assert!(result.records.is_empty());
    }

    #[tokio::test]
    async fn cancelled_context_fails_cleanly() {
        let ctx = IngestContext::default();
        ctx.cancel_token().cancel();
        let root = mem_dir("project", vec![mem_file("a.txt", "a")]);

        let result = ingest(
            IngestRequest::Local {
                root: Box::new(root),
            },
            &Config::default(),
            &ctx,
        )
        .await;

        assert!(matches!(
            result.status,
            IngestionStatus::Failed {
                kind: ErrorKind::Cancelled,
                ..
            }
        ));
        assert!(result.records.is_empty());
    }
}
