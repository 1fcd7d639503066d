//! Remote repository fetcher for the GitHub contents API.
//!
//! Walks a repository through
//! `GET {api_base}/repos/{owner}/{repo}/contents/{path}?ref={branch}`,
//! which answers with a JSON array for a directory and a single JSON object
//! for a file. Both shapes are normalized to a list of entries.
//!
//! # Workflow
//!
//! 1. List the starting path.
//! 2. Walk the entries in server order with an explicit stack: a `dir`
//!    entry is listed and its entries are visited before the next sibling.
//! 3. Runs of consecutive `file` entries are downloaded through an
//!    order-preserving buffered stream, at most
//!    `github.max_concurrent_downloads` at a time.
//!
//! # Failure Handling
//!
//! A listing that ends in a non-success status aborts the whole fetch with
//! [`IngestError::Fetch`], after rate-limit and server-error retries are
//! exhausted. A raw-content download that fails only degrades that one
//! record to the binary placeholder.
//!
//! # Authentication
//!
//! The bearer token comes from the environment variable named by
//! `github.token_env` (default `GITHUB_TOKEN`). Without it requests are
//! sent unauthenticated and share the much smaller anonymous budget.
//! The token is sent to the API only, never to raw download URLs.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::classify::TextClassifier;
use crate::config::Config;
use crate::error::{FetchErrorKind, IngestError};
use crate::models::{FileRecord, IngestStats, RepositoryReference, SourceSelector};
use crate::progress::IngestProgressEvent;
use crate::ratelimit::{classify_status, RequestPacer, RetryPolicy};
use crate::sanitize::{sanitize, PathClaims};
use crate::traits::{IngestContext, TreeSource};

/// One entry of a contents-API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    /// `"file"`, `"dir"`, `"symlink"`, or `"submodule"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Repository-relative path.
    pub path: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ContentEntry {
    fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentEntry>),
    Single(ContentEntry),
}

impl ContentsResponse {
    fn into_entries(self) -> Vec<ContentEntry> {
        match self {
            ContentsResponse::Listing(entries) => entries,
            ContentsResponse::Single(entry) => vec![entry],
        }
    }
}

/// What happened to one file entry.
enum FileOutcome {
    Text(String),
    Binary,
    /// The raw download failed; recorded as binary.
    Degraded,
}

// ═══════════════════════════════════════════════════════════════════════
// Fetcher
// ═══════════════════════════════════════════════════════════════════════

/// Fetches every file of one repository reference.
pub struct RemoteRepositoryFetcher {
    client: reqwest::Client,
    api_base: Url,
    token: Option<String>,
    reference: RepositoryReference,
    classifier: TextClassifier,
    pacer: RequestPacer,
    retry: RetryPolicy,
    max_concurrent_downloads: usize,
}

impl RemoteRepositoryFetcher {
    /// Build a fetcher from config, reading the token from the environment.
    pub fn new(reference: RepositoryReference, config: &Config) -> Result<Self, IngestError> {
        let gh = &config.github;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(gh.timeout_secs))
            .user_agent(gh.user_agent.clone())
            .build()
            .map_err(|e| IngestError::Config(format!("failed to build HTTP client: {}", e)))?;
        let api_base = Url::parse(&gh.api_base)
            .map_err(|e| IngestError::Config(format!("invalid github.api_base: {}", e)))?;
        if api_base.cannot_be_a_base() {
            return Err(IngestError::Config(format!(
                "github.api_base cannot be used as a base URL: {}",
                gh.api_base
            )));
        }

        let token = gh.token();
        if token.is_none() {
            warn!(
                env = %gh.token_env,
                "no contents API token configured; using the anonymous rate limit"
            );
        }

        Ok(Self {
            client,
            api_base,
            token,
            reference,
            classifier: config.classify.classifier(),
            pacer: RequestPacer::new(Duration::from_millis(gh.request_interval_ms)),
            retry: RetryPolicy::from_config(gh),
            max_concurrent_downloads: gh.max_concurrent_downloads.max(1),
        })
    }

    /// Replace the credential read from the environment.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn reference(&self) -> &RepositoryReference {
        &self.reference
    }

    /// Contents endpoint for `path` on the configured branch.
    pub fn contents_url(&self, path: &str) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([
                    "repos",
                    self.reference.owner.as_str(),
                    self.reference.name.as_str(),
                    "contents",
                ])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("ref", &self.reference.branch);
        url
    }

    /// Fetch every file under `path` (`""` for the repository root) in pre-order.
    ///
    /// Record paths are relative to `path`.
    pub async fn fetch(
        &self,
        path: &str,
        ctx: &IngestContext,
        stats: &mut IngestStats,
    ) -> Result<Vec<FileRecord>, IngestError> {
        let root = path.trim_matches('/');
        let source = self.reference.to_string();
        let mut claims = PathClaims::new();
        let mut records = Vec::new();

        let root_entries = self.list(root, ctx, stats).await?;
        stats.directories += 1;
        let mut stack = vec![root_entries.into_iter()];

        while let Some(frame) = stack.last_mut() {
            ctx.check_cancelled()?;

            let Some(entry) = frame.next() else {
                stack.pop();
                continue;
            };

            match entry.kind.as_str() {
                "dir" => {
                    let entries = self.list(&entry.path, ctx, stats).await?;
                    stats.directories += 1;
                    stack.push(entries.into_iter());
                }
                "file" => {
                    let mut batch = vec![entry];
                    while frame.as_slice().first().is_some_and(ContentEntry::is_file) {
                        if let Some(next) = frame.next() {
                            batch.push(next);
                        }
                    }

                    // Collected up front so the `collect` future stays `Send`.
                    let downloads: Vec<_> = batch
                        .iter()
                        .map(|entry| self.file_outcome(entry, ctx))
                        .collect();
                    let outcomes: Vec<Result<FileOutcome, IngestError>> = stream::iter(downloads)
                        .buffered(self.max_concurrent_downloads)
                        .collect()
                        .await;

                    for (entry, outcome) in batch.iter().zip(outcomes) {
                        let outcome = outcome?;
                        let path = claims.claim(&sanitize(relative_to(root, &entry.path)));
                        let record = match outcome {
                            FileOutcome::Text(content) => {
                                stats.requests += 1;
                                FileRecord::text(path, content)
                            }
                            FileOutcome::Binary => FileRecord::binary(path),
                            FileOutcome::Degraded => {
                                stats.requests += 1;
                                stats.degraded += 1;
                                FileRecord::binary(path)
                            }
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
                other => {
                    debug!(path = %entry.path, kind = other, "skipping unsupported entry type");
                }
            }
        }

        ctx.report(IngestProgressEvent::Finished {
            source,
            files: records.len() as u64,
        });
        Ok(records)
    }

    /// List one path, retrying rate limits and server errors.
    async fn list(
        &self,
        path: &str,
        ctx: &IngestContext,
        stats: &mut IngestStats,
    ) -> Result<Vec<ContentEntry>, IngestError> {
        let url = self.contents_url(path);
        ctx.report(IngestProgressEvent::Listing {
            source: self.reference.to_string(),
            path: path.to_string(),
        });
        debug!(%url, "listing repository path");

        let mut attempt = 0u32;
        loop {
            ctx.check_cancelled()?;
            tokio::select! {
                _ = ctx.cancel_token().cancelled() => return Err(IngestError::Cancelled),
                _ = self.pacer.acquire() => {}
            }
            stats.requests += 1;

            let mut request = self
                .client
                .get(url.clone())
                .header(reqwest::header::ACCEPT, "application/vnd.github+json");
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token);
            }

            let response = tokio::select! {
                _ = ctx.cancel_token().cancelled() => return Err(IngestError::Cancelled),
                response = request.send() => response,
            };

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    if self.retry.should_retry(FetchErrorKind::Transport, None, attempt) {
                        let delay = self.retry.delay(attempt, &reqwest::header::HeaderMap::new());
                        warn!(path, error = %e, ?delay, "listing request failed; retrying");
                        self.backoff(delay, ctx).await?;
                        attempt += 1;
                        continue;
                    }
                    return Err(fetch_error(path, None, FetchErrorKind::Transport));
                }
            };

            let status = response.status();
            if status.is_success() {
                let body: ContentsResponse = response.json().await.map_err(|e| {
                    warn!(path, error = %e, "unreadable contents response");
                    fetch_error(path, Some(status.as_u16()), FetchErrorKind::InvalidResponse)
                })?;
                return Ok(body.into_entries());
            }

            let kind = classify_status(status, response.headers());
            if self.retry.should_retry(kind, Some(status), attempt) {
                let delay = self.retry.delay(attempt, response.headers());
                warn!(path, status = status.as_u16(), %kind, ?delay, "listing rejected; retrying");
                self.backoff(delay, ctx).await?;
                attempt += 1;
                continue;
            }

            return Err(fetch_error(path, Some(status.as_u16()), kind));
        }
    }

    async fn backoff(&self, delay: Duration, ctx: &IngestContext) -> Result<(), IngestError> {
        tokio::select! {
            _ = ctx.cancel_token().cancelled() => Err(IngestError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Decide how to record one file, downloading its text when whitelisted.
    ///
    /// Only cancellation is an error here.
    async fn file_outcome(
        &self,
        entry: &ContentEntry,
        ctx: &IngestContext,
    ) -> Result<FileOutcome, IngestError> {
        ctx.check_cancelled()?;

        let download_url = match entry.download_url.as_deref() {
            Some(url) if self.classifier.has_text_extension(&entry.path) => url,
            _ => return Ok(FileOutcome::Binary),
        };

        let download = async {
            let response = self.client.get(download_url).send().await?;
            response.error_for_status()?.text().await
        };

        tokio::select! {
            _ = ctx.cancel_token().cancelled() => Err(IngestError::Cancelled),
            result = download => match result {
                Ok(text) => Ok(FileOutcome::Text(text)),
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "raw content download failed; recording as binary");
                    Ok(FileOutcome::Degraded)
                }
            },
        }
    }
}

#[async_trait]
impl TreeSource for RemoteRepositoryFetcher {
    fn selector(&self) -> SourceSelector {
        SourceSelector::Remote
    }

    fn label(&self) -> String {
        self.reference.label()
    }

    async fn collect(
        &self,
        ctx: &IngestContext,
        stats: &mut IngestStats,
    ) -> Result<Vec<FileRecord>, IngestError> {
        self.fetch("", ctx, stats).await
    }
}

fn fetch_error(path: &str, status: Option<u16>, kind: FetchErrorKind) -> IngestError {
    IngestError::Fetch {
        status,
        path: path.to_string(),
        kind,
    }
}

/// Path of `entry_path` relative to the walk root.
///
/// When the root is itself a file, its file name is used.
fn relative_to<'a>(root: &str, entry_path: &'a str) -> &'a str {
    if root.is_empty() {
        return entry_path;
    }
    entry_path
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or_else(|| entry_path.rsplit('/').next().unwrap_or(entry_path))
}
