//! Error taxonomy for ingestion.
//!
//! Every failure that affects the integrity of the whole tree is an
//! [`IngestError`] and aborts the ingestion. Failures scoped to a single
//! file's raw-content download are not errors: the fetcher substitutes the
//! binary placeholder and counts the file as degraded.
//!
//! | Variant | Trigger |
//! |---------|---------|
//! | [`IngestError::Parse`] | malformed repository URL |
//! | [`IngestError::Permission`] | local directory access denied |
//! | [`IngestError::Io`] | local listing or read failure |
//! | [`IngestError::Fetch`] | non-success status on a contents listing |
//! | [`IngestError::Cancelled`] | caller cancelled the ingestion |
//! | [`IngestError::Config`] | invalid configuration or HTTP client setup |

use serde::Serialize;
use std::fmt;

/// Why a contents-API listing request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// HTTP 404: the path or repository does not exist (or is private).
    NotFound,
    /// HTTP 429, or 403 with an exhausted rate-limit budget. Retryable later.
    RateLimited,
    /// HTTP 401, or 403 that is not a rate limit.
    Unauthorized,
    /// Any other non-success status.
    Status,
    /// The request never produced a response (DNS, TLS, timeout).
    Transport,
    /// A success status whose body is not a contents listing.
    InvalidResponse,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchErrorKind::NotFound => "not found",
            FetchErrorKind::RateLimited => "rate limited",
            FetchErrorKind::Unauthorized => "unauthorized",
            FetchErrorKind::Status => "http error",
            FetchErrorKind::Transport => "transport error",
            FetchErrorKind::InvalidResponse => "invalid response",
        };
        f.write_str(s)
    }
}

/// Stable classification of an [`IngestError`], used in results and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    Permission,
    Io,
    Fetch(FetchErrorKind),
    Cancelled,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("cannot parse repository URL '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("permission denied: {path}")]
    Permission { path: String },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("contents request for '{path}' failed ({kind}, HTTP {status:?})")]
    Fetch {
        /// `None` when the request failed before a status line was received.
        status: Option<u16>,
        path: String,
        kind: FetchErrorKind,
    },

    #[error("ingestion cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Wrap a local I/O error, promoting `PermissionDenied` to [`IngestError::Permission`].
    pub fn from_io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            IngestError::Permission { path }
        } else {
            IngestError::Io { path, source }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Parse { .. } => ErrorKind::Parse,
            IngestError::Permission { .. } => ErrorKind::Permission,
            IngestError::Io { .. } => ErrorKind::Io,
            IngestError::Fetch { kind, .. } => ErrorKind::Fetch(*kind),
            IngestError::Cancelled => ErrorKind::Cancelled,
            IngestError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether a later retry of the same ingestion could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::Fetch {
                kind: FetchErrorKind::RateLimited | FetchErrorKind::Transport,
                ..
            }
        )
    }

    /// Human-readable failure reason for presentation.
    ///
    /// Unlike the `Display` impl this avoids internal detail such as
    /// source error chains and is phrased as guidance for the user.
    pub fn user_message(&self) -> String {
        match self {
            IngestError::Parse { .. } => {
                "Could not parse repository URL. Expected format: https://github.com/owner/repo"
                    .to_string()
            }
            IngestError::Permission { path } => {
                format!("Access to '{}' was denied.", display_path(path))
            }
            IngestError::Io { path, .. } => {
                format!("Could not read '{}' from the selected folder.", display_path(path))
            }
            IngestError::Fetch { kind, path, status } => match kind {
                FetchErrorKind::NotFound => format!(
                    "Repository path '{}' was not found. Check your link, branch, or repo privacy settings.",
                    display_path(path)
                ),
                FetchErrorKind::RateLimited => {
                    "The repository host rate limit was exceeded. Try again later or configure a token."
                        .to_string()
                }
                FetchErrorKind::Unauthorized => {
                    "The repository host rejected the credentials. Check the configured token."
                        .to_string()
                }
                FetchErrorKind::Status => format!(
                    "Error fetching repository (HTTP {}).",
                    status.map(|s| s.to_string()).unwrap_or_else(|| "?".to_string())
                ),
                FetchErrorKind::Transport => {
                    "Could not reach the repository host.".to_string()
                }
                FetchErrorKind::InvalidResponse => format!(
                    "The repository host returned an unreadable listing for '{}'.",
                    display_path(path)
                ),
            },
            IngestError::Cancelled => "Ingestion was cancelled.".to_string(),
            IngestError::Config(msg) => format!("Configuration error: {}", msg),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
