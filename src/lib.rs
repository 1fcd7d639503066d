//! # Codebase Ingest
//!
//! Flattens a local directory or a remote hosted repository into an ordered
//! list of file records suitable for downstream text analysis.
//!
//! Each record carries a sanitized, unique, root-relative path and either the
//! file's text or a fixed binary placeholder. Records are produced in a
//! depth-first pre-order walk that follows the provider's own listing order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ LocalTreeReader │──┐
//! │ (handles)       │  │   ┌─────────────┐   ┌──────────────┐
//! └─────────────────┘  ├──▶│ Coordinator │──▶│ Export / CLI │
//! ┌─────────────────┐  │   │ (ingest)    │   │ (cbi)        │
//! │ RemoteRepo      │──┘   └─────────────┘   └──────────────┘
//! │ Fetcher (API)   │
//! └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cbi ingest local ./my-project --format summary
//! GITHUB_TOKEN=... cbi ingest remote https://github.com/owner/repo/tree/dev --out repo.json
//! cbi parse-url https://github.com/owner/repo
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Records, references, and results |
//! | [`error`] | Error taxonomy |
//! | [`sanitize`] | Path sanitization and uniqueness |
//! | [`classify`] | Text-or-binary classification |
//! | [`source_ref`] | Repository URL parsing |
//! | [`traits`] | Handle and provider traits, ingestion context |
//! | [`connector_fs`] | Local directory provider |
//! | [`connector_github`] | Remote repository provider |
//! | [`ratelimit`] | Request pacing and retry policy |
//! | [`ingest`] | Ingestion coordinator |
//! | [`progress`] | Progress reporting |
//! | [`export`] | Consumer payload and output |
//! | [`analyze`] | Summarization and chat backend client |

pub mod analyze;
pub mod classify;
pub mod config;
pub mod connector_fs;
pub mod connector_github;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod ratelimit;
pub mod sanitize;
pub mod source_ref;
pub mod traits;
