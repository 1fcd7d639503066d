//! Client for the summarization backend.
//!
//! Sends the consumer-shaped file list of a successful ingestion to
//! `POST {backend.url}/api/analyze/` and returns the generated summary and
//! developer guide. Follow-up questions go to `POST {backend.url}/api/chat/`
//! with a caller-chosen context string. The backend itself is out of scope;
//! this module only owns the request/response contract.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::BackendConfig;
use crate::export::ConsumerFile;

/// A model the backend is known to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownModel {
    pub id: &'static str,
    pub name: &'static str,
}

pub const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        id: "ibm/granite-3-8b-instruct",
        name: "IBM Granite 3-8B Instruct",
    },
    KnownModel {
        id: "starcoder",
        name: "StarCoder",
    },
    KnownModel {
        id: "codellama",
        name: "Code LLaMA",
    },
];

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    files: &'a [ConsumerFile],
    model_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Analysis {
    pub summary: String,
    pub developer_guide: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    context: &'a str,
    model_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    answer: String,
}

/// Ask the backend to summarize `files` with `model_id`.
///
/// Unknown model ids are passed through with a warning, since the backend
/// may serve models this client does not list.
pub async fn analyze(config: &BackendConfig, files: &[ConsumerFile], model_id: &str) -> Result<Analysis> {
    warn_if_unknown(model_id);
    tracing::debug!(files = files.len(), model_id, "sending analyze request");
    post_json(config, "analyze", &AnalyzeRequest { files, model_id }).await
}

/// Ask the backend a question about a codebase and return its answer.
///
/// `context` is sent verbatim: usually a prior [`Analysis::summary`] or the
/// serialized file list.
pub async fn chat(config: &BackendConfig, message: &str, context: &str, model_id: &str) -> Result<String> {
    if message.trim().is_empty() {
        bail!("Chat message must not be empty");
    }
    warn_if_unknown(model_id);
    tracing::debug!(context_len = context.len(), model_id, "sending chat request");

    let reply: ChatReply = post_json(
        config,
        "chat",
        &ChatRequest {
            message,
            context,
            model_id,
        },
    )
    .await?;
    Ok(reply.answer)
}

fn warn_if_unknown(model_id: &str) {
    if !KNOWN_MODELS.iter().any(|m| m.id == model_id) {
        tracing::warn!(model_id, "model is not in the known model list");
    }
}

/// POST `body` to `{backend.url}/api/{endpoint}/` and decode the JSON reply.
async fn post_json<B: Serialize, R: DeserializeOwned>(
    config: &BackendConfig,
    endpoint: &str,
    body: &B,
) -> Result<R> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!("{}/api/{}/", config.url.trim_end_matches('/'), endpoint);
    tracing::debug!(%url, "posting to backend");

    let response = client
        .post(&url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("Backend unreachable (is it running at {}?)", config.url))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Backend {} error {}: {}", endpoint, status, body_text);
    }

    response
        .json::<R>()
        .await
        .with_context(|| format!("Backend {} returned an unexpected response body", endpoint))
}
