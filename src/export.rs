//! Hand ingestion results to downstream consumers.
//!
//! Consumers expect `{name, content}` pairs rather than the internal
//! [`FileRecord`](crate::models::FileRecord) shape. [`ConsumerPayload`]
//! performs that mapping without reordering, and [`write_output`] prints the
//! rendered payload to stdout or writes it to a file.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::models::{FileRecord, IngestionResult};

/// Output format for `cbi ingest`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    /// The full consumer payload as pretty JSON.
    #[default]
    Json,
    /// One line per record plus the status message.
    Summary,
}

/// A record in the shape downstream consumers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerFile {
    pub name: String,
    pub content: String,
}

impl From<&FileRecord> for ConsumerFile {
    fn from(record: &FileRecord) -> Self {
        Self {
            name: record.path.clone(),
            content: record.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumerPayload {
    pub label: String,
    pub generated_at: DateTime<Utc>,
    pub files: Vec<ConsumerFile>,
}

impl ConsumerPayload {
    pub fn from_result(result: &IngestionResult) -> Self {
        Self {
            label: result.label.clone(),
            generated_at: Utc::now(),
            files: result.records.iter().map(ConsumerFile::from).collect(),
        }
    }
}

/// Render a successful result in the requested format.
pub fn render(result: &IngestionResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&ConsumerPayload::from_result(
            result,
        ))?),
        OutputFormat::Summary => {
            let mut out = String::new();
            for record in &result.records {
                let marker = if record.is_binary { "bin " } else { "text" };
                out.push_str(&format!("{}  {}\n", marker, record.path));
            }
            out.push_str(&format!(
                "{} files ({} text, {} binary, {} degraded)\n",
                result.stats.files,
                result.stats.text_files,
                result.stats.binary_files,
                result.stats.degraded
            ));
            out.push_str(&result.status_message());
            Ok(out)
        }
    }
}

/// Write rendered output to `output`, or to stdout when `None`.
pub fn write_output(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, rendered)?;
            eprintln!("Wrote {} bytes to {}", rendered.len(), path.display());
        }
        None => {
            println!("{}", rendered);
        }
    }
    Ok(())
}
