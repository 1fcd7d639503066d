//! Ingestion progress reporting.
//!
//! Reports what is being listed and how many files have been collected so
//! users can watch a large repository walk. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// A directory listing is being requested (remote) or read (local).
    Listing { source: String, path: String },
    /// The n-th file record has been produced.
    File { source: String, n: u64, path: String },
    /// The walk completed.
    Finished { source: String, files: u64 },
}

/// Receives progress events from the providers.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest acme/widgets@main  1,234 files  src/lib.rs".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Listing { source, path } => {
                format!("ingest {}  listing {}\n", source, display_dir(path))
            }
            IngestProgressEvent::File { source, n, path } => {
                format!("ingest {}  {} files  {}\n", source, format_number(*n), path)
            }
            IngestProgressEvent::Finished { source, files } => {
                format!("ingest {}  done, {} files\n", source, format_number(*files))
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Listing { source, path } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "listing",
                "path": path,
            }),
            IngestProgressEvent::File { source, n, path } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "file",
                "n": n,
                "path": path,
            }),
            IngestProgressEvent::Finished { source, files } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "finished",
                "files": files,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn display_dir(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
