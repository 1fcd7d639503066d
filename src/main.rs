//! # Codebase Ingest CLI (`cbi`)
//!
//! Flattens a local directory or a hosted repository into an ordered list of
//! `{name, content}` records and prints it, or forwards it to the
//! summarization backend.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cbi ingest local <DIR>` | Ingest a local directory |
//! | `cbi ingest remote <URL>` | Ingest a remote repository via the contents API |
//! | `cbi parse-url <URL>` | Show how a repository URL is interpreted |
//! | `cbi analyze local\|remote <SOURCE>` | Ingest, then request a summary and developer guide |
//! | `cbi chat --message <Q> local\|remote <SOURCE>` | Ingest, then ask the backend a question about it |
//! | `cbi models` | List known analysis models |
//!
//! ## Examples
//!
//! ```bash
//! cbi ingest local ./my-project --format summary
//! GITHUB_TOKEN=... cbi ingest remote https://github.com/owner/repo/tree/dev --out repo.json
//! cbi analyze remote https://github.com/owner/repo --model starcoder
//! cbi chat --message "Where is the CLI defined?" --context files local ./my-project
//! ```
//!
//! Logs go to stderr (`RUST_LOG` or `--verbose`); stdout carries only the
//! requested output.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use codebase_ingest::analyze;
use codebase_ingest::config::{self, Config};
use codebase_ingest::export::{self, ConsumerPayload, OutputFormat};
use codebase_ingest::ingest::{ingest, IngestRequest};
use codebase_ingest::models::{IngestionResult, SourceSelector};
use codebase_ingest::progress::ProgressMode;
use codebase_ingest::source_ref;
use codebase_ingest::traits::IngestContext;

const DEFAULT_CONFIG_PATH: &str = "./cbi.toml";

/// Codebase Ingest: flatten a directory or repository into text records.
#[derive(Parser)]
#[command(name = "cbi", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./cbi.toml`; built-in defaults apply when that file does
    /// not exist. An explicitly given path must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a source and print the consumer payload.
    Ingest {
        #[command(subcommand)]
        source: SourceArg,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Parse a repository URL and print the resolved reference as JSON.
    ParseUrl { url: String },

    /// Ingest a source and ask the backend for a summary and developer guide.
    Analyze {
        #[command(subcommand)]
        source: SourceArg,

        /// Model id; defaults to `backend.model_id`.
        #[arg(long, global = true)]
        model: Option<String>,
    },

    /// Ingest a source and ask the backend a question about it.
    Chat {
        /// The question to ask.
        #[arg(long, short)]
        message: String,

        /// What to send as conversation context.
        #[arg(long, value_enum, default_value = "summary")]
        context: ChatContext,

        #[command(subcommand)]
        source: SourceArg,

        /// Model id; defaults to `backend.model_id`.
        #[arg(long, global = true)]
        model: Option<String>,
    },

    /// List known analysis models.
    Models,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ChatContext {
    /// Run an analysis first and send its summary.
    Summary,
    /// Send the ingested files as JSON.
    Files,
}

#[derive(Subcommand)]
enum SourceArg {
    /// A local directory.
    Local { dir: PathBuf },
    /// A repository URL, e.g. `https://github.com/owner/repo/tree/branch`.
    Remote { url: String },
}

#[derive(Args)]
struct OutputArgs {
    /// Write output to this file instead of stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match &cli.config {
        Some(path) => config::load_config(path, true)?,
        None => config::load_config(Path::new(DEFAULT_CONFIG_PATH), false)?,
    };

    match cli.command {
        Commands::ParseUrl { url } => {
            let reference = source_ref::parse(&url).map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("{}", serde_json::to_string_pretty(&reference)?);
        }
        Commands::Models => {
            for model in analyze::KNOWN_MODELS {
                let marker = if model.id == cfg.backend.model_id { "*" } else { " " };
                println!("{} {:<28} {}", marker, model.id, model.name);
            }
        }
        Commands::Ingest { source, output } => {
            let result = run_ingest(source, &cfg, cli.progress).await;
            let result = require_success(result)?;
            let rendered = export::render(&result, output.format)?;
            export::write_output(&rendered, output.out.as_deref())?;
            if output.out.is_some() || output.format == OutputFormat::Json {
                eprintln!("{}", result.status_message());
            }
        }
        Commands::Analyze { source, model } => {
            let result = require_success(run_ingest(source, &cfg, cli.progress).await)?;
            eprintln!("{}", result.status_message());
            let payload = ConsumerPayload::from_result(&result);
            let model_id = model.unwrap_or_else(|| cfg.backend.model_id.clone());
            let analysis = analyze::analyze(&cfg.backend, &payload.files, &model_id).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Commands::Chat {
            message,
            context,
            source,
            model,
        } => {
            let result = require_success(run_ingest(source, &cfg, cli.progress).await)?;
            eprintln!("{}", result.status_message());
            let payload = ConsumerPayload::from_result(&result);
            let model_id = model.unwrap_or_else(|| cfg.backend.model_id.clone());
            let context = match context {
                ChatContext::Summary => {
                    analyze::analyze(&cfg.backend, &payload.files, &model_id)
                        .await?
                        .summary
                }
                ChatContext::Files => serde_json::to_string(&payload.files)?,
            };
            let answer = analyze::chat(&cfg.backend, &message, &context, &model_id).await?;
            println!("{}", answer);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("codebase_ingest=debug,cbi=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_ingest(source: SourceArg, cfg: &Config, progress: Option<ProgressMode>) -> IngestionResult {
    let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
    let cancel = CancellationToken::new();
    let ctx = IngestContext::new(cancel.clone(), Arc::from(mode.reporter()));

    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling ingestion");
            cancel.cancel();
        }
    });

    let request = match source {
        SourceArg::Local { dir } => match IngestRequest::local_path(&dir, cfg) {
            Ok(request) => request,
            Err(e) => {
                watcher.abort();
                return IngestionResult::failed(SourceSelector::Local, dir.display().to_string(), &e);
            }
        },
        SourceArg::Remote { url } => IngestRequest::remote(url),
    };

    let result = ingest(request, cfg, &ctx).await;
    watcher.abort();
    result
}

fn require_success(result: IngestionResult) -> Result<IngestionResult> {
    if !result.is_success() {
        bail!("{}", result.status_message());
    }
    Ok(result)
}
