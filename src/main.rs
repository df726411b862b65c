//! # OpenAPI Index CLI (`oai`)
//!
//! Ingests OpenAPI/Swagger specifications into Milvus, one record per
//! endpoint, re-embedding only what changed since the last run.
//!
//! ## Usage
//!
//! ```bash
//! oai --config ./config/oai.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `oai ingest <SPEC_URL>` | Sync changed operations into the vector store |
//! | `oai diff <SPEC_URL>` | List operationIds that differ from the cached snapshot |
//! | `oai status` | Show the cached snapshot and any pending checkpoint |
//!
//! ## Examples
//!
//! ```bash
//! # First ingestion, two embedding models
//! oai ingest https://petstore.swagger.io/v2/swagger.json \
//!     --store-url http://localhost:19530 --db-name swagger_db \
//!     --embedding openai:text-embedding-3-small:1536 \
//!     --embedding ollama:nomic-embed-text:768
//!
//! # Resume an interrupted run from an explicit checkpoint
//! oai ingest ./swagger.json --resume-from swagger_ingestion_progress.json
//!
//! # Show what would be ingested
//! oai ingest ./swagger.json --dry-run
//! ```

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use openapi_index::config::{self, parse_embedding_model, Config};
use openapi_index::error::IngestError;
use openapi_index::ingest::{self, IngestArgs};
use openapi_index::models::EmbeddingModel;
use openapi_index::progress::ProgressMode;
use openapi_index::status;

/// OpenAPI Index CLI: incremental ingestion of API specifications into a
/// vector database.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Missing files fall back to built-in defaults.
#[derive(Parser)]
#[command(
    name = "oai",
    about = "Incremental ingestion of OpenAPI/Swagger specifications into a vector database",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/oai.toml")]
    config: PathBuf,

    /// Log at info level instead of warn. `RUST_LOG` takes precedence.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a specification.
    ///
    /// Resolves SPEC_URL, compares it to the cached snapshot from the last
    /// successful run and upserts a record for every added or changed
    /// operation. Progress is checkpointed so an interrupted run can resume.
    Ingest {
        /// URL or local path of the Swagger/OpenAPI JSON document.
        spec_url: String,

        /// Vector store URL (overrides `[store].url`).
        #[arg(long)]
        store_url: Option<String>,

        /// Database to select, created when missing (overrides `[store].database`).
        #[arg(long)]
        db_name: Option<String>,

        /// Embedding model as `provider:name:dimension`. Repeatable; replaces
        /// `[[embeddings.models]]` when given.
        #[arg(long = "embedding", value_parser = parse_embedding_model)]
        embeddings: Vec<EmbeddingModel>,

        /// Summarizer provider: `disabled` or `openai` (overrides `[summarizer].provider`).
        #[arg(long)]
        summarizer: Option<String>,

        /// Resume from this checkpoint file without prompting.
        #[arg(long, conflicts_with = "fresh")]
        resume_from: Option<PathBuf>,

        /// Ignore any existing checkpoint.
        #[arg(long)]
        fresh: bool,

        /// Show the targeted operations without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// List the operationIds that differ from the cached snapshot.
    Diff {
        /// URL or local path of the Swagger/OpenAPI JSON document.
        spec_url: String,
    },

    /// Show the cached snapshot and any pending checkpoint.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            spec_url,
            store_url,
            db_name,
            embeddings,
            summarizer,
            resume_from,
            fresh,
            dry_run,
            progress,
        } => {
            if let Some(url) = store_url {
                cfg.store.url = Some(url);
            }
            if let Some(db) = db_name {
                cfg.store.database = db;
            }
            if !embeddings.is_empty() {
                cfg.embeddings.models = embeddings;
            }
            if let Some(provider) = summarizer {
                cfg.summarizer.provider = provider;
            }
            let resume = match resume_from {
                Some(path) => {
                    if !path.exists() {
                        bail!("Checkpoint file {} does not exist.", path.display());
                    }
                    cfg.ingest.checkpoint_file = path;
                    true
                }
                None if fresh || dry_run => false,
                None => confirm_resume(&cfg.ingest.checkpoint_file)?,
            };

            let args = IngestArgs {
                spec_url,
                resume,
                dry_run,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            if let Err(err) = ingest::run_ingest(&cfg, &args).await {
                print_resume_hint(&err, &cfg);
                return Err(err);
            }
        }
        Commands::Diff { spec_url } => {
            status::run_diff(&cfg, &spec_url).await?;
        }
        Commands::Status => {
            status::run_status(&cfg)?;
        }
    }

    Ok(())
}

/// Ask whether to resume from an existing checkpoint.
///
/// Without a terminal on stdin the checkpoint is used as-is.
fn confirm_resume(checkpoint: &Path) -> Result<bool> {
    if !checkpoint.exists() {
        return Ok(false);
    }
    if !atty::is(atty::Stream::Stdin) {
        tracing::info!(path = %checkpoint.display(), "resuming from existing checkpoint");
        return Ok(true);
    }

    eprint!(
        "Found checkpoint {}. Resume from it? [Y/n] ",
        checkpoint.display()
    );
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    !matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

fn print_resume_hint(err: &anyhow::Error, cfg: &Config) {
    if err
        .downcast_ref::<IngestError>()
        .is_some_and(IngestError::is_resumable)
    {
        eprintln!(
            "Progress saved to {}. Re-run `oai ingest` to resume.",
            cfg.ingest.checkpoint_file.display()
        );
    }
}
