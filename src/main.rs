//! # docquery CLI (`docq`)
//!
//! Answers natural-language questions about a PDF, DOCX, or text document,
//! either as an HTTP service or one-off from the command line.
//!
//! ## Usage
//!
//! ```bash
//! docq --config ./config/docq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docq serve` | Start the HTTP server (`POST /hackrx/run`) |
//! | `docq ask` | Answer questions about one document |
//! | `docq inspect` | Show passages, index statistics, and hits for a query |
//!
//! ## Examples
//!
//! ```bash
//! # Serve on the configured bind address
//! DOCQUERY_API_TOKEN=secret docq serve
//!
//! # Ask two questions about a local policy using the lexical backend
//! docq ask --document ./policy.pdf \
//!     --question "What is the grace period?" \
//!     --question "Is cataract surgery covered?" \
//!     --backend lexical
//!
//! # See how a document was chunked and what a query retrieves
//! docq inspect --document ./policy.pdf --query "waiting period"
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docquery::config::load_config_or_default;
use docquery::{commands, server};
use docquery_core::index::BackendKind;

/// docquery: question answering over a single document.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docq.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docq",
    about = "docquery: answer questions about a document with retrieval and re-ranking",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docq.toml`. A missing file means built-in defaults.
    #[arg(long, global = true, default_value = "./config/docq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` (the `PORT` environment variable overrides
    /// the port) and requires `[server].api_token` or `DOCQUERY_API_TOKEN`.
    Serve,

    /// Answer questions about a document.
    Ask {
        /// Document URL or local path.
        #[arg(long)]
        document: String,

        /// Question to answer. Repeat for several questions.
        #[arg(long = "question", required = true)]
        questions: Vec<String>,

        /// Index backend: `dense`, `tfidf`, or `lexical`. Defaults to
        /// `[retrieval].backend`.
        #[arg(long)]
        backend: Option<BackendKind>,
    },

    /// Print passages and index statistics, and optionally the hits for a query.
    Inspect {
        /// Document URL or local path.
        #[arg(long)]
        document: String,

        /// Index backend: `dense`, `tfidf`, or `lexical`.
        #[arg(long)]
        backend: Option<BackendKind>,

        /// Query to search and re-rank.
        #[arg(long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask {
            document,
            questions,
            backend,
        } => {
            commands::run_ask(&cfg, &document, &questions, backend).await?;
        }
        Commands::Inspect {
            document,
            backend,
            query,
        } => {
            commands::run_inspect(&cfg, &document, backend, query.as_deref()).await?;
        }
    }

    Ok(())
}
