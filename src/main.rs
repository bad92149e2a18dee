//! # Docmill CLI
//!
//! The `docmill` binary drives the ingestion pipeline. It provides commands
//! for database initialization, change-aware document syncing, and
//! database statistics.
//!
//! ## Usage
//!
//! ```bash
//! docmill --config ./config/docmill.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docmill init` | Create the SQLite database and run schema migrations |
//! | `docmill sync` | Scan the document tree and ingest new/changed files |
//! | `docmill stats` | Print database totals and recent errors |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! docmill init --config ./config/docmill.toml
//!
//! # Ingest, skipping unchanged files
//! docmill sync --config ./config/docmill.toml
//!
//! # Reprocess everything regardless of fingerprints
//! docmill sync --full
//!
//! # Preview without writing
//! docmill sync --dry-run
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docmill::{config, db, migrate, pipeline, stats};

/// Docmill — a change-aware document ingestion and chunking pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docmill.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docmill",
    about = "Docmill — a change-aware document ingestion and chunking pipeline",
    version,
    long_about = "Docmill scans a directory tree of office/legal documents, fingerprints \
    each file, extracts plain text, detects chapter structure, chunks the text, and persists \
    chunks plus structural metadata to SQLite — skipping files that have not changed since \
    the previous run."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docmill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chapters, chunks, processing_logs). Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Scan the document tree and ingest new or changed files.
    ///
    /// Fingerprints every file under the configured root, skips files whose
    /// content and modification time are unchanged, and extracts, chunks,
    /// and stores the rest. Interruptible with Ctrl-C between files.
    Sync {
        /// Reprocess every file regardless of stored fingerprints.
        #[arg(long)]
        full: bool,

        /// Show what would change without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print database totals, chunk size distribution, and recent errors.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays parseable for scripts.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Sync {
            full,
            dry_run,
            limit,
        } => {
            pipeline::run_sync(&cfg, full, dry_run, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
