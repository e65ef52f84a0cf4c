//! # Bitable Sync CLI (`bsync`)
//!
//! Mirrors Feishu Bitable records into a directory of markdown documents and
//! asks the downstream memory indexer to pick up anything new.
//!
//! ## Usage
//!
//! ```bash
//! bsync --config ./config/bsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bsync init` | Create the document directory and sync index |
//! | `bsync tables` | List configured tables and their renderers |
//! | `bsync sync` | Fetch every configured table and write new records |
//! | `bsync status` | Summarize the sync index |
//! | `bsync render <file> --table <t>` | Render saved record JSON to stdout |
//!
//! ## Examples
//!
//! ```bash
//! # Sync only the knowledge table, without rebuilding the index
//! bsync sync --table 知识库 --no-reindex
//!
//! # See what a scheduled run would write
//! bsync sync --dry-run
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `warn`, e.g. `RUST_LOG=bitable_sync=debug`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bitable_sync::config;
use bitable_sync::ingest::{self, SyncOptions};
use bitable_sync::ledger::{self, Ledger};
use bitable_sync::preview;
use bitable_sync::progress::ProgressMode;
use bitable_sync::sources;
use bitable_sync::stats;
use bitable_sync::storage::DocumentStore;

/// Bitable Sync: incremental export of Feishu Bitable records to markdown.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bsync",
    about = "Incrementally sync Feishu Bitable records into markdown documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the document directory and the sync index.
    ///
    /// Existing documents matching the adopt glob are recorded as synced.
    /// Safe to run repeatedly.
    Init,

    /// List configured tables and the renderer each one uses.
    Tables,

    /// Fetch remote records and write documents for new ones.
    ///
    /// Records whose id is already known are never rewritten. When at least
    /// one document is written the configured reindex command runs once.
    Sync {
        /// Restrict the run to these tables (id or name). Repeatable.
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Count new records without writing documents or reindexing.
        #[arg(long)]
        dry_run: bool,

        /// Skip the reindex command even if documents were written.
        #[arg(long)]
        no_reindex: bool,

        /// Progress on stderr: off, human, or json. Defaults to human on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Summarize the sync index and document directory.
    Status,

    /// Render saved record JSON with a table's renderer.
    Render {
        /// JSON file with one record object or an array of records.
        file: PathBuf,

        /// Table id or name whose renderer to use.
        #[arg(long)]
        table: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = DocumentStore::open(
                &cfg.storage.dir,
                &cfg.storage.extension,
                &cfg.storage.adopt_glob(),
            )?;
            let index_path = cfg.storage.index_path();
            let ledger = Ledger::open(&index_path).await?;
            let report = ledger::reconcile(&ledger, &store).await?;
            ledger.close().await;

            println!("init");
            println!("  documents: {}", store.dir().display());
            println!("  index: {}", index_path.display());
            println!("  adopted: {}", report.adopted);
            println!("ok");
        }
        Commands::Tables => {
            sources::list_tables(&cfg)?;
        }
        Commands::Sync {
            tables,
            dry_run,
            no_reindex,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter();
            let opts = SyncOptions {
                tables,
                dry_run,
                no_reindex,
            };
            ingest::run_sync(&cfg, &opts, reporter.as_ref()).await?;
        }
        Commands::Status => {
            stats::run_status(&cfg).await?;
        }
        Commands::Render { file, table } => {
            preview::run_render(&cfg, &file, &table)?;
        }
    }

    Ok(())
}
