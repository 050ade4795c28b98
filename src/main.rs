//! # Chat Collector CLI (`chatd`)
//!
//! The `chatd` binary hosts both halves of the system: the collection/query
//! HTTP server and the search-index sync watcher, plus small commands for
//! initialization and ad-hoc queries.
//!
//! ## Usage
//!
//! ```bash
//! chatd --config ./config/chatd.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chatd init` | Create the SQLite database and schema |
//! | `chatd serve` | Start the collection/query HTTP server |
//! | `chatd watch` | Run the search-index sync watcher |
//! | `chatd search [query]` | Search collected chats |
//! | `chatd get <id>` | Print a stored transcript body |
//!
//! `serve` and `watch` are separate processes on purpose: ingestion never
//! blocks on search-index availability, and the watcher converges on its own
//! whenever it runs.

mod collect;
mod config;
mod db;
mod error;
mod metadata;
mod migrate;
mod models;
mod query;
mod search_index;
mod server;
mod store;
mod watcher;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Chat Collector — a chat-transcript collection service with file, SQL, and
/// search-index persistence.
#[derive(Parser)]
#[command(
    name = "chatd",
    about = "Chat Collector — collect chat transcripts over HTTP and keep a search index in sync",
    version,
    long_about = "Chat Collector ingests chat transcripts over HTTP, writes each one to a \
    canonical JSON file and a queryable SQLite record, and runs a standalone watcher that \
    reconciles an external full-text search index against the on-disk document set."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/chatd.toml`. Built-in defaults apply when the
    /// file does not exist; `MEILI_URL`, `MEILI_MASTER_KEY`, `INDEX_NAME`,
    /// and `DATA_DIR` override it from the environment.
    #[arg(long, global = true, default_value = "./config/chatd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `chats` table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Start the collection/query HTTP server.
    ///
    /// Serves `POST /collect`, `GET /search`, `GET /chat/{id}`, and
    /// `GET /health` on the configured bind address.
    Serve,

    /// Run the search-index sync watcher.
    ///
    /// Watches the document store directory and reconciles the search index
    /// against it: an initial pass over existing files, then one file at a
    /// time as create/modify events arrive. Runs until interrupted.
    Watch,

    /// Search collected chats.
    Search {
        /// Substring to match against message content.
        query: Option<String>,

        /// Only chats produced by this model (exact match).
        #[arg(long)]
        model: Option<String>,

        /// Only chats with at least this many messages.
        #[arg(long)]
        min_length: Option<i64>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print a stored transcript body by id.
    Get {
        /// Document id.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Watch => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown signal received");
                    flag.store(true, Ordering::Relaxed);
                }
            });

            // The watcher is a synchronous loop; give it its own thread so
            // index calls and hashing never stall the runtime.
            let watch_cfg = cfg.clone();
            tokio::task::spawn_blocking(move || watcher::run(&watch_cfg, shutdown)).await??;
        }
        Commands::Search {
            query,
            model,
            min_length,
            limit,
        } => {
            let filters = query::SearchFilters {
                query,
                model,
                min_length,
                limit: limit.unwrap_or(query::DEFAULT_SEARCH_LIMIT),
            };
            query::run_search(&cfg, &filters).await?;
        }
        Commands::Get { id } => {
            query::run_get(&cfg, &id).await?;
        }
    }

    Ok(())
}
