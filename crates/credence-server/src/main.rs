//! credence server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and serves the JSON API over HTTP. The `prune` and `rebuild`
//! subcommands run one maintenance pass against the same store and exit.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use credence_core::engine::BeliefEngine;
use credence_server::{ServerConfig, expand_tilde};
use credence_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Belief graph server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Archive stale, thin, and redundant contexts, then exit.
  Prune,
  /// Replay every context entry against the event log and report drift.
  Rebuild {
    /// Rewrite drifted entries from the log.
    #[arg(long)]
    repair: bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = ServerConfig::load(&cli.config)?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let engine = BeliefEngine::open(store, server_cfg.engine.clone())
    .await
    .context("failed to start belief engine")?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => {
      let app = credence_server::router(Arc::new(engine));
      let address = server_cfg.address();

      tracing::info!("Listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

      axum::serve(listener, app).await.context("server error")?;
    }
    Command::Prune => {
      let summary = engine
        .prune(Utc::now())
        .await
        .context("prune failed")?;
      println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Command::Rebuild { repair } => {
      let summary = engine
        .rebuild_all(repair)
        .await
        .context("rebuild failed")?;
      if !summary.drifted.is_empty() && !repair {
        tracing::warn!(drifted = summary.drifted.len(), "entries disagree with the log");
      }
      println!("{}", serde_json::to_string_pretty(&summary)?);
    }
  }

  Ok(())
}
