//! HTTP host for the credence belief engine.
//!
//! Loads [`ServerConfig`], opens the SQLite store and mounts the JSON API
//! under `/api` with request tracing.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::{Json, Router, routing::get};
use credence_core::{config::EngineConfig, engine::BeliefEngine, store::BeliefStore};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `CREDENCE_*`
/// environment variables. Nested keys use a double underscore, e.g.
/// `CREDENCE_ENGINE__CAS_RETRIES=16`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub engine:     EngineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_owned(),
      port:       7341,
      store_path: PathBuf::from("~/.local/share/credence/beliefs.db"),
      engine:     EngineConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` (optional) layered under the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(
        config::Environment::with_prefix("CREDENCE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let server_cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    server_cfg
      .engine
      .validate()
      .context("invalid engine configuration")?;
    Ok(server_cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The full application: `/health` plus the API under `/api`.
pub fn router<S>(engine: Arc<BeliefEngine<S>>) -> Router
where
  S: BeliefStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", credence_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
  };
  use credence_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = BeliefEngine::open(store, EngineConfig::default())
      .await
      .unwrap();
    router(Arc::new(engine))
  }

  #[tokio::test]
  async fn health_is_ok() {
    let resp = app()
      .await
      .oneshot(Request::get("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_is_mounted_over_sqlite() {
    let app = app().await;
    let create = Request::post("/api/beliefs")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(
        json!({ "belief_id": "b", "statement": "b holds", "category": "ethical" })
          .to_string(),
      ))
      .unwrap();
    let resp = app.clone().oneshot(create).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
      .oneshot(Request::get("/api/beliefs/b/strength").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let report: Value = serde_json::from_slice(&bytes).unwrap();
    assert!((report["intrinsic_strength"].as_f64().unwrap() - 0.5).abs() < 1e-6);
  }

  #[test]
  fn missing_config_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/credence.toml")).unwrap();
    assert_eq!(cfg.engine, EngineConfig::default());
    assert_eq!(cfg.address(), "127.0.0.1:7341");
  }

  #[test]
  fn engine_section_overrides_defaults() {
    let path = std::env::temp_dir().join(format!("credence-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
      &path,
      "port = 9000\n\n[engine]\nresolution = \"ladder\"\ncas_retries = 3\n",
    )
    .unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.engine.resolution, credence_core::config::ResolutionStrategy::Ladder);
    assert_eq!(cfg.engine.cas_retries, 3);
    assert_eq!(cfg.engine.dimensions, EngineConfig::default().dimensions);
    std::fs::remove_file(&path).ok();
  }

  #[test]
  fn invalid_engine_config_is_rejected() {
    let path = std::env::temp_dir().join(format!("credence-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "[engine]\ncas_retries = 0\n").unwrap();
    assert!(ServerConfig::load(&path).is_err());
    std::fs::remove_file(&path).ok();
  }

  #[test]
  fn tilde_expands_to_home() {
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    }
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
