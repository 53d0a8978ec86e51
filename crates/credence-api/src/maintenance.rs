//! Maintenance endpoints: context pruning and cache rebuilds.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::Utc;
use credence_core::{
  engine::BeliefEngine,
  query::{PruneSummary, RebuildSummary},
  store::BeliefStore,
};
use serde::Deserialize;

use crate::error::ApiError;

/// `POST /maintenance/prune`
pub async fn prune<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
) -> Result<Json<PruneSummary>, ApiError> {
  Ok(Json(engine.prune(Utc::now()).await?))
}

#[derive(Debug, Deserialize)]
pub struct RebuildParams {
  /// Rewrite drifted entries instead of only reporting them.
  #[serde(default)]
  pub repair: bool,
}

/// `POST /maintenance/rebuild[?repair=true]`
pub async fn rebuild<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Query(params): Query<RebuildParams>,
) -> Result<Json<RebuildSummary>, ApiError> {
  Ok(Json(engine.rebuild_all(params.repair).await?))
}
