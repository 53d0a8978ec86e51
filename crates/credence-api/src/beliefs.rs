//! Handlers for `/beliefs` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/beliefs` | Optional `?in_circulation=true` |
//! | `POST` | `/beliefs` | Body: [`NewBelief`]; returns 201 |
//! | `GET`  | `/beliefs/:id` | 404 if not found |
//! | `GET`  | `/beliefs/:id/audit` | Entries, events and edges |
//! | `POST` | `/beliefs/:id/archive` | 409 if already out of circulation |
//! | `POST` | `/beliefs/:id/supersede` | Body: [`NewBelief`] for the replacement |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use credence_core::{
  belief::{Belief, BeliefId, NewBelief},
  engine::BeliefEngine,
  query::{AuditTrail, Supersession},
  store::BeliefStore,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// If `true`, omit archived and superseded beliefs. Default `false`.
  #[serde(default)]
  pub in_circulation: bool,
}

/// `GET /beliefs[?in_circulation=true]`
pub async fn list<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Belief>>, ApiError> {
  Ok(Json(engine.list_beliefs(params.in_circulation).await?))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /beliefs`: body `{"statement":"...","category":"contextual"}`
pub async fn create<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Json(body): Json<NewBelief>,
) -> Result<impl IntoResponse, ApiError> {
  let belief = engine.create_belief(body).await?;
  Ok((StatusCode::CREATED, Json(belief)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /beliefs/:id`
pub async fn get_one<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
) -> Result<Json<Belief>, ApiError> {
  let belief = engine
    .get_belief(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("belief {id} not found")))?;
  Ok(Json(belief))
}

/// `GET /beliefs/:id/audit`
pub async fn audit<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
) -> Result<Json<AuditTrail>, ApiError> {
  let trail = engine
    .audit(&id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("belief {id} not found")))?;
  Ok(Json(trail))
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// `POST /beliefs/:id/archive`
pub async fn archive<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
) -> Result<Json<Belief>, ApiError> {
  Ok(Json(engine.archive_belief(&id).await?))
}

/// `POST /beliefs/:id/supersede`: body is the replacement belief.
pub async fn supersede<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
  Json(body): Json<NewBelief>,
) -> Result<impl IntoResponse, ApiError> {
  let supersession: Supersession = engine.supersede_belief(&id, body).await?;
  Ok((StatusCode::CREATED, Json(supersession)))
}
