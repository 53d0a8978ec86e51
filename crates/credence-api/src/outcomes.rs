//! Handlers for outcome writes and the event log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/beliefs/:id/outcomes` | Body: [`RecordBody`]; returns 201 + [`RecordedOutcome`] |
//! | `POST` | `/beliefs/:id/outcomes/batch` | Body: [`BatchBody`] |
//! | `GET`  | `/beliefs/:id/events` | Optional `context`, `as_of` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use credence_core::{
  belief::BeliefId,
  context::ContextKey,
  engine::BeliefEngine,
  event::{Event, NewOutcome},
  query::RecordedOutcome,
  store::BeliefStore,
};
use serde::Deserialize;

use crate::{context_or_global, error::ApiError};

// ─── Record ──────────────────────────────────────────────────────────────────

/// One observed outcome and the context it was observed in.
#[derive(Debug, Deserialize)]
pub struct RecordBody {
  /// Comma-separated context key, e.g. `"acme,2024-q1,*,*"`. Defaults to
  /// the global key.
  pub context: Option<String>,
  #[serde(flatten)]
  pub outcome: NewOutcome,
}

/// `POST /beliefs/:id/outcomes`
pub async fn record<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
  Json(body): Json<RecordBody>,
) -> Result<impl IntoResponse, ApiError> {
  let key = context_or_global(&engine, body.context.as_deref());
  let recorded = engine.record_outcome(&id, &key, body.outcome).await?;
  Ok((StatusCode::CREATED, Json(recorded)))
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
  pub context:  Option<String>,
  pub outcomes: Vec<NewOutcome>,
}

/// `POST /beliefs/:id/outcomes/batch`
pub async fn record_batch<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
  Json(body): Json<BatchBody>,
) -> Result<(StatusCode, Json<Vec<RecordedOutcome>>), ApiError> {
  let key = context_or_global(&engine, body.context.as_deref());
  let recorded = engine.record_batch(&id, &key, body.outcomes).await?;
  Ok((StatusCode::CREATED, Json(recorded)))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Only events observed in or attributed to this key.
  pub context: Option<String>,
  /// Only events that occurred at or before this instant.
  pub as_of:   Option<DateTime<Utc>>,
}

/// `GET /beliefs/:id/events[?context=...][&as_of=...]`
pub async fn list<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Event>>, ApiError> {
  let key = params.context.as_deref().map(ContextKey::parse);
  Ok(Json(engine.events_for(&id, key.as_ref(), params.as_of).await?))
}
