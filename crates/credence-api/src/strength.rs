//! Read endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/beliefs/:id/strength` | Optional `?context=`; 404 if unknown or out of circulation |
//! | `GET`  | `/beliefs/:id/history` | `?as_of=` required; intrinsic strength rebuilt from the log |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use credence_core::{
  belief::BeliefId,
  engine::BeliefEngine,
  query::{HistoricalStrength, StrengthReport},
  store::BeliefStore,
};
use serde::Deserialize;

use crate::{context_or_global, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct StrengthParams {
  pub context: Option<String>,
}

/// `GET /beliefs/:id/strength[?context=acme,q1,*,*]`
pub async fn current<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
  Query(params): Query<StrengthParams>,
) -> Result<Json<StrengthReport>, ApiError> {
  let key = context_or_global(&engine, params.context.as_deref());
  let report = engine
    .query_strength(&id, &key)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("belief {id} is not in circulation")))?;
  Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub context: Option<String>,
  pub as_of:   DateTime<Utc>,
}

/// `GET /beliefs/:id/history?as_of=<rfc3339>[&context=...]`
pub async fn as_of<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Path(id): Path<BeliefId>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<HistoricalStrength>, ApiError> {
  let key = context_or_global(&engine, params.context.as_deref());
  let past = engine
    .strength_as_of(&id, &key, params.as_of)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("belief {id} had no entry at {}", params.as_of))
    })?;
  Ok(Json(past))
}
