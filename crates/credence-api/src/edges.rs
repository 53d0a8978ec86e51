//! Handler for `POST /edges`.
//!
//! Body: `{"source":"a","target":"b","weight":0.4}`. Without `weight` the
//! engine's installed estimator suggests one. A cycle is a 409.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use credence_core::{
  belief::BeliefId,
  edge::SupportEdge,
  engine::BeliefEngine,
  store::BeliefStore,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct EdgeBody {
  pub source: BeliefId,
  pub target: BeliefId,
  pub weight: Option<f64>,
}

/// `POST /edges`
pub async fn create<S: BeliefStore>(
  State(engine): State<Arc<BeliefEngine<S>>>,
  Json(body): Json<EdgeBody>,
) -> Result<(StatusCode, Json<SupportEdge>), ApiError> {
  let edge = match body.weight {
    Some(weight) => {
      engine
        .create_support_edge(&body.source, &body.target, weight)
        .await?
    }
    None => {
      engine
        .create_estimated_support_edge(&body.source, &body.target)
        .await?
    }
  };
  Ok((StatusCode::CREATED, Json(edge)))
}
