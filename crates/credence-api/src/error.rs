//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use credence_core::{Error, query::RecordedOutcome};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request conflicts with current state (a cycle, an inactive belief,
  /// exhausted write retries).
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(#[source] Error),

  /// Some outcomes of a batch were written before `source` stopped it.
  #[error("batch stopped after {} recorded outcomes: {source}", .recorded.len())]
  PartialBatch {
    recorded: Vec<RecordedOutcome>,
    source:   Box<ApiError>,
  },
}

impl From<Error> for ApiError {
  fn from(err: Error) -> Self {
    match err {
      Error::Validation(_) | Error::Configuration(_) => {
        ApiError::BadRequest(err.to_string())
      }
      Error::BeliefNotFound(_) | Error::EntryNotFound { .. } => {
        ApiError::NotFound(err.to_string())
      }
      Error::Cycle { .. } | Error::BeliefInactive(_) | Error::Contention { .. } => {
        ApiError::Conflict(err.to_string())
      }
      Error::PartialBatch { recorded, source } => ApiError::PartialBatch {
        recorded,
        source: Box::new(ApiError::from(*source)),
      },
      Error::Store(_) => ApiError::Internal(err),
    }
  }
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::PartialBatch { source, .. } => source.status(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      ApiError::NotFound(m) | ApiError::BadRequest(m) | ApiError::Conflict(m) => {
        json!({ "error": m })
      }
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        json!({ "error": e.to_string() })
      }
      ApiError::PartialBatch { recorded, source } => {
        tracing::warn!(recorded = recorded.len(), error = %source, "batch stopped part way");
        json!({ "error": source.to_string(), "recorded": recorded })
      }
    };
    (status, Json(body)).into_response()
  }
}
