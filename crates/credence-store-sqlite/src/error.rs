//! Error type for `credence-store-sqlite`.

use credence_core::belief::BeliefId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value no domain type maps to.
  #[error("unrecognised {column} value: {value:?}")]
  Decode { column: &'static str, value: String },

  /// The database was written by an incompatible version of the schema.
  #[error("unsupported schema version {found} (expected {expected})")]
  SchemaVersion { found: i64, expected: i64 },

  #[error("support edge {0} -> {1} already exists")]
  DuplicateEdge(BeliefId, BeliefId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
