//! Error types for `credence-core`.

use thiserror::Error;

use crate::{belief::BeliefId, context::ContextKey, query::RecordedOutcome};

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input, rejected before any state change.
  #[error("validation error: {0}")]
  Validation(String),

  /// The edge would close a path back to its own source.
  #[error("support edge {source_id} -> {target_id} would create a cycle")]
  Cycle {
    source_id: BeliefId,
    target_id: BeliefId,
  },

  #[error("belief not found: {0}")]
  BeliefNotFound(BeliefId),

  #[error("belief {0} is not active")]
  BeliefInactive(BeliefId),

  #[error("no context entry for belief {belief_id} at {context_key}")]
  EntryNotFound {
    belief_id:   BeliefId,
    context_key: ContextKey,
  },

  /// Optimistic-lock retries on a context entry were exhausted.
  #[error("concurrent writers on belief {belief_id} at {context_key}")]
  Contention {
    belief_id:   BeliefId,
    context_key: ContextKey,
  },

  /// A batch stopped part way. The outcomes in `recorded` were written and
  /// must not be submitted again.
  #[error("batch stopped after {} recorded outcomes: {source}", .recorded.len())]
  PartialBatch {
    recorded: Vec<RecordedOutcome>,
    source:   Box<Error>,
  },

  #[error("configuration error: {0}")]
  Configuration(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
