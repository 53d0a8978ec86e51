//! Query results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  belief::BeliefId,
  context::{ContextKey, EntryStatus},
  event::EventId,
  resolver::PruneReason,
};

/// Non-fatal conditions attached to a query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryWarning {
  /// A write cascade ran while this value was being computed; it may not
  /// reflect that write.
  StaleRead,
  /// The resolved entry is invalidated; seek guidance before acting on it.
  Invalidated,
}

/// The answer to [`BeliefEngine::query_strength`](crate::engine::BeliefEngine::query_strength).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthReport {
  pub belief_id:            BeliefId,
  /// Decayed intrinsic strength plus support from ancestors, in `[0, 1]`.
  pub effective_strength:   f64,
  /// Decayed intrinsic strength of the resolved entry.
  pub intrinsic_strength:   f64,
  pub confidence:           f64,
  pub resolved_context_key: ContextKey,
  pub entry_status:         EntryStatus,
  /// Events attributed to the resolved entry, oldest first.
  pub provenance:           Vec<EventId>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub warnings:             Vec<QueryWarning>,
}

/// `n / (n + k) × decay`: grows with evidence, shrinks with disuse.
pub fn confidence(observations: u64, min_observations: u64, decay_factor: f64) -> f64 {
  let n = observations as f64;
  let k = min_observations.max(1) as f64;
  (n / (n + k) * decay_factor).clamp(0.0, 1.0)
}

/// Intrinsic strength reconstructed from the log at a past instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalStrength {
  pub belief_id:            BeliefId,
  pub as_of:                DateTime<Utc>,
  pub resolved_context_key: ContextKey,
  pub intrinsic_strength:   f64,
  pub observations:         u64,
}

/// Result of a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedOutcome {
  pub event_id:           EventId,
  /// The entry the observation was folded into.
  pub applied_key:        ContextKey,
  /// Intrinsic strength of that entry after the update.
  pub new_strength:       f64,
  pub effective_strength: f64,
  /// `true` if the observed key was admitted as its own context by this
  /// write.
  pub admitted:           bool,
  /// `true` if the entry is invalidated after this write.
  pub invalidated:        bool,
  /// Beliefs whose cached effective strengths were dropped.
  pub affected:           Vec<BeliefId>,
}

/// One archived entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrunedEntry {
  pub belief_id:   BeliefId,
  pub context_key: ContextKey,
  pub reason:      PruneReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneSummary {
  pub pruned_count: usize,
  pub pruned:       Vec<PrunedEntry>,
}

/// An entry whose cache disagreed with its replayed log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drift {
  pub belief_id:   BeliefId,
  pub context_key: ContextKey,
  pub cached:      f64,
  pub replayed:    f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebuildSummary {
  pub entries_checked: usize,
  pub drifted:         Vec<Drift>,
}

/// A belief taken out of circulation in favour of a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supersession {
  pub superseded:  crate::belief::Belief,
  pub replacement: crate::belief::Belief,
}

/// Everything the engine knows about one belief, for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
  pub belief:       crate::belief::Belief,
  pub entries:      Vec<crate::context::ContextEntry>,
  pub events:       Vec<crate::event::Event>,
  pub supports:     Vec<(BeliefId, f64)>,
  pub supported_by: Vec<(BeliefId, f64)>,
}
