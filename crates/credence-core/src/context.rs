//! Context keys and the per-context mutable state of a belief.
//!
//! A [`ContextKey`] is an ordered tuple of dimension values. The wildcard
//! [`WILDCARD`] in a position generalizes that dimension, so the keys of one
//! belief form a generalization lattice whose bottom is the all-wildcard
//! global default.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{belief::BeliefId, event::Outcome};

/// The generalization sentinel.
pub const WILDCARD: &str = "*";

// ─── ContextKey ──────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContextKey(Vec<String>);

impl ContextKey {
  pub fn new<I, S>(values: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self(values.into_iter().map(Into::into).collect())
  }

  /// The all-wildcard key of the given arity.
  pub fn global(arity: usize) -> Self {
    Self(vec![WILDCARD.to_owned(); arity])
  }

  /// Parse a comma-separated key such as `"acme,2024-q1,*,*"`.
  pub fn parse(s: &str) -> Self {
    Self(s.split(',').map(|v| v.trim().to_owned()).collect())
  }

  pub fn values(&self) -> &[String] { &self.0 }

  pub fn arity(&self) -> usize { self.0.len() }

  pub fn is_global(&self) -> bool { self.0.iter().all(|v| v == WILDCARD) }

  /// Number of concrete (non-wildcard) dimensions.
  pub fn specificity(&self) -> usize {
    self.0.iter().filter(|v| v.as_str() != WILDCARD).count()
  }

  /// `true` if `self` equals `other` or is a generalization of it, i.e. every
  /// dimension of `self` is either the wildcard or the same value.
  pub fn generalizes(&self, other: &ContextKey) -> bool {
    self.arity() == other.arity()
      && self
        .0
        .iter()
        .zip(&other.0)
        .all(|(mine, theirs)| mine == WILDCARD || mine == theirs)
  }

  /// `true` if `self` generalizes `other` and is not equal to it.
  pub fn strictly_generalizes(&self, other: &ContextKey) -> bool {
    self != other && self.generalizes(other)
  }

  fn with_wildcard_at(&self, index: usize) -> Self {
    let mut values = self.0.clone();
    values[index] = WILDCARD.to_owned();
    Self(values)
  }

  /// The deterministic back-off ladder: starting from `self`, replace the
  /// last concrete dimension with the wildcard, one step at a time, ending
  /// at the global default. The first element is `self`.
  pub fn backoff_ladder(&self) -> Vec<ContextKey> {
    let mut ladder = vec![self.clone()];
    let mut current = self.clone();
    for index in (0..self.arity()).rev() {
      if current.0[index] != WILDCARD {
        current = current.with_wildcard_at(index);
        ladder.push(current.clone());
      }
    }
    ladder
  }
}

impl fmt::Display for ContextKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({})", self.0.join(","))
  }
}

// ─── ContextEntry ────────────────────────────────────────────────────────────

/// Status flag of a context entry. Nothing is ever deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
  Active,
  /// Effective strength fell below the category threshold; guidance should
  /// be sought before relying on the belief in this context.
  Invalidated,
  /// Pruned by maintenance. Excluded from resolution, kept for audit.
  Archived,
}

impl EntryStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Invalidated => "invalidated",
      Self::Archived => "archived",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    match value {
      "active" => Some(Self::Active),
      "invalidated" => Some(Self::Invalidated),
      "archived" => Some(Self::Archived),
      _ => None,
    }
  }

  pub fn is_resolvable(self) -> bool { !matches!(self, Self::Archived) }
}

/// The mutable state of one (belief, context key) pair.
///
/// `last_updated` and `last_outcome` belong to this entry alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
  pub belief_id:     BeliefId,
  pub context_key:   ContextKey,
  /// Cached intrinsic strength in `[0, 1]`; rebuildable from the event log.
  pub strength:      f64,
  pub success_count: u64,
  pub failure_count: u64,
  pub neutral_count: u64,
  pub last_updated:  DateTime<Utc>,
  pub last_outcome:  Option<Outcome>,
  pub status:        EntryStatus,
  /// Optimistic-lock counter, bumped on every successful write.
  pub version:       u64,
  /// Strength the entry started from when it was created or admitted.
  pub seed_strength: f64,
  pub admitted_at:   DateTime<Utc>,
}

impl ContextEntry {
  /// A fresh entry seeded at `strength`.
  pub fn seeded(
    belief_id: BeliefId,
    context_key: ContextKey,
    strength: f64,
    at: DateTime<Utc>,
  ) -> Self {
    Self {
      belief_id,
      context_key,
      strength,
      success_count: 0,
      failure_count: 0,
      neutral_count: 0,
      last_updated: at,
      last_outcome: None,
      status: EntryStatus::Active,
      version: 0,
      seed_strength: strength,
      admitted_at: at,
    }
  }

  /// Successes plus failures; neutral outcomes carry no accuracy signal.
  pub fn observations(&self) -> u64 { self.success_count + self.failure_count }

  /// Observed success ratio, or `None` with no decisive observations.
  pub fn accuracy(&self) -> Option<f64> {
    accuracy(self.success_count, self.failure_count)
  }
}

/// `successes / (successes + failures)`, `None` when both are zero.
pub fn accuracy(successes: u64, failures: u64) -> Option<f64> {
  let total = successes + failures;
  (total > 0).then(|| successes as f64 / total as f64)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(s: &str) -> ContextKey { ContextKey::parse(s) }

  #[test]
  fn ladder_drops_last_concrete_dimension_first() {
    let ladder = key("acme,q1,large,rent").backoff_ladder();
    assert_eq!(ladder, vec![
      key("acme,q1,large,rent"),
      key("acme,q1,large,*"),
      key("acme,q1,*,*"),
      key("acme,*,*,*"),
      key("*,*,*,*"),
    ]);
  }

  #[test]
  fn ladder_skips_existing_wildcards() {
    let ladder = key("acme,*,large,*").backoff_ladder();
    assert_eq!(ladder, vec![
      key("acme,*,large,*"),
      key("acme,*,*,*"),
      key("*,*,*,*"),
    ]);
  }

  #[test]
  fn generalizes_requires_same_arity() {
    assert!(key("*,*").generalizes(&key("a,b")));
    assert!(!key("*,*").generalizes(&key("a,b,c")));
    assert!(!key("a,*").generalizes(&key("b,c")));
    assert!(!key("a,b").strictly_generalizes(&key("a,b")));
  }

  #[test]
  fn accuracy_ignores_empty_counts() {
    assert_eq!(accuracy(0, 0), None);
    assert_eq!(accuracy(3, 1), Some(0.75));
  }
}
