//! Outcome events: the append-only source of truth.
//!
//! An event is an immutable observation about a belief in a context. Strength
//! values are never stored on the event; they are folded from the log (and
//! cached on context entries for read performance).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, belief::BeliefId, context::ContextKey};

pub type EventId = Uuid;

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
  Success,
  Failure,
  Neutral,
}

impl Outcome {
  /// The signed direction of the strength delta.
  pub fn sign(self) -> f64 {
    match self {
      Self::Success => 1.0,
      Self::Failure => -1.0,
      Self::Neutral => 0.0,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Success => "success",
      Self::Failure => "failure",
      Self::Neutral => "neutral",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    match value {
      "success" => Some(Self::Success),
      "failure" => Some(Self::Failure),
      "neutral" => Some(Self::Neutral),
      _ => None,
    }
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A persisted outcome event. Never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub event_id:        EventId,
  /// Store-assigned arrival order; strictly increasing across the log.
  pub seq:             u64,
  pub belief_id:       BeliefId,
  /// The context the outcome was observed in.
  pub context_key:     ContextKey,
  /// The context entry that absorbed the observation: the observed key once
  /// admitted, otherwise its nearest existing ancestor.
  pub attributed_key:  ContextKey,
  pub outcome:         Outcome,
  pub severity:        f64,
  pub moral_dimension: Option<String>,
  /// Events recorded together share a batch id.
  pub batch_id:        Option<Uuid>,
  /// Peak/end weight the event was folded with; 1.0 outside batches.
  pub salience:        f64,
  pub occurred_at:     DateTime<Utc>,
  /// Server-assigned; never changes after creation.
  pub recorded_at:     DateTime<Utc>,
}

impl Event {
  /// `true` if the event was observed in, or attributed to, `key`.
  pub fn touches(&self, key: &ContextKey) -> bool {
    &self.context_key == key || &self.attributed_key == key
  }
}

/// An event ready for the store; `seq` and `recorded_at` are assigned on
/// append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
  pub event_id:        EventId,
  pub belief_id:       BeliefId,
  pub context_key:     ContextKey,
  pub attributed_key:  ContextKey,
  pub outcome:         Outcome,
  pub severity:        f64,
  pub moral_dimension: Option<String>,
  pub batch_id:        Option<Uuid>,
  pub salience:        f64,
  pub occurred_at:     DateTime<Utc>,
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// An outcome report from a caller, before attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOutcome {
  pub outcome:         Outcome,
  pub severity:        f64,
  #[serde(default)]
  pub moral_dimension: Option<String>,
  /// When the outcome happened; defaults to the time of recording.
  #[serde(default)]
  pub occurred_at:     Option<DateTime<Utc>>,
}

impl NewOutcome {
  pub fn new(outcome: Outcome, severity: f64) -> Self {
    Self { outcome, severity, moral_dimension: None, occurred_at: None }
  }

  pub fn success(severity: f64) -> Self { Self::new(Outcome::Success, severity) }

  pub fn failure(severity: f64) -> Self { Self::new(Outcome::Failure, severity) }

  pub fn with_moral_dimension(mut self, tag: impl Into<String>) -> Self {
    self.moral_dimension = Some(tag.into());
    self
  }

  pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
    self.occurred_at = Some(occurred_at);
    self
  }

  /// Reject malformed input before it can reach the log.
  pub fn validate(&self) -> Result<()> {
    validate_severity(self.severity)?;
    if let Some(tag) = &self.moral_dimension
      && tag.trim().is_empty()
    {
      return Err(Error::Validation(
        "moral_dimension must be non-empty when present".to_owned(),
      ));
    }
    Ok(())
  }
}

pub fn validate_severity(severity: f64) -> Result<()> {
  if !severity.is_finite() || !(0.0..=1.0).contains(&severity) {
    return Err(Error::Validation(format!(
      "severity must be in [0.0, 1.0], got {severity}"
    )));
  }
  Ok(())
}

impl EventRecord {
  pub fn validate(&self) -> Result<()> {
    validate_severity(self.severity)?;
    if let Some(tag) = &self.moral_dimension
      && tag.trim().is_empty()
    {
      return Err(Error::Validation(
        "moral_dimension must be non-empty when present".to_owned(),
      ));
    }
    if !self.salience.is_finite() || self.salience < 1.0 {
      return Err(Error::Validation(format!(
        "salience must be at least 1.0, got {}",
        self.salience
      )));
    }
    if !self.attributed_key.generalizes(&self.context_key) {
      return Err(Error::Validation(format!(
        "attributed key {} does not generalize {}",
        self.attributed_key, self.context_key
      )));
    }
    Ok(())
  }
}
