//! Beliefs: weighted propositions the engine holds with varying strength.
//!
//! A belief carries identity and classification only. It deliberately has no
//! temporal fields: every piece of mutable state (strength, counts,
//! timestamps) lives on a [`ContextEntry`](crate::context::ContextEntry), so
//! two contexts of one belief can never contaminate each other.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque, stable belief identifier.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BeliefId(String);

impl BeliefId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  /// A fresh random identifier.
  pub fn generate() -> Self { Self(Uuid::new_v4().hyphenated().to_string()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for BeliefId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for BeliefId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for BeliefId {
  fn from(s: String) -> Self { Self(s) }
}

// ─── Category ────────────────────────────────────────────────────────────────

/// The fixed category enumeration. A category selects the invalidation
/// threshold and the moral sensitivity applied to outcome updates.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BeliefCategory {
  Aesthetic,
  Contextual,
  Relational,
  Ethical,
}

impl BeliefCategory {
  pub const ALL: [Self; 4] =
    [Self::Aesthetic, Self::Contextual, Self::Relational, Self::Ethical];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Aesthetic => "aesthetic",
      Self::Contextual => "contextual",
      Self::Relational => "relational",
      Self::Ethical => "ethical",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    match value {
      "aesthetic" => Some(Self::Aesthetic),
      "contextual" => Some(Self::Contextual),
      "relational" => Some(Self::Relational),
      "ethical" => Some(Self::Ethical),
      _ => None,
    }
  }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Beliefs are never deleted; they leave circulation through a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BeliefStatus {
  Active,
  Archived,
  Superseded {
    /// The belief that replaced this one.
    by: BeliefId,
  },
  Invalidated,
}

impl BeliefStatus {
  /// Archived and superseded beliefs take no part in propagation or
  /// resolution. Invalidated beliefs still do; callers see the flag.
  pub fn in_circulation(&self) -> bool {
    matches!(self, Self::Active | Self::Invalidated)
  }
}

// ─── Belief ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
  pub belief_id: BeliefId,
  /// The natural-language proposition.
  pub statement: String,
  pub category:  BeliefCategory,
  /// Free-form activity domain, e.g. `"accounts_payable"`. Drives the
  /// interference term of read-time decay.
  pub domain:    Option<String>,
  pub status:    BeliefStatus,
}

/// Input to [`crate::engine::BeliefEngine::create_belief`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBelief {
  /// Caller-chosen identifier; a random one is generated when absent.
  #[serde(default)]
  pub belief_id:        Option<BeliefId>,
  pub statement:        String,
  pub category:         BeliefCategory,
  #[serde(default)]
  pub domain:           Option<String>,
  /// Starting strength of the global default entry. Falls back to the
  /// configured default when absent.
  #[serde(default)]
  pub initial_strength: Option<f64>,
}

impl NewBelief {
  pub fn new(statement: impl Into<String>, category: BeliefCategory) -> Self {
    Self {
      belief_id: None,
      statement: statement.into(),
      category,
      domain: None,
      initial_strength: None,
    }
  }

  pub fn with_id(mut self, id: impl Into<BeliefId>) -> Self {
    self.belief_id = Some(id.into());
    self
  }

  pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
    self.domain = Some(domain.into());
    self
  }

  pub fn with_initial_strength(mut self, strength: f64) -> Self {
    self.initial_strength = Some(strength);
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.statement.trim().is_empty() {
      return Err(Error::Validation("statement must not be empty".to_owned()));
    }
    if let Some(id) = &self.belief_id
      && id.as_str().trim().is_empty()
    {
      return Err(Error::Validation("belief_id must not be empty".to_owned()));
    }
    if let Some(strength) = self.initial_strength
      && (!strength.is_finite() || !(0.0..=1.0).contains(&strength))
    {
      return Err(Error::Validation(format!(
        "initial_strength must be in [0.0, 1.0], got {strength}"
      )));
    }
    Ok(())
  }
}
