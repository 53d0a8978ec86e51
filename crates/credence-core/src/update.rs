//! Outcome folding: how one event moves a context entry's strength.
//!
//! ```text
//! multiplier = α × moral × salience
//! moral      = 1 + (m − 1) × sensitivity     m ∈ {1, confirmation, violation}
//! strength'  = clip(strength + sign × multiplier × severity)
//! ```
//!
//! The same [`UpdateRules::apply`] drives live writes and [`UpdateRules::replay`],
//! so replaying an entry's events reproduces its cached strength exactly.

use chrono::{DateTime, Utc};

use crate::{
  belief::BeliefCategory,
  config::{CategoryPolicy, EngineConfig, UpdateConfig},
  context::ContextEntry,
  event::{Event, EventRecord, Outcome},
};

/// The parts of an event that drive a fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
  pub outcome:     Outcome,
  pub severity:    f64,
  /// Whether the event carries a moral dimension.
  pub tagged:      bool,
  pub salience:    f64,
  pub occurred_at: DateTime<Utc>,
}

impl From<&Event> for Observation {
  fn from(event: &Event) -> Self {
    Self {
      outcome:     event.outcome,
      severity:    event.severity,
      tagged:      event.moral_dimension.is_some(),
      salience:    event.salience,
      occurred_at: event.occurred_at,
    }
  }
}

impl From<&EventRecord> for Observation {
  fn from(record: &EventRecord) -> Self {
    Self {
      outcome:     record.outcome,
      severity:    record.severity,
      tagged:      record.moral_dimension.is_some(),
      salience:    record.salience,
      occurred_at: record.occurred_at,
    }
  }
}

/// The update parameters that apply to one belief.
#[derive(Debug, Clone, Copy)]
pub struct UpdateRules<'a> {
  pub update: &'a UpdateConfig,
  pub policy: CategoryPolicy,
}

impl<'a> UpdateRules<'a> {
  pub fn for_category(config: &'a EngineConfig, category: BeliefCategory) -> Self {
    Self {
      update: &config.update,
      policy: config.categories.policy(category),
    }
  }

  /// The moral multiplier, linearly scaled by the category's sensitivity.
  /// Untagged outcomes and neutral outcomes are not amplified.
  pub fn moral_multiplier(&self, outcome: Outcome, tagged: bool) -> f64 {
    if !tagged {
      return 1.0;
    }
    let raw = match outcome {
      Outcome::Success => self.update.moral_confirmation,
      Outcome::Failure => self.update.moral_violation,
      Outcome::Neutral => 1.0,
    };
    1.0 + (raw - 1.0) * self.policy.moral_sensitivity
  }

  /// `α × moral × salience`.
  pub fn learning_multiplier(
    &self,
    outcome: Outcome,
    tagged: bool,
    salience: f64,
  ) -> f64 {
    self.update.alpha * self.moral_multiplier(outcome, tagged) * salience
  }

  /// Fold one observation into `entry`, returning the signed change in
  /// strength.
  ///
  /// Touches only the fields of this one entry.
  pub fn apply(&self, entry: &mut ContextEntry, seen: Observation) -> f64 {
    let before = entry.strength;
    let multiplier =
      self.learning_multiplier(seen.outcome, seen.tagged, seen.salience);
    entry.strength = (entry.strength
      + seen.outcome.sign() * multiplier * seen.severity)
      .clamp(0.0, 1.0);

    count(entry, seen.outcome);
    entry.last_outcome = Some(seen.outcome);
    entry.last_updated = entry.last_updated.max(seen.occurred_at);

    entry.strength - before
  }

  /// Rebuild `entry` from its seed and the events touching its key.
  ///
  /// Observations made in this exact context before it was admitted (that
  /// is, before the first event attributed to it) only contribute counts.
  /// Attributed events are folded in arrival order. Status and version are
  /// carried over unchanged.
  pub fn replay(&self, entry: &ContextEntry, events: &[Event]) -> ContextEntry {
    let mut rebuilt = ContextEntry::seeded(
      entry.belief_id.clone(),
      entry.context_key.clone(),
      entry.seed_strength,
      entry.admitted_at,
    );
    rebuilt.status = entry.status;
    rebuilt.version = entry.version;

    let mut ordered: Vec<&Event> = events
      .iter()
      .filter(|e| e.belief_id == entry.belief_id && e.touches(&entry.context_key))
      .collect();
    ordered.sort_by_key(|e| e.seq);

    let mut admitted = false;
    for event in ordered {
      if event.attributed_key == entry.context_key {
        admitted = true;
        self.apply(&mut rebuilt, Observation::from(event));
      } else if !admitted {
        count(&mut rebuilt, event.outcome);
      }
    }

    rebuilt
  }
}

pub(crate) fn count(entry: &mut ContextEntry, outcome: Outcome) {
  match outcome {
    Outcome::Success => entry.success_count += 1,
    Outcome::Failure => entry.failure_count += 1,
    Outcome::Neutral => entry.neutral_count += 1,
  }
}

// ─── Peak/end salience ───────────────────────────────────────────────────────

/// Salience for each member of a batch, in arrival order.
///
/// The highest-severity event (the first, on ties) is the peak; the last one
/// is the end. Bonuses add: an event that is both gets
/// `1 + (peak − 1) + (end − 1)`. Batches of fewer than two events carry no
/// salience.
pub fn batch_salience(config: &UpdateConfig, severities: &[f64]) -> Vec<f64> {
  if severities.len() < 2 {
    return vec![1.0; severities.len()];
  }

  let peak = severities
    .iter()
    .enumerate()
    .fold(0, |best, (i, s)| if *s > severities[best] { i } else { best });
  let end = severities.len() - 1;

  (0..severities.len())
    .map(|i| {
      let mut weight = 1.0;
      if i == peak {
        weight += config.peak_salience - 1.0;
      }
      if i == end {
        weight += config.end_salience - 1.0;
      }
      weight
    })
    .collect()
}
