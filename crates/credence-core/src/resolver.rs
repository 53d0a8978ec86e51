//! Context resolution, admission and pruning.
//!
//! All functions here are pure: they operate on the entries of a single
//! belief as loaded from the store. Archived entries are never resolved.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  config::{AdmissionConfig, ResolutionStrategy},
  context::{ContextEntry, ContextKey, accuracy},
};

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Select the entry that answers a query for `key`.
///
/// An exact match wins. Otherwise the strategy picks a generalization; the
/// global default is the last resort. `None` means the belief has no live
/// entries at all and the caller should seek guidance.
pub fn resolve<'a>(
  strategy: ResolutionStrategy,
  entries: &'a [ContextEntry],
  key: &ContextKey,
) -> Option<&'a ContextEntry> {
  pick(strategy, entries, key, |candidate| candidate.generalizes(key))
}

/// The nearest live entry strictly more general than `key`. This is the
/// entry that absorbs observations for a not-yet-admitted context, and the
/// parent used for admission and pruning comparisons.
pub fn nearest_ancestor<'a>(
  strategy: ResolutionStrategy,
  entries: &'a [ContextEntry],
  key: &ContextKey,
) -> Option<&'a ContextEntry> {
  pick(strategy, entries, key, |candidate| {
    candidate.strictly_generalizes(key)
  })
}

fn pick<'a>(
  strategy: ResolutionStrategy,
  entries: &'a [ContextEntry],
  key: &ContextKey,
  admissible: impl Fn(&ContextKey) -> bool,
) -> Option<&'a ContextEntry> {
  let live = entries
    .iter()
    .filter(|e| e.status.is_resolvable() && admissible(&e.context_key));

  match strategy {
    ResolutionStrategy::Ladder => {
      let live: Vec<&ContextEntry> = live.collect();
      key
        .backoff_ladder()
        .into_iter()
        .find_map(|rung| live.iter().copied().find(|e| e.context_key == rung))
        .or_else(|| {
          live.iter().copied().find(|e| e.context_key.is_global())
        })
    }
    ResolutionStrategy::Lattice => live.max_by(|a, b| lattice_order(a, b)),
  }
}

/// Higher specificity first, then more recent, then the smaller key.
fn lattice_order(a: &ContextEntry, b: &ContextEntry) -> Ordering {
  a.context_key
    .specificity()
    .cmp(&b.context_key.specificity())
    .then_with(|| a.last_updated.cmp(&b.last_updated))
    .then_with(|| b.context_key.cmp(&a.context_key))
}

// ─── Admission ───────────────────────────────────────────────────────────────

/// Decide whether a candidate context has earned its own entry.
///
/// Requires `min_observations` decisive observations, and either no
/// measurable parent or an accuracy that differs from the parent's by at
/// least the improvement threshold.
pub fn should_create_context(
  config: &AdmissionConfig,
  candidate_success_count: u64,
  candidate_failure_count: u64,
  parent: Option<&ContextEntry>,
) -> bool {
  if candidate_success_count + candidate_failure_count
    < config.min_observations
  {
    return false;
  }

  let Some(candidate) =
    accuracy(candidate_success_count, candidate_failure_count)
  else {
    return false;
  };

  match parent.and_then(ContextEntry::accuracy) {
    None => true,
    Some(parent) => {
      (candidate - parent).abs() >= config.improvement_threshold
    }
  }
}

// ─── Pruning ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneReason {
  Stale,
  TooFewObservations,
  Converged,
}

/// Why `entry` should be archived, if at all. The global default and
/// already-archived entries are never prunable.
pub fn prune_reason(
  config: &AdmissionConfig,
  entry: &ContextEntry,
  parent: Option<&ContextEntry>,
  now: DateTime<Utc>,
) -> Option<PruneReason> {
  if entry.context_key.is_global() || !entry.status.is_resolvable() {
    return None;
  }

  if now - entry.last_updated > Duration::days(config.prune_stale_days) {
    return Some(PruneReason::Stale);
  }

  if entry.observations() < config.min_observations {
    return Some(PruneReason::TooFewObservations);
  }

  let converged = match (entry.accuracy(), parent.and_then(ContextEntry::accuracy))
  {
    (Some(own), Some(parent)) => {
      (own - parent).abs() < config.convergence_epsilon
    }
    _ => false,
  };
  converged.then_some(PruneReason::Converged)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::{belief::BeliefId, context::EntryStatus};

  fn t(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
  }

  fn entry(key: &str, day: u32) -> ContextEntry {
    ContextEntry::seeded(BeliefId::from("b"), ContextKey::parse(key), 0.5, t(day))
  }

  fn counted(key: &str, successes: u64, failures: u64) -> ContextEntry {
    let mut e = entry(key, 1);
    e.success_count = successes;
    e.failure_count = failures;
    e
  }

  #[test]
  fn exact_match_wins() {
    let entries = vec![entry("*,*,*,*", 1), entry("a,b,c,d", 1)];
    let key = ContextKey::parse("a,b,c,d");
    for strategy in [ResolutionStrategy::Ladder, ResolutionStrategy::Lattice] {
      let found = resolve(strategy, &entries, &key).unwrap();
      assert_eq!(found.context_key, key);
    }
  }

  #[test]
  fn ancestor_two_levels_up_beats_global_default() {
    let entries = vec![entry("*,*,*,*", 1), entry("a,b,*,*", 1)];
    let key = ContextKey::parse("a,b,c,d");
    for strategy in [ResolutionStrategy::Ladder, ResolutionStrategy::Lattice] {
      let found = resolve(strategy, &entries, &key).unwrap();
      assert_eq!(found.context_key, ContextKey::parse("a,b,*,*"));
    }
  }

  #[test]
  fn ladder_ignores_off_ladder_generalizations() {
    let entries = vec![entry("*,*,*,*", 1), entry("*,b,*,*", 1)];
    let key = ContextKey::parse("a,b,c,d");
    let ladder = resolve(ResolutionStrategy::Ladder, &entries, &key).unwrap();
    assert!(ladder.context_key.is_global());
    let lattice = resolve(ResolutionStrategy::Lattice, &entries, &key).unwrap();
    assert_eq!(lattice.context_key, ContextKey::parse("*,b,*,*"));
  }

  #[test]
  fn lattice_ties_break_by_recency() {
    let entries =
      vec![entry("*,*,*,*", 1), entry("a,*,*,*", 2), entry("*,b,*,*", 5)];
    let key = ContextKey::parse("a,b,c,d");
    let found = resolve(ResolutionStrategy::Lattice, &entries, &key).unwrap();
    assert_eq!(found.context_key, ContextKey::parse("*,b,*,*"));
  }

  #[test]
  fn archived_entries_are_skipped() {
    let mut archived = entry("a,b,*,*", 1);
    archived.status = EntryStatus::Archived;
    let entries = vec![entry("*,*,*,*", 1), archived];
    let key = ContextKey::parse("a,b,c,d");
    let found = resolve(ResolutionStrategy::Lattice, &entries, &key).unwrap();
    assert!(found.context_key.is_global());
  }

  #[test]
  fn no_entries_resolves_to_none() {
    let key = ContextKey::parse("a,b,c,d");
    assert!(resolve(ResolutionStrategy::Lattice, &[], &key).is_none());
  }

  #[test]
  fn resolution_is_idempotent() {
    let entries =
      vec![entry("*,*,*,*", 1), entry("a,*,*,*", 3), entry("*,b,*,*", 3)];
    let key = ContextKey::parse("a,b,c,d");
    let first = resolve(ResolutionStrategy::Lattice, &entries, &key).cloned();
    let second = resolve(ResolutionStrategy::Lattice, &entries, &key).cloned();
    assert_eq!(first, second);
  }

  #[test]
  fn nearest_ancestor_excludes_self() {
    let entries = vec![entry("*,*,*,*", 1), entry("a,b,c,d", 1)];
    let key = ContextKey::parse("a,b,c,d");
    let parent =
      nearest_ancestor(ResolutionStrategy::Lattice, &entries, &key).unwrap();
    assert!(parent.context_key.is_global());
  }

  #[test]
  fn admission_needs_min_observations() {
    let config = AdmissionConfig::default();
    let parent = counted("*,*,*,*", 0, 10);
    assert!(!should_create_context(&config, 4, 0, Some(&parent)));
    assert!(should_create_context(&config, 5, 0, Some(&parent)));
  }

  #[test]
  fn admission_needs_measurable_improvement() {
    let config = AdmissionConfig::default();
    // Parent accuracy 0.75; candidate 4/5 = 0.80 is too close.
    let parent = counted("*,*,*,*", 30, 10);
    assert!(!should_create_context(&config, 4, 1, Some(&parent)));
    // Candidate 3/5 = 0.60 differs by 0.15.
    assert!(should_create_context(&config, 3, 2, Some(&parent)));
  }

  #[test]
  fn admission_without_parent() {
    let config = AdmissionConfig::default();
    assert!(should_create_context(&config, 5, 0, None));
  }

  #[test]
  fn pruning_reasons() {
    let config = AdmissionConfig::default();
    let parent = counted("*,*,*,*", 8, 2);

    let mut stale = counted("a,*,*,*", 9, 1);
    stale.last_updated = t(1);
    assert_eq!(
      prune_reason(&config, &stale, Some(&parent), t(1) + Duration::days(91)),
      Some(PruneReason::Stale)
    );

    let converged = counted("a,*,*,*", 8, 2);
    assert_eq!(
      prune_reason(&config, &converged, Some(&parent), t(2)),
      Some(PruneReason::Converged)
    );

    let thin = counted("a,*,*,*", 2, 1);
    assert_eq!(
      prune_reason(&config, &thin, Some(&parent), t(2)),
      Some(PruneReason::TooFewObservations)
    );

    let distinct = counted("a,*,*,*", 2, 8);
    assert_eq!(prune_reason(&config, &distinct, Some(&parent), t(2)), None);

    let global = counted("*,*,*,*", 0, 0);
    assert_eq!(prune_reason(&config, &global, None, t(28)), None);
  }
}
