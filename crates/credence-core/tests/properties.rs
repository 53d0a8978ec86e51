//! Property tests over the pure algorithms: acyclicity, strength bounds,
//! replay round-trips and idempotent resolution.

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use credence_core::{
  belief::{BeliefCategory, BeliefId},
  config::{EngineConfig, ResolutionStrategy},
  context::{ContextEntry, ContextKey},
  decay::DecayInputs,
  edge::{SupportEdge, SupportGraph},
  event::{Event, Outcome},
  propagation::{Snapshot, effective_strength},
  resolver::resolve,
  update::{Observation, UpdateRules},
};

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() }

fn node(i: usize) -> BeliefId { BeliefId::new(format!("n{i}")) }

fn edge(source: usize, target: usize, weight: f64) -> SupportEdge {
  SupportEdge {
    source: node(source),
    target: node(target),
    weight,
    created_at: t0(),
  }
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
  prop_oneof![
    Just(Outcome::Success),
    Just(Outcome::Failure),
    Just(Outcome::Neutral),
  ]
}

fn category_strategy() -> impl Strategy<Value = BeliefCategory> {
  prop::sample::select(BeliefCategory::ALL.to_vec())
}

/// (outcome, severity, moral, salience, hours after the previous event)
type Step = (Outcome, f64, bool, f64, i64);

fn steps_strategy() -> impl Strategy<Value = Vec<Step>> {
  prop::collection::vec(
    (
      outcome_strategy(),
      0.0_f64..=1.0,
      any::<bool>(),
      prop::sample::select(vec![1.0, 1.5, 2.0, 2.5]),
      0_i64..72,
    ),
    0..40,
  )
}

fn events_from(steps: &[Step], key: &ContextKey) -> Vec<Event> {
  let mut at = t0();
  steps
    .iter()
    .enumerate()
    .map(|(i, &(outcome, severity, moral, salience, gap))| {
      at += Duration::hours(gap);
      Event {
        event_id: Uuid::new_v4(),
        seq: i as u64 + 1,
        belief_id: node(0),
        context_key: key.clone(),
        attributed_key: key.clone(),
        outcome,
        severity,
        moral_dimension: moral.then(|| "care".to_owned()),
        batch_id: None,
        salience,
        occurred_at: at,
        recorded_at: at,
      }
    })
    .collect()
}

proptest! {
  #[test]
  fn support_graph_stays_acyclic(
    edges in prop::collection::vec((0_usize..12, 0_usize..12, 0.0_f64..=1.0), 0..60)
  ) {
    let mut graph = SupportGraph::new();
    for &(s, t, w) in &edges {
      let _ = graph.insert(&edge(s, t, w));
    }
    for i in 0..12 {
      prop_assert!(!graph.descendants(&node(i)).contains(&node(i)));
    }
  }

  #[test]
  fn folded_strength_stays_in_bounds(
    start in 0.0_f64..=1.0,
    category in category_strategy(),
    steps in steps_strategy(),
  ) {
    let config = EngineConfig::default();
    let rules = UpdateRules::for_category(&config, category);
    let key = ContextKey::global(4);
    let mut entry = ContextEntry::seeded(node(0), key.clone(), start, t0());
    for event in events_from(&steps, &key) {
      rules.apply(&mut entry, Observation::from(&event));
      prop_assert!((0.0..=1.0).contains(&entry.strength));
    }
  }

  #[test]
  fn replay_round_trips(
    start in 0.0_f64..=1.0,
    category in category_strategy(),
    steps in steps_strategy(),
  ) {
    let config = EngineConfig::default();
    let rules = UpdateRules::for_category(&config, category);
    let key = ContextKey::global(4);
    let seed = ContextEntry::seeded(node(0), key.clone(), start, t0());

    let events = events_from(&steps, &key);
    let mut live = seed.clone();
    for event in &events {
      rules.apply(&mut live, Observation::from(event));
    }

    prop_assert_eq!(rules.replay(&seed, &events), live);
  }

  #[test]
  fn effective_strength_stays_in_bounds(
    edges in prop::collection::vec((0_usize..10, 0_usize..10, 0.0_f64..=1.0), 0..40),
    intrinsic in prop::collection::vec(0.0_f64..=1.0, 10),
  ) {
    let mut graph = SupportGraph::new();
    for &(s, t, w) in &edges {
      let _ = graph.insert(&edge(s, t, w));
    }
    let view = Snapshot {
      graph: &graph,
      intrinsic: intrinsic.iter().enumerate().map(|(i, v)| (node(i), *v)).collect(),
    };
    let mut memo = HashMap::new();
    for (i, own) in intrinsic.iter().enumerate() {
      let value = effective_strength(&node(i), &view, &mut memo);
      prop_assert!((0.0..=1.0).contains(&value));
      prop_assert!(value >= *own);
    }
  }

  #[test]
  fn decay_factor_stays_in_bounds(
    days in 0.0_f64..100_000.0,
    same in 0_u64..100_000,
    related in 0_u64..100_000,
  ) {
    let config = EngineConfig::default();
    let inputs = DecayInputs { days_unused: days, same_domain: same, related_domain: related };
    let factor = inputs.factor(&config.decay);
    prop_assert!((config.decay.floor..=1.0).contains(&factor));
  }

  #[test]
  fn resolution_is_idempotent(
    keys in prop::collection::vec(prop::collection::vec(prop::sample::select(vec!["a", "b", "*"]), 3), 0..12),
    query in prop::collection::vec(prop::sample::select(vec!["a", "b"]), 3),
    lattice in any::<bool>(),
  ) {
    let strategy = if lattice { ResolutionStrategy::Lattice } else { ResolutionStrategy::Ladder };
    let mut entries = vec![ContextEntry::seeded(node(0), ContextKey::global(3), 0.5, t0())];
    for (i, values) in keys.iter().enumerate() {
      let key = ContextKey::new(values.iter().copied());
      if entries.iter().all(|e| e.context_key != key) {
        entries.push(ContextEntry::seeded(node(0), key, 0.5, t0() + Duration::hours(i as i64)));
      }
    }
    let query = ContextKey::new(query);

    let first = resolve(strategy, &entries, &query).cloned();
    let second = resolve(strategy, &entries, &query).cloned();
    prop_assert!(first.is_some());
    prop_assert_eq!(&first, &second);
    let chosen = first.map(|e| e.context_key);
    prop_assert!(chosen.is_some_and(|k| k.generalizes(&query)));
  }
}
