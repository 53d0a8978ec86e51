//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, TimeZone, Utc};
use credence_core::{
  belief::{Belief, BeliefCategory, BeliefId, BeliefStatus, NewBelief},
  config::EngineConfig,
  context::{ContextEntry, ContextKey, EntryStatus},
  edge::SupportEdge,
  engine::BeliefEngine,
  event::{EventRecord, NewOutcome, Outcome},
  store::BeliefStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> chrono::DateTime<Utc> { Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() }

fn key(s: &str) -> ContextKey { ContextKey::parse(s) }

fn belief(id: &str, domain: Option<&str>) -> Belief {
  Belief {
    belief_id: BeliefId::from(id),
    statement: format!("{id} holds"),
    category:  BeliefCategory::Contextual,
    domain:    domain.map(str::to_owned),
    status:    BeliefStatus::Active,
  }
}

fn record(id: &str, at: &ContextKey, minutes: i64) -> EventRecord {
  EventRecord {
    event_id:        Uuid::new_v4(),
    belief_id:       BeliefId::from(id),
    context_key:     at.clone(),
    attributed_key:  at.clone(),
    outcome:         Outcome::Success,
    severity:        0.5,
    moral_dimension: None,
    batch_id:        None,
    salience:        1.0,
    occurred_at:     t0() + Duration::minutes(minutes),
  }
}

/// Create `belief` with a 0.5 global entry.
async fn create(s: &SqliteStore, belief: Belief) -> Belief {
  let seed = ContextEntry::seeded(belief.belief_id.clone(), key("*,*"), 0.5, t0());
  assert!(s.create_belief(belief.clone(), seed).await.unwrap());
  belief
}

// ─── Beliefs ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_belief() {
  let s = store().await;
  let created = create(&s, belief("b1", Some("finance"))).await;

  let fetched = s.get_belief(&created.belief_id).await.unwrap();
  assert_eq!(fetched, Some(created));
  assert!(s.get_belief(&BeliefId::from("nope")).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_belief_writes_nothing() {
  let s = store().await;
  create(&s, belief("b1", None)).await;

  let mut again = belief("b1", None);
  again.statement = "something else".to_owned();
  let seed = ContextEntry::seeded(again.belief_id.clone(), key("*,*"), 0.1, t0());
  assert!(!s.create_belief(again, seed).await.unwrap());

  let stored = s.get_belief(&BeliefId::from("b1")).await.unwrap().unwrap();
  assert_eq!(stored.statement, "b1 holds");
  let global = s
    .get_entry(&stored.belief_id, &key("*,*"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(global.strength, 0.5);
}

#[tokio::test]
async fn superseded_status_round_trips_and_leaves_circulation() {
  let s = store().await;
  create(&s, belief("old", None)).await;
  create(&s, belief("new", None)).await;

  let status = BeliefStatus::Superseded { by: BeliefId::from("new") };
  assert!(s.set_belief_status(&BeliefId::from("old"), status.clone()).await.unwrap());
  assert!(!s
    .set_belief_status(&BeliefId::from("ghost"), BeliefStatus::Archived)
    .await
    .unwrap());

  let old = s.get_belief(&BeliefId::from("old")).await.unwrap().unwrap();
  assert_eq!(old.status, status);

  let all = s.list_beliefs(false).await.unwrap();
  assert_eq!(all.len(), 2);
  let live = s.list_beliefs(true).await.unwrap();
  assert_eq!(live.len(), 1);
  assert_eq!(live[0].belief_id.as_str(), "new");
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn events_come_back_in_occurrence_order() {
  let s = store().await;
  create(&s, belief("b1", None)).await;
  let at = key("acme,q1");

  let late = s.append_event(record("b1", &at, 30)).await.unwrap();
  let early = s.append_event(record("b1", &at, 10)).await.unwrap();
  assert!(early.seq > late.seq);

  let events = s.events_for(&BeliefId::from("b1"), None, None).await.unwrap();
  let ids: Vec<_> = events.iter().map(|e| e.event_id).collect();
  assert_eq!(ids, vec![early.event_id, late.event_id]);
  assert_eq!(events[0], early);
}

#[tokio::test]
async fn events_filter_by_context_and_as_of() {
  let s = store().await;
  create(&s, belief("b1", None)).await;
  let specific = key("acme,q1");
  let general = key("acme,*");

  let mut folded_up = record("b1", &specific, 0);
  folded_up.attributed_key = general.clone();
  s.append_event(folded_up).await.unwrap();
  s.append_event(record("b1", &general, 60)).await.unwrap();
  s.append_event(record("b1", &key("zeta,q2"), 120)).await.unwrap();

  let b1 = BeliefId::from("b1");
  assert_eq!(s.events_for(&b1, Some(&specific), None).await.unwrap().len(), 1);
  assert_eq!(s.events_for(&b1, Some(&general), None).await.unwrap().len(), 2);
  assert_eq!(
    s.events_for(&b1, Some(&general), Some(t0() + Duration::minutes(30)))
      .await
      .unwrap()
      .len(),
    1,
  );
  assert_eq!(
    s.events_for(&b1, None, Some(t0() + Duration::minutes(60)))
      .await
      .unwrap()
      .len(),
    2,
  );
}

#[tokio::test]
async fn domain_activity_groups_other_beliefs() {
  let s = store().await;
  create(&s, belief("self", Some("finance"))).await;
  create(&s, belief("peer", Some("finance"))).await;
  create(&s, belief("loose", None)).await;
  let at = key("*,*");

  s.append_event(record("self", &at, 10)).await.unwrap();
  s.append_event(record("peer", &at, 10)).await.unwrap();
  s.append_event(record("peer", &at, 20)).await.unwrap();
  s.append_event(record("peer", &at, -10)).await.unwrap();
  s.append_event(record("loose", &at, 10)).await.unwrap();

  let mut activity = s
    .domain_activity_since(t0(), &BeliefId::from("self"))
    .await
    .unwrap();
  activity.sort();
  assert_eq!(activity, vec![(None, 1), (Some("finance".to_owned()), 2)]);
}

// ─── Context entries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn entry_insert_is_first_writer_wins() {
  let s = store().await;
  create(&s, belief("b1", None)).await;
  let entry = ContextEntry::seeded(BeliefId::from("b1"), key("acme,q1"), 0.6, t0());

  assert!(s.insert_entry(entry.clone()).await.unwrap());
  let mut other = entry.clone();
  other.strength = 0.1;
  assert!(!s.insert_entry(other).await.unwrap());

  let stored = s
    .get_entry(&entry.belief_id, &entry.context_key)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored, entry);
}

#[tokio::test]
async fn compare_and_swap_checks_the_version() {
  let s = store().await;
  create(&s, belief("b1", None)).await;
  let entry = ContextEntry::seeded(BeliefId::from("b1"), key("acme,q1"), 0.6, t0());
  s.insert_entry(entry.clone()).await.unwrap();

  let mut next = entry.clone();
  next.strength = 0.7;
  next.success_count = 1;
  next.last_outcome = Some(Outcome::Success);
  next.status = EntryStatus::Invalidated;
  assert!(s.compare_and_swap_entry(next.clone(), 0).await.unwrap());
  // The same expected version is now stale.
  assert!(!s.compare_and_swap_entry(next.clone(), 0).await.unwrap());

  let stored = s
    .get_entry(&entry.belief_id, &entry.context_key)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.version, 1);
  assert_eq!(stored.strength, 0.7);
  assert_eq!(stored.last_outcome, Some(Outcome::Success));
  assert_eq!(stored.status, EntryStatus::Invalidated);

  let missing = ContextEntry::seeded(BeliefId::from("b1"), key("zeta,q9"), 0.5, t0());
  assert!(!s.compare_and_swap_entry(missing, 0).await.unwrap());
}

#[tokio::test]
async fn entries_are_listed_in_key_order() {
  let s = store().await;
  create(&s, belief("b1", None)).await;
  for k in ["acme,q1", "*,*", "acme,*"] {
    let entry = ContextEntry::seeded(BeliefId::from("b1"), key(k), 0.5, t0());
    s.insert_entry(entry).await.unwrap();
  }

  let keys: Vec<ContextKey> = s
    .entries_for(&BeliefId::from("b1"))
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.context_key)
    .collect();
  let mut sorted = keys.clone();
  sorted.sort();
  assert_eq!(keys, sorted);
  assert_eq!(keys.len(), 3);
}

// ─── Edges ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn edges_persist_and_reject_duplicates() {
  let s = store().await;
  create(&s, belief("a", None)).await;
  create(&s, belief("b", None)).await;
  let edge = SupportEdge {
    source:     BeliefId::from("a"),
    target:     BeliefId::from("b"),
    weight:     0.4,
    created_at: t0(),
  };

  s.insert_edge(edge.clone()).await.unwrap();
  let err = s.insert_edge(edge.clone()).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateEdge(..)));
  assert_eq!(s.support_edges().await.unwrap(), vec![edge]);
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_schema_version_is_refused() {
  let dir = std::env::temp_dir().join(format!("credence-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("beliefs.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    create(&s, belief("b1", None)).await;
  }
  // Reopening a current database is fine.
  drop(SqliteStore::open(&path).await.unwrap());

  {
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.pragma_update(None, "user_version", 99).unwrap();
  }
  let err = SqliteStore::open(&path).await.err().unwrap();
  assert!(matches!(err, Error::SchemaVersion { found: 99, expected: 1 }));

  std::fs::remove_dir_all(&dir).ok();
}

// ─── Engine over SQLite ──────────────────────────────────────────────────────

#[tokio::test]
async fn engine_survives_a_reopen() {
  let dir = std::env::temp_dir().join(format!("credence-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("beliefs.db");

  let at = key("acme,q1,*,*");
  let before = {
    let engine = BeliefEngine::open(SqliteStore::open(&path).await.unwrap(), EngineConfig::default())
      .await
      .unwrap();
    let created = engine
      .create_belief(
        NewBelief::new("vendors pay on time", BeliefCategory::Contextual)
          .with_id("vendor-pays")
          .with_initial_strength(0.7),
      )
      .await
      .unwrap();
    let support = engine
      .create_belief(NewBelief::new("acme is solvent", BeliefCategory::Contextual).with_id("solvent"))
      .await
      .unwrap();
    engine
      .create_support_edge(&support.belief_id, &created.belief_id, 0.3)
      .await
      .unwrap();
    for _ in 0..4 {
      engine
        .record_outcome(&created.belief_id, &at, NewOutcome::failure(0.5))
        .await
        .unwrap();
    }
    engine
      .query_strength(&created.belief_id, &at)
      .await
      .unwrap()
      .unwrap()
  };

  let engine = BeliefEngine::open(SqliteStore::open(&path).await.unwrap(), EngineConfig::default())
    .await
    .unwrap();
  let id = BeliefId::from("vendor-pays");
  let after = engine.query_strength(&id, &at).await.unwrap().unwrap();
  assert_eq!(after.resolved_context_key, before.resolved_context_key);
  assert!((after.intrinsic_strength - before.intrinsic_strength).abs() < 1e-6);
  assert_eq!(after.provenance, before.provenance);
  assert_eq!(engine.supported_by(&id).len(), 1);

  let rebuild = engine.rebuild_all(false).await.unwrap();
  assert!(rebuild.drifted.is_empty());

  std::fs::remove_dir_all(&dir).ok();
}
