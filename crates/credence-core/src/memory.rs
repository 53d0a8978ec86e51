//! [`MemoryStore`], an in-process [`BeliefStore`].
//!
//! Context entries are sharded per (belief, key) in a [`DashMap`], so writers
//! on different contexts never touch the same shard lock. Event sequence
//! numbers come from a single atomic counter.

use std::{
  collections::HashMap,
  sync::{
    PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
  },
};

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;

use crate::{
  belief::{Belief, BeliefId, BeliefStatus},
  context::{ContextEntry, ContextKey},
  edge::SupportEdge,
  event::{Event, EventRecord},
  store::{BeliefStore, DomainActivity},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("support edge {0} -> {1} already exists")]
  DuplicateEdge(BeliefId, BeliefId),
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  beliefs: DashMap<BeliefId, Belief>,
  entries: DashMap<(BeliefId, ContextKey), ContextEntry>,
  events:  DashMap<BeliefId, Vec<Event>>,
  edges:   RwLock<Vec<SupportEdge>>,
  seq:     AtomicU64,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Total number of events across all beliefs.
  pub fn event_count(&self) -> usize {
    self.events.iter().map(|log| log.value().len()).sum()
  }
}

impl BeliefStore for MemoryStore {
  type Error = MemoryError;

  // ── Beliefs ───────────────────────────────────────────────────────────────

  async fn create_belief(
    &self,
    belief: Belief,
    global: ContextEntry,
  ) -> Result<bool, MemoryError> {
    Ok(match self.beliefs.entry(belief.belief_id.clone()) {
      Entry::Occupied(_) => false,
      Entry::Vacant(slot) => {
        // Holding the slot keeps a concurrent duplicate out until both land.
        let key = (global.belief_id.clone(), global.context_key.clone());
        self.entries.insert(key, global);
        slot.insert(belief);
        true
      }
    })
  }

  async fn get_belief(&self, id: &BeliefId) -> Result<Option<Belief>, MemoryError> {
    Ok(self.beliefs.get(id).map(|b| b.clone()))
  }

  async fn list_beliefs(
    &self,
    in_circulation_only: bool,
  ) -> Result<Vec<Belief>, MemoryError> {
    let mut beliefs: Vec<Belief> = self
      .beliefs
      .iter()
      .filter(|b| !in_circulation_only || b.status.in_circulation())
      .map(|b| b.clone())
      .collect();
    beliefs.sort_by(|a, b| a.belief_id.cmp(&b.belief_id));
    Ok(beliefs)
  }

  async fn set_belief_status(
    &self,
    id: &BeliefId,
    status: BeliefStatus,
  ) -> Result<bool, MemoryError> {
    Ok(match self.beliefs.get_mut(id) {
      Some(mut belief) => {
        belief.status = status;
        true
      }
      None => false,
    })
  }

  // ── Events ────────────────────────────────────────────────────────────────

  async fn append_event(&self, record: EventRecord) -> Result<Event, MemoryError> {
    let mut log = self.events.entry(record.belief_id.clone()).or_default();
    // Taken under the shard lock so one belief's log stays in seq order.
    let seq = self.seq.fetch_add(1, Ordering::AcqRel) + 1;
    let event = Event {
      event_id: record.event_id,
      seq,
      belief_id: record.belief_id,
      context_key: record.context_key,
      attributed_key: record.attributed_key,
      outcome: record.outcome,
      severity: record.severity,
      moral_dimension: record.moral_dimension,
      batch_id: record.batch_id,
      salience: record.salience,
      occurred_at: record.occurred_at,
      recorded_at: Utc::now(),
    };
    log.push(event.clone());
    Ok(event)
  }

  async fn events_for(
    &self,
    belief_id: &BeliefId,
    context: Option<&ContextKey>,
    as_of: Option<DateTime<Utc>>,
  ) -> Result<Vec<Event>, MemoryError> {
    let Some(log) = self.events.get(belief_id) else {
      return Ok(Vec::new());
    };
    let mut events: Vec<Event> = log
      .iter()
      .filter(|e| context.is_none_or(|key| e.touches(key)))
      .filter(|e| as_of.is_none_or(|at| e.occurred_at <= at))
      .cloned()
      .collect();
    events.sort_by(|a, b| {
      a.occurred_at.cmp(&b.occurred_at).then_with(|| a.seq.cmp(&b.seq))
    });
    Ok(events)
  }

  async fn domain_activity_since(
    &self,
    since: DateTime<Utc>,
    exclude: &BeliefId,
  ) -> Result<DomainActivity, MemoryError> {
    let mut counts: HashMap<Option<String>, u64> = HashMap::new();
    for log in self.events.iter() {
      if log.key() == exclude {
        continue;
      }
      let recent =
        log.value().iter().filter(|e| e.occurred_at > since).count() as u64;
      if recent == 0 {
        continue;
      }
      let domain = self.beliefs.get(log.key()).and_then(|b| b.domain.clone());
      *counts.entry(domain).or_default() += recent;
    }
    Ok(counts.into_iter().collect())
  }

  // ── Context entries ───────────────────────────────────────────────────────

  async fn entries_for(
    &self,
    belief_id: &BeliefId,
  ) -> Result<Vec<ContextEntry>, MemoryError> {
    let mut entries: Vec<ContextEntry> = self
      .entries
      .iter()
      .filter(|e| &e.key().0 == belief_id)
      .map(|e| e.value().clone())
      .collect();
    entries.sort_by(|a, b| a.context_key.cmp(&b.context_key));
    Ok(entries)
  }

  async fn get_entry(
    &self,
    belief_id: &BeliefId,
    context_key: &ContextKey,
  ) -> Result<Option<ContextEntry>, MemoryError> {
    Ok(
      self
        .entries
        .get(&(belief_id.clone(), context_key.clone()))
        .map(|e| e.clone()),
    )
  }

  async fn insert_entry(&self, entry: ContextEntry) -> Result<bool, MemoryError> {
    let key = (entry.belief_id.clone(), entry.context_key.clone());
    Ok(match self.entries.entry(key) {
      Entry::Occupied(_) => false,
      Entry::Vacant(slot) => {
        slot.insert(entry);
        true
      }
    })
  }

  async fn compare_and_swap_entry(
    &self,
    mut entry: ContextEntry,
    expected_version: u64,
  ) -> Result<bool, MemoryError> {
    let key = (entry.belief_id.clone(), entry.context_key.clone());
    let Some(mut stored) = self.entries.get_mut(&key) else {
      return Ok(false);
    };
    if stored.version != expected_version {
      return Ok(false);
    }
    entry.version = expected_version + 1;
    *stored = entry;
    Ok(true)
  }

  // ── Edges ─────────────────────────────────────────────────────────────────

  async fn support_edges(&self) -> Result<Vec<SupportEdge>, MemoryError> {
    Ok(self.edges.read().unwrap_or_else(PoisonError::into_inner).clone())
  }

  async fn insert_edge(&self, edge: SupportEdge) -> Result<(), MemoryError> {
    let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
    if edges
      .iter()
      .any(|e| e.source == edge.source && e.target == edge.target)
    {
      return Err(MemoryError::DuplicateEdge(edge.source, edge.target));
    }
    edges.push(edge);
    Ok(())
  }
}
