//! Support propagation across the belief DAG.
//!
//! ```text
//! effective(b) = clip( intrinsic(b)
//!                    + Σ_{s → b} effective(s) × w(s, b) × (1 − intrinsic(b)) )
//! ```
//!
//! A pass memoises per belief so a shared ancestor is computed once, keeping
//! the pass O(V + E). The graph is acyclic by construction (see
//! [`SupportGraph::insert`]), so recursion always terminates.
//!
//! Across passes, [`PropagationCache`] keeps effective strengths per
//! (belief, context) and is invalidated by write cascades.

use std::{
  collections::{BTreeSet, HashMap},
  sync::atomic::{AtomicU64, Ordering},
  time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::{belief::BeliefId, context::ContextKey, edge::SupportGraph};

// ─── One pass ────────────────────────────────────────────────────────────────

/// What a propagation pass can see: intrinsic strengths of the beliefs in
/// circulation, and the incoming SUPPORTS edges of each.
pub trait SupportView {
  /// The (decayed) intrinsic strength, or `None` for beliefs that take no
  /// part in propagation (archived, superseded, or without any entry).
  fn intrinsic(&self, id: &BeliefId) -> Option<f64>;

  fn supported_by(&self, id: &BeliefId) -> Vec<(BeliefId, f64)>;
}

/// A snapshot of intrinsic strengths over a graph index.
pub struct Snapshot<'g> {
  pub graph:     &'g SupportGraph,
  pub intrinsic: HashMap<BeliefId, f64>,
}

impl SupportView for Snapshot<'_> {
  fn intrinsic(&self, id: &BeliefId) -> Option<f64> {
    self.intrinsic.get(id).copied()
  }

  fn supported_by(&self, id: &BeliefId) -> Vec<(BeliefId, f64)> {
    self.graph.supported_by(id)
  }
}

/// Effective strength of `id`, memoised in `memo` for the duration of one
/// pass. Beliefs outside circulation have effective strength zero.
pub fn effective_strength<V: SupportView>(
  id: &BeliefId,
  view: &V,
  memo: &mut HashMap<BeliefId, f64>,
) -> f64 {
  if let Some(done) = memo.get(id) {
    return *done;
  }

  let value = match view.intrinsic(id) {
    None => 0.0,
    Some(intrinsic) => {
      let headroom = 1.0 - intrinsic;
      let support: f64 = view
        .supported_by(id)
        .into_iter()
        .map(|(source, weight)| {
          effective_strength(&source, view, memo) * weight * headroom
        })
        .sum();
      (intrinsic + support).clamp(0.0, 1.0)
    }
  };

  memo.insert(id.clone(), value);
  value
}

// ─── Cross-pass cache ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Cached {
  value:       f64,
  computed_at: Instant,
}

/// Effective strengths memoised across queries, keyed by belief and the
/// context key they were queried with.
///
/// Writers bump the epoch and drop the entries of every affected belief.
/// A reader that started before a bump does not cache its result and
/// reports it as possibly stale.
#[derive(Debug)]
pub struct PropagationCache {
  entries: DashMap<(BeliefId, ContextKey), Cached>,
  epoch:   AtomicU64,
  puts:    AtomicU64,
  ttl:     Duration,
}

/// Every this many stores, expired entries are swept.
const SWEEP_EVERY: u64 = 256;

impl PropagationCache {
  pub fn new(ttl: Duration) -> Self {
    Self {
      entries: DashMap::new(),
      epoch: AtomicU64::new(0),
      puts: AtomicU64::new(0),
      ttl,
    }
  }

  pub fn epoch(&self) -> u64 { self.epoch.load(Ordering::Acquire) }

  pub fn get(&self, id: &BeliefId, key: &ContextKey) -> Option<f64> {
    let lookup = (id.clone(), key.clone());
    let cached = *self.entries.get(&lookup)?;
    if cached.computed_at.elapsed() > self.ttl {
      self.entries.remove(&lookup);
      return None;
    }
    Some(cached.value)
  }

  /// Store a value computed by a reader that began at `started_epoch`.
  /// Returns `false` (and keeps nothing) if a cascade ran in between.
  pub fn put(
    &self,
    id: &BeliefId,
    key: &ContextKey,
    value: f64,
    started_epoch: u64,
  ) -> bool {
    if self.epoch() != started_epoch {
      return false;
    }
    if self.puts.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
      self.sweep_expired();
    }

    let lookup = (id.clone(), key.clone());
    let computed_at = Instant::now();
    self.entries.insert(lookup.clone(), Cached { value, computed_at });

    // A cascade that bumped the epoch after the first check may have run
    // its retain before the insert landed.
    if self.epoch() != started_epoch {
      self
        .entries
        .remove_if(&lookup, |_, cached| cached.computed_at == computed_at);
      return false;
    }
    true
  }

  /// Drop every cached value of the given beliefs, in all contexts.
  pub fn invalidate(&self, affected: &BTreeSet<BeliefId>) {
    self.epoch.fetch_add(1, Ordering::AcqRel);
    self.entries.retain(|(id, _), _| !affected.contains(id));
  }

  pub fn clear(&self) {
    self.epoch.fetch_add(1, Ordering::AcqRel);
    self.entries.clear();
  }

  /// Drop every entry older than the TTL.
  pub fn sweep_expired(&self) {
    let ttl = self.ttl;
    self.entries.retain(|_, cached| cached.computed_at.elapsed() <= ttl);
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
