//! The `BeliefStore` trait.
//!
//! The trait is implemented by storage backends (the in-memory
//! [`MemoryStore`](crate::memory::MemoryStore) and `credence-store-sqlite`).
//! Stores persist and return data; they never compute strengths. All of the
//! arithmetic lives in the engine.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  belief::{Belief, BeliefId, BeliefStatus},
  context::{ContextEntry, ContextKey},
  edge::SupportEdge,
  event::{Event, EventRecord},
};

/// Event counts of one domain, as returned by
/// [`BeliefStore::domain_activity_since`]. Beliefs without a domain are
/// reported under `None`.
pub type DomainActivity = Vec<(Option<String>, u64)>;

/// Abstraction over a belief store backend.
///
/// Events and edges are append-only. Context entries are the only mutable
/// rows, and every write to one goes through a version check
/// ([`compare_and_swap_entry`](BeliefStore::compare_and_swap_entry)).
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait BeliefStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Beliefs ───────────────────────────────────────────────────────────

  /// Persist a new belief together with its global entry, atomically.
  /// Returns `false` (and writes nothing) if the id is already taken.
  fn create_belief(
    &self,
    belief: Belief,
    global: ContextEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_belief<'a>(
    &'a self,
    id: &'a BeliefId,
  ) -> impl Future<Output = Result<Option<Belief>, Self::Error>> + Send + 'a;

  /// All beliefs ordered by id, optionally only those in circulation.
  fn list_beliefs(
    &self,
    in_circulation_only: bool,
  ) -> impl Future<Output = Result<Vec<Belief>, Self::Error>> + Send + '_;

  /// Change a belief's lifecycle status. Returns `false` if the belief does
  /// not exist.
  fn set_belief_status<'a>(
    &'a self,
    id: &'a BeliefId,
    status: BeliefStatus,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Events: append-only ───────────────────────────────────────────────

  /// Append an event. The store assigns `seq` (strictly increasing) and
  /// `recorded_at`.
  fn append_event(
    &self,
    record: EventRecord,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Events of a belief ordered by `occurred_at`, ties by `seq`.
  ///
  /// - `context`: only events observed in or attributed to this key.
  /// - `as_of`: only events that occurred at or before this instant.
  fn events_for<'a>(
    &'a self,
    belief_id: &'a BeliefId,
    context: Option<&'a ContextKey>,
    as_of: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + 'a;

  /// Per-domain counts of events recorded on beliefs other than `exclude`
  /// that occurred after `since`.
  fn domain_activity_since<'a>(
    &'a self,
    since: DateTime<Utc>,
    exclude: &'a BeliefId,
  ) -> impl Future<Output = Result<DomainActivity, Self::Error>> + Send + 'a;

  // ── Context entries ───────────────────────────────────────────────────

  /// Every entry of a belief, archived ones included, ordered by key.
  fn entries_for<'a>(
    &'a self,
    belief_id: &'a BeliefId,
  ) -> impl Future<Output = Result<Vec<ContextEntry>, Self::Error>> + Send + 'a;

  fn get_entry<'a>(
    &'a self,
    belief_id: &'a BeliefId,
    context_key: &'a ContextKey,
  ) -> impl Future<Output = Result<Option<ContextEntry>, Self::Error>> + Send + 'a;

  /// Insert a new entry. Returns `false` (and writes nothing) if an entry
  /// for the same (belief, key) already exists.
  fn insert_entry(
    &self,
    entry: ContextEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Replace the stored entry if its version still equals
  /// `expected_version`. The stored row takes `entry`'s values with version
  /// `expected_version + 1`. Returns `false` on a version mismatch or a
  /// missing row.
  fn compare_and_swap_entry(
    &self,
    entry: ContextEntry,
    expected_version: u64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── SUPPORTS edges ────────────────────────────────────────────────────

  fn support_edges(
    &self,
  ) -> impl Future<Output = Result<Vec<SupportEdge>, Self::Error>> + Send + '_;

  /// Append an edge. Acyclicity is the engine's responsibility; the store
  /// only rejects exact duplicates.
  fn insert_edge(
    &self,
    edge: SupportEdge,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
