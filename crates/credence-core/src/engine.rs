//! [`BeliefEngine`], the entry point for every read and write.
//!
//! Write path: validate, attribute the observation (exact entry, admission
//! of a new context, or the nearest live ancestor), fold it, compare-and-swap
//! the entry, append the event, then cascade cache invalidation down the
//! SUPPORTS graph.
//!
//! Read path: resolve the context, decay the entry's strength, propagate
//! support from ancestors, report.
//!
//! Locking: a write holds an async lock on the observed key for its whole
//! duration and, when the observation is absorbed by an ancestor, on that
//! ancestor too. Locks are always taken from the more specific key to the
//! more general one. Holding them across the swap and the append keeps each
//! entry's fold order identical to its events' `seq` order, which is what
//! makes replay exact.

use std::{
  collections::{BTreeSet, HashMap},
  sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
  time::Duration,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
  Error, Result,
  belief::{Belief, BeliefId, BeliefStatus, NewBelief},
  classify::{MoralClassifier, SupportWeightEstimator},
  config::EngineConfig,
  context::{ContextEntry, ContextKey, EntryStatus},
  decay::{DecayInputs, DomainRelatedness, rested_strength},
  edge::{SupportEdge, SupportGraph},
  event::{Event, EventRecord, NewOutcome, Outcome},
  propagation::{PropagationCache, Snapshot, effective_strength},
  query::{
    AuditTrail, Drift, HistoricalStrength, PruneSummary, PrunedEntry,
    QueryWarning, RebuildSummary, RecordedOutcome, StrengthReport,
    Supersession, confidence,
  },
  resolver::{nearest_ancestor, prune_reason, resolve, should_create_context},
  store::BeliefStore,
  update::{Observation, UpdateRules, batch_salience, count},
};

type EntryLocks = DashMap<(BeliefId, ContextKey), Arc<Mutex<()>>>;

/// One entry's write lock. The map slot is dropped once no other writer
/// holds or waits on it.
struct EntryGuard<'a> {
  locks: &'a EntryLocks,
  slot:  (BeliefId, ContextKey),
  guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntryGuard<'_> {
  fn drop(&mut self) {
    drop(self.guard.take());
    self
      .locks
      .remove_if(&self.slot, |_, lock| Arc::strong_count(lock) == 1);
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct BeliefEngine<S> {
  store:       S,
  config:      EngineConfig,
  /// Index over the store's edge table. Never held across an `.await`.
  graph:       RwLock<SupportGraph>,
  /// Serialises edge insertion so the cycle check and the insert are atomic.
  edge_lock:   Mutex<()>,
  entry_locks: EntryLocks,
  cache:       PropagationCache,
  classifier:  Option<Box<dyn MoralClassifier>>,
  estimator:   Option<Box<dyn SupportWeightEstimator>>,
}

/// Where an observation will be folded.
enum Plan {
  /// Into an existing live entry, expected at this version.
  Fold(ContextEntry),
  /// Into a newly admitted entry for the observed key.
  Admit(ContextEntry),
}

impl Plan {
  fn entry(&self) -> &ContextEntry {
    match self {
      Self::Fold(entry) | Self::Admit(entry) => entry,
    }
  }
}

/// A belief's entry as resolved for a query key, with its decay factor.
struct Resolved {
  belief:    Belief,
  entry:     ContextEntry,
  factor:    f64,
  /// Decayed strength at the time of resolution, spacing bonus included.
  intrinsic: f64,
}

impl<S: BeliefStore> BeliefEngine<S> {
  /// Validate `config`, load the edge table and build the graph index.
  pub async fn open(store: S, config: EngineConfig) -> Result<Self> {
    config.validate()?;
    let edges = store.support_edges().await.map_err(Error::store)?;
    let graph = SupportGraph::from_edges(&edges)?;
    tracing::info!(
      edges = graph.edge_count(),
      dimensions = config.arity(),
      resolution = ?config.resolution,
      "belief engine ready"
    );

    Ok(Self {
      cache: PropagationCache::new(Duration::from_secs(config.cache_ttl_secs)),
      store,
      config,
      graph: RwLock::new(graph),
      edge_lock: Mutex::new(()),
      entry_locks: DashMap::new(),
      classifier: None,
      estimator: None,
    })
  }

  pub fn with_classifier(
    mut self,
    classifier: impl MoralClassifier + 'static,
  ) -> Self {
    self.classifier = Some(Box::new(classifier));
    self
  }

  pub fn with_estimator(
    mut self,
    estimator: impl SupportWeightEstimator + 'static,
  ) -> Self {
    self.estimator = Some(Box::new(estimator));
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn cache(&self) -> &PropagationCache { &self.cache }

  fn read_graph(&self) -> RwLockReadGuard<'_, SupportGraph> {
    self.graph.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn global_key(&self) -> ContextKey { ContextKey::global(self.config.arity()) }

  fn validate_key(&self, key: &ContextKey) -> Result<()> {
    if key.arity() != self.config.arity() {
      return Err(Error::Validation(format!(
        "context key {key} has {} dimensions, expected {} ({})",
        key.arity(),
        self.config.arity(),
        self.config.dimensions.join(", ")
      )));
    }
    if key.values().iter().any(|v| v.trim().is_empty()) {
      return Err(Error::Validation(format!(
        "context key {key} has an empty dimension"
      )));
    }
    Ok(())
  }

  async fn lock_entry(
    &self,
    belief_id: &BeliefId,
    key: &ContextKey,
  ) -> EntryGuard<'_> {
    let slot = (belief_id.clone(), key.clone());
    let lock = self.entry_locks.entry(slot.clone()).or_default().clone();
    EntryGuard {
      locks: &self.entry_locks,
      slot,
      guard: Some(lock.lock_owned().await),
    }
  }

  #[cfg(test)]
  pub(crate) fn entry_lock_count(&self) -> usize { self.entry_locks.len() }

  async fn require_belief(&self, id: &BeliefId) -> Result<Belief> {
    self
      .store
      .get_belief(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::BeliefNotFound(id.clone()))
  }

  async fn require_in_circulation(&self, id: &BeliefId) -> Result<Belief> {
    let belief = self.require_belief(id).await?;
    if !belief.status.in_circulation() {
      return Err(Error::BeliefInactive(id.clone()));
    }
    Ok(belief)
  }

  // ── Beliefs ───────────────────────────────────────────────────────────────

  /// Create a belief together with its global default entry.
  pub async fn create_belief(&self, input: NewBelief) -> Result<Belief> {
    input.validate()?;
    let belief_id = input.belief_id.unwrap_or_else(BeliefId::generate);
    let strength = input.initial_strength.unwrap_or(self.config.default_strength);
    let global =
      ContextEntry::seeded(belief_id.clone(), self.global_key(), strength, Utc::now());

    let belief = Belief {
      belief_id,
      statement: input.statement,
      category: input.category,
      domain: input.domain,
      status: BeliefStatus::Active,
    };
    let created = self
      .store
      .create_belief(belief.clone(), global)
      .await
      .map_err(Error::store)?;
    if !created {
      return Err(Error::Validation(format!(
        "belief {} already exists",
        belief.belief_id
      )));
    }

    tracing::info!(
      belief_id = %belief.belief_id,
      category = belief.category.as_str(),
      strength,
      "created belief"
    );
    Ok(belief)
  }

  pub async fn get_belief(&self, id: &BeliefId) -> Result<Option<Belief>> {
    self.store.get_belief(id).await.map_err(Error::store)
  }

  pub async fn list_beliefs(&self, in_circulation_only: bool) -> Result<Vec<Belief>> {
    self
      .store
      .list_beliefs(in_circulation_only)
      .await
      .map_err(Error::store)
  }

  /// Take a belief out of circulation. Its entries, events and edges stay
  /// readable; beliefs it supported lose that support.
  pub async fn archive_belief(&self, id: &BeliefId) -> Result<Belief> {
    let mut belief = self.require_in_circulation(id).await?;
    belief.status = BeliefStatus::Archived;
    self
      .store
      .set_belief_status(id, belief.status.clone())
      .await
      .map_err(Error::store)?;
    self.cascade_from(id);
    tracing::info!(belief_id = %id, "archived belief");
    Ok(belief)
  }

  /// Replace a belief with a newly created one.
  pub async fn supersede_belief(
    &self,
    id: &BeliefId,
    replacement: NewBelief,
  ) -> Result<Supersession> {
    let mut superseded = self.require_in_circulation(id).await?;
    let replacement = self.create_belief(replacement).await?;

    superseded.status = BeliefStatus::Superseded {
      by: replacement.belief_id.clone(),
    };
    self
      .store
      .set_belief_status(id, superseded.status.clone())
      .await
      .map_err(Error::store)?;
    self.cascade_from(id);
    tracing::info!(
      belief_id = %id,
      replacement = %replacement.belief_id,
      "superseded belief"
    );
    Ok(Supersession { superseded, replacement })
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Record one outcome observed for `belief_id` in context `key`.
  pub async fn record_outcome(
    &self,
    belief_id: &BeliefId,
    key: &ContextKey,
    outcome: NewOutcome,
  ) -> Result<RecordedOutcome> {
    self.validate_key(key)?;
    outcome.validate()?;
    let belief = self.require_in_circulation(belief_id).await?;
    self.record(&belief, key, outcome, None, 1.0).await
  }

  /// Record outcomes that arrived together. The most severe one (the first,
  /// on ties) and the last one carry extra weight.
  pub async fn record_batch(
    &self,
    belief_id: &BeliefId,
    key: &ContextKey,
    outcomes: Vec<NewOutcome>,
  ) -> Result<Vec<RecordedOutcome>> {
    self.validate_key(key)?;
    if outcomes.is_empty() {
      return Err(Error::Validation(
        "a batch must contain at least one outcome".to_owned(),
      ));
    }
    for outcome in &outcomes {
      outcome.validate()?;
    }
    let belief = self.require_in_circulation(belief_id).await?;

    let severities: Vec<f64> = outcomes.iter().map(|o| o.severity).collect();
    let salience = batch_salience(&self.config.update, &severities);
    let batch_id = Uuid::new_v4();

    let mut recorded = Vec::with_capacity(outcomes.len());
    for (outcome, weight) in outcomes.into_iter().zip(salience) {
      match self.record(&belief, key, outcome, Some(batch_id), weight).await {
        Ok(one) => recorded.push(one),
        Err(source) if recorded.is_empty() => return Err(source),
        Err(source) => {
          tracing::warn!(
            belief_id = %belief_id,
            context = %key,
            %batch_id,
            recorded = recorded.len(),
            error = %source,
            "batch stopped part way"
          );
          return Err(Error::PartialBatch { recorded, source: Box::new(source) });
        }
      }
    }
    tracing::info!(
      belief_id = %belief_id,
      context = %key,
      %batch_id,
      size = recorded.len(),
      "recorded batch"
    );
    Ok(recorded)
  }

  async fn record(
    &self,
    belief: &Belief,
    key: &ContextKey,
    input: NewOutcome,
    batch_id: Option<Uuid>,
    salience: f64,
  ) -> Result<RecordedOutcome> {
    let moral_dimension = input.moral_dimension.or_else(|| {
      self
        .classifier
        .as_ref()
        .and_then(|c| c.classify(belief, input.outcome, input.severity))
    });
    let occurred_at = input.occurred_at.unwrap_or_else(Utc::now);
    let mut record = EventRecord {
      event_id: Uuid::new_v4(),
      belief_id: belief.belief_id.clone(),
      context_key: key.clone(),
      attributed_key: key.clone(),
      outcome: input.outcome,
      severity: input.severity,
      moral_dimension,
      batch_id,
      salience,
      occurred_at,
    };
    record.validate()?;

    let rules = UpdateRules::for_category(&self.config, belief.category);
    let _observed = self.lock_entry(&belief.belief_id, key).await;

    for attempt in 1..=self.config.cas_retries {
      let entries = self
        .store
        .entries_for(&belief.belief_id)
        .await
        .map_err(Error::store)?;
      let plan = self.attribute(belief, key, &entries, record.outcome, occurred_at).await?;
      record.attributed_key = plan.entry().context_key.clone();

      let _ancestor = if record.attributed_key != *key {
        Some(self.lock_entry(&belief.belief_id, &record.attributed_key).await)
      } else {
        None
      };

      let mut entry = plan.entry().clone();
      let previous_status = entry.status;
      rules.apply(&mut entry, Observation::from(&record));

      let effective = self.effective_for(belief, &entry, Utc::now()).await?;
      entry.status = if effective < rules.policy.invalidation_threshold {
        EntryStatus::Invalidated
      } else {
        EntryStatus::Active
      };

      let written = match &plan {
        Plan::Fold(prior) => {
          entry.version = prior.version + 1;
          self.store.compare_and_swap_entry(entry.clone(), prior.version).await
        }
        Plan::Admit(_) => self.store.insert_entry(entry.clone()).await,
      }
      .map_err(Error::store)?;

      if !written {
        tracing::debug!(
          belief_id = %belief.belief_id,
          context = %record.attributed_key,
          attempt,
          "context entry changed during write, retrying"
        );
        continue;
      }

      let event = self
        .store
        .append_event(record.clone())
        .await
        .map_err(Error::store)?;
      let affected = self.update_belief_with_cascade(&event);

      let admitted = matches!(plan, Plan::Admit(_));
      if admitted {
        tracing::info!(
          belief_id = %belief.belief_id,
          context = %entry.context_key,
          seed = entry.seed_strength,
          "admitted context"
        );
      }
      if entry.status != previous_status {
        match entry.status {
          EntryStatus::Invalidated => tracing::warn!(
            belief_id = %belief.belief_id,
            context = %entry.context_key,
            effective,
            threshold = rules.policy.invalidation_threshold,
            "context entry invalidated"
          ),
          _ => tracing::info!(
            belief_id = %belief.belief_id,
            context = %entry.context_key,
            effective,
            "context entry recovered"
          ),
        }
        if entry.context_key.is_global() {
          self.sync_belief_status(&belief.belief_id, entry.status).await?;
        }
      }

      tracing::info!(
        belief_id = %belief.belief_id,
        event_id = %event.event_id,
        outcome = event.outcome.as_str(),
        context = %event.context_key,
        applied = %entry.context_key,
        strength = entry.strength,
        "recorded outcome"
      );

      return Ok(RecordedOutcome {
        event_id: event.event_id,
        applied_key: entry.context_key,
        new_strength: entry.strength,
        effective_strength: effective,
        admitted,
        invalidated: entry.status == EntryStatus::Invalidated,
        affected: affected.into_iter().collect(),
      });
    }

    Err(Error::Contention {
      belief_id:   belief.belief_id.clone(),
      context_key: key.clone(),
    })
  }

  /// Decide which entry absorbs an observation of `outcome` at `key`.
  async fn attribute(
    &self,
    belief: &Belief,
    key: &ContextKey,
    entries: &[ContextEntry],
    outcome: Outcome,
    occurred_at: DateTime<Utc>,
  ) -> Result<Plan> {
    let strategy = self.config.resolution;
    let parent = nearest_ancestor(strategy, entries, key);

    match entries.iter().find(|e| &e.context_key == key) {
      Some(exact) if exact.status.is_resolvable() => {
        return Ok(Plan::Fold(exact.clone()));
      }
      // Archived keys are never re-admitted.
      Some(_) => {}
      None => {
        let seed = parent.map_or(self.config.default_strength, |p| p.strength);
        let mut candidate = ContextEntry::seeded(
          belief.belief_id.clone(),
          key.clone(),
          seed,
          occurred_at,
        );
        let observed = self
          .store
          .events_for(&belief.belief_id, Some(key), None)
          .await
          .map_err(Error::store)?;
        for event in observed.iter().filter(|e| &e.context_key == key) {
          count(&mut candidate, event.outcome);
        }

        let successes =
          candidate.success_count + u64::from(outcome == Outcome::Success);
        let failures =
          candidate.failure_count + u64::from(outcome == Outcome::Failure);
        if should_create_context(&self.config.admission, successes, failures, parent)
        {
          return Ok(Plan::Admit(candidate));
        }
      }
    }

    parent.cloned().map(Plan::Fold).ok_or_else(|| Error::EntryNotFound {
      belief_id:   belief.belief_id.clone(),
      context_key: key.clone(),
    })
  }

  /// Mirror the global entry's invalidation onto the belief itself.
  async fn sync_belief_status(
    &self,
    id: &BeliefId,
    global: EntryStatus,
  ) -> Result<()> {
    let status = match global {
      EntryStatus::Invalidated => BeliefStatus::Invalidated,
      _ => BeliefStatus::Active,
    };
    let Some(current) = self.store.get_belief(id).await.map_err(Error::store)?
    else {
      return Ok(());
    };
    if current.status.in_circulation() && current.status != status {
      self
        .store
        .set_belief_status(id, status)
        .await
        .map_err(Error::store)?;
    }
    Ok(())
  }

  // ── Propagation ───────────────────────────────────────────────────────────

  /// Drop the cached effective strengths of the event's belief and of every
  /// belief reachable from it over outgoing SUPPORTS edges.
  pub fn update_belief_with_cascade(&self, event: &Event) -> BTreeSet<BeliefId> {
    let affected = self.cascade_from(&event.belief_id);
    tracing::debug!(
      event_id = %event.event_id,
      affected = affected.len(),
      "cascade after outcome"
    );
    affected
  }

  fn cascade_from(&self, id: &BeliefId) -> BTreeSet<BeliefId> {
    let mut affected = self.read_graph().descendants(id);
    affected.insert(id.clone());
    self.cache.invalidate(&affected);
    affected
  }

  async fn decay_factor(
    &self,
    belief: &Belief,
    entry: &ContextEntry,
    now: DateTime<Utc>,
  ) -> Result<f64> {
    let config = &self.config.decay;
    let mut inputs = DecayInputs::since(entry.last_updated, now);
    let activity = self
      .store
      .domain_activity_since(entry.last_updated, &belief.belief_id)
      .await
      .map_err(Error::store)?;
    for (domain, events) in activity {
      match DomainRelatedness::classify(
        config,
        belief.domain.as_deref(),
        domain.as_deref(),
      ) {
        DomainRelatedness::Same => inputs.same_domain += events,
        DomainRelatedness::Related => inputs.related_domain += events,
        DomainRelatedness::Unrelated => {}
      }
    }
    Ok(inputs.factor(config))
  }

  /// Resolve `id` at `key`. `None` if the belief is unknown, out of
  /// circulation, or has no live entry.
  async fn resolved(
    &self,
    id: &BeliefId,
    key: &ContextKey,
    now: DateTime<Utc>,
  ) -> Result<Option<Resolved>> {
    let Some(belief) = self.store.get_belief(id).await.map_err(Error::store)?
    else {
      return Ok(None);
    };
    if !belief.status.in_circulation() {
      return Ok(None);
    }
    let entries = self.store.entries_for(id).await.map_err(Error::store)?;
    let Some(entry) = resolve(self.config.resolution, &entries, key).cloned() else {
      return Ok(None);
    };
    let factor = self.decay_factor(&belief, &entry, now).await?;
    let intrinsic =
      rested_strength(&self.config.decay, entry.strength, factor, entry.last_updated, now);
    Ok(Some(Resolved { belief, entry, factor, intrinsic }))
  }

  /// Effective strength of `root`, given its own decayed intrinsic
  /// strength. Ancestors are resolved at the same `key`.
  async fn propagate(
    &self,
    root: &BeliefId,
    root_intrinsic: f64,
    key: &ContextKey,
    now: DateTime<Utc>,
  ) -> Result<f64> {
    let ancestors = self.read_graph().ancestors(root);

    let mut intrinsic = HashMap::from([(root.clone(), root_intrinsic)]);
    for id in ancestors {
      if let Some(resolved) = self.resolved(&id, key, now).await? {
        intrinsic.insert(id, resolved.intrinsic);
      }
    }

    let graph = self.read_graph();
    let view = Snapshot { graph: &*graph, intrinsic };
    Ok(effective_strength(root, &view, &mut HashMap::new()))
  }

  async fn effective_for(
    &self,
    belief: &Belief,
    entry: &ContextEntry,
    now: DateTime<Utc>,
  ) -> Result<f64> {
    let factor = self.decay_factor(belief, entry, now).await?;
    let intrinsic =
      rested_strength(&self.config.decay, entry.strength, factor, entry.last_updated, now);
    self
      .propagate(&belief.belief_id, intrinsic, &entry.context_key, now)
      .await
  }

  // ── Queries ───────────────────────────────────────────────────────────────

  /// The strength of a belief in a context. `None` if the belief is
  /// unknown, archived or superseded.
  pub async fn query_strength(
    &self,
    belief_id: &BeliefId,
    key: &ContextKey,
  ) -> Result<Option<StrengthReport>> {
    self.validate_key(key)?;
    let started = self.cache.epoch();
    let now = Utc::now();

    let Some(resolved) = self.resolved(belief_id, key, now).await? else {
      return Ok(None);
    };
    let intrinsic = resolved.intrinsic;
    let mut warnings = Vec::new();

    let effective = match self.cache.get(belief_id, key) {
      Some(hit) => hit,
      None => {
        let value = self.propagate(belief_id, intrinsic, key, now).await?;
        if !self.cache.put(belief_id, key, value, started) {
          tracing::warn!(
            belief_id = %belief_id,
            context = %key,
            "support changed while querying; value not cached"
          );
          warnings.push(QueryWarning::StaleRead);
        }
        value
      }
    };

    let resolved_key = resolved.entry.context_key.clone();
    let provenance = self
      .store
      .events_for(belief_id, Some(&resolved_key), None)
      .await
      .map_err(Error::store)?
      .into_iter()
      .filter(|e| e.attributed_key == resolved_key)
      .map(|e| e.event_id)
      .collect();

    if resolved.entry.status == EntryStatus::Invalidated {
      warnings.push(QueryWarning::Invalidated);
    }

    tracing::debug!(
      belief_id = %belief_id,
      context = %key,
      resolved = %resolved_key,
      effective,
      "resolved strength"
    );

    Ok(Some(StrengthReport {
      belief_id: resolved.belief.belief_id,
      effective_strength: effective,
      intrinsic_strength: intrinsic,
      confidence: confidence(
        resolved.entry.observations(),
        self.config.admission.min_observations,
        resolved.factor,
      ),
      resolved_context_key: resolved_key,
      entry_status: resolved.entry.status,
      provenance,
      warnings,
    }))
  }

  /// The intrinsic strength a belief had at `as_of`, rebuilt from the log.
  pub async fn strength_as_of(
    &self,
    belief_id: &BeliefId,
    key: &ContextKey,
    as_of: DateTime<Utc>,
  ) -> Result<Option<HistoricalStrength>> {
    self.validate_key(key)?;
    let Some(belief) = self.get_belief(belief_id).await? else {
      return Ok(None);
    };
    let entries = self
      .store
      .entries_for(belief_id)
      .await
      .map_err(Error::store)?;
    let events = self
      .store
      .events_for(belief_id, None, Some(as_of))
      .await
      .map_err(Error::store)?;

    let rules = UpdateRules::for_category(&self.config, belief.category);
    // Entries archived later were live then.
    let replayed: Vec<ContextEntry> = entries
      .iter()
      .filter(|e| e.admitted_at <= as_of)
      .map(|e| {
        let mut past = rules.replay(e, &events);
        past.status = EntryStatus::Active;
        past
      })
      .collect();

    Ok(resolve(self.config.resolution, &replayed, key).map(|entry| {
      HistoricalStrength {
        belief_id: belief_id.clone(),
        as_of,
        resolved_context_key: entry.context_key.clone(),
        intrinsic_strength: entry.strength,
        observations: entry.observations(),
      }
    }))
  }

  pub async fn events_for(
    &self,
    belief_id: &BeliefId,
    key: Option<&ContextKey>,
    as_of: Option<DateTime<Utc>>,
  ) -> Result<Vec<Event>> {
    if let Some(key) = key {
      self.validate_key(key)?;
    }
    self.require_belief(belief_id).await?;
    self
      .store
      .events_for(belief_id, key, as_of)
      .await
      .map_err(Error::store)
  }

  pub fn supports(&self, id: &BeliefId) -> Vec<(BeliefId, f64)> {
    self.read_graph().supports(id)
  }

  pub fn supported_by(&self, id: &BeliefId) -> Vec<(BeliefId, f64)> {
    self.read_graph().supported_by(id)
  }

  /// Everything recorded about a belief, whatever its status.
  pub async fn audit(&self, id: &BeliefId) -> Result<Option<AuditTrail>> {
    let Some(belief) = self.get_belief(id).await? else {
      return Ok(None);
    };
    let entries = self.store.entries_for(id).await.map_err(Error::store)?;
    let events = self
      .store
      .events_for(id, None, None)
      .await
      .map_err(Error::store)?;
    Ok(Some(AuditTrail {
      belief,
      entries,
      events,
      supports: self.supports(id),
      supported_by: self.supported_by(id),
    }))
  }

  // ── SUPPORTS edges ────────────────────────────────────────────────────────

  /// Add `source` SUPPORTS `target`. Fails with [`Error::Cycle`] if the edge
  /// would close a cycle; the graph is left unchanged.
  pub async fn create_support_edge(
    &self,
    source: &BeliefId,
    target: &BeliefId,
    weight: f64,
  ) -> Result<SupportEdge> {
    let edge = SupportEdge {
      source: source.clone(),
      target: target.clone(),
      weight,
      created_at: Utc::now(),
    };
    edge.validate()?;
    self.require_in_circulation(source).await?;
    self.require_in_circulation(target).await?;

    let _edges = self.edge_lock.lock().await;
    let checked = self.read_graph().check(&edge);
    if let Err(err) = checked {
      tracing::debug!(%source, %target, error = %err, "rejected support edge");
      return Err(err);
    }
    self.store.insert_edge(edge.clone()).await.map_err(Error::store)?;
    self
      .graph
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(&edge)?;

    let affected = self.cascade_from(target);
    tracing::info!(
      %source,
      %target,
      weight,
      affected = affected.len(),
      "created support edge"
    );
    Ok(edge)
  }

  /// Like [`create_support_edge`](Self::create_support_edge), with the weight
  /// taken from the installed [`SupportWeightEstimator`].
  pub async fn create_estimated_support_edge(
    &self,
    source: &BeliefId,
    target: &BeliefId,
  ) -> Result<SupportEdge> {
    let from = self.require_in_circulation(source).await?;
    let to = self.require_in_circulation(target).await?;
    let weight = match &self.estimator {
      Some(estimator) => estimator.estimate(&from, &to),
      None => {
        return Err(Error::Configuration(
          "no support weight estimator installed".to_owned(),
        ));
      }
    };
    self.create_support_edge(source, target, weight).await
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  /// Archive every context entry that is stale, thin, or no longer
  /// distinguishable from its parent.
  pub async fn prune(&self, now: DateTime<Utc>) -> Result<PruneSummary> {
    let mut summary = PruneSummary::default();

    for belief in self.list_beliefs(true).await? {
      let entries = self
        .store
        .entries_for(&belief.belief_id)
        .await
        .map_err(Error::store)?;
      let mut touched = false;

      for entry in &entries {
        let parent =
          nearest_ancestor(self.config.resolution, &entries, &entry.context_key);
        let Some(reason) = prune_reason(&self.config.admission, entry, parent, now)
        else {
          continue;
        };

        let mut archived = entry.clone();
        archived.status = EntryStatus::Archived;
        let swapped = self
          .store
          .compare_and_swap_entry(archived, entry.version)
          .await
          .map_err(Error::store)?;
        if !swapped {
          tracing::debug!(
            belief_id = %belief.belief_id,
            context = %entry.context_key,
            "entry written during prune, skipped"
          );
          continue;
        }

        tracing::info!(
          belief_id = %belief.belief_id,
          context = %entry.context_key,
          ?reason,
          "archived context entry"
        );
        touched = true;
        summary.pruned.push(PrunedEntry {
          belief_id: belief.belief_id.clone(),
          context_key: entry.context_key.clone(),
          reason,
        });
      }

      if touched {
        self.cascade_from(&belief.belief_id);
      }
    }

    self.cache.sweep_expired();
    summary.pruned_count = summary.pruned.len();
    Ok(summary)
  }

  /// Rebuild one entry's cached state from the event log.
  pub async fn rebuild_entry(
    &self,
    belief_id: &BeliefId,
    key: &ContextKey,
  ) -> Result<ContextEntry> {
    self.validate_key(key)?;
    let belief = self.require_belief(belief_id).await?;
    let rules = UpdateRules::for_category(&self.config, belief.category);
    let _guard = self.lock_entry(belief_id, key).await;

    for _ in 0..self.config.cas_retries {
      let entry = self
        .store
        .get_entry(belief_id, key)
        .await
        .map_err(Error::store)?
        .ok_or_else(|| Error::EntryNotFound {
          belief_id:   belief_id.clone(),
          context_key: key.clone(),
        })?;
      let events = self
        .store
        .events_for(belief_id, Some(key), None)
        .await
        .map_err(Error::store)?;

      let mut rebuilt = rules.replay(&entry, &events);
      if rebuilt == entry {
        return Ok(entry);
      }
      if self
        .store
        .compare_and_swap_entry(rebuilt.clone(), entry.version)
        .await
        .map_err(Error::store)?
      {
        rebuilt.version = entry.version + 1;
        self.cascade_from(belief_id);
        tracing::info!(
          belief_id = %belief_id,
          context = %key,
          cached = entry.strength,
          replayed = rebuilt.strength,
          "rebuilt context entry"
        );
        return Ok(rebuilt);
      }
    }

    Err(Error::Contention {
      belief_id:   belief_id.clone(),
      context_key: key.clone(),
    })
  }

  /// Replay every entry of every belief and report those whose cache
  /// disagrees with the log. With `repair`, drifted entries are rewritten.
  pub async fn rebuild_all(&self, repair: bool) -> Result<RebuildSummary> {
    let mut summary = RebuildSummary::default();

    for belief in self.list_beliefs(false).await? {
      let rules = UpdateRules::for_category(&self.config, belief.category);
      let entries = self
        .store
        .entries_for(&belief.belief_id)
        .await
        .map_err(Error::store)?;
      let events = self
        .store
        .events_for(&belief.belief_id, None, None)
        .await
        .map_err(Error::store)?;

      for entry in &entries {
        summary.entries_checked += 1;
        let replayed = rules.replay(entry, &events);
        if replayed == *entry {
          continue;
        }

        tracing::warn!(
          belief_id = %belief.belief_id,
          context = %entry.context_key,
          cached = entry.strength,
          replayed = replayed.strength,
          "context entry drifted from its log"
        );
        summary.drifted.push(Drift {
          belief_id:   belief.belief_id.clone(),
          context_key: entry.context_key.clone(),
          cached:      entry.strength,
          replayed:    replayed.strength,
        });
        if repair {
          self.rebuild_entry(&belief.belief_id, &entry.context_key).await?;
        }
      }
    }

    if repair && !summary.drifted.is_empty() {
      self.cache.clear();
    }
    Ok(summary)
  }
}
