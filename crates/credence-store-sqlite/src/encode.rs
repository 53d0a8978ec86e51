//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed nanosecond
//! fraction and a `Z` suffix, so lexical order equals time order and range
//! filters can run in SQL. Context keys are stored as compact JSON arrays.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use credence_core::{
  belief::{Belief, BeliefCategory, BeliefId, BeliefStatus},
  context::{ContextEntry, ContextKey, EntryStatus},
  edge::SupportEdge,
  event::{Event, Outcome},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_key(key: &ContextKey) -> Result<String> {
  Ok(serde_json::to_string(key)?)
}

pub fn decode_key(s: &str) -> Result<ContextKey> { Ok(serde_json::from_str(s)?) }

/// SQLite integers are signed; counters never get near the boundary.
pub fn encode_count(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

pub fn decode_count(n: i64) -> u64 { u64::try_from(n).unwrap_or(0) }

fn unrecognised(column: &'static str, value: &str) -> Error {
  Error::Decode { column, value: value.to_owned() }
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_category(s: &str) -> Result<BeliefCategory> {
  BeliefCategory::parse(s).ok_or_else(|| unrecognised("category", s))
}

pub fn decode_outcome(s: &str) -> Result<Outcome> {
  Outcome::parse(s).ok_or_else(|| unrecognised("outcome", s))
}

pub fn decode_entry_status(s: &str) -> Result<EntryStatus> {
  EntryStatus::parse(s).ok_or_else(|| unrecognised("entry status", s))
}

/// Splits a [`BeliefStatus`] into its `status` and `superseded_by` columns.
pub fn encode_belief_status(status: &BeliefStatus) -> (&'static str, Option<String>) {
  match status {
    BeliefStatus::Active => ("active", None),
    BeliefStatus::Archived => ("archived", None),
    BeliefStatus::Superseded { by } => ("superseded", Some(by.as_str().to_owned())),
    BeliefStatus::Invalidated => ("invalidated", None),
  }
}

pub fn decode_belief_status(
  status: &str,
  superseded_by: Option<String>,
) -> Result<BeliefStatus> {
  match (status, superseded_by) {
    ("active", _) => Ok(BeliefStatus::Active),
    ("archived", _) => Ok(BeliefStatus::Archived),
    ("invalidated", _) => Ok(BeliefStatus::Invalidated),
    ("superseded", Some(by)) => Ok(BeliefStatus::Superseded { by: BeliefId::new(by) }),
    (other, _) => Err(unrecognised("belief status", other)),
  }
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `beliefs` row as read from SQLite.
pub struct RawBelief {
  pub belief_id:     String,
  pub statement:     String,
  pub category:      String,
  pub domain:        Option<String>,
  pub status:        String,
  pub superseded_by: Option<String>,
}

impl RawBelief {
  pub const COLUMNS: &'static str =
    "belief_id, statement, category, domain, status, superseded_by";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      belief_id:     row.get(0)?,
      statement:     row.get(1)?,
      category:      row.get(2)?,
      domain:        row.get(3)?,
      status:        row.get(4)?,
      superseded_by: row.get(5)?,
    })
  }

  pub fn into_belief(self) -> Result<Belief> {
    Ok(Belief {
      belief_id: BeliefId::new(self.belief_id),
      statement: self.statement,
      category:  decode_category(&self.category)?,
      domain:    self.domain,
      status:    decode_belief_status(&self.status, self.superseded_by)?,
    })
  }
}

/// A `context_entries` row as read from SQLite.
pub struct RawEntry {
  pub belief_id:     String,
  pub context_key:   String,
  pub strength:      f64,
  pub success_count: i64,
  pub failure_count: i64,
  pub neutral_count: i64,
  pub last_updated:  String,
  pub last_outcome:  Option<String>,
  pub status:        String,
  pub version:       i64,
  pub seed_strength: f64,
  pub admitted_at:   String,
}

impl RawEntry {
  pub const COLUMNS: &'static str = "belief_id, context_key, strength, \
    success_count, failure_count, neutral_count, last_updated, last_outcome, \
    status, version, seed_strength, admitted_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      belief_id:     row.get(0)?,
      context_key:   row.get(1)?,
      strength:      row.get(2)?,
      success_count: row.get(3)?,
      failure_count: row.get(4)?,
      neutral_count: row.get(5)?,
      last_updated:  row.get(6)?,
      last_outcome:  row.get(7)?,
      status:        row.get(8)?,
      version:       row.get(9)?,
      seed_strength: row.get(10)?,
      admitted_at:   row.get(11)?,
    })
  }

  pub fn into_entry(self) -> Result<ContextEntry> {
    Ok(ContextEntry {
      belief_id:     BeliefId::new(self.belief_id),
      context_key:   decode_key(&self.context_key)?,
      strength:      self.strength,
      success_count: decode_count(self.success_count),
      failure_count: decode_count(self.failure_count),
      neutral_count: decode_count(self.neutral_count),
      last_updated:  decode_dt(&self.last_updated)?,
      last_outcome:  self.last_outcome.as_deref().map(decode_outcome).transpose()?,
      status:        decode_entry_status(&self.status)?,
      version:       decode_count(self.version),
      seed_strength: self.seed_strength,
      admitted_at:   decode_dt(&self.admitted_at)?,
    })
  }
}

/// An `events` row as read from SQLite.
pub struct RawEvent {
  pub seq:             i64,
  pub event_id:        String,
  pub belief_id:       String,
  pub context_key:     String,
  pub attributed_key:  String,
  pub outcome:         String,
  pub severity:        f64,
  pub moral_dimension: Option<String>,
  pub batch_id:        Option<String>,
  pub salience:        f64,
  pub occurred_at:     String,
  pub recorded_at:     String,
}

impl RawEvent {
  pub const COLUMNS: &'static str = "seq, event_id, belief_id, context_key, \
    attributed_key, outcome, severity, moral_dimension, batch_id, salience, \
    occurred_at, recorded_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      seq:             row.get(0)?,
      event_id:        row.get(1)?,
      belief_id:       row.get(2)?,
      context_key:     row.get(3)?,
      attributed_key:  row.get(4)?,
      outcome:         row.get(5)?,
      severity:        row.get(6)?,
      moral_dimension: row.get(7)?,
      batch_id:        row.get(8)?,
      salience:        row.get(9)?,
      occurred_at:     row.get(10)?,
      recorded_at:     row.get(11)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      event_id:        decode_uuid(&self.event_id)?,
      seq:             decode_count(self.seq),
      belief_id:       BeliefId::new(self.belief_id),
      context_key:     decode_key(&self.context_key)?,
      attributed_key:  decode_key(&self.attributed_key)?,
      outcome:         decode_outcome(&self.outcome)?,
      severity:        self.severity,
      moral_dimension: self.moral_dimension,
      batch_id:        self.batch_id.as_deref().map(decode_uuid).transpose()?,
      salience:        self.salience,
      occurred_at:     decode_dt(&self.occurred_at)?,
      recorded_at:     decode_dt(&self.recorded_at)?,
    })
  }
}

/// A `support_edges` row as read from SQLite.
pub struct RawEdge {
  pub source_id:  String,
  pub target_id:  String,
  pub weight:     f64,
  pub created_at: String,
}

impl RawEdge {
  pub fn into_edge(self) -> Result<SupportEdge> {
    Ok(SupportEdge {
      source:     BeliefId::new(self.source_id),
      target:     BeliefId::new(self.target_id),
      weight:     self.weight,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    let late = early + chrono::Duration::milliseconds(1500);
    assert!(encode_dt(early) < encode_dt(late));
    assert_eq!(decode_dt(&encode_dt(late)).unwrap(), late);
  }

  #[test]
  fn superseded_status_needs_a_replacement() {
    assert!(decode_belief_status("superseded", None).is_err());
    let (status, by) =
      encode_belief_status(&BeliefStatus::Superseded { by: BeliefId::new("b") });
    assert_eq!(
      decode_belief_status(status, by).unwrap(),
      BeliefStatus::Superseded { by: BeliefId::new("b") },
    );
  }
}
