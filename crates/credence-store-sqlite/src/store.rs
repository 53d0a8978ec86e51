//! [`SqliteStore`], the SQLite implementation of [`BeliefStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use credence_core::{
  belief::{Belief, BeliefId, BeliefStatus},
  context::{ContextEntry, ContextKey},
  edge::SupportEdge,
  event::{Event, EventRecord},
  store::{BeliefStore, DomainActivity},
};

use crate::{
  encode::{
    RawBelief, RawEdge, RawEntry, RawEvent, decode_count, encode_belief_status,
    encode_count, encode_dt, encode_key, encode_uuid,
  },
  schema::{SCHEMA, SCHEMA_VERSION},
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A belief store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let found: i64 = self
      .conn
      .call(|conn| Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?))
      .await?;
    if found != 0 && found != SCHEMA_VERSION {
      return Err(Error::SchemaVersion { found, expected: SCHEMA_VERSION });
    }

    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_entries(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<ContextEntry>> {
    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }
}

impl BeliefStore for SqliteStore {
  type Error = Error;

  // ── Beliefs ───────────────────────────────────────────────────────────────

  async fn create_belief(&self, belief: Belief, global: ContextEntry) -> Result<bool> {
    let (status, superseded_by) = encode_belief_status(&belief.status);
    let id = belief.belief_id.as_str().to_owned();
    let statement = belief.statement;
    let category = belief.category.as_str();
    let domain = belief.domain;
    let row = EntryRow::new(&global)?;

    Ok(
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          let n = tx.execute(
            "INSERT OR IGNORE INTO beliefs
               (belief_id, statement, category, domain, status, superseded_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id, statement, category, domain, status, superseded_by],
          )?;
          if n == 0 {
            return Ok(false);
          }
          row.insert(&tx)?;
          tx.commit()?;
          Ok(true)
        })
        .await?,
    )
  }

  async fn get_belief(&self, id: &BeliefId) -> Result<Option<Belief>> {
    let id = id.as_str().to_owned();

    let raw: Option<RawBelief> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM beliefs WHERE belief_id = ?1", RawBelief::COLUMNS),
              rusqlite::params![id],
              RawBelief::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawBelief::into_belief).transpose()
  }

  async fn list_beliefs(&self, in_circulation_only: bool) -> Result<Vec<Belief>> {
    let raws: Vec<RawBelief> = self
      .conn
      .call(move |conn| {
        let filter = if in_circulation_only {
          "WHERE status IN ('active', 'invalidated')"
        } else {
          ""
        };
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM beliefs {filter} ORDER BY belief_id",
          RawBelief::COLUMNS,
        ))?;
        let rows = stmt
          .query_map([], RawBelief::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBelief::into_belief).collect()
  }

  async fn set_belief_status(&self, id: &BeliefId, status: BeliefStatus) -> Result<bool> {
    let (status, superseded_by) = encode_belief_status(&status);
    let id = id.as_str().to_owned();

    Ok(
      self
        .conn
        .call(move |conn| {
          let n = conn.execute(
            "UPDATE beliefs SET status = ?2, superseded_by = ?3 WHERE belief_id = ?1",
            rusqlite::params![id, status, superseded_by],
          )?;
          Ok(n == 1)
        })
        .await?,
    )
  }

  // ── Events: append-only ───────────────────────────────────────────────────

  async fn append_event(&self, record: EventRecord) -> Result<Event> {
    let recorded_at = Utc::now();

    let event_id = encode_uuid(record.event_id);
    let belief_id = record.belief_id.as_str().to_owned();
    let context_key = encode_key(&record.context_key)?;
    let attributed_key = encode_key(&record.attributed_key)?;
    let outcome = record.outcome.as_str();
    let severity = record.severity;
    let moral_dimension = record.moral_dimension.clone();
    let batch_id = record.batch_id.map(encode_uuid);
    let salience = record.salience;
    let occurred_at = encode_dt(record.occurred_at);
    let recorded_str = encode_dt(recorded_at);

    let seq: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO events
             (event_id, belief_id, context_key, attributed_key, outcome,
              severity, moral_dimension, batch_id, salience, occurred_at,
              recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            event_id,
            belief_id,
            context_key,
            attributed_key,
            outcome,
            severity,
            moral_dimension,
            batch_id,
            salience,
            occurred_at,
            recorded_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Event {
      event_id:        record.event_id,
      seq:             decode_count(seq),
      belief_id:       record.belief_id,
      context_key:     record.context_key,
      attributed_key:  record.attributed_key,
      outcome:         record.outcome,
      severity:        record.severity,
      moral_dimension: record.moral_dimension,
      batch_id:        record.batch_id,
      salience:        record.salience,
      occurred_at:     record.occurred_at,
      recorded_at,
    })
  }

  async fn events_for(
    &self,
    belief_id: &BeliefId,
    context: Option<&ContextKey>,
    as_of: Option<DateTime<Utc>>,
  ) -> Result<Vec<Event>> {
    let belief_id = belief_id.as_str().to_owned();
    let context = context.map(encode_key).transpose()?;
    let as_of = as_of.map(encode_dt);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM events
           WHERE belief_id = ?1
             AND (?2 IS NULL OR context_key = ?2 OR attributed_key = ?2)
             AND (?3 IS NULL OR occurred_at <= ?3)
           ORDER BY occurred_at, seq",
          RawEvent::COLUMNS,
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![belief_id, context, as_of], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn domain_activity_since(
    &self,
    since: DateTime<Utc>,
    exclude: &BeliefId,
  ) -> Result<DomainActivity> {
    let since = encode_dt(since);
    let exclude = exclude.as_str().to_owned();

    let rows: Vec<(Option<String>, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT b.domain, COUNT(*)
           FROM events e
           JOIN beliefs b ON b.belief_id = e.belief_id
           WHERE e.occurred_at > ?1 AND e.belief_id <> ?2
           GROUP BY b.domain",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since, exclude], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(domain, n)| (domain, decode_count(n)))
        .collect(),
    )
  }

  // ── Context entries ───────────────────────────────────────────────────────

  async fn entries_for(&self, belief_id: &BeliefId) -> Result<Vec<ContextEntry>> {
    let mut entries = self
      .query_entries(
        format!(
          "SELECT {} FROM context_entries WHERE belief_id = ?1",
          RawEntry::COLUMNS,
        ),
        vec![belief_id.as_str().to_owned()],
      )
      .await?;
    // JSON text order differs from key order.
    entries.sort_by(|a, b| a.context_key.cmp(&b.context_key));
    Ok(entries)
  }

  async fn get_entry(
    &self,
    belief_id: &BeliefId,
    context_key: &ContextKey,
  ) -> Result<Option<ContextEntry>> {
    let entries = self
      .query_entries(
        format!(
          "SELECT {} FROM context_entries WHERE belief_id = ?1 AND context_key = ?2",
          RawEntry::COLUMNS,
        ),
        vec![belief_id.as_str().to_owned(), encode_key(context_key)?],
      )
      .await?;
    Ok(entries.into_iter().next())
  }

  async fn insert_entry(&self, entry: ContextEntry) -> Result<bool> {
    let row = EntryRow::new(&entry)?;
    Ok(self.conn.call(move |conn| Ok(row.insert(conn)? == 1)).await?)
  }

  async fn compare_and_swap_entry(
    &self,
    entry: ContextEntry,
    expected_version: u64,
  ) -> Result<bool> {
    let row = EntryRow::new(&entry)?;
    let expected = encode_count(expected_version);
    let next = encode_count(expected_version + 1);

    Ok(
      self
        .conn
        .call(move |conn| {
          let n = conn.execute(
            "UPDATE context_entries SET
               strength = ?3, success_count = ?4, failure_count = ?5,
               neutral_count = ?6, last_updated = ?7, last_outcome = ?8,
               status = ?9, seed_strength = ?10, admitted_at = ?11,
               version = ?12
             WHERE belief_id = ?1 AND context_key = ?2 AND version = ?13",
            rusqlite::params![
              row.belief_id,
              row.context_key,
              row.strength,
              row.success_count,
              row.failure_count,
              row.neutral_count,
              row.last_updated,
              row.last_outcome,
              row.status,
              row.seed_strength,
              row.admitted_at,
              next,
              expected,
            ],
          )?;
          Ok(n == 1)
        })
        .await?,
    )
  }

  // ── SUPPORTS edges ────────────────────────────────────────────────────────

  async fn support_edges(&self) -> Result<Vec<SupportEdge>> {
    let raws: Vec<RawEdge> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT source_id, target_id, weight, created_at
           FROM support_edges ORDER BY created_at, source_id, target_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawEdge {
              source_id:  row.get(0)?,
              target_id:  row.get(1)?,
              weight:     row.get(2)?,
              created_at: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEdge::into_edge).collect()
  }

  async fn insert_edge(&self, edge: SupportEdge) -> Result<()> {
    let source = edge.source.as_str().to_owned();
    let target = edge.target.as_str().to_owned();
    let weight = edge.weight;
    let created_at = encode_dt(edge.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO support_edges (source_id, target_id, weight, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![source, target, weight, created_at],
        )?;
        Ok(n == 1)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateEdge(edge.source, edge.target));
    }
    Ok(())
  }
}

// ─── Row encoding ────────────────────────────────────────────────────────────

/// The owned column values of a context entry, minus `version`.
struct EntryRow {
  belief_id:     String,
  context_key:   String,
  strength:      f64,
  success_count: i64,
  failure_count: i64,
  neutral_count: i64,
  last_updated:  String,
  last_outcome:  Option<&'static str>,
  status:        &'static str,
  seed_strength: f64,
  admitted_at:   String,
  version:       i64,
}

impl EntryRow {
  fn new(entry: &ContextEntry) -> Result<Self> {
    Ok(Self {
      belief_id:     entry.belief_id.as_str().to_owned(),
      context_key:   encode_key(&entry.context_key)?,
      strength:      entry.strength,
      success_count: encode_count(entry.success_count),
      failure_count: encode_count(entry.failure_count),
      neutral_count: encode_count(entry.neutral_count),
      last_updated:  encode_dt(entry.last_updated),
      last_outcome:  entry.last_outcome.map(|o| o.as_str()),
      status:        entry.status.as_str(),
      seed_strength: entry.seed_strength,
      admitted_at:   encode_dt(entry.admitted_at),
      version:       encode_count(entry.version),
    })
  }

  /// `INSERT OR IGNORE` the row; returns the number of rows written.
  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      &format!(
        "INSERT OR IGNORE INTO context_entries ({})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        RawEntry::COLUMNS,
      ),
      rusqlite::params![
        self.belief_id,
        self.context_key,
        self.strength,
        self.success_count,
        self.failure_count,
        self.neutral_count,
        self.last_updated,
        self.last_outcome,
        self.status,
        self.version,
        self.seed_strength,
        self.admitted_at,
      ],
    )
  }
}
