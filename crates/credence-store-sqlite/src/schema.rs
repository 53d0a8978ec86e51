//! SQL schema for the credence store.
//!
//! Only `context_entries` is ever updated in place, and only through the
//! version check in `compare_and_swap_entry`. `events` and `support_edges`
//! are append-only.

/// Stored in `PRAGMA user_version`. A database carrying any other non-zero
/// version is refused.
pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS beliefs (
    belief_id     TEXT PRIMARY KEY NOT NULL,
    statement     TEXT NOT NULL,
    category      TEXT NOT NULL,
    domain        TEXT,
    status        TEXT NOT NULL DEFAULT 'active',
    superseded_by TEXT REFERENCES beliefs(belief_id)
);

CREATE INDEX IF NOT EXISTS idx_beliefs_domain ON beliefs (domain);

-- One row per (belief, context). context_key is a JSON array of values.
CREATE TABLE IF NOT EXISTS context_entries (
    belief_id     TEXT NOT NULL REFERENCES beliefs(belief_id),
    context_key   TEXT NOT NULL,
    strength      REAL NOT NULL,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    neutral_count INTEGER NOT NULL DEFAULT 0,
    last_updated  TEXT NOT NULL,
    last_outcome  TEXT,
    status        TEXT NOT NULL DEFAULT 'active',
    version       INTEGER NOT NULL DEFAULT 0,
    seed_strength REAL NOT NULL,
    admitted_at   TEXT NOT NULL,
    PRIMARY KEY (belief_id, context_key)
);

-- Append-only outcome log. seq is the global append order.
CREATE TABLE IF NOT EXISTS events (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id        TEXT NOT NULL UNIQUE,
    belief_id       TEXT NOT NULL REFERENCES beliefs(belief_id),
    context_key     TEXT NOT NULL,
    attributed_key  TEXT NOT NULL,
    outcome         TEXT NOT NULL,
    severity        REAL NOT NULL,
    moral_dimension TEXT,
    batch_id        TEXT,
    salience        REAL NOT NULL DEFAULT 1.0,
    occurred_at     TEXT NOT NULL,
    recorded_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_belief      ON events (belief_id, occurred_at, seq);
CREATE INDEX IF NOT EXISTS idx_events_occurred_at ON events (occurred_at);

CREATE TABLE IF NOT EXISTS support_edges (
    source_id  TEXT NOT NULL REFERENCES beliefs(belief_id),
    target_id  TEXT NOT NULL REFERENCES beliefs(belief_id),
    weight     REAL NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id),
    CHECK (source_id <> target_id)
);

CREATE INDEX IF NOT EXISTS idx_support_edges_target ON support_edges (target_id);
"#;
