//! Graph schema creation and version-gated migrations.
//!
//! Every open first runs the base DDL: all graph tables and their core
//! indexes with `IF NOT EXISTS`. The database file is shared with the
//! summaries store, which may already have created some of these tables
//! under its own `schema_version` key, so table existence is never inferred
//! from a version number. The gated steps that follow only alter or
//! backfill. They are tracked under a separate `graph_schema_version` key.
//! Each step runs in one transaction, records its version, and returns a
//! one-line note for the caller to surface.

use rusqlite::{params, Connection, OptionalExtension};

use super::schema::{current_schema_version, table_columns, CREATE_METADATA, SCHEMA_VERSION_KEY};
use crate::error::{GraphError, Result};

/// Graph schema version written by the newest migration.
pub const LATEST_SCHEMA_VERSION: i64 = 1;

// ---------------------------------------------------------------------------
// Base schema
// ---------------------------------------------------------------------------

const CREATE_CODE_ENTITIES: &str = "\
CREATE TABLE IF NOT EXISTS code_entities (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  file_path TEXT NOT NULL,
  type TEXT NOT NULL,
  name TEXT NOT NULL,
  qualified_name TEXT NOT NULL,
  parent_name TEXT,
  lineno INTEGER NOT NULL,
  end_lineno INTEGER NOT NULL,
  docstring TEXT,
  signature TEXT,
  language TEXT NOT NULL,
  created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
  updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
)";

const CREATE_CODE_RELATIONSHIPS: &str = "\
CREATE TABLE IF NOT EXISTS code_relationships (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  from_entity_id INTEGER REFERENCES code_entities(id) ON DELETE CASCADE,
  to_entity_id INTEGER REFERENCES code_entities(id) ON DELETE SET NULL,
  from_file TEXT,
  to_file TEXT,
  relationship_type TEXT NOT NULL,
  location TEXT,
  created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
)";

const CREATE_ANALYSIS_FILE_HASHES: &str = "\
CREATE TABLE IF NOT EXISTS analysis_file_hashes (
  file_path TEXT PRIMARY KEY,
  content_hash TEXT NOT NULL
)";

/// Graph tables in creation order.
const BASE_TABLES: &[(&str, &str)] = &[
    ("code_entities", CREATE_CODE_ENTITIES),
    ("code_relationships", CREATE_CODE_RELATIONSHIPS),
    ("analysis_file_hashes", CREATE_ANALYSIS_FILE_HASHES),
];

const BASE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_entities_name ON code_entities(name)",
    "CREATE INDEX IF NOT EXISTS idx_entities_qualified_name ON code_entities(qualified_name)",
    "CREATE INDEX IF NOT EXISTS idx_entities_type ON code_entities(type)",
    "CREATE INDEX IF NOT EXISTS idx_entities_file ON code_entities(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_rel_from ON code_relationships(from_entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_rel_to ON code_relationships(to_entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_rel_type ON code_relationships(relationship_type)",
    "CREATE INDEX IF NOT EXISTS idx_rel_from_file ON code_relationships(from_file)",
    "CREATE INDEX IF NOT EXISTS idx_rel_to_file ON code_relationships(to_file)",
];

// ---------------------------------------------------------------------------
// v1: parent entity links
// ---------------------------------------------------------------------------

const ADD_PARENT_ENTITY_ID: &str = "\
ALTER TABLE code_entities
ADD COLUMN parent_entity_id INTEGER REFERENCES code_entities(id) ON DELETE CASCADE";

/// Link members to the class of the same file whose qualified name matches
/// their `parent_name`.
const BACKFILL_PARENT_ENTITY_ID: &str = "\
UPDATE code_entities
SET parent_entity_id = (
  SELECT p.id FROM code_entities p
  WHERE p.file_path = code_entities.file_path
    AND p.qualified_name = code_entities.parent_name
    AND p.type = 'class'
  ORDER BY p.id
  LIMIT 1
)
WHERE parent_name IS NOT NULL
  AND parent_entity_id IS NULL
  AND EXISTS (
    SELECT 1 FROM code_entities p
    WHERE p.file_path = code_entities.file_path
      AND p.qualified_name = code_entities.parent_name
      AND p.type = 'class'
  )";

const PARENT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_entities_parent ON code_entities(parent_entity_id)";

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

type Step = fn(&Connection) -> rusqlite::Result<String>;

const STEPS: &[(i64, Step)] = &[(1, migrate_v1)];

/// Create any missing graph tables, then bring the graph schema up to
/// [`LATEST_SCHEMA_VERSION`].
///
/// Returns one note per created table set and per applied step, oldest
/// first; empty when the database was already current.
///
/// # Errors
///
/// A failing base DDL is reported as [`GraphError::Migration`] with version
/// `0`; a failing step names its own version. The failed unit is rolled
/// back; earlier steps stay applied.
pub fn run_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut notes = Vec::new();
    if let Some(note) =
        ensure_base_schema(conn).map_err(|source| GraphError::Migration { version: 0, source })?
    {
        tracing::info!("{note}");
        notes.push(note);
    }

    let mut current = current_schema_version(conn)?;
    for &(version, step) in STEPS {
        if current >= version {
            continue;
        }
        let note = apply_step(conn, version, step)
            .map_err(|source| GraphError::Migration { version, source })?;
        tracing::info!(version, "{note}");
        notes.push(note);
        current = version;
    }

    Ok(notes)
}

/// Idempotent base DDL in one transaction. Returns a note naming the
/// tables that had to be created, if any.
pub fn ensure_base_schema(conn: &Connection) -> rusqlite::Result<Option<String>> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(CREATE_METADATA)?;
    let mut created = Vec::new();
    for &(table, ddl) in BASE_TABLES {
        if !table_exists(&tx, table)? {
            tx.execute_batch(ddl)?;
            created.push(table);
        }
    }
    for ddl in BASE_INDEXES {
        tx.execute_batch(ddl)?;
    }
    tx.commit()?;

    Ok((!created.is_empty()).then(|| format!("Created code graph tables: {}", created.join(", "))))
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn apply_step(conn: &Connection, version: i64, step: Step) -> rusqlite::Result<String> {
    let tx = conn.unchecked_transaction()?;
    let note = step(&tx)?;
    tx.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SCHEMA_VERSION_KEY, version.to_string()],
    )?;
    tx.commit()?;
    Ok(note)
}

/// Tables written by the summaries store already carry the column, so it is
/// only added when missing; the backfill runs either way.
fn migrate_v1(conn: &Connection) -> rusqlite::Result<String> {
    let columns = table_columns(conn, "code_entities")?;
    let added = !columns.iter().any(|c| c == "parent_entity_id");
    if added {
        conn.execute_batch(ADD_PARENT_ENTITY_ID)?;
    }
    let linked = conn.execute(BACKFILL_PARENT_ENTITY_ID, [])?;
    conn.execute_batch(PARENT_INDEX)?;
    let action = if added { "added" } else { "checked" };
    Ok(format!(
        "Graph schema v1: {action} code_entities.parent_entity_id (backfilled {linked} rows)"
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
