//! SQLite connection setup and the shared `metadata` table.
//!
//! The database file can also hold the summaries store's tables, and that
//! store keeps its own `schema_version` in `metadata`. The graph tables and
//! their version live in [`crate::db::migrations`] under a separate key.

use rusqlite::{Connection, OptionalExtension};

// ---------------------------------------------------------------------------
// DDL constants
// ---------------------------------------------------------------------------

pub(crate) const CREATE_METADATA: &str = "\
CREATE TABLE IF NOT EXISTS metadata (
  key TEXT PRIMARY KEY,
  value TEXT
)";

/// Metadata key holding the integer graph schema version.
pub const SCHEMA_VERSION_KEY: &str = "graph_schema_version";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database at `db_path` and create the
/// `metadata` table. Pass `":memory:"` for a throwaway database.
///
/// The returned connection has WAL mode, foreign keys and synchronous
/// NORMAL configured. Graph tables are not created here. Run
/// [`crate::db::migrations::run_migrations`] next.
///
/// # Errors
///
/// Returns a `rusqlite::Error` if the database cannot be opened or the base
/// DDL fails.
pub fn initialize_database(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_connection(&conn)?;
    conn.execute_batch(CREATE_METADATA)?;
    Ok(conn)
}

/// Apply connection pragmas.
///
/// Foreign keys are ON: deleting a file's entities cascades to the
/// relationships they originate and clears references into them.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Stored graph schema version; `0` when unset or unparseable.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [SCHEMA_VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
}

/// Names of the columns of `table`, in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        initialize_database(":memory:").expect("schema creation should succeed on :memory:")
    }

    #[test]
    fn metadata_table_exists() {
        let conn = setup();
        assert_eq!(table_columns(&conn, "metadata").unwrap(), vec!["key", "value"]);
    }

    #[test]
    fn pragmas_are_set() {
        let conn = setup();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        // In-memory databases report "memory" instead of "wal".
        assert!(
            journal_mode == "wal" || journal_mode == "memory",
            "journal_mode should be 'wal' or 'memory', got '{journal_mode}'"
        );

        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1, "foreign_keys should be ON");

        let sync: i64 = conn
            .pragma_query_value(None, "synchronous", |row| row.get(0))
            .unwrap();
        assert_eq!(sync, 1, "synchronous should be NORMAL (1)");
    }

    #[test]
    fn schema_version_defaults_to_zero() {
        let conn = setup();
        assert_eq!(current_schema_version(&conn).unwrap(), 0);

        conn.execute(
            "INSERT INTO metadata (key, value) VALUES ('graph_schema_version', 'garbage')",
            [],
        )
        .unwrap();
        assert_eq!(current_schema_version(&conn).unwrap(), 0);

        conn.execute(
            "UPDATE metadata SET value = '3' WHERE key = 'graph_schema_version'",
            [],
        )
        .unwrap();
        assert_eq!(current_schema_version(&conn).unwrap(), 3);
    }

    #[test]
    fn summaries_schema_version_is_not_read() {
        let conn = setup();
        conn.execute("INSERT INTO metadata (key, value) VALUES ('schema_version', '4')", [])
            .unwrap();
        assert_eq!(current_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn reopening_file_database_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let path = path.to_str().unwrap();
        drop(initialize_database(path).unwrap());
        let conn = initialize_database(path).unwrap();
        assert!(table_columns(&conn, "metadata").unwrap().contains(&"key".to_string()));
    }
}
