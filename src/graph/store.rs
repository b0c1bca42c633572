//! SQLite CRUD layer for the code graph.
//!
//! `GraphStore` owns the single connection. Every query goes through
//! [`Connection::prepare_cached`]. Multi-statement public methods open one
//! transaction and call private `*_in_tx` helpers, so no transaction is
//! ever nested.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::GraphConfig;
use crate::db::converters::{ENTITY_COLUMNS, RELATIONSHIP_COLUMNS};
use crate::db::schema::current_schema_version;
use crate::db::{initialize_database, row_to_entity, row_to_relationship, run_migrations};
use crate::error::Result;
use crate::graph::query::{CalleeInfo, CallerInfo, InheritanceChild};
use crate::graph::resolver::{resolve_source, resolve_target, EntityIdMap};
use crate::paths::normalize_path;
use crate::types::{CodeEntity, ParseOutput, PendingRelationship, Relationship};

/// Placeholder for a callee or child with neither a resolved entity nor text.
pub const UNKNOWN_NAME: &str = "(unknown)";

// ---------------------------------------------------------------------------
// Result structs
// ---------------------------------------------------------------------------

/// Aggregate statistics about the stored graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphStats {
    pub entities: usize,
    pub relationships: usize,
    pub files: usize,
    /// `calls`/`inherits` rows whose target is still text only.
    pub unresolved: usize,
}

/// Rows written by one [`GraphStore::store_file_output`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoredCounts {
    pub entities: usize,
    pub relationships: usize,
}

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

/// Typed CRUD wrapper around the code graph database.
pub struct GraphStore {
    pub conn: Connection,
    migration_notes: Vec<String>,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("migration_notes", &self.migration_notes.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const INSERT_ENTITY_SQL: &str = "\
INSERT INTO code_entities
  (file_path, type, name, qualified_name, parent_name, lineno, end_lineno,
   docstring, signature, language, parent_entity_id)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const INSERT_RELATIONSHIP_SQL: &str = "\
INSERT INTO code_relationships
  (from_entity_id, to_entity_id, from_file, to_file, relationship_type, location)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const DELETE_RELATIONSHIPS_BY_FILE_SQL: &str = "\
DELETE FROM code_relationships WHERE from_file = ?1 OR to_file = ?1";

const DELETE_ENTITIES_BY_FILE_SQL: &str = "\
DELETE FROM code_entities WHERE file_path = ?1";

const ENTITY_BY_QUALIFIED_NAME_SQL: &str = "\
WHERE qualified_name = ?1
ORDER BY CASE WHEN file_path = ?2 THEN 0 ELSE 1 END, id";

const ENTITY_BY_NAME_SQL: &str = "\
WHERE name = ?1
ORDER BY CASE WHEN file_path = ?2 THEN 0 ELSE 1 END, id";

const UPSERT_FILE_HASH_SQL: &str = "\
INSERT INTO analysis_file_hashes (file_path, content_hash) VALUES (?1, ?2)
ON CONFLICT(file_path) DO UPDATE SET content_hash = excluded.content_hash";

const UPSERT_METADATA_SQL: &str = "\
INSERT INTO metadata (key, value) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value";

const UPSERT_METADATA_NOW_SQL: &str = "\
INSERT INTO metadata (key, value) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
ON CONFLICT(key) DO UPDATE SET value = excluded.value";

const INSERT_METADATA_NOW_IF_MISSING_SQL: &str = "\
INSERT OR IGNORE INTO metadata (key, value) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))";

const CALLERS_SQL: &str = "\
SELECT e.id, e.qualified_name, e.file_path, r.location
FROM code_relationships r
JOIN code_entities e ON e.id = r.from_entity_id
WHERE r.to_entity_id = ?1 AND r.relationship_type = 'calls'
ORDER BY e.file_path, e.qualified_name, r.id";

const CALLEES_SQL: &str = "\
SELECT COALESCE(e.qualified_name, r.to_file) AS target, e.id, e.file_path, r.location
FROM code_relationships r
LEFT JOIN code_entities e ON e.id = r.to_entity_id
WHERE r.from_entity_id = ?1 AND r.relationship_type = 'calls'
ORDER BY target, r.id";

const INHERITANCE_CHILDREN_SQL: &str = "\
SELECT r.from_entity_id, e.qualified_name AS child, r.location
FROM code_relationships r
LEFT JOIN code_entities e ON e.id = r.from_entity_id
WHERE r.relationship_type = 'inherits' AND r.to_entity_id = ?1
ORDER BY child, r.id";

const IMPORTS_FOR_FILE_SQL: &str = "\
SELECT to_file FROM code_relationships
WHERE from_file = ?1 AND relationship_type = 'imports' AND to_file IS NOT NULL
ORDER BY to_file";

/// `to_file` is the module itself or one of its package prefixes.
const IMPORTERS_OF_MODULE_SQL: &str = "\
SELECT DISTINCT from_file FROM code_relationships
WHERE relationship_type = 'imports' AND from_file IS NOT NULL AND to_file IS NOT NULL
  AND (to_file = ?1 OR substr(?1, 1, length(to_file) + 1) = to_file || '.')
ORDER BY from_file";

const RELATIVE_IMPORT_ROWS_SQL: &str = "\
SELECT from_file, to_file FROM code_relationships
WHERE relationship_type = 'imports' AND from_file IS NOT NULL AND to_file IS NOT NULL
  AND (substr(to_file, 1, 2) = './' OR substr(to_file, 1, 3) = '../')
ORDER BY from_file, id";

/// Exact qualified-name matches take over unresolved rows and rows that
/// are only linked through a bare-name match.
const RELINK_QUALIFIED_SQL: &str = "\
UPDATE code_relationships SET to_entity_id = ?1
WHERE relationship_type IN ('calls', 'inherits')
  AND to_file = ?2
  AND (from_file IS NULL OR from_file <> ?3)
  AND (
    to_entity_id IS NULL
    OR NOT EXISTS (
      SELECT 1 FROM code_entities t
      WHERE t.id = code_relationships.to_entity_id
        AND t.qualified_name = code_relationships.to_file
    )
  )";

const RELINK_BARE_SQL: &str = "\
UPDATE code_relationships SET to_entity_id = ?1
WHERE to_entity_id IS NULL
  AND relationship_type IN ('calls', 'inherits')
  AND to_file = ?2
  AND (from_file IS NULL OR from_file <> ?3)";

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl GraphStore {
    /// Open (or create) the database at `db_path`, migrate it to the latest
    /// schema, and return a ready-to-use store.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or any migration step fails.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = initialize_database(&db_path.as_ref().to_string_lossy())?;
        Self::from_connection(conn)
    }

    /// Throwaway in-memory store, fully migrated.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(initialize_database(":memory:")?)
    }

    /// Open the store of the project rooted at `project_root`, creating the
    /// tool directory when missing, and record the root in metadata.
    pub fn for_project(project_root: &Path, config: &GraphConfig) -> Result<Self> {
        std::fs::create_dir_all(config.tool_dir_path(project_root))?;
        let store = Self::open(config.database_path(project_root))?;
        store.set_metadata("project_root", &normalize_path(project_root))?;
        store
            .conn
            .execute(INSERT_METADATA_NOW_IF_MISSING_SQL, params!["created_at"])?;
        Ok(store)
    }

    /// Migrate an already-open connection.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let migration_notes = run_migrations(&conn)?;
        Ok(Self {
            conn,
            migration_notes,
        })
    }

    /// Notes from the migrations applied when this store was opened.
    /// Subsequent calls return an empty list.
    pub fn take_migration_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.migration_notes)
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(current_schema_version(&self.conn)?)
    }

    // -------------------------------------------------------------------
    // Single-row mutations
    // -------------------------------------------------------------------

    /// Insert an entity and return its new id. `entity.id` is ignored.
    pub fn store_entity(&self, entity: &CodeEntity) -> Result<i64> {
        Ok(insert_entity(&self.conn, entity)?)
    }

    /// Insert a relationship and return its new id. `relationship.id` is
    /// ignored; entity ids are stored as given.
    pub fn store_relationship(&self, relationship: &Relationship) -> Result<i64> {
        Ok(insert_relationship(&self.conn, relationship)?)
    }

    /// Delete every entity of `file_path` and every relationship whose
    /// `from_file` or `to_file` is that path.
    ///
    /// References into the deleted entities from other files keep their
    /// target text; their `to_entity_id` is cleared.
    pub fn delete_entities_for_file(&self, file_path: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        delete_file_in_tx(&tx, file_path)?;
        tx.commit()?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Per-file store with resolution
    // -------------------------------------------------------------------

    /// Store one file's parse output in a single transaction.
    ///
    /// Entities go in first, in declaration order, each method linked to
    /// its class. Relationships follow with their source resolved against
    /// this file and their target (calls and inherits only) against the
    /// whole graph.
    pub fn store_file_output(&self, file_path: &str, output: &ParseOutput) -> Result<StoredCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let counts = store_output_in_tx(&tx, file_path, output)?;
        tx.commit()?;
        Ok(counts)
    }

    /// Delete the file's previous rows and store `output` in their place,
    /// as one transaction.
    pub fn replace_file_output(&self, file_path: &str, output: &ParseOutput) -> Result<StoredCounts> {
        let tx = self.conn.unchecked_transaction()?;
        delete_file_in_tx(&tx, file_path)?;
        let counts = store_output_in_tx(&tx, file_path, output)?;
        tx.commit()?;
        Ok(counts)
    }

    /// Point `calls`/`inherits` rows of other files at the entities stored
    /// for `file_path`, so the final links match what resolving against the
    /// complete graph would give regardless of analysis order.
    ///
    /// A qualified-name match claims rows that are unresolved or were only
    /// linked by bare name. A bare-name match only fills unresolved rows.
    /// Rows already linked by qualified name are left alone.
    ///
    /// Returns the number of rows (re)linked.
    pub fn relink_unresolved_targets(&self, file_path: &str) -> Result<usize> {
        let entities = self.get_entities_by_file(file_path)?;
        if entities.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut linked = 0;
        {
            let mut qualified = tx.prepare_cached(RELINK_QUALIFIED_SQL)?;
            for entity in &entities {
                let Some(id) = entity.id else { continue };
                linked += qualified.execute(params![id, entity.qualified_name, file_path])?;
            }
            let mut bare = tx.prepare_cached(RELINK_BARE_SQL)?;
            for entity in &entities {
                let Some(id) = entity.id else { continue };
                if entity.name != entity.qualified_name {
                    linked += bare.execute(params![id, entity.name, file_path])?;
                }
            }
        }
        tx.commit()?;
        Ok(linked)
    }

    // -------------------------------------------------------------------
    // Queries: entities
    // -------------------------------------------------------------------

    /// Retrieve a single entity by id, or `None` if it doesn't exist.
    pub fn get_entity_by_id(&self, id: i64) -> Result<Option<CodeEntity>> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM code_entities WHERE id = ?1");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.query_row(params![id], row_to_entity).optional()?)
    }

    /// Every entity of `file_path`, in source order.
    pub fn get_entities_by_file(&self, file_path: &str) -> Result<Vec<CodeEntity>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM code_entities WHERE file_path = ?1 ORDER BY lineno, id"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_and_then(params![file_path], row_to_entity)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Best single match for `name`: exact qualified name first, then bare
    /// name, each preferring `scope_file` and then the oldest row.
    pub fn get_entity_by_qualified_name(
        &self,
        name: &str,
        scope_file: Option<&str>,
    ) -> Result<Option<CodeEntity>> {
        for filter in [ENTITY_BY_QUALIFIED_NAME_SQL, ENTITY_BY_NAME_SQL] {
            let sql = format!("SELECT {ENTITY_COLUMNS} FROM code_entities {filter} LIMIT 1");
            let mut stmt = self.conn.prepare_cached(&sql)?;
            if let Some(entity) = stmt.query_row(params![name, scope_file], row_to_entity).optional()? {
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    /// All exact qualified-name matches for `name`; when there are none,
    /// all bare-name matches. `scope_file` only moves its own entities to
    /// the front.
    pub fn get_entities_matching_name(
        &self,
        name: &str,
        scope_file: Option<&str>,
    ) -> Result<Vec<CodeEntity>> {
        for filter in [ENTITY_BY_QUALIFIED_NAME_SQL, ENTITY_BY_NAME_SQL] {
            let sql = format!("SELECT {ENTITY_COLUMNS} FROM code_entities {filter}");
            let mut stmt = self.conn.prepare_cached(&sql)?;
            let found = stmt
                .query_and_then(params![name, scope_file], row_to_entity)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }

    /// Whether any entity has been stored.
    pub fn has_graph_data(&self) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT EXISTS(SELECT 1 FROM code_entities)")?;
        Ok(stmt.query_row([], |row| row.get(0))?)
    }

    // -------------------------------------------------------------------
    // Queries: relationships
    // -------------------------------------------------------------------

    /// Relationships originating in `file_path`, in insertion order.
    pub fn get_relationships_from_file(&self, file_path: &str) -> Result<Vec<Relationship>> {
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM code_relationships WHERE from_file = ?1 ORDER BY id"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_and_then(params![file_path], row_to_relationship)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Raw import strings of `file_path`, sorted.
    pub fn get_imports_for_file(&self, file_path: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(IMPORTS_FOR_FILE_SQL)?;
        let rows = stmt.query_map(params![file_path], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Files with an import whose text is `module` or a package prefix of it.
    pub fn get_importers_of_module(&self, module: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(IMPORTERS_OF_MODULE_SQL)?;
        let rows = stmt.query_map(params![module], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// `(from_file, specifier)` for every `./` or `../` import.
    pub fn get_relative_import_rows(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare_cached(RELATIVE_IMPORT_ROWS_SQL)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Resolved callers of an entity, ordered by file then name.
    pub fn get_callers_of_entity(&self, entity_id: i64) -> Result<Vec<CallerInfo>> {
        let mut stmt = self.conn.prepare_cached(CALLERS_SQL)?;
        let rows = stmt.query_map(params![entity_id], |row| {
            Ok(CallerInfo {
                entity_id: row.get(0)?,
                qualified_name: row.get(1)?,
                file_path: row.get(2)?,
                location: row.get(3)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Everything an entity calls: the resolved qualified name when linked,
    /// else the raw target text.
    pub fn get_callees_of_entity(&self, entity_id: i64) -> Result<Vec<CalleeInfo>> {
        let mut stmt = self.conn.prepare_cached(CALLEES_SQL)?;
        let rows = stmt.query_map(params![entity_id], |row| {
            let target: Option<String> = row.get(0)?;
            Ok(CalleeInfo {
                target_name: target.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
                entity_id: row.get(1)?,
                file_path: row.get(2)?,
                location: row.get(3)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Direct subclasses of a class, via `inherits` rows linked to it.
    pub fn get_inheritance_children(&self, class_id: i64) -> Result<Vec<InheritanceChild>> {
        let mut stmt = self.conn.prepare_cached(INHERITANCE_CHILDREN_SQL)?;
        let rows = stmt.query_map(params![class_id], |row| {
            let name: Option<String> = row.get(1)?;
            Ok(InheritanceChild {
                entity_id: row.get(0)?,
                qualified_name: name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
                location: row.get(2)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -------------------------------------------------------------------
    // File hashes
    // -------------------------------------------------------------------

    pub fn get_analysis_file_hash(&self, file_path: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT content_hash FROM analysis_file_hashes WHERE file_path = ?1")?;
        Ok(stmt.query_row(params![file_path], |row| row.get(0)).optional()?)
    }

    pub fn set_analysis_file_hash(&self, file_path: &str, content_hash: &str) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(UPSERT_FILE_HASH_SQL)?;
        stmt.execute(params![file_path, content_hash])?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM metadata WHERE key = ?1")?;
        let value: Option<Option<String>> = stmt.query_row(params![key], |row| row.get(0)).optional()?;
        Ok(value.flatten())
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(UPSERT_METADATA_SQL)?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    /// Set `key` to the current UTC time (ISO-8601).
    pub fn set_metadata_now(&self, key: &str) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(UPSERT_METADATA_NOW_SQL)?;
        stmt.execute(params![key])?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Aggregate stats
    // -------------------------------------------------------------------

    pub fn get_stats(&self) -> Result<GraphStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.prepare_cached(sql)?.query_row([], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(GraphStats {
            entities: count("SELECT COUNT(*) FROM code_entities")?,
            relationships: count("SELECT COUNT(*) FROM code_relationships")?,
            files: count("SELECT COUNT(DISTINCT file_path) FROM code_entities")?,
            unresolved: count(
                "SELECT COUNT(*) FROM code_relationships
                 WHERE to_entity_id IS NULL AND relationship_type IN ('calls', 'inherits')",
            )?,
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction-free helpers
// ---------------------------------------------------------------------------

fn insert_entity(conn: &Connection, entity: &CodeEntity) -> rusqlite::Result<i64> {
    let mut stmt = conn.prepare_cached(INSERT_ENTITY_SQL)?;
    stmt.execute(params![
        entity.file_path,
        entity.kind.as_str(),
        entity.name,
        entity.qualified_name,
        entity.parent_name,
        entity.start_line,
        entity.end_line,
        entity.docstring,
        entity.signature,
        entity.language.as_str(),
        entity.parent_entity_id,
    ])?;
    Ok(conn.last_insert_rowid())
}

fn insert_relationship(conn: &Connection, rel: &Relationship) -> rusqlite::Result<i64> {
    let mut stmt = conn.prepare_cached(INSERT_RELATIONSHIP_SQL)?;
    stmt.execute(params![
        rel.from_entity_id,
        rel.to_entity_id,
        rel.from_file,
        rel.to_file,
        rel.kind.as_str(),
        rel.location,
    ])?;
    Ok(conn.last_insert_rowid())
}

fn delete_file_in_tx(conn: &Connection, file_path: &str) -> rusqlite::Result<()> {
    conn.prepare_cached(DELETE_RELATIONSHIPS_BY_FILE_SQL)?
        .execute(params![file_path])?;
    conn.prepare_cached(DELETE_ENTITIES_BY_FILE_SQL)?
        .execute(params![file_path])?;
    Ok(())
}

fn store_output_in_tx(
    conn: &Connection,
    file_path: &str,
    output: &ParseOutput,
) -> rusqlite::Result<StoredCounts> {
    let mut ids = EntityIdMap::new();
    for entity in &output.entities {
        let mut row = entity.clone();
        row.parent_entity_id = ids.parent_for(entity);
        let id = insert_entity(conn, &row)?;
        ids.insert(entity, id);
    }

    let mut relationships = 0;
    for pending in &output.relationships {
        let resolved = resolve_pending(conn, &ids, pending, file_path)?;
        insert_relationship(conn, &resolved)?;
        relationships += 1;
    }

    tracing::debug!(
        file = file_path,
        entities = ids.len(),
        relationships,
        "stored file output"
    );
    Ok(StoredCounts {
        entities: output.entities.len(),
        relationships,
    })
}

fn resolve_pending(
    conn: &Connection,
    ids: &EntityIdMap,
    pending: &PendingRelationship,
    file_path: &str,
) -> rusqlite::Result<Relationship> {
    let mut rel = pending.relationship.clone();
    rel.from_entity_id = resolve_source(ids, pending);
    rel.to_entity_id = resolve_target(conn, pending, file_path)?;
    Ok(rel)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityKind, Language, RelationshipKind};

    fn setup() -> GraphStore {
        GraphStore::open_in_memory().expect("in-memory store")
    }

    fn entity(file: &str, kind: EntityKind, name: &str, parent: Option<&str>, line: u32) -> CodeEntity {
        CodeEntity::new(
            file,
            kind,
            name,
            parent.map(str::to_string),
            Language::Python,
            line,
            line + 1,
        )
    }

    fn pending(kind: RelationshipKind, file: &str, target: &str, source: Option<&str>) -> PendingRelationship {
        PendingRelationship::new(
            Relationship::new(kind, file, target, 1),
            source.map(str::to_string),
        )
    }

    /// `a.py` defines `greet`; `b.py` defines `main` which calls it.
    fn greet_main(store: &GraphStore) {
        let a = ParseOutput {
            entities: vec![entity("/p/a.py", EntityKind::Function, "greet", None, 1)],
            relationships: vec![],
        };
        store.store_file_output("/p/a.py", &a).unwrap();
        let b = ParseOutput {
            entities: vec![entity("/p/b.py", EntityKind::Function, "main", None, 3)],
            relationships: vec![
                pending(RelationshipKind::Imports, "/p/b.py", "a", None),
                pending(RelationshipKind::Calls, "/p/b.py", "greet", Some("main")),
            ],
        };
        store.store_file_output("/p/b.py", &b).unwrap();
    }

    #[test]
    fn open_in_memory_is_migrated() {
        let mut store = setup();
        assert_eq!(store.schema_version().unwrap(), crate::db::LATEST_SCHEMA_VERSION);
        assert!(!store.take_migration_notes().is_empty());
        assert!(store.take_migration_notes().is_empty());
        assert!(!store.has_graph_data().unwrap());
    }

    /// Seed `path` the way the summaries store leaves it at `version`.
    fn seed_summaries_db(path: &Path, version: &str, graph_tables: bool) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE summaries (path TEXT PRIMARY KEY, type TEXT NOT NULL, hash TEXT NOT NULL);
             CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT);",
        )
        .unwrap();
        conn.execute("INSERT INTO metadata (key, value) VALUES ('schema_version', ?1)", [version])
            .unwrap();
        if graph_tables {
            conn.execute_batch(
                "CREATE TABLE code_entities (
                   id INTEGER PRIMARY KEY AUTOINCREMENT, file_path TEXT NOT NULL, type TEXT NOT NULL,
                   name TEXT NOT NULL, qualified_name TEXT NOT NULL, parent_name TEXT,
                   lineno INTEGER, end_lineno INTEGER, docstring TEXT, signature TEXT,
                   language TEXT NOT NULL, created_at TEXT, updated_at TEXT, parent_entity_id INTEGER
                 );
                 CREATE TABLE code_relationships (
                   id INTEGER PRIMARY KEY AUTOINCREMENT, from_entity_id INTEGER, to_entity_id INTEGER,
                   from_file TEXT, to_file TEXT, relationship_type TEXT NOT NULL, location TEXT, created_at TEXT
                 );
                 INSERT INTO code_entities (file_path, type, name, qualified_name, language)
                 VALUES ('/p/old.py', 'function', 'legacy', 'legacy', 'python');",
            )
            .unwrap();
        }
    }

    #[test]
    fn opens_summaries_database_without_hash_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summaries.db");
        seed_summaries_db(&path, "3", true);

        let store = GraphStore::open(&path).unwrap();
        store.set_analysis_file_hash("/p/a.py", "abc").unwrap();
        assert_eq!(store.get_analysis_file_hash("/p/a.py").unwrap().as_deref(), Some("abc"));

        let legacy = store.get_entities_by_file("/p/old.py").unwrap();
        assert_eq!(legacy.len(), 1);
        assert_eq!((legacy[0].start_line, legacy[0].end_line), (0, 0));

        greet_main(&store);
        let greet = store.get_entity_by_qualified_name("greet", None).unwrap().unwrap();
        assert_eq!(store.get_callers_of_entity(greet.id.unwrap()).unwrap().len(), 1);
        assert_eq!(store.get_metadata("schema_version").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn opens_summaries_database_without_graph_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summaries.db");
        seed_summaries_db(&path, "2", false);

        let mut store = GraphStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), crate::db::LATEST_SCHEMA_VERSION);
        assert_eq!(store.take_migration_notes().len(), 2);
        greet_main(&store);
        store.set_analysis_file_hash("/p/a.py", "abc").unwrap();
        assert_eq!(store.get_stats().unwrap().entities, 2);
        drop(store);

        let mut reopened = GraphStore::open(&path).unwrap();
        assert!(reopened.take_migration_notes().is_empty());
        assert_eq!(reopened.get_metadata("schema_version").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn store_and_get_entity_round_trip() {
        let store = setup();
        let mut e = entity("/p/a.py", EntityKind::Function, "greet", None, 1);
        e.signature = Some("(name)".into());
        let id = store.store_entity(&e).unwrap();

        let got = store.get_entity_by_id(id).unwrap().unwrap();
        assert_eq!(got.id, Some(id));
        assert_eq!(got.name, "greet");
        assert_eq!(got.signature.as_deref(), Some("(name)"));
        assert!(store.get_entity_by_id(id + 100).unwrap().is_none());
        assert!(store.has_graph_data().unwrap());
    }

    #[test]
    fn store_file_output_links_methods_to_classes() {
        let store = setup();
        let output = ParseOutput {
            entities: vec![
                entity("/p/c.py", EntityKind::Class, "A", None, 1),
                entity("/p/c.py", EntityKind::Method, "run", Some("A"), 2),
                entity("/p/c.py", EntityKind::Function, "helper", None, 5),
            ],
            relationships: vec![],
        };
        let counts = store.store_file_output("/p/c.py", &output).unwrap();
        assert_eq!(counts.entities, 3);

        let stored = store.get_entities_by_file("/p/c.py").unwrap();
        let class_id = stored[0].id;
        assert_eq!(stored[1].parent_entity_id, class_id);
        assert_eq!(stored[2].parent_entity_id, None);
    }

    #[test]
    fn calls_resolve_across_files() {
        let store = setup();
        greet_main(&store);

        let greet = store.get_entity_by_qualified_name("greet", None).unwrap().unwrap();
        let main = store.get_entity_by_qualified_name("main", None).unwrap().unwrap();

        let callers = store.get_callers_of_entity(greet.id.unwrap()).unwrap();
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].qualified_name, "main");
        assert_eq!(callers[0].file_path, "/p/b.py");

        let callees = store.get_callees_of_entity(main.id.unwrap()).unwrap();
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].target_name, "greet");
        assert_eq!(callees[0].file_path.as_deref(), Some("/p/a.py"));

        assert_eq!(store.get_imports_for_file("/p/b.py").unwrap(), vec!["a"]);
    }

    #[test]
    fn unresolved_call_keeps_target_text() {
        let store = setup();
        let output = ParseOutput {
            entities: vec![entity("/p/b.py", EntityKind::Function, "main", None, 1)],
            relationships: vec![pending(RelationshipKind::Calls, "/p/b.py", "print", Some("main"))],
        };
        store.store_file_output("/p/b.py", &output).unwrap();

        let main = store.get_entities_by_file("/p/b.py").unwrap().remove(0);
        let callees = store.get_callees_of_entity(main.id.unwrap()).unwrap();
        assert_eq!(callees[0].target_name, "print");
        assert!(callees[0].file_path.is_none());
        assert_eq!(store.get_stats().unwrap().unresolved, 1);
    }

    #[test]
    fn delete_keeps_foreign_target_text() {
        let store = setup();
        greet_main(&store);
        store.delete_entities_for_file("/p/a.py").unwrap();

        assert!(store.get_entities_by_file("/p/a.py").unwrap().is_empty());
        let rels = store.get_relationships_from_file("/p/b.py").unwrap();
        let call = rels.iter().find(|r| r.kind == RelationshipKind::Calls).unwrap();
        assert_eq!(call.to_entity_id, None);
        assert_eq!(call.to_file.as_deref(), Some("greet"));
    }

    #[test]
    fn delete_removes_relationships_from_file() {
        let store = setup();
        greet_main(&store);
        store.delete_entities_for_file("/p/b.py").unwrap();
        assert!(store.get_relationships_from_file("/p/b.py").unwrap().is_empty());
        assert_eq!(store.get_entities_by_file("/p/a.py").unwrap().len(), 1);
    }

    #[test]
    fn replace_file_output_is_stable() {
        let store = setup();
        greet_main(&store);
        let before = store.get_stats().unwrap();

        let b = ParseOutput {
            entities: vec![entity("/p/b.py", EntityKind::Function, "main", None, 3)],
            relationships: vec![
                pending(RelationshipKind::Imports, "/p/b.py", "a", None),
                pending(RelationshipKind::Calls, "/p/b.py", "greet", Some("main")),
            ],
        };
        store.replace_file_output("/p/b.py", &b).unwrap();
        let after = store.get_stats().unwrap();
        assert_eq!(before.entities, after.entities);
        assert_eq!(before.relationships, after.relationships);
    }

    #[test]
    fn relink_fills_earlier_unresolved_calls() {
        let store = setup();
        // Caller stored before its callee exists.
        let b = ParseOutput {
            entities: vec![entity("/p/b.py", EntityKind::Function, "main", None, 1)],
            relationships: vec![pending(RelationshipKind::Calls, "/p/b.py", "greet", Some("main"))],
        };
        store.store_file_output("/p/b.py", &b).unwrap();
        let a = ParseOutput {
            entities: vec![entity("/p/a.py", EntityKind::Function, "greet", None, 1)],
            relationships: vec![],
        };
        store.store_file_output("/p/a.py", &a).unwrap();

        assert_eq!(store.relink_unresolved_targets("/p/a.py").unwrap(), 1);
        assert_eq!(store.relink_unresolved_targets("/p/a.py").unwrap(), 0);
        let greet = store.get_entities_by_file("/p/a.py").unwrap().remove(0);
        assert_eq!(store.get_callers_of_entity(greet.id.unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn relink_prefers_later_qualified_match_over_bare_link() {
        let store = setup();
        let c = ParseOutput {
            entities: vec![
                entity("/p/c.py", EntityKind::Class, "Tools", None, 1),
                entity("/p/c.py", EntityKind::Method, "helper", Some("Tools"), 2),
            ],
            relationships: vec![],
        };
        store.store_file_output("/p/c.py", &c).unwrap();
        let b = ParseOutput {
            entities: vec![entity("/p/b.py", EntityKind::Function, "main", None, 1)],
            relationships: vec![pending(RelationshipKind::Calls, "/p/b.py", "helper", Some("main"))],
        };
        store.store_file_output("/p/b.py", &b).unwrap();
        let method = store.get_entity_by_qualified_name("Tools.helper", None).unwrap().unwrap();
        assert_eq!(store.get_callers_of_entity(method.id.unwrap()).unwrap().len(), 1);

        let a = ParseOutput {
            entities: vec![entity("/p/a.py", EntityKind::Function, "helper", None, 1)],
            relationships: vec![],
        };
        store.store_file_output("/p/a.py", &a).unwrap();
        assert_eq!(store.relink_unresolved_targets("/p/a.py").unwrap(), 1);
        assert_eq!(store.relink_unresolved_targets("/p/a.py").unwrap(), 0);

        let helper = store.get_entities_by_file("/p/a.py").unwrap().remove(0);
        let callers = store.get_callers_of_entity(helper.id.unwrap()).unwrap();
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].qualified_name, "main");
        assert!(store.get_callers_of_entity(method.id.unwrap()).unwrap().is_empty());

        // Re-storing the method's file does not steal the qualified link back.
        store.replace_file_output("/p/c.py", &c).unwrap();
        assert_eq!(store.relink_unresolved_targets("/p/c.py").unwrap(), 0);
        assert_eq!(store.get_callers_of_entity(helper.id.unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn inheritance_children_are_listed() {
        let store = setup();
        let output = ParseOutput {
            entities: vec![
                entity("/p/m.py", EntityKind::Class, "Base", None, 1),
                entity("/p/m.py", EntityKind::Class, "Derived", None, 4),
            ],
            relationships: vec![pending(RelationshipKind::Inherits, "/p/m.py", "Base", Some("Derived"))],
        };
        store.store_file_output("/p/m.py", &output).unwrap();

        let base = store.get_entity_by_qualified_name("Base", None).unwrap().unwrap();
        let children = store.get_inheritance_children(base.id.unwrap()).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].qualified_name, "Derived");
        assert!(children[0].entity_id.is_some());
    }

    #[test]
    fn matching_name_prefers_exact_then_bare() {
        let store = setup();
        store.store_entity(&entity("/p/x.py", EntityKind::Method, "run", Some("A"), 2)).unwrap();
        store.store_entity(&entity("/p/y.py", EntityKind::Method, "run", Some("B"), 2)).unwrap();

        let exact = store.get_entities_matching_name("A.run", None).unwrap();
        assert_eq!(exact.len(), 1);

        let bare = store.get_entities_matching_name("run", Some("/p/y.py")).unwrap();
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[0].file_path, "/p/y.py");
        assert!(store.get_entities_matching_name("nope", None).unwrap().is_empty());
    }

    #[test]
    fn importers_of_module_match_prefixes_exactly() {
        let store = setup();
        for (file, target) in [("/p/m.py", "src.pkg"), ("/p/n.py", "src_pkg"), ("/p/o.py", "src.pkg.sibling")] {
            store
                .store_relationship(&Relationship::new(RelationshipKind::Imports, file, target, 1))
                .unwrap();
        }
        let importers = store.get_importers_of_module("src.pkg.sibling").unwrap();
        assert_eq!(importers, vec!["/p/m.py", "/p/o.py"]);
    }

    #[test]
    fn file_hash_and_metadata_upsert() {
        let store = setup();
        assert!(store.get_analysis_file_hash("/p/a.py").unwrap().is_none());
        store.set_analysis_file_hash("/p/a.py", "aa").unwrap();
        store.set_analysis_file_hash("/p/a.py", "bb").unwrap();
        assert_eq!(store.get_analysis_file_hash("/p/a.py").unwrap().as_deref(), Some("bb"));

        store.set_metadata("analysis_parser_version", "1.0").unwrap();
        assert_eq!(
            store.get_metadata("analysis_parser_version").unwrap().as_deref(),
            Some("1.0")
        );
        store.set_metadata_now("analysis_timestamp").unwrap();
        let ts = store.get_metadata("analysis_timestamp").unwrap().unwrap();
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn for_project_creates_tool_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = GraphConfig::default();
        let store = GraphStore::for_project(dir.path(), &config).unwrap();
        assert!(config.database_path(dir.path()).exists());
        assert!(store.get_metadata("created_at").unwrap().is_some());
        assert_eq!(
            store.get_metadata("project_root").unwrap(),
            Some(normalize_path(dir.path()))
        );
    }
}
