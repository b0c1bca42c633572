//! Relationship resolution: textual names to entity ids.
//!
//! Sources resolve against the file currently being stored (an in-memory
//! map filled as that file's entities are inserted). Targets resolve
//! against the whole persisted graph, preferring the relationship's own
//! file, first by exact qualified name and then by bare name. Whatever
//! cannot be resolved stays as text in `to_file`.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::types::{CodeEntity, EntityKind, PendingRelationship};

const TARGET_BY_QUALIFIED_NAME_SQL: &str = "\
SELECT id FROM code_entities
WHERE qualified_name = ?1
ORDER BY CASE WHEN file_path = ?2 THEN 0 ELSE 1 END, id
LIMIT 1";

const TARGET_BY_NAME_SQL: &str = "\
SELECT id FROM code_entities
WHERE name = ?1
ORDER BY CASE WHEN file_path = ?2 THEN 0 ELSE 1 END, id
LIMIT 1";

// ---------------------------------------------------------------------------
// EntityIdMap
// ---------------------------------------------------------------------------

/// `qualified_name → id` for the entities of one file, in storage order.
///
/// Later entities with the same qualified name shadow earlier ones, matching
/// how a class body's members attach to the nearest preceding class.
#[derive(Debug, Default)]
pub struct EntityIdMap {
    ids: HashMap<String, i64>,
    current_class: Option<i64>,
}

impl EntityIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent id for `entity`, to be set before it is stored.
    ///
    /// Members look up their `parent_name`; when that is missing from the
    /// map the most recent class is used. Top-level entities have none.
    pub fn parent_for(&self, entity: &CodeEntity) -> Option<i64> {
        if entity.kind != EntityKind::Method {
            return None;
        }
        entity
            .parent_name
            .as_deref()
            .and_then(|p| self.ids.get(p).copied())
            .or(self.current_class)
    }

    /// Record a stored entity.
    pub fn insert(&mut self, entity: &CodeEntity, id: i64) {
        match entity.kind {
            EntityKind::Class => self.current_class = Some(id),
            EntityKind::Function | EntityKind::Module => self.current_class = None,
            EntityKind::Method => {}
        }
        self.ids.insert(entity.qualified_name.clone(), id);
    }

    pub fn get(&self, qualified_name: &str) -> Option<i64> {
        self.ids.get(qualified_name).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// `from_entity_id` of a pending relationship: its source looked up in the
/// current file's map.
pub fn resolve_source(ids: &EntityIdMap, pending: &PendingRelationship) -> Option<i64> {
    pending.source.as_deref().and_then(|s| ids.get(s))
}

/// `to_entity_id` of a pending relationship. Only `Calls` and `Inherits`
/// are looked up; everything else keeps its target as text.
pub fn resolve_target(
    conn: &Connection,
    pending: &PendingRelationship,
    file_path: &str,
) -> rusqlite::Result<Option<i64>> {
    if !pending.relationship.kind.resolves_target() {
        return Ok(None);
    }
    let target = pending.target();
    if target.is_empty() {
        return Ok(None);
    }
    lookup_target(conn, target, file_path)
}

/// Two-phase lookup: exact qualified name, then bare name. Both prefer an
/// entity in `file_path` and otherwise take the oldest match.
pub fn lookup_target(
    conn: &Connection,
    target: &str,
    file_path: &str,
) -> rusqlite::Result<Option<i64>> {
    let exact: Option<i64> = conn
        .prepare_cached(TARGET_BY_QUALIFIED_NAME_SQL)?
        .query_row(params![target, file_path], |row| row.get(0))
        .optional()?;
    if exact.is_some() {
        return Ok(exact);
    }
    conn.prepare_cached(TARGET_BY_NAME_SQL)?
        .query_row(params![target, file_path], |row| row.get(0))
        .optional()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
