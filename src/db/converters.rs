//! Row-to-struct converters for graph queries.
//!
//! Converts raw `rusqlite::Row` values from `code_entities` and
//! `code_relationships` into the domain types defined in `crate::types`.
//! Columns are read by name, so any `SELECT` that includes them works.

use rusqlite::types::Type;
use rusqlite::Row;

use crate::types::{CodeEntity, EntityKind, Language, Relationship, RelationshipKind};

/// Column list matching [`row_to_entity`], for use in `SELECT`s.
pub const ENTITY_COLUMNS: &str = "id, file_path, type, name, qualified_name, parent_name, \
lineno, end_lineno, docstring, signature, language, parent_entity_id";

/// Column list matching [`row_to_relationship`].
pub const RELATIONSHIP_COLUMNS: &str =
    "id, relationship_type, from_entity_id, to_entity_id, from_file, to_file, location";

fn unknown_value(row: &Row<'_>, column: &str, value: &str) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {column} value: {value:?}").into(),
    )
}

// ---------------------------------------------------------------------------
// Entity conversion
// ---------------------------------------------------------------------------

/// Convert a `code_entities` row into a [`CodeEntity`].
pub fn row_to_entity(row: &Row<'_>) -> rusqlite::Result<CodeEntity> {
    let kind_str: String = row.get("type")?;
    let kind =
        EntityKind::from_str_loose(&kind_str).ok_or_else(|| unknown_value(row, "type", &kind_str))?;
    let language_str: String = row.get("language")?;
    // Tables created by the summaries store allow NULL line numbers.
    let start_line = row.get::<_, Option<u32>>("lineno")?.unwrap_or(0);
    let language = Language::from_str_loose(&language_str)
        .ok_or_else(|| unknown_value(row, "language", &language_str))?;

    Ok(CodeEntity {
        id: Some(row.get("id")?),
        file_path: row.get("file_path")?,
        kind,
        name: row.get("name")?,
        qualified_name: row.get("qualified_name")?,
        parent_name: row.get("parent_name")?,
        start_line,
        end_line: row.get::<_, Option<u32>>("end_lineno")?.unwrap_or(start_line),
        docstring: row.get("docstring")?,
        signature: row.get("signature")?,
        language,
        parent_entity_id: row.get("parent_entity_id")?,
    })
}

// ---------------------------------------------------------------------------
// Relationship conversion
// ---------------------------------------------------------------------------

/// Convert a `code_relationships` row into a [`Relationship`].
pub fn row_to_relationship(row: &Row<'_>) -> rusqlite::Result<Relationship> {
    let kind_str: String = row.get("relationship_type")?;
    let kind = RelationshipKind::from_str_loose(&kind_str)
        .ok_or_else(|| unknown_value(row, "relationship_type", &kind_str))?;

    Ok(Relationship {
        id: Some(row.get("id")?),
        kind,
        from_entity_id: row.get("from_entity_id")?,
        to_entity_id: row.get("to_entity_id")?,
        from_file: row.get("from_file")?,
        to_file: row.get("to_file")?,
        location: row.get("location")?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
