//! Core domain types for the code graph.
//!
//! Entities are declarations (modules, classes, functions, methods) and
//! relationships are the directed edges between them. Both mirror the rows
//! of `code_entities` and `code_relationships` one to one.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Source language families with a registered parser.
///
/// UI variants (`javascript-react`, `typescript-react`) are accepted as
/// language keys but share the canonical family's parser, so they collapse
/// into the same variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
}

impl Language {
    /// Map a file extension (including the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".py" | ".pyi" => Some(Self::Python),
            ".js" | ".mjs" | ".cjs" | ".jsx" => Some(Self::JavaScript),
            ".ts" | ".mts" | ".cts" | ".tsx" => Some(Self::TypeScript),
            _ => None,
        }
    }

    /// Canonical language key, as stored in `code_entities.language`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
        }
    }

    /// Parse a language key (case-insensitive). UI variants map to their
    /// canonical family.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Some(Self::Python),
            "javascript" | "javascript-react" | "js" | "jsx" => Some(Self::JavaScript),
            "typescript" | "typescript-react" | "ts" | "tsx" => Some(Self::TypeScript),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// Kinds of declarations recorded in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Module,
    Class,
    Function,
    Method,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "module" => Some(Self::Module),
            "class" => Some(Self::Class),
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RelationshipKind
// ---------------------------------------------------------------------------

/// Kinds of directed edges between entities and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Calls,
    Imports,
    Inherits,
    Instantiates,
    Defines,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "calls",
            Self::Imports => "imports",
            Self::Inherits => "inherits",
            Self::Instantiates => "instantiates",
            Self::Defines => "defines",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "calls" => Some(Self::Calls),
            "imports" => Some(Self::Imports),
            "inherits" => Some(Self::Inherits),
            "instantiates" => Some(Self::Instantiates),
            "defines" => Some(Self::Defines),
            _ => None,
        }
    }

    /// Whether the target text is looked up against stored entities.
    pub fn resolves_target(&self) -> bool {
        matches!(self, Self::Calls | Self::Inherits)
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CodeEntity
// ---------------------------------------------------------------------------

/// A declaration extracted from a source file.
///
/// `qualified_name` is `Parent.name` for members of a class and plain `name`
/// otherwise. It is not unique across the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub file_path: String,
    pub kind: EntityKind,
    pub name: String,
    pub qualified_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    /// 1-based first line.
    pub start_line: u32,
    /// 1-based last line (inclusive).
    pub end_line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_entity_id: Option<i64>,
}

impl CodeEntity {
    /// New unsaved entity. `qualified_name` is derived from `parent_name`.
    pub fn new(
        file_path: impl Into<String>,
        kind: EntityKind,
        name: impl Into<String>,
        parent_name: Option<String>,
        language: Language,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        let name = name.into();
        let qualified_name = match &parent_name {
            Some(parent) => format!("{parent}.{name}"),
            None => name.clone(),
        };
        Self {
            id: None,
            file_path: file_path.into(),
            kind,
            name,
            qualified_name,
            parent_name,
            start_line,
            end_line,
            docstring: None,
            signature: None,
            language,
            parent_entity_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

/// A directed edge as stored in `code_relationships`.
///
/// For `Imports`, `to_file` holds the raw module string as written in the
/// source. For `Calls`, `Inherits` and `Instantiates` it holds the bare
/// target name, which survives even when `to_entity_id` is unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub kind: RelationshipKind,
    pub from_entity_id: Option<i64>,
    pub to_entity_id: Option<i64>,
    pub from_file: Option<String>,
    pub to_file: Option<String>,
    /// `file:line` of the originating construct.
    pub location: Option<String>,
}

impl Relationship {
    /// New unsaved relationship originating in `from_file` at `line`.
    pub fn new(kind: RelationshipKind, from_file: &str, target: impl Into<String>, line: u32) -> Self {
        Self {
            id: None,
            kind,
            from_entity_id: None,
            to_entity_id: None,
            from_file: Some(from_file.to_string()),
            to_file: Some(target.into()),
            location: Some(format!("{from_file}:{line}")),
        }
    }
}

/// A relationship emitted by a parser, not yet resolved to entity ids.
///
/// `source` is the qualified name of the originating entity (the calling
/// function, the subclass). It only lives for the duration of one store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelationship {
    pub relationship: Relationship,
    pub source: Option<String>,
}

impl PendingRelationship {
    pub fn new(relationship: Relationship, source: Option<String>) -> Self {
        Self {
            relationship,
            source,
        }
    }

    /// Target text (`to_file`), empty when unset.
    pub fn target(&self) -> &str {
        self.relationship.to_file.as_deref().unwrap_or("")
    }
}

/// Everything one parser run yields for a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutput {
    pub entities: Vec<CodeEntity>,
    pub relationships: Vec<PendingRelationship>,
}

impl ParseOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Relationships of one kind, in emission order.
    pub fn relationships_of(&self, kind: RelationshipKind) -> impl Iterator<Item = &PendingRelationship> {
        self.relationships
            .iter()
            .filter(move |p| p.relationship.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
