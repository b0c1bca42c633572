//! paranoid-graph: a cross-file code graph for Python, JavaScript and
//! TypeScript sources.
//!
//! Parsers turn source files into declarations and relationships, the store
//! persists and resolves them in SQLite, and the query layer answers
//! callers, callees, imports, importers, inheritance and definition lookups.

pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod observability;
pub mod parser;
pub mod paths;
pub mod types;

pub use config::GraphConfig;
pub use error::{GraphError, Result};
pub use graph::{GraphQueries, GraphStore};
pub use indexer::{AnalysisPipeline, AnalysisReport, AnalyzeOptions};
pub use parser::{LanguageParser, ParserDispatcher};
pub use types::{CodeEntity, EntityKind, Language, ParseOutput, PendingRelationship, Relationship, RelationshipKind};
