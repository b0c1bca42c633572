//! Configuration system: YAML schema and the layered loader.

pub mod loader;
pub mod schema;

// Re-export the most commonly used types.
pub use loader::{find_project_root, load_config, require_project_root};
pub use schema::{AnalysisConfig, GraphConfig, IgnoreConfig, DEFAULT_DATABASE, DEFAULT_TOOL_DIR};
