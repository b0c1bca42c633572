//! Configuration data structures.
//!
//! Defines the YAML config format: where the graph database lives, which
//! files discovery skips, and analysis limits. Every field has a serde
//! default so partial files load cleanly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default per-project tool directory.
pub const DEFAULT_TOOL_DIR: &str = ".paranoid-coder";

/// Default database file name inside the tool directory.
pub const DEFAULT_DATABASE: &str = "summaries.db";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the code graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Directory (relative to the project root) holding the database.
    #[serde(default = "default_tool_dir")]
    pub tool_dir: String,

    /// Database file name inside `tool_dir`.
    #[serde(default = "default_database")]
    pub database: String,

    /// File discovery filters.
    #[serde(default)]
    pub ignore: IgnoreConfig,

    /// Analysis limits and behavior.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tool_dir: default_tool_dir(),
            database: default_database(),
            ignore: IgnoreConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl GraphConfig {
    /// `<project_root>/<tool_dir>`.
    pub fn tool_dir_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.tool_dir)
    }

    /// `<project_root>/<tool_dir>/<database>`.
    pub fn database_path(&self, project_root: &Path) -> PathBuf {
        self.tool_dir_path(project_root).join(&self.database)
    }
}

fn default_tool_dir() -> String {
    DEFAULT_TOOL_DIR.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

// ---------------------------------------------------------------------------
// IgnoreConfig
// ---------------------------------------------------------------------------

/// Which files discovery skips, in gitignore syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Honor `.gitignore`, `.ignore` and git exclude files.
    #[serde(default = "default_true")]
    pub use_gitignore: bool,

    /// Patterns always applied.
    #[serde(default = "default_builtin_patterns")]
    pub builtin_patterns: Vec<String>,

    /// Extra project- or user-supplied patterns.
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_gitignore: true,
            builtin_patterns: default_builtin_patterns(),
            additional_patterns: Vec::new(),
        }
    }
}

impl IgnoreConfig {
    /// Builtin then additional patterns.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.builtin_patterns
            .iter()
            .chain(self.additional_patterns.iter())
            .map(String::as_str)
    }
}

fn default_true() -> bool {
    true
}

fn default_builtin_patterns() -> Vec<String> {
    [
        ".git/",
        ".paranoid-coder/",
        "node_modules/",
        "__pycache__/",
        ".venv/",
        "venv/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// AnalysisConfig
// ---------------------------------------------------------------------------

/// Analysis knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Files larger than this many bytes are skipped during discovery.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// After storing a file, link earlier unresolved `calls`/`inherits`
    /// rows in other files to the entities it defines.
    #[serde(default = "default_true")]
    pub relink_unresolved: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            relink_unresolved: true,
        }
    }
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.tool_dir, ".paranoid-coder");
        assert_eq!(config.database, "summaries.db");
        assert!(config.ignore.use_gitignore);
        assert!(config.ignore.builtin_patterns.contains(&".git/".to_string()));
        assert_eq!(config.analysis.max_file_size, 2 * 1024 * 1024);
        assert!(config.analysis.relink_unresolved);
    }

    #[test]
    fn test_database_path() {
        let config = GraphConfig::default();
        assert_eq!(
            config.database_path(Path::new("/proj")),
            PathBuf::from("/proj/.paranoid-coder/summaries.db")
        );
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: GraphConfig = serde_yaml::from_str(
            "ignore:\n  additional_patterns:\n    - \"*.min.js\"\nanalysis:\n  relink_unresolved: false\n",
        )
        .unwrap();
        assert_eq!(config.tool_dir, ".paranoid-coder");
        assert!(config.ignore.use_gitignore);
        assert_eq!(config.ignore.additional_patterns, vec!["*.min.js"]);
        assert!(!config.analysis.relink_unresolved);
        assert_eq!(config.analysis.max_file_size, 2 * 1024 * 1024);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config: GraphConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn test_patterns_order() {
        let mut ignore = IgnoreConfig::default();
        ignore.additional_patterns.push("dist/".into());
        let all: Vec<&str> = ignore.patterns().collect();
        assert_eq!(all.first(), Some(&".git/"));
        assert_eq!(all.last(), Some(&"dist/"));
    }
}
