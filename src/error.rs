//! Unified error type for the code graph.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No parser available for language: {0}")]
    UnsupportedLanguage(String),

    #[error("migration to schema v{version} failed: {source}")]
    Migration {
        version: i64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no initialized project found at or above {}", .0.display())]
    ProjectNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, GraphError>;
