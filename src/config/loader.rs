//! Multi-source config loading with priority merging.
//!
//! Priority order (highest wins):
//!   Environment vars > Project config > User config > Defaults
//!
//! Also locates the project root by walking up to the tool directory.

use std::path::{Path, PathBuf};

use super::schema::{GraphConfig, DEFAULT_TOOL_DIR};
use crate::error::{GraphError, Result};

const YAML_CONFIG: &str = "config.yaml";
const LEGACY_JSON_CONFIG: &str = "config.json";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load configuration from all available sources and merge them.
///
/// Sources (low → high priority):
///   1. Built-in defaults
///   2. User config  (`~/.config/paranoid-coder/config.yaml` on Linux)
///   3. Project config (`<tool_dir>/config.yaml`, or the legacy
///      `<tool_dir>/config.json`, under `project_dir`)
///   4. Environment variables (`PARANOID_*`)
pub fn load_config(project_dir: Option<&Path>) -> Result<GraphConfig> {
    let mut config = GraphConfig::default();

    // Layer 2: user config
    if let Some(user) = load_user_config() {
        config = merge_configs(config, user);
    }

    // Layer 3: project config
    if let Some(dir) = project_dir {
        if let Some(project) = load_project_config(dir, &config.tool_dir) {
            config = merge_configs(config, project);
        }
    }

    // Layer 4: environment variables
    load_env_overrides(&mut config)?;

    Ok(config)
}

/// Load user config from the platform-specific config directory.
///
/// - macOS: `~/Library/Application Support/dev.paranoid.paranoid-coder/config.yaml`
/// - Linux: `~/.config/paranoid-coder/config.yaml`
/// - Windows: `%APPDATA%\paranoid\paranoid-coder\config\config.yaml`
///
/// Returns `None` if the file does not exist or is unparseable.
pub fn load_user_config() -> Option<GraphConfig> {
    let path = user_config_path()?;
    load_config_file(&path)
}

/// Load project config from `<dir>/<tool_dir>/config.yaml`, falling back to
/// the JSON config written by earlier releases.
///
/// Returns `None` if neither file exists or parses.
pub fn load_project_config(dir: &Path, tool_dir: &str) -> Option<GraphConfig> {
    let base = dir.join(tool_dir);
    load_config_file(&base.join(YAML_CONFIG)).or_else(|| load_config_file(&base.join(LEGACY_JSON_CONFIG)))
}

/// Apply environment variable overrides to a config in place.
///
/// Supported variables:
/// - `PARANOID_TOOL_DIR`: tool directory name
/// - `PARANOID_DATABASE`: database file name
/// - `PARANOID_USE_GITIGNORE`: `"1"`/`"true"`/`"yes"` to honor gitignore files
/// - `PARANOID_IGNORE`: comma-separated extra ignore patterns
/// - `PARANOID_MAX_FILE_SIZE`: byte limit for analyzed files
pub fn load_env_overrides(config: &mut GraphConfig) -> Result<()> {
    if let Ok(val) = std::env::var("PARANOID_TOOL_DIR") {
        if !val.trim().is_empty() {
            config.tool_dir = val.trim().to_string();
        }
    }

    if let Ok(val) = std::env::var("PARANOID_DATABASE") {
        if !val.trim().is_empty() {
            config.database = val.trim().to_string();
        }
    }

    if let Ok(val) = std::env::var("PARANOID_USE_GITIGNORE") {
        config.ignore.use_gitignore = matches!(val.trim(), "1" | "true" | "yes");
    }

    if let Ok(val) = std::env::var("PARANOID_IGNORE") {
        for pattern in val.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
            config.ignore.additional_patterns.push(pattern.to_string());
        }
    }

    if let Ok(val) = std::env::var("PARANOID_MAX_FILE_SIZE") {
        config.analysis.max_file_size = val.trim().parse().map_err(|_| {
            GraphError::Config(format!("PARANOID_MAX_FILE_SIZE is not a byte count: {val:?}"))
        })?;
    }

    Ok(())
}

/// Walk up from `start` to the nearest directory containing `tool_dir`.
///
/// A file path starts the search at its parent directory.
pub fn find_project_root(start: &Path, tool_dir: &str) -> Option<PathBuf> {
    let resolved = start.canonicalize().ok()?;
    let mut current = if resolved.is_file() {
        resolved.parent()?.to_path_buf()
    } else {
        resolved
    };
    loop {
        if current.join(tool_dir).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// [`find_project_root`] with the default tool directory, failing with
/// [`GraphError::ProjectNotFound`] when no project encloses `start`.
pub fn require_project_root(start: &Path) -> Result<PathBuf> {
    find_project_root(start, DEFAULT_TOOL_DIR)
        .ok_or_else(|| GraphError::ProjectNotFound(start.to_path_buf()))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Platform-specific user config path via the `directories` crate.
fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "paranoid", "paranoid-coder")
        .map(|dirs| dirs.config_dir().join(YAML_CONFIG))
}

/// Try to load and parse a YAML or JSON config file. Returns `None` on any
/// error; a file that exists but fails to parse is logged.
fn load_config_file(path: &Path) -> Option<GraphConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    let parsed = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&contents).map_err(GraphError::from)
    } else {
        serde_yaml::from_str(&contents).map_err(GraphError::from)
    };
    match parsed {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` fields that differ from the defaults take
/// priority over `base`. Additional ignore patterns accumulate.
fn merge_configs(mut base: GraphConfig, overlay: GraphConfig) -> GraphConfig {
    let defaults = GraphConfig::default();

    if overlay.tool_dir != defaults.tool_dir {
        base.tool_dir = overlay.tool_dir;
    }
    if overlay.database != defaults.database {
        base.database = overlay.database;
    }

    // Ignore
    if overlay.ignore.use_gitignore != defaults.ignore.use_gitignore {
        base.ignore.use_gitignore = overlay.ignore.use_gitignore;
    }
    if overlay.ignore.builtin_patterns != defaults.ignore.builtin_patterns {
        base.ignore.builtin_patterns = overlay.ignore.builtin_patterns;
    }
    for pattern in overlay.ignore.additional_patterns {
        if !base.ignore.additional_patterns.contains(&pattern) {
            base.ignore.additional_patterns.push(pattern);
        }
    }

    // Analysis
    if overlay.analysis.max_file_size != defaults.analysis.max_file_size {
        base.analysis.max_file_size = overlay.analysis.max_file_size;
    }
    if overlay.analysis.relink_unresolved != defaults.analysis.relink_unresolved {
        base.analysis.relink_unresolved = overlay.analysis.relink_unresolved;
    }

    base
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
