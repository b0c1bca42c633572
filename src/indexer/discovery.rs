//! Source file discovery.
//!
//! Walks a project with the `ignore` crate so `.gitignore` files (when
//! enabled) and `.paranoidignore` files are honored at every level, then
//! applies the configured builtin and additional patterns on top. Only
//! files with a registered parser and within the size limit are returned.

use std::path::{Path, PathBuf};

use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::parser::detect_language;

/// Per-directory ignore file read in addition to `.gitignore`.
pub const PARANOID_IGNORE_FILE: &str = ".paranoidignore";

/// A file selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Language key as understood by the parser dispatcher.
    pub language: &'static str,
}

/// Collect analyzable files under `target`, which is either a directory
/// inside `root` or a single file. Results are sorted by path.
pub fn discover_files(root: &Path, target: &Path, config: &GraphConfig) -> Result<Vec<DiscoveredFile>> {
    let overrides = build_overrides(root, config)?;

    if target.is_file() {
        let selected = select(target, &overrides, config, false);
        return Ok(selected.into_iter().collect());
    }

    let walker = WalkBuilder::new(target)
        .standard_filters(config.ignore.use_gitignore)
        .hidden(false)
        .require_git(false)
        .add_custom_ignore_filename(PARANOID_IGNORE_FILE)
        .overrides(overrides.clone())
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable path during discovery");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        // The walker already applied the overrides.
        if let Some(file) = select(entry.path(), &overrides, config, true) {
            files.push(file);
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(target = %target.display(), files = files.len(), "discovered source files");
    Ok(files)
}

/// Ignore globs for the configured patterns, plus the tool directory.
fn build_overrides(root: &Path, config: &GraphConfig) -> Result<Override> {
    let mut builder = OverrideBuilder::new(root);
    let tool_dir = format!("{}/", config.tool_dir.trim_end_matches('/'));
    for pattern in config.ignore.patterns().chain(std::iter::once(tool_dir.as_str())) {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern.starts_with('#') {
            continue;
        }
        builder
            .add(&format!("!{pattern}"))
            .map_err(|e| GraphError::Config(format!("invalid ignore pattern {pattern:?}: {e}")))?;
    }
    builder
        .build()
        .map_err(|e| GraphError::Config(format!("invalid ignore patterns: {e}")))
}

fn select(path: &Path, overrides: &Override, config: &GraphConfig, walked: bool) -> Option<DiscoveredFile> {
    if !walked && is_overridden(path, overrides) {
        return None;
    }
    let language = detect_language(path)?;
    let size = std::fs::metadata(path).ok()?.len();
    if size > config.analysis.max_file_size {
        tracing::debug!(path = %path.display(), size, "skipping oversized file");
        return None;
    }
    Some(DiscoveredFile {
        path: path.to_path_buf(),
        language,
    })
}

/// Whether `path` or any of its ancestor directories under the override
/// root is ignored.
fn is_overridden(path: &Path, overrides: &Override) -> bool {
    if overrides.matched(path, false).is_ignore() {
        return true;
    }
    path.ancestors()
        .skip(1)
        .take_while(|dir| dir.starts_with(overrides.path()) && *dir != overrides.path())
        .any(|dir| overrides.matched(dir, true).is_ignore())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn names(root: &Path, files: &[DiscoveredFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn finds_supported_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.py", "x = 1\n");
        write(dir.path(), "a.ts", "let x = 1;\n");
        write(dir.path(), "src/c.jsx", "const x = 1;\n");
        write(dir.path(), "README.md", "# hi\n");

        let files = discover_files(dir.path(), dir.path(), &GraphConfig::default()).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["a.ts", "b.py", "src/c.jsx"]);
        assert_eq!(files[2].language, "javascript-react");
    }

    #[test]
    fn builtin_and_additional_patterns_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keep.py", "");
        write(dir.path(), "node_modules/lib/index.js", "");
        write(dir.path(), ".paranoid-coder/cache.py", "");
        write(dir.path(), "gen/out.py", "");

        let mut config = GraphConfig::default();
        config.ignore.additional_patterns.push("gen/".into());
        let files = discover_files(dir.path(), dir.path(), &config).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["keep.py"]);
    }

    #[test]
    fn gitignore_honored_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".gitignore", "build/\n");
        write(dir.path(), "build/out.py", "");
        write(dir.path(), "main.py", "");

        let config = GraphConfig::default();
        let files = discover_files(dir.path(), dir.path(), &config).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["main.py"]);

        let mut config = GraphConfig::default();
        config.ignore.use_gitignore = false;
        let files = discover_files(dir.path(), dir.path(), &config).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["build/out.py", "main.py"]);
    }

    #[test]
    fn paranoidignore_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".paranoidignore", "*_test.py\n");
        write(dir.path(), "mod.py", "");
        write(dir.path(), "mod_test.py", "");

        let files = discover_files(dir.path(), dir.path(), &GraphConfig::default()).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["mod.py"]);
    }

    #[test]
    fn oversized_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.py", &"x = 1\n".repeat(100));
        write(dir.path(), "small.py", "x = 1\n");

        let mut config = GraphConfig::default();
        config.analysis.max_file_size = 64;
        let files = discover_files(dir.path(), dir.path(), &config).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["small.py"]);
    }

    #[test]
    fn single_file_target() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one.py", "");
        write(dir.path(), "two.py", "");
        write(dir.path(), "node_modules/x.js", "");
        write(dir.path(), "notes.txt", "");

        let config = GraphConfig::default();
        let one = discover_files(dir.path(), &dir.path().join("one.py"), &config).unwrap();
        assert_eq!(names(dir.path(), &one), vec!["one.py"]);

        let ignored = discover_files(dir.path(), &dir.path().join("node_modules/x.js"), &config).unwrap();
        assert!(ignored.is_empty());
        let unsupported = discover_files(dir.path(), &dir.path().join("notes.txt"), &config).unwrap();
        assert!(unsupported.is_empty());
    }
}
