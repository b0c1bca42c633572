//! Path normalization and import-specifier resolution.
//!
//! Every path written to or looked up in the store goes through
//! [`normalize_path`], so the same file always maps to the same key: an
//! absolute, forward-slash string with symlinks resolved when the file exists.

use std::path::{Component, Path, PathBuf};

/// Extensions stripped when deriving a dotted module name.
const MODULE_EXTENSIONS: &[&str] = &["py", "pyi", "js", "jsx", "ts", "tsx", "mjs", "cjs"];

/// Package marker files that stand for their directory.
const PACKAGE_MARKERS: &[&str] = &["__init__.py", "__init__.pyi"];

/// Suffixes appended to an extensionless relative specifier, in order.
const RELATIVE_EXTENSIONS: &[&str] = &[".js", ".ts", ".tsx", ".jsx", ".mjs", ".cjs"];

/// Directory entry points tried when the specifier names a directory.
const INDEX_FILES: &[&str] = &["index.js", "index.ts", "index.tsx", "index.jsx"];

/// Normalize a path into its canonical storage key.
///
/// Relative paths are joined onto the current directory. Existing paths are
/// canonicalized; missing ones are cleaned lexically (`.` and `..` folded).
pub fn normalize_path(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let resolved = absolute
        .canonicalize()
        .unwrap_or_else(|_| lexical_clean(&absolute));
    to_forward_slashes(&resolved)
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// Unlike a plain component join, the root and any drive prefix are kept,
/// and `..` never climbs above the root.
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if !at_root {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_forward_slashes(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    // Verbatim prefix produced by canonicalize on Windows.
    match s.strip_prefix("//?/") {
        Some(rest) => rest.to_string(),
        None => s,
    }
}

/// Path of `file` relative to `root`, both already normalized.
fn relative_to<'a>(file: &'a str, root: &str) -> Option<&'a str> {
    let root = root.trim_end_matches('/');
    file.strip_prefix(root)?.strip_prefix('/')
}

/// Derive the dotted module name of a file relative to the project root.
///
/// `src/foo/bar.py` becomes `src.foo.bar` and `pkg/__init__.py` becomes
/// `pkg`. JS/TS files follow the same convention. Returns `None` for files
/// outside the root or with nothing left after stripping.
pub fn module_name_for_path(file_path: &str, project_root: &str) -> Option<String> {
    let file = normalize_path(file_path);
    let root = normalize_path(project_root);
    let rel = relative_to(&file, &root)?;

    let mut parts: Vec<&str> = rel.split('/').filter(|p| !p.is_empty()).collect();
    let last = parts.pop()?;
    if !PACKAGE_MARKERS.contains(&last) {
        let stem = match last.rsplit_once('.') {
            Some((stem, ext)) if MODULE_EXTENSIONS.contains(&ext) && !stem.is_empty() => stem,
            _ => last,
        };
        parts.push(stem);
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

/// Whether an import specifier is relative (`./x`, `../x`).
pub fn is_relative_import(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".."
}

/// Resolve a relative JS/TS import specifier to an existing file.
///
/// The specifier is joined onto the importing file's directory and must stay
/// under `project_root`. Candidates, in order: the literal path, the path with
/// each known extension appended, the path with a `.js`-family extension
/// swapped for its TypeScript counterpart, then `index.*` inside it.
pub fn resolve_relative_import(from_file: &str, specifier: &str, project_root: &str) -> Option<String> {
    if !is_relative_import(specifier) {
        return None;
    }

    let from_dir = Path::new(from_file).parent()?;
    let root = PathBuf::from(normalize_path(project_root));
    let target = lexical_clean(&from_dir.join(specifier));
    if !target.starts_with(&root) {
        return None;
    }

    if target.is_file() {
        return Some(normalize_path(&target));
    }

    let target_str = target.to_string_lossy();
    for ext in RELATIVE_EXTENSIONS {
        let candidate = PathBuf::from(format!("{target_str}{ext}"));
        if candidate.is_file() {
            return Some(normalize_path(&candidate));
        }
    }

    // `import "./util.js"` in a TypeScript project refers to `util.ts`.
    if let Some(ext) = target.extension().and_then(|e| e.to_str()) {
        let swaps: &[&str] = match ext {
            "js" | "mjs" | "cjs" => &["ts", "tsx"],
            "jsx" => &["tsx"],
            _ => &[],
        };
        for swap in swaps {
            let candidate = target.with_extension(swap);
            if candidate.is_file() {
                return Some(normalize_path(&candidate));
            }
        }
    }

    for index in INDEX_FILES {
        let candidate = target.join(index);
        if candidate.is_file() {
            return Some(normalize_path(&candidate));
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
