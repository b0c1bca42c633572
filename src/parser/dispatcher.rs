//! Language-key dispatch over the registered parsers.

use std::path::Path;

use super::{JavaScriptParser, LanguageParser, PythonParser, TypeScriptParser};
use crate::error::{GraphError, Result};
use crate::types::{Language, ParseOutput};

static PYTHON: PythonParser = PythonParser;
static JAVASCRIPT: JavaScriptParser = JavaScriptParser;
static TYPESCRIPT: TypeScriptParser = TypeScriptParser;

/// Every language key accepted by [`ParserDispatcher::parse_file`], in the
/// form [`detect_language`] produces them.
const LANGUAGE_KEYS: &[&str] = &[
    "python",
    "javascript",
    "javascript-react",
    "typescript",
    "typescript-react",
];

/// Map a file to its language key from the extension.
///
/// React variants keep their own key (`javascript-react` for `.jsx`,
/// `typescript-react` for `.tsx`) even though they share a parser.
pub fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "py" | "pyi" => Some("python"),
        "js" | "mjs" | "cjs" => Some("javascript"),
        "jsx" => Some("javascript-react"),
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" => Some("typescript-react"),
        _ => None,
    }
}

/// Routes a language key to the parser registered for its family.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParserDispatcher;

impl ParserDispatcher {
    pub fn new() -> Self {
        Self
    }

    fn parser_for(language: &str) -> Option<&'static dyn LanguageParser> {
        if !LANGUAGE_KEYS.contains(&language) {
            return None;
        }
        match Language::from_str_loose(language)? {
            Language::Python => Some(&PYTHON),
            Language::JavaScript => Some(&JAVASCRIPT),
            Language::TypeScript => Some(&TYPESCRIPT),
        }
    }

    /// Whether a parser is registered for `language`.
    pub fn supports(&self, language: &str) -> bool {
        Self::parser_for(language).is_some()
    }

    /// All accepted language keys.
    pub fn supported_languages(&self) -> &'static [&'static str] {
        LANGUAGE_KEYS
    }

    /// Parse `path` with the parser for `language`.
    ///
    /// An unknown language key is the only error; anything wrong with the
    /// file itself yields an empty output.
    pub fn parse_file(&self, path: &Path, language: &str) -> Result<ParseOutput> {
        let parser = Self::parser_for(language)
            .ok_or_else(|| GraphError::UnsupportedLanguage(language.to_string()))?;
        Ok(parser.parse_file(path))
    }

    /// Detect the language of `path` and parse it. `Ok(None)` when the
    /// extension maps to no language.
    pub fn parse_detected(&self, path: &Path) -> Result<Option<ParseOutput>> {
        match detect_language(path) {
            Some(language) => self.parse_file(path, language).map(Some),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("a/b.py")), Some("python"));
        assert_eq!(detect_language(Path::new("x.jsx")), Some("javascript-react"));
        assert_eq!(detect_language(Path::new("x.tsx")), Some("typescript-react"));
        assert_eq!(detect_language(Path::new("x.mjs")), Some("javascript"));
        assert_eq!(detect_language(Path::new("Makefile")), None);
        assert_eq!(detect_language(Path::new("lib.rs")), None);
    }

    #[test]
    fn test_supports_all_keys() {
        let d = ParserDispatcher::new();
        for key in d.supported_languages() {
            assert!(d.supports(key), "{key} should be supported");
        }
        assert!(!d.supports("rust"));
        assert!(!d.supports(""));
    }

    #[test]
    fn test_unsupported_language_is_an_error() {
        let d = ParserDispatcher::new();
        let err = d.parse_file(Path::new("/tmp/x.rb"), "ruby").unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedLanguage(ref l) if l == "ruby"));
        assert_eq!(err.to_string(), "No parser available for language: ruby");
    }

    #[test]
    fn test_react_variant_uses_canonical_parser() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Button.jsx");
        std::fs::write(&file, "export function Button() { return <b />; }\n").unwrap();

        let out = ParserDispatcher::new()
            .parse_file(&file, "javascript-react")
            .unwrap();
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].kind, EntityKind::Function);
        assert_eq!(out.entities[0].language, Language::JavaScript);
    }

    #[test]
    fn test_missing_file_is_empty_not_error() {
        let out = ParserDispatcher::new()
            .parse_file(Path::new("/no/such/dir/a.py"), "python")
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_parse_detected() {
        let dir = tempfile::tempdir().unwrap();
        let py = dir.path().join("m.py");
        let txt = dir.path().join("notes.txt");
        std::fs::write(&py, "def f():\n    pass\n").unwrap();
        std::fs::write(&txt, "hello").unwrap();

        let d = ParserDispatcher::new();
        assert_eq!(d.parse_detected(&py).unwrap().unwrap().entities.len(), 1);
        assert!(d.parse_detected(&txt).unwrap().is_none());
    }
}
