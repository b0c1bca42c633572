//! JavaScript / JSX extractor.

use super::{ecmascript, LanguageParser};
use crate::types::{Language, ParseOutput};

/// Extractor for `.js`, `.jsx`, `.mjs` and `.cjs` sources. The JavaScript
/// grammar parses JSX natively, so one grammar serves all four.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaScriptParser;

impl JavaScriptParser {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageParser for JavaScriptParser {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn parse_source(&self, file_path: &str, source: &[u8]) -> ParseOutput {
        let grammar: tree_sitter::Language = tree_sitter_javascript::LANGUAGE.into();
        ecmascript::extract(Language::JavaScript, &grammar, file_path, source)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
