//! Language parsers: source file in, entities and relationships out.
//!
//! Each parser owns one language family and works on a tree-sitter
//! concrete syntax tree. Parsers never fail: unreadable files and sources
//! that do not parse cleanly yield an empty [`ParseOutput`]. The only error
//! in this layer is asking the [`ParserDispatcher`] for a language it does
//! not know.
//!
//! - [`python`]: `.py` / `.pyi`
//! - [`javascript`]: `.js` / `.jsx` / `.mjs` / `.cjs`
//! - [`typescript`]: `.ts` / `.tsx`
//! - [`ecmascript`]: the tree walk shared by the JavaScript and TypeScript parsers

pub mod dispatcher;
pub mod ecmascript;
pub mod javascript;
pub mod python;
pub mod typescript;

use std::path::Path;

use tree_sitter::{Node, Tree};

use crate::paths::normalize_path;
use crate::types::{Language, ParseOutput};

pub use dispatcher::{detect_language, ParserDispatcher};
pub use javascript::JavaScriptParser;
pub use python::PythonParser;
pub use typescript::TypeScriptParser;

/// Placeholder name for functions and methods without one.
pub const ANONYMOUS: &str = "<anonymous>";

/// One language family's extractor.
pub trait LanguageParser: Send + Sync {
    /// Canonical language this parser produces entities for.
    fn language(&self) -> Language;

    /// Extract from in-memory source. `file_path` is recorded verbatim on
    /// every entity and relationship, so callers pass a normalized path.
    fn parse_source(&self, file_path: &str, source: &[u8]) -> ParseOutput;

    /// Read and extract a file. Missing or unreadable files yield empty output.
    fn parse_file(&self, path: &Path) -> ParseOutput {
        if !path.is_file() {
            return ParseOutput::empty();
        }
        match std::fs::read(path) {
            Ok(source) => self.parse_source(&normalize_path(path), &source),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "unreadable source file");
                ParseOutput::empty()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared tree-sitter helpers
// ---------------------------------------------------------------------------

/// Parse `source` with a fresh tree-sitter parser.
///
/// `tree_sitter::Parser` is `!Sync`, so one is built per call rather than
/// stored on the (shared, zero-sized) language parsers. Returns `None` when
/// the grammar cannot be loaded, parsing is cancelled, or the tree contains
/// syntax errors.
pub(crate) fn parse_clean(language: &tree_sitter::Language, source: &[u8]) -> Option<Tree> {
    let mut parser = tree_sitter::Parser::new();
    if let Err(e) = parser.set_language(language) {
        tracing::warn!(error = %e, "tree-sitter language version mismatch");
        return None;
    }
    let tree = parser.parse(source, None)?;
    if tree.root_node().has_error() {
        return None;
    }
    Some(tree)
}

/// Source text spanned by `node`.
pub(crate) fn node_text(node: &Node<'_>, source: &[u8]) -> String {
    let start = node.start_byte().min(source.len());
    let end = node.end_byte().min(source.len());
    String::from_utf8_lossy(&source[start..end]).into_owned()
}

/// 1-based first line of `node`.
pub(crate) fn start_line(node: &Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based last line of `node`.
pub(crate) fn end_line(node: &Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

/// Named children of `node`, collected so callers can iterate freely.
pub(crate) fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// First named child that is not a comment.
pub(crate) fn first_statement<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    named_children(node)
        .into_iter()
        .find(|child| child.kind() != "comment")
}

/// Visit `root` and all of its descendants in source order.
///
/// Uses an explicit stack so deeply nested bodies cannot exhaust the call
/// stack. `visit` returns `false` to skip a node's subtree.
pub(crate) fn walk_preorder<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>) -> bool) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !visit(node) {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// Strip surrounding quote characters and whitespace from a string literal.
///
/// `prefixes` lists literal prefix letters (Python's `r`, `b`, `u`, `f`)
/// removed before the quotes. Empty results become `None`.
pub(crate) fn strip_string_literal(raw: &str, prefixes: &[char], quotes: &[char]) -> Option<String> {
    let unprefixed = raw.trim_start_matches(|c: char| prefixes.contains(&c));
    let inner = unprefixed.trim_matches(|c: char| quotes.contains(&c)).trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn python() -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    #[test]
    fn test_parse_clean_rejects_syntax_errors() {
        assert!(parse_clean(&python(), b"def f(:\n  pass\n").is_none());
        assert!(parse_clean(&python(), b"def f():\n    pass\n").is_some());
    }

    #[test]
    fn test_walk_preorder_is_source_order() {
        let src = b"a(1)\nb(2)\n";
        let tree = parse_clean(&python(), src).unwrap();
        let mut calls = Vec::new();
        walk_preorder(tree.root_node(), |n| {
            if n.kind() == "call" {
                calls.push(node_text(&n, src));
            }
            true
        });
        assert_eq!(calls, vec!["a(1)", "b(2)"]);
    }

    #[test]
    fn test_walk_preorder_can_prune() {
        let src = b"def f():\n    g()\n";
        let tree = parse_clean(&python(), src).unwrap();
        let mut saw_call = false;
        walk_preorder(tree.root_node(), |n| {
            if n.kind() == "call" {
                saw_call = true;
            }
            n.kind() != "function_definition"
        });
        assert!(!saw_call);
    }

    #[test]
    fn test_strip_string_literal() {
        let q = ['"', '\''];
        assert_eq!(
            strip_string_literal("\"\"\"  Doc here.  \"\"\"", &[], &q).as_deref(),
            Some("Doc here.")
        );
        assert_eq!(
            strip_string_literal("r'raw'", &['r', 'b', 'u', 'f'], &q).as_deref(),
            Some("raw")
        );
        assert_eq!(strip_string_literal("''", &[], &q), None);
    }

    #[test]
    fn test_lines_are_one_based() {
        let src = b"\n\ndef f():\n    pass\n";
        let tree = parse_clean(&python(), src).unwrap();
        let func = first_statement(&tree.root_node()).unwrap();
        assert_eq!(start_line(&func), 3);
        assert_eq!(end_line(&func), 4);
    }
}
