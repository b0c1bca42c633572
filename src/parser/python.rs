//! Python extractor.
//!
//! Walks module-level statements only: imports, classes (with their
//! methods) and functions. Decorators are unwrapped but not interpreted.
//! Nested functions are not entities; calls inside them are attributed to
//! the enclosing top-level function or method.

use tree_sitter::Node;

use super::{
    end_line, first_statement, named_children, node_text, parse_clean, start_line,
    strip_string_literal, walk_preorder, LanguageParser, ANONYMOUS,
};
use crate::types::{
    CodeEntity, EntityKind, Language, ParseOutput, PendingRelationship, Relationship,
    RelationshipKind,
};

const STRING_PREFIXES: &[char] = &['r', 'R', 'b', 'B', 'u', 'U', 'f', 'F'];
const QUOTES: &[char] = &['"', '\''];

/// Extractor for `.py` / `.pyi` sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageParser for PythonParser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse_source(&self, file_path: &str, source: &[u8]) -> ParseOutput {
        let grammar: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let Some(tree) = parse_clean(&grammar, source) else {
            return ParseOutput::empty();
        };

        let mut cx = Extraction {
            file_path,
            source,
            out: ParseOutput::empty(),
        };
        for child in named_children(&tree.root_node()) {
            match child.kind() {
                "import_statement" => cx.import_statement(child),
                "import_from_statement" => cx.import_from_statement(child),
                _ => match unwrap_decorated(child) {
                    Some(def) if def.kind() == "class_definition" => cx.class(def),
                    Some(def) if def.kind() == "function_definition" => {
                        cx.function(def, None);
                    }
                    _ => {}
                },
            }
        }
        cx.out
    }
}

/// The definition inside a `decorated_definition`, or the node itself.
fn unwrap_decorated(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition")
    } else {
        Some(node)
    }
}

/// Per-file extraction state.
struct Extraction<'s> {
    file_path: &'s str,
    source: &'s [u8],
    out: ParseOutput,
}

impl Extraction<'_> {
    fn text(&self, node: &Node<'_>) -> String {
        node_text(node, self.source)
    }

    fn push(&mut self, kind: RelationshipKind, target: String, line: u32, source: Option<String>) {
        let rel = Relationship::new(kind, self.file_path, target, line);
        self.out
            .relationships
            .push(PendingRelationship::new(rel, source));
    }

    /// `import a.b, c as d` yields one import per module (`a.b`, `c`).
    fn import_statement(&mut self, node: Node<'_>) {
        let line = start_line(&node);
        let mut cursor = node.walk();
        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let module = match name.kind() {
                "aliased_import" => name.child_by_field_name("name"),
                _ => Some(name),
            };
            if let Some(module) = module {
                let text = self.text(&module);
                self.push(RelationshipKind::Imports, text, line, None);
            }
        }
    }

    /// `from a.b import x, y` yields a single import of `a.b`.
    fn import_from_statement(&mut self, node: Node<'_>) {
        if let Some(module) = node.child_by_field_name("module_name") {
            let text = self.text(&module);
            self.push(RelationshipKind::Imports, text, start_line(&node), None);
        }
    }

    fn class(&mut self, node: Node<'_>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node);
        let body = node.child_by_field_name("body");

        let mut entity = CodeEntity::new(
            self.file_path,
            EntityKind::Class,
            name,
            None,
            Language::Python,
            start_line(&node),
            end_line(&node),
        );
        entity.docstring = body.and_then(|b| self.docstring(&b));
        let qualified = entity.qualified_name.clone();
        self.out.entities.push(entity);

        if let Some(bases) = node.child_by_field_name("superclasses") {
            for base in named_children(&bases) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    let target = self.text(&base);
                    self.push(
                        RelationshipKind::Inherits,
                        target,
                        start_line(&base),
                        Some(qualified.clone()),
                    );
                }
            }
        }

        let Some(body) = body else {
            return;
        };
        for member in named_children(&body) {
            if let Some(def) = unwrap_decorated(member) {
                if def.kind() == "function_definition" {
                    self.function(def, Some(&qualified));
                }
            }
        }
    }

    fn function(&mut self, node: Node<'_>, parent: Option<&str>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(&n))
            .unwrap_or_else(|| ANONYMOUS.to_string());
        let kind = if parent.is_some() {
            EntityKind::Method
        } else {
            EntityKind::Function
        };
        let body = node.child_by_field_name("body");

        let mut entity = CodeEntity::new(
            self.file_path,
            kind,
            name,
            parent.map(str::to_string),
            Language::Python,
            start_line(&node),
            end_line(&node),
        );
        entity.signature = Some(
            node.child_by_field_name("parameters")
                .map(|p| self.text(&p))
                .unwrap_or_else(|| "()".to_string()),
        );
        entity.docstring = body.and_then(|b| self.docstring(&b));

        let caller = (entity.name != ANONYMOUS).then(|| entity.qualified_name.clone());
        self.out.entities.push(entity);

        if let Some(body) = body {
            self.calls(body, caller);
        }
    }

    /// A bare string as the first statement of a block.
    fn docstring(&self, body: &Node<'_>) -> Option<String> {
        let first = first_statement(body)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let expr = first.named_child(0)?;
        if expr.kind() != "string" {
            return None;
        }
        strip_string_literal(&self.text(&expr), STRING_PREFIXES, QUOTES)
    }

    /// One `Calls` per call site anywhere under `body`.
    fn calls(&mut self, body: Node<'_>, caller: Option<String>) {
        let mut sites: Vec<(String, u32)> = Vec::new();
        walk_preorder(body, |node| {
            if node.kind() == "call" {
                if let Some(func) = node.child_by_field_name("function") {
                    sites.push((self.callee_name(&func), start_line(&func)));
                }
            }
            true
        });
        for (target, line) in sites {
            self.push(RelationshipKind::Calls, target, line, caller.clone());
        }
    }

    /// `f` for `f()`, `m` for `obj.m()`, full text otherwise.
    fn callee_name(&self, func: &Node<'_>) -> String {
        match func.kind() {
            "attribute" => func
                .child_by_field_name("attribute")
                .map(|attr| self.text(&attr))
                .unwrap_or_else(|| self.text(func)),
            _ => self.text(func),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
