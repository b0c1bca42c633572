//! Tree walk shared by the JavaScript and TypeScript extractors.
//!
//! Both grammars agree on the shapes that matter here: `import_statement`,
//! `export_statement`, `function_declaration`, `class_declaration` with a
//! `class_body` of `method_definition`s, and `const f = () => {}` style
//! declarations. TypeScript adds `abstract_class_declaration` and wraps
//! base classes in an `extends_clause`; both are handled below.

use tree_sitter::Node;

use super::{
    end_line, first_statement, named_children, node_text, parse_clean, start_line,
    strip_string_literal, walk_preorder, ANONYMOUS,
};
use crate::types::{
    CodeEntity, EntityKind, Language, ParseOutput, PendingRelationship, Relationship,
    RelationshipKind,
};

const QUOTES: &[char] = &['"', '\'', '`'];

/// Node kinds that evaluate to a function value.
const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Extract entities and relationships from a JS or TS source.
pub(crate) fn extract(
    language: Language,
    grammar: &tree_sitter::Language,
    file_path: &str,
    source: &[u8],
) -> ParseOutput {
    let Some(tree) = parse_clean(grammar, source) else {
        return ParseOutput::empty();
    };
    let mut cx = Extraction {
        language,
        file_path,
        source,
        out: ParseOutput::empty(),
    };
    for statement in named_children(&tree.root_node()) {
        cx.top_level(statement);
    }
    cx.out
}

struct Extraction<'s> {
    language: Language,
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

    fn top_level(&mut self, node: Node<'_>) {
        match node.kind() {
            "import_statement" => {
                if let Some(src) = node.child_by_field_name("source") {
                    self.import(&src, start_line(&node));
                }
            }
            "export_statement" => self.export(node),
            "expression_statement" => {
                if let Some(expr) = node.named_child(0) {
                    if let Some(spec) = self.require_specifier(&expr) {
                        self.push(RelationshipKind::Imports, spec, start_line(&node), None);
                    }
                }
            }
            _ => self.declaration(node),
        }
    }

    /// Declarations valid both bare and behind `export`.
    fn declaration(&mut self, node: Node<'_>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                self.function(node, node, None);
            }
            "class_declaration" | "abstract_class_declaration" => self.class(node),
            "lexical_declaration" | "variable_declaration" => self.variables(node),
            _ => {}
        }
    }

    fn export(&mut self, node: Node<'_>) {
        // export { a } from "./a";  export * from "./b";
        if let Some(src) = node.child_by_field_name("source") {
            self.import(&src, start_line(&node));
            return;
        }
        if let Some(decl) = node.child_by_field_name("declaration") {
            self.declaration(decl);
            return;
        }
        // export default function () {}
        if let Some(value) = node.child_by_field_name("value") {
            if FUNCTION_VALUES.contains(&value.kind()) {
                self.function(value, value, None);
            }
        }
    }

    fn import(&mut self, string: &Node<'_>, line: u32) {
        if let Some(spec) = strip_string_literal(&self.text(string), &[], QUOTES) {
            self.push(RelationshipKind::Imports, spec, line, None);
        }
    }

    /// Module specifier of a `require("x")` call.
    fn require_specifier(&self, node: &Node<'_>) -> Option<String> {
        if node.kind() != "call_expression" {
            return None;
        }
        let func = node.child_by_field_name("function")?;
        if func.kind() != "identifier" || self.text(&func) != "require" {
            return None;
        }
        let arg = node.child_by_field_name("arguments")?.named_child(0)?;
        if arg.kind() != "string" {
            return None;
        }
        strip_string_literal(&self.text(&arg), &[], QUOTES)
    }

    /// `const f = () => {}`, `let g = function () {}`, `const x = require("x")`.
    fn variables(&mut self, node: Node<'_>) {
        for declarator in named_children(&node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(value) = declarator.child_by_field_name("value") else {
                continue;
            };
            if let Some(spec) = self.require_specifier(&value) {
                self.push(RelationshipKind::Imports, spec, start_line(&node), None);
                continue;
            }
            if !FUNCTION_VALUES.contains(&value.kind()) {
                continue;
            }
            let name = declarator
                .child_by_field_name("name")
                .filter(|n| n.kind() == "identifier")
                .map(|n| self.text(&n));
            if let Some(name) = name {
                self.function_named(name, node, value, None);
            }
        }
    }

    /// A function whose name (if any) is on `func` itself.
    fn function(&mut self, span: Node<'_>, func: Node<'_>, parent: Option<&str>) {
        let name = func
            .child_by_field_name("name")
            .map(|n| self.text(&n))
            .unwrap_or_else(|| ANONYMOUS.to_string());
        self.function_named(name, span, func, parent);
    }

    /// Record a function or method entity. `span` provides the line range,
    /// `func` the parameters and body.
    fn function_named(&mut self, name: String, span: Node<'_>, func: Node<'_>, parent: Option<&str>) {
        let kind = if parent.is_some() {
            EntityKind::Method
        } else {
            EntityKind::Function
        };
        let body = func.child_by_field_name("body");

        let mut entity = CodeEntity::new(
            self.file_path,
            kind,
            name,
            parent.map(str::to_string),
            self.language,
            start_line(&span),
            end_line(&span),
        );
        entity.signature = Some(
            func.child_by_field_name("parameters")
                .or_else(|| func.child_by_field_name("parameter"))
                .map(|p| self.text(&p))
                .unwrap_or_else(|| "()".to_string()),
        );
        entity.docstring = body.and_then(|b| self.docstring(&b));

        let caller = (entity.name != ANONYMOUS).then(|| entity.qualified_name.clone());
        self.out.entities.push(entity);

        if let Some(body) = body {
            self.call_sites(body, caller);
        }
    }

    fn class(&mut self, node: Node<'_>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node);
        let entity = CodeEntity::new(
            self.file_path,
            EntityKind::Class,
            name,
            None,
            self.language,
            start_line(&node),
            end_line(&node),
        );
        let qualified = entity.qualified_name.clone();
        self.out.entities.push(entity);

        for base in self.base_classes(&node) {
            let target = self.text(&base);
            self.push(
                RelationshipKind::Inherits,
                target,
                start_line(&base),
                Some(qualified.clone()),
            );
        }

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        for member in named_children(&body) {
            if member.kind() == "method_definition" {
                self.function(member, member, Some(&qualified));
            }
        }
    }

    /// Base expressions after `extends`. `implements` clauses are ignored.
    fn base_classes<'t>(&self, class: &Node<'t>) -> Vec<Node<'t>> {
        let mut bases = Vec::new();
        let Some(heritage) = named_children(class)
            .into_iter()
            .find(|c| c.kind() == "class_heritage")
        else {
            return bases;
        };
        for part in named_children(&heritage) {
            match part.kind() {
                // TypeScript: extends_clause { value: expr, type_arguments }
                "extends_clause" => {
                    let mut cursor = part.walk();
                    bases.extend(part.children_by_field_name("value", &mut cursor));
                }
                "implements_clause" => {}
                // JavaScript: class_heritage holds the expression directly.
                _ => bases.push(part),
            }
        }
        bases.retain(|b| matches!(b.kind(), "identifier" | "member_expression" | "type_identifier"));
        bases
    }

    /// A plain string literal as the first statement of a function body.
    /// Template literals are expressions, not documentation.
    fn docstring(&self, body: &Node<'_>) -> Option<String> {
        if body.kind() != "statement_block" {
            return None;
        }
        let first = first_statement(body)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let expr = first.named_child(0)?;
        if expr.kind() != "string" {
            return None;
        }
        strip_string_literal(&self.text(&expr), &[], QUOTES)
    }

    /// `Calls` for every `f()` / `obj.m()` and `Instantiates` for every
    /// `new X()` under `body`.
    fn call_sites(&mut self, body: Node<'_>, caller: Option<String>) {
        let mut sites: Vec<(RelationshipKind, String, u32)> = Vec::new();
        walk_preorder(body, |node| {
            match node.kind() {
                "call_expression" => {
                    if let Some(func) = node.child_by_field_name("function") {
                        if let Some(name) = self.callee_name(&func) {
                            sites.push((RelationshipKind::Calls, name, start_line(&func)));
                        }
                    }
                }
                "new_expression" => {
                    if let Some(ctor) = node.child_by_field_name("constructor") {
                        if matches!(ctor.kind(), "identifier" | "member_expression") {
                            if let Some(name) = self.callee_name(&ctor) {
                                sites.push((RelationshipKind::Instantiates, name, start_line(&ctor)));
                            }
                        }
                    }
                }
                _ => {}
            }
            true
        });
        for (kind, target, line) in sites {
            self.push(kind, target, line, caller.clone());
        }
    }

    /// `f` for `f()`, `m` for `a.b.m()`. Immediately invoked function
    /// expressions have no name and are skipped.
    fn callee_name(&self, func: &Node<'_>) -> Option<String> {
        match func.kind() {
            "member_expression" => func
                .child_by_field_name("property")
                .map(|p| self.text(&p))
                .or_else(|| Some(self.text(func))),
            "parenthesized_expression" => None,
            kind if FUNCTION_VALUES.contains(&kind) => None,
            _ => Some(self.text(func)),
        }
    }
}
