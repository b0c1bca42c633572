//! TypeScript / TSX extractor.

use super::{ecmascript, LanguageParser};
use crate::types::{Language, ParseOutput};

/// Extractor for `.ts`, `.mts`, `.cts` and `.tsx` sources.
///
/// `.tsx` files use the TSX grammar. Plain TypeScript uses the TypeScript
/// grammar, which accepts `<T>expr` casts that TSX rejects.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeScriptParser;

impl TypeScriptParser {
    pub fn new() -> Self {
        Self
    }

    fn grammar_for(file_path: &str) -> tree_sitter::Language {
        if file_path.ends_with(".tsx") {
            tree_sitter_typescript::LANGUAGE_TSX.into()
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
        }
    }
}

impl LanguageParser for TypeScriptParser {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn parse_source(&self, file_path: &str, source: &[u8]) -> ParseOutput {
        let grammar = Self::grammar_for(file_path);
        ecmascript::extract(Language::TypeScript, &grammar, file_path, source)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityKind, RelationshipKind};

    fn parse_as(file: &str, src: &str) -> ParseOutput {
        TypeScriptParser::new().parse_source(file, src.as_bytes())
    }

    fn parse(src: &str) -> ParseOutput {
        parse_as("/proj/src/a.ts", src)
    }

    #[test]
    fn test_typed_functions_and_signatures() {
        let out = parse(
            "export function add(a: number, b: number): number {\n  return a + b;\n}\n\
             export const twice = <T>(x: T): T[] => [x, x];\n",
        );
        assert_eq!(out.entities.len(), 2);
        assert_eq!(out.entities[0].name, "add");
        assert_eq!(out.entities[0].signature.as_deref(), Some("(a: number, b: number)"));
        assert_eq!(out.entities[0].language, Language::TypeScript);
        assert_eq!(out.entities[1].name, "twice");
    }

    #[test]
    fn test_class_extends_with_generics_and_implements() {
        let out = parse(
            "interface Runner { run(): void }\n\
             class Base<T> {}\n\
             export class Derived extends Base<string> implements Runner {\n  run(): void {\n    this.step();\n  }\n}\n",
        );
        let classes: Vec<&str> = out
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Class)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(classes, vec!["Base", "Derived"]);

        let inherits: Vec<&str> = out
            .relationships_of(RelationshipKind::Inherits)
            .map(|p| p.target())
            .collect();
        assert_eq!(inherits, vec!["Base"]);

        let method = out.entities.iter().find(|e| e.kind == EntityKind::Method).unwrap();
        assert_eq!(method.qualified_name, "Derived.run");
    }

    #[test]
    fn test_abstract_class() {
        let out = parse(
            "abstract class Shape {\n  abstract area(): number;\n  describe() { return this.area(); }\n}\n",
        );
        let names: Vec<&str> = out.entities.iter().map(|e| e.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["Shape", "Shape.describe"]);
    }

    #[test]
    fn test_relative_import_is_raw_specifier() {
        let out = parse("import { b } from './b';\nimport type { T } from '../types';\n");
        let imports: Vec<&str> = out
            .relationships_of(RelationshipKind::Imports)
            .map(|p| p.target())
            .collect();
        assert_eq!(imports, vec!["./b", "../types"]);
    }

    #[test]
    fn test_angle_bracket_cast_needs_plain_grammar() {
        let src = "function f(x: unknown) {\n  return <string>x;\n}\n";
        assert_eq!(parse_as("/proj/a.ts", src).entities.len(), 1);
    }

    #[test]
    fn test_tsx_component() {
        let out = parse_as(
            "/proj/src/App.tsx",
            "export const App = () => {\n  const v = useState(0);\n  return <div>{render(v)}</div>;\n};\n",
        );
        assert_eq!(out.entities.len(), 1);
        let targets: Vec<&str> = out
            .relationships_of(RelationshipKind::Calls)
            .map(|p| p.target())
            .collect();
        assert_eq!(targets, vec!["useState", "render"]);
    }

    #[test]
    fn test_syntax_error_yields_empty() {
        assert!(parse("class {{{").is_empty());
    }
}
