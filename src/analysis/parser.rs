use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{AuditError, Result};
use crate::languages::LanguageGrammar;

pub struct ParsedFile<'a> {
    pub tree: tree_sitter::Tree,
    pub source: &'a str,
    pub grammar: Arc<dyn LanguageGrammar>,
}

impl<'a> ParsedFile<'a> {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn node_text(&self, node: &tree_sitter::Node) -> &str {
        node.utf8_text(self.source_bytes()).unwrap_or("")
    }

    pub fn language(&self) -> &'static str {
        self.grammar.name()
    }

    pub fn has_errors(&self) -> bool {
        self.root_node().has_error()
    }
}

/// Parses source text with the given grammar. A fresh tree-sitter parser is
/// created per call so that workers never share parser state.
pub fn parse_source(source: &str, grammar: Arc<dyn LanguageGrammar>) -> Result<ParsedFile<'_>> {
    parse_source_until(source, grammar, None)
}

/// Like [`parse_source`], but the parser stops at its next progress check
/// after `deadline` and the call fails with `AuditError::Timeout`.
pub fn parse_source_until(
    source: &str,
    grammar: Arc<dyn LanguageGrammar>,
    deadline: Option<Instant>,
) -> Result<ParsedFile<'_>> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&grammar.language())
        .map_err(|e| AuditError::Parse(e.to_string()))?;

    let bytes = source.as_bytes();
    let mut read = move |offset: usize, _: tree_sitter::Point| bytes.get(offset..).unwrap_or_default();
    let mut expired = false;
    let mut check_deadline = |_: &tree_sitter::ParseState| match deadline {
        Some(d) if Instant::now() >= d => {
            expired = true;
            ControlFlow::Break(())
        }
        _ => ControlFlow::Continue(()),
    };
    let options = tree_sitter::ParseOptions::new().progress_callback(&mut check_deadline);

    let tree = parser.parse_with_options(&mut read, None, Some(options));
    let tree = match tree {
        Some(tree) => tree,
        None if expired => {
            return Err(AuditError::Timeout(format!(
                "parse of {} bytes passed its deadline",
                source.len()
            )))
        }
        None => return Err(AuditError::Parse("Failed to parse source".to_string())),
    };

    Ok(ParsedFile {
        tree,
        source,
        grammar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;

    #[test]
    fn test_parse_source_typescript() {
        let registry = LanguageRegistry::new();
        let grammar = registry.get_by_name("typescript").unwrap();

        let source = r#"
import { a } from "./a";
export function greet(name: string): string {
    return `Hello, ${name}!`;
}
"#;

        let parsed = parse_source(source, grammar).unwrap();
        assert_eq!(parsed.language(), "typescript");
        assert_eq!(parsed.root_node().kind(), "program");
        assert!(!parsed.has_errors());
    }

    #[test]
    fn test_parse_source_python() {
        let registry = LanguageRegistry::new();
        let grammar = registry.get_by_name("python").unwrap();

        let parsed = parse_source("def main():\n    pass\n", grammar).unwrap();
        assert_eq!(parsed.root_node().kind(), "module");
    }

    #[test]
    fn test_parse_source_empty() {
        let registry = LanguageRegistry::new();
        let grammar = registry.get_by_name("typescript").unwrap();

        let parsed = parse_source("", grammar).unwrap();
        assert_eq!(parsed.source, "");
        assert_eq!(parsed.root_node().child_count(), 0);
    }

    #[test]
    fn test_parsed_file_node_text() {
        let registry = LanguageRegistry::new();
        let grammar = registry.get_by_name("typescript").unwrap();

        let source = "const x = 1;";
        let parsed = parse_source(source, grammar).unwrap();
        let root = parsed.root_node();
        assert_eq!(parsed.node_text(&root), source);
    }

    #[test]
    fn test_parse_stops_at_deadline() {
        let registry = LanguageRegistry::new();
        let grammar = registry.get_by_name("typescript").unwrap();
        let source = "const x = call(a, b, c);\n".repeat(5_000);

        let result = parse_source_until(&source, Arc::clone(&grammar), Some(Instant::now()));
        assert!(matches!(result, Err(AuditError::Timeout(_))));

        let parsed = parse_source_until(&source, grammar, None).unwrap();
        assert!(!parsed.has_errors());
    }

    #[test]
    fn test_parse_broken_source_reports_errors() {
        let registry = LanguageRegistry::new();
        let grammar = registry.get_by_name("typescript").unwrap();

        let parsed = parse_source("function (((( {", grammar).unwrap();
        assert!(parsed.has_errors());
    }
}
