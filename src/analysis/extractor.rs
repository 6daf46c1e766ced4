use std::path::Path;
use std::time::Instant;

use tree_sitter::StreamingIterator;

use crate::analysis::parser::{parse_source_until, ParsedFile};
use crate::analysis::patterns::{self, PatternFlavor};
use crate::error::Result;
use crate::languages::LanguageRegistry;

/// Imports and exports found in one file
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Grammar used, `None` when only the pattern fallback ran
    pub language: Option<String>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
}

pub struct MetadataExtractor {
    registry: LanguageRegistry,
    deadline: Option<Instant>,
}

impl MetadataExtractor {
    pub fn new(registry: LanguageRegistry) -> Self {
        Self {
            registry,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Extracts import specifiers and exported names from `source`.
    ///
    /// Files with a registered grammar are parsed with tree-sitter. When the
    /// tree contains syntax errors the pattern fallback is merged in, so a
    /// partially broken file still contributes the imports we can see.
    pub fn extract(&self, source: &str, path: &Path) -> Result<ExtractionResult> {
        let grammar = match self.registry.get_for_file(path) {
            Some(g) => g,
            None => {
                return Ok(ExtractionResult {
                    language: None,
                    imports: patterns::extract_imports(source, PatternFlavor::Script),
                    exports: patterns::extract_exports(source, PatternFlavor::Script),
                })
            }
        };

        let parsed = parse_source_until(source, grammar, self.deadline)?;
        let language = parsed.language();
        let mut imports = self.extract_imports(&parsed);
        let mut exports = self.extract_exports(&parsed);

        if parsed.has_errors() {
            tracing::debug!(
                "Syntax errors in {}, merging pattern-based extraction",
                path.display()
            );
            let flavor = PatternFlavor::for_language(Some(language));
            imports.extend(patterns::extract_imports(source, flavor));
            exports.extend(patterns::extract_exports(source, flavor));
        }

        Ok(ExtractionResult {
            language: Some(language.to_string()),
            imports: patterns::dedup_preserving_order(imports),
            exports: patterns::dedup_preserving_order(exports),
        })
    }

    fn extract_imports(&self, parsed: &ParsedFile) -> Vec<String> {
        let mut imports = Vec::new();
        let query = match parsed.grammar.cached_imports_query() {
            Some(q) => q,
            None => {
                let flavor = PatternFlavor::for_language(Some(parsed.language()));
                return patterns::extract_imports(parsed.source, flavor);
            }
        };

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, parsed.root_node(), parsed.source_bytes());

        while let Some(m) = matches.next() {
            let mut source: Option<&str> = None;
            let mut callee: Option<&str> = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                let text = parsed.node_text(&capture.node);

                match capture_name {
                    "source" => source = Some(text),
                    "callee" => callee = Some(text),
                    "import" => imports.extend(python_import_modules(parsed, &capture.node)),
                    "from_import" => imports.extend(python_from_import(parsed, &capture.node)),
                    _ => {}
                }
            }

            // Only `require("x")` counts among plain calls with a string argument
            if callee.is_some_and(|c| c != "require") {
                continue;
            }

            if let Some(text) = source {
                let specifier = strip_quotes(text);
                if !specifier.is_empty() {
                    imports.push(specifier.to_string());
                }
            }
        }

        imports
    }

    fn extract_exports(&self, parsed: &ParsedFile) -> Vec<String> {
        let mut exports = Vec::new();
        let query = match parsed.grammar.cached_exports_query() {
            Some(q) => q,
            None => {
                let flavor = PatternFlavor::for_language(Some(parsed.language()));
                return patterns::extract_exports(parsed.source, flavor);
            }
        };

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, parsed.root_node(), parsed.source_bytes());

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "name" => {
                        let name = parsed.node_text(&capture.node);
                        if !name.starts_with('_') {
                            exports.push(name.to_string());
                        }
                    }
                    "export" => exports.extend(export_statement_names(parsed, &capture.node)),
                    _ => {}
                }
            }
        }

        exports
    }
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// Names introduced by one `export ...` statement
fn export_statement_names(parsed: &ParsedFile, node: &tree_sitter::Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();

    for child in node.children(&mut cursor) {
        match child.kind() {
            "default" => names.push("default".to_string()),
            "export_clause" => {
                let mut clause_cursor = child.walk();
                for specifier in child.named_children(&mut clause_cursor) {
                    let visible = specifier
                        .child_by_field_name("alias")
                        .or_else(|| specifier.child_by_field_name("name"));
                    if let Some(n) = visible {
                        names.push(strip_quotes(parsed.node_text(&n)).to_string());
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(declaration) = node.child_by_field_name("declaration") {
        names.extend(declaration_names(parsed, &declaration));
    }

    names
}

fn declaration_names(parsed: &ParsedFile, declaration: &tree_sitter::Node) -> Vec<String> {
    match declaration.kind() {
        "lexical_declaration" | "variable_declaration" => {
            let mut names = Vec::new();
            let mut cursor = declaration.walk();
            for declarator in declaration.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name) = declarator.child_by_field_name("name") {
                    if name.kind() == "identifier" {
                        names.push(parsed.node_text(&name).to_string());
                    }
                }
            }
            names
        }
        _ => declaration
            .child_by_field_name("name")
            .map(|n| vec![parsed.node_text(&n).to_string()])
            .unwrap_or_default(),
    }
}

/// `import a.b, c as d` -> ["a.b", "c"]
fn python_import_modules(parsed: &ParsedFile, node: &tree_sitter::Node) -> Vec<String> {
    let mut modules = Vec::new();
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let module = match name.kind() {
            "aliased_import" => name.child_by_field_name("name"),
            _ => Some(name),
        };
        if let Some(m) = module {
            modules.push(parsed.node_text(&m).to_string());
        }
    }
    modules
}

/// `from .pkg import a, b` -> ["./pkg"]; `from . import a, b` -> ["./a", "./b"]
fn python_from_import(parsed: &ParsedFile, node: &tree_sitter::Node) -> Vec<String> {
    let module = match node.child_by_field_name("module_name") {
        Some(m) => parsed.node_text(&m).to_string(),
        None => return Vec::new(),
    };

    let mut cursor = node.walk();
    let names: Vec<&str> = node
        .children_by_field_name("name", &mut cursor)
        .map(|n| match n.kind() {
            "aliased_import" => n
                .child_by_field_name("name")
                .map(|inner| parsed.node_text(&inner))
                .unwrap_or(""),
            _ => parsed.node_text(&n),
        })
        .filter(|n| !n.is_empty())
        .collect();

    patterns::python_from_specifiers(&module, &names)
}
