use once_cell::sync::OnceCell;
use tree_sitter::Query;

use super::{cached_query, LanguageGrammar};

/// TypeScript and plain JavaScript modules
pub struct TypeScriptGrammar;

/// TSX and JSX modules
pub struct TsxGrammar;

static TS_IMPORTS_QUERY: OnceCell<Option<Query>> = OnceCell::new();
static TS_EXPORTS_QUERY: OnceCell<Option<Query>> = OnceCell::new();
static TSX_IMPORTS_QUERY: OnceCell<Option<Query>> = OnceCell::new();
static TSX_EXPORTS_QUERY: OnceCell<Option<Query>> = OnceCell::new();

const IMPORTS_QUERY: &str = r#"
(import_statement
    source: (string) @source
)

(export_statement
    source: (string) @source
)

(import_require_clause
    source: (string) @source
)

(call_expression
    function: (identifier) @callee
    arguments: (arguments (string) @source)
)

(call_expression
    function: (import)
    arguments: (arguments (string) @source)
)
"#;

// Declarations and export clauses are unpacked by the extractor.
const EXPORTS_QUERY: &str = r#"
(export_statement) @export
"#;

impl LanguageGrammar for TypeScriptGrammar {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["ts", "mts", "cts", "js", "mjs", "cjs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }

    fn imports_query(&self) -> &str {
        IMPORTS_QUERY
    }

    fn exports_query(&self) -> &str {
        EXPORTS_QUERY
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        cached_query(&TS_IMPORTS_QUERY, self.language(), IMPORTS_QUERY, "typescript imports")
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        cached_query(&TS_EXPORTS_QUERY, self.language(), EXPORTS_QUERY, "typescript exports")
    }
}

impl LanguageGrammar for TsxGrammar {
    fn name(&self) -> &'static str {
        "tsx"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["tsx", "jsx"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    }

    fn imports_query(&self) -> &str {
        IMPORTS_QUERY
    }

    fn exports_query(&self) -> &str {
        EXPORTS_QUERY
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        cached_query(&TSX_IMPORTS_QUERY, self.language(), IMPORTS_QUERY, "tsx imports")
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        cached_query(&TSX_EXPORTS_QUERY, self.language(), EXPORTS_QUERY, "tsx exports")
    }
}
