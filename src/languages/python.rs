use once_cell::sync::OnceCell;
use tree_sitter::Query;

use super::{cached_query, LanguageGrammar};

pub struct PythonGrammar;

// Static query caches for Python
static PYTHON_IMPORTS_QUERY: OnceCell<Option<Query>> = OnceCell::new();
static PYTHON_EXPORTS_QUERY: OnceCell<Option<Query>> = OnceCell::new();

impl LanguageGrammar for PythonGrammar {
    fn name(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["py", "pyi"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn imports_query(&self) -> &str {
        r#"
        (import_statement) @import

        (import_from_statement) @from_import
        "#
    }

    /// Top-level definitions count as the module's public surface.
    fn exports_query(&self) -> &str {
        r#"
        (module
            (function_definition
                name: (identifier) @name
            )
        )

        (module
            (class_definition
                name: (identifier) @name
            )
        )

        (module
            (decorated_definition
                definition: (function_definition
                    name: (identifier) @name
                )
            )
        )

        (module
            (decorated_definition
                definition: (class_definition
                    name: (identifier) @name
                )
            )
        )
        "#
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        cached_query(
            &PYTHON_IMPORTS_QUERY,
            self.language(),
            self.imports_query(),
            "python imports",
        )
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        cached_query(
            &PYTHON_EXPORTS_QUERY,
            self.language(),
            self.exports_query(),
            "python exports",
        )
    }
}
