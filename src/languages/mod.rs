pub mod python;
pub mod typescript;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tree_sitter::Query;

pub trait LanguageGrammar: Send + Sync {
    fn name(&self) -> &'static str;
    fn file_extensions(&self) -> &[&'static str];
    fn language(&self) -> tree_sitter::Language;

    /// Query capturing import specifiers as `@source`
    fn imports_query(&self) -> &str;

    /// Query capturing exported symbol names as `@name`
    fn exports_query(&self) -> &str;

    /// Get cached imports query (compiled once)
    fn cached_imports_query(&self) -> Option<&'static Query> {
        None
    }

    /// Get cached exports query (compiled once)
    fn cached_exports_query(&self) -> Option<&'static Query> {
        None
    }
}

/// Compiles `source` into `cell` on first use. A query that fails to compile
/// is logged once and reported as absent from then on.
pub(crate) fn cached_query(
    cell: &'static OnceCell<Option<Query>>,
    language: tree_sitter::Language,
    source: &str,
    label: &str,
) -> Option<&'static Query> {
    cell.get_or_init(|| match Query::new(&language, source) {
        Ok(query) => Some(query),
        Err(e) => {
            tracing::warn!("Invalid {} query: {}", label, e);
            None
        }
    })
    .as_ref()
}

pub struct LanguageRegistry {
    languages: HashMap<String, Arc<dyn LanguageGrammar>>,
    extension_map: HashMap<String, String>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            languages: HashMap::new(),
            extension_map: HashMap::new(),
        };

        registry.register(Arc::new(typescript::TypeScriptGrammar));
        registry.register(Arc::new(typescript::TsxGrammar));
        registry.register(Arc::new(python::PythonGrammar));

        registry
    }

    pub fn register(&mut self, grammar: Arc<dyn LanguageGrammar>) {
        let name = grammar.name().to_string();
        for ext in grammar.file_extensions() {
            self.extension_map.insert(ext.to_string(), name.clone());
        }
        self.languages.insert(name, grammar);
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.languages.get(name).cloned()
    }

    pub fn get_by_extension(&self, ext: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.extension_map
            .get(ext)
            .and_then(|name| self.languages.get(name))
            .cloned()
    }

    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn LanguageGrammar>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get_by_extension(ext))
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extensions analyzed with the pattern-based fallback because no grammar
/// is registered for them.
pub const FALLBACK_EXTENSIONS: &[&str] = &["vue", "svelte", "astro"];

/// Returns true if the file is a source file the extractor understands,
/// either through a grammar or the pattern-based fallback.
pub fn is_source_file(registry: &LanguageRegistry, path: &Path) -> bool {
    if registry.get_for_file(path).is_some() {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FALLBACK_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}
