//! Pattern-based import/export extraction.
//!
//! Used for files with no registered grammar (Vue, Svelte, ...) and for files
//! whose syntax tree came back with errors.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static ES_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s+(?:type\s+)?(?:[\w*${}\s,]+?\s+from\s+)?['"]([^'"\n]+)['"]"#)
        .expect("valid regex")
});

static ES_REEXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bexport\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s+['"]([^'"\n]+)['"]"#)
        .expect("valid regex")
});

static REQUIRE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\brequire\(\s*['"]([^'"\n]+)['"]\s*\)"#).expect("valid regex"));

static DYNAMIC_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\(\s*['"]([^'"\n]+)['"]\s*\)"#).expect("valid regex"));

static ES_EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bexport\s+(?:declare\s+)?(?:async\s+)?(?:function\*?|abstract\s+class|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
    )
    .expect("valid regex")
});

static ES_EXPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s+default\b").expect("valid regex"));

static ES_EXPORT_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s+(?:type\s+)?\{([^}]*)\}").expect("valid regex"));

static PY_FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*from[ \t]+(\.+[\w.]*|[\w.]+)[ \t]+import[ \t]+(?:\(([^)]*)\)|([\w \t,*]+))")
        .expect("valid regex")
});

static PY_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*import[ \t]+([\w.]+)").expect("valid regex"));

static PY_TOP_LEVEL_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:async\s+def|def|class)\s+([A-Za-z_]\w*)").expect("valid regex")
});

/// Syntax family the fallback should assume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFlavor {
    Script,
    Python,
}

impl PatternFlavor {
    pub fn for_language(language: Option<&str>) -> Self {
        match language {
            Some("python") => PatternFlavor::Python,
            _ => PatternFlavor::Script,
        }
    }
}

pub fn extract_imports(source: &str, flavor: PatternFlavor) -> Vec<String> {
    let mut imports = Vec::new();
    match flavor {
        PatternFlavor::Script => {
            for re in [&*ES_IMPORT, &*ES_REEXPORT, &*REQUIRE_CALL, &*DYNAMIC_IMPORT] {
                for caps in re.captures_iter(source) {
                    imports.push(caps[1].to_string());
                }
            }
        }
        PatternFlavor::Python => {
            for caps in PY_FROM_IMPORT.captures_iter(source) {
                let names_group = caps.get(2).or_else(|| caps.get(3));
                let names: Vec<&str> = names_group
                    .map(|m| m.as_str())
                    .unwrap_or("")
                    .split(',')
                    .map(|n| n.split_whitespace().next().unwrap_or(""))
                    .filter(|n| !n.is_empty())
                    .collect();
                imports.extend(python_from_specifiers(&caps[1], &names));
            }
            for caps in PY_IMPORT.captures_iter(source) {
                imports.push(caps[1].to_string());
            }
        }
    }
    dedup_preserving_order(imports)
}

pub fn extract_exports(source: &str, flavor: PatternFlavor) -> Vec<String> {
    let mut exports = Vec::new();
    match flavor {
        PatternFlavor::Script => {
            for caps in ES_EXPORT_DECL.captures_iter(source) {
                exports.push(caps[1].to_string());
            }
            if ES_EXPORT_DEFAULT.is_match(source) {
                exports.push("default".to_string());
            }
            for caps in ES_EXPORT_CLAUSE.captures_iter(source) {
                for specifier in caps[1].split(',') {
                    if let Some(name) = exported_name(specifier) {
                        exports.push(name);
                    }
                }
            }
        }
        PatternFlavor::Python => {
            for caps in PY_TOP_LEVEL_DEF.captures_iter(source) {
                let name = &caps[1];
                if !name.starts_with('_') {
                    exports.push(name.to_string());
                }
            }
        }
    }
    dedup_preserving_order(exports)
}

/// `a`, `a as b`, `type a` -> the name visible to importers
fn exported_name(specifier: &str) -> Option<String> {
    let words: Vec<&str> = specifier.split_whitespace().collect();
    let name = match words.as_slice() {
        [] => return None,
        [.., "as", alias] => alias,
        ["type", name] => name,
        [name, ..] => name,
    };
    Some(name.to_string())
}

/// Converts a Python module reference into the path-like specifier the graph
/// builder understands: `.utils` -> `./utils`, `..core.db` -> `../core/db`.
/// Absolute modules are returned unchanged and never resolve to an edge.
pub fn python_module_to_specifier(module: &str) -> String {
    let dots = module.chars().take_while(|c| *c == '.').count();
    if dots == 0 {
        return module.to_string();
    }

    let rest = module[dots..].replace('.', "/");
    let prefix = if dots == 1 {
        "./".to_string()
    } else {
        "../".repeat(dots - 1)
    };

    if rest.is_empty() {
        prefix.trim_end_matches('/').to_string()
    } else {
        format!("{}{}", prefix, rest)
    }
}

/// Specifiers for `from <module> import <names>`. A bare-dots module
/// (`from . import utils`) refers to sibling modules by name.
pub fn python_from_specifiers(module: &str, names: &[&str]) -> Vec<String> {
    if !module.is_empty() && module.chars().all(|c| c == '.') {
        let base = python_module_to_specifier(module);
        return names
            .iter()
            .filter(|n| **n != "*")
            .map(|n| format!("{}/{}", base, n))
            .collect();
    }
    vec![python_module_to_specifier(module)]
}

pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
