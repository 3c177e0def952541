//! Per-language tables mapping recognizable names/patterns to [`SourceKind`]s.
//!
//! Immutable after construction, shared by every parallel trace request
//! behind a [`once_cell::sync::Lazy`] the way the teacher keeps its own
//! preprocessor pattern tables process-wide (`effect_analysis::PatternRegistry`).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// The finite set of places an engine trace can bottom out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    HttpGet,
    HttpPost,
    HttpBody,
    HttpJson,
    HttpHeader,
    HttpCookie,
    HttpPath,
    HttpFile,
    HttpRequest,
    Session,
    CliArg,
    EnvVar,
    Stdin,
    File,
    Database,
    Network,
    UserInput,
    Unknown,
}

/// Every [`SourceKind`] a caller deciding "does this carry user input"
/// should check. The original batch analyzer only checked a handful of HTTP
/// variants (spec §9 open question); list the full set explicitly here so
/// reimplementations don't repeat that gap.
pub const ALL_SOURCE_KINDS: &[SourceKind] = &[
    SourceKind::HttpGet,
    SourceKind::HttpPost,
    SourceKind::HttpBody,
    SourceKind::HttpJson,
    SourceKind::HttpHeader,
    SourceKind::HttpCookie,
    SourceKind::HttpPath,
    SourceKind::HttpFile,
    SourceKind::HttpRequest,
    SourceKind::Session,
    SourceKind::CliArg,
    SourceKind::EnvVar,
    SourceKind::Stdin,
    SourceKind::File,
    SourceKind::Database,
    SourceKind::Network,
    SourceKind::UserInput,
];

/// Language tag. Only PHP (the hard case) and TypeScript/JS (the framework
/// carrier fallback, scenario 5) are structurally supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Php,
    TypeScript,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "php" => Some(Language::Php),
            "ts" | "tsx" | "js" | "jsx" => Some(Language::TypeScript),
            _ => None,
        }
    }
}

/// A recognized member of a framework's request object, e.g. `req.body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkType {
    pub framework: String,
    pub source_kind: SourceKind,
}

/// One language's source-keyword tables. Every field is optional: a
/// language that has no DI-style framework carriers simply leaves
/// `framework_types` empty, etc.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageMapping {
    pub input_functions: HashMap<String, SourceKind>,
    pub input_sources: HashMap<String, SourceKind>,
    pub superglobals: HashMap<String, SourceKind>,
    pub db_fetch_functions: HashMap<String, SourceKind>,
    pub global_sources: HashMap<String, SourceKind>,
    pub dom_sources: HashMap<String, SourceKind>,
    pub node_sources: HashMap<String, SourceKind>,
    pub cgi_env_vars: HashMap<String, SourceKind>,
    pub qt_input_methods: HashMap<String, SourceKind>,
    pub framework_types: HashMap<String, FrameworkType>,
    pub method_inputs: HashMap<String, SourceKind>,
    pub annotations: HashMap<String, SourceKind>,
    pub input_methods: HashMap<String, SourceKind>,
}

impl LanguageMapping {
    /// Combine two mappings; entries in `other` win on key collision.
    pub fn merge(mut self, other: LanguageMapping) -> LanguageMapping {
        self.input_functions.extend(other.input_functions);
        self.input_sources.extend(other.input_sources);
        self.superglobals.extend(other.superglobals);
        self.db_fetch_functions.extend(other.db_fetch_functions);
        self.global_sources.extend(other.global_sources);
        self.dom_sources.extend(other.dom_sources);
        self.node_sources.extend(other.node_sources);
        self.cgi_env_vars.extend(other.cgi_env_vars);
        self.qt_input_methods.extend(other.qt_input_methods);
        self.framework_types.extend(other.framework_types);
        self.method_inputs.extend(other.method_inputs);
        self.annotations.extend(other.annotations);
        self.input_methods.extend(other.input_methods);
        self
    }
}

/// Combine two mappings; free-function form for callers assembling a
/// registry from parts rather than chaining method calls.
pub fn merge(a: LanguageMapping, b: LanguageMapping) -> LanguageMapping {
    a.merge(b)
}

/// Process-wide, language-indexed source-keyword tables.
#[derive(Debug, Clone, Default)]
pub struct KeywordRegistry {
    languages: HashMap<Language, LanguageMapping>,
}

impl KeywordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never returns `None` for an unregistered language — callers get an
    /// empty mapping instead, so lookups never have to special-case absence.
    pub fn get(&self, language: Language) -> LanguageMapping {
        self.languages.get(&language).cloned().unwrap_or_default()
    }

    pub fn register(&mut self, language: Language, mapping: LanguageMapping) {
        self.languages
            .entry(language)
            .and_modify(|existing| {
                *existing = existing.clone().merge(mapping.clone());
            })
            .or_insert(mapping);
    }

    /// The PHP and TypeScript/Node tables built into the engine.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Language::Php, php_builtin());
        registry.register(Language::TypeScript, typescript_builtin());
        registry
    }
}

/// Shared, lazily-built instance so parallel trace requests reuse one
/// allocation instead of rebuilding the tables per request.
pub static BUILTIN_REGISTRY: Lazy<KeywordRegistry> = Lazy::new(KeywordRegistry::builtin);

fn map_of(pairs: &[(&str, SourceKind)]) -> HashMap<String, SourceKind> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
}

fn php_builtin() -> LanguageMapping {
    use SourceKind::*;
    LanguageMapping {
        superglobals: map_of(&[
            ("$_GET", HttpGet),
            ("$_POST", HttpPost),
            ("$_COOKIE", HttpCookie),
            ("$_REQUEST", HttpRequest),
            ("$_SERVER", HttpHeader),
            ("$_FILES", HttpFile),
            ("$_ENV", EnvVar),
            ("$_SESSION", UserInput),
        ]),
        cgi_env_vars: map_of(&[
            ("HTTP_HOST", HttpHeader),
            ("HTTP_USER_AGENT", HttpHeader),
            ("HTTP_REFERER", HttpHeader),
            ("REQUEST_URI", HttpPath),
            ("QUERY_STRING", HttpGet),
            ("REMOTE_ADDR", Network),
            ("argv", CliArg),
        ]),
        input_functions: map_of(&[
            ("readline", Stdin),
            ("fgets", Stdin),
            ("file_get_contents", File),
            ("fread", File),
        ]),
        db_fetch_functions: map_of(&[
            ("mysqli_fetch_assoc", Database),
            ("fetchAll", Database),
            ("fetch", Database),
        ]),
        ..Default::default()
    }
}

fn typescript_builtin() -> LanguageMapping {
    use SourceKind::*;
    LanguageMapping {
        node_sources: map_of(&[
            ("req.body", HttpBody),
            ("req.query", HttpGet),
            ("req.params", HttpPath),
            ("req.headers", HttpHeader),
            ("req.cookies", HttpCookie),
            ("process.env", EnvVar),
            ("process.argv", CliArg),
        ]),
        framework_types: [
            (
                "req.body".to_string(),
                FrameworkType {
                    framework: "express".to_string(),
                    source_kind: HttpBody,
                },
            ),
            (
                "req.query".to_string(),
                FrameworkType {
                    framework: "express".to_string(),
                    source_kind: HttpGet,
                },
            ),
            (
                "req.params".to_string(),
                FrameworkType {
                    framework: "express".to_string(),
                    source_kind: HttpPath,
                },
            ),
            (
                "req.headers".to_string(),
                FrameworkType {
                    framework: "express".to_string(),
                    source_kind: HttpHeader,
                },
            ),
            (
                "req.cookies".to_string(),
                FrameworkType {
                    framework: "express".to_string(),
                    source_kind: HttpCookie,
                },
            ),
        ]
        .into_iter()
        .collect(),
        dom_sources: map_of(&[
            ("document.location", HttpPath),
            ("window.location", HttpPath),
            ("localStorage", UserInput),
        ]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_php_superglobal_table_matches_spec_4e1() {
        let registry = KeywordRegistry::builtin();
        let php = registry.get(Language::Php);
        assert_eq!(php.superglobals["$_GET"], SourceKind::HttpGet);
        assert_eq!(php.superglobals["$_SERVER"], SourceKind::HttpHeader);
        assert_eq!(php.superglobals["$_SESSION"], SourceKind::UserInput);
    }

    #[test]
    fn unregistered_language_returns_empty_mapping_not_panic() {
        let registry = KeywordRegistry::new();
        let mapping = registry.get(Language::Php);
        assert!(mapping.superglobals.is_empty());
    }

    #[test]
    fn merge_lets_later_keys_win() {
        let a = LanguageMapping {
            superglobals: map_of(&[("$_GET", SourceKind::HttpGet)]),
            ..Default::default()
        };
        let b = LanguageMapping {
            superglobals: map_of(&[("$_GET", SourceKind::Unknown)]),
            ..Default::default()
        };
        let merged = merge(a, b);
        assert_eq!(merged.superglobals["$_GET"], SourceKind::Unknown);
    }

    #[test]
    fn typescript_express_carrier_for_scenario_5() {
        let registry = KeywordRegistry::builtin();
        let ts = registry.get(Language::TypeScript);
        let carrier = &ts.framework_types["req.body"];
        assert_eq!(carrier.framework, "express");
        assert_eq!(carrier.source_kind, SourceKind::HttpBody);
    }
}
