//! Regex patterns the engine pattern-matches source text against, compiled
//! once and shared (§5.iv: "Regex instances are compiled once and shared").
//! Centralised here rather than inlined at call sites, per §9's design note
//! against ad hoc regex-per-call-site.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::features::source_keywords::SourceKind;
use crate::features::symbol_model::Parameter;

pub static RETURN_STATEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"return\s+([^;]+);").unwrap());

pub static RETURN_PROPERTY_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(?[A-Za-z_]*\)?\$this->([A-Za-z_][A-Za-z0-9_]*)\[\$([A-Za-z_][A-Za-z0-9_]*)\]").unwrap()
});

// `regex` has no backreferences, so the ternary's two occurrences of
// `$this->prop[$key]` are captured separately and compared in Rust.
pub static RETURN_PROPERTY_ISSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^isset\(\$this->([A-Za-z_][A-Za-z0-9_]*)\[\$([A-Za-z_][A-Za-z0-9_]*)\]\)\s*\?\s*\$this->([A-Za-z_][A-Za-z0-9_]*)\[\$([A-Za-z_][A-Za-z0-9_]*)\]\s*:",
    )
    .unwrap()
});

pub static RETURN_PLAIN_PROPERTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$this->([A-Za-z_][A-Za-z0-9_]*)$").unwrap());

pub static ASSIGNMENT_RE_TEMPLATE: &str = r"\$NAME\s*=\s*([^;]+);";

pub static EXTERNAL_PROPERTY_ASSIGN_RE_TEMPLATE: &str =
    r"\$VAR->([A-Za-z_][A-Za-z0-9_]*)(?:\[([^\]]+)\])?\s*=\s*([^;]+);";

pub static INSTANTIATION_RE_TEMPLATE: &str =
    r"\$NAME\s*=\s*new\s+([A-Za-z_][A-Za-z0-9_\\]*)\s*\(";

pub static GLOBALS_INSTANTIATION_RE_TEMPLATE: &str =
    r#"\$GLOBALS\['NAME'\]\s*=\s*new\s+([A-Za-z_][A-Za-z0-9_\\]*)\s*\("#;

pub static DI_CONTAINER_RE_TEMPLATE: &str = r"\$NAME\s*=\s*\$[A-Za-z_][A-Za-z0-9_]*->get\('([^']+)'\)";

pub static VAR_DOCBLOCK_RE_TEMPLATE: &str = r"@var\s+\\?([A-Za-z_][A-Za-z0-9_\\]*)\s+\$NAME";

pub static EXTERNAL_METHOD_CALL_RE_TEMPLATE: &str = r"\$VAR->([A-Za-z_][A-Za-z0-9_]*)\(([^)]*)\)";

pub static FOREACH_SUPERGLOBAL_RE_TEMPLATE: &str =
    r"foreach\s*\(\s*(\$_[A-Z]+)\s+as\s+\$([A-Za-z_][A-Za-z0-9_]*)\s*=>\s*\$([A-Za-z_][A-Za-z0-9_]*)\s*\)";

pub static FOREACH_PARAM_RE_TEMPLATE: &str =
    r"foreach\s*\(\s*\$PARAM\s+as\s+\$([A-Za-z_][A-Za-z0-9_]*)\s*=>\s*\$([A-Za-z_][A-Za-z0-9_]*)\s*\)";

pub static DIRECT_PROPERTY_ASSIGN_RE_TEMPLATE: &str = r"\$this->PROP\s*=\s*([^;]+);";

pub static CONDITIONAL_SUPERGLOBAL_RE_TEMPLATE: &str =
    r"if\s*\(\s*(\$_[A-Z]+)\[[^\]]*\]\s*\)";

pub static RETURN_NEW_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"return\s+new\s+([A-Za-z_][A-Za-z0-9_\\]*)\s*\(").unwrap());

pub static RETURN_ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@return\s+([A-Za-z_][A-Za-z0-9_\\]*)").unwrap());

pub static DYNAMIC_PROPERTY_ASSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$this->\$([A-Za-z_][A-Za-z0-9_]*)\s*=\s*\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

pub static MAGIC_GET_BACKING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"function\s+__get\s*\([^)]*\)\s*\{[^}]*return\s+\$this->([A-Za-z_][A-Za-z0-9_]*)\[\$name\]").unwrap()
});

/// One `return` statement's classification (§4.E.7). Fields are not
/// mutually exclusive — a single return can set more than one.
#[derive(Debug, Clone, Default)]
pub struct MethodReturnAnalysis {
    pub returns_self: bool,
    pub returns_property: Option<String>,
    pub uses_param_as_key: bool,
    pub param_index: Option<usize>,
    pub returns_user_input: Option<String>,
}

fn find_superglobal_token(text: &str, superglobals: &HashMap<String, SourceKind>) -> Option<(String, SourceKind)> {
    superglobals
        .iter()
        .find(|(name, _)| text.contains(name.as_str()))
        .map(|(name, kind)| (name.clone(), *kind))
}

/// Scans a method body for `return <expr>;` statements and classifies each
/// per §4.E.7's table, merging every match into one record.
pub fn analyze_returns(
    body: &str,
    parameters: &[Parameter],
    superglobals: &HashMap<String, SourceKind>,
) -> MethodReturnAnalysis {
    let mut analysis = MethodReturnAnalysis::default();

    for caps in RETURN_STATEMENT_RE.captures_iter(body) {
        let expr = caps[1].trim();

        if expr == "$this" {
            analysis.returns_self = true;
            continue;
        }
        if let Some(c) = RETURN_PROPERTY_KEY_RE.captures(expr) {
            analysis.returns_property = Some(c[1].to_string());
            analysis.uses_param_as_key = true;
            analysis.param_index = parameters.iter().position(|p| p.name == c[2]);
        } else if let Some(c) = RETURN_PROPERTY_ISSET_RE.captures(expr) {
            if c[1] == c[3] && c[2] == c[4] {
                analysis.returns_property = Some(c[1].to_string());
                analysis.uses_param_as_key = true;
                analysis.param_index = parameters.iter().position(|p| p.name == c[2]);
            }
        } else if let Some(c) = RETURN_PLAIN_PROPERTY_RE.captures(expr) {
            analysis.returns_property = Some(c[1].to_string());
        }

        if let Some((_, kind)) = find_superglobal_token(expr, superglobals) {
            let _ = kind;
            analysis.returns_user_input = Some(expr.to_string());
        }
    }

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(names: &[&str]) -> Vec<Parameter> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Parameter {
                name: n.to_string(),
                index: i,
                type_hint: None,
                default_value: None,
                variadic: false,
            })
            .collect()
    }

    #[test]
    fn classifies_returns_self() {
        let analysis = analyze_returns("{ return $this; }", &[], &HashMap::new());
        assert!(analysis.returns_self);
    }

    #[test]
    fn classifies_keyed_property_return_with_param_index() {
        let body = "{ return $this->data[$k]; }";
        let analysis = analyze_returns(body, &params(&["k"]), &HashMap::new());
        assert_eq!(analysis.returns_property.as_deref(), Some("data"));
        assert!(analysis.uses_param_as_key);
        assert_eq!(analysis.param_index, Some(0));
    }

    #[test]
    fn classifies_plain_property_return() {
        let analysis = analyze_returns("{ return $this->name; }", &[], &HashMap::new());
        assert_eq!(analysis.returns_property.as_deref(), Some("name"));
        assert!(!analysis.uses_param_as_key);
    }

    #[test]
    fn detects_superglobal_in_return_expression() {
        let mut sg = HashMap::new();
        sg.insert("$_SERVER".to_string(), SourceKind::HttpHeader);
        let analysis = analyze_returns("{ return $_SERVER['HTTP_HOST']; }", &[], &sg);
        assert!(analysis.returns_user_input.is_some());
    }
}
