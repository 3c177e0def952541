//! Classifies a target string into one of eight expression kinds and
//! decomposes it (§4.D). Recognition order matters — first matched pattern
//! wins — and every paren-sensitive step goes through [`find_matching`],
//! never a regex over nested parens (§9: "must not be replaced by regex
//! even for small inputs").

mod lexer;

pub use lexer::{find_matching, split_arguments, strip_quotes};

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpressionKind {
    #[default]
    Unknown,
    PropertyAccess,
    MethodCall,
    StaticCall,
    StaticProperty,
    FunctionCall,
    Superglobal,
    LocalVariable,
    /// A bare dot-chain with no `$` sigil (`req.body.id`) — the
    /// TypeScript/Node framework-carrier shape (scenario 5), never produced
    /// for PHP input since every PHP recognizer above requires `$`.
    MemberChain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStep {
    PropertyAccess { name: String, key: Option<String> },
    MethodCall { name: String, args: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub struct ParsedExpression {
    pub raw: String,
    pub kind: ExpressionKind,
    pub is_chained: bool,
    pub chain_steps: Vec<ChainStep>,
    pub base_variable: Option<String>,
    /// Filled in by the engine once an owning class is resolved — not set
    /// by the parser itself (§3: "resolved by the engine").
    pub class_name: Option<String>,
    pub property_name: Option<String>,
    pub method_name: Option<String>,
    pub access_key: Option<String>,
    pub arguments: Vec<String>,
    pub superglobal_name: Option<String>,
    /// Dot-separated segments of a [`ExpressionKind::MemberChain`] (e.g.
    /// `["req", "body", "id"]` for `req.body.id`). Empty for every other kind.
    pub member_path: Vec<String>,
}

impl ParsedExpression {
    fn unknown(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            kind: ExpressionKind::Unknown,
            ..Default::default()
        }
    }
}

static IDENT: &str = "[A-Za-z_][A-Za-z0-9_]*";

static SUPERGLOBAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\$_(GET|POST|COOKIE|REQUEST|SERVER|FILES|ENV|SESSION)\[(.+)\]$"#).unwrap()
});

static STATIC_PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"^({ident})::(\$?{ident})$"#, ident = IDENT)).unwrap()
});

static PROPERTY_ACCESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^\$({ident})->({ident})(?:\[(.+)\])?$"#,
        ident = IDENT
    ))
    .unwrap()
});

static LOCAL_VARIABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r#"^\${ident}$"#, ident = IDENT)).unwrap());

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Consumes a leading `$name` / bare name at `raw[start..]`; returns the
/// identifier's end byte offset, or `start` if nothing matched.
fn consume_ident(raw: &str, start: usize) -> usize {
    let mut end = start;
    for (idx, c) in raw[start..].char_indices() {
        if is_ident_char(c) {
            end = start + idx + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// §4.D step 1: chained expressions. Consumes a leading `$name`, then
/// repeatedly `->name(args)` / `->name` / `->name[key]`. Succeeds only if
/// at least two steps parse and nothing is left over.
fn try_chained(raw: &str) -> Option<(String, Vec<ChainStep>)> {
    if raw.matches("->").count() < 2 {
        return None;
    }
    if !raw.starts_with('$') {
        return None;
    }
    let base_end = consume_ident(raw, 1);
    if base_end == 1 {
        return None;
    }
    let base = raw[..base_end].to_string();
    let mut steps = Vec::new();
    let mut pos = base_end;
    while pos < raw.len() {
        if !raw[pos..].starts_with("->") {
            return None;
        }
        pos += 2;
        let name_start = pos;
        let name_end = consume_ident(raw, name_start);
        if name_end == name_start {
            return None;
        }
        let name = raw[name_start..name_end].to_string();
        pos = name_end;
        if raw[pos..].starts_with('(') {
            let close = find_matching(raw, pos, '(', ')')?;
            let args = split_arguments(&raw[pos + 1..close]);
            steps.push(ChainStep::MethodCall { name, args });
            pos = close + 1;
        } else if raw[pos..].starts_with('[') {
            let close = find_matching(raw, pos, '[', ']')?;
            let key = strip_quotes(raw[pos + 1..close].trim());
            steps.push(ChainStep::PropertyAccess {
                name,
                key: Some(key),
            });
            pos = close + 1;
        } else {
            steps.push(ChainStep::PropertyAccess { name, key: None });
        }
    }
    if steps.len() >= 2 {
        Some((base, steps))
    } else {
        None
    }
}

fn try_static_call(raw: &str) -> Option<ParsedExpression> {
    let sep = raw.find("::")?;
    let (class_part, rest) = (&raw[..sep], &raw[sep + 2..]);
    if class_part.is_empty() || !class_part.chars().next()?.is_alphabetic() && class_part.chars().next()? != '_' {
        return None;
    }
    let name_end = consume_ident(rest, 0);
    if name_end == 0 {
        return None;
    }
    let method_name = &rest[..name_end];
    if !rest[name_end..].starts_with('(') {
        return None;
    }
    let paren_open = sep + 2 + name_end;
    let close = find_matching(raw, paren_open, '(', ')')?;
    if close + 1 != raw.len() {
        return None;
    }
    let args = split_arguments(&raw[paren_open + 1..close]);
    Some(ParsedExpression {
        raw: raw.to_string(),
        kind: ExpressionKind::StaticCall,
        class_name: Some(class_part.to_string()),
        method_name: Some(method_name.to_string()),
        access_key: args.first().map(|a| strip_quotes(a)),
        arguments: args,
        ..Default::default()
    })
}

fn try_superglobal(raw: &str) -> Option<ParsedExpression> {
    let caps = SUPERGLOBAL_RE.captures(raw)?;
    let name = format!("$_{}", &caps[1]);
    let key = strip_quotes(caps[2].trim());
    Some(ParsedExpression {
        raw: raw.to_string(),
        kind: ExpressionKind::Superglobal,
        superglobal_name: Some(name),
        access_key: Some(key),
        ..Default::default()
    })
}

fn try_static_property(raw: &str) -> Option<ParsedExpression> {
    let caps = STATIC_PROPERTY_RE.captures(raw)?;
    let class_name = caps[1].to_string();
    let member = caps[2].trim_start_matches('$').to_string();
    Some(ParsedExpression {
        raw: raw.to_string(),
        kind: ExpressionKind::StaticProperty,
        class_name: Some(class_name),
        property_name: Some(member),
        ..Default::default()
    })
}

fn try_method_call(raw: &str) -> Option<ParsedExpression> {
    if !raw.starts_with('$') {
        return None;
    }
    let var_end = consume_ident(raw, 1);
    if var_end == 1 {
        return None;
    }
    if !raw[var_end..].starts_with("->") {
        return None;
    }
    let name_start = var_end + 2;
    let name_end = consume_ident(raw, name_start);
    if name_end == name_start {
        return None;
    }
    if !raw[name_end..].starts_with('(') {
        return None;
    }
    let close = find_matching(raw, name_end, '(', ')')?;
    if close + 1 != raw.len() {
        return None;
    }
    let args = split_arguments(&raw[name_end + 1..close]);
    Some(ParsedExpression {
        raw: raw.to_string(),
        kind: ExpressionKind::MethodCall,
        base_variable: Some(raw[..var_end].to_string()),
        method_name: Some(raw[name_start..name_end].to_string()),
        access_key: args.first().map(|a| strip_quotes(a)),
        arguments: args,
        ..Default::default()
    })
}

fn try_property_access(raw: &str) -> Option<ParsedExpression> {
    let caps = PROPERTY_ACCESS_RE.captures(raw)?;
    let base = format!("${}", &caps[1]);
    let property = caps[2].to_string();
    let access_key = caps.get(3).map(|m| strip_quotes(m.as_str().trim()));
    Some(ParsedExpression {
        raw: raw.to_string(),
        kind: ExpressionKind::PropertyAccess,
        base_variable: Some(base),
        property_name: Some(property),
        access_key,
        ..Default::default()
    })
}

fn try_local_variable(raw: &str) -> Option<ParsedExpression> {
    LOCAL_VARIABLE_RE.is_match(raw).then(|| ParsedExpression {
        raw: raw.to_string(),
        kind: ExpressionKind::LocalVariable,
        base_variable: Some(raw.to_string()),
        ..Default::default()
    })
}

static MEMBER_CHAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r#"^{ident}(\.{ident}){{1,}}$"#, ident = IDENT)).unwrap());

/// Bare `name.name.name` with no `$` sigil — never matched by the PHP
/// recognizers above, which all require one.
fn try_member_chain(raw: &str) -> Option<ParsedExpression> {
    if !MEMBER_CHAIN_RE.is_match(raw) {
        return None;
    }
    let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
    Some(ParsedExpression {
        raw: raw.to_string(),
        kind: ExpressionKind::MemberChain,
        base_variable: segments.first().cloned(),
        member_path: segments,
        ..Default::default()
    })
}

/// Parses a trimmed expression string per §4.D's recognition order.
pub fn parse_expression(raw: &str) -> ParsedExpression {
    let raw = raw.trim();

    if let Some((base, steps)) = try_chained(raw) {
        return ParsedExpression {
            raw: raw.to_string(),
            kind: ExpressionKind::LocalVariable,
            is_chained: true,
            chain_steps: steps,
            base_variable: Some(base),
            ..Default::default()
        };
    }
    if let Some(parsed) = try_superglobal(raw) {
        return parsed;
    }
    if let Some(parsed) = try_static_call(raw) {
        return parsed;
    }
    if let Some(parsed) = try_static_property(raw) {
        return parsed;
    }
    if let Some(parsed) = try_method_call(raw) {
        return parsed;
    }
    if let Some(parsed) = try_property_access(raw) {
        return parsed;
    }
    if let Some(parsed) = try_local_variable(raw) {
        return parsed;
    }
    if let Some(parsed) = try_member_chain(raw) {
        return parsed;
    }
    ParsedExpression::unknown(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scenario_1_superglobal() {
        let parsed = parse_expression("$_GET['id']");
        assert_eq!(parsed.kind, ExpressionKind::Superglobal);
        assert_eq!(parsed.superglobal_name.as_deref(), Some("$_GET"));
        assert_eq!(parsed.access_key.as_deref(), Some("id"));
    }

    #[test]
    fn chained_expression_scenario_4() {
        let parsed = parse_expression("$a->b()->c['k']");
        assert!(parsed.is_chained);
        assert_eq!(parsed.chain_steps.len(), 2);
        assert_eq!(parsed.base_variable.as_deref(), Some("$a"));
        match &parsed.chain_steps[0] {
            ChainStep::MethodCall { name, args } => {
                assert_eq!(name, "b");
                assert!(args.is_empty());
            }
            _ => panic!("expected method call step"),
        }
        match &parsed.chain_steps[1] {
            ChainStep::PropertyAccess { name, key } => {
                assert_eq!(name, "c");
                assert_eq!(key.as_deref(), Some("k"));
            }
            _ => panic!("expected property access step"),
        }
    }

    #[test]
    fn static_call_scenario_6() {
        let parsed = parse_expression("C::m('x')");
        assert_eq!(parsed.kind, ExpressionKind::StaticCall);
        assert_eq!(parsed.class_name.as_deref(), Some("C"));
        assert_eq!(parsed.method_name.as_deref(), Some("m"));
        assert_eq!(parsed.arguments, vec!["'x'".to_string()]);
        assert_eq!(parsed.access_key.as_deref(), Some("x"));
    }

    #[test]
    fn static_property_and_constant() {
        let p = parse_expression("C::$prop");
        assert_eq!(p.kind, ExpressionKind::StaticProperty);
        assert_eq!(p.property_name.as_deref(), Some("prop"));
        let c = parse_expression("C::SOME_CONST");
        assert_eq!(c.kind, ExpressionKind::StaticProperty);
        assert_eq!(c.property_name.as_deref(), Some("SOME_CONST"));
    }

    #[test]
    fn method_call_with_nested_paren_args() {
        let parsed = parse_expression("$c->get('name', foo(1, 2))");
        assert_eq!(parsed.kind, ExpressionKind::MethodCall);
        assert_eq!(parsed.method_name.as_deref(), Some("get"));
        assert_eq!(parsed.arguments.len(), 2);
        assert_eq!(parsed.arguments[1], "foo(1, 2)");
    }

    #[test]
    fn property_access_with_key() {
        let parsed = parse_expression("$obj->prop['k']");
        assert_eq!(parsed.kind, ExpressionKind::PropertyAccess);
        assert_eq!(parsed.property_name.as_deref(), Some("prop"));
        assert_eq!(parsed.access_key.as_deref(), Some("k"));
    }

    #[test]
    fn local_variable() {
        let parsed = parse_expression("$name");
        assert_eq!(parsed.kind, ExpressionKind::LocalVariable);
    }

    #[test]
    fn scenario_5_member_chain() {
        let parsed = parse_expression("req.body.id");
        assert_eq!(parsed.kind, ExpressionKind::MemberChain);
        assert_eq!(parsed.member_path, vec!["req", "body", "id"]);
        assert_eq!(parsed.base_variable.as_deref(), Some("req"));
    }

    #[test]
    fn unmatched_expression_stays_unknown() {
        let parsed = parse_expression("1 + 2");
        assert_eq!(parsed.kind, ExpressionKind::Unknown);
    }

    #[test]
    fn unbalanced_paren_inside_string_literal_is_honoured() {
        // A literal containing an unescaped-looking `)` must not terminate
        // the argument list early.
        let parsed = parse_expression("$c->get('a)b')");
        assert_eq!(parsed.kind, ExpressionKind::MethodCall);
        assert_eq!(parsed.arguments, vec!["'a)b'".to_string()]);
    }

    proptest! {
        #[test]
        fn superglobal_parsing_is_idempotent(key in "[a-zA-Z_][a-zA-Z0-9_]{0,8}") {
            let raw = format!("$_GET['{key}']");
            let first = parse_expression(&raw);
            let second = parse_expression(&raw);
            prop_assert_eq!(first.kind, second.kind);
            prop_assert_eq!(first.access_key, second.access_key);
            prop_assert_eq!(first.superglobal_name, second.superglobal_name);
        }

        #[test]
        fn raw_expr_is_preserved(name in "[a-zA-Z_][a-zA-Z0-9_]{0,8}") {
            let raw = format!("${name}");
            let parsed = parse_expression(&raw);
            prop_assert_eq!(parsed.raw, raw);
        }

        #[test]
        fn chained_steps_concatenate_back_to_source(
            base in "[a-z]{1,5}",
            p1 in "[a-z]{1,5}",
            p2 in "[a-z]{1,5}",
        ) {
            let raw = format!("${base}->{p1}->{p2}");
            let parsed = parse_expression(&raw);
            // Never a mixed state: chained with ordered steps, or a
            // non-chained kind — the two are mutually exclusive.
            if parsed.is_chained {
                let mut rebuilt = format!("${base}");
                for step in &parsed.chain_steps {
                    match step {
                        ChainStep::PropertyAccess { name, key: None } => {
                            rebuilt.push_str(&format!("->{name}"));
                        }
                        ChainStep::PropertyAccess { name, key: Some(k) } => {
                            rebuilt.push_str(&format!("->{name}[{k}]"));
                        }
                        ChainStep::MethodCall { name, args } => {
                            rebuilt.push_str(&format!("->{name}({})", args.join(", ")));
                        }
                    }
                }
                prop_assert_eq!(rebuilt, raw);
            } else {
                prop_assert!(!parsed.chain_steps.iter().any(|_| true) || parsed.chain_steps.is_empty());
            }
        }
    }
}
