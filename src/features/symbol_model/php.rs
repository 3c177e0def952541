//! PHP symbol extractor — the hard case: object instantiation, magic
//! properties, DI patterns, and chained calls all need a faithful class/
//! method/property model to trace against.

use tree_sitter::{Node, Parser, Tree};

use crate::errors::{Result, TraceError};
use crate::features::symbol_model::domain::{
    ClassDef, Import, ImportKind, MethodDef, Parameter, PropertyDef, SymbolTable, Visibility,
    PHP_CONSTRUCTOR_NAME,
};
use crate::features::symbol_model::ports::SymbolExtractor;
use crate::shared::Span;

pub struct PhpExtractor;

impl PhpExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parse(&self, bytes: &[u8]) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_php::language_php())
            .expect("PHP grammar must load");
        parser
            .parse(bytes, None)
            .ok_or_else(|| TraceError::Parse("tree-sitter produced no tree".to_string()))
    }
}

impl Default for PhpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn text<'a>(node: Node, bytes: &'a [u8]) -> &'a str {
    node.utf8_text(bytes).unwrap_or("")
}

fn span_of(node: Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span::new(start.row as u32, start.column as u32, end.row as u32, end.column as u32)
}

fn variable_name(node: Node, bytes: &[u8]) -> String {
    // `variable_name` wraps a `name` child; strip the leading `$` if present
    // in the raw slice so callers get a bare identifier consistently.
    text(node, bytes).trim_start_matches('$').to_string()
}

fn parse_parameters(params_node: Node, bytes: &[u8]) -> Vec<Parameter> {
    let mut out = Vec::new();
    let mut cursor = params_node.walk();
    for (index, child) in params_node.named_children(&mut cursor).enumerate() {
        match child.kind() {
            "simple_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| variable_name(n, bytes))
                    .unwrap_or_default();
                let type_hint = child.child_by_field_name("type").map(|n| text(n, bytes).to_string());
                let default_value = child
                    .child_by_field_name("default_value")
                    .map(|n| text(n, bytes).to_string());
                out.push(Parameter {
                    name,
                    index,
                    type_hint,
                    default_value,
                    variadic: false,
                });
            }
            "variadic_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| variable_name(n, bytes))
                    .unwrap_or_default();
                let type_hint = child.child_by_field_name("type").map(|n| text(n, bytes).to_string());
                out.push(Parameter {
                    name,
                    index,
                    type_hint,
                    default_value: None,
                    variadic: true,
                });
            }
            "property_promotion_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| variable_name(n, bytes))
                    .unwrap_or_default();
                out.push(Parameter {
                    name,
                    index,
                    type_hint: None,
                    default_value: None,
                    variadic: false,
                });
            }
            _ => {}
        }
    }
    out
}

fn parse_method(node: Node, bytes: &[u8]) -> MethodDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, bytes).to_string())
        .unwrap_or_default();
    let parameters = node
        .child_by_field_name("parameters")
        .map(|n| parse_parameters(n, bytes))
        .unwrap_or_default();
    let return_type = node.child_by_field_name("return_type").map(|n| text(n, bytes).to_string());
    let (body_source, body_start_line, body_end_line) = match node.child_by_field_name("body") {
        Some(body) => (
            text(body, bytes).to_string(),
            body.start_position().row as u32,
            body.end_position().row as u32,
        ),
        // I3: declaration-only members (interface/abstract methods) have no
        // body node, so body_source stays empty.
        None => (String::new(), 0, 0),
    };
    MethodDef {
        name,
        parameters,
        return_type,
        body_start_line,
        body_end_line,
        body_source,
        span: span_of(node),
    }
}

fn visibility_of(node: Node, bytes: &[u8]) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return match text(child, bytes) {
                "private" => Visibility::Private,
                "protected" => Visibility::Protected,
                _ => Visibility::Public,
            };
        }
    }
    Visibility::Public
}

fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

fn parse_properties(decl: Node, bytes: &[u8]) -> Vec<PropertyDef> {
    let visibility = visibility_of(decl, bytes);
    let is_static = has_child_kind(decl, "static_modifier");
    let is_readonly = has_child_kind(decl, "readonly_modifier");
    let mut out = Vec::new();
    let mut cursor = decl.walk();
    for element in decl.named_children(&mut cursor) {
        if element.kind() != "property_element" {
            continue;
        }
        let mut name = String::new();
        let mut initial_value = None;
        let mut ec = element.walk();
        for child in element.children(&mut ec) {
            match child.kind() {
                "variable_name" => name = variable_name(child, bytes),
                "property_initializer" => {
                    initial_value = child
                        .named_child(0)
                        .map(|n| text(n, bytes).to_string());
                }
                _ => {}
            }
        }
        out.push(PropertyDef {
            name,
            initial_value,
            visibility,
            is_static,
            is_readonly,
        });
    }
    out
}

fn parse_class(node: Node, bytes: &[u8]) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, bytes).to_string())
        .unwrap_or_default();
    let mut class = ClassDef::new(name, span_of(node));

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "base_clause" => {
                if let Some(name_node) = child.named_child(0) {
                    class.parent = Some(text(name_node, bytes).to_string());
                }
            }
            "class_interface_clause" => {
                let mut ic = child.walk();
                for iface in child.named_children(&mut ic) {
                    class.implements.push(text(iface, bytes).to_string());
                }
            }
            _ => {}
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut bc = body.walk();
        for member in body.named_children(&mut bc) {
            match member.kind() {
                "method_declaration" => {
                    let method = parse_method(member, bytes);
                    if method.name == PHP_CONSTRUCTOR_NAME {
                        class.constructor = Some(method.name.clone());
                    }
                    class.methods.insert(method.name.clone(), method);
                }
                "property_declaration" => {
                    for prop in parse_properties(member, bytes) {
                        class.properties.insert(prop.name.clone(), prop);
                    }
                }
                _ => {}
            }
        }
    }

    class
}

fn collect_imports(root: Node, bytes: &[u8], imports: &mut Vec<Import>) {
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "namespace_use_declaration" => {
                let mut uc = node.walk();
                for clause in node.named_children(&mut uc) {
                    if clause.kind() == "namespace_use_clause" {
                        if let Some(name_node) = clause.named_child(0) {
                            imports.push(Import {
                                path: text(name_node, bytes).to_string(),
                                line: node.start_position().row as u32,
                                kind: ImportKind::Use,
                            });
                        }
                    }
                }
            }
            "expression_statement" => {
                if let Some(expr) = node.named_child(0) {
                    if expr.kind() == "include_expression" || expr.kind() == "require_expression" {
                        let path = expr
                            .named_child(0)
                            .map(|n| text(n, bytes).trim_matches(|c| c == '\'' || c == '"').to_string())
                            .unwrap_or_default();
                        imports.push(Import {
                            path,
                            line: node.start_position().row as u32,
                            kind: ImportKind::Include,
                        });
                    }
                }
            }
            _ => {}
        }
        collect_imports(node, bytes, imports);
    }
}

impl SymbolExtractor for PhpExtractor {
    fn build_symbol_table(&self, path: &str, bytes: &[u8]) -> Result<SymbolTable> {
        let tree = self.parse(bytes)?;
        let root = tree.root_node();
        let mut table = SymbolTable::new(path);
        collect_imports(root, bytes, &mut table.imports);

        fn walk(node: Node, bytes: &[u8], table: &mut SymbolTable) {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "class_declaration" => {
                        table.insert_class(parse_class(child, bytes));
                    }
                    "function_definition" => {
                        table.insert_function(parse_method(child, bytes));
                    }
                    _ => walk(child, bytes, table),
                }
            }
        }
        walk(root, bytes, &mut table);
        Ok(table)
    }

    fn detect_frameworks(&self, _table: &SymbolTable, _bytes: &[u8]) -> Vec<String> {
        // PHP frameworks are not part of the traced scenarios; the hard case
        // here is plain object-oriented code, not framework detection.
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MYBB_SRC: &str = r#"<?php
class MyBB {
    public $cookies;
    function __construct() {
        foreach ($_COOKIE as $k => $v) {
            $this->cookies[$k] = $v;
        }
    }
}
"#;

    #[test]
    fn extracts_class_with_constructor_and_property() {
        let extractor = PhpExtractor::new();
        let table = extractor.build_symbol_table("a.php", MYBB_SRC.as_bytes()).unwrap();
        let class = &table.classes["MyBB"];
        assert!(class.properties.contains_key("cookies"));
        let ctor = class.constructor_method().expect("constructor present");
        assert!(ctor.body_source.contains("$_COOKIE"));
    }

    #[test]
    fn parameter_index_matches_position() {
        let src = "<?php\nclass C { function get($k, $default) { return $this->data[$k]; } }\n";
        let extractor = PhpExtractor::new();
        let table = extractor.build_symbol_table("c.php", src.as_bytes()).unwrap();
        let method = &table.classes["C"].methods["get"];
        assert_eq!(method.parameters[0].index, 0);
        assert_eq!(method.parameters[1].index, 1);
        assert_eq!(method.parameters[0].name, "k");
    }

    #[test]
    fn implements_clause_is_recorded() {
        let src = "<?php\ninterface Fooable {}\nclass Foo implements Fooable {}\n";
        let extractor = PhpExtractor::new();
        let table = extractor.build_symbol_table("c.php", src.as_bytes()).unwrap();
        assert!(table.classes["Foo"].implements_name("Fooable"));
    }

    #[test]
    fn declaration_only_method_has_empty_body() {
        let src = "<?php\nabstract class A { abstract function m(); }\n";
        let extractor = PhpExtractor::new();
        let table = extractor.build_symbol_table("a.php", src.as_bytes()).unwrap();
        assert!(table.classes["A"].methods["m"].body_source.is_empty());
    }
}
