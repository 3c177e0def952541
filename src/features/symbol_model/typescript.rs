//! TypeScript/JavaScript symbol extractor — lighter than the PHP one: it
//! covers plain property-chain carriers (`req.body.id`) and framework
//! detection, not PHP-style class resolution (SPEC_FULL §Symbol Model).

use tree_sitter::{Node, Parser, Tree};

use crate::errors::{Result, TraceError};
use crate::features::symbol_model::domain::{
    ClassDef, Import, ImportKind, MethodDef, Parameter, SymbolTable,
};
use crate::features::symbol_model::ports::SymbolExtractor;
use crate::shared::Span;

pub struct TypeScriptExtractor;

impl TypeScriptExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parse(&self, bytes: &[u8]) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::language_typescript())
            .expect("TypeScript grammar must load");
        parser
            .parse(bytes, None)
            .ok_or_else(|| TraceError::Parse("tree-sitter produced no tree".to_string()))
    }
}

impl Default for TypeScriptExtractor {
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

fn parse_parameters(node: Node, bytes: &[u8]) -> Vec<Parameter> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for (index, child) in node.named_children(&mut cursor).enumerate() {
        let name_node = child
            .child_by_field_name("pattern")
            .or_else(|| child.child_by_field_name("name"));
        let name = name_node.map(|n| text(n, bytes).to_string()).unwrap_or_default();
        let default_value = child.child_by_field_name("value").map(|n| text(n, bytes).to_string());
        out.push(Parameter {
            name,
            index,
            type_hint: child.child_by_field_name("type").map(|n| text(n, bytes).to_string()),
            default_value,
            variadic: child.kind() == "rest_pattern",
        });
    }
    out
}

fn parse_function_like(node: Node, name: String, bytes: &[u8]) -> MethodDef {
    let parameters = node
        .child_by_field_name("parameters")
        .map(|n| parse_parameters(n, bytes))
        .unwrap_or_default();
    let (body_source, body_start_line, body_end_line) = match node.child_by_field_name("body") {
        Some(body) => (
            text(body, bytes).to_string(),
            body.start_position().row as u32,
            body.end_position().row as u32,
        ),
        None => (String::new(), 0, 0),
    };
    MethodDef {
        name,
        parameters,
        return_type: None,
        body_start_line,
        body_end_line,
        body_source,
        span: span_of(node),
    }
}

fn method_name(node: Node, bytes: &[u8]) -> String {
    node.child_by_field_name("name")
        .map(|n| text(n, bytes).trim_matches('"').trim_matches('\'').to_string())
        .unwrap_or_default()
}

fn parse_class(node: Node, bytes: &[u8]) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, bytes).to_string())
        .unwrap_or_default();
    let mut class = ClassDef::new(name, span_of(node));
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() == "method_definition" {
                let method = parse_function_like(member, method_name(member, bytes), bytes);
                if method.name == "constructor" {
                    class.constructor = Some(method.name.clone());
                }
                class.methods.insert(method.name.clone(), method);
            }
        }
    }
    class
}

fn collect_imports(root: Node, bytes: &[u8], imports: &mut Vec<Import>) {
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        if node.kind() == "import_statement" {
            if let Some(source) = node.child_by_field_name("source") {
                imports.push(Import {
                    path: text(source, bytes).trim_matches('"').trim_matches('\'').to_string(),
                    line: node.start_position().row as u32,
                    kind: ImportKind::Import,
                });
            }
        }
        collect_imports(node, bytes, imports);
    }
}

impl SymbolExtractor for TypeScriptExtractor {
    fn build_symbol_table(&self, path: &str, bytes: &[u8]) -> Result<SymbolTable> {
        let tree = self.parse(bytes)?;
        let root = tree.root_node();
        let mut table = SymbolTable::new(path);
        collect_imports(root, bytes, &mut table.imports);

        fn walk(node: Node, bytes: &[u8], table: &mut SymbolTable) {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "function_declaration" => {
                        let name = child
                            .child_by_field_name("name")
                            .map(|n| text(n, bytes).to_string())
                            .unwrap_or_default();
                        table.insert_function(parse_function_like(child, name, bytes));
                    }
                    "class_declaration" => {
                        table.insert_class(parse_class(child, bytes));
                    }
                    _ => walk(child, bytes, table),
                }
            }
        }
        walk(root, bytes, &mut table);
        Ok(table)
    }

    /// Recognizes `express` via a `require('express')`/`import express from
    /// 'express'` plus an `app.use`/`router.` call, matching scenario 5.
    fn detect_frameworks(&self, table: &SymbolTable, bytes: &[u8]) -> Vec<String> {
        let source = String::from_utf8_lossy(bytes);
        let imports_express = table.imports.iter().any(|i| i.path == "express")
            || source.contains("require('express')")
            || source.contains("require(\"express\")");
        let wired_up = source.contains("app.use") || source.contains("router.");
        if imports_express && wired_up {
            vec!["express".to_string()]
        } else {
            Vec::new()
        }
    }
}
