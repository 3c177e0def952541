//! The structured view of a parsed file: classes, methods, properties,
//! parameters, imports. Built once per file, read-only afterward (§3, §5).

use std::collections::HashMap;

use crate::shared::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    Import,
    Include,
    Use,
    Using,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub path: String,
    pub line: u32,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub index: usize,
    pub type_hint: Option<String>,
    pub default_value: Option<String>,
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub initial_value: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_readonly: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub body_start_line: u32,
    pub body_end_line: u32,
    /// Required by the engine: it pattern-matches on this text directly
    /// (§3 invariant I3 — empty iff there was no body to extract from).
    pub body_source: String,
    pub span: Span,
}

impl MethodDef {
    pub fn param_by_name(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Releases body text while keeping the signature, per §3's purge note.
    pub fn purge_body(&mut self) {
        self.body_source.clear();
    }
}

/// The platform's constructor method name, used to find the duplicate
/// `methods` entry a class's `constructor` pointer refers to (§3 I1).
pub const PHP_CONSTRUCTOR_NAME: &str = "__construct";

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<String>,
    pub implements: Vec<String>,
    pub properties: HashMap<String, PropertyDef>,
    pub methods: HashMap<String, MethodDef>,
    /// Name of the method in `methods` that is this class's constructor,
    /// if any (I1: always also present in `methods`).
    pub constructor: Option<String>,
    pub span: Span,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            parent: None,
            implements: Vec::new(),
            properties: HashMap::new(),
            methods: HashMap::new(),
            constructor: None,
            span,
        }
    }

    pub fn constructor_method(&self) -> Option<&MethodDef> {
        self.constructor.as_ref().and_then(|n| self.methods.get(n))
    }

    pub fn implements_name(&self, name: &str) -> bool {
        self.implements.iter().any(|i| i.eq_ignore_ascii_case(name))
    }
}

/// Owned per file. Names unique within a file; duplicate inserts overwrite
/// (last wins), matching §3.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub file_path: String,
    pub imports: Vec<Import>,
    pub classes: HashMap<String, ClassDef>,
    pub functions: HashMap<String, MethodDef>,
}

impl SymbolTable {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    pub fn insert_class(&mut self, class: ClassDef) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn insert_function(&mut self, function: MethodDef) {
        self.functions.insert(function.name.clone(), function);
    }

    /// Case-insensitive class lookup, §4.E.5 step 2's second fallback.
    pub fn find_class_case_insensitive(&self, name: &str) -> Option<&ClassDef> {
        self.classes
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Strips a trailing `_interface`/`Interface` suffix, §4.E.5 step 2's
    /// third fallback.
    pub fn find_class_by_stripped_interface_suffix(&self, name: &str) -> Option<&ClassDef> {
        let lower = name.to_ascii_lowercase();
        let stripped = lower.strip_suffix("interface").unwrap_or(&lower);
        if stripped == lower {
            return None;
        }
        self.classes
            .values()
            .find(|c| c.name.to_ascii_lowercase() == stripped)
    }

    /// A class whose `implements` list contains `name`, §4.E.5's final
    /// fallback (approximating virtual dispatch per §9).
    pub fn find_class_implementing(&self, name: &str) -> Option<&ClassDef> {
        self.classes.values().find(|c| c.implements_name(name))
    }

    /// Releases every method/function body in this table (§3 lifecycle).
    pub fn purge_bodies(&mut self) {
        for class in self.classes.values_mut() {
            for method in class.methods.values_mut() {
                method.purge_body();
            }
        }
        for function in self.functions.values_mut() {
            function.purge_body();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str) -> MethodDef {
        MethodDef {
            name: name.to_string(),
            parameters: vec![],
            return_type: None,
            body_start_line: 0,
            body_end_line: 0,
            body_source: "{}".to_string(),
            span: Span::zero(),
        }
    }

    #[test]
    fn duplicate_insert_overwrites_last_wins() {
        let mut table = SymbolTable::new("f.php");
        table.insert_function(method("foo"));
        let mut second = method("foo");
        second.return_type = Some("int".to_string());
        table.insert_function(second);
        assert_eq!(
            table.functions["foo"].return_type.as_deref(),
            Some("int")
        );
        assert_eq!(table.functions.len(), 1);
    }

    #[test]
    fn constructor_pointer_is_also_in_methods() {
        let mut class = ClassDef::new("MyBB", Span::zero());
        class.methods.insert(PHP_CONSTRUCTOR_NAME.to_string(), method(PHP_CONSTRUCTOR_NAME));
        class.constructor = Some(PHP_CONSTRUCTOR_NAME.to_string());
        assert!(class.constructor_method().is_some());
    }

    #[test]
    fn purge_bodies_clears_text_keeps_signature() {
        let mut table = SymbolTable::new("f.php");
        table.insert_function(method("foo"));
        table.purge_bodies();
        assert!(table.functions["foo"].body_source.is_empty());
        assert_eq!(table.functions["foo"].name, "foo");
    }
}
