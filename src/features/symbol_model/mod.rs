//! Structured view of parsed files: classes, methods, parameters, properties,
//! imports (§3, §4.B).

pub mod domain;
pub mod php;
pub mod ports;
pub mod typescript;

pub use domain::{
    ClassDef, Import, ImportKind, MethodDef, Parameter, PropertyDef, SymbolTable, Visibility,
    PHP_CONSTRUCTOR_NAME,
};
pub use php::PhpExtractor;
pub use ports::SymbolExtractor;
pub use typescript::TypeScriptExtractor;
