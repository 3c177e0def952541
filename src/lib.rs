//! Cross-language static taint-flow tracer.
//!
//! Given a target expression and the file it appears in, [`SymbolicEngine`]
//! reconstructs the chain of assignments, property accesses, and method
//! returns that produced it, stopping at an ultimate source of user input
//! (an HTTP superglobal, a CLI argument, an environment variable, ...) or at
//! the point the trace can no longer proceed. PHP is the structurally
//! complete case; TypeScript/Node support covers the lighter
//! framework-carrier fallback.

#![allow(clippy::too_many_arguments)] // trace helpers thread class/file/depth context explicitly

pub mod config;
pub mod errors;
pub mod features;
pub mod shared;

pub use config::{EngineConfig, Preset};
pub use errors::{Result, TraceError};
pub use features::expression_parser::{parse_expression, ChainStep, ExpressionKind, ParsedExpression};
pub use features::file_cache::{CacheEntry, CacheStats, FileCache};
pub use features::flow_graph::{
    EdgeKind, FlowEdge, FlowGraph, FlowNode, NodeKind, TaintChain, TaintStep, TaintStepKind,
};
pub use features::indexer::{CodeIndexer, IndexedSymbol, MatchedBy, Reference, SearchQuery, SearchResult, SymbolKind};
pub use features::source_keywords::{
    FrameworkType, KeywordRegistry, Language, LanguageMapping, SourceKind, ALL_SOURCE_KINDS, BUILTIN_REGISTRY,
};
pub use features::symbol_model::{
    ClassDef, Import, ImportKind, MethodDef, Parameter, PropertyDef, PhpExtractor, SymbolExtractor, SymbolTable,
    TypeScriptExtractor, Visibility, PHP_CONSTRUCTOR_NAME,
};
pub use features::symbolic_engine::{SymbolicEngine, TraceOutcome};
pub use shared::{Location, Span};
