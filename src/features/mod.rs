//! Feature modules, each a vertical slice: domain types, the ports a slice
//! exposes to the others, and the infrastructure backing them.

pub mod expression_parser;
pub mod file_cache;
pub mod flow_graph;
pub mod indexer;
pub mod source_keywords;
pub mod symbol_model;
pub mod symbolic_engine;
