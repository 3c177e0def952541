//! Common types shared across all features. Zero tree-sitter/dashmap deps
//! here so domain models stay cheap to depend on.

pub mod models;

pub use models::{Location, Span};
