//! Error types for the tracer.
//!
//! Only the failure kinds that surface to a caller get a variant here.
//! Depth-exceeded and flow-graph-capacity are bounded-resource decisions,
//! not failures, and are reported as `bool`/absence elsewhere instead.

use thiserror::Error;

/// Unified error type for tracer operations.
#[derive(Debug, Error)]
pub enum TraceError {
    /// An expression could not be classified into any recognised kind.
    #[error("could not parse expression: {0}")]
    Parse(String),

    /// A variable's owning class could not be resolved to an instantiation.
    #[error("could not resolve instantiation for `{0}`")]
    Instantiation(String),

    /// A class name was resolved but no definition exists for it.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// A method name was resolved against a class but is not defined on it.
    #[error("method not found: {class}::{method}")]
    MethodNotFound { class: String, method: String },

    /// A property was referenced but not declared, and no fallback pattern
    /// (external assignment, magic property) resolved it either.
    #[error("property not found: {class}::{property}")]
    PropertyNotFound { class: String, property: String },

    /// I/O or parse failure loading a source file through the cache.
    #[error("failed to load {path}: {source}")]
    FileLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TraceError>;
