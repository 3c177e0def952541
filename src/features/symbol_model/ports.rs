//! The contract every language extractor fulfils (§6). The *structural*
//! extraction itself — walking a tree-sitter parse into a [`SymbolTable`] —
//! is out of scope for the engine; it only consumes the result.

use crate::errors::Result;
use crate::features::symbol_model::domain::SymbolTable;

pub trait SymbolExtractor: Send + Sync {
    /// Populates classes, functions, and imports from a parsed file.
    fn build_symbol_table(&self, path: &str, bytes: &[u8]) -> Result<SymbolTable>;

    /// Frameworks referenced by this file's imports/requires (e.g. `express`
    /// for a `require('express')`/`app.use` pair), used by the engine's
    /// framework-carrier fallback trace (scenario 5).
    fn detect_frameworks(&self, table: &SymbolTable, bytes: &[u8]) -> Vec<String>;
}
