//! Shared models used across every feature.

mod span;

pub use span::{Location, Span};
