//! Engine-wide bounds: depth, flow-graph caps, cache sizing.
//!
//! Mirrors the teacher's tiered-preset pattern (`Preset::performance_profile`)
//! without its YAML provenance machinery — this crate has one process, one
//! engine instance, no multi-user config history to track.

use serde::{Deserialize, Serialize};

/// One-line construction for the three bound profiles callers reach for most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Tight bounds for CI / fast interactive use.
    Strict,
    /// The bounds named throughout the spec.
    Default,
    /// Wider bounds for exhaustive offline audits.
    Generous,
}

impl Preset {
    pub fn config(self) -> EngineConfig {
        match self {
            Preset::Strict => EngineConfig {
                max_depth: 5,
                max_nodes: 2_000,
                max_edges: 4_000,
                cache_max_entries: 15,
                cache_max_memory_bytes: 16 * 1024 * 1024,
                ast_memory_multiplier: 7,
            },
            Preset::Default => EngineConfig::default(),
            Preset::Generous => EngineConfig {
                max_depth: 25,
                max_nodes: 50_000,
                max_edges: 100_000,
                cache_max_entries: 120,
                cache_max_memory_bytes: 256 * 1024 * 1024,
                ast_memory_multiplier: 7,
            },
        }
    }
}

/// Every bound spec.md calls out by name, with its stated default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// §4.E.10 recursion guard shared by every trace path.
    pub max_depth: u32,
    /// §3 flow-graph node cap.
    pub max_nodes: usize,
    /// §3 flow-graph edge cap.
    pub max_edges: usize,
    /// §4.C LRU entry-count cap.
    pub cache_max_entries: usize,
    /// §4.C LRU byte-budget cap.
    pub cache_max_memory_bytes: usize,
    /// §4.C AST-size-from-source-length estimate multiplier.
    pub ast_memory_multiplier: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_nodes: 10_000,
            max_edges: 20_000,
            cache_max_entries: 30,
            cache_max_memory_bytes: 64 * 1024 * 1024,
            ast_memory_multiplier: 7,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
