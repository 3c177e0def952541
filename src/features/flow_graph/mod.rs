//! Deduplicated node/edge store with bounded size, plus the taint-chain
//! record attached to parameters, call arguments, and returns (§3, §4.F).
//!
//! Indexed with `HashMap`/`HashSet` for O(1) `has_node`/`has_edge` the same
//! way the teacher's `cross_file/dep_graph.rs` wraps a graph crate with its
//! own lookup indices — without pulling in `petgraph` itself, since this
//! component needs identity/dedup/cap semantics, not generic traversal.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::features::source_keywords::SourceKind;
use crate::shared::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Source,
    Carrier,
    Variable,
    Function,
    Property,
    Param,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    Assignment,
    Parameter,
    Return,
    Property,
    ArraySet,
    ArrayGet,
    MethodCall,
    Constructor,
    Framework,
    Concatenate,
    Destructure,
    Iteration,
    Conditional,
    Call,
    DataFlow,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowNode {
    pub id: String,
    pub kind: NodeKind,
    pub language: String,
    pub location: Option<Span>,
    pub display_name: String,
    pub snippet: Option<String>,
    pub source_kind: Option<SourceKind>,
    pub source_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub location: Option<Span>,
    pub description: String,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowGraph {
    nodes: Vec<FlowNode>,
    #[serde(skip)]
    node_index: HashMap<String, usize>,
    edges: Vec<FlowEdge>,
    #[serde(skip)]
    edge_index: HashSet<(String, String, EdgeKind)>,
    pub sources: Vec<String>,
    pub carriers: Vec<String>,
    pub usages: Vec<String>,
    max_nodes: usize,
    max_edges: usize,
}

impl FlowGraph {
    pub fn new(max_nodes: usize, max_edges: usize) -> Self {
        Self {
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
            edge_index: HashSet::new(),
            sources: Vec::new(),
            carriers: Vec::new(),
            usages: Vec::new(),
            max_nodes,
            max_edges,
        }
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn has_edge(&self, from: &str, to: &str, kind: EdgeKind) -> bool {
        self.edge_index
            .contains(&(from.to_string(), to.to_string(), kind))
    }

    /// Returns `false` without raising if `node.id` is a duplicate (G1) or
    /// `max_nodes` is already reached (G3) — additions past the cap are
    /// rejected, not evicted.
    pub fn add_node(&mut self, node: FlowNode) -> bool {
        if self.has_node(&node.id) {
            return false;
        }
        if self.nodes.len() >= self.max_nodes {
            return false;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Returns `false` if both endpoints aren't present (G2), the edge is a
    /// duplicate, or `max_edges` is reached (G3).
    pub fn add_edge(&mut self, edge: FlowEdge) -> bool {
        if !self.has_node(&edge.from) || !self.has_node(&edge.to) {
            return false;
        }
        if self.has_edge(&edge.from, &edge.to, edge.kind) {
            return false;
        }
        if self.edges.len() >= self.max_edges {
            return false;
        }
        self.edge_index
            .insert((edge.from.clone(), edge.to.clone(), edge.kind));
        self.edges.push(edge);
        true
    }

    pub fn add_source(&mut self, node_id: impl Into<String>) {
        let id = node_id.into();
        if !self.sources.contains(&id) {
            self.sources.push(id);
        }
    }

    pub fn add_carrier(&mut self, node_id: impl Into<String>) {
        let id = node_id.into();
        if !self.carriers.contains(&id) {
            self.carriers.push(id);
        }
    }

    pub fn add_usage(&mut self, node_id: impl Into<String>) {
        let id = node_id.into();
        if !self.usages.contains(&id) {
            self.usages.push(id);
        }
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaintStepKind {
    Assignment,
    Parameter,
    Return,
    Property,
    MethodCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaintStep {
    pub kind: TaintStepKind,
    pub code: String,
    pub location: Option<Span>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaintChain {
    pub original_source: String,
    pub source_kind: SourceKind,
    pub origin_file: String,
    pub origin_line: u32,
    pub current_expression: String,
    pub depth: u32,
    pub steps: Vec<TaintStep>,
}

impl TaintChain {
    pub fn new(
        original_source: impl Into<String>,
        source_kind: SourceKind,
        origin_file: impl Into<String>,
        origin_line: u32,
    ) -> Self {
        let original_source = original_source.into();
        Self {
            current_expression: original_source.clone(),
            original_source,
            source_kind,
            origin_file: origin_file.into(),
            origin_line,
            depth: 0,
            steps: Vec::new(),
        }
    }

    pub fn add_step(&mut self, step: TaintStep) {
        self.steps.push(step);
        self.depth += 1;
    }
}
