//! Undirected weighted network over hop identifiers
//!
//! Builds a CSR graph (trueno-graph) from aggregated edge counts, typically the
//! most traversed edges, for handing to an external renderer. Each undirected
//! edge is stored in both directions with the traversal count as weight.
//! Weights are `f32`, so counts above 2^24 are rounded; exact counts stay in
//! the [`EdgeCount`] list.

use crate::edge_counts::EdgeCount;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use trueno_graph::{CsrGraph, NodeId};

pub struct EdgeNetwork {
    name: String,
    graph: CsrGraph,
    /// Hop identifier -> node, in first-seen order
    nodes: IndexMap<String, NodeId>,
    edges: usize,
}

impl EdgeNetwork {
    /// Build a network named `<prefix>_<NNNNN>` (edge count, zero padded)
    pub fn from_edges(prefix: &str, edges: &[EdgeCount]) -> Result<Self> {
        let mut graph = CsrGraph::new();
        let mut nodes: IndexMap<String, NodeId> = IndexMap::new();

        for edge in edges {
            let a = intern(&mut nodes, &edge.a)?;
            let b = intern(&mut nodes, &edge.b)?;
            let weight = edge.count as f32;

            graph
                .add_edge(a, b, weight)
                .with_context(|| format!("Failed to add edge {} - {}", edge.a, edge.b))?;
            if a != b {
                graph
                    .add_edge(b, a, weight)
                    .with_context(|| format!("Failed to add edge {} - {}", edge.b, edge.a))?;
            }
        }

        Ok(Self {
            name: format!("{}_{:05}", prefix, edges.len()),
            graph,
            nodes,
            edges: edges.len(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Undirected edge count
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    pub fn node(&self, id: &str) -> Option<NodeId> {
        self.nodes.get(id).copied()
    }

    /// Neighbors of a hop with their traversal counts
    pub fn neighbors(&self, id: &str) -> Vec<(String, f32)> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let (neighbors, weights) = self.graph.adjacency(node);
        neighbors
            .iter()
            .zip(weights.iter())
            .filter_map(|(&n, &w)| {
                self.nodes
                    .get_index(n as usize)
                    .map(|(name, _)| (name.clone(), w))
            })
            .collect()
    }

    pub fn degree(&self, id: &str) -> usize {
        self.neighbors(id).len()
    }

    /// Direct access to the CSR graph for trueno-graph algorithms
    pub fn as_csr_graph(&self) -> &CsrGraph {
        &self.graph
    }
}

fn intern(nodes: &mut IndexMap<String, NodeId>, id: &str) -> Result<NodeId> {
    if let Some(node) = nodes.get(id) {
        return Ok(*node);
    }
    let node = next_node_id(nodes.len())?;
    nodes.insert(id.to_string(), node);
    Ok(node)
}

fn next_node_id(interned: usize) -> Result<NodeId> {
    let id = u32::try_from(interned).with_context(|| format!("Too many nodes for a network: {}", interned))?;
    Ok(NodeId(id))
}
