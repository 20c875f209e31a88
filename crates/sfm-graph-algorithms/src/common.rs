//! Shared utilities for graph algorithms
//!
//! Provides a read-only, optimized view of the graph topology for algorithm execution.

use std::collections::HashMap;

/// Node identifier type (opaque 128-bit id)
pub type NodeId = u128;

/// A dense, integer-indexed view of the graph topology using Compressed Sparse Row (CSR) format.
///
/// Built once from the committed state of the store; algorithms never touch
/// the store itself.
#[derive(Debug, Clone)]
pub struct GraphView {
    /// Number of nodes
    pub node_count: usize,
    /// Mapping from dense index (0..N) back to NodeId
    pub index_to_node: Vec<NodeId>,
    /// Mapping from NodeId to dense index
    pub node_to_index: HashMap<NodeId, usize>,

    /// Outgoing edges CSR structure.
    /// Offsets into `out_targets`. Size = node_count + 1
    pub out_offsets: Vec<usize>,
    /// Contiguous array of target node indices
    pub out_targets: Vec<usize>,
    /// Edge weights aligned with `out_targets`
    pub out_weights: Vec<f64>,

    /// Incoming edges CSR structure.
    /// Offsets into `in_sources`. Size = node_count + 1
    pub in_offsets: Vec<usize>,
    /// Contiguous array of source node indices
    pub in_sources: Vec<usize>,
    /// Edge weights aligned with `in_sources`
    pub in_weights: Vec<f64>,
}

impl GraphView {
    /// Build a view from an edge list. Node order defines the dense index order.
    pub fn from_edges(nodes: Vec<NodeId>, edges: &[(NodeId, NodeId, f64)]) -> Self {
        let node_count = nodes.len();
        let mut node_to_index = HashMap::with_capacity(node_count);
        for (i, &id) in nodes.iter().enumerate() {
            node_to_index.insert(id, i);
        }

        let mut outgoing: Vec<Vec<(usize, f64)>> = vec![Vec::new(); node_count];
        let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); node_count];
        for &(src, dst, w) in edges {
            let (Some(&u), Some(&v)) = (node_to_index.get(&src), node_to_index.get(&dst)) else {
                continue;
            };
            outgoing[u].push((v, w));
            incoming[v].push((u, w));
        }

        let mut out_offsets = Vec::with_capacity(node_count + 1);
        let mut out_targets = Vec::new();
        let mut out_weights = Vec::new();
        out_offsets.push(0);
        for row in &outgoing {
            for &(v, w) in row {
                out_targets.push(v);
                out_weights.push(w);
            }
            out_offsets.push(out_targets.len());
        }

        let mut in_offsets = Vec::with_capacity(node_count + 1);
        let mut in_sources = Vec::new();
        let mut in_weights = Vec::new();
        in_offsets.push(0);
        for row in &incoming {
            for &(u, w) in row {
                in_sources.push(u);
                in_weights.push(w);
            }
            in_offsets.push(in_sources.len());
        }

        GraphView {
            node_count,
            index_to_node: nodes,
            node_to_index,
            out_offsets,
            out_targets,
            out_weights,
            in_offsets,
            in_sources,
            in_weights,
        }
    }

    /// Get the out-degree of a node (by index)
    pub fn out_degree(&self, idx: usize) -> usize {
        self.out_offsets[idx + 1] - self.out_offsets[idx]
    }

    /// Get the in-degree of a node (by index)
    pub fn in_degree(&self, idx: usize) -> usize {
        self.in_offsets[idx + 1] - self.in_offsets[idx]
    }

    /// Get outgoing neighbors (successors) of a node
    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.out_targets[self.out_offsets[idx]..self.out_offsets[idx + 1]]
    }

    /// Get weights for the outgoing edges of a node, aligned with `successors`
    pub fn successor_weights(&self, idx: usize) -> &[f64] {
        &self.out_weights[self.out_offsets[idx]..self.out_offsets[idx + 1]]
    }

    /// Get incoming neighbors (predecessors) of a node
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.in_sources[self.in_offsets[idx]..self.in_offsets[idx + 1]]
    }

    /// Get weights for the incoming edges of a node, aligned with `predecessors`
    pub fn predecessor_weights(&self, idx: usize) -> &[f64] {
        &self.in_weights[self.in_offsets[idx]..self.in_offsets[idx + 1]]
    }

    /// Total number of directed edges
    pub fn edge_count(&self) -> usize {
        self.out_targets.len()
    }

    /// Neighbors in the undirected projection (successors then predecessors,
    /// duplicates preserved)
    pub fn undirected_neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.successors(idx)
            .iter()
            .chain(self.predecessors(idx).iter())
            .copied()
    }
}
