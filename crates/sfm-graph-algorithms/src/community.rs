//! Community detection algorithms
//!
//! Weakly connected components (union-find) and seeded, modularity-guided
//! label propagation for community partitioning.

use super::common::{GraphView, NodeId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;

/// Result of the WCC algorithm
pub struct WccResult {
    /// Map of component id -> list of NodeIds
    pub components: HashMap<usize, Vec<NodeId>>,
    /// Map of NodeId -> component id
    pub node_component: HashMap<NodeId, usize>,
}

/// Union-Find data structure
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        UnionFind {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]]; // Path halving
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, i: usize, j: usize) {
        let root_i = self.find(i);
        let root_j = self.find(j);
        if root_i != root_j {
            if self.rank[root_i] < self.rank[root_j] {
                self.parent[root_i] = root_j;
            } else if self.rank[root_i] > self.rank[root_j] {
                self.parent[root_j] = root_i;
            } else {
                self.parent[root_j] = root_i;
                self.rank[root_i] += 1;
            }
        }
    }
}

/// Weakly Connected Components (WCC)
///
/// Finds all disjoint subgraphs, ignoring edge direction.
pub fn weakly_connected_components(view: &GraphView) -> WccResult {
    let n = view.node_count;
    let mut uf = UnionFind::new(n);

    for u in 0..n {
        for &v in view.successors(u) {
            uf.union(u, v);
        }
    }

    let mut components: HashMap<usize, Vec<NodeId>> = HashMap::new();
    let mut node_component = HashMap::new();
    for i in 0..n {
        let root = uf.find(i);
        let node_id = view.index_to_node[i];
        components.entry(root).or_default().push(node_id);
        node_component.insert(node_id, root);
    }

    WccResult {
        components,
        node_component,
    }
}

/// A detected community partition
pub struct CommunityResult {
    /// Map of community id -> member NodeIds (ascending)
    pub communities: HashMap<usize, Vec<NodeId>>,
    /// Map of NodeId -> community id
    pub node_community: HashMap<NodeId, usize>,
    /// Modularity of the final partition (undirected projection)
    pub modularity: f64,
}

/// Seeded label propagation with a modularity acceptance check.
///
/// Each pass visits nodes in a seed-shuffled order and moves a node to the
/// label most frequent (by edge weight) among its undirected neighbors, ties
/// broken by the smallest label. The pass result is kept only when it does
/// not decrease partition modularity. Deterministic for a fixed seed;
/// isolated nodes keep their own label and form singleton communities.
pub fn detect_communities(view: &GraphView, seed: u64, max_passes: usize) -> CommunityResult {
    let n = view.node_count;
    if n == 0 {
        return CommunityResult {
            communities: HashMap::new(),
            node_community: HashMap::new(),
            modularity: 0.0,
        };
    }

    let mut labels: Vec<usize> = (0..n).collect();
    let mut best_modularity = modularity(view, &labels);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..n).collect();

    for _ in 0..max_passes {
        order.shuffle(&mut rng);
        let mut candidate = labels.clone();
        let mut changed = false;

        for &u in &order {
            let mut weight_by_label: HashMap<usize, f64> = HashMap::new();
            for (&v, &w) in view
                .successors(u)
                .iter()
                .zip(view.successor_weights(u))
                .chain(view.predecessors(u).iter().zip(view.predecessor_weights(u)))
            {
                *weight_by_label.entry(candidate[v]).or_insert(0.0) += w.max(0.0);
            }
            if weight_by_label.is_empty() {
                continue; // isolated node keeps its singleton label
            }
            // Heaviest label wins, ties broken by smallest label id
            let mut best = candidate[u];
            let mut best_weight = *weight_by_label.get(&best).unwrap_or(&0.0);
            let mut entries: Vec<(usize, f64)> = weight_by_label.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (label, weight) in entries {
                if weight > best_weight + 1e-12 {
                    best = label;
                    best_weight = weight;
                }
            }
            if best != candidate[u] {
                candidate[u] = best;
                changed = true;
            }
        }

        if !changed {
            break;
        }
        let q = modularity(view, &candidate);
        if q + 1e-12 >= best_modularity {
            best_modularity = q;
            labels = candidate;
        } else {
            break;
        }
    }

    let mut communities: HashMap<usize, Vec<NodeId>> = HashMap::new();
    let mut node_community = HashMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        let node_id = view.index_to_node[idx];
        communities.entry(label).or_default().push(node_id);
        node_community.insert(node_id, label);
    }
    for members in communities.values_mut() {
        members.sort_unstable();
    }

    CommunityResult {
        communities,
        node_community,
        modularity: best_modularity,
    }
}

/// Newman modularity of a partition over the undirected weighted projection.
pub fn modularity(view: &GraphView, labels: &[usize]) -> f64 {
    let n = view.node_count;
    let mut total_weight = 0.0; // 2m in undirected terms
    let mut strength = vec![0.0f64; n];

    for u in 0..n {
        for (&v, &w) in view.successors(u).iter().zip(view.successor_weights(u)) {
            let w = w.max(0.0);
            strength[u] += w;
            strength[v] += w;
            total_weight += 2.0 * w;
        }
    }
    if total_weight == 0.0 {
        return 0.0;
    }

    let mut q = 0.0;
    for u in 0..n {
        for (&v, &w) in view.successors(u).iter().zip(view.successor_weights(u)) {
            if labels[u] == labels[v] {
                q += 2.0 * w.max(0.0);
            }
        }
    }
    q /= total_weight;

    let mut expected = 0.0;
    let mut by_label: HashMap<usize, f64> = HashMap::new();
    for u in 0..n {
        *by_label.entry(labels[u]).or_insert(0.0) += strength[u];
    }
    for s in by_label.values() {
        expected += (s / total_weight).powi(2);
    }
    q - expected
}
