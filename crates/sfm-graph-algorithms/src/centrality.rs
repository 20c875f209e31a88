//! Node centrality algorithms
//!
//! Degree, closeness, betweenness (Brandes) and eigenvector (power iteration)
//! centrality over a [`GraphView`].

use super::common::{GraphView, NodeId};
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};

/// Degree centrality: (in + out degree) / (n - 1)
pub fn degree_centrality(view: &GraphView) -> HashMap<NodeId, f64> {
    let n = view.node_count;
    if n == 0 {
        return HashMap::new();
    }
    let norm = if n > 1 { (n - 1) as f64 } else { 1.0 };

    let mut result = HashMap::with_capacity(n);
    for idx in 0..n {
        let degree = view.out_degree(idx) + view.in_degree(idx);
        result.insert(view.index_to_node[idx], degree as f64 / norm);
    }
    result
}

/// Closeness centrality with the Wasserman-Faust correction for
/// disconnected graphs: ((r - 1) / sum_dist) * ((r - 1) / (n - 1))
/// where r is the number of nodes reachable from the node (inclusive).
pub fn closeness_centrality(view: &GraphView) -> HashMap<NodeId, f64> {
    let n = view.node_count;
    if n == 0 {
        return HashMap::new();
    }

    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|source| {
            let dist = bfs_distances(view, source);
            let mut reachable = 0usize;
            let mut total = 0u64;
            for d in dist.iter().flatten() {
                reachable += 1;
                total += *d as u64;
            }
            // reachable includes the source at distance 0
            if reachable <= 1 || total == 0 {
                return 0.0;
            }
            let r = (reachable - 1) as f64;
            (r / total as f64) * (r / (n - 1) as f64)
        })
        .collect();

    let mut result = HashMap::with_capacity(n);
    for (idx, score) in scores.into_iter().enumerate() {
        result.insert(view.index_to_node[idx], score);
    }
    result
}

fn bfs_distances(view: &GraphView, source: usize) -> Vec<Option<u32>> {
    let mut dist = vec![None; view.node_count];
    dist[source] = Some(0);
    let mut queue = VecDeque::new();
    queue.push_back(source);
    while let Some(u) = queue.pop_front() {
        let du = dist[u].unwrap_or(0);
        for &v in view.successors(u) {
            if dist[v].is_none() {
                dist[v] = Some(du + 1);
                queue.push_back(v);
            }
        }
    }
    dist
}

/// Betweenness centrality (Brandes' algorithm), directed, unweighted hops.
///
/// Sources are processed in parallel and partial dependency vectors summed.
/// Scores are normalized by (n-1)(n-2) for directed graphs.
pub fn betweenness_centrality(view: &GraphView) -> HashMap<NodeId, f64> {
    let n = view.node_count;
    if n == 0 {
        return HashMap::new();
    }

    let totals = (0..n)
        .into_par_iter()
        .map(|source| brandes_single_source(view, source))
        .reduce(
            || vec![0.0; n],
            |mut acc, partial| {
                for (a, p) in acc.iter_mut().zip(partial) {
                    *a += p;
                }
                acc
            },
        );

    let norm = if n > 2 {
        ((n - 1) * (n - 2)) as f64
    } else {
        1.0
    };

    let mut result = HashMap::with_capacity(n);
    for (idx, total) in totals.into_iter().enumerate() {
        result.insert(view.index_to_node[idx], total / norm);
    }
    result
}

fn brandes_single_source(view: &GraphView, source: usize) -> Vec<f64> {
    let n = view.node_count;
    let mut stack = Vec::new();
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist: Vec<i64> = vec![-1; n];
    let mut delta = vec![0.0f64; n];

    sigma[source] = 1.0;
    dist[source] = 0;

    let mut queue = VecDeque::new();
    queue.push_back(source);
    while let Some(u) = queue.pop_front() {
        stack.push(u);
        for &v in view.successors(u) {
            if dist[v] < 0 {
                dist[v] = dist[u] + 1;
                queue.push_back(v);
            }
            if dist[v] == dist[u] + 1 {
                sigma[v] += sigma[u];
                preds[v].push(u);
            }
        }
    }

    // Accumulate dependencies in reverse BFS order
    let mut partial = vec![0.0f64; n];
    while let Some(w) = stack.pop() {
        for &u in &preds[w] {
            delta[u] += (sigma[u] / sigma[w]) * (1.0 + delta[w]);
        }
        if w != source {
            partial[w] += delta[w];
        }
    }
    partial
}

/// Eigenvector centrality configuration
pub struct EigenvectorConfig {
    /// Maximum number of power iterations
    pub max_iterations: usize,
    /// L1 convergence tolerance
    pub tolerance: f64,
}

impl Default for EigenvectorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
        }
    }
}

/// Eigenvector centrality via power iteration on the weighted adjacency
/// matrix: a node's score is proportional to the sum of the scores of the
/// nodes pointing at it. Returns an empty map when the iteration fails to
/// produce a usable vector (e.g. no edges at all).
pub fn eigenvector_centrality(
    view: &GraphView,
    config: EigenvectorConfig,
) -> HashMap<NodeId, f64> {
    let n = view.node_count;
    if n == 0 {
        return HashMap::new();
    }

    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0f64; n];

    for _ in 0..config.max_iterations {
        for (v, slot) in next.iter_mut().enumerate() {
            let mut sum = 0.0;
            let preds = view.predecessors(v);
            let weights = view.predecessor_weights(v);
            for (&u, &w) in preds.iter().zip(weights) {
                sum += scores[u] * w.max(0.0);
            }
            *slot = sum;
        }

        let norm: f64 = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm == 0.0 {
            // Degenerate graph, fall back to uniform scores
            break;
        }
        let mut diff = 0.0;
        for (s, nx) in scores.iter_mut().zip(next.iter()) {
            let scaled = nx / norm;
            diff += (scaled - *s).abs();
            *s = scaled;
        }
        if diff < config.tolerance {
            break;
        }
    }

    let mut result = HashMap::with_capacity(n);
    for (idx, score) in scores.into_iter().enumerate() {
        result.insert(view.index_to_node[idx], score);
    }
    result
}
