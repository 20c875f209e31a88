//! Flow network analysis
//!
//! Bottleneck pricing (shortest-path degradation when an edge is removed)
//! and highest-cumulative-weight simple path discovery.

use super::common::{GraphView, NodeId};
use super::pathfinding::{dijkstra, dijkstra_with_skip};
use std::collections::HashMap;

/// An edge whose removal degrades connectivity between monitored pairs.
#[derive(Debug, Clone)]
pub struct Bottleneck {
    /// Position of the edge in the view's edge order
    pub edge_position: usize,
    pub source: NodeId,
    pub target: NodeId,
    /// Total shortest-path cost increase across all pairs caused by removal.
    /// Infinite when removal disconnects a previously connected pair.
    pub cost_increase: f64,
}

/// Rank edges by how much their removal increases shortest-path cost between
/// the given source/sink pairs. Only edges lying on some baseline shortest
/// path are candidates. Returns up to `top_k` bottlenecks, worst first, ties
/// broken by ascending edge position.
pub fn bottleneck_edges(
    view: &GraphView,
    pairs: &[(NodeId, NodeId)],
    top_k: usize,
) -> Vec<Bottleneck> {
    if view.node_count == 0 || pairs.is_empty() || top_k == 0 {
        return Vec::new();
    }

    // Baseline costs and candidate edges from the baseline shortest paths
    let mut baselines: Vec<Option<f64>> = Vec::with_capacity(pairs.len());
    let mut candidates: HashMap<(usize, usize), usize> = HashMap::new(); // (u_idx, pos) -> edge position
    for &(s, t) in pairs {
        match dijkstra(view, s, t) {
            Some(result) => {
                baselines.push(Some(result.cost));
                for window in result.path.windows(2) {
                    let u = view.node_to_index[&window[0]];
                    let v = view.node_to_index[&window[1]];
                    // First matching successor slot identifies the edge
                    for (pos, &succ) in view.successors(u).iter().enumerate() {
                        if succ == v {
                            candidates.insert((u, pos), view.out_offsets[u] + pos);
                            break;
                        }
                    }
                }
            }
            None => baselines.push(None),
        }
    }

    let mut scored: Vec<Bottleneck> = Vec::new();
    for (&(u, pos), &edge_position) in &candidates {
        let mut total_increase = 0.0f64;
        for (pair_idx, &(s, t)) in pairs.iter().enumerate() {
            let Some(baseline) = baselines[pair_idx] else {
                continue;
            };
            match dijkstra_with_skip(view, s, t, Some((u, pos))) {
                Some(result) => total_increase += (result.cost - baseline).max(0.0),
                None => total_increase = f64::INFINITY,
            }
            if total_increase.is_infinite() {
                break;
            }
        }
        if total_increase > 0.0 {
            scored.push(Bottleneck {
                edge_position,
                source: view.index_to_node[u],
                target: view.index_to_node[view.successors(u)[pos]],
                cost_increase: total_increase,
            });
        }
    }

    scored.sort_by(|a, b| {
        b.cost_increase
            .partial_cmp(&a.cost_increase)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.edge_position.cmp(&b.edge_position))
    });
    scored.truncate(top_k);
    scored
}

/// A simple path with its cumulative edge weight.
#[derive(Debug, Clone)]
pub struct WeightedPath {
    pub nodes: Vec<NodeId>,
    pub total_weight: f64,
}

/// Result of pathway enumeration; `truncated` is set when the visit cap
/// stopped the search early.
pub struct PathwayResult {
    pub paths: Vec<WeightedPath>,
    pub truncated: bool,
}

/// Enumerate simple paths by DFS and keep the `top_k` with the highest
/// cumulative weight. `max_depth` bounds path length in edges and
/// `visit_cap` bounds total DFS steps on pathological graphs.
pub fn major_pathways(
    view: &GraphView,
    top_k: usize,
    max_depth: usize,
    visit_cap: usize,
) -> PathwayResult {
    let n = view.node_count;
    let mut paths: Vec<WeightedPath> = Vec::new();
    let mut truncated = false;
    let mut steps = 0usize;

    let mut on_path = vec![false; n];
    for start in 0..n {
        if steps >= visit_cap {
            truncated = true;
            break;
        }
        let mut current = vec![start];
        on_path[start] = true;
        dfs_paths(
            view,
            &mut current,
            &mut on_path,
            0.0,
            max_depth,
            visit_cap,
            &mut steps,
            &mut paths,
            &mut truncated,
        );
        on_path[start] = false;
    }

    paths.sort_by(|a, b| {
        b.total_weight
            .partial_cmp(&a.total_weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.nodes.cmp(&b.nodes))
    });
    paths.truncate(top_k);
    PathwayResult { paths, truncated }
}

#[allow(clippy::too_many_arguments)]
fn dfs_paths(
    view: &GraphView,
    current: &mut Vec<usize>,
    on_path: &mut [bool],
    weight: f64,
    max_depth: usize,
    visit_cap: usize,
    steps: &mut usize,
    paths: &mut Vec<WeightedPath>,
    truncated: &mut bool,
) {
    *steps += 1;
    if *steps >= visit_cap {
        *truncated = true;
        return;
    }
    if current.len() > max_depth {
        return;
    }

    let u = *current.last().unwrap_or(&0);
    let successors = view.successors(u);
    let weights = view.successor_weights(u);
    for (&v, &w) in successors.iter().zip(weights) {
        if on_path[v] {
            continue;
        }
        let next_weight = weight + w.max(0.0);
        current.push(v);
        on_path[v] = true;
        if current.len() >= 2 {
            paths.push(WeightedPath {
                nodes: current.iter().map(|&i| view.index_to_node[i]).collect(),
                total_weight: next_weight,
            });
        }
        dfs_paths(
            view, current, on_path, next_weight, max_depth, visit_cap, steps, paths, truncated,
        );
        on_path[v] = false;
        current.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottleneck_single_chain() {
        // 1->2->3 with alternative 1->3 at high cost
        let view = GraphView::from_edges(
            vec![1, 2, 3],
            &[(1, 2, 1.0), (2, 3, 1.0), (1, 3, 10.0)],
        );
        let result = bottleneck_edges(&view, &[(1, 3)], 5);
        assert!(!result.is_empty());
        // Removing either chain edge forces the cost-10 detour (+8)
        assert!((result[0].cost_increase - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_bottleneck_disconnection_is_infinite() {
        let view = GraphView::from_edges(vec![1, 2], &[(1, 2, 1.0)]);
        let result = bottleneck_edges(&view, &[(1, 2)], 5);
        assert_eq!(result.len(), 1);
        assert!(result[0].cost_increase.is_infinite());
    }

    #[test]
    fn test_bottleneck_empty_inputs() {
        let view = GraphView::from_edges(vec![1, 2], &[(1, 2, 1.0)]);
        assert!(bottleneck_edges(&view, &[], 5).is_empty());
        assert!(bottleneck_edges(&view, &[(1, 2)], 0).is_empty());
    }

    #[test]
    fn test_major_pathways_prefers_heavy_path() {
        // 1->2->3 heavy, 1->3 light
        let view = GraphView::from_edges(
            vec![1, 2, 3],
            &[(1, 2, 5.0), (2, 3, 5.0), (1, 3, 1.0)],
        );
        let result = major_pathways(&view, 1, 10, 10_000);
        assert!(!result.truncated);
        assert_eq!(result.paths[0].nodes, vec![1, 2, 3]);
        assert!((result.paths[0].total_weight - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_major_pathways_terminates_on_cycle() {
        let view = GraphView::from_edges(
            vec![1, 2, 3],
            &[(1, 2, 1.0), (2, 3, 1.0), (3, 1, 1.0)],
        );
        let result = major_pathways(&view, 3, 10, 10_000);
        // Simple paths only, no infinite loops around the cycle
        assert!(result
            .paths
            .iter()
            .all(|p| p.nodes.len() <= 3));
    }
}
