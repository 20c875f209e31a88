//! Pathfinding algorithms
//!
//! BFS (unweighted) and Dijkstra (weighted) shortest paths.

use super::common::{GraphView, NodeId};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

/// Result of a pathfinding algorithm
#[derive(Debug, Clone)]
pub struct PathResult {
    pub source: NodeId,
    pub target: NodeId,
    pub path: Vec<NodeId>,
    pub cost: f64,
}

/// Breadth-First Search (unweighted shortest path)
pub fn bfs(view: &GraphView, source: NodeId, target: NodeId) -> Option<PathResult> {
    let source_idx = *view.node_to_index.get(&source)?;
    let target_idx = *view.node_to_index.get(&target)?;

    let mut queue = VecDeque::new();
    let mut visited: HashMap<usize, Option<usize>> = HashMap::new(); // index -> parent

    queue.push_back(source_idx);
    visited.insert(source_idx, None);

    while let Some(current) = queue.pop_front() {
        if current == target_idx {
            let path = reconstruct(view, &visited, target_idx);
            return Some(PathResult {
                source,
                target,
                cost: (path.len().saturating_sub(1)) as f64,
                path,
            });
        }
        for &next in view.successors(current) {
            visited.entry(next).or_insert_with(|| {
                queue.push_back(next);
                Some(current)
            });
        }
    }
    None
}

fn reconstruct(
    view: &GraphView,
    visited: &HashMap<usize, Option<usize>>,
    target_idx: usize,
) -> Vec<NodeId> {
    let mut path = Vec::new();
    let mut curr = Some(target_idx);
    while let Some(idx) = curr {
        path.push(view.index_to_node[idx]);
        curr = visited.get(&idx).copied().flatten();
    }
    path.reverse();
    path
}

/// State for Dijkstra priority queue
#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f64,
    node_idx: usize,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare costs reversed for min-heap
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra's algorithm (weighted shortest path).
///
/// Edge weights act as traversal costs; negative-weight edges are skipped.
pub fn dijkstra(view: &GraphView, source: NodeId, target: NodeId) -> Option<PathResult> {
    dijkstra_with_skip(view, source, target, None)
}

/// Dijkstra with a single directed edge excluded, identified by its
/// (source index, position within the source's successor row). Used by
/// bottleneck analysis to price the removal of one edge.
pub fn dijkstra_with_skip(
    view: &GraphView,
    source: NodeId,
    target: NodeId,
    skip_edge: Option<(usize, usize)>,
) -> Option<PathResult> {
    let source_idx = *view.node_to_index.get(&source)?;
    let target_idx = *view.node_to_index.get(&target)?;

    let mut dist: HashMap<usize, f64> = HashMap::new();
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(source_idx, 0.0);
    heap.push(State {
        cost: 0.0,
        node_idx: source_idx,
    });

    while let Some(State { cost, node_idx }) = heap.pop() {
        if node_idx == target_idx {
            let mut path = vec![view.index_to_node[target_idx]];
            let mut curr = target_idx;
            while let Some(&p) = parent.get(&curr) {
                path.push(view.index_to_node[p]);
                curr = p;
            }
            path.reverse();
            return Some(PathResult {
                source,
                target,
                path,
                cost,
            });
        }

        if cost > *dist.get(&node_idx).unwrap_or(&f64::INFINITY) {
            continue;
        }

        let successors = view.successors(node_idx);
        let weights = view.successor_weights(node_idx);
        for (pos, (&next_idx, &weight)) in successors.iter().zip(weights).enumerate() {
            if skip_edge == Some((node_idx, pos)) {
                continue;
            }
            if weight < 0.0 {
                continue;
            }
            let next_cost = cost + weight;
            if next_cost < *dist.get(&next_idx).unwrap_or(&f64::INFINITY) {
                dist.insert(next_idx, next_cost);
                parent.insert(next_idx, node_idx);
                heap.push(State {
                    cost: next_cost,
                    node_idx: next_idx,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfs() {
        let view = GraphView::from_edges(vec![1, 2, 3], &[(1, 2, 1.0), (2, 3, 1.0)]);
        let result = bfs(&view, 1, 3).unwrap();
        assert_eq!(result.path, vec![1, 2, 3]);
        assert_eq!(result.cost, 2.0);
    }

    #[test]
    fn test_bfs_no_path() {
        let view = GraphView::from_edges(vec![1, 2, 3], &[(1, 2, 1.0)]);
        assert!(bfs(&view, 2, 1).is_none());
        assert!(bfs(&view, 1, 3).is_none());
    }

    #[test]
    fn test_dijkstra_prefers_cheap_detour() {
        // 1->2 (10), 2->3 (5), 1->3 (50)
        let view = GraphView::from_edges(
            vec![1, 2, 3],
            &[(1, 2, 10.0), (2, 3, 5.0), (1, 3, 50.0)],
        );
        let result = dijkstra(&view, 1, 3).unwrap();
        assert_eq!(result.path, vec![1, 2, 3]);
        assert_eq!(result.cost, 15.0);
    }

    #[test]
    fn test_dijkstra_with_skip_forces_alternative() {
        let view = GraphView::from_edges(
            vec![1, 2, 3],
            &[(1, 2, 10.0), (2, 3, 5.0), (1, 3, 50.0)],
        );
        // Skip 1->2 (source row 0, position 0); only the direct edge remains
        let u = view.node_to_index[&1];
        let result = dijkstra_with_skip(&view, 1, 3, Some((u, 0))).unwrap();
        assert_eq!(result.path, vec![1, 3]);
        assert_eq!(result.cost, 50.0);
    }
}
