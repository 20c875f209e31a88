//! Graph topology analysis
//!
//! Bridge detection on the undirected projection, strongly connected
//! components, and graph density.

use super::common::{GraphView, NodeId};

/// Directed graph density: |E| / (n * (n - 1)), 0 when n < 2.
pub fn density(view: &GraphView) -> f64 {
    let n = view.node_count;
    if n < 2 {
        return 0.0;
    }
    view.edge_count() as f64 / (n * (n - 1)) as f64
}

/// Bridges of the undirected projection, as positions into the view's
/// edge order (the caller's edge list order in [`GraphView::from_edges`]).
///
/// Uses the lowlink bridge algorithm with an explicit stack; parallel edges
/// between the same pair are never bridges because the projection keeps each
/// directed edge as a distinct undirected edge.
pub fn bridges(view: &GraphView) -> Vec<usize> {
    let n = view.node_count;
    if n == 0 {
        return Vec::new();
    }

    // Undirected adjacency: (neighbor, global edge position)
    let mut adj: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for u in 0..n {
        let start = view.out_offsets[u];
        for (offset, &v) in view.successors(u).iter().enumerate() {
            let e = start + offset;
            adj[u].push((v, e));
            adj[v].push((u, e));
        }
    }

    let mut disc = vec![usize::MAX; n];
    let mut low = vec![usize::MAX; n];
    let mut timer = 0usize;
    let mut result = Vec::new();

    // Explicit DFS stack: (node, incoming edge id, next adjacency offset)
    let mut stack: Vec<(usize, usize, usize)> = Vec::new();

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        disc[root] = timer;
        low[root] = timer;
        timer += 1;
        stack.push((root, usize::MAX, 0));

        while let Some(&mut (u, in_edge, ref mut next)) = stack.last_mut() {
            if *next < adj[u].len() {
                let (v, e) = adj[u][*next];
                *next += 1;
                if e == in_edge {
                    continue; // don't walk back along the entry edge
                }
                if disc[v] == usize::MAX {
                    disc[v] = timer;
                    low[v] = timer;
                    timer += 1;
                    stack.push((v, e, 0));
                } else {
                    low[u] = low[u].min(disc[v]);
                }
            } else {
                stack.pop();
                if let Some(&mut (parent, _, _)) = stack.last_mut() {
                    low[parent] = low[parent].min(low[u]);
                    if low[u] > disc[parent] {
                        result.push(in_edge);
                    }
                }
            }
        }
    }

    result.sort_unstable();
    result
}

/// Strongly connected components (iterative Tarjan).
///
/// Members of each component are ascending; components are ordered by
/// their smallest member. Singleton components without a self-loop are
/// included, so every node appears exactly once.
pub fn strongly_connected_components(view: &GraphView) -> Vec<Vec<NodeId>> {
    let n = view.node_count;
    let mut index = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut tarjan_stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components: Vec<Vec<NodeId>> = Vec::new();

    // Explicit call stack: (node, next successor offset)
    let mut call: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index[root] != usize::MAX {
            continue;
        }
        index[root] = next_index;
        low[root] = next_index;
        next_index += 1;
        tarjan_stack.push(root);
        on_stack[root] = true;
        call.push((root, 0));

        while let Some(&mut (u, ref mut next)) = call.last_mut() {
            if *next < view.out_degree(u) {
                let v = view.successors(u)[*next];
                *next += 1;
                if index[v] == usize::MAX {
                    index[v] = next_index;
                    low[v] = next_index;
                    next_index += 1;
                    tarjan_stack.push(v);
                    on_stack[v] = true;
                    call.push((v, 0));
                } else if on_stack[v] {
                    low[u] = low[u].min(index[v]);
                }
            } else {
                call.pop();
                if let Some(&mut (parent, _)) = call.last_mut() {
                    low[parent] = low[parent].min(low[u]);
                }
                if low[u] == index[u] {
                    let mut component = Vec::new();
                    loop {
                        let w = tarjan_stack.pop().unwrap_or(u);
                        on_stack[w] = false;
                        component.push(view.index_to_node[w]);
                        if w == u {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }
    }

    components.sort_by_key(|c| c.first().copied().unwrap_or(0));
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_example() {
        // 4 nodes, 6 of 12 possible directed edges -> 0.5
        let view = GraphView::from_edges(
            vec![1, 2, 3, 4],
            &[
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 3, 1.0),
                (3, 4, 1.0),
                (4, 1, 1.0),
                (1, 3, 1.0),
            ],
        );
        assert!((density(&view) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_density_trivial() {
        assert_eq!(density(&GraphView::from_edges(vec![], &[])), 0.0);
        assert_eq!(density(&GraphView::from_edges(vec![1], &[])), 0.0);
    }

    #[test]
    fn test_bridge_between_triangles() {
        // Edge index 6 (3-4) is the only bridge
        let view = GraphView::from_edges(
            vec![1, 2, 3, 4, 5, 6],
            &[
                (1, 2, 1.0),
                (2, 3, 1.0),
                (3, 1, 1.0),
                (4, 5, 1.0),
                (5, 6, 1.0),
                (6, 4, 1.0),
                (3, 4, 1.0),
            ],
        );
        assert_eq!(bridges(&view), vec![6]);
    }

    #[test]
    fn test_parallel_edges_not_bridges() {
        let view = GraphView::from_edges(vec![1, 2], &[(1, 2, 1.0), (2, 1, 1.0)]);
        assert!(bridges(&view).is_empty());
    }

    #[test]
    fn test_chain_all_bridges() {
        let view =
            GraphView::from_edges(vec![1, 2, 3], &[(1, 2, 1.0), (2, 3, 1.0)]);
        assert_eq!(bridges(&view), vec![0, 1]);
    }

    #[test]
    fn test_scc_cycle_and_tail() {
        // 1->2->3->1 cycle, 3->4 tail
        let view = GraphView::from_edges(
            vec![1, 2, 3, 4],
            &[(1, 2, 1.0), (2, 3, 1.0), (3, 1, 1.0), (3, 4, 1.0)],
        );
        let sccs = strongly_connected_components(&view);
        assert_eq!(sccs, vec![vec![1, 2, 3], vec![4]]);
    }

    #[test]
    fn test_scc_two_cycles() {
        let view = GraphView::from_edges(
            vec![1, 2, 3, 4],
            &[(1, 2, 1.0), (2, 1, 1.0), (3, 4, 1.0), (4, 3, 1.0), (2, 3, 1.0)],
        );
        let sccs = strongly_connected_components(&view);
        assert_eq!(sccs, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_scc_acyclic_all_singletons() {
        let view = GraphView::from_edges(vec![1, 2, 3], &[(1, 2, 1.0), (2, 3, 1.0)]);
        let sccs = strongly_connected_components(&view);
        assert_eq!(sccs.len(), 3);
        assert!(sccs.iter().all(|c| c.len() == 1));
    }
}
