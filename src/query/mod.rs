//! Analysis queries over committed graph state
//!
//! Every query works on an immutable dense snapshot of the topology taken
//! under a read lock, so long-running analytics never block writers for
//! longer than the snapshot build. Whole-graph results go through the
//! query cache tier as structure-sensitive entries, so any commit,
//! including one that only creates a node, invalidates them synchronously.

use crate::cache::{CacheLayer, DependencySet, QueryKey};
use crate::config::GraphConfig;
use crate::graph::{GraphStore, KindTag, NodeId, Relationship, RelationshipId, TypeTag};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sfm_graph_algorithms::{self as algorithms, GraphView};
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

fn raw(id: NodeId) -> u128 {
    id.as_u128()
}

fn node_id(raw: u128) -> NodeId {
    NodeId::from(Uuid::from_u128(raw))
}

/// Which centrality measure to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CentralityMetric {
    Degree,
    Closeness,
    Betweenness,
    Eigenvector,
}

impl CentralityMetric {
    fn name(&self) -> &'static str {
        match self {
            CentralityMetric::Degree => "degree",
            CentralityMetric::Closeness => "closeness",
            CentralityMetric::Betweenness => "betweenness",
            CentralityMetric::Eigenvector => "eigenvector",
        }
    }
}

/// One node reached by impact propagation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub node: NodeId,
    /// Fewest hops from the source at which the node was first reached
    pub hops: usize,
    /// Highest product of edge weights over any path within the radius
    pub score: f64,
}

/// Result of hop-bounded impact propagation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    pub source: NodeId,
    pub radius: usize,
    /// Count of reached nodes, the source excluded
    pub affected_count: usize,
    /// Affected nodes, source first (hops 0, score 1), then by descending
    /// score with ties on ascending id
    pub affected: Vec<ImpactEntry>,
    /// Affected ids grouped by their node type tag, members ascending
    pub by_type: BTreeMap<TypeTag, Vec<NodeId>>,
    /// Set when the traversal visit cap stopped expansion early
    pub truncated: bool,
}

/// An edge whose removal degrades shortest paths between monitored pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckEntry {
    pub relationship: RelationshipId,
    pub source: NodeId,
    pub target: NodeId,
    /// Total shortest-path cost increase; `None` when removal disconnects
    /// a previously connected pair
    pub cost_increase: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayEntry {
    pub nodes: Vec<NodeId>,
    pub total_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwaySummary {
    pub paths: Vec<PathwayEntry>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    /// Communities ordered by their smallest member, members ascending
    pub communities: Vec<Vec<NodeId>>,
    pub modularity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub nodes: Vec<NodeId>,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborSummary {
    pub node: NodeId,
    pub outgoing: Vec<(NodeId, RelationshipId)>,
    pub incoming: Vec<(NodeId, RelationshipId)>,
}

/// Per-node centrality bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityBundle {
    pub degree: f64,
    pub closeness: f64,
    pub betweenness: f64,
    pub eigenvector: f64,
}

/// Everything the engine knows about one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAnalysis {
    pub node: NodeId,
    pub label: String,
    pub type_tag: TypeTag,
    pub out_degree: usize,
    pub in_degree: usize,
    /// Outgoing share of total degree, 0 for isolated nodes
    pub influence_ratio: f64,
    /// Incoming share of total degree, 0 for isolated nodes
    pub dependency_ratio: f64,
    pub centrality: CentralityBundle,
    /// Nodes reachable within the default hop radius, excluding the node
    pub reach: usize,
    pub reach_truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

/// Structural fragility summary for the whole system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    pub density: f64,
    pub component_count: usize,
    /// Share of nodes in the largest weakly connected component
    pub largest_component_ratio: f64,
    pub bridge_relationships: Vec<RelationshipId>,
    pub risk: RiskLevel,
}

/// Dense topology snapshot plus the relationship id for every CSR edge
/// slot and the type tag of every node in the view
struct ViewBundle {
    view: GraphView,
    rel_ids: Vec<RelationshipId>,
    types: FxHashMap<u128, TypeTag>,
}

impl ViewBundle {
    fn rel_at(&self, edge_position: usize) -> Option<RelationshipId> {
        self.rel_ids.get(edge_position).copied()
    }
}

/// Read-only analysis engine over the shared store
pub struct QueryEngine {
    store: Arc<RwLock<GraphStore>>,
    cache: Arc<CacheLayer>,
    config: GraphConfig,
}

impl QueryEngine {
    pub fn new(store: Arc<RwLock<GraphStore>>, cache: Arc<CacheLayer>, config: GraphConfig) -> Self {
        QueryEngine {
            store,
            cache,
            config,
        }
    }

    /// Build the dense snapshot, optionally restricted to relationships of
    /// one flow kind. Node index order is ascending id; edge slots follow
    /// CSR row order, which the rel-id mapping replicates.
    fn snapshot(&self, kind: Option<&KindTag>) -> ViewBundle {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        let (tagged_nodes, topology) = store.topology();
        drop(store);

        let mut nodes: Vec<u128> = tagged_nodes.iter().map(|(id, _)| raw(*id)).collect();
        nodes.sort_unstable();
        let types: FxHashMap<u128, TypeTag> = tagged_nodes
            .into_iter()
            .map(|(id, tag)| (raw(id), tag))
            .collect();

        let mut edges: Vec<(u128, u128, f64, RelationshipId)> = topology
            .into_iter()
            .filter(|(_, _, _, _, k)| kind.map_or(true, |wanted| k == wanted))
            .map(|(s, t, w, id, _)| (raw(s), raw(t), w, id))
            .collect();
        edges.sort_unstable_by(|a, b| (a.0, a.3).cmp(&(b.0, b.3)));

        let plain: Vec<(u128, u128, f64)> =
            edges.iter().map(|&(s, t, w, _)| (s, t, w)).collect();
        let view = GraphView::from_edges(nodes, &plain);

        let mut rows: Vec<Vec<RelationshipId>> = vec![Vec::new(); view.node_count];
        for &(s, t, _, id) in &edges {
            if let (Some(&u), Some(_)) = (view.node_to_index.get(&s), view.node_to_index.get(&t)) {
                rows[u].push(id);
            }
        }
        let rel_ids = rows.into_iter().flatten().collect();
        debug!(nodes = view.node_count, edges = view.edge_count(), "topology snapshot built");
        ViewBundle {
            view,
            rel_ids,
            types,
        }
    }

    // ============================================================
    // Centrality
    // ============================================================

    /// All nodes ranked by the metric, descending, ties by ascending id
    pub fn centrality(&self, metric: CentralityMetric) -> Vec<(NodeId, f64)> {
        let key = QueryKey::new(format!("centrality:{}", metric.name()), "");
        self.cache.get_or_compute(key, || {
            let bundle = self.snapshot(None);
            let scores = Self::centrality_raw(&bundle.view, metric);
            let mut ranked: Vec<(NodeId, f64)> = scores
                .into_iter()
                .map(|(id, score)| (node_id(id), score))
                .collect();
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            (ranked, DependencySet::WholeGraph)
        })
    }

    fn centrality_raw(
        view: &GraphView,
        metric: CentralityMetric,
    ) -> std::collections::HashMap<u128, f64> {
        match metric {
            CentralityMetric::Degree => algorithms::degree_centrality(view),
            CentralityMetric::Closeness => algorithms::closeness_centrality(view),
            CentralityMetric::Betweenness => algorithms::betweenness_centrality(view),
            CentralityMetric::Eigenvector => {
                algorithms::eigenvector_centrality(view, algorithms::EigenvectorConfig::default())
            }
        }
    }

    /// One node's score under the metric
    pub fn node_centrality(&self, metric: CentralityMetric, node: NodeId) -> Option<f64> {
        self.centrality(metric)
            .into_iter()
            .find(|(id, _)| *id == node)
            .map(|(_, score)| score)
    }

    /// The `k` highest-ranked nodes
    pub fn top_central(&self, metric: CentralityMetric, k: usize) -> Vec<(NodeId, f64)> {
        let mut ranked = self.centrality(metric);
        ranked.truncate(k);
        ranked
    }

    // ============================================================
    // Impact propagation
    // ============================================================

    /// Hop-bounded impact propagation from `source`. The score of a
    /// reached node is the maximum over paths of the product of edge
    /// weights; hop counts record the first hop level that reached it.
    pub fn policy_impact(&self, source: NodeId, max_hops: usize) -> Option<ImpactResult> {
        let bundle = self.snapshot(None);
        let view = &bundle.view;
        let source_idx = *view.node_to_index.get(&raw(source))?;

        // (first hop reached, best walk-product score)
        let mut best: FxHashMap<usize, (usize, f64)> = FxHashMap::default();
        let mut frontier: FxHashMap<usize, f64> = FxHashMap::default();
        frontier.insert(source_idx, 1.0);

        let mut budget = self.config.traversal_visit_cap;
        let mut truncated = false;

        'hops: for hop in 1..=max_hops {
            let mut next: FxHashMap<usize, f64> = FxHashMap::default();
            for (&u, &score) in &frontier {
                let successors = view.successors(u);
                let weights = view.successor_weights(u);
                for (&v, &w) in successors.iter().zip(weights) {
                    if v == source_idx {
                        continue;
                    }
                    let candidate = score * w;
                    if let Some(slot) = next.get_mut(&v) {
                        *slot = slot.max(candidate);
                        continue;
                    }
                    // The cap charges for first visits only; re-reaching a
                    // node just relaxes its score
                    if !best.contains_key(&v) {
                        if budget == 0 {
                            truncated = true;
                            break 'hops;
                        }
                        budget -= 1;
                    }
                    next.insert(v, candidate);
                }
            }
            if next.is_empty() {
                break;
            }
            for (&v, &score) in &next {
                best.entry(v)
                    .and_modify(|(_, s)| *s = s.max(score))
                    .or_insert((hop, score));
            }
            frontier = next;
        }

        let mut affected: Vec<ImpactEntry> = best
            .into_iter()
            .map(|(idx, (hops, score))| ImpactEntry {
                node: node_id(view.index_to_node[idx]),
                hops,
                score,
            })
            .collect();
        affected.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.node.cmp(&b.node))
        });
        // Radius zero still names the source itself
        affected.insert(
            0,
            ImpactEntry {
                node: source,
                hops: 0,
                score: 1.0,
            },
        );

        let by_type = Self::group_by_type(&bundle, affected.iter().map(|e| e.node));
        Some(ImpactResult {
            source,
            radius: max_hops,
            affected_count: affected.len() - 1,
            affected,
            by_type,
            truncated,
        })
    }

    /// Affected nodes grouped by type tag, members ascending per group.
    /// Tags come from the same snapshot as the traversal, so evicted
    /// nodes classify like resident ones.
    fn group_by_type(
        bundle: &ViewBundle,
        ids: impl Iterator<Item = NodeId>,
    ) -> BTreeMap<TypeTag, Vec<NodeId>> {
        let mut groups: BTreeMap<TypeTag, Vec<NodeId>> = BTreeMap::new();
        for id in ids {
            if let Some(tag) = bundle.types.get(&raw(id)) {
                groups.entry(tag.clone()).or_default().push(id);
            }
        }
        for members in groups.values_mut() {
            members.sort_unstable();
        }
        groups
    }

    // ============================================================
    // Flow analysis
    // ============================================================

    /// Rank edges by shortest-path degradation across the monitored pairs.
    /// With a kind, only relationships of that flow kind participate.
    pub fn bottlenecks(
        &self,
        kind: Option<&KindTag>,
        pairs: &[(NodeId, NodeId)],
        top_k: usize,
    ) -> Vec<BottleneckEntry> {
        let bundle = self.snapshot(kind);
        let raw_pairs: Vec<(u128, u128)> =
            pairs.iter().map(|&(s, t)| (raw(s), raw(t))).collect();
        algorithms::bottleneck_edges(&bundle.view, &raw_pairs, top_k)
            .into_iter()
            .filter_map(|b| {
                Some(BottleneckEntry {
                    relationship: bundle.rel_at(b.edge_position)?,
                    source: node_id(b.source),
                    target: node_id(b.target),
                    cost_increase: b.cost_increase.is_finite().then_some(b.cost_increase),
                })
            })
            .collect()
    }

    /// Bottlenecks over pairs drawn from the highest-degree nodes, for
    /// callers with no specific pairs to monitor
    pub fn system_bottlenecks(&self, top_k: usize) -> Vec<BottleneckEntry> {
        let hubs: Vec<NodeId> = self
            .top_central(CentralityMetric::Degree, 8)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let mut pairs = Vec::new();
        for &s in &hubs {
            for &t in &hubs {
                if s != t {
                    pairs.push((s, t));
                }
            }
        }
        self.bottlenecks(None, &pairs, top_k)
    }

    /// The `top_k` simple paths with the highest cumulative weight. With a
    /// kind, paths run through the kind-restricted subgraph only.
    pub fn major_pathways(&self, kind: Option<&KindTag>, top_k: usize) -> PathwaySummary {
        let bundle = self.snapshot(kind);
        let result = algorithms::major_pathways(
            &bundle.view,
            top_k,
            self.config.pathway_max_depth,
            self.config.traversal_visit_cap,
        );
        PathwaySummary {
            paths: result
                .paths
                .into_iter()
                .map(|p| PathwayEntry {
                    nodes: p.nodes.into_iter().map(node_id).collect(),
                    total_weight: p.total_weight,
                })
                .collect(),
            truncated: result.truncated,
        }
    }

    // ============================================================
    // Structure
    // ============================================================

    /// Seeded community partition; the same seed over the same committed
    /// state yields the same partition
    pub fn communities(&self, seed: u64) -> CommunitySummary {
        let key = QueryKey::new("communities", seed.to_string());
        self.cache.get_or_compute(key, || {
            let bundle = self.snapshot(None);
            let result = algorithms::detect_communities(&bundle.view, seed, 10);
            let mut communities: Vec<Vec<NodeId>> = result
                .communities
                .into_values()
                .map(|members| members.into_iter().map(node_id).collect::<Vec<_>>())
                .collect();
            communities.sort_by_key(|c| c.first().copied());
            (
                CommunitySummary {
                    communities,
                    modularity: result.modularity,
                },
                DependencySet::WholeGraph,
            )
        })
    }

    /// Relationships that are bridges of the undirected projection
    pub fn bridges(&self) -> Vec<RelationshipId> {
        let key = QueryKey::new("bridges", "");
        self.cache.get_or_compute(key, || {
            let bundle = self.snapshot(None);
            let ids = algorithms::bridges(&bundle.view)
                .into_iter()
                .filter_map(|pos| bundle.rel_at(pos))
                .collect();
            (ids, DependencySet::WholeGraph)
        })
    }

    /// Directed graph density: |E| / (n * (n - 1)), 0 when n < 2
    pub fn density(&self) -> f64 {
        let key = QueryKey::new("density", "");
        self.cache.get_or_compute(key, || {
            let bundle = self.snapshot(None);
            (algorithms::density(&bundle.view), DependencySet::WholeGraph)
        })
    }

    /// Weighted shortest path between two nodes, optionally restricted to
    /// relationships of one kind
    pub fn shortest_path(
        &self,
        source: NodeId,
        target: NodeId,
        kind: Option<&KindTag>,
    ) -> Option<PathSummary> {
        let bundle = self.snapshot(kind);
        let result = algorithms::dijkstra(&bundle.view, raw(source), raw(target))?;
        Some(PathSummary {
            nodes: result.path.into_iter().map(node_id).collect(),
            cost: result.cost,
        })
    }

    /// Direct neighbors with the connecting relationship ids. Served from
    /// the fast cache tier when warm.
    pub fn node_neighbors(&self, node: NodeId) -> Option<NeighborSummary> {
        let rels: Arc<Vec<Relationship>> = match self.cache.relationships(node) {
            Some(rels) => rels,
            None => {
                let store = self.store.read().unwrap_or_else(|e| e.into_inner());
                if !store.node_exists(node) {
                    return None;
                }
                let fresh: Vec<Relationship> =
                    store.get_relationships(node).into_iter().cloned().collect();
                drop(store);
                self.cache.put_relationships(node, fresh)
            }
        };

        let mut outgoing = Vec::new();
        let mut incoming = Vec::new();
        for rel in rels.iter() {
            if rel.source_id == node {
                outgoing.push((rel.target_id, rel.id));
            }
            if rel.target_id == node {
                incoming.push((rel.source_id, rel.id));
            }
        }
        outgoing.sort();
        incoming.sort();
        Some(NeighborSummary {
            node,
            outgoing,
            incoming,
        })
    }

    /// All nodes within `distance` undirected hops, the node itself
    /// excluded, ascending. `None` when the node is unknown.
    pub fn neighborhood(&self, node: NodeId, distance: usize) -> Option<Vec<NodeId>> {
        let bundle = self.snapshot(None);
        let view = &bundle.view;
        let start = *view.node_to_index.get(&raw(node))?;

        let mut seen = vec![false; view.node_count];
        seen[start] = true;
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut reached = Vec::new();
        while let Some((u, depth)) = queue.pop_front() {
            if depth == distance {
                continue;
            }
            for v in view.undirected_neighbors(u) {
                if !seen[v] {
                    seen[v] = true;
                    reached.push(node_id(view.index_to_node[v]));
                    queue.push_back((v, depth + 1));
                }
            }
        }
        reached.sort_unstable();
        Some(reached)
    }

    /// Node groups that lie on directed cycles: strongly connected
    /// components with more than one member, plus self-loop singletons
    pub fn find_cycles(&self) -> Vec<Vec<NodeId>> {
        let bundle = self.snapshot(None);
        let view = &bundle.view;
        algorithms::strongly_connected_components(view)
            .into_iter()
            .filter(|component| {
                if component.len() > 1 {
                    return true;
                }
                let idx = view.node_to_index[&component[0]];
                view.successors(idx).contains(&idx)
            })
            .map(|component| component.into_iter().map(node_id).collect())
            .collect()
    }

    /// Per-node fragility: the mean of betweenness and total degree, each
    /// normalized against its graph-wide maximum. High scorers are the
    /// nodes whose failure hurts connectivity most.
    pub fn vulnerability_scores(&self) -> Vec<(NodeId, f64)> {
        let key = QueryKey::new("vulnerability_scores", "");
        self.cache.get_or_compute(key, || {
            let bundle = self.snapshot(None);
            let view = &bundle.view;
            let betweenness = algorithms::betweenness_centrality(view);

            let max_between = betweenness.values().cloned().fold(0.0f64, f64::max);
            let max_degree = (0..view.node_count)
                .map(|i| view.out_degree(i) + view.in_degree(i))
                .max()
                .unwrap_or(0);

            let mut scored: Vec<(NodeId, f64)> = (0..view.node_count)
                .map(|i| {
                    let id = view.index_to_node[i];
                    let b = if max_between > 0.0 {
                        betweenness.get(&id).copied().unwrap_or(0.0) / max_between
                    } else {
                        0.0
                    };
                    let d = if max_degree > 0 {
                        (view.out_degree(i) + view.in_degree(i)) as f64 / max_degree as f64
                    } else {
                        0.0
                    };
                    (node_id(id), (b + d) / 2.0)
                })
                .collect();
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            (scored, DependencySet::WholeGraph)
        })
    }

    // ============================================================
    // Composite reports
    // ============================================================

    /// Everything the engine knows about one node, in one call
    pub fn comprehensive_node_analysis(&self, node: NodeId) -> Option<NodeAnalysis> {
        let (label, type_tag) = {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            let found = store.get_node(node)?;
            (found.label.clone(), found.type_tag.clone())
        };

        let bundle = self.snapshot(None);
        let idx = *bundle.view.node_to_index.get(&raw(node))?;
        let centrality = CentralityBundle {
            degree: self.node_centrality(CentralityMetric::Degree, node).unwrap_or(0.0),
            closeness: self
                .node_centrality(CentralityMetric::Closeness, node)
                .unwrap_or(0.0),
            betweenness: self
                .node_centrality(CentralityMetric::Betweenness, node)
                .unwrap_or(0.0),
            eigenvector: self
                .node_centrality(CentralityMetric::Eigenvector, node)
                .unwrap_or(0.0),
        };

        let impact = self.policy_impact(node, self.config.default_max_hops)?;
        let out_degree = bundle.view.out_degree(idx);
        let in_degree = bundle.view.in_degree(idx);
        let total = out_degree + in_degree;
        let (influence_ratio, dependency_ratio) = if total == 0 {
            (0.0, 0.0)
        } else {
            (out_degree as f64 / total as f64, in_degree as f64 / total as f64)
        };
        Some(NodeAnalysis {
            node,
            label,
            type_tag,
            out_degree,
            in_degree,
            influence_ratio,
            dependency_ratio,
            centrality,
            reach: impact.affected_count,
            reach_truncated: impact.truncated,
        })
    }

    /// Structural fragility: density, fragmentation, and bridge exposure
    pub fn system_vulnerability_analysis(&self) -> VulnerabilityReport {
        let bundle = self.snapshot(None);
        let view = &bundle.view;
        let density = algorithms::density(view);
        let wcc = algorithms::weakly_connected_components(view);
        let component_count = wcc.components.len();
        let largest = wcc
            .components
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        let largest_component_ratio = if view.node_count == 0 {
            0.0
        } else {
            largest as f64 / view.node_count as f64
        };
        let bridge_relationships: Vec<RelationshipId> = algorithms::bridges(view)
            .into_iter()
            .filter_map(|pos| bundle.rel_at(pos))
            .collect();

        let edge_count = view.edge_count().max(1);
        let bridge_ratio = bridge_relationships.len() as f64 / edge_count as f64;
        let risk = if largest_component_ratio < 0.5 && component_count > 1 || bridge_ratio > 0.5 {
            RiskLevel::High
        } else if component_count > 1 || !bridge_relationships.is_empty() {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        };

        VulnerabilityReport {
            density,
            component_count,
            largest_component_ratio,
            bridge_relationships,
            risk,
        }
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine").finish()
    }
}
