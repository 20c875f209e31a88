//! Graph algorithms for the SFM graph store
//!
//! Pure-topology algorithms over a dense, read-only [`GraphView`]:
//! centrality (degree, betweenness, closeness, eigenvector), pathfinding
//! (BFS, Dijkstra), community detection, bridge/density analysis, and
//! flow pathway/bottleneck analysis.

pub mod centrality;
pub mod common;
pub mod community;
pub mod flow;
pub mod pathfinding;
pub mod topology;

pub use centrality::{
    betweenness_centrality, closeness_centrality, degree_centrality, eigenvector_centrality,
    EigenvectorConfig,
};
pub use common::{GraphView, NodeId};
pub use community::{
    detect_communities, modularity, weakly_connected_components, CommunityResult, WccResult,
};
pub use flow::{bottleneck_edges, major_pathways, Bottleneck, PathwayResult, WeightedPath};
pub use pathfinding::{bfs, dijkstra, dijkstra_with_skip, PathResult};
pub use topology::{bridges, density, strongly_connected_components};
