//! # SFM Graph
//!
//! In-memory, transactional, analyzable graph store for socio-economic
//! systems modeling.
//!
//! The crate is organized around a central [`graph::GraphStore`] with
//! collaborating subsystems:
//!
//! - [`txn`]: undo-log transactions with commit-time event publication
//! - [`lock`]: FIFO-fair per-entity reader/writer locks
//! - [`cache`]: two-tier caching with synchronous invalidation
//! - [`memory`]: resident-node ceiling enforcement with lazy reload
//! - [`query`]: centrality, impact propagation, flow and structure analysis
//! - [`validator`]: referential integrity scanning and repair
//! - [`snapshot`]: whole-graph persistence (JSON/bincode, optional gzip)
//! - [`taxonomy`]: pluggable domain validation seam
//! - [`service`]: the assembled facade applications use
//!
//! ## Quick start
//!
//! ```
//! use sfm_graph::{GraphConfig, Node, Relationship, SfmService};
//!
//! let svc = SfmService::new(GraphConfig::default());
//! let usda = svc.add_node(Node::new("Actor", "USDA")).unwrap();
//! let farms = svc.add_node(Node::new("Institution", "Family Farms")).unwrap();
//! svc.add_relationship(Relationship::new(usda, farms, "FUNDS").with_weight(0.8)).unwrap();
//!
//! let impact = svc.query().policy_impact(usda, 3).unwrap();
//! assert_eq!(impact.affected.len(), 2);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod lock;
pub mod memory;
pub mod query;
pub mod service;
pub mod snapshot;
pub mod taxonomy;
pub mod txn;
pub mod validator;

pub use cache::{CacheConfig, CacheLayer, DependencySet, InvalidationRule, QueryKey};
pub use config::{ConfigError, GraphConfig};
pub use error::{SfmError, SfmResult};
pub use graph::{
    ChangeEvent, ChangeOp, DimensionalContext, EntityKind, EventBus, GraphError, GraphResult,
    GraphStore, KindTag, Node, NodeId, PropertyMap, PropertyValue, Relationship, RelationshipId,
    TypeTag,
};
pub use lock::{LockError, LockManager};
pub use memory::{CapacityError, EvictionStrategy, MemoryManager};
pub use query::{
    CentralityMetric, ImpactResult, NodeAnalysis, QueryEngine, RiskLevel, VulnerabilityReport,
};
pub use service::{ServiceStats, SfmService};
pub use snapshot::{GraphSnapshot, SnapshotError, SnapshotFormat};
pub use taxonomy::{KindValidator, Taxonomy, TaxonomyError, TypeHandler, TypeHandlerRegistry};
pub use txn::{Transaction, TransactionManager, TxnError};
pub use validator::{IntegrityValidator, RepairReport, Violation};

/// Crate version string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
