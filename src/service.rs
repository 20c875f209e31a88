//! Service facade
//!
//! Wires the store, event bus, cache, lock table, transaction manager,
//! memory manager, taxonomy and query engine together and exposes the
//! operations applications call. Every mutation here is transactional:
//! entity locks are taken first, the change runs inside a transaction,
//! and commit publishes the change events that keep the cache coherent.

use crate::cache::CacheLayer;
use crate::config::GraphConfig;
use crate::error::{SfmError, SfmResult};
use crate::graph::{
    EventBus, GraphError, GraphStore, Node, NodeId, Relationship, RelationshipId, ReloadFn,
    Subscriber, TypeTag,
};
use crate::lock::LockManager;
use crate::memory::{CapacityError, EvictionReport, MemoryManager, MemoryStats};
use crate::query::QueryEngine;
use crate::snapshot::{self, SnapshotFormat};
use crate::taxonomy::Taxonomy;
use crate::txn::{Transaction, TransactionManager, TxnResult};
use crate::validator::{IntegrityValidator, RepairReport, Violation};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Counters for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub node_count: usize,
    pub relationship_count: usize,
    pub evicted_count: usize,
    pub fast_cache_hit_rate: f64,
    pub query_cache_hit_rate: f64,
    pub memory: MemoryStats,
}

/// The assembled graph service
pub struct SfmService {
    config: GraphConfig,
    store: Arc<RwLock<GraphStore>>,
    bus: EventBus,
    cache: Arc<CacheLayer>,
    locks: Arc<LockManager>,
    txns: TransactionManager,
    memory: MemoryManager,
    taxonomy: Taxonomy,
    validator: IntegrityValidator,
    query: QueryEngine,
}

impl SfmService {
    pub fn new(config: GraphConfig) -> Self {
        Self::with_taxonomy(config, Taxonomy::permissive())
    }

    pub fn with_taxonomy(config: GraphConfig, taxonomy: Taxonomy) -> Self {
        Self::assemble(config, taxonomy, GraphStore::new())
    }

    /// Build a service around an existing store, e.g. a loaded snapshot
    fn assemble(config: GraphConfig, taxonomy: Taxonomy, store: GraphStore) -> Self {
        let store = Arc::new(RwLock::new(store));
        let bus = EventBus::new();
        let cache = CacheLayer::new(config.cache_config());
        cache.attach(&bus);
        let locks = Arc::new(LockManager::new(config.lock_timeout()));
        let txns = TransactionManager::new(Arc::clone(&store), bus.clone());
        let memory = MemoryManager::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            bus.clone(),
            config.memory_ceiling,
            config.eviction_strategy,
        );
        let query = QueryEngine::new(Arc::clone(&store), Arc::clone(&cache), config.clone());
        info!(
            ceiling = config.memory_ceiling,
            strategy = ?config.eviction_strategy,
            "graph service assembled"
        );
        SfmService {
            config,
            store,
            bus,
            cache,
            locks,
            txns,
            memory,
            taxonomy,
            validator: IntegrityValidator::new(),
            query,
        }
    }

    /// Load a snapshot file into a fresh service
    pub fn load(
        config: GraphConfig,
        taxonomy: Taxonomy,
        path: impl AsRef<Path>,
        format: SnapshotFormat,
    ) -> SfmResult<Self> {
        let store = snapshot::load_graph(path, format)?;
        Ok(Self::assemble(config, taxonomy, store))
    }

    /// Save the committed graph to a snapshot file
    pub fn save(&self, path: impl AsRef<Path>, format: SnapshotFormat) -> SfmResult<()> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        snapshot::save_graph(&store, path, format)?;
        Ok(())
    }

    /// Register the reload callback for evicted nodes
    pub fn set_reload(&self, reload: ReloadFn) {
        self.store
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .set_reload(reload);
    }

    /// Register an observer for committed change events (audit hooks)
    pub fn subscribe(&self, subscriber: Subscriber) {
        self.bus.subscribe(subscriber);
    }

    // ============================================================
    // Node operations
    // ============================================================

    /// Insert one node in its own transaction
    pub fn add_node(&self, mut node: Node) -> SfmResult<NodeId> {
        self.taxonomy.apply_defaults(&mut node);
        self.taxonomy.check_node(&node)?;

        let _guard = self.locks.acquire_write(node.id)?;
        let mut txn = self.txns.begin()?;
        let id = txn.add_node(node)?;
        txn.commit()?;
        Ok(id)
    }

    /// Insert many nodes atomically: either all land or none do
    pub fn bulk_add_nodes(&self, mut nodes: Vec<Node>) -> SfmResult<Vec<NodeId>> {
        for node in &mut nodes {
            self.taxonomy.apply_defaults(node);
            self.taxonomy.check_node(node)?;
        }
        let ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        let _guards = self.locks.acquire_many(&ids)?;

        let mut txn = self.txns.begin()?;
        for node in nodes {
            // Any failure drops the transaction, rolling back prior inserts
            txn.add_node(node)?;
        }
        txn.commit()?;
        Ok(ids)
    }

    /// Fetch a node by id, reloading it when evicted
    pub fn get_node(&self, id: NodeId) -> Option<Node> {
        {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            if let Some(node) = store.get_node(id) {
                return Some(node.clone());
            }
            if !store.is_evicted(id) {
                return None;
            }
        }
        // Evicted: upgrade to a write lock and pull it back in
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.reload_node(id).cloned()
    }

    /// Apply a closure to a node under its write lock, transactionally
    pub fn update_node<F>(&self, id: NodeId, mutate: F) -> SfmResult<()>
    where
        F: FnOnce(&mut Node),
    {
        let _guard = self.locks.acquire_write(id)?;
        let mut txn = self.txns.begin()?;
        txn.mutate_node(id, mutate)?;
        txn.commit()?;
        Ok(())
    }

    /// Remove a node. Without `cascade` the call fails while relationships
    /// are attached; with it, the relationships are removed in the same
    /// transaction.
    pub fn remove_node(&self, id: NodeId, cascade: bool) -> SfmResult<Node> {
        let touching: Vec<Relationship> = {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            if !store.node_exists(id) {
                return Err(GraphError::NodeNotFound(id).into());
            }
            store.get_relationships(id).into_iter().cloned().collect()
        };
        if !cascade && !touching.is_empty() {
            return Err(GraphError::AttachedRelationships {
                node: id,
                count: touching.len(),
            }
            .into());
        }

        let mut to_lock: Vec<NodeId> = vec![id];
        for rel in &touching {
            to_lock.push(rel.source_id);
            to_lock.push(rel.target_id);
        }
        let _guards = self.locks.acquire_many(&to_lock)?;

        let mut txn = self.txns.begin()?;
        for rel in &touching {
            txn.remove_relationship(rel.id)?;
        }
        let node = txn.remove_node(id)?;
        txn.commit()?;
        Ok(node)
    }

    /// Resident nodes of a type, in insertion order
    pub fn nodes_of_type(&self, tag: &TypeTag) -> Vec<Node> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.nodes_of_type(tag).into_iter().cloned().collect()
    }

    // ============================================================
    // Relationship operations
    // ============================================================

    /// Insert one relationship, validating its kind against the taxonomy
    pub fn add_relationship(&self, rel: Relationship) -> SfmResult<RelationshipId> {
        let source_type = self.node_type(rel.source_id)?;
        let target_type = self.node_type(rel.target_id)?;
        self.taxonomy
            .check_kind(&source_type, &rel.kind, &target_type)?;

        let _guards = self.locks.acquire_many(&[rel.source_id, rel.target_id])?;
        let mut txn = self.txns.begin()?;
        let id = txn.add_relationship(rel)?;
        txn.commit()?;
        Ok(id)
    }

    pub fn remove_relationship(&self, id: RelationshipId) -> SfmResult<Relationship> {
        let (source, target) = {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            let rel = store
                .get_relationship(id)
                .ok_or(GraphError::RelationshipNotFound(id))?;
            (rel.source_id, rel.target_id)
        };
        let _guards = self.locks.acquire_many(&[source, target])?;
        let mut txn = self.txns.begin()?;
        let rel = txn.remove_relationship(id)?;
        txn.commit()?;
        Ok(rel)
    }

    /// All relationships touching a node
    pub fn get_relationships(&self, node: NodeId) -> Vec<Relationship> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.get_relationships(node).into_iter().cloned().collect()
    }

    fn node_type(&self, id: NodeId) -> SfmResult<TypeTag> {
        self.get_node(id)
            .map(|n| n.type_tag)
            .ok_or_else(|| SfmError::Graph(GraphError::NodeNotFound(id)))
    }

    // ============================================================
    // Multi-operation transactions
    // ============================================================

    /// Begin a multi-operation transaction. The caller is responsible for
    /// taking entity locks via [`SfmService::locks`] when concurrent
    /// writers are possible.
    pub fn transaction(&self) -> TxnResult<Transaction<'_>> {
        self.txns.begin()
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    // ============================================================
    // Maintenance and analytics
    // ============================================================

    pub fn query(&self) -> &QueryEngine {
        &self.query
    }

    /// Scan for integrity violations
    pub fn validate(&self) -> Vec<Violation> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        self.validator.validate(&store)
    }

    /// Remove orphaned relationships and dangling references
    pub fn repair(&self) -> RepairReport {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        self.validator.repair(&mut store)
    }

    /// Run one memory enforcement pass
    pub fn enforce_memory(&self) -> Result<EvictionReport, CapacityError> {
        self.memory.enforce()
    }

    pub fn stats(&self) -> ServiceStats {
        let (node_count, relationship_count, evicted_count) = {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            (
                store.node_count(),
                store.relationship_count(),
                store.evicted_count(),
            )
        };
        ServiceStats {
            node_count,
            relationship_count,
            evicted_count,
            fast_cache_hit_rate: self.cache.stats().fast_hit_rate(),
            query_cache_hit_rate: self.cache.stats().query_hit_rate(),
            memory: self.memory.stats(),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl std::fmt::Debug for SfmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SfmService")
            .field("config", &self.config)
            .finish()
    }
}
