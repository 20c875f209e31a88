//! Two-tier result caching
//!
//! Fast tier: an LRU of per-node relationship lists, sized in entries.
//! Query tier: analysis results keyed by operation name and parameter
//! string, each carrying the set of node ids it depends on and a TTL.
//!
//! Invalidation is synchronous: the layer subscribes to the change-event
//! bus and drops stale entries inside the commit that staled them, so a
//! read that follows a commit never sees a pre-commit cached value.

use crate::graph::{ChangeEvent, EventBus, NodeId, Relationship};
use lru::LruCache;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

/// How a change event maps to query-tier invalidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
pub enum InvalidationRule {
    /// Drop only entries whose dependent set intersects the affected nodes
    #[default]
    Dependents,
    /// Drop the whole query tier on any change (for global analyses)
    AllOnAnyChange,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Fast-tier capacity in entries
    pub fast_capacity: NonZeroUsize,
    /// Query-tier capacity in entries
    pub query_capacity: usize,
    /// Query-tier entry lifetime
    pub query_ttl: Duration,
    pub rule: InvalidationRule,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            fast_capacity: NonZeroUsize::new(10_000).unwrap(),
            query_capacity: 1_000,
            query_ttl: Duration::from_secs(300),
            rule: InvalidationRule::Dependents,
        }
    }
}

/// Query-tier key: operation name plus canonicalized parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub operation: String,
    pub params: String,
}

impl QueryKey {
    pub fn new(operation: impl Into<String>, params: impl Into<String>) -> Self {
        QueryKey {
            operation: operation.into(),
            params: params.into(),
        }
    }
}

/// What a cached query result depends on
#[derive(Debug, Clone)]
pub enum DependencySet {
    /// Staled when any of the listed nodes changes
    Nodes(FxHashSet<NodeId>),
    /// Structure-sensitive: staled by any committed change, including
    /// creation of nodes that did not exist at compute time
    WholeGraph,
}

impl DependencySet {
    fn staled_by(&self, nodes: &[NodeId]) -> bool {
        match self {
            DependencySet::WholeGraph => true,
            DependencySet::Nodes(set) => nodes.iter().any(|node| set.contains(node)),
        }
    }
}

struct QueryEntry {
    value: serde_json::Value,
    dependents: DependencySet,
    inserted: Instant,
    ttl: Duration,
}

impl QueryEntry {
    fn expired(&self) -> bool {
        self.inserted.elapsed() > self.ttl
    }
}

/// Hit/miss counters, readable without locking the tiers
#[derive(Debug, Default)]
pub struct CacheStats {
    pub fast_hits: AtomicU64,
    pub fast_misses: AtomicU64,
    pub query_hits: AtomicU64,
    pub query_misses: AtomicU64,
    pub invalidations: AtomicU64,
}

impl CacheStats {
    pub fn fast_hit_rate(&self) -> f64 {
        let hits = self.fast_hits.load(Ordering::Relaxed) as f64;
        let misses = self.fast_misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }

    pub fn query_hit_rate(&self) -> f64 {
        let hits = self.query_hits.load(Ordering::Relaxed) as f64;
        let misses = self.query_misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }
}

/// Two-tier cache with event-driven invalidation
pub struct CacheLayer {
    fast: Mutex<LruCache<NodeId, Arc<Vec<Relationship>>>>,
    query: Mutex<FxHashMap<QueryKey, QueryEntry>>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl CacheLayer {
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Arc::new(CacheLayer {
            fast: Mutex::new(LruCache::new(config.fast_capacity)),
            query: Mutex::new(FxHashMap::default()),
            config,
            stats: Arc::new(CacheStats::default()),
        })
    }

    /// Subscribe this layer to the bus so commits invalidate synchronously
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let layer = Arc::clone(self);
        bus.subscribe(Arc::new(move |event| layer.on_change(event)));
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    // ============================================================
    // Fast tier
    // ============================================================

    /// Cached relationship list for a node, or `None` on miss
    pub fn relationships(&self, node: NodeId) -> Option<Arc<Vec<Relationship>>> {
        let mut fast = self.fast.lock().unwrap_or_else(|e| e.into_inner());
        match fast.get(&node) {
            Some(rels) => {
                self.stats.fast_hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(rels))
            }
            None => {
                self.stats.fast_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Populate the fast tier after a store read
    pub fn put_relationships(&self, node: NodeId, rels: Vec<Relationship>) -> Arc<Vec<Relationship>> {
        let rels = Arc::new(rels);
        let mut fast = self.fast.lock().unwrap_or_else(|e| e.into_inner());
        fast.put(node, Arc::clone(&rels));
        rels
    }

    pub fn fast_len(&self) -> usize {
        self.fast.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    // ============================================================
    // Query tier
    // ============================================================

    /// Fetch a cached result or compute it. The compute closure returns the
    /// value together with its [`DependencySet`], which drives invalidation
    /// under [`InvalidationRule::Dependents`]. Entries live for the
    /// configured query TTL.
    pub fn get_or_compute<T, F>(&self, key: QueryKey, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> (T, DependencySet),
    {
        self.get_or_compute_with_ttl(key, self.config.query_ttl, compute)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) but with an explicit
    /// lifetime for this entry
    pub fn get_or_compute_with_ttl<T, F>(&self, key: QueryKey, ttl: Duration, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> (T, DependencySet),
    {
        if let Some(value) = self.lookup_query(&key) {
            if let Ok(decoded) = serde_json::from_value(value) {
                self.stats.query_hits.fetch_add(1, Ordering::Relaxed);
                trace!(operation = %key.operation, "query cache hit");
                return decoded;
            }
        }
        self.stats.query_misses.fetch_add(1, Ordering::Relaxed);

        let (value, dependents) = compute();
        if let Ok(encoded) = serde_json::to_value(&value) {
            self.insert_query(key, encoded, dependents, ttl);
        }
        value
    }

    fn lookup_query(&self, key: &QueryKey) -> Option<serde_json::Value> {
        let mut query = self.query.lock().unwrap_or_else(|e| e.into_inner());
        let entry = query.get(key)?;
        if entry.expired() {
            query.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn insert_query(
        &self,
        key: QueryKey,
        value: serde_json::Value,
        dependents: DependencySet,
        ttl: Duration,
    ) {
        let mut query = self.query.lock().unwrap_or_else(|e| e.into_inner());
        if query.len() >= self.config.query_capacity {
            // Expired entries go first; failing that, the oldest one
            query.retain(|_, entry| !entry.expired());
            if query.len() >= self.config.query_capacity {
                if let Some(oldest) = query
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted)
                    .map(|(k, _)| k.clone())
                {
                    query.remove(&oldest);
                }
            }
        }
        query.insert(
            key,
            QueryEntry {
                value,
                dependents,
                inserted: Instant::now(),
                ttl,
            },
        );
    }

    pub fn query_len(&self) -> usize {
        self.query.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    // ============================================================
    // Invalidation
    // ============================================================

    fn on_change(&self, event: &ChangeEvent) {
        let affected = event.affected_nodes();
        self.invalidate_nodes(&affected);
    }

    /// Drop every entry staled by a change to the given nodes
    pub fn invalidate_nodes(&self, nodes: &[NodeId]) {
        {
            let mut fast = self.fast.lock().unwrap_or_else(|e| e.into_inner());
            for node in nodes {
                if fast.pop(node).is_some() {
                    self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let mut query = self.query.lock().unwrap_or_else(|e| e.into_inner());
        let before = query.len();
        match self.config.rule {
            InvalidationRule::AllOnAnyChange => query.clear(),
            InvalidationRule::Dependents => {
                query.retain(|_, entry| !entry.dependents.staled_by(nodes));
            }
        }
        let dropped = (before - query.len()) as u64;
        if dropped > 0 {
            self.stats.invalidations.fetch_add(dropped, Ordering::Relaxed);
        }
    }

    /// Drop everything in both tiers
    pub fn clear(&self) {
        self.fast.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.query.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("fast_len", &self.fast_len())
            .field("query_len", &self.query_len())
            .finish()
    }
}
