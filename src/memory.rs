//! Resident-node ceiling enforcement
//!
//! The manager keeps the number of resident nodes at or below a configured
//! ceiling by evicting cold nodes to the reload callback. A node is never
//! evicted while any transaction holds its lock, and eviction is refused
//! outright when no reload callback exists, because the evicted state
//! would be unrecoverable.

use crate::graph::{AccessRecord, ChangeEvent, EventBus, GraphStore, NodeId};
use crate::lock::LockManager;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CapacityError {
    #[error("{resident} resident nodes exceed ceiling {ceiling} and no reload callback is configured")]
    NoReload { resident: usize, ceiling: usize },

    #[error("ceiling {ceiling} not met: {resident} still resident, {locked} candidates lock-pinned")]
    CeilingNotMet {
        ceiling: usize,
        resident: usize,
        locked: usize,
    },
}

/// Which nodes go first when over the ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum EvictionStrategy {
    /// Least recently read first
    #[default]
    Lru,
    /// Least often read first, ties broken by recency
    Lfu,
    /// Earliest inserted first
    OldestFirst,
}

impl EvictionStrategy {
    /// Sort key; lower evicts earlier
    fn key(&self, record: &AccessRecord) -> (u64, u64) {
        match self {
            EvictionStrategy::Lru => (record.last_access, 0),
            EvictionStrategy::Lfu => (record.access_count, record.last_access),
            EvictionStrategy::OldestFirst => (record.inserted_at, 0),
        }
    }
}

/// What an enforcement pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<NodeId>,
    pub resident_after: usize,
}

/// Memory statistics snapshot
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryStats {
    pub resident: usize,
    pub evicted: usize,
    pub ceiling: usize,
    pub utilization: f64,
    /// Enforcement passes run so far
    pub passes: u64,
    /// Nodes evicted across all passes
    pub total_evicted: u64,
}

pub struct MemoryManager {
    store: Arc<RwLock<GraphStore>>,
    locks: Arc<LockManager>,
    bus: EventBus,
    ceiling: usize,
    strategy: EvictionStrategy,
    passes: AtomicU64,
    total_evicted: AtomicU64,
}

impl MemoryManager {
    pub fn new(
        store: Arc<RwLock<GraphStore>>,
        locks: Arc<LockManager>,
        bus: EventBus,
        ceiling: usize,
        strategy: EvictionStrategy,
    ) -> Self {
        MemoryManager {
            store,
            locks,
            bus,
            ceiling,
            strategy,
            passes: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn stats(&self) -> MemoryStats {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        let resident = store.node_count();
        MemoryStats {
            resident,
            evicted: store.evicted_count(),
            ceiling: self.ceiling,
            utilization: if self.ceiling == 0 {
                0.0
            } else {
                resident as f64 / self.ceiling as f64
            },
            passes: self.passes.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
        }
    }

    /// Bring the resident count back under the ceiling, coldest first.
    /// Lock-pinned nodes are skipped; if skipping them leaves the store
    /// over the ceiling the evictions done so far stick and the pass
    /// reports [`CapacityError::CeilingNotMet`].
    pub fn enforce(&self) -> Result<EvictionReport, CapacityError> {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        let resident = store.node_count();
        // Ceiling zero disables enforcement
        if self.ceiling == 0 || resident <= self.ceiling {
            return Ok(EvictionReport {
                evicted: Vec::new(),
                resident_after: resident,
            });
        }
        if !store.has_reload() {
            return Err(CapacityError::NoReload {
                resident,
                ceiling: self.ceiling,
            });
        }

        let mut candidates: Vec<(NodeId, AccessRecord)> =
            store.access_records().into_iter().collect();
        candidates.sort_by_key(|(id, record)| (self.strategy.key(record), *id));

        let mut evicted = Vec::new();
        let mut events = Vec::new();
        let mut locked = 0usize;
        for (id, _) in candidates {
            if store.node_count() <= self.ceiling {
                break;
            }
            if self.locks.is_locked(id) {
                locked += 1;
                continue;
            }
            match store.evict_node(id) {
                Ok(event) => {
                    evicted.push(id);
                    events.push(event);
                }
                Err(_) => continue,
            }
        }

        let resident_after = store.node_count();
        drop(store);

        self.passes.fetch_add(1, Ordering::Relaxed);
        self.total_evicted
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);

        // Published outside the store lock; subscribers may read the store
        self.bus.publish(&events);
        debug!(
            evicted = evicted.len(),
            resident_after, "memory enforcement pass"
        );

        if resident_after > self.ceiling {
            info!(
                resident_after,
                ceiling = self.ceiling,
                locked,
                "ceiling not met, lock-pinned candidates remain"
            );
            return Err(CapacityError::CeilingNotMet {
                ceiling: self.ceiling,
                resident: resident_after,
                locked,
            });
        }
        Ok(EvictionReport {
            evicted,
            resident_after,
        })
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("ceiling", &self.ceiling)
            .field("strategy", &self.strategy)
            .finish()
    }
}
