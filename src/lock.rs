//! Per-entity reader/writer locks
//!
//! Writers are served strictly in arrival order via a ticket counter per
//! entity; readers share the lock but yield to any waiting writer so a
//! write-heavy entity cannot starve. All waits are bounded by a timeout
//! and surface [`LockError::Timeout`] instead of blocking forever.
//!
//! Multi-entity acquisition sorts ids ascending before locking, which
//! makes lock order global and rules out deadlock between transactions
//! that touch overlapping entity sets.

use crate::graph::NodeId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out after {waited_ms}ms waiting for lock on {node}")]
    Timeout { node: NodeId, waited_ms: u64 },
}

pub type LockResult<T> = Result<T, LockError>;

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
    /// Next ticket to hand out to an arriving writer
    next_ticket: u64,
    /// Ticket currently allowed to take the write lock
    serving: u64,
    /// Tickets whose holders timed out before being served
    abandoned: FxHashSet<u64>,
}

impl LockState {
    fn writers_pending(&self) -> bool {
        self.next_ticket != self.serving
    }

    /// Advance the serving counter past any abandoned tickets
    fn serve_next(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

#[derive(Debug, Default)]
struct LockEntry {
    state: Mutex<LockState>,
    cond: Condvar,
}

/// FIFO-fair per-entity lock table
pub struct LockManager {
    entries: Mutex<FxHashMap<NodeId, Arc<LockEntry>>>,
    default_timeout: Duration,
}

impl LockManager {
    pub fn new(default_timeout: Duration) -> Self {
        LockManager {
            entries: Mutex::new(FxHashMap::default()),
            default_timeout,
        }
    }

    fn entry(&self, node: NodeId) -> Arc<LockEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(entries.entry(node).or_default())
    }

    /// Acquire the exclusive write lock with the default timeout
    pub fn acquire_write(&self, node: NodeId) -> LockResult<WriteGuard> {
        self.acquire_write_timeout(node, self.default_timeout)
    }

    /// Acquire the exclusive write lock, waiting at most `timeout`
    pub fn acquire_write_timeout(
        &self,
        node: NodeId,
        timeout: Duration,
    ) -> LockResult<WriteGuard> {
        let entry = self.entry(node);
        let deadline = Instant::now() + timeout;

        let mut state = entry.state.lock().unwrap_or_else(|e| e.into_inner());
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        while state.writer || state.readers > 0 || state.serving != ticket {
            let now = Instant::now();
            if now >= deadline {
                // Give the ticket back if nothing was served past it, else
                // let the serving counter skip it on release.
                return Err(self.abandon_ticket(&entry, state, node, ticket, timeout));
            }
            let (next, result) = entry
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = next;
            if result.timed_out()
                && (state.writer || state.readers > 0 || state.serving != ticket)
            {
                return Err(self.abandon_ticket(&entry, state, node, ticket, timeout));
            }
        }

        state.writer = true;
        trace!(node = %node, ticket, "write lock acquired");
        drop(state);
        Ok(WriteGuard {
            entry,
            node,
        })
    }

    fn abandon_ticket(
        &self,
        entry: &Arc<LockEntry>,
        mut state: std::sync::MutexGuard<'_, LockState>,
        node: NodeId,
        ticket: u64,
        waited: Duration,
    ) -> LockError {
        if state.next_ticket == ticket + 1 && state.serving <= ticket {
            // We were the youngest waiter, so the ticket can be returned
            state.next_ticket = ticket;
        } else if state.serving == ticket {
            // Our turn arrived during the timeout race; pass it on
            state.serve_next();
            entry.cond.notify_all();
        } else {
            // A middle waiter; mark the ticket so release skips it
            state.abandoned.insert(ticket);
        }
        drop(state);
        LockError::Timeout {
            node,
            waited_ms: waited.as_millis() as u64,
        }
    }

    /// Acquire a shared read lock with the default timeout
    pub fn acquire_read(&self, node: NodeId) -> LockResult<ReadGuard> {
        self.acquire_read_timeout(node, self.default_timeout)
    }

    /// Acquire a shared read lock, waiting at most `timeout`. Readers
    /// yield to pending writers to preserve writer FIFO progress.
    pub fn acquire_read_timeout(&self, node: NodeId, timeout: Duration) -> LockResult<ReadGuard> {
        let entry = self.entry(node);
        let deadline = Instant::now() + timeout;

        let mut state = entry.state.lock().unwrap_or_else(|e| e.into_inner());
        while state.writer || state.writers_pending() {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout {
                    node,
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            let (next, result) = entry
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = next;
            if result.timed_out() && (state.writer || state.writers_pending()) {
                return Err(LockError::Timeout {
                    node,
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }

        state.readers += 1;
        drop(state);
        Ok(ReadGuard { entry, node })
    }

    /// Lock several entities for writing in one call. Ids are locked in
    /// ascending order regardless of argument order; on any timeout the
    /// already-held guards are released before the error returns.
    pub fn acquire_many(&self, nodes: &[NodeId]) -> LockResult<Vec<WriteGuard>> {
        let mut sorted: Vec<NodeId> = nodes.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for node in sorted {
            // Guards drop in reverse on error, releasing everything held
            guards.push(self.acquire_write(node)?);
        }
        Ok(guards)
    }

    /// True when any reader or writer currently holds the entity
    pub fn is_locked(&self, node: NodeId) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&node).is_some_and(|entry| {
            let state = entry.state.lock().unwrap_or_else(|e| e.into_inner());
            state.writer || state.readers > 0
        })
    }

    /// Number of entities with a lock entry (held or historical)
    pub fn entry_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("entries", &self.entry_count())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// Exclusive guard; releases and advances the writer queue on drop
pub struct WriteGuard {
    entry: Arc<LockEntry>,
    node: NodeId,
}

impl WriteGuard {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        let mut state = self.entry.state.lock().unwrap_or_else(|e| e.into_inner());
        state.writer = false;
        state.serve_next();
        self.entry.cond.notify_all();
    }
}

/// Shared guard; decrements the reader count on drop
pub struct ReadGuard {
    entry: Arc<LockEntry>,
    node: NodeId,
}

impl ReadGuard {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        let mut state = self.entry.state.lock().unwrap_or_else(|e| e.into_inner());
        state.readers = state.readers.saturating_sub(1);
        self.entry.cond.notify_all();
    }
}
