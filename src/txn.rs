//! Transactions with undo-log rollback
//!
//! Mutations apply to the store immediately; each one records its inverse
//! in an undo log. Commit discards the log and publishes the buffered
//! change events in one synchronous batch, so observers (cache, audit)
//! never see uncommitted state. Rollback replays the log in reverse.
//!
//! Transactions are flat: a thread that already has an open transaction
//! gets [`TxnError::AlreadyActive`] from `begin`, never silent nesting.
//! Dropping a transaction without committing rolls it back.

use crate::graph::{
    ChangeEvent, EventBus, GraphError, GraphStore, Node, NodeId, Relationship, RelationshipId,
};
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::ThreadId;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TxnError {
    #[error("a transaction is already active on this thread")]
    AlreadyActive,

    #[error("transaction is no longer active")]
    Inactive,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type TxnResult<T> = Result<T, TxnError>;

/// Inverse of an applied mutation, replayed on rollback
enum UndoOp {
    RemoveNode(NodeId),
    RestoreNode(Box<Node>),
    ReinsertNode(Box<Node>),
    RemoveRelationship(RelationshipId),
    ReinsertRelationship(Box<Relationship>),
}

type CommitHook = Box<dyn FnOnce(&[ChangeEvent]) + Send>;
type RollbackHook = Box<dyn FnOnce() + Send>;

/// Hands out transactions over a shared store and publishes committed
/// change batches on the event bus.
pub struct TransactionManager {
    store: Arc<RwLock<GraphStore>>,
    bus: EventBus,
    active_threads: Mutex<FxHashSet<ThreadId>>,
    counter: AtomicU64,
}

impl TransactionManager {
    pub fn new(store: Arc<RwLock<GraphStore>>, bus: EventBus) -> Self {
        TransactionManager {
            store,
            bus,
            active_threads: Mutex::new(FxHashSet::default()),
            counter: AtomicU64::new(1),
        }
    }

    /// Begin a transaction on the current thread. Flat model: a second
    /// `begin` before the first finishes is an error.
    pub fn begin(&self) -> TxnResult<Transaction<'_>> {
        let thread = std::thread::current().id();
        {
            let mut active = self
                .active_threads
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if !active.insert(thread) {
                return Err(TxnError::AlreadyActive);
            }
        }
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        debug!(txn = id, "transaction started");
        Ok(Transaction {
            manager: self,
            id,
            thread,
            undo: Vec::new(),
            events: Vec::new(),
            on_commit: Vec::new(),
            on_rollback: Vec::new(),
            open: true,
        })
    }

    /// True when the current thread has an open transaction
    pub fn has_active(&self) -> bool {
        let thread = std::thread::current().id();
        self.active_threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&thread)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn release(&self, thread: ThreadId) {
        self.active_threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&thread);
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_id", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}

/// An open transaction; all mutations go through here
pub struct Transaction<'a> {
    manager: &'a TransactionManager,
    id: u64,
    thread: ThreadId,
    undo: Vec<UndoOp>,
    events: Vec<ChangeEvent>,
    on_commit: Vec<CommitHook>,
    on_rollback: Vec<RollbackHook>,
    open: bool,
}

impl<'a> Transaction<'a> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn operation_count(&self) -> usize {
        self.undo.len()
    }

    /// Insert a node
    pub fn add_node(&mut self, node: Node) -> TxnResult<NodeId> {
        let id = node.id;
        let mut store = self.store_write();
        let event = store.add_node(node)?;
        drop(store);
        self.undo.push(UndoOp::RemoveNode(id));
        self.events.push(event);
        Ok(id)
    }

    /// Replace a node's state with `node` (same id must exist)
    pub fn update_node(&mut self, node: Node) -> TxnResult<()> {
        let mut store = self.store_write();
        let (prior, event) = store.update_node(node)?;
        drop(store);
        self.undo.push(UndoOp::RestoreNode(Box::new(prior)));
        self.events.push(event);
        Ok(())
    }

    /// Apply a closure to a copy of the node, then write it back with a
    /// version bump. The closure sees the current committed-or-pending state.
    pub fn mutate_node<F>(&mut self, id: NodeId, mutate: F) -> TxnResult<()>
    where
        F: FnOnce(&mut Node),
    {
        let current = {
            let store = self.store_read();
            store
                .get_node(id)
                .cloned()
                .ok_or(GraphError::NodeNotFound(id))?
        };
        let mut changed = current;
        mutate(&mut changed);
        changed.bump();
        self.update_node(changed)
    }

    /// Remove a node; fails while relationships are still attached
    pub fn remove_node(&mut self, id: NodeId) -> TxnResult<Node> {
        let mut store = self.store_write();
        let (node, event) = store.remove_node(id)?;
        drop(store);
        self.undo.push(UndoOp::ReinsertNode(Box::new(node.clone())));
        self.events.push(event);
        Ok(node)
    }

    /// Insert a relationship
    pub fn add_relationship(&mut self, rel: Relationship) -> TxnResult<RelationshipId> {
        let id = rel.id;
        let mut store = self.store_write();
        let event = store.add_relationship(rel)?;
        drop(store);
        self.undo.push(UndoOp::RemoveRelationship(id));
        self.events.push(event);
        Ok(id)
    }

    /// Remove a relationship
    pub fn remove_relationship(&mut self, id: RelationshipId) -> TxnResult<Relationship> {
        let mut store = self.store_write();
        let (rel, event) = store.remove_relationship(id)?;
        drop(store);
        self.undo
            .push(UndoOp::ReinsertRelationship(Box::new(rel.clone())));
        self.events.push(event);
        Ok(rel)
    }

    /// Run `hook` with the committed event batch after a successful commit
    pub fn on_commit(&mut self, hook: impl FnOnce(&[ChangeEvent]) + Send + 'static) {
        self.on_commit.push(Box::new(hook));
    }

    /// Run `hook` after a rollback (explicit or via drop)
    pub fn on_rollback(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_rollback.push(Box::new(hook));
    }

    /// Commit: publish buffered events, run commit hooks, discard the
    /// undo log.
    pub fn commit(mut self) -> TxnResult<()> {
        if !self.open {
            return Err(TxnError::Inactive);
        }
        self.open = false;
        self.undo.clear();

        let events = std::mem::take(&mut self.events);
        self.manager.bus.publish(&events);
        for hook in std::mem::take(&mut self.on_commit) {
            hook(&events);
        }
        self.on_rollback.clear();
        self.manager.release(self.thread);
        debug!(txn = self.id, events = events.len(), "transaction committed");
        Ok(())
    }

    /// Roll back every applied mutation, newest first
    pub fn rollback(mut self) {
        self.rollback_inner();
    }

    fn rollback_inner(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        let undo = std::mem::take(&mut self.undo);
        let mut store = self.store_write();
        for op in undo.into_iter().rev() {
            // Inverses of successfully applied ops cannot fail against the
            // state they produced; a failure here means outside interference.
            let result = match op {
                UndoOp::RemoveNode(id) => store.remove_node(id).map(|_| ()),
                UndoOp::RestoreNode(node) => store.restore_node_state(*node),
                UndoOp::ReinsertNode(node) => store.add_node(*node).map(|_| ()),
                UndoOp::RemoveRelationship(id) => store.remove_relationship(id).map(|_| ()),
                UndoOp::ReinsertRelationship(rel) => store.add_relationship(*rel).map(|_| ()),
            };
            if let Err(err) = result {
                warn!(txn = self.id, error = %err, "undo operation failed");
            }
        }
        drop(store);

        self.events.clear();
        self.on_commit.clear();
        for hook in std::mem::take(&mut self.on_rollback) {
            hook();
        }
        self.manager.release(self.thread);
        debug!(txn = self.id, "transaction rolled back");
    }

    fn store_write(&self) -> std::sync::RwLockWriteGuard<'_, GraphStore> {
        self.manager
            .store
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn store_read(&self) -> std::sync::RwLockReadGuard<'_, GraphStore> {
        self.manager.store.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.open {
            warn!(txn = self.id, "open transaction dropped; rolling back");
            self.rollback_inner();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn manager() -> (TransactionManager, Arc<RwLock<GraphStore>>) {
        let store = Arc::new(RwLock::new(GraphStore::new()));
        let txns = TransactionManager::new(Arc::clone(&store), EventBus::new());
        (txns, store)
    }

    #[test]
    fn test_commit_applies_and_publishes() {
        let (txns, store) = manager();
        let published = Arc::new(AtomicU64::new(0));
        {
            let published = Arc::clone(&published);
            txns.bus().subscribe(Arc::new(move |_| {
                published.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let mut txn = txns.begin().unwrap();
        let a = txn.add_node(Node::new("Actor", "A")).unwrap();
        let b = txn.add_node(Node::new("Actor", "B")).unwrap();
        txn.add_relationship(Relationship::new(a, b, "FUNDS")).unwrap();
        // Nothing published before commit
        assert_eq!(published.load(Ordering::SeqCst), 0);
        txn.commit().unwrap();

        assert_eq!(published.load(Ordering::SeqCst), 3);
        let store = store.read().unwrap();
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.relationship_count(), 1);
    }

    #[test]
    fn test_rollback_restores_prior_state_exactly() {
        let (txns, store) = manager();

        let mut setup = txns.begin().unwrap();
        let a = setup.add_node(Node::new("Actor", "A")).unwrap();
        setup.commit().unwrap();

        let before = {
            let store = store.read().unwrap();
            let mut snapshot: Vec<Node> = store.all_nodes().cloned().collect();
            snapshot.sort_by_key(|n| n.id);
            snapshot
        };

        let mut txn = txns.begin().unwrap();
        txn.mutate_node(a, |n| {
            n.set_property("budget", 10i64);
        })
        .unwrap();
        let b = txn.add_node(Node::new("Actor", "B")).unwrap();
        txn.add_relationship(Relationship::new(a, b, "GOVERNS")).unwrap();
        txn.rollback();

        let after = {
            let store = store.read().unwrap();
            let mut snapshot: Vec<Node> = store.all_nodes().cloned().collect();
            snapshot.sort_by_key(|n| n.id);
            snapshot
        };
        assert_eq!(before, after);
        assert_eq!(store.read().unwrap().relationship_count(), 0);
    }

    #[test]
    fn test_rollback_reverses_in_reverse_order() {
        let (txns, store) = manager();

        // remove_node inside the txn forces the relationship to go first,
        // so rollback must reinsert the node before the relationship
        let mut setup = txns.begin().unwrap();
        let a = setup.add_node(Node::new("Actor", "A")).unwrap();
        let b = setup.add_node(Node::new("Actor", "B")).unwrap();
        let rel = setup.add_relationship(Relationship::new(a, b, "FUNDS")).unwrap();
        setup.commit().unwrap();

        let mut txn = txns.begin().unwrap();
        txn.remove_relationship(rel).unwrap();
        txn.remove_node(b).unwrap();
        txn.rollback();

        let store = store.read().unwrap();
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.relationship_count(), 1);
    }

    #[test]
    fn test_flat_transactions_only() {
        let (txns, _store) = manager();
        let txn = txns.begin().unwrap();
        assert!(matches!(txns.begin(), Err(TxnError::AlreadyActive)));
        txn.rollback();
        // Finishing the first lets the thread begin again
        assert!(txns.begin().is_ok());
    }

    #[test]
    fn test_drop_rolls_back() {
        let (txns, store) = manager();
        {
            let mut txn = txns.begin().unwrap();
            txn.add_node(Node::new("Actor", "ghost")).unwrap();
        }
        assert_eq!(store.read().unwrap().node_count(), 0);
        assert!(!txns.has_active());
    }

    #[test]
    fn test_failed_op_leaves_txn_usable() {
        let (txns, store) = manager();
        let mut txn = txns.begin().unwrap();
        let a = txn.add_node(Node::new("Actor", "A")).unwrap();

        let ghost = NodeId::generate();
        let err = txn.add_relationship(Relationship::new(a, ghost, "FUNDS"));
        assert!(matches!(
            err,
            Err(TxnError::Graph(GraphError::MissingEndpoint(_)))
        ));

        // The failed op recorded nothing; commit keeps only the good one
        txn.commit().unwrap();
        let store = store.read().unwrap();
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.relationship_count(), 0);
    }

    #[test]
    fn test_commit_hooks_see_event_batch() {
        let (txns, _store) = manager();
        let seen = Arc::new(AtomicU64::new(0));
        let mut txn = txns.begin().unwrap();
        txn.add_node(Node::new("Actor", "A")).unwrap();
        {
            let seen = Arc::clone(&seen);
            txn.on_commit(move |events| {
                seen.store(events.len() as u64, Ordering::SeqCst);
            });
        }
        txn.commit().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rollback_hooks_fire() {
        let (txns, _store) = manager();
        let fired = Arc::new(AtomicBool::new(false));
        let mut txn = txns.begin().unwrap();
        {
            let fired = Arc::clone(&fired);
            txn.on_rollback(move || fired.store(true, Ordering::SeqCst));
        }
        txn.rollback();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_mutate_node_bumps_version() {
        let (txns, store) = manager();
        let mut setup = txns.begin().unwrap();
        let a = setup.add_node(Node::new("Actor", "A")).unwrap();
        setup.commit().unwrap();

        let v1 = store.read().unwrap().get_node(a).unwrap().version;
        let mut txn = txns.begin().unwrap();
        txn.mutate_node(a, |n| n.label = "renamed".to_string()).unwrap();
        txn.commit().unwrap();
        let node = store.read().unwrap().get_node(a).cloned().unwrap();
        assert!(node.version > v1);
        assert_eq!(node.label, "renamed");
        assert!(node.get_property("missing").is_none());
    }
}
