//! Change notification for graph mutations
//!
//! Every committed mutation is published as a [`ChangeEvent`] on the
//! [`EventBus`]; the cache layer, memory manager and audit observers
//! subscribe independently so cross-cutting concerns stay off the
//! mutation path.

use super::types::{NodeId, RelationshipId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Which entity table a change touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Relationship,
}

/// What happened to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
    Evicted,
    Reloaded,
}

/// A typed change event emitted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeEvent {
    Node {
        op: ChangeOp,
        id: NodeId,
    },
    Relationship {
        op: ChangeOp,
        id: RelationshipId,
        source: NodeId,
        target: NodeId,
    },
}

impl ChangeEvent {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            ChangeEvent::Node { .. } => EntityKind::Node,
            ChangeEvent::Relationship { .. } => EntityKind::Relationship,
        }
    }

    pub fn op(&self) -> ChangeOp {
        match self {
            ChangeEvent::Node { op, .. } => *op,
            ChangeEvent::Relationship { op, .. } => *op,
        }
    }

    /// Node ids whose cached state this event may stale
    pub fn affected_nodes(&self) -> Vec<NodeId> {
        match self {
            ChangeEvent::Node { id, .. } => vec![*id],
            ChangeEvent::Relationship { source, target, .. } => vec![*source, *target],
        }
    }
}

/// Subscriber callback invoked synchronously for each published event
pub type Subscriber = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Synchronous observer bus for change events.
///
/// Subscribers run in registration order on the publishing thread; the
/// transaction manager publishes buffered events at commit time.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for all future events
    pub fn subscribe(&self, subscriber: Subscriber) {
        if let Ok(mut subs) = self.subscribers.write() {
            subs.push(subscriber);
        }
    }

    /// Publish a batch of events to every subscriber, in order
    pub fn publish(&self, events: &[ChangeEvent]) {
        let Ok(subs) = self.subscribers.read() else {
            return;
        };
        for event in events {
            for sub in subs.iter() {
                sub(event);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            bus.subscribe(Arc::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let events = vec![
            ChangeEvent::Node {
                op: ChangeOp::Created,
                id: NodeId::generate(),
            },
            ChangeEvent::Node {
                op: ChangeOp::Deleted,
                id: NodeId::generate(),
            },
        ];
        bus.publish(&events);
        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_affected_nodes() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        let event = ChangeEvent::Relationship {
            op: ChangeOp::Created,
            id: RelationshipId::generate(),
            source: a,
            target: b,
        };
        assert_eq!(event.affected_nodes(), vec![a, b]);
        assert_eq!(event.entity_kind(), EntityKind::Relationship);
        assert_eq!(event.op(), ChangeOp::Created);
    }
}
