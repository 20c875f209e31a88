//! Graph data model and storage
//!
//! The entity types ([`Node`], [`Relationship`]), their identifiers, the
//! change-event bus, and the central [`GraphStore`].

pub mod event;
pub mod node;
pub mod property;
pub mod relationship;
pub mod store;
pub mod types;

pub use event::{ChangeEvent, ChangeOp, EntityKind, EventBus, Subscriber};
pub use node::Node;
pub use property::{PropertyMap, PropertyValue};
pub use relationship::{DimensionalContext, Relationship};
pub use store::{AccessRecord, GraphError, GraphResult, GraphStore, ReloadFn};
pub use types::{KindTag, NodeId, RelationshipId, TypeTag};
