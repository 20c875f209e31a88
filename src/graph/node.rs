//! Node entity
//!
//! A node carries an opaque type tag, a display label, a free-form property
//! map and a strictly increasing version counter.

use super::property::{PropertyMap, PropertyValue};
use super::types::{NodeId, TypeTag};
use serde::{Deserialize, Serialize};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A typed node in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier, globally unique across all node types
    pub id: NodeId,

    /// Opaque type tag from the external taxonomy
    pub type_tag: TypeTag,

    /// Human-readable display label
    pub label: String,

    /// Free-form properties
    pub properties: PropertyMap,

    /// Monotonically increasing version, bumped on every mutation
    pub version: u64,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Node {
    /// Create a new node with a fresh id
    pub fn new(type_tag: impl Into<TypeTag>, label: impl Into<String>) -> Self {
        Self::with_id(NodeId::generate(), type_tag, label)
    }

    /// Create a node with a caller-supplied id
    pub fn with_id(
        id: NodeId,
        type_tag: impl Into<TypeTag>,
        label: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Node {
            id,
            type_tag: type_tag.into(),
            label: label.into(),
            properties: PropertyMap::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set a property, bumping version and update timestamp
    pub fn set_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        let old = self.properties.insert(key.into(), value.into());
        self.touch();
        old
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Remove a property; version is bumped only when something was removed
    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        let removed = self.properties.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Rename the display label
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
        self.touch();
    }

    /// Force a version bump, for callers that edit fields directly
    pub fn bump(&mut self) {
        self.touch();
    }

    /// Bump version and update timestamp
    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = now_millis();
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
