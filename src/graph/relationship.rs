//! Relationship entity
//!
//! A weighted directed edge between two nodes, with an opaque kind tag and
//! optional dimensional context (time slice, spatial unit, scenario).

use super::types::{KindTag, NodeId, RelationshipId};
use serde::{Deserialize, Serialize};

/// Optional dimensional qualifiers on a relationship. All labels are opaque
/// to the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionalContext {
    pub time_slice: Option<String>,
    pub spatial_unit: Option<String>,
    pub scenario: Option<String>,
}

impl DimensionalContext {
    pub fn is_empty(&self) -> bool {
        self.time_slice.is_none() && self.spatial_unit.is_none() && self.scenario.is_none()
    }
}

/// A typed, weighted, directed edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub kind: KindTag,
    pub weight: f64,
    #[serde(default)]
    pub context: DimensionalContext,
}

impl Relationship {
    /// Create a relationship with a fresh id and unit weight
    pub fn new(source_id: NodeId, target_id: NodeId, kind: impl Into<KindTag>) -> Self {
        Relationship {
            id: RelationshipId::generate(),
            source_id,
            target_id,
            kind: kind.into(),
            weight: 1.0,
            context: DimensionalContext::default(),
        }
    }

    /// Set the weight, builder style
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the dimensional context, builder style
    pub fn with_context(mut self, context: DimensionalContext) -> Self {
        self.context = context;
        self
    }

    /// True when `node_id` is either endpoint
    pub fn touches(&self, node_id: NodeId) -> bool {
        self.source_id == node_id || self.target_id == node_id
    }
}
