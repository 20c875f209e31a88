//! Core type definitions for the graph store

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node (opaque 128-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        NodeId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl From<Uuid> for NodeId {
    fn from(id: Uuid) -> Self {
        NodeId(id)
    }
}

/// Unique identifier for a relationship (opaque 128-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RelationshipId(pub Uuid);

impl RelationshipId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        RelationshipId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationshipId({})", self.0)
    }
}

impl From<Uuid> for RelationshipId {
    fn from(id: Uuid) -> Self {
        RelationshipId(id)
    }
}

/// Node type tag (e.g. "Actor", "Institution", "Policy").
///
/// Treated as an uninterpreted label; the external taxonomy collaborator
/// decides which tags are valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        TypeTag(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TypeTag {
    fn from(s: String) -> Self {
        TypeTag(s)
    }
}

impl From<&str> for TypeTag {
    fn from(s: &str) -> Self {
        TypeTag(s.to_string())
    }
}

/// Relationship kind tag (e.g. "GOVERNS", "FUNDS", "PRODUCES").
///
/// Opaque to the core; semantic validation is delegated to the injected
/// taxonomy callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct KindTag(String);

impl KindTag {
    pub fn new(kind: impl Into<String>) -> Self {
        KindTag(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for KindTag {
    fn from(s: String) -> Self {
        KindTag(s)
    }
}

impl From<&str> for KindTag {
    fn from(s: &str) -> Self {
        KindTag(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_uniqueness() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_type_tag() {
        let tag = TypeTag::new("Actor");
        assert_eq!(tag.as_str(), "Actor");
        assert_eq!(format!("{}", tag), "Actor");

        let tag2: TypeTag = "Policy".into();
        assert_eq!(tag2.as_str(), "Policy");
    }

    #[test]
    fn test_kind_tag() {
        let kind = KindTag::new("GOVERNS");
        assert_eq!(kind.as_str(), "GOVERNS");
        assert_eq!(format!("{}", kind), "GOVERNS");
    }

    #[test]
    fn test_id_ordering() {
        let a = NodeId(Uuid::from_u128(1));
        let b = NodeId(Uuid::from_u128(2));
        assert!(a < b);
    }
}
