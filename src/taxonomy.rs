//! Pluggable domain taxonomy
//!
//! The core treats type and kind tags as opaque strings; what combinations
//! are meaningful is a modeling-domain question. This module is the seam:
//! a kind validator callback decides which relationship kinds may connect
//! which node types, and per-type handlers validate node content and
//! supply default properties.

use crate::graph::{KindTag, Node, PropertyMap, TypeTag};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("kind {kind} is not valid from {source_type} to {target_type}")]
    InvalidKind {
        source_type: TypeTag,
        kind: KindTag,
        target_type: TypeTag,
    },

    #[error("node of type {type_tag} is missing required property {key}")]
    MissingProperty { type_tag: TypeTag, key: String },

    #[error("node of type {type_tag} rejected: {reason}")]
    Rejected { type_tag: TypeTag, reason: String },
}

pub type TaxonomyResult<T> = Result<T, TaxonomyError>;

/// Callback deciding whether `kind` may connect `source_type` to
/// `target_type`. Absent a callback, everything is allowed.
pub type KindValidator = Arc<dyn Fn(&TypeTag, &KindTag, &TypeTag) -> bool + Send + Sync>;

/// Per-type content validation and defaults
pub trait TypeHandler: Send + Sync {
    /// Check a node of this type before it enters the graph
    fn validate(&self, node: &Node) -> TaxonomyResult<()>;

    /// Properties applied to new nodes of this type when absent
    fn default_properties(&self) -> PropertyMap {
        PropertyMap::new()
    }
}

/// Handler enforcing a fixed set of required property keys
pub struct RequiredProperties {
    type_tag: TypeTag,
    keys: Vec<String>,
    defaults: PropertyMap,
}

impl RequiredProperties {
    pub fn new(type_tag: impl Into<TypeTag>, keys: &[&str]) -> Self {
        RequiredProperties {
            type_tag: type_tag.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            defaults: PropertyMap::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: PropertyMap) -> Self {
        self.defaults = defaults;
        self
    }
}

impl TypeHandler for RequiredProperties {
    fn validate(&self, node: &Node) -> TaxonomyResult<()> {
        for key in &self.keys {
            if node.get_property(key).is_none() {
                return Err(TaxonomyError::MissingProperty {
                    type_tag: self.type_tag.clone(),
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }

    fn default_properties(&self) -> PropertyMap {
        self.defaults.clone()
    }
}

/// Registry of type handlers, consulted by the service before inserts
#[derive(Default)]
pub struct TypeHandlerRegistry {
    handlers: FxHashMap<TypeTag, Arc<dyn TypeHandler>>,
}

impl TypeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_tag: impl Into<TypeTag>, handler: Arc<dyn TypeHandler>) {
        let tag = type_tag.into();
        debug!(type_tag = %tag, "type handler registered");
        self.handlers.insert(tag, handler);
    }

    pub fn get(&self, type_tag: &TypeTag) -> Option<&Arc<dyn TypeHandler>> {
        self.handlers.get(type_tag)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for TypeHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandlerRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// The full taxonomy seam: kind validator plus type handlers.
/// An empty taxonomy accepts everything.
#[derive(Default)]
pub struct Taxonomy {
    kind_validator: Option<KindValidator>,
    registry: TypeHandlerRegistry,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn set_kind_validator(&mut self, validator: KindValidator) {
        self.kind_validator = Some(validator);
    }

    pub fn registry_mut(&mut self) -> &mut TypeHandlerRegistry {
        &mut self.registry
    }

    /// Validate a node against its type handler, if one is registered
    pub fn check_node(&self, node: &Node) -> TaxonomyResult<()> {
        match self.registry.get(&node.type_tag) {
            Some(handler) => handler.validate(node),
            None => Ok(()),
        }
    }

    /// Fill in handler defaults for properties the node lacks
    pub fn apply_defaults(&self, node: &mut Node) {
        if let Some(handler) = self.registry.get(&node.type_tag) {
            for (key, value) in handler.default_properties() {
                if node.get_property(&key).is_none() {
                    node.set_property(key, value);
                }
            }
        }
    }

    /// Validate a relationship kind between two node types
    pub fn check_kind(
        &self,
        source_type: &TypeTag,
        kind: &KindTag,
        target_type: &TypeTag,
    ) -> TaxonomyResult<()> {
        match &self.kind_validator {
            Some(validator) if !validator(source_type, kind, target_type) => {
                Err(TaxonomyError::InvalidKind {
                    source_type: source_type.clone(),
                    kind: kind.clone(),
                    target_type: target_type.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Taxonomy")
            .field("kind_validator", &self.kind_validator.is_some())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;

    #[test]
    fn test_permissive_taxonomy_accepts_everything() {
        let taxonomy = Taxonomy::permissive();
        let node = Node::new("Whatever", "anything");
        assert!(taxonomy.check_node(&node).is_ok());
        assert!(taxonomy
            .check_kind(
                &TypeTag::new("A"),
                &KindTag::new("ANY"),
                &TypeTag::new("B")
            )
            .is_ok());
    }

    #[test]
    fn test_kind_validator_rejects() {
        let mut taxonomy = Taxonomy::new();
        // Only Actors may GOVERN Institutions
        taxonomy.set_kind_validator(Arc::new(|source, kind, target| {
            kind.as_str() != "GOVERNS"
                || (source.as_str() == "Actor" && target.as_str() == "Institution")
        }));

        assert!(taxonomy
            .check_kind(
                &TypeTag::new("Actor"),
                &KindTag::new("GOVERNS"),
                &TypeTag::new("Institution")
            )
            .is_ok());

        let err = taxonomy
            .check_kind(
                &TypeTag::new("Resource"),
                &KindTag::new("GOVERNS"),
                &TypeTag::new("Institution"),
            )
            .unwrap_err();
        assert!(matches!(err, TaxonomyError::InvalidKind { .. }));
    }

    #[test]
    fn test_required_properties_handler() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.registry_mut().register(
            "Policy",
            Arc::new(RequiredProperties::new("Policy", &["authority"])),
        );

        let bare = Node::new("Policy", "Farm Bill");
        assert_eq!(
            taxonomy.check_node(&bare),
            Err(TaxonomyError::MissingProperty {
                type_tag: TypeTag::new("Policy"),
                key: "authority".to_string(),
            })
        );

        let mut complete = Node::new("Policy", "Farm Bill");
        complete.set_property("authority", "Congress");
        assert!(taxonomy.check_node(&complete).is_ok());
    }

    #[test]
    fn test_defaults_fill_missing_only() {
        let mut defaults = PropertyMap::new();
        defaults.insert("status".to_string(), PropertyValue::from("active"));
        let mut taxonomy = Taxonomy::new();
        taxonomy.registry_mut().register(
            "Actor",
            Arc::new(RequiredProperties::new("Actor", &[]).with_defaults(defaults)),
        );

        let mut node = Node::new("Actor", "USDA");
        node.set_property("status", "dormant");
        taxonomy.apply_defaults(&mut node);
        // Existing value wins
        assert_eq!(
            node.get_property("status").unwrap().as_string(),
            Some("dormant")
        );

        let mut fresh = Node::new("Actor", "FDA");
        taxonomy.apply_defaults(&mut fresh);
        assert_eq!(
            fresh.get_property("status").unwrap().as_string(),
            Some("active")
        );
    }
}
