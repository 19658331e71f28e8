//! Field-type registry - maps schema type tags to field types.
//!
//! The registry is a plain value built once and passed to the schema
//! compiler, so tests can swap in a reduced or aliased table without any
//! global setup.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::CompileError;
use crate::node::{NodeKind, SchemaNode};
use crate::types::{FieldType, ScalarKind};

/// Tag-to-field-type table.
#[derive(Debug, Clone)]
pub struct FieldTypeRegistry {
    handlers: BTreeMap<String, FieldType>,
}

impl FieldTypeRegistry {
    /// A registry with no tags.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// The standard table: the four structural controllers plus the
    /// scalar leaf kinds.
    pub fn standard() -> Self {
        [
            FieldType::Null,
            FieldType::Array,
            FieldType::Object,
            FieldType::MultiSchema,
            FieldType::Scalar(ScalarKind::String),
            FieldType::Scalar(ScalarKind::Number),
            FieldType::Scalar(ScalarKind::Integer),
            FieldType::Scalar(ScalarKind::Boolean),
            FieldType::Scalar(ScalarKind::Any),
        ]
        .into_iter()
        .fold(Self::empty(), |registry, field_type| {
            registry.register(field_type.tag(), field_type)
        })
    }

    /// Register `tag` (or re-register it) as `field_type`.
    pub fn register(mut self, tag: impl Into<String>, field_type: FieldType) -> Self {
        let tag = tag.into();
        debug!(%tag, %field_type, "registering field type");
        self.handlers.insert(tag, field_type);
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Resolve a tag arriving from schema data.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnknownType`] if the tag was never registered.
    pub fn resolve_tag(&self, tag: &str, path: &str) -> Result<FieldType, CompileError> {
        self.handlers
            .get(tag)
            .copied()
            .ok_or_else(|| CompileError::UnknownType {
                tag: tag.to_string(),
                path: path.to_string(),
            })
    }

    /// Field type handling a live node.
    ///
    /// Total over the node kinds: every kind has exactly one field type.
    pub fn resolve(&self, node: &SchemaNode) -> FieldType {
        match node.kind() {
            NodeKind::Null(_) => FieldType::Null,
            NodeKind::Array(_) => FieldType::Array,
            NodeKind::Object(_) => FieldType::Object,
            NodeKind::MultiSchema(_) => FieldType::MultiSchema,
            NodeKind::Scalar(scalar) => FieldType::Scalar(scalar.kind()),
        }
    }
}

impl Default for FieldTypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
