//! Live document - a compiled schema, its tree, and cached validation.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::controller::{
    ArrayController, Controller, MultiSchemaController, NullController, ObjectController,
    ScalarController,
};
use crate::error::{CompileError, FormError, ValidationIssue};
use crate::messages::MessageCatalog;
use crate::node::{NodeKind, SchemaNode};
use crate::pointer::{child, segments};
use crate::registry::FieldTypeRegistry;
use crate::schema::{SchemaKind, SchemaSet};
use crate::serializer::serialize_document;
use crate::types::{CompileOptions, FieldType};
use crate::validator::validate_tree_with;

/// One row of the form outline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    /// Pointer over internal names.
    pub pointer: String,
    /// Key the field is emitted under.
    pub output: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub editable: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// An editable document.
///
/// Every mutable access drops the cached validation report; the next
/// [`Document::validate`] walks the tree again.
#[derive(Debug)]
pub struct Document {
    set: SchemaSet,
    root: SchemaNode,
    catalog: MessageCatalog,
    report: Option<Vec<ValidationIssue>>,
}

impl Document {
    /// Compile `schema` and instantiate it, optionally seeded with an
    /// existing document.
    pub fn new(schema: &Value, seed: Option<&Value>) -> Result<Self, CompileError> {
        Self::with_options(schema, seed, &FieldTypeRegistry::standard(), &CompileOptions::new())
    }

    pub fn with_options(
        schema: &Value,
        seed: Option<&Value>,
        registry: &FieldTypeRegistry,
        options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        let set = SchemaSet::compile(schema, registry, options)?;
        Ok(Self::from_set(set, seed))
    }

    pub fn from_set(set: SchemaSet, seed: Option<&Value>) -> Self {
        let root = set.instantiate_root(seed);
        Self {
            set,
            root,
            catalog: MessageCatalog::standard(),
            report: None,
        }
    }

    /// Replace the message catalog used by [`Document::validate`].
    pub fn with_catalog(mut self, catalog: MessageCatalog) -> Self {
        self.catalog = catalog;
        self.report = None;
        self
    }

    pub fn schema_set(&self) -> &SchemaSet {
        &self.set
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    pub fn node(&self, pointer: &str) -> Option<&SchemaNode> {
        self.root.get(pointer)
    }

    pub fn node_mut(&mut self, pointer: &str) -> Option<&mut SchemaNode> {
        self.invalidate();
        self.root.get_mut(pointer)
    }

    /// Controller for the node at `pointer`.
    pub fn controller(&mut self, pointer: &str) -> Result<Controller<'_>, FormError> {
        self.invalidate();
        let node = self.root.get_mut(pointer).ok_or_else(|| FormError::NotFound {
            path: pointer.to_string(),
        })?;
        Ok(Controller::new(&self.set, node))
    }

    pub fn scalar(&mut self, pointer: &str) -> Result<ScalarController<'_>, FormError> {
        match self.controller(pointer)? {
            Controller::Scalar(c) => Ok(c),
            other => Err(mismatch(pointer, "scalar", other.field_type())),
        }
    }

    pub fn null(&mut self, pointer: &str) -> Result<NullController<'_>, FormError> {
        match self.controller(pointer)? {
            Controller::Null(c) => Ok(c),
            other => Err(mismatch(pointer, "null", other.field_type())),
        }
    }

    pub fn array(&mut self, pointer: &str) -> Result<ArrayController<'_>, FormError> {
        match self.controller(pointer)? {
            Controller::Array(c) => Ok(c),
            other => Err(mismatch(pointer, "array", other.field_type())),
        }
    }

    pub fn object(&mut self, pointer: &str) -> Result<ObjectController<'_>, FormError> {
        match self.controller(pointer)? {
            Controller::Object(c) => Ok(c),
            other => Err(mismatch(pointer, "object", other.field_type())),
        }
    }

    pub fn multischema(&mut self, pointer: &str) -> Result<MultiSchemaController<'_>, FormError> {
        match self.controller(pointer)? {
            Controller::MultiSchema(c) => Ok(c),
            other => Err(mismatch(pointer, "multischema", other.field_type())),
        }
    }

    /// Set the node at `pointer` from a JSON value.
    ///
    /// Leaves take the value directly. Any other node is rebuilt by its
    /// parent object or array from `value`. Missing parents are created
    /// empty and absent nullable parents are made present first.
    ///
    /// # Errors
    ///
    /// [`FormError::ReadOnly`] when the pointer passes through a read-only
    /// passthrough, plus any error of the owning controller.
    pub fn set(&mut self, pointer: &str, value: &Value) -> Result<(), FormError> {
        self.check_editable(pointer)?;
        if let Ok(Controller::Scalar(mut scalar)) = self.controller(pointer) {
            scalar.set_value(value.clone());
            return Ok(());
        }

        let (parent, last) = split_last(pointer);
        let Some(last) = last else {
            self.root = self.set.instantiate_root(Some(value));
            debug!("replaced document root");
            return Ok(());
        };

        if self.root.get(&parent).is_none() {
            self.set(&parent, &Value::Object(Map::new()))?;
        }

        let set = &self.set;
        let node = self.root.get_mut(&parent).ok_or_else(|| FormError::NotFound {
            path: parent.clone(),
        })?;
        let container = container_mut(set, node, true).ok_or_else(|| FormError::NotFound {
            path: pointer.to_string(),
        })?;

        match Controller::new(set, container) {
            Controller::Object(mut object) => object.set_property(&last, value),
            Controller::Array(mut array) => {
                let index = parse_index(&last, pointer)?;
                if index == array.len() {
                    array.push(Some(value)).map(|_| ())
                } else {
                    array.replace_at(index, value)
                }
            }
            other => Err(mismatch(&parent, "object", other.field_type())),
        }
    }

    /// Remove the node at `pointer` from its parent object or array, or
    /// mark a nullable node absent.
    pub fn remove(&mut self, pointer: &str) -> Result<(), FormError> {
        self.check_editable(pointer)?;
        if let Ok(Controller::Null(mut null)) = self.controller(pointer) {
            null.set_present(false);
            return Ok(());
        }

        let (parent, last) = split_last(pointer);
        let Some(last) = last else {
            return Err(FormError::NotFound {
                path: pointer.to_string(),
            });
        };

        let set = &self.set;
        let node = self.root.get_mut(&parent).ok_or_else(|| FormError::NotFound {
            path: parent.clone(),
        })?;
        let container = container_mut(set, node, false).ok_or_else(|| FormError::NotFound {
            path: pointer.to_string(),
        })?;

        match Controller::new(set, container) {
            Controller::Object(mut object) => object.remove_property(&last).map(|_| ()),
            Controller::Array(mut array) => {
                let index = parse_index(&last, pointer)?;
                array.remove_at(index).map(|_| ())
            }
            other => Err(mismatch(&parent, "object", other.field_type())),
        }
    }

    /// Select alternative `index` of the multischema at `pointer`.
    pub fn select(&mut self, pointer: &str, index: usize) -> Result<(), FormError> {
        self.multischema(pointer)?.select_alternative(index)
    }

    /// Projected output document.
    pub fn serialize(&self) -> Value {
        serialize_document(&self.root)
    }

    /// Validation report for the current tree, computed on first use after
    /// a change.
    pub fn validate(&mut self) -> &[ValidationIssue] {
        if self.report.is_none() {
            debug!("validating document");
            self.report = Some(validate_tree_with(&self.root, &self.catalog));
        }
        self.report.as_deref().unwrap_or_default()
    }

    pub fn is_valid(&mut self) -> bool {
        self.validate().is_empty()
    }

    /// Whether a validation report is cached.
    pub fn is_validated(&self) -> bool {
        self.report.is_some()
    }

    /// Form outline: one row per projected field of the live tree, in
    /// display order.
    pub fn editable_fields(&self) -> Vec<FieldInfo> {
        let mut fields = Vec::new();
        collect_fields(&self.root, "", &mut fields);
        fields
    }

    fn check_editable(&self, pointer: &str) -> Result<(), FormError> {
        match read_only_segment(&self.root, pointer) {
            Some(name) => Err(FormError::ReadOnly { name }),
            None => Ok(()),
        }
    }

    fn invalidate(&mut self) {
        if self.report.take().is_some() {
            debug!("validation report invalidated");
        }
    }
}

/// First read-only passthrough named along `pointer`.
fn read_only_segment(root: &SchemaNode, pointer: &str) -> Option<String> {
    let mut node = root;
    for segment in segments(pointer) {
        if let SchemaKind::Object(schema) = settle(node).schema().kind() {
            if schema.is_read_only(&segment) {
                return Some(segment);
            }
        }
        node = node.child(&segment)?;
    }
    None
}

/// Look through present null wrappers and selected alternatives.
fn settle(node: &SchemaNode) -> &SchemaNode {
    match node.kind() {
        NodeKind::Null(null) => null.inner().map(settle).unwrap_or(node),
        NodeKind::MultiSchema(multi) => multi.child().map(settle).unwrap_or(node),
        _ => node,
    }
}

fn collect_fields(node: &SchemaNode, pointer: &str, fields: &mut Vec<FieldInfo>) {
    match node.kind() {
        NodeKind::Object(object) => {
            let SchemaKind::Object(schema) = node.schema().kind() else {
                return;
            };
            for entry in schema.projection.entries() {
                let Some(property) = object.property(entry.name()) else {
                    continue;
                };
                let property_pointer = child(pointer, entry.name());
                fields.push(FieldInfo {
                    pointer: property_pointer.clone(),
                    output: entry.output().to_string(),
                    field_type: property.field_type().tag().to_string(),
                    editable: entry.is_editable(),
                    required: schema.required.contains(entry.name()),
                    title: property.schema().title().map(String::from),
                });
                if entry.is_editable() {
                    collect_fields(property, &property_pointer, fields);
                }
            }
        }
        NodeKind::Array(array) => {
            for (i, item) in array.items().iter().enumerate() {
                collect_fields(item, &child(pointer, &i.to_string()), fields);
            }
        }
        NodeKind::Null(null) => {
            if let Some(inner) = null.inner() {
                collect_fields(inner, pointer, fields);
            }
        }
        NodeKind::MultiSchema(multi) => {
            if let Some(selected) = multi.child() {
                collect_fields(selected, pointer, fields);
            }
        }
        NodeKind::Scalar(_) => {}
    }
}

/// The node holding the children of `node`: present null wrappers and
/// selected alternatives are looked through. With `make_present`, an absent
/// nullable is given a default value on the way.
fn container_mut<'a>(
    set: &'a SchemaSet,
    node: &'a mut SchemaNode,
    make_present: bool,
) -> Option<&'a mut SchemaNode> {
    if !matches!(node.kind, NodeKind::Null(_) | NodeKind::MultiSchema(_)) {
        return Some(node);
    }

    let SchemaNode { schema, kind } = node;
    match kind {
        NodeKind::Null(null) => {
            if make_present && !null.present {
                NullController::new(set, schema, null).set_present(true);
            }
            container_mut(set, null.inner.as_deref_mut()?, make_present)
        }
        NodeKind::MultiSchema(multi) => container_mut(set, multi.child.as_deref_mut()?, make_present),
        _ => None,
    }
}

fn mismatch(pointer: &str, expected: &'static str, actual: FieldType) -> FormError {
    FormError::KindMismatch {
        path: pointer.to_string(),
        expected,
        actual: actual.tag(),
    }
}

fn split_last(pointer: &str) -> (String, Option<String>) {
    let mut parts = segments(pointer);
    let last = parts.pop();
    let parent = parts
        .iter()
        .fold(String::new(), |parent, segment| child(&parent, segment));
    (parent, last)
}

fn parse_index(segment: &str, pointer: &str) -> Result<usize, FormError> {
    segment.parse().map_err(|_| FormError::NotFound {
        path: pointer.to_string(),
    })
}
