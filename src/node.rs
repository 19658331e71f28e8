//! Live document tree.
//!
//! A [`SchemaNode`] pairs a compiled template with its current editing
//! state. Nodes are created by [`SchemaSet::instantiate`] and afterwards
//! mutated only through the controllers in [`crate::controller`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::pointer::{child, segments};
use crate::schema::{AdditionalProperties, ObjectSchema, Schema, SchemaKind, SchemaRef, SchemaSet};
use crate::types::{json_type_name, FieldType, ScalarKind};

/// One point in the edited document.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub(crate) schema: SchemaRef,
    pub(crate) kind: NodeKind,
}

/// Editing state, one variant per field type.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Scalar(ScalarNode),
    Null(NullNode),
    Array(ArrayNode),
    Object(ObjectNode),
    MultiSchema(MultiSchemaNode),
}

#[derive(Debug, Clone)]
pub struct ScalarNode {
    pub(crate) kind: ScalarKind,
    pub(crate) value: Option<Value>,
}

/// A value that may be absent.
///
/// `inner` is only populated while `present`; a present wrapper without an
/// inner node holds JSON `null`.
#[derive(Debug, Clone)]
pub struct NullNode {
    pub(crate) present: bool,
    pub(crate) inner: Option<Box<SchemaNode>>,
}

#[derive(Debug, Clone)]
pub struct ArrayNode {
    pub(crate) item_template: SchemaRef,
    pub(crate) items: Vec<SchemaNode>,
}

/// Named children in insertion order. Undeclared (additional) children
/// follow the declared ones.
#[derive(Debug, Clone, Default)]
pub struct ObjectNode {
    pub(crate) properties: Vec<(String, SchemaNode)>,
}

#[derive(Debug, Clone, Default)]
pub struct MultiSchemaNode {
    pub(crate) selected: Option<usize>,
    pub(crate) child: Option<Box<SchemaNode>>,
}

impl SchemaNode {
    /// An untyped leaf holding `value`.
    pub(crate) fn any(pointer: &str, value: Option<Value>) -> Self {
        Self {
            schema: Arc::new(Schema::any(pointer)),
            kind: NodeKind::Scalar(ScalarNode {
                kind: ScalarKind::Any,
                value,
            }),
        }
    }

    /// The resolved template this node was built from.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn field_type(&self) -> FieldType {
        match &self.kind {
            NodeKind::Scalar(scalar) => FieldType::Scalar(scalar.kind),
            NodeKind::Null(_) => FieldType::Null,
            NodeKind::Array(_) => FieldType::Array,
            NodeKind::Object(_) => FieldType::Object,
            NodeKind::MultiSchema(_) => FieldType::MultiSchema,
        }
    }

    /// Whether the node currently holds something the serializer would
    /// emit.
    pub fn has_value(&self) -> bool {
        match &self.kind {
            NodeKind::Scalar(scalar) => scalar.value.is_some(),
            NodeKind::Null(null) => null.present,
            NodeKind::Array(_) | NodeKind::Object(_) => true,
            NodeKind::MultiSchema(multi) => multi
                .child
                .as_deref()
                .map(SchemaNode::has_value)
                .unwrap_or(false),
        }
    }

    /// Scalar value, if this is a set scalar leaf.
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Scalar(scalar) => scalar.value.as_ref(),
            _ => None,
        }
    }

    /// Navigate by JSON Pointer over internal names.
    ///
    /// Multischema nodes and present null wrappers are transparent: a
    /// segment below them addresses their selected or inner node.
    pub fn get(&self, pointer: &str) -> Option<&SchemaNode> {
        let mut node = self;
        for segment in segments(pointer) {
            node = node.child(&segment)?;
        }
        Some(node)
    }

    pub fn get_mut(&mut self, pointer: &str) -> Option<&mut SchemaNode> {
        let mut node = self;
        for segment in segments(pointer) {
            node = node.child_mut(&segment)?;
        }
        Some(node)
    }

    pub(crate) fn child(&self, segment: &str) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::MultiSchema(multi) => multi.child.as_deref()?.child(segment),
            NodeKind::Null(null) => null.inner.as_deref()?.child(segment),
            NodeKind::Object(object) => object.property(segment),
            NodeKind::Array(array) => array.items.get(segment.parse::<usize>().ok()?),
            NodeKind::Scalar(_) => None,
        }
    }

    fn child_mut(&mut self, segment: &str) -> Option<&mut SchemaNode> {
        match &mut self.kind {
            NodeKind::MultiSchema(multi) => multi.child.as_deref_mut()?.child_mut(segment),
            NodeKind::Null(null) => null.inner.as_deref_mut()?.child_mut(segment),
            NodeKind::Object(object) => object
                .properties
                .iter_mut()
                .find(|(name, _)| name == segment)
                .map(|(_, node)| node),
            NodeKind::Array(array) => array.items.get_mut(segment.parse::<usize>().ok()?),
            NodeKind::Scalar(_) => None,
        }
    }
}

impl ScalarNode {
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

impl NullNode {
    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn inner(&self) -> Option<&SchemaNode> {
        self.inner.as_deref()
    }
}

impl ArrayNode {
    pub fn item_template(&self) -> &SchemaRef {
        &self.item_template
    }

    pub fn items(&self) -> &[SchemaNode] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ObjectNode {
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(name, _)| name.as_str())
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.properties.iter().map(|(name, node)| (name.as_str(), node))
    }
}

impl MultiSchemaNode {
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn child(&self) -> Option<&SchemaNode> {
        self.child.as_deref()
    }
}

impl SchemaSet {
    /// Instantiate the root template.
    pub fn instantiate_root(&self, seed: Option<&Value>) -> SchemaNode {
        self.instantiate(self.root(), seed)
    }

    /// Build a live node from a template.
    ///
    /// Without a seed the node starts fresh: scalars unset or at their
    /// `default`, null wrappers absent, arrays with `minItems` items,
    /// objects with every declared property, multischema unselected.
    ///
    /// With a seed, object keys are matched by output name first and
    /// internal name second, and a multischema selects the first
    /// alternative the value fits.
    pub fn instantiate(&self, schema: &SchemaRef, seed: Option<&Value>) -> SchemaNode {
        let mut stack = Vec::new();
        self.build(schema, seed, &mut stack)
    }

    fn build(
        &self,
        schema: &SchemaRef,
        seed: Option<&Value>,
        stack: &mut Vec<SchemaRef>,
    ) -> SchemaNode {
        let schema = self.resolve(schema).clone();
        let seed = seed.or(schema.default_value());
        stack.push(schema.clone());

        let kind = match schema.kind() {
            SchemaKind::Scalar(kind) => NodeKind::Scalar(ScalarNode {
                kind: *kind,
                value: seed.cloned(),
            }),
            SchemaKind::Null(underlying) => {
                let (present, inner) = match (seed, underlying) {
                    (None, _) => (false, None),
                    (Some(Value::Null), _) | (Some(_), None) => (true, None),
                    (Some(value), Some(underlying)) => (
                        true,
                        Some(Box::new(self.build(underlying, Some(value), stack))),
                    ),
                };
                NodeKind::Null(NullNode { present, inner })
            }
            SchemaKind::Array(items) => {
                let nodes = match seed {
                    Some(Value::Array(values)) => values
                        .iter()
                        .map(|value| self.build(items, Some(value), stack))
                        .collect(),
                    other => {
                        if let Some(value) = other {
                            warn!(
                                pointer = schema.pointer(),
                                "expected array, got {}; starting empty",
                                json_type_name(value)
                            );
                        }
                        let count = schema.constraints().min_items.unwrap_or(0) as usize;
                        if count > 0 && self.on_stack(items, stack) {
                            Vec::new()
                        } else {
                            (0..count).map(|_| self.build(items, None, stack)).collect()
                        }
                    }
                };
                NodeKind::Array(ArrayNode {
                    item_template: items.clone(),
                    items: nodes,
                })
            }
            SchemaKind::Object(object) => {
                let mut properties = Vec::new();
                match seed {
                    Some(Value::Object(map)) => {
                        for (name, prop) in &object.properties {
                            if let Some(value) = object.seed_value(map, name) {
                                properties.push((name.clone(), self.build(prop, Some(value), stack)));
                            }
                        }
                        for (key, value) in map {
                            if let Some(name) = object.internal_key(key) {
                                // Projected names without a declared property are
                                // kept under their internal name.
                                let taken = properties.iter().any(|(n, _)| n == name);
                                if object.is_projected_only(name) && !taken {
                                    let node = self.build_additional(object, schema.pointer(), name, value, stack);
                                    properties.push((name.to_string(), node));
                                }
                                continue;
                            }
                            match &object.additional {
                                AdditionalProperties::Closed => {
                                    warn!(
                                        pointer = schema.pointer(),
                                        %key,
                                        "dropping undeclared property of closed object"
                                    );
                                }
                                AdditionalProperties::Open(_) => {
                                    let node = self.build_additional(object, schema.pointer(), key, value, stack);
                                    properties.push((key.clone(), node));
                                }
                            }
                        }
                    }
                    other => {
                        if let Some(value) = other {
                            warn!(
                                pointer = schema.pointer(),
                                "expected object, got {}; starting fresh",
                                json_type_name(value)
                            );
                        }
                        for (name, prop) in &object.properties {
                            if self.on_stack(prop, stack) {
                                debug!(pointer = schema.pointer(), property = %name, "leaving recursive property absent");
                                continue;
                            }
                            properties.push((name.clone(), self.build(prop, None, stack)));
                        }
                    }
                }
                NodeKind::Object(ObjectNode { properties })
            }
            SchemaKind::MultiSchema(multi) => match seed {
                None => NodeKind::MultiSchema(MultiSchemaNode::default()),
                Some(value) => {
                    let fits = |strict| {
                        multi
                            .alternatives
                            .iter()
                            .position(|alt| self.accepts(alt, value, strict))
                    };
                    match fits(true).or_else(|| fits(false)) {
                        Some(index) => NodeKind::MultiSchema(MultiSchemaNode {
                            selected: Some(index),
                            child: Some(Box::new(self.build(
                                &multi.alternatives[index],
                                Some(value),
                                stack,
                            ))),
                        }),
                        None => {
                            warn!(
                                pointer = schema.pointer(),
                                "value matches no alternative; leaving unselected"
                            );
                            NodeKind::MultiSchema(MultiSchemaNode::default())
                        }
                    }
                }
            },
            // Compilation rejects references that never resolve.
            SchemaKind::Ref(_) => NodeKind::Scalar(ScalarNode {
                kind: ScalarKind::Any,
                value: seed.cloned(),
            }),
        };

        stack.pop();
        SchemaNode { schema, kind }
    }

    /// Child for a name without a declared property: typed by
    /// `additionalProperties` when it is a schema, otherwise an untyped leaf.
    fn build_additional(
        &self,
        object: &ObjectSchema,
        parent: &str,
        name: &str,
        value: &Value,
        stack: &mut Vec<SchemaRef>,
    ) -> SchemaNode {
        match &object.additional {
            AdditionalProperties::Open(Some(additional)) => self.build(additional, Some(value), stack),
            _ => SchemaNode::any(&child(parent, name), Some(value.clone())),
        }
    }

    fn on_stack(&self, schema: &SchemaRef, stack: &[SchemaRef]) -> bool {
        let target = self.resolve(schema);
        stack.iter().any(|open| Arc::ptr_eq(open, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(schema: Value) -> SchemaSet {
        SchemaSet::compile_default(&schema).unwrap()
    }

    fn object_names(node: &SchemaNode) -> Vec<String> {
        match node.kind() {
            NodeKind::Object(object) => object.names().map(String::from).collect(),
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn fresh_object_has_every_declared_property() {
        let set = set(json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "count": { "type": "integer", "default": 3 }
            }
        }));
        let root = set.instantiate_root(None);
        assert_eq!(object_names(&root), ["title", "count"]);
        assert_eq!(root.get("/title").unwrap().value(), None);
        assert_eq!(root.get("/count").unwrap().value(), Some(&json!(3)));
    }

    #[test]
    fn fresh_array_holds_min_items() {
        let set = set(json!({"type": "array", "minItems": 2, "items": {"type": "string"}}));
        let root = set.instantiate_root(None);
        let NodeKind::Array(array) = root.kind() else {
            panic!("expected array");
        };
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn fresh_nullable_is_absent() {
        let set = set(json!({"type": ["string", "null"]}));
        let root = set.instantiate_root(None);
        assert!(matches!(root.kind(), NodeKind::Null(n) if !n.is_present()));
        assert!(!root.has_value());
    }

    #[test]
    fn seed_reads_output_names() {
        let set = set(json!({
            "type": "object",
            "properties": {
                "logo": {
                    "type": "object",
                    "x-output": "x-logo",
                    "properties": { "url": { "type": "string" } }
                }
            }
        }));
        let root = set.instantiate_root(Some(&json!({"x-logo": {"url": "https://a"}})));
        assert_eq!(
            root.get("/logo/url").unwrap().value(),
            Some(&json!("https://a"))
        );
    }

    #[test]
    fn seed_falls_back_to_internal_name() {
        let set = set(json!({
            "type": "object",
            "properties": { "logo": { "type": "string", "x-output": "x-logo" } }
        }));
        let root = set.instantiate_root(Some(&json!({"logo": "l.png"})));
        assert_eq!(root.get("/logo").unwrap().value(), Some(&json!("l.png")));
    }

    #[test]
    fn seeded_object_keeps_only_seeded_properties() {
        let set = set(json!({
            "type": "object",
            "properties": { "a": { "type": "string" }, "b": { "type": "string" } }
        }));
        let root = set.instantiate_root(Some(&json!({"b": "x"})));
        assert_eq!(object_names(&root), ["b"]);
    }

    #[test]
    fn undeclared_keys_follow_openness() {
        let open = set(json!({"type": "object", "properties": {}}));
        let root = open.instantiate_root(Some(&json!({"extra": 1})));
        assert_eq!(root.get("/extra").unwrap().value(), Some(&json!(1)));

        let closed = set(json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {}
        }));
        let root = closed.instantiate_root(Some(&json!({"extra": 1})));
        assert!(root.get("/extra").is_none());
    }

    #[test]
    fn typed_additional_properties() {
        let set = set(json!({
            "type": "object",
            "additionalProperties": { "type": "array", "items": { "type": "string" } }
        }));
        let root = set.instantiate_root(Some(&json!({"tags": ["a", "b"]})));
        assert_eq!(root.get("/tags").unwrap().field_type(), FieldType::Array);
        assert_eq!(root.get("/tags/1").unwrap().value(), Some(&json!("b")));
    }

    #[test]
    fn multischema_seed_selects_fitting_alternative() {
        let set = set(json!({
            "oneOf": [
                { "type": "object", "properties": { "name": { "type": "string" } } },
                { "type": "object", "properties": { "id": { "type": "integer" } } }
            ]
        }));
        let root = set.instantiate_root(Some(&json!({"id": 7})));
        let NodeKind::MultiSchema(multi) = root.kind() else {
            panic!("expected multischema");
        };
        assert_eq!(multi.selected(), Some(1));
        assert_eq!(root.get("/id").unwrap().value(), Some(&json!(7)));
    }

    #[test]
    fn fresh_multischema_is_unselected() {
        let set = set(json!({"anyOf": [{ "type": "string" }, { "type": "integer" }]}));
        let root = set.instantiate_root(None);
        assert!(matches!(root.kind(), NodeKind::MultiSchema(m) if m.selected().is_none()));
        assert!(!root.has_value());
    }

    #[test]
    fn recursive_property_left_absent() {
        let set = set(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "parent": { "$ref": "#" }
            }
        }));
        let root = set.instantiate_root(None);
        assert_eq!(object_names(&root), ["name"]);

        let seeded = set.instantiate_root(Some(&json!({"parent": {"name": "p"}})));
        assert_eq!(
            seeded.get("/parent/name").unwrap().value(),
            Some(&json!("p"))
        );
    }

    #[test]
    fn pointer_passes_through_null_wrapper() {
        let set = set(json!({
            "type": "object",
            "properties": {
                "contact": {
                    "type": ["object", "null"],
                    "properties": { "email": { "type": "string" } }
                }
            }
        }));
        let root = set.instantiate_root(Some(&json!({"contact": {"email": "a@b.c"}})));
        assert_eq!(root.get("/contact").unwrap().field_type(), FieldType::Null);
        assert_eq!(
            root.get("/contact/email").unwrap().value(),
            Some(&json!("a@b.c"))
        );
    }

    #[test]
    fn pointer_segments_are_unescaped() {
        let set = set(json!({"type": "object"}));
        let root = set.instantiate_root(Some(&json!({"/pets": {"get": true}})));
        assert!(root.get("/~1pets").is_some());
        assert!(root.get("/missing").is_none());
    }
}
