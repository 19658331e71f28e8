//! Field controllers - the only code that mutates a live tree.
//!
//! [`Controller::new`] dispatches a node to the controller for its field
//! type. The match is exhaustive over [`NodeKind`], so a new field type
//! cannot be added without a controller.
//!
//! Every operation either fully succeeds or returns a [`FormError`] and
//! leaves the tree unchanged.
//!
//! [`FormError`]: crate::error::FormError

mod array;
mod multischema;
mod null;
mod object;

pub use array::ArrayController;
pub use multischema::MultiSchemaController;
pub use null::{NullController, PresenceChange};
pub use object::ObjectController;

use serde_json::Value;
use tracing::debug;

use crate::node::{NodeKind, ScalarNode, SchemaNode};
use crate::schema::{SchemaRef, SchemaSet};
use crate::types::{FieldType, ScalarKind};

/// Handle to the controller owning one node.
#[derive(Debug)]
pub enum Controller<'a> {
    Scalar(ScalarController<'a>),
    Null(NullController<'a>),
    Array(ArrayController<'a>),
    Object(ObjectController<'a>),
    MultiSchema(MultiSchemaController<'a>),
}

impl<'a> Controller<'a> {
    /// Dispatch `node` to its controller. `set` supplies templates for
    /// nodes the controller creates.
    pub fn new(set: &'a SchemaSet, node: &'a mut SchemaNode) -> Self {
        let SchemaNode { schema, kind } = node;
        let schema: &'a SchemaRef = schema;
        match kind {
            NodeKind::Scalar(scalar) => Controller::Scalar(ScalarController { schema, scalar }),
            NodeKind::Null(null) => Controller::Null(NullController::new(set, schema, null)),
            NodeKind::Array(array) => Controller::Array(ArrayController::new(set, schema, array)),
            NodeKind::Object(object) => {
                Controller::Object(ObjectController::new(set, schema, object))
            }
            NodeKind::MultiSchema(multi) => {
                Controller::MultiSchema(MultiSchemaController::new(set, schema, multi))
            }
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Controller::Scalar(c) => FieldType::Scalar(c.kind()),
            Controller::Null(_) => FieldType::Null,
            Controller::Array(_) => FieldType::Array,
            Controller::Object(_) => FieldType::Object,
            Controller::MultiSchema(_) => FieldType::MultiSchema,
        }
    }
}

/// Leaf value editor.
#[derive(Debug)]
pub struct ScalarController<'a> {
    schema: &'a SchemaRef,
    scalar: &'a mut ScalarNode,
}

impl<'a> ScalarController<'a> {
    pub fn kind(&self) -> ScalarKind {
        self.scalar.kind
    }

    pub fn value(&self) -> Option<&Value> {
        self.scalar.value.as_ref()
    }

    /// Store `value`. Type mismatches are reported by validation, not
    /// rejected here.
    pub fn set_value(&mut self, value: Value) {
        debug!(pointer = self.schema.pointer(), %value, "set value");
        self.scalar.value = Some(value);
    }

    /// Unset the leaf so it is omitted from output.
    pub fn clear(&mut self) -> Option<Value> {
        debug!(pointer = self.schema.pointer(), "clear value");
        self.scalar.value.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatch_follows_node_kind() {
        let set = SchemaSet::compile_default(&json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "tags": { "type": "array" },
                "kind": { "oneOf": [{ "type": "string" }] },
                "note": { "type": ["string", "null"] }
            }
        }))
        .unwrap();
        let mut root = set.instantiate_root(None);

        let expected = [
            ("", FieldType::Object),
            ("/name", FieldType::Scalar(ScalarKind::String)),
            ("/tags", FieldType::Array),
            ("/kind", FieldType::MultiSchema),
            ("/note", FieldType::Null),
        ];
        for (pointer, field_type) in expected {
            let node = root.get_mut(pointer).unwrap();
            assert_eq!(Controller::new(&set, node).field_type(), field_type);
        }
    }

    #[test]
    fn scalar_set_and_clear() {
        let set = SchemaSet::compile_default(&json!({"type": "string"})).unwrap();
        let mut root = set.instantiate_root(None);

        let Controller::Scalar(mut scalar) = Controller::new(&set, &mut root) else {
            panic!("expected scalar controller");
        };
        assert_eq!(scalar.value(), None);
        scalar.set_value(json!("hello"));
        assert_eq!(scalar.value(), Some(&json!("hello")));
        assert_eq!(scalar.clear(), Some(json!("hello")));
        assert_eq!(scalar.value(), None);
    }
}
