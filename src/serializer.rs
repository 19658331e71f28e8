//! Projection serializer - derives the output document from a live tree.
//!
//! | Node | Output |
//! |------|--------|
//! | scalar | its value; omitted when unset |
//! | null | omitted when absent, else the inner value (or `null`) |
//! | array | every item in order, `null` for an item with no value; empty arrays are kept |
//! | object | one key per projection entry whose child has a value, named by its output key, then additional children |
//! | multischema | the selected subtree; omitted when unselected |

use serde_json::{Map, Value};

use crate::node::{NodeKind, SchemaNode};
use crate::schema::SchemaKind;

/// Serialize `node`, or `None` when it has nothing to emit.
pub fn serialize(node: &SchemaNode) -> Option<Value> {
    match node.kind() {
        NodeKind::Scalar(scalar) => scalar.value().cloned(),
        NodeKind::Null(null) => {
            if !null.is_present() {
                return None;
            }
            match null.inner() {
                Some(inner) => serialize(inner),
                None => Some(Value::Null),
            }
        }
        NodeKind::Array(array) => Some(Value::Array(
            array.items().iter().map(serialize_item).collect(),
        )),
        NodeKind::Object(object) => {
            let mut out = Map::new();
            let declared = match node.schema().kind() {
                SchemaKind::Object(schema) => Some(schema),
                _ => None,
            };

            if let Some(schema) = declared {
                for entry in schema.projection.entries() {
                    let value = object.property(entry.name()).and_then(serialize);
                    if let Some(value) = value {
                        out.insert(entry.output().to_string(), value);
                    }
                }
            }

            // Additional children are emitted under their own key.
            for (name, child) in object.properties() {
                let is_known = declared
                    .map(|s| s.is_declared(name) || s.projection.entry(name).is_some())
                    .unwrap_or(false);
                if is_known || out.contains_key(name) {
                    continue;
                }
                if let Some(value) = serialize(child) {
                    out.insert(name.to_string(), value);
                }
            }
            Some(Value::Object(out))
        }
        NodeKind::MultiSchema(multi) => multi.child().and_then(serialize),
    }
}

/// Serialize an array element. Items keep their position, so an element
/// with nothing to emit becomes `null`.
pub(crate) fn serialize_item(item: &SchemaNode) -> Value {
    serialize(item).unwrap_or(Value::Null)
}

/// Serialize a document root; a root with nothing to emit becomes `null`.
pub fn serialize_document(root: &SchemaNode) -> Value {
    serialize(root).unwrap_or(Value::Null)
}
