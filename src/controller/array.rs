//! Ordered, resizable sequences.

use serde_json::Value;
use tracing::debug;

use crate::error::FormError;
use crate::node::{ArrayNode, SchemaNode};
use crate::schema::{SchemaRef, SchemaSet};

#[derive(Debug)]
pub struct ArrayController<'a> {
    set: &'a SchemaSet,
    schema: &'a SchemaRef,
    array: &'a mut ArrayNode,
}

impl<'a> ArrayController<'a> {
    pub(crate) fn new(set: &'a SchemaSet, schema: &'a SchemaRef, array: &'a mut ArrayNode) -> Self {
        Self { set, schema, array }
    }

    pub fn len(&self) -> usize {
        self.array.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.items.is_empty()
    }

    pub fn items(&self) -> &[SchemaNode] {
        &self.array.items
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut SchemaNode> {
        self.array.items.get_mut(index)
    }

    pub fn item_template(&self) -> &SchemaRef {
        &self.array.item_template
    }

    fn min_items(&self) -> Option<usize> {
        self.schema.constraints().min_items.map(|n| n as usize)
    }

    fn max_items(&self) -> Option<usize> {
        self.schema.constraints().max_items.map(|n| n as usize)
    }

    /// Insert a fresh item built from the item template, optionally seeded
    /// with `initial`.
    ///
    /// `index` is clamped to `0..=len`. Returns the position the item was
    /// inserted at.
    ///
    /// # Errors
    ///
    /// [`FormError::Capacity`] when the array already holds `maxItems`.
    pub fn insert_at(&mut self, index: usize, initial: Option<&Value>) -> Result<usize, FormError> {
        let len = self.len();
        if let Some(max) = self.max_items() {
            if len >= max {
                return Err(FormError::Capacity {
                    rule: "maxItems",
                    limit: max,
                });
            }
        }

        let index = index.min(len);
        let item = self.set.instantiate(&self.array.item_template, initial);
        self.array.items.insert(index, item);
        debug!(pointer = self.schema.pointer(), index, "inserted item");
        Ok(index)
    }

    /// Append a fresh item.
    pub fn push(&mut self, initial: Option<&Value>) -> Result<usize, FormError> {
        self.insert_at(self.len(), initial)
    }

    /// Remove and return the item at `index`.
    ///
    /// # Errors
    ///
    /// [`FormError::Index`] when `index` is out of range,
    /// [`FormError::Capacity`] when the array holds no more than `minItems`.
    pub fn remove_at(&mut self, index: usize) -> Result<SchemaNode, FormError> {
        let len = self.len();
        if index >= len {
            return Err(FormError::Index { index, len });
        }
        if let Some(min) = self.min_items() {
            if len <= min {
                return Err(FormError::Capacity {
                    rule: "minItems",
                    limit: min,
                });
            }
        }

        let removed = self.array.items.remove(index);
        debug!(pointer = self.schema.pointer(), index, "removed item");
        Ok(removed)
    }

    /// Rebuild the item at `index` from `value`.
    pub fn replace_at(&mut self, index: usize, value: &Value) -> Result<(), FormError> {
        let len = self.len();
        if index >= len {
            return Err(FormError::Index { index, len });
        }
        let item = self.set.instantiate(&self.array.item_template, Some(value));
        self.array.items[index] = item;
        debug!(pointer = self.schema.pointer(), index, "replaced item");
        Ok(())
    }

    /// Move the item at `from` so it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), FormError> {
        let len = self.len();
        for index in [from, to] {
            if index >= len {
                return Err(FormError::Index { index, len });
            }
        }

        let item = self.array.items.remove(from);
        self.array.items.insert(to, item);
        debug!(pointer = self.schema.pointer(), from, to, "moved item");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::serializer::serialize_item;
    use serde_json::json;

    fn with_array<F>(schema: Value, seed: Option<Value>, f: F)
    where
        F: FnOnce(ArrayController<'_>),
    {
        let set = SchemaSet::compile_default(&schema).unwrap();
        let mut root = set.instantiate_root(seed.as_ref());
        match Controller::new(&set, &mut root) {
            Controller::Array(array) => f(array),
            other => panic!("expected array controller, got {:?}", other.field_type()),
        }
    }

    fn values(array: &ArrayController<'_>) -> Vec<Value> {
        array.items().iter().map(serialize_item).collect()
    }

    #[test]
    fn min_items_scenario() {
        let schema = json!({"type": "array", "minItems": 1, "items": {"type": "string"}});
        with_array(schema, Some(json!(["a"])), |mut array| {
            assert_eq!(
                array.remove_at(0).unwrap_err(),
                FormError::Capacity {
                    rule: "minItems",
                    limit: 1
                }
            );
            assert_eq!(array.insert_at(1, Some(&json!("b"))).unwrap(), 1);
            assert_eq!(values(&array), [json!("a"), json!("b")]);
            array.move_item(0, 1).unwrap();
            assert_eq!(values(&array), [json!("b"), json!("a")]);
        });
    }

    #[test]
    fn max_items_leaves_length_unchanged() {
        let schema = json!({"type": "array", "maxItems": 2, "items": {"type": "integer"}});
        with_array(schema, Some(json!([1, 2])), |mut array| {
            let err = array.push(Some(&json!(3))).unwrap_err();
            assert_eq!(
                err,
                FormError::Capacity {
                    rule: "maxItems",
                    limit: 2
                }
            );
            assert_eq!(array.len(), 2);
        });
    }

    #[test]
    fn insert_then_remove_restores_sequence() {
        let schema = json!({"type": "array", "items": {"type": "string"}});
        with_array(schema, Some(json!(["x", "y"])), |mut array| {
            let before = values(&array);
            let at = array.insert_at(1, Some(&json!("z"))).unwrap();
            assert_eq!(array.len(), 3);
            array.remove_at(at).unwrap();
            assert_eq!(values(&array), before);
        });
    }

    #[test]
    fn insert_index_is_clamped() {
        let schema = json!({"type": "array", "items": {"type": "string"}});
        with_array(schema, Some(json!(["x"])), |mut array| {
            assert_eq!(array.insert_at(99, Some(&json!("y"))).unwrap(), 1);
            assert_eq!(values(&array), [json!("x"), json!("y")]);
        });
    }

    #[test]
    fn inserted_items_come_from_template() {
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "url": { "type": "string" }, "description": { "type": "string" } }
            }
        });
        with_array(schema, Some(json!([{"url": "https://a"}])), |mut array| {
            array.push(None).unwrap();
            let fresh = &array.items()[1];
            assert!(fresh.get("/url").unwrap().value().is_none());
            assert!(fresh.get("/description").is_some());
        });
    }

    #[test]
    fn out_of_range_is_rejected() {
        let schema = json!({"type": "array", "items": {"type": "string"}});
        with_array(schema, Some(json!(["x"])), |mut array| {
            assert_eq!(
                array.remove_at(1).unwrap_err(),
                FormError::Index { index: 1, len: 1 }
            );
            assert_eq!(
                array.move_item(0, 3).unwrap_err(),
                FormError::Index { index: 3, len: 1 }
            );
            assert_eq!(array.len(), 1);
        });
    }
}
