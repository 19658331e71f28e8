//! Choice between composition alternatives.

use tracing::debug;

use crate::error::FormError;
use crate::node::{MultiSchemaNode, SchemaNode};
use crate::schema::{SchemaKind, SchemaRef, SchemaSet};
use crate::types::Composition;

#[derive(Debug)]
pub struct MultiSchemaController<'a> {
    set: &'a SchemaSet,
    schema: &'a SchemaRef,
    multi: &'a mut MultiSchemaNode,
}

impl<'a> MultiSchemaController<'a> {
    pub(crate) fn new(
        set: &'a SchemaSet,
        schema: &'a SchemaRef,
        multi: &'a mut MultiSchemaNode,
    ) -> Self {
        Self { set, schema, multi }
    }

    pub fn alternatives(&self) -> &'a [SchemaRef] {
        match self.schema.kind() {
            SchemaKind::MultiSchema(multi) => &multi.alternatives,
            _ => &[],
        }
    }

    pub fn composition(&self) -> Option<Composition> {
        match self.schema.kind() {
            SchemaKind::MultiSchema(multi) => Some(multi.composition),
            _ => None,
        }
    }

    /// Index of the active alternative; `None` until one is selected.
    pub fn current_selection(&self) -> Option<usize> {
        self.multi.selected
    }

    /// Alternative a form should offer first: the first in declaration
    /// order. Does not select it.
    pub fn default_alternative(&self) -> Option<usize> {
        (!self.alternatives().is_empty()).then_some(0)
    }

    pub fn selected_child(&self) -> Option<&SchemaNode> {
        self.multi.child.as_deref()
    }

    pub fn selected_child_mut(&mut self) -> Option<&mut SchemaNode> {
        self.multi.child.as_deref_mut()
    }

    /// Switch to alternative `index`.
    ///
    /// The previous subtree is discarded and a fresh one is built from the
    /// alternative's template; nothing carries over, even when `index` is
    /// already selected.
    ///
    /// # Errors
    ///
    /// [`FormError::Index`] when `index` is outside the alternatives.
    pub fn select_alternative(&mut self, index: usize) -> Result<(), FormError> {
        let alternatives = self.alternatives();
        let Some(template) = alternatives.get(index) else {
            return Err(FormError::Index {
                index,
                len: alternatives.len(),
            });
        };

        let child = self.set.instantiate(template, None);
        self.multi.child = Some(Box::new(child));
        self.multi.selected = Some(index);
        debug!(pointer = self.schema.pointer(), index, "selected alternative");
        Ok(())
    }

    /// Drop the selection; the node is omitted from output.
    pub fn clear_selection(&mut self) {
        self.multi.child = None;
        self.multi.selected = None;
        debug!(pointer = self.schema.pointer(), "cleared selection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::serializer::serialize;
    use serde_json::{json, Value};

    fn name_or_id() -> Value {
        json!({
            "oneOf": [
                { "type": "object", "properties": { "name": { "type": "string" } } },
                { "type": "object", "properties": { "id": { "type": "integer" } } }
            ]
        })
    }

    #[test]
    fn switching_discards_previous_subtree() {
        let set = SchemaSet::compile_default(&name_or_id()).unwrap();
        let mut root = set.instantiate_root(None);

        {
            let Controller::MultiSchema(mut multi) = Controller::new(&set, &mut root) else {
                panic!("expected multischema controller");
            };
            assert_eq!(multi.current_selection(), None);
            assert_eq!(multi.default_alternative(), Some(0));
            assert_eq!(multi.current_selection(), None);
            multi.select_alternative(0).unwrap();
        }

        let name = root.get_mut("/name").unwrap();
        let Controller::Scalar(mut scalar) = Controller::new(&set, name) else {
            panic!("expected scalar controller");
        };
        scalar.set_value(json!("x"));
        assert_eq!(serialize(&root), Some(json!({"name": "x"})));

        let Controller::MultiSchema(mut multi) = Controller::new(&set, &mut root) else {
            panic!("expected multischema controller");
        };
        multi.select_alternative(1).unwrap();
        assert_eq!(multi.current_selection(), Some(1));

        let child = multi.selected_child().unwrap();
        assert!(child.get("/name").is_none());
        assert!(child.get("/id").unwrap().value().is_none());
        assert_eq!(serialize(&root), Some(json!({})));
    }

    #[test]
    fn reselecting_rebuilds() {
        let set = SchemaSet::compile_default(&name_or_id()).unwrap();
        let mut root = set.instantiate_root(Some(&json!({"name": "kept?"})));
        let Controller::MultiSchema(mut multi) = Controller::new(&set, &mut root) else {
            panic!("expected multischema controller");
        };
        assert_eq!(multi.current_selection(), Some(0));
        multi.select_alternative(0).unwrap();
        assert!(multi.selected_child().unwrap().get("/name").unwrap().value().is_none());
    }

    #[test]
    fn out_of_range_selection_is_rejected() {
        let set = SchemaSet::compile_default(&name_or_id()).unwrap();
        let mut root = set.instantiate_root(None);
        let Controller::MultiSchema(mut multi) = Controller::new(&set, &mut root) else {
            panic!("expected multischema controller");
        };
        assert_eq!(
            multi.select_alternative(2).unwrap_err(),
            FormError::Index { index: 2, len: 2 }
        );
        assert_eq!(multi.current_selection(), None);
        assert_eq!(multi.composition(), Some(Composition::OneOf));
    }

    #[test]
    fn unselected_is_omitted() {
        let set = SchemaSet::compile_default(&name_or_id()).unwrap();
        let mut root = set.instantiate_root(None);
        assert_eq!(serialize(&root), None);

        let Controller::MultiSchema(mut multi) = Controller::new(&set, &mut root) else {
            panic!("expected multischema controller");
        };
        multi.select_alternative(1).unwrap();
        multi.clear_selection();
        assert_eq!(serialize(&root), None);
    }
}
