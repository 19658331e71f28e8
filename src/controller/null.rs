//! Presence toggle for nullable fields.

use tracing::debug;

use crate::node::{NodeKind, NullNode, SchemaNode};
use crate::schema::{SchemaKind, SchemaRef, SchemaSet};

/// Effect of [`NullController::set_present`], for the parent to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    /// A default value was created for the underlying type.
    Created,
    /// The value was discarded; the field is omitted from output.
    Removed,
    Unchanged,
}

#[derive(Debug)]
pub struct NullController<'a> {
    set: &'a SchemaSet,
    schema: &'a SchemaRef,
    null: &'a mut NullNode,
}

impl<'a> NullController<'a> {
    pub(crate) fn new(set: &'a SchemaSet, schema: &'a SchemaRef, null: &'a mut NullNode) -> Self {
        Self { set, schema, null }
    }

    pub fn is_present(&self) -> bool {
        self.null.present
    }

    /// Template of the wrapped value; `None` for the pure `null` type.
    pub fn underlying(&self) -> Option<&'a SchemaRef> {
        match self.schema.kind() {
            SchemaKind::Null(underlying) => underlying.as_ref(),
            _ => None,
        }
    }

    pub fn inner(&self) -> Option<&SchemaNode> {
        self.null.inner.as_deref()
    }

    pub fn inner_mut(&mut self) -> Option<&mut SchemaNode> {
        self.null.inner.as_deref_mut()
    }

    /// Toggle presence.
    ///
    /// Becoming present creates a default value for the underlying type;
    /// becoming absent discards the current value.
    pub fn set_present(&mut self, present: bool) -> PresenceChange {
        if present == self.null.present {
            return PresenceChange::Unchanged;
        }

        if present {
            self.null.inner = self
                .underlying()
                .map(|underlying| Box::new(default_node(self.set, underlying)));
            self.null.present = true;
            debug!(pointer = self.schema.pointer(), "null field present");
            PresenceChange::Created
        } else {
            self.null.inner = None;
            self.null.present = false;
            debug!(pointer = self.schema.pointer(), "null field removed");
            PresenceChange::Removed
        }
    }
}

/// Fresh node whose leaves start at their kind's default instead of unset.
fn default_node(set: &SchemaSet, schema: &SchemaRef) -> SchemaNode {
    let mut node = set.instantiate(schema, None);
    if let NodeKind::Scalar(scalar) = &mut node.kind {
        if scalar.value.is_none() {
            scalar.value = Some(scalar.kind.default_value());
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use serde_json::json;

    fn with_null<F>(schema: serde_json::Value, f: F)
    where
        F: FnOnce(NullController<'_>),
    {
        let set = SchemaSet::compile_default(&schema).unwrap();
        let mut root = set.instantiate_root(None);
        match Controller::new(&set, &mut root) {
            Controller::Null(null) => f(null),
            other => panic!("expected null controller, got {:?}", other.field_type()),
        }
    }

    #[test]
    fn present_creates_scalar_default() {
        with_null(json!({"type": ["integer", "null"]}), |mut null| {
            assert!(!null.is_present());
            assert_eq!(null.set_present(true), PresenceChange::Created);
            assert_eq!(null.inner().unwrap().value(), Some(&json!(0)));
        });
    }

    #[test]
    fn present_prefers_schema_default() {
        with_null(
            json!({"type": "string", "nullable": true, "default": "draft"}),
            |mut null| {
                // a default on the wrapper seeds it as present
                assert!(null.is_present());
                null.set_present(false);
                null.set_present(true);
                assert_eq!(null.inner().unwrap().value(), Some(&json!("draft")));
            },
        );
    }

    #[test]
    fn present_object_has_declared_properties() {
        with_null(
            json!({
                "type": ["object", "null"],
                "properties": { "url": { "type": "string" } }
            }),
            |mut null| {
                null.set_present(true);
                assert!(null.inner().unwrap().get("/url").is_some());
            },
        );
    }

    #[test]
    fn absent_discards_value() {
        with_null(json!({"type": ["string", "null"]}), |mut null| {
            null.set_present(true);
            assert_eq!(null.set_present(false), PresenceChange::Removed);
            assert!(null.inner().is_none());
            assert_eq!(null.set_present(false), PresenceChange::Unchanged);
        });
    }

    #[test]
    fn pure_null_has_no_inner() {
        with_null(json!({"type": "null"}), |mut null| {
            assert!(null.underlying().is_none());
            null.set_present(true);
            assert!(null.is_present());
            assert!(null.inner().is_none());
        });
    }
}
