//! Named children of an object node.

use serde_json::Value;
use tracing::debug;

use crate::error::FormError;
use crate::node::{ObjectNode, SchemaNode};
use crate::pointer::child;
use crate::schema::{AdditionalProperties, ObjectSchema, SchemaKind, SchemaRef, SchemaSet};

#[derive(Debug)]
pub struct ObjectController<'a> {
    set: &'a SchemaSet,
    schema: &'a SchemaRef,
    object: &'a mut ObjectNode,
}

impl<'a> ObjectController<'a> {
    pub(crate) fn new(set: &'a SchemaSet, schema: &'a SchemaRef, object: &'a mut ObjectNode) -> Self {
        Self {
            set,
            schema,
            object,
        }
    }

    fn declared(&self) -> Option<&'a ObjectSchema> {
        match self.schema.kind() {
            SchemaKind::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.object.property(name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut SchemaNode> {
        self.object
            .properties
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.object.names()
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.declared()
            .map(|object| object.required.contains(name))
            .unwrap_or(false)
    }

    /// Set `name` to a node built from `value`, replacing any existing
    /// child.
    ///
    /// Declared properties use their own template. Undeclared names are
    /// accepted when the object is open and become additional children.
    ///
    /// # Errors
    ///
    /// [`FormError::UnknownProperty`] when `name` is undeclared and the
    /// object is closed, [`FormError::ReadOnly`] when `name` is a read-only
    /// passthrough.
    pub fn set_property(&mut self, name: &str, value: &Value) -> Result<(), FormError> {
        self.check_editable(name)?;
        let node = self.build_child(name, Some(value))?;
        self.place(name, node);
        debug!(pointer = self.schema.pointer(), property = %name, "set property");
        Ok(())
    }

    /// Add `name` as a fresh, unseeded child. An existing child is kept.
    pub fn add_property(&mut self, name: &str) -> Result<(), FormError> {
        if self.object.contains(name) {
            return Ok(());
        }
        self.check_editable(name)?;
        let node = self.build_child(name, None)?;
        self.place(name, node);
        debug!(pointer = self.schema.pointer(), property = %name, "added property");
        Ok(())
    }

    /// Remove `name` from the live tree, returning the removed child.
    ///
    /// Removing an absent optional property succeeds with `None`.
    ///
    /// # Errors
    ///
    /// [`FormError::RequiredProperty`] when `name` is required,
    /// [`FormError::ReadOnly`] when it is a read-only passthrough.
    pub fn remove_property(&mut self, name: &str) -> Result<Option<SchemaNode>, FormError> {
        self.check_editable(name)?;
        if self.is_required(name) {
            return Err(FormError::RequiredProperty {
                name: name.to_string(),
            });
        }

        let position = self.object.properties.iter().position(|(n, _)| n == name);
        let removed = position.map(|i| self.object.properties.remove(i).1);
        debug!(
            pointer = self.schema.pointer(),
            property = %name,
            removed = removed.is_some(),
            "removed property"
        );
        Ok(removed)
    }

    pub fn is_read_only(&self, name: &str) -> bool {
        self.declared()
            .map(|object| object.is_read_only(name))
            .unwrap_or(false)
    }

    fn check_editable(&self, name: &str) -> Result<(), FormError> {
        if self.is_read_only(name) {
            return Err(FormError::ReadOnly {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn build_child(&self, name: &str, seed: Option<&Value>) -> Result<SchemaNode, FormError> {
        let declared = self.declared();
        if let Some(template) = declared.and_then(|object| object.property(name)) {
            return Ok(self.set.instantiate(template, seed));
        }

        let projected = declared
            .map(|object| object.is_projected_only(name))
            .unwrap_or(false);
        match declared.map(|object| &object.additional) {
            Some(AdditionalProperties::Closed) if projected => Ok(SchemaNode::any(
                &child(self.schema.pointer(), name),
                seed.cloned(),
            )),
            Some(AdditionalProperties::Closed) => Err(FormError::UnknownProperty {
                name: name.to_string(),
            }),
            Some(AdditionalProperties::Open(Some(template))) => {
                Ok(self.set.instantiate(template, seed))
            }
            Some(AdditionalProperties::Open(None)) | None => Ok(SchemaNode::any(
                &child(self.schema.pointer(), name),
                seed.cloned(),
            )),
        }
    }

    /// Replace `name` in place, or insert it keeping declared properties in
    /// declaration order ahead of additional ones.
    fn place(&mut self, name: &str, node: SchemaNode) {
        if let Some(existing) = self.property_mut(name) {
            *existing = node;
            return;
        }

        let rank = |n: &str| {
            self.declared()
                .and_then(|object| object.properties.iter().position(|(p, _)| p == n))
        };
        let index = match rank(name) {
            Some(own) => self
                .object
                .properties
                .iter()
                .position(|(n, _)| rank(n).map_or(true, |other| other > own))
                .unwrap_or(self.object.properties.len()),
            None => self.object.properties.len(),
        };
        self.object.properties.insert(index, (name.to_string(), node));
    }
}
