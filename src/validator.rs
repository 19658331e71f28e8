//! Validation of live trees and projected output documents.
//!
//! Tree validation is advisory: it walks the live tree, collects every
//! violated constraint as a [`ValidationIssue`] with a catalog message and
//! never blocks editing. Output validation checks a serialized document
//! against the projected output schema with `jsonschema`.

use serde_json::{Number, Value};

use crate::error::{ValidateError, ValidationIssue};
use crate::messages::{MessageCatalog, Rule};
use crate::node::{NodeKind, SchemaNode};
use crate::output_schema::output_schema;
use crate::pointer::child;
use crate::schema::SchemaKind;
use crate::serializer::{serialize, serialize_item};

/// Validate a live tree with the standard message catalog.
pub fn validate_tree(root: &SchemaNode) -> Vec<ValidationIssue> {
    validate_tree_with(root, &MessageCatalog::standard())
}

/// Validate a live tree, rendering messages from `catalog`.
///
/// Issue paths are JSON Pointers over internal names.
pub fn validate_tree_with(root: &SchemaNode, catalog: &MessageCatalog) -> Vec<ValidationIssue> {
    let mut walker = Walker {
        catalog,
        issues: Vec::new(),
    };
    walker.visit(root, "");
    walker.issues
}

struct Walker<'a> {
    catalog: &'a MessageCatalog,
    issues: Vec<ValidationIssue>,
}

impl Walker<'_> {
    fn report(&mut self, path: &str, rule: Rule) {
        let message = self.catalog.render(&rule);
        self.issues.push(ValidationIssue::new(path, &rule, message));
    }

    fn visit(&mut self, node: &SchemaNode, path: &str) {
        let constraints = node.schema().constraints();
        if let Some(expected) = &constraints.const_value {
            if let Some(actual) = serialize(node) {
                if &actual != expected {
                    self.report(path, Rule::Const(expected.clone()));
                }
            }
        }

        match node.kind() {
            NodeKind::Scalar(scalar) => {
                let Some(value) = scalar.value() else {
                    return;
                };
                if !scalar.kind().accepts(value) {
                    self.report(
                        path,
                        Rule::Type {
                            expected: scalar.kind().tag().to_string(),
                        },
                    );
                    return;
                }
                match value {
                    Value::String(s) => self.check_length(path, s, node),
                    Value::Number(n) => self.check_number(path, n, node),
                    _ => {}
                }
            }
            NodeKind::Null(null) => {
                if let Some(inner) = null.inner() {
                    self.visit(inner, path);
                }
            }
            NodeKind::Array(array) => {
                let len = array.len() as u64;
                if let Some(min) = constraints.min_items {
                    if len < min {
                        self.report(path, Rule::MinItems(min));
                    }
                }
                if let Some(max) = constraints.max_items {
                    if len > max {
                        self.report(path, Rule::MaxItems(max));
                    }
                }
                if constraints.unique_items {
                    let values: Vec<Value> = array.items().iter().map(serialize_item).collect();
                    let duplicated = values
                        .iter()
                        .enumerate()
                        .any(|(i, v)| values[..i].contains(v));
                    if duplicated {
                        self.report(path, Rule::UniqueItems);
                    }
                }
                for (i, item) in array.items().iter().enumerate() {
                    self.visit(item, &child(path, &i.to_string()));
                }
            }
            NodeKind::Object(object) => {
                if let SchemaKind::Object(schema) = node.schema().kind() {
                    for name in &schema.required {
                        let missing = object
                            .property(name)
                            .map(|c| serialize(c).is_none())
                            .unwrap_or(true);
                        if missing {
                            self.report(&child(path, name), Rule::Required);
                        }
                    }
                }
                for (name, property) in object.properties() {
                    self.visit(property, &child(path, name));
                }
            }
            NodeKind::MultiSchema(multi) => {
                if let Some(selected) = multi.child() {
                    self.visit(selected, path);
                }
            }
        }
    }

    fn check_length(&mut self, path: &str, s: &str, node: &SchemaNode) {
        let constraints = node.schema().constraints();
        let len = s.chars().count() as u64;
        if let Some(min) = constraints.min_length {
            if len < min {
                self.report(path, Rule::MinLength(min));
            }
        }
        if let Some(max) = constraints.max_length {
            if len > max {
                self.report(path, Rule::MaxLength(max));
            }
        }
    }

    fn check_number(&mut self, path: &str, n: &Number, node: &SchemaNode) {
        let constraints = node.schema().constraints();
        let Some(value) = n.as_f64() else {
            return;
        };
        if let Some((bound, min)) = limit(&constraints.minimum) {
            if value < min {
                self.report(path, Rule::Minimum(bound.clone()));
            }
        }
        if let Some((bound, max)) = limit(&constraints.maximum) {
            if value > max {
                self.report(path, Rule::Maximum(bound.clone()));
            }
        }
        if let Some((bound, min)) = limit(&constraints.exclusive_minimum) {
            if value <= min {
                self.report(path, Rule::ExclusiveMinimum(bound.clone()));
            }
        }
        if let Some((bound, max)) = limit(&constraints.exclusive_maximum) {
            if value >= max {
                self.report(path, Rule::ExclusiveMaximum(bound.clone()));
            }
        }
        if let Some((bound, step)) = limit(&constraints.multiple_of) {
            let quotient = value / step;
            if step != 0.0 && (quotient - quotient.round()).abs() > 1e-9 {
                self.report(path, Rule::MultipleOf(bound.clone()));
            }
        }
    }
}

fn limit(bound: &Option<Number>) -> Option<(&Number, f64)> {
    bound.as_ref().and_then(|b| b.as_f64().map(|f| (b, f)))
}

/// Validate a projected output document against the output schema of the
/// form schema `schema`.
///
/// # Errors
///
/// Returns `ValidateError::Compile` if the form schema does not compile, or
/// `ValidateError::Invalid` if the output doesn't match.
pub fn validate_output(schema: &Value, output: &Value) -> Result<(), ValidateError> {
    let projected = output_schema(schema)?;
    validate_against_schema(&projected, output)
}

/// Validate a document against an already projected JSON Schema.
pub fn validate_against_schema(schema: &Value, output: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors: Vec<ValidationIssue> = validator
        .iter_errors(output)
        .map(|e| ValidationIssue {
            path: e.instance_path.to_string(),
            rule: "schema".to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;
    use crate::schema::SchemaSet;
    use serde_json::json;

    fn issues(schema: Value, seed: Value) -> Vec<ValidationIssue> {
        let set = SchemaSet::compile_default(&schema).unwrap();
        validate_tree(&set.instantiate_root(Some(&seed)))
    }

    fn rules(issues: &[ValidationIssue]) -> Vec<(&str, &str)> {
        issues
            .iter()
            .map(|i| (i.path.as_str(), i.rule.as_str()))
            .collect()
    }

    #[test]
    fn missing_required_is_reported_not_blocking() {
        let schema = json!({
            "type": "object",
            "required": ["title", "version"],
            "properties": {
                "title": { "type": "string" },
                "version": { "type": "string" }
            }
        });
        let found = issues(schema, json!({"title": "Pets"}));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/version");
        assert_eq!(found[0].message, "This field is required");
    }

    #[test]
    fn scalar_constraints() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "minLength": 3 },
                "code": { "type": "string", "maxLength": 2 },
                "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
                "ratio": { "type": "number", "exclusiveMaximum": 1 },
                "step": { "type": "integer", "multipleOf": 5 }
            }
        });
        let found = issues(
            schema,
            json!({"name": "ab", "code": "abc", "port": 70000, "ratio": 1, "step": 7}),
        );
        assert_eq!(
            rules(&found),
            [
                ("/name", "minLength"),
                ("/code", "maxLength"),
                ("/port", "max"),
                ("/ratio", "exclusiveMaximum"),
                ("/step", "multipleOf"),
            ]
        );
        assert_eq!(found[2].message, "should be <= 65535");
    }

    #[test]
    fn type_mismatch_uses_catalog() {
        let schema = json!({
            "type": "object",
            "properties": { "count": { "type": "integer" } }
        });
        let found = issues(schema, json!({"count": "three"}));
        assert_eq!(found[0].rule, "type");
        assert_eq!(found[0].message, "should be \"integer\".");
    }

    #[test]
    fn array_constraints() {
        let schema = json!({
            "type": "array",
            "minItems": 3,
            "uniqueItems": true,
            "items": { "type": "string" }
        });
        let found = issues(schema, json!(["a", "a"]));
        assert_eq!(rules(&found), [("", "minItems"), ("", "uniqueItems")]);
    }

    #[test]
    fn const_mismatch() {
        let schema = json!({
            "type": "object",
            "properties": { "openapi": { "type": "string", "const": "3.0.3" } }
        });
        let found = issues(schema, json!({"openapi": "2.0"}));
        assert_eq!(found[0].message, "should be equal to constant \"3.0.3\"");
    }

    #[test]
    fn nullable_constraints_reported_once() {
        let schema = json!({"type": ["string", "null"], "const": "x"});
        let found = issues(schema, json!("y"));
        assert_eq!(rules(&found), [("", "const")]);
    }

    #[test]
    fn unset_items_count_toward_uniqueness() {
        let schema = json!({
            "type": "array",
            "minItems": 2,
            "uniqueItems": true,
            "items": { "type": "string" }
        });
        let set = SchemaSet::compile_default(&schema).unwrap();
        let found = validate_tree(&set.instantiate_root(None));
        assert_eq!(rules(&found), [("", "uniqueItems")]);
    }

    #[test]
    fn selected_alternative_is_validated() {
        let schema = json!({
            "oneOf": [
                { "type": "object", "required": ["id"], "properties": { "id": { "type": "integer", "minimum": 1 } } }
            ]
        });
        let found = issues(schema, json!({"id": 0}));
        assert_eq!(rules(&found), [("/id", "min")]);
    }

    #[test]
    fn custom_catalog_message() {
        let set = SchemaSet::compile_default(&json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        }))
        .unwrap();
        let root = set.instantiate_root(Some(&json!({})));
        let catalog = MessageCatalog::standard().with("required", Message::Fixed("Pflichtfeld"));
        let found = validate_tree_with(&root, &catalog);
        assert_eq!(found[0].message, "Pflichtfeld");
    }

    #[test]
    fn valid_tree_has_no_issues() {
        let schema = json!({
            "type": "object",
            "required": ["url"],
            "properties": { "url": { "type": "string", "minLength": 1 } }
        });
        assert!(issues(schema, json!({"url": "https://api.example.com"})).is_empty());
    }

    #[test]
    fn output_is_checked_against_renamed_schema() {
        let schema = json!({
            "type": "object",
            "required": ["logo"],
            "properties": {
                "logo": { "type": "string", "x-output": "x-logo" }
            }
        });
        assert!(validate_output(&schema, &json!({"x-logo": "l.png"})).is_ok());
        assert!(matches!(
            validate_output(&schema, &json!({"logo": "l.png"})),
            Err(ValidateError::Invalid { .. })
        ));
    }

    #[test]
    fn output_collects_multiple_errors() {
        let schema = json!({
            "type": "object",
            "required": ["name", "age"],
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "number" }
            }
        });
        match validate_output(&schema, &json!({})) {
            Err(ValidateError::Invalid { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error with 2 errors, got {:?}", other),
        }
    }
}
