//! Core types for schema-driven form resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Annotation renaming a property in the output document.
pub const OUTPUT_ANNOTATION: &str = "x-output";

/// Annotation marking a property read-only (`false`), or, on an object,
/// listing its editable attributes.
pub const EDITABLE_ANNOTATION: &str = "x-editable";

/// Annotation excluding a property from the output document.
pub const PROJECTED_ANNOTATION: &str = "x-projected";

/// Object-level output map, paired with the `x-editable` list.
pub const OUTPUT_MAP_ANNOTATION: &str = "x-output-map";

/// Object-level built-in projection role (e.g. `"info"`).
pub const ROLE_ANNOTATION: &str = "x-role";

/// All form annotations, stripped from the output schema.
pub const FORM_ANNOTATIONS: &[&str] = &[
    OUTPUT_ANNOTATION,
    EDITABLE_ANNOTATION,
    PROJECTED_ANNOTATION,
    OUTPUT_MAP_ANNOTATION,
    ROLE_ANNOTATION,
];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Leaf value kinds edited by the scalar editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Number,
    Integer,
    Boolean,
    /// No declared type; accepts any JSON value.
    Any,
}

impl ScalarKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Integer => "integer",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Any => "any",
        }
    }

    /// Whether `value` has the JSON shape of this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ScalarKind::Any, _) => true,
            (ScalarKind::String, Value::String(_)) => true,
            (ScalarKind::Boolean, Value::Bool(_)) => true,
            (ScalarKind::Number, Value::Number(_)) => true,
            (ScalarKind::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Value a freshly created leaf of this kind starts with.
    pub fn default_value(&self) -> Value {
        match self {
            ScalarKind::String => Value::String(String::new()),
            ScalarKind::Number | ScalarKind::Integer => Value::from(0),
            ScalarKind::Boolean => Value::Bool(false),
            ScalarKind::Any => Value::Null,
        }
    }
}

/// The closed set of field types a schema node can carry.
///
/// Every tag maps to exactly one controller; adding a variant forces every
/// dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Null,
    Array,
    Object,
    MultiSchema,
    Scalar(ScalarKind),
}

impl FieldType {
    /// Registry key for this field type.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldType::Null => "null",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::MultiSchema => "multischema",
            FieldType::Scalar(kind) => kind.tag(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Composition keyword a multischema node was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Composition {
    /// Exactly one alternative must validate.
    #[serde(rename = "oneOf")]
    OneOf,
    /// At least one alternative must validate.
    #[serde(rename = "anyOf")]
    AnyOf,
}

impl Composition {
    pub fn keyword(&self) -> &'static str {
        match self {
            Composition::OneOf => "oneOf",
            Composition::AnyOf => "anyOf",
        }
    }
}

/// Options for schema compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// When true, object schemas reject undeclared properties unless
    /// `additionalProperties` is explicitly `true` or a schema. Defaults to
    /// false, which follows JSON Schema openness.
    pub strict: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode (closed objects unless explicitly opened).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
