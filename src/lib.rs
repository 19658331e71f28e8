//! Schema Form
//!
//! Schema-driven form resolution and selective projection of API description
//! documents.
//!
//! A JSON-Schema-flavored form schema is compiled into templates, then
//! instantiated as a live tree of nodes. Each node is edited through the
//! controller for its field type (null wrapper, array, object, multischema or
//! scalar leaf). Serializing the tree emits only the projected attributes of
//! each object, under their output names and in projection order.
//!
//! # Example
//!
//! ```
//! use schema_form::Document;
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "required": ["title"],
//!     "properties": {
//!         "title": { "type": "string" },
//!         "logo": { "type": "string", "x-output": "x-logo" },
//!         "draft": { "type": "boolean", "x-projected": false }
//!     }
//! });
//!
//! let mut doc = Document::new(&schema, None).unwrap();
//! doc.set("/title", &json!("Pet Store")).unwrap();
//! doc.set("/logo", &json!("logo.png")).unwrap();
//! doc.set("/draft", &json!(true)).unwrap();
//!
//! // "logo" is emitted under its output key, "draft" is never emitted
//! assert_eq!(doc.serialize(), json!({ "title": "Pet Store", "x-logo": "logo.png" }));
//! assert!(doc.is_valid());
//! ```
//!
//! # Projection Annotations
//!
//! | Annotation | Where | Effect |
//! |------------|-------|--------|
//! | `"x-output": "key"` | property | Emit under `key` |
//! | `"x-editable": false` | property | Read-only passthrough; edits are rejected |
//! | `"x-projected": false` | property | Never emitted or edited |
//! | `"x-editable": [names]` + `"x-output-map": [...]` | object | Explicit projection |
//! | `"x-role": "info"` | object | Built-in OpenAPI projection |
//!
//! Parallel lists pair each editable name with an output mapping:
//! ```json
//! { "x-editable": ["logo"], "x-output-map": [{ "property": "logo", "output": "x-logo" }] }
//! ```

mod controller;
mod document;
mod error;
mod linter;
mod loader;
mod messages;
mod node;
mod openapi;
mod output_schema;
pub mod pointer;
mod projection;
mod registry;
mod schema;
mod serializer;
mod types;
mod validator;

pub use controller::{
    ArrayController, Controller, MultiSchemaController, NullController, ObjectController,
    PresenceChange, ScalarController,
};
pub use document::{Document, FieldInfo};
pub use error::{CompileError, FormError, LoadError, ValidateError, ValidationIssue};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{load_document, load_schema, load_schema_str, load_str, Format};
pub use messages::{Message, MessageCatalog, Rule};
pub use node::{ArrayNode, MultiSchemaNode, NodeKind, NullNode, ObjectNode, ScalarNode, SchemaNode};
pub use openapi::{document_schema, role_projection, Role};
pub use output_schema::{output_schema, output_schema_with, strip_annotations};
pub use projection::{ProjectionEntry, ProjectionModel};
pub use registry::FieldTypeRegistry;
pub use schema::{
    AdditionalProperties, Constraints, MultiSchema, ObjectSchema, Schema, SchemaKind, SchemaRef,
    SchemaSet,
};
pub use serializer::{serialize, serialize_document};
pub use types::{
    json_type_name, CompileOptions, Composition, FieldType, ScalarKind, EDITABLE_ANNOTATION,
    FORM_ANNOTATIONS, OUTPUT_ANNOTATION, OUTPUT_MAP_ANNOTATION, PROJECTED_ANNOTATION,
    ROLE_ANNOTATION,
};
pub use validator::{validate_against_schema, validate_output, validate_tree, validate_tree_with};
