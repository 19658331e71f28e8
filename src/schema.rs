//! Schema compilation - turns a JSON-Schema-flavored document into form
//! templates.
//!
//! Every schema object is reduced to one field type through the
//! [`FieldTypeRegistry`]:
//!
//! | Schema shape | Field type |
//! |--------------|------------|
//! | `oneOf` / `anyOf` | `multischema` |
//! | `allOf` | merged into one schema before dispatch |
//! | `"type": [T, "null"]`, `nullable: true` | `null` wrapping `T` |
//! | `"type": T` | registry lookup of `T` |
//! | no `type` | inferred from `properties` / `items`, else `any` |
//!
//! Internal `$ref`s compile into a shared definitions table, so recursive
//! schemas terminate.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::error::CompileError;
use crate::openapi::role_projection;
use crate::pointer::{child, navigate_fragment};
use crate::projection::{ProjectionEntry, ProjectionModel};
use crate::registry::FieldTypeRegistry;
use crate::types::{
    json_type_name, CompileOptions, Composition, FieldType, ScalarKind, EDITABLE_ANNOTATION,
    OUTPUT_ANNOTATION, OUTPUT_MAP_ANNOTATION, PROJECTED_ANNOTATION, ROLE_ANNOTATION,
};

/// Shared handle to a compiled template.
pub type SchemaRef = Arc<Schema>;

/// Nesting limit for `allOf` ref inlining and shape matching.
const MAX_DEPTH: usize = 64;

/// Validation constraints carried by a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_minimum: Option<Number>,
    pub exclusive_maximum: Option<Number>,
    pub multiple_of: Option<Number>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub const_value: Option<Value>,
}

/// A compiled template for one point in the document.
#[derive(Debug)]
pub struct Schema {
    pointer: String,
    title: Option<String>,
    description: Option<String>,
    default: Option<Value>,
    constraints: Constraints,
    kind: SchemaKind,
}

/// Type-specific part of a template.
#[derive(Debug)]
pub enum SchemaKind {
    Scalar(ScalarKind),
    /// A value that may be absent; `None` is the pure `null` type.
    Null(Option<SchemaRef>),
    /// Item template shared by every element.
    Array(SchemaRef),
    Object(ObjectSchema),
    MultiSchema(MultiSchema),
    /// Internal reference into the definitions table.
    Ref(String),
}

/// Declared properties of an object template.
#[derive(Debug)]
pub struct ObjectSchema {
    pub properties: Vec<(String, SchemaRef)>,
    pub required: BTreeSet<String>,
    pub additional: AdditionalProperties,
    pub projection: ProjectionModel,
}

/// Whether an object accepts undeclared properties.
#[derive(Debug)]
pub enum AdditionalProperties {
    Closed,
    /// Open; `None` means undeclared children are untyped leaves.
    Open(Option<SchemaRef>),
}

/// Alternatives of a composition.
#[derive(Debug)]
pub struct MultiSchema {
    pub composition: Composition,
    pub alternatives: Vec<SchemaRef>,
}

impl Schema {
    fn new(pointer: &str, kind: SchemaKind) -> Self {
        Self {
            pointer: pointer.to_string(),
            title: None,
            description: None,
            default: None,
            constraints: Constraints::default(),
            kind,
        }
    }

    /// An untyped leaf.
    pub fn any(pointer: &str) -> Self {
        Self::new(pointer, SchemaKind::Scalar(ScalarKind::Any))
    }

    /// Location of this template in the source schema.
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    /// Field type of this template; `None` for an unresolved reference.
    pub fn field_type(&self) -> Option<FieldType> {
        match &self.kind {
            SchemaKind::Scalar(kind) => Some(FieldType::Scalar(*kind)),
            SchemaKind::Null(_) => Some(FieldType::Null),
            SchemaKind::Array(_) => Some(FieldType::Array),
            SchemaKind::Object(_) => Some(FieldType::Object),
            SchemaKind::MultiSchema(_) => Some(FieldType::MultiSchema),
            SchemaKind::Ref(_) => None,
        }
    }
}

impl ObjectSchema {
    pub fn property(&self, name: &str) -> Option<&SchemaRef> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, schema)| schema)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.additional, AdditionalProperties::Closed)
    }

    /// Read an attribute from a document value, by output key first and
    /// internal name second.
    pub fn seed_value<'v>(&self, value: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
        self.projection
            .output_name(name)
            .and_then(|output| value.get(output))
            .or_else(|| value.get(name))
    }

    /// Internal attribute name a document key refers to, if known.
    ///
    /// Projection entries count as known even when the property is not
    /// declared.
    pub fn internal_key<'k>(&'k self, key: &'k str) -> Option<&'k str> {
        if let Some(name) = self.projection.internal_name(key) {
            return Some(name);
        }
        (self.is_declared(key) || self.projection.entry(key).is_some()).then_some(key)
    }

    /// Whether `name` is projected without a declared property.
    pub fn is_projected_only(&self, name: &str) -> bool {
        !self.is_declared(name) && self.projection.entry(name).is_some()
    }

    /// Whether `name` is a read-only passthrough.
    pub fn is_read_only(&self, name: &str) -> bool {
        self.projection
            .entry(name)
            .map(|entry| !entry.is_editable())
            .unwrap_or(false)
    }
}

/// A compiled schema: the root template plus every referenced definition.
#[derive(Debug)]
pub struct SchemaSet {
    root: SchemaRef,
    defs: HashMap<String, SchemaRef>,
}

impl SchemaSet {
    /// Compile a JSON Schema with the standard registry and default options.
    pub fn compile_default(schema: &Value) -> Result<Self, CompileError> {
        Self::compile(schema, &FieldTypeRegistry::standard(), &CompileOptions::new())
    }

    /// Compile a JSON Schema into form templates.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` for unknown type tags, broken or circular
    /// references, malformed annotations, projection mismatches and
    /// defaults that do not match their declared type.
    pub fn compile(
        schema: &Value,
        registry: &FieldTypeRegistry,
        options: &CompileOptions,
    ) -> Result<Self, CompileError> {
        let mut compiler = Compiler {
            root: schema,
            registry,
            options,
            defs: HashMap::new(),
            pending: HashSet::new(),
        };

        compiler.pending.insert("#".to_string());
        let root = compiler.compile(schema, "")?;
        compiler.pending.remove("#");
        compiler.defs.insert("#".to_string(), root.clone());

        let set = SchemaSet {
            root,
            defs: compiler.defs,
        };
        set.check_ref_chains()?;
        debug!(definitions = set.defs.len(), "compiled schema");
        Ok(set)
    }

    pub fn root(&self) -> &SchemaRef {
        &self.root
    }

    pub fn definition(&self, reference: &str) -> Option<&SchemaRef> {
        self.defs.get(reference)
    }

    /// Follow references until a structural template is reached.
    pub fn resolve<'a>(&'a self, mut schema: &'a SchemaRef) -> &'a SchemaRef {
        while let SchemaKind::Ref(reference) = &schema.kind {
            match self.defs.get(reference) {
                Some(target) => schema = target,
                None => break,
            }
        }
        schema
    }

    /// Whether `value` has the shape described by `schema`.
    ///
    /// Used to pick a multischema alternative when loading a document.
    /// With `strict`, objects reject keys they do not declare.
    pub fn accepts(&self, schema: &SchemaRef, value: &Value, strict: bool) -> bool {
        self.accepts_at(schema, value, strict, 0)
    }

    fn accepts_at(&self, schema: &SchemaRef, value: &Value, strict: bool, depth: usize) -> bool {
        if depth > MAX_DEPTH {
            return false;
        }
        let schema = self.resolve(schema);
        if let Some(expected) = &schema.constraints.const_value {
            if expected != value {
                return false;
            }
        }

        match &schema.kind {
            SchemaKind::Scalar(kind) => kind.accepts(value),
            SchemaKind::Null(None) => value.is_null(),
            SchemaKind::Null(Some(inner)) => {
                value.is_null() || self.accepts_at(inner, value, strict, depth + 1)
            }
            SchemaKind::Array(items) => value
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .all(|item| self.accepts_at(items, item, strict, depth + 1))
                })
                .unwrap_or(false),
            SchemaKind::Object(object) => {
                let Some(map) = value.as_object() else {
                    return false;
                };
                let has_required = object
                    .required
                    .iter()
                    .all(|name| object.seed_value(map, name).is_some());
                let children_fit = object.properties.iter().all(|(name, prop)| {
                    object
                        .seed_value(map, name)
                        .map(|v| self.accepts_at(prop, v, strict, depth + 1))
                        .unwrap_or(true)
                });
                let keys_known = !(strict || object.is_closed())
                    || map.keys().all(|key| object.internal_key(key).is_some());
                has_required && children_fit && keys_known
            }
            SchemaKind::MultiSchema(multi) => multi
                .alternatives
                .iter()
                .any(|alt| self.accepts_at(alt, value, strict, depth + 1)),
            SchemaKind::Ref(_) => true,
        }
    }

    fn check_ref_chains(&self) -> Result<(), CompileError> {
        for (reference, schema) in &self.defs {
            let mut current = schema;
            for _ in 0..=self.defs.len() {
                match &current.kind {
                    SchemaKind::Ref(next) => match self.defs.get(next) {
                        Some(target) => current = target,
                        None => break,
                    },
                    _ => break,
                }
            }
            if matches!(current.kind, SchemaKind::Ref(_)) {
                return Err(CompileError::CircularRef {
                    reference: reference.clone(),
                });
            }
        }
        Ok(())
    }
}

struct Compiler<'a> {
    root: &'a Value,
    registry: &'a FieldTypeRegistry,
    options: &'a CompileOptions,
    defs: HashMap<String, SchemaRef>,
    pending: HashSet<String>,
}

impl<'a> Compiler<'a> {
    fn compile(&mut self, value: &Value, path: &str) -> Result<SchemaRef, CompileError> {
        match value {
            Value::Bool(true) => Ok(Arc::new(Schema::any(path))),
            Value::Object(map) => self.compile_object(map, path),
            other => Err(CompileError::InvalidSchema {
                path: path.to_string(),
                message: format!("expected schema object, got {}", json_type_name(other)),
            }),
        }
    }

    fn compile_object(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
    ) -> Result<SchemaRef, CompileError> {
        if let Some(reference) = map.get("$ref") {
            let Value::String(reference) = reference else {
                return Err(CompileError::InvalidSchema {
                    path: child(path, "$ref"),
                    message: "$ref must be a string".to_string(),
                });
            };
            return self.compile_ref(map, reference, path);
        }

        if map.contains_key("allOf") {
            let merged = self.merge_all_of(map, path, 0)?;
            return self.compile_object(&merged, path);
        }

        let kind = self.compile_kind(map, path)?;
        let schema = self.template(map, path, kind)?;
        Ok(Arc::new(schema))
    }

    /// Attach metadata, constraints and the checked default to `kind`.
    fn template(
        &self,
        map: &Map<String, Value>,
        path: &str,
        kind: SchemaKind,
    ) -> Result<Schema, CompileError> {
        let mut schema = Schema::new(path, kind);
        schema.title = map.get("title").and_then(Value::as_str).map(String::from);
        schema.description = map
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);
        // Constraints of a nullable wrapper live on its underlying template.
        if !matches!(schema.kind, SchemaKind::Null(Some(_))) {
            schema.constraints = compile_constraints(map, path)?;
        }

        if let Some(default) = map.get("default") {
            if !shallow_accepts(&schema, default) {
                return Err(CompileError::InvalidDefault {
                    path: child(path, "default"),
                    expected: schema
                        .field_type()
                        .map(|t| t.tag().to_string())
                        .unwrap_or_else(|| "reference".to_string()),
                });
            }
            schema.default = Some(default.clone());
        }
        Ok(schema)
    }

    fn compile_ref(
        &mut self,
        map: &Map<String, Value>,
        reference: &str,
        path: &str,
    ) -> Result<SchemaRef, CompileError> {
        if !reference.starts_with('#') {
            return Err(CompileError::BrokenRef {
                reference: reference.to_string(),
                path: path.to_string(),
            });
        }
        self.ensure_definition(reference, path)?;

        let mut schema = Schema::new(path, SchemaKind::Ref(reference.to_string()));
        schema.title = map.get("title").and_then(Value::as_str).map(String::from);
        schema.description = map
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);
        Ok(Arc::new(schema))
    }

    fn ensure_definition(&mut self, reference: &str, path: &str) -> Result<(), CompileError> {
        if self.defs.contains_key(reference) || self.pending.contains(reference) {
            return Ok(());
        }
        let root = self.root;
        let target = navigate_fragment(root, reference).ok_or_else(|| CompileError::BrokenRef {
            reference: reference.to_string(),
            path: path.to_string(),
        })?;

        self.pending.insert(reference.to_string());
        let compiled = self.compile(target, reference.trim_start_matches('#'))?;
        self.pending.remove(reference);
        self.defs.insert(reference.to_string(), compiled);
        Ok(())
    }

    /// Merge `allOf` branches into one schema object.
    ///
    /// `properties` are concatenated (first declaration of a name wins),
    /// `required` is unioned, every other keyword keeps its first value.
    fn merge_all_of(
        &self,
        map: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<Map<String, Value>, CompileError> {
        let mut merged: Map<String, Value> = map
            .iter()
            .filter(|(key, _)| key.as_str() != "allOf")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let Some(Value::Array(branches)) = map.get("allOf") else {
            return Err(CompileError::InvalidSchema {
                path: child(path, "allOf"),
                message: "allOf must be an array".to_string(),
            });
        };

        for (i, branch) in branches.iter().enumerate() {
            let branch_path = format!("{}/allOf/{}", path, i);
            let branch = self.inline_branch(branch, &branch_path, depth)?;
            merge_into(&mut merged, branch);
        }
        Ok(merged)
    }

    fn inline_branch(
        &self,
        branch: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Map<String, Value>, CompileError> {
        if depth > MAX_DEPTH {
            return Err(CompileError::CircularRef {
                reference: path.to_string(),
            });
        }
        match branch {
            Value::Bool(true) => Ok(Map::new()),
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    let target = navigate_fragment(self.root, reference)
                        .filter(|_| reference.starts_with('#'))
                        .ok_or_else(|| CompileError::BrokenRef {
                            reference: reference.clone(),
                            path: path.to_string(),
                        })?;
                    let mut inlined: Map<String, Value> = map
                        .iter()
                        .filter(|(key, _)| key.as_str() != "$ref")
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    let target = self.inline_branch(target, reference, depth + 1)?;
                    merge_into(&mut inlined, target);
                    Ok(inlined)
                } else if map.contains_key("allOf") {
                    self.merge_all_of(map, path, depth + 1)
                } else {
                    Ok(map.clone())
                }
            }
            other => Err(CompileError::InvalidSchema {
                path: path.to_string(),
                message: format!("expected schema object, got {}", json_type_name(other)),
            }),
        }
    }

    fn compile_kind(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
    ) -> Result<SchemaKind, CompileError> {
        if map.contains_key("oneOf") || map.contains_key("anyOf") {
            let field_type = self
                .registry
                .resolve_tag(FieldType::MultiSchema.tag(), path)?;
            return self.build_kind(field_type, map, path);
        }

        let nullable = map.get("nullable") == Some(&Value::Bool(true));

        match map.get("type") {
            Some(Value::String(tag)) => {
                let field_type = self.registry.resolve_tag(tag, &child(path, "type"))?;
                let kind = self.build_kind(field_type, map, path)?;
                if nullable && field_type != FieldType::Null {
                    self.wrap_nullable(map, path, kind)
                } else {
                    Ok(kind)
                }
            }
            Some(Value::Array(tags)) => self.compile_type_union(tags, map, path, nullable),
            Some(other) => Err(CompileError::InvalidSchema {
                path: child(path, "type"),
                message: format!("expected string or array, got {}", json_type_name(other)),
            }),
            None => {
                let tag = infer_tag(map);
                let field_type = self.registry.resolve_tag(tag, path)?;
                let kind = self.build_kind(field_type, map, path)?;
                if nullable {
                    self.wrap_nullable(map, path, kind)
                } else {
                    Ok(kind)
                }
            }
        }
    }

    fn compile_type_union(
        &mut self,
        tags: &[Value],
        map: &Map<String, Value>,
        path: &str,
        nullable: bool,
    ) -> Result<SchemaKind, CompileError> {
        let type_path = child(path, "type");
        let mut names = Vec::new();
        for tag in tags {
            match tag.as_str() {
                Some(name) => names.push(name),
                None => {
                    return Err(CompileError::InvalidSchema {
                        path: type_path,
                        message: format!("type entries must be strings, got {}", json_type_name(tag)),
                    })
                }
            }
        }

        let nullable = nullable || names.contains(&"null");
        let others: Vec<&str> = names.into_iter().filter(|name| *name != "null").collect();

        let kind = match others.as_slice() {
            [] => {
                let field_type = self.registry.resolve_tag("null", &type_path)?;
                return self.build_kind(field_type, map, path);
            }
            [single] => {
                let field_type = self.registry.resolve_tag(single, &type_path)?;
                self.build_kind(field_type, map, path)?
            }
            several => {
                let mut alternatives = Vec::new();
                for (i, tag) in several.iter().enumerate() {
                    let alt_path = format!("{}/{}", type_path, i);
                    let field_type = self.registry.resolve_tag(tag, &alt_path)?;
                    let kind = self.build_kind(field_type, map, path)?;
                    alternatives.push(Arc::new(self.template(map, &alt_path, kind)?));
                }
                SchemaKind::MultiSchema(MultiSchema {
                    composition: Composition::AnyOf,
                    alternatives,
                })
            }
        };

        if nullable {
            self.wrap_nullable(map, path, kind)
        } else {
            Ok(kind)
        }
    }

    fn wrap_nullable(
        &self,
        map: &Map<String, Value>,
        path: &str,
        underlying: SchemaKind,
    ) -> Result<SchemaKind, CompileError> {
        self.registry.resolve_tag(FieldType::Null.tag(), path)?;
        let inner = self.template(map, path, underlying)?;
        Ok(SchemaKind::Null(Some(Arc::new(inner))))
    }

    fn build_kind(
        &mut self,
        field_type: FieldType,
        map: &Map<String, Value>,
        path: &str,
    ) -> Result<SchemaKind, CompileError> {
        match field_type {
            FieldType::Scalar(kind) => Ok(SchemaKind::Scalar(kind)),
            FieldType::Null => Ok(SchemaKind::Null(None)),
            FieldType::Array => {
                let items_path = child(path, "items");
                let items = match map.get("items") {
                    None => Arc::new(Schema::any(&items_path)),
                    Some(Value::Array(_)) => {
                        return Err(CompileError::InvalidSchema {
                            path: items_path,
                            message: "tuple items are not supported".to_string(),
                        })
                    }
                    Some(items) => self.compile(items, &items_path)?,
                };
                Ok(SchemaKind::Array(items))
            }
            FieldType::Object => Ok(SchemaKind::Object(self.compile_object_schema(map, path)?)),
            FieldType::MultiSchema => {
                let (composition, key) = if map.contains_key("oneOf") {
                    if map.contains_key("anyOf") {
                        warn!(%path, "both oneOf and anyOf present, using oneOf");
                    }
                    (Composition::OneOf, "oneOf")
                } else if map.contains_key("anyOf") {
                    (Composition::AnyOf, "anyOf")
                } else {
                    return Err(CompileError::InvalidSchema {
                        path: path.to_string(),
                        message: "multischema requires oneOf or anyOf".to_string(),
                    });
                };

                let Some(Value::Array(branches)) = map.get(key) else {
                    return Err(CompileError::InvalidSchema {
                        path: child(path, key),
                        message: format!("{} must be an array", key),
                    });
                };

                let mut alternatives = Vec::with_capacity(branches.len());
                for (i, branch) in branches.iter().enumerate() {
                    let branch_path = format!("{}/{}/{}", path, key, i);
                    alternatives.push(self.compile(branch, &branch_path)?);
                }
                Ok(SchemaKind::MultiSchema(MultiSchema {
                    composition,
                    alternatives,
                }))
            }
        }
    }

    fn compile_object_schema(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
    ) -> Result<ObjectSchema, CompileError> {
        let props_path = child(path, "properties");
        let raw_properties = match map.get("properties") {
            None => None,
            Some(Value::Object(props)) => Some(props),
            Some(other) => {
                return Err(CompileError::InvalidSchema {
                    path: props_path,
                    message: format!("expected object, got {}", json_type_name(other)),
                })
            }
        };

        let mut properties = Vec::new();
        if let Some(props) = raw_properties {
            for (name, prop) in props {
                let compiled = self.compile(prop, &child(&props_path, name))?;
                properties.push((name.clone(), compiled));
            }
        }

        let required = compile_required(map, path, &properties)?;

        let additional = match map.get("additionalProperties") {
            Some(Value::Bool(false)) => AdditionalProperties::Closed,
            Some(Value::Bool(true)) => AdditionalProperties::Open(None),
            Some(schema @ Value::Object(_)) => AdditionalProperties::Open(Some(
                self.compile(schema, &child(path, "additionalProperties"))?,
            )),
            Some(other) => {
                return Err(CompileError::InvalidSchema {
                    path: child(path, "additionalProperties"),
                    message: format!("expected boolean or schema, got {}", json_type_name(other)),
                })
            }
            None if self.options.strict => AdditionalProperties::Closed,
            None => AdditionalProperties::Open(None),
        };

        let projection = compile_projection(map, raw_properties, path)?;
        if let Some(output) = projection.duplicate_output() {
            return Err(CompileError::InvalidSchema {
                path: path.to_string(),
                message: format!("output key \"{}\" is claimed twice", output),
            });
        }

        Ok(ObjectSchema {
            properties,
            required,
            additional,
            projection,
        })
    }
}

fn infer_tag(map: &Map<String, Value>) -> &'static str {
    if map.contains_key("properties")
        || map.contains_key("additionalProperties")
        || map.contains_key("required")
    {
        FieldType::Object.tag()
    } else if map.contains_key("items") {
        FieldType::Array.tag()
    } else {
        ScalarKind::Any.tag()
    }
}

/// Type check for defaults, without following references.
fn shallow_accepts(schema: &Schema, value: &Value) -> bool {
    match &schema.kind {
        SchemaKind::Scalar(kind) => kind.accepts(value),
        SchemaKind::Null(None) => value.is_null(),
        SchemaKind::Null(Some(inner)) => value.is_null() || shallow_accepts(inner, value),
        SchemaKind::Array(_) => value.is_array(),
        SchemaKind::Object(_) => value.is_object(),
        SchemaKind::MultiSchema(_) | SchemaKind::Ref(_) => true,
    }
}

fn merge_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match key.as_str() {
            "properties" => {
                let Value::Object(incoming) = value else {
                    continue;
                };
                let entry = target
                    .entry("properties")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(existing) = entry {
                    for (name, prop) in incoming {
                        existing.entry(name).or_insert(prop);
                    }
                }
            }
            "required" => {
                let Value::Array(incoming) = value else {
                    continue;
                };
                let entry = target
                    .entry("required")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(existing) = entry {
                    for name in incoming {
                        if !existing.contains(&name) {
                            existing.push(name);
                        }
                    }
                }
            }
            _ => {
                target.entry(key).or_insert(value);
            }
        }
    }
}

fn compile_required(
    map: &Map<String, Value>,
    path: &str,
    properties: &[(String, SchemaRef)],
) -> Result<BTreeSet<String>, CompileError> {
    let required_path = child(path, "required");
    let names = match map.get("required") {
        None => return Ok(BTreeSet::new()),
        Some(Value::Array(names)) => names,
        Some(other) => {
            return Err(CompileError::InvalidSchema {
                path: required_path,
                message: format!("expected array, got {}", json_type_name(other)),
            })
        }
    };

    let mut required = BTreeSet::new();
    for name in names {
        let Some(name) = name.as_str() else {
            return Err(CompileError::InvalidSchema {
                path: required_path,
                message: format!("required entries must be strings, got {}", json_type_name(name)),
            });
        };
        if !properties.iter().any(|(declared, _)| declared == name) {
            return Err(CompileError::InvalidSchema {
                path: required_path,
                message: format!("required property \"{}\" is not declared", name),
            });
        }
        required.insert(name.to_string());
    }
    Ok(required)
}

/// Derive an object's projection from its annotations.
///
/// `x-role` wins over the parallel `x-editable` / `x-output-map` lists,
/// which win over per-property annotations.
pub(crate) fn compile_projection(
    map: &Map<String, Value>,
    properties: Option<&Map<String, Value>>,
    path: &str,
) -> Result<ProjectionModel, CompileError> {
    if let Some(role) = map.get(ROLE_ANNOTATION) {
        let Value::String(role) = role else {
            return Err(invalid_annotation(ROLE_ANNOTATION, path, "string", role));
        };
        return role_projection(role).ok_or_else(|| CompileError::UnknownRole {
            role: role.clone(),
            path: path.to_string(),
        });
    }

    let editable = match map.get(EDITABLE_ANNOTATION) {
        Some(Value::Array(names)) => Some(string_list(names, EDITABLE_ANNOTATION, path)?),
        Some(Value::Bool(_)) | None => None,
        Some(other) => {
            return Err(invalid_annotation(
                EDITABLE_ANNOTATION,
                path,
                "boolean or array",
                other,
            ))
        }
    };
    let output_map = match map.get(OUTPUT_MAP_ANNOTATION) {
        None => None,
        Some(Value::Array(entries)) => Some(output_map_entries(entries, path)?),
        Some(other) => return Err(invalid_annotation(OUTPUT_MAP_ANNOTATION, path, "array", other)),
    };

    if editable.is_some() || output_map.is_some() {
        return ProjectionModel::from_parallel(
            &editable.unwrap_or_default(),
            &output_map.unwrap_or_default(),
            path,
        );
    }

    let mut model = ProjectionModel::new();
    for (name, prop) in properties.into_iter().flatten() {
        let prop_path = child(&child(path, "properties"), name);

        match prop.get(PROJECTED_ANNOTATION) {
            None | Some(Value::Bool(true)) => {}
            Some(Value::Bool(false)) => continue,
            Some(other) => {
                return Err(invalid_annotation(PROJECTED_ANNOTATION, &prop_path, "boolean", other))
            }
        }

        let output = match prop.get(OUTPUT_ANNOTATION) {
            None => "",
            Some(Value::String(output)) => output.as_str(),
            Some(other) => {
                return Err(invalid_annotation(OUTPUT_ANNOTATION, &prop_path, "string", other))
            }
        };

        let entry = ProjectionEntry::new(name.as_str(), output);
        model = match prop.get(EDITABLE_ANNOTATION) {
            Some(Value::Bool(false)) => model.with(entry.read_only()),
            Some(Value::Bool(true)) | Some(Value::Array(_)) | None => model.with(entry),
            Some(other) => {
                return Err(invalid_annotation(
                    EDITABLE_ANNOTATION,
                    &prop_path,
                    "boolean",
                    other,
                ))
            }
        };
    }
    Ok(model)
}

fn string_list(names: &[Value], key: &str, path: &str) -> Result<Vec<String>, CompileError> {
    names
        .iter()
        .map(|name| {
            name.as_str()
                .map(String::from)
                .ok_or_else(|| invalid_annotation(key, path, "array of strings", name))
        })
        .collect()
}

fn output_map_entries(
    entries: &[Value],
    path: &str,
) -> Result<Vec<(String, String)>, CompileError> {
    entries
        .iter()
        .map(|entry| match entry {
            Value::String(name) => Ok((name.clone(), String::new())),
            Value::Object(obj) => {
                let property = obj
                    .get("property")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid_annotation(OUTPUT_MAP_ANNOTATION, path, "{property, output}", entry))?;
                let output = match obj.get("output") {
                    None => "",
                    Some(Value::String(output)) => output.as_str(),
                    Some(_) => {
                        return Err(invalid_annotation(
                            OUTPUT_MAP_ANNOTATION,
                            path,
                            "{property, output}",
                            entry,
                        ))
                    }
                };
                Ok((property.to_string(), output.to_string()))
            }
            other => Err(invalid_annotation(
                OUTPUT_MAP_ANNOTATION,
                path,
                "string or {property, output}",
                other,
            )),
        })
        .collect()
}

fn invalid_annotation(key: &str, path: &str, expected: &str, actual: &Value) -> CompileError {
    CompileError::InvalidAnnotation {
        key: key.to_string(),
        path: path.to_string(),
        expected: expected.to_string(),
        actual: json_type_name(actual).to_string(),
    }
}

fn compile_constraints(map: &Map<String, Value>, path: &str) -> Result<Constraints, CompileError> {
    let mut constraints = Constraints {
        min_length: count(map, "minLength", path)?,
        max_length: count(map, "maxLength", path)?,
        minimum: number(map, "minimum", path)?,
        maximum: number(map, "maximum", path)?,
        multiple_of: number(map, "multipleOf", path)?,
        min_items: count(map, "minItems", path)?,
        max_items: count(map, "maxItems", path)?,
        unique_items: map.get("uniqueItems") == Some(&Value::Bool(true)),
        const_value: map.get("const").cloned(),
        ..Constraints::default()
    };

    // Draft-4 style booleans turn the inclusive bound exclusive.
    match map.get("exclusiveMinimum") {
        Some(Value::Bool(true)) => constraints.exclusive_minimum = constraints.minimum.take(),
        Some(Value::Bool(false)) | None => {}
        Some(_) => constraints.exclusive_minimum = number(map, "exclusiveMinimum", path)?,
    }
    match map.get("exclusiveMaximum") {
        Some(Value::Bool(true)) => constraints.exclusive_maximum = constraints.maximum.take(),
        Some(Value::Bool(false)) | None => {}
        Some(_) => constraints.exclusive_maximum = number(map, "exclusiveMaximum", path)?,
    }
    Ok(constraints)
}

fn count(map: &Map<String, Value>, key: &str, path: &str) -> Result<Option<u64>, CompileError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| CompileError::InvalidSchema {
            path: child(path, key),
            message: format!("expected non-negative integer, got {}", value),
        }),
    }
}

fn number(map: &Map<String, Value>, key: &str, path: &str) -> Result<Option<Number>, CompileError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.clone())),
        Some(other) => Err(CompileError::InvalidSchema {
            path: child(path, key),
            message: format!("expected number, got {}", json_type_name(other)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(schema: Value) -> Result<SchemaSet, CompileError> {
        SchemaSet::compile_default(&schema)
    }

    fn object(set: &SchemaSet) -> &ObjectSchema {
        match set.root().kind() {
            SchemaKind::Object(obj) => obj,
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn scalar_types_dispatch_through_registry() {
        let set = compile(json!({"type": "integer", "minimum": 1})).unwrap();
        assert_eq!(
            set.root().field_type(),
            Some(FieldType::Scalar(ScalarKind::Integer))
        );
        assert_eq!(set.root().constraints().minimum, Some(Number::from(1)));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = compile(json!({
            "type": "object",
            "properties": { "when": { "type": "date" } }
        }));
        assert!(matches!(
            result,
            Err(CompileError::UnknownType { tag, path }) if tag == "date" && path == "/properties/when/type"
        ));
    }

    #[test]
    fn one_of_becomes_multischema() {
        let set = compile(json!({
            "oneOf": [{ "type": "string" }, { "type": "integer" }]
        }))
        .unwrap();
        match set.root().kind() {
            SchemaKind::MultiSchema(multi) => {
                assert_eq!(multi.composition, Composition::OneOf);
                assert_eq!(multi.alternatives.len(), 2);
            }
            other => panic!("expected multischema, got {:?}", other),
        }
    }

    #[test]
    fn any_of_keeps_composition_kind() {
        let set = compile(json!({"anyOf": [{ "type": "string" }]})).unwrap();
        assert!(matches!(
            set.root().kind(),
            SchemaKind::MultiSchema(MultiSchema { composition: Composition::AnyOf, .. })
        ));
    }

    #[test]
    fn type_union_with_null_wraps_underlying() {
        let set = compile(json!({"type": ["string", "null"], "maxLength": 4})).unwrap();
        match set.root().kind() {
            SchemaKind::Null(Some(inner)) => {
                assert_eq!(
                    inner.field_type(),
                    Some(FieldType::Scalar(ScalarKind::String))
                );
                assert_eq!(inner.constraints().max_length, Some(4));
            }
            other => panic!("expected nullable wrapper, got {:?}", other),
        }
        assert_eq!(set.root().constraints().max_length, None);
    }

    #[test]
    fn nullable_keyword_wraps_underlying() {
        let set = compile(json!({"type": "object", "nullable": true})).unwrap();
        assert!(matches!(set.root().kind(), SchemaKind::Null(Some(_))));
    }

    #[test]
    fn pure_null_type() {
        let set = compile(json!({"type": "null"})).unwrap();
        assert!(matches!(set.root().kind(), SchemaKind::Null(None)));
    }

    #[test]
    fn multi_type_union_becomes_any_of() {
        let set = compile(json!({"type": ["string", "integer"]})).unwrap();
        assert!(matches!(
            set.root().kind(),
            SchemaKind::MultiSchema(MultiSchema { composition: Composition::AnyOf, alternatives }) if alternatives.len() == 2
        ));
    }

    #[test]
    fn untyped_schemas_are_inferred() {
        let set = compile(json!({"properties": {"a": {}}})).unwrap();
        assert_eq!(set.root().field_type(), Some(FieldType::Object));
        let set = compile(json!({"items": {"type": "string"}})).unwrap();
        assert_eq!(set.root().field_type(), Some(FieldType::Array));
        let set = compile(json!({})).unwrap();
        assert_eq!(
            set.root().field_type(),
            Some(FieldType::Scalar(ScalarKind::Any))
        );
    }

    #[test]
    fn all_of_merges_structurally() {
        let set = compile(json!({
            "$defs": {
                "named": {
                    "type": "object",
                    "required": ["name"],
                    "properties": { "name": { "type": "string" } }
                }
            },
            "allOf": [
                { "$ref": "#/$defs/named" },
                {
                    "required": ["id"],
                    "properties": { "id": { "type": "integer" } }
                }
            ]
        }))
        .unwrap();

        let obj = object(&set);
        let names: Vec<_> = obj.properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["name", "id"]);
        assert!(obj.required.contains("name"));
        assert!(obj.required.contains("id"));
    }

    #[test]
    fn recursive_refs_terminate() {
        let set = compile(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "children": { "type": "array", "items": { "$ref": "#" } }
            }
        }))
        .unwrap();
        let obj = object(&set);
        let SchemaKind::Array(items) = obj.property("children").unwrap().kind() else {
            panic!("expected array");
        };
        assert!(Arc::ptr_eq(set.resolve(items), set.root()));
    }

    #[test]
    fn broken_ref_is_rejected() {
        let result = compile(json!({
            "type": "object",
            "properties": { "a": { "$ref": "#/$defs/missing" } }
        }));
        assert!(matches!(
            result,
            Err(CompileError::BrokenRef { reference, .. }) if reference == "#/$defs/missing"
        ));
    }

    #[test]
    fn external_ref_is_rejected() {
        let result = compile(json!({"$ref": "types.json#/thing"}));
        assert!(matches!(result, Err(CompileError::BrokenRef { .. })));
    }

    #[test]
    fn pure_ref_cycle_is_rejected() {
        let result = compile(json!({
            "$defs": {
                "a": { "$ref": "#/$defs/b" },
                "b": { "$ref": "#/$defs/a" }
            },
            "type": "object",
            "properties": { "x": { "$ref": "#/$defs/a" } }
        }));
        assert!(matches!(result, Err(CompileError::CircularRef { .. })));
    }

    #[test]
    fn mismatched_default_is_rejected() {
        let result = compile(json!({"type": "integer", "default": "one"}));
        assert!(matches!(
            result,
            Err(CompileError::InvalidDefault { expected, .. }) if expected == "integer"
        ));
    }

    #[test]
    fn required_must_be_declared() {
        let result = compile(json!({
            "type": "object",
            "required": ["ghost"],
            "properties": {}
        }));
        assert!(matches!(result, Err(CompileError::InvalidSchema { .. })));
    }

    #[test]
    fn strict_closes_unannotated_objects() {
        let schema = json!({"type": "object", "properties": {}});
        let open = SchemaSet::compile(
            &schema,
            &FieldTypeRegistry::standard(),
            &CompileOptions::new(),
        )
        .unwrap();
        assert!(!object(&open).is_closed());

        let strict = SchemaSet::compile(
            &schema,
            &FieldTypeRegistry::standard(),
            &CompileOptions::new().strict(true),
        )
        .unwrap();
        assert!(object(&strict).is_closed());

        let explicit = SchemaSet::compile(
            &json!({"type": "object", "additionalProperties": true}),
            &FieldTypeRegistry::standard(),
            &CompileOptions::new().strict(true),
        )
        .unwrap();
        assert!(!object(&explicit).is_closed());
    }

    #[test]
    fn property_annotations_build_projection() {
        let set = compile(json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "logo": { "type": "object", "x-output": "x-logo" },
                "version": { "type": "string", "x-editable": false },
                "draft": { "type": "boolean", "x-projected": false }
            }
        }))
        .unwrap();

        let projection = &object(&set).projection;
        assert_eq!(projection.output_name("logo"), Some("x-logo"));
        assert!(projection.is_editable("title"));
        assert!(!projection.is_editable("version"));
        assert_eq!(projection.output_name("version"), Some("version"));
        assert!(projection.entry("draft").is_none());
    }

    #[test]
    fn parallel_lists_build_projection() {
        let set = compile(json!({
            "type": "object",
            "x-editable": ["title", "description"],
            "x-output-map": ["title", { "property": "description", "output": "x-description" }],
            "properties": {
                "title": { "type": "string" },
                "description": { "type": "string" }
            }
        }))
        .unwrap();
        let projection = &object(&set).projection;
        assert_eq!(projection.output_name("description"), Some("x-description"));
    }

    #[test]
    fn parallel_lists_reject_unmapped_editable() {
        let result = compile(json!({
            "type": "object",
            "x-editable": ["title", "summary"],
            "x-output-map": ["title"],
            "properties": { "title": { "type": "string" }, "summary": { "type": "string" } }
        }));
        assert!(matches!(
            result,
            Err(CompileError::ProjectionMismatch { name, .. }) if name == "summary"
        ));
    }

    #[test]
    fn wrong_annotation_type_is_rejected() {
        let result = compile(json!({
            "type": "object",
            "properties": { "a": { "type": "string", "x-output": 7 } }
        }));
        assert!(matches!(
            result,
            Err(CompileError::InvalidAnnotation { key, actual, .. }) if key == "x-output" && actual == "number"
        ));
    }

    #[test]
    fn role_projection_is_applied() {
        let set = compile(json!({
            "type": "object",
            "x-role": "info",
            "properties": { "title": { "type": "string" }, "logo": { "type": "object" } }
        }))
        .unwrap();
        assert_eq!(object(&set).projection.output_name("logo"), Some("x-logo"));

        let result = compile(json!({"type": "object", "x-role": "nope"}));
        assert!(matches!(result, Err(CompileError::UnknownRole { .. })));
    }

    #[test]
    fn duplicate_output_keys_are_rejected() {
        let result = compile(json!({
            "type": "object",
            "properties": {
                "a": { "type": "string", "x-output": "key" },
                "b": { "type": "string", "x-output": "key" }
            }
        }));
        assert!(matches!(result, Err(CompileError::InvalidSchema { .. })));
    }

    #[test]
    fn boolean_exclusive_bounds() {
        let set = compile(json!({
            "type": "number",
            "minimum": 0,
            "exclusiveMinimum": true
        }))
        .unwrap();
        let constraints = set.root().constraints();
        assert_eq!(constraints.minimum, None);
        assert_eq!(constraints.exclusive_minimum, Some(Number::from(0)));
    }

    #[test]
    fn accepts_prefers_declared_keys_when_strict() {
        let set = compile(json!({
            "oneOf": [
                { "type": "object", "properties": { "name": { "type": "string" } } },
                { "type": "object", "properties": { "id": { "type": "integer" } } }
            ]
        }))
        .unwrap();
        let SchemaKind::MultiSchema(multi) = set.root().kind() else {
            panic!("expected multischema");
        };
        let value = json!({"id": 4});
        assert!(set.accepts(&multi.alternatives[0], &value, false));
        assert!(!set.accepts(&multi.alternatives[0], &value, true));
        assert!(set.accepts(&multi.alternatives[1], &value, true));
    }

    #[test]
    fn custom_registry_limits_tags() {
        let registry = FieldTypeRegistry::empty()
            .register("text", FieldType::Scalar(ScalarKind::String))
            .register("object", FieldType::Object);
        let schema = json!({
            "type": "object",
            "properties": { "name": { "type": "text" } }
        });
        let set = SchemaSet::compile(&schema, &registry, &CompileOptions::new()).unwrap();
        assert_eq!(
            object(&set).property("name").unwrap().field_type(),
            Some(FieldType::Scalar(ScalarKind::String))
        );

        let result = SchemaSet::compile(&json!({"type": "string"}), &registry, &CompileOptions::new());
        assert!(matches!(result, Err(CompileError::UnknownType { .. })));
    }
}
