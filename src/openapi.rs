//! Built-in projections for OpenAPI objects.
//!
//! An object schema opts in with `"x-role": "<role>"`. Each role is one
//! focused projection; objects that share a shape (contact, license, logo,
//! external docs) still get their own role so none of them exposes the
//! others' attributes.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::projection::{ProjectionEntry, ProjectionModel};

/// `(name, output, editable)`; an empty output keeps the name.
type Row = (&'static str, &'static str, bool);

const INFO: &[Row] = &[
    ("title", "", true),
    ("termsOfService", "", true),
    ("contact", "", true),
    ("license", "", true),
    ("logo", "x-logo", true),
    ("description", "", true),
    ("version", "", false),
];

const CONTACT: &[Row] = &[("name", "", true), ("url", "", true), ("email", "", true)];

const LICENSE: &[Row] = &[("name", "", true), ("url", "", true)];

const LOGO: &[Row] = &[
    ("url", "", true),
    ("altText", "", true),
    ("backgroundColor", "", true),
];

const EXTERNAL_DOCS: &[Row] = &[("description", "", true), ("url", "", true)];

const SERVER: &[Row] = &[
    ("url", "", true),
    ("description", "", true),
    ("variables", "", true),
];

const SERVER_VARIABLE: &[Row] = &[
    ("enum", "", true),
    ("default", "", true),
    ("description", "", true),
];

const TAG: &[Row] = &[
    ("name", "", true),
    ("description", "", true),
    ("externalDocs", "", true),
];

const PATH_ITEM: &[Row] = &[
    ("summary", "", true),
    ("description", "", true),
    ("get", "", true),
    ("put", "", true),
    ("post", "", true),
    ("delete", "", true),
    ("options", "", true),
    ("head", "", true),
    ("patch", "", true),
    ("trace", "", true),
    ("servers", "", true),
    ("parameters", "", true),
];

const OPERATION: &[Row] = &[
    ("tags", "", true),
    ("summary", "", true),
    ("description", "", true),
    ("externalDocs", "", true),
    ("operationId", "", true),
    ("parameters", "", true),
    ("requestBody", "", true),
    ("responses", "", true),
    ("deprecated", "", true),
    ("security", "", true),
    ("servers", "", true),
];

const PARAMETER: &[Row] = &[
    ("name", "", true),
    ("in", "", true),
    ("description", "", true),
    ("required", "", true),
    ("deprecated", "", true),
    ("allowEmptyValue", "", true),
];

/// An OpenAPI object kind with a built-in projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Info,
    Contact,
    License,
    Logo,
    ExternalDocs,
    Server,
    ServerVariable,
    Tag,
    PathItem,
    Operation,
    Parameter,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Info,
        Role::Contact,
        Role::License,
        Role::Logo,
        Role::ExternalDocs,
        Role::Server,
        Role::ServerVariable,
        Role::Tag,
        Role::PathItem,
        Role::Operation,
        Role::Parameter,
    ];

    /// Value used in `x-role`.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Info => "info",
            Role::Contact => "contact",
            Role::License => "license",
            Role::Logo => "logo",
            Role::ExternalDocs => "external-docs",
            Role::Server => "server",
            Role::ServerVariable => "server-variable",
            Role::Tag => "tag",
            Role::PathItem => "path-item",
            Role::Operation => "operation",
            Role::Parameter => "parameter",
        }
    }

    fn rows(&self) -> &'static [Row] {
        match self {
            Role::Info => INFO,
            Role::Contact => CONTACT,
            Role::License => LICENSE,
            Role::Logo => LOGO,
            Role::ExternalDocs => EXTERNAL_DOCS,
            Role::Server => SERVER,
            Role::ServerVariable => SERVER_VARIABLE,
            Role::Tag => TAG,
            Role::PathItem => PATH_ITEM,
            Role::Operation => OPERATION,
            Role::Parameter => PARAMETER,
        }
    }

    pub fn projection(&self) -> ProjectionModel {
        self.rows()
            .iter()
            .fold(ProjectionModel::new(), |model, &(name, output, editable)| {
                let entry = ProjectionEntry::new(name, output);
                model.with(if editable { entry } else { entry.read_only() })
            })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.name() == s)
            .ok_or(())
    }
}

/// Projection for an `x-role` value, if the role exists.
pub fn role_projection(role: &str) -> Option<ProjectionModel> {
    role.parse::<Role>().ok().map(|role| role.projection())
}

/// Form schema for the top of an OpenAPI document: `openapi`, `info`,
/// `servers`, `externalDocs` and `tags`, with the built-in roles applied.
pub fn document_schema() -> Value {
    json!({
        "title": "OpenAPI document",
        "type": "object",
        "required": ["openapi", "info"],
        "properties": {
            "openapi": { "type": "string", "default": "3.0.3" },
            "info": { "$ref": "#/$defs/info" },
            "servers": {
                "type": "array",
                "items": { "$ref": "#/$defs/server" }
            },
            "externalDocs": { "$ref": "#/$defs/externalDocs" },
            "tags": {
                "type": "array",
                "uniqueItems": true,
                "items": { "$ref": "#/$defs/tag" }
            }
        },
        "$defs": {
            "info": {
                "type": "object",
                "x-role": "info",
                "required": ["title", "version"],
                "properties": {
                    "title": { "type": "string", "minLength": 1 },
                    "version": { "type": "string" },
                    "termsOfService": { "type": "string" },
                    "description": { "type": "string" },
                    "contact": {
                        "type": ["object", "null"],
                        "x-role": "contact",
                        "properties": {
                            "name": { "type": "string" },
                            "url": { "type": "string" },
                            "email": { "type": "string" }
                        }
                    },
                    "license": {
                        "type": ["object", "null"],
                        "x-role": "license",
                        "required": ["name"],
                        "properties": {
                            "name": { "type": "string" },
                            "url": { "type": "string" }
                        }
                    },
                    "logo": {
                        "type": ["object", "null"],
                        "x-role": "logo",
                        "properties": {
                            "url": { "type": "string" },
                            "altText": { "type": "string" },
                            "backgroundColor": { "type": "string" }
                        }
                    }
                }
            },
            "server": {
                "type": "object",
                "x-role": "server",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string" },
                    "description": { "type": "string" },
                    "variables": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/serverVariable" }
                    }
                }
            },
            "serverVariable": {
                "type": "object",
                "x-role": "server-variable",
                "required": ["default"],
                "properties": {
                    "enum": { "type": "array", "items": { "type": "string" } },
                    "default": { "type": "string" },
                    "description": { "type": "string" }
                }
            },
            "externalDocs": {
                "type": "object",
                "x-role": "external-docs",
                "required": ["url"],
                "properties": {
                    "description": { "type": "string" },
                    "url": { "type": "string" }
                }
            },
            "tag": {
                "type": "object",
                "x-role": "tag",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "externalDocs": { "$ref": "#/$defs/externalDocs" }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_renames_logo_and_passes_version_through() {
        let model = role_projection("info").unwrap();
        assert_eq!(model.output_name("logo"), Some("x-logo"));
        assert!(model.is_editable("title"));
        assert!(!model.is_editable("version"));
        assert_eq!(model.output_name("version"), Some("version"));

        let editable: Vec<_> = model.editable_attributes().collect();
        assert_eq!(
            editable,
            ["title", "termsOfService", "contact", "license", "logo", "description"]
        );
    }

    #[test]
    fn url_roles_expose_only_their_attributes() {
        let contact = role_projection("contact").unwrap();
        let license = role_projection("license").unwrap();
        assert!(contact.entry("email").is_some());
        assert!(license.entry("email").is_none());
        assert!(role_projection("logo").unwrap().entry("name").is_none());
    }

    #[test]
    fn role_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.name().parse::<Role>(), Ok(role));
            assert!(role.projection().duplicate_output().is_none());
        }
        assert!(role_projection("webhook").is_none());
    }

    #[test]
    fn document_schema_compiles() {
        let schema = document_schema();
        assert!(crate::schema::SchemaSet::compile_default(&schema).is_ok());
    }
}
