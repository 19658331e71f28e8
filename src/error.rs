//! Error types for schema compilation, form editing, loading and validation.

use std::path::PathBuf;
use thiserror::Error;

use crate::messages::Rule;

/// Errors while compiling a JSON Schema into form templates.
///
/// All of these are configuration bugs in the schema and are surfaced
/// before any node is instantiated.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown field type \"{tag}\" at {path}")]
    UnknownType { tag: String, path: String },

    #[error("broken reference \"{reference}\" at {path}")]
    BrokenRef { reference: String, path: String },

    #[error("circular reference \"{reference}\" never reaches a schema")]
    CircularRef { reference: String },

    #[error("invalid {key} at {path}: expected {expected}, got {actual}")]
    InvalidAnnotation {
        key: String,
        path: String,
        expected: String,
        actual: String,
    },

    #[error("editable attribute \"{name}\" at {path} has no output mapping")]
    ProjectionMismatch { name: String, path: String },

    #[error("unknown projection role \"{role}\" at {path}")]
    UnknownRole { role: String, path: String },

    #[error("default at {path} does not match declared type \"{expected}\"")]
    InvalidDefault { path: String, expected: String },

    #[error("invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },
}

/// Structural rejections raised by field controllers.
///
/// An operation returning one of these has left the tree unchanged.
#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("index {index} out of range (length {len})")]
    Index { index: usize, len: usize },

    #[error("{rule} limit of {limit} items reached")]
    Capacity { rule: &'static str, limit: usize },

    #[error("property \"{name}\" is not declared and the object is closed")]
    UnknownProperty { name: String },

    #[error("property \"{name}\" is required and cannot be removed")]
    RequiredProperty { name: String },

    #[error("property \"{name}\" is read-only")]
    ReadOnly { name: String },

    #[error("no node at {path}")]
    NotFound { path: String },

    #[error("node at {path} is {actual}, expected {expected}")]
    KindMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors loading schema or document files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors during validation of a projected output document.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("invalid output schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<ValidationIssue> },
}

/// A single semantic validation finding.
///
/// Issues never block editing or projection; they are collected and
/// reported.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationIssue {
    /// JSON Pointer (RFC 6901) to the offending node, by internal name.
    pub path: String,
    /// Rule name from the message catalog (e.g. "minItems").
    pub rule: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    pub(crate) fn new(path: impl Into<String>, rule: &Rule, message: String) -> Self {
        Self {
            path: path.into(),
            rule: rule.name().to_string(),
            message,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

impl CompileError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl FormError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Compile(e) => e.exit_code(),
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}
