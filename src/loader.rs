//! Loading form schemas and documents from files and strings.
//!
//! Files ending in `.yaml` or `.yml` are parsed as YAML, everything else as
//! JSON. Both land in a `serde_json::Value`.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::LoadError;

/// Text format of a schema or document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick the format from a file extension; unknown extensions are JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }
}

/// Load a form schema from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// `LoadError::ReadError` if it can't be read, or a parse error for the
/// format picked from its extension.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    load_file(path)
}

/// Load a document (the data a form is seeded with) from a file path.
///
/// Same rules as [`load_schema`].
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    load_file(path)
}

fn load_file(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let format = Format::from_path(path);
    debug!(path = %path.display(), ?format, bytes = content.len(), "loaded file");
    load_str(&content, format)
}

/// Parse a string in the given format.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` or `LoadError::InvalidYaml`.
pub fn load_str(content: &str, format: Format) -> Result<Value, LoadError> {
    match format {
        Format::Json => {
            serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
        }
        Format::Yaml => {
            serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })
        }
    }
}

/// Parse a JSON string.
pub fn load_schema_str(content: &str) -> Result<Value, LoadError> {
    load_str(content, Format::Json)
}
