//! Schema linting - static analysis of form schema files.
//!
//! Checks schema files for:
//! - JSON/YAML syntax errors
//! - Broken or external `$ref` references
//! - Unknown field types, malformed form annotations, projection mismatches
//!   and any other compile error
//! - Missing `title` (warning)

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::CompileError;
use crate::loader::load_schema;
use crate::pointer::navigate_fragment;
use crate::registry::FieldTypeRegistry;
use crate::schema::SchemaSet;
use crate::types::CompileOptions;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON path to the issue (e.g., "/properties/logo/x-output")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all `.json`, `.yaml` and
/// `.yml` files. If `strict` is true, warnings are treated as errors.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_schema_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        total_errors += count(&file_result, Severity::Error);
        total_warnings += count(&file_result, Severity::Warning);
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

fn count(result: &FileResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

/// Lint a single schema file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let mut diagnostics = Vec::new();
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();

    let schema = match load_schema(file) {
        Ok(s) => s,
        Err(e) => {
            diagnostics.push(diagnostic(
                Severity::Error,
                "E001",
                file,
                "/",
                format!("syntax error: {}", e),
            ));
            return FileResult {
                file: display,
                status: FileStatus::Error,
                diagnostics,
            };
        }
    };

    let broken_refs = check_refs(&schema, file, "", &schema, &mut diagnostics);

    // A broken ref is already reported with its exact location.
    match SchemaSet::compile(&schema, &FieldTypeRegistry::standard(), &CompileOptions::new()) {
        Ok(_) => {}
        Err(CompileError::BrokenRef { .. }) if broken_refs > 0 => {}
        Err(e) => {
            let (code, path) = compile_code(&e);
            diagnostics.push(diagnostic(Severity::Error, code, file, &path, e.to_string()));
        }
    }

    if schema.get("title").is_none() {
        diagnostics.push(diagnostic(
            Severity::Warning,
            "W001",
            file,
            "/",
            "schema missing title field".to_string(),
        ));
    }

    let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        FileStatus::Error
    } else if diagnostics.is_empty() {
        FileStatus::Ok
    } else {
        FileStatus::Warning
    };

    FileResult {
        file: display,
        status,
        diagnostics,
    }
}

fn diagnostic(
    severity: Severity,
    code: &str,
    file: &Path,
    path: &str,
    message: String,
) -> Diagnostic {
    Diagnostic {
        severity,
        code: code.to_string(),
        file: file.to_path_buf(),
        path: if path.is_empty() { "/" } else { path }.to_string(),
        message,
    }
}

/// Diagnostic code and location for a compile error.
fn compile_code(error: &CompileError) -> (&'static str, String) {
    match error {
        CompileError::BrokenRef { path, .. } => ("E002", path.clone()),
        CompileError::CircularRef { .. } => ("E003", "/".to_string()),
        CompileError::UnknownType { path, .. } => ("E004", path.clone()),
        CompileError::InvalidAnnotation { path, key, .. } => ("E005", format!("{}/{}", path, key)),
        CompileError::UnknownRole { path, .. } => ("E005", path.clone()),
        CompileError::ProjectionMismatch { path, .. } => ("E006", path.clone()),
        CompileError::InvalidDefault { path, .. } => ("E007", path.clone()),
        CompileError::InvalidSchema { path, .. } => ("E008", path.clone()),
    }
}

/// Recursively check `$ref` values. Returns the number of broken refs.
fn check_refs(
    value: &Value,
    file: &Path,
    path: &str,
    root: &Value,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let mut broken = 0;
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                let ref_path = format!("{}/$ref", path);
                if !reference.starts_with('#') {
                    diagnostics.push(diagnostic(
                        Severity::Error,
                        "E002",
                        file,
                        &ref_path,
                        format!("external reference not supported: {}", reference),
                    ));
                    broken += 1;
                } else if navigate_fragment(root, reference).is_none() {
                    diagnostics.push(diagnostic(
                        Severity::Error,
                        "E002",
                        file,
                        &ref_path,
                        format!("anchor not found: {}", reference),
                    ));
                    broken += 1;
                }
            }

            for (key, val) in map {
                // Literal data may legitimately contain "$ref" keys.
                if matches!(key.as_str(), "default" | "const" | "enum" | "examples") {
                    continue;
                }
                let child_path = format!("{}/{}", path, key);
                broken += check_refs(val, file, &child_path, root, diagnostics);
            }
        }
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                let child_path = format!("{}/{}", path, i);
                broken += check_refs(item, file, &child_path, root, diagnostics);
            }
        }
        _ => {}
    }
    broken
}

fn is_schema_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e, "json" | "yaml" | "yml"))
        .unwrap_or(false)
}

/// Collect all schema files in a path (file or directory).
fn collect_schema_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_schema_file(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_schema_file(&path) {
            files.push(path);
        }
    }
}
