//! Schema Form CLI
//!
//! Command-line interface for projecting, validating and linting form
//! schemas and the documents edited with them.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use schema_form::{
    lint, load_document, load_schema, output_schema_with, validate_output, CompileOptions,
    Document, FieldTypeRegistry, FileStatus, Severity, ValidateError,
};

#[derive(Parser)]
#[command(name = "schema-form")]
#[command(about = "Build, project and validate schema-driven form documents")]
#[command(version)]
struct Cli {
    /// Log to stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a document from a form schema, apply edits, print the projection
    Project {
        /// Form schema file (JSON or YAML)
        schema: PathBuf,

        /// Existing document to seed the form with
        #[arg(long)]
        document: Option<PathBuf>,

        /// Select alternative N of the multischema at PTR (applied first)
        #[arg(long = "select", value_name = "PTR=N")]
        selects: Vec<String>,

        /// Set the field at PTR; VALUE is JSON, or a plain string
        #[arg(long = "set", value_name = "PTR=VALUE")]
        sets: Vec<String>,

        /// Remove the field at PTR (applied last)
        #[arg(long = "remove", value_name = "PTR")]
        removes: Vec<String>,

        /// Strict mode: close objects that don't allow additional properties
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a document against a form schema
    Validate {
        /// Form schema file
        schema: PathBuf,

        /// Document to validate
        document: PathBuf,

        /// The document is a projected output: check it against the output schema
        #[arg(long)]
        projected: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Strict mode: close objects that don't allow additional properties
        #[arg(long)]
        strict: bool,
    },

    /// Print the form outline: every projected field and whether it is editable
    Fields {
        /// Form schema file
        schema: PathBuf,

        /// Existing document to seed the form with
        #[arg(long)]
        document: Option<PathBuf>,

        /// Output the outline as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the JSON Schema of projected output documents
    OutputSchema {
        /// Form schema file
        schema: PathBuf,

        /// Strict mode: set additionalProperties=false on open objects
        #[arg(long)]
        strict: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Lint form schema files (syntax, refs, types, annotations, projections)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

struct ProjectArgs {
    schema: PathBuf,
    document: Option<PathBuf>,
    selects: Vec<String>,
    sets: Vec<String>,
    removes: Vec<String>,
    strict: bool,
    format: OutputFormat,
    pretty: bool,
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Project {
            schema,
            document,
            selects,
            sets,
            removes,
            strict,
            format,
            pretty,
            output,
        } => run_project(ProjectArgs {
            schema,
            document,
            selects,
            sets,
            removes,
            strict,
            format,
            pretty,
            output,
        }),

        Commands::Validate {
            schema,
            document,
            projected,
            json,
            strict,
        } => run_validate(&schema, &document, projected, json, strict),

        Commands::Fields {
            schema,
            document,
            json,
        } => run_fields(&schema, document.as_deref(), json),

        Commands::OutputSchema {
            schema,
            strict,
            pretty,
            output,
        } => run_output_schema(&schema, strict, pretty, output.as_deref()),

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print an error and turn its exit code into a process status.
fn fail(error: impl Display, code: i32) -> u8 {
    eprintln!("Error: {}", error);
    code as u8
}

fn open_document(
    schema_path: &Path,
    document_path: Option<&Path>,
    strict: bool,
    json_output: bool,
) -> Result<Document, u8> {
    let schema =
        load_schema(schema_path).map_err(|e| report_error(json_output, &e, e.exit_code()))?;
    let seed = document_path
        .map(load_document)
        .transpose()
        .map_err(|e| report_error(json_output, &e, e.exit_code()))?;

    let options = CompileOptions::new().strict(strict);
    Document::with_options(&schema, seed.as_ref(), &FieldTypeRegistry::standard(), &options)
        .map_err(|e| report_error(json_output, &e, e.exit_code()))
}

/// Split `PTR=VALUE` at the first `=`.
fn split_assignment(arg: &str) -> Result<(&str, &str), u8> {
    arg.split_once('=')
        .ok_or_else(|| fail(format!("expected PTR=VALUE, got \"{}\"", arg), 2))
}

/// Edit values are JSON when they parse as JSON, plain strings otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn run_project(args: ProjectArgs) -> Result<(), u8> {
    let mut doc = open_document(&args.schema, args.document.as_deref(), args.strict, false)?;

    for select in &args.selects {
        let (pointer, index) = split_assignment(select)?;
        let index: usize = index
            .parse()
            .map_err(|_| fail(format!("invalid alternative index \"{}\"", index), 2))?;
        doc.select(pointer, index)
            .map_err(|e| fail(format!("{}: {}", pointer, e), e.exit_code()))?;
        debug!(pointer, index, "selected alternative");
    }

    for set in &args.sets {
        let (pointer, raw) = split_assignment(set)?;
        doc.set(pointer, &parse_value(raw))
            .map_err(|e| fail(format!("{}: {}", pointer, e), e.exit_code()))?;
        debug!(pointer, "set field");
    }

    for pointer in &args.removes {
        doc.remove(pointer)
            .map_err(|e| fail(format!("{}: {}", pointer, e), e.exit_code()))?;
        debug!(pointer = %pointer, "removed field");
    }

    write_output(&doc.serialize(), args.format, args.pretty, args.output.as_deref())
}

fn write_output(
    value: &Value,
    format: OutputFormat,
    pretty: bool,
    output: Option<&Path>,
) -> Result<(), u8> {
    let text = match format {
        OutputFormat::Json if pretty => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        OutputFormat::Json => serde_json::to_string(value).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
    }
    .map_err(|e| fail(format!("serializing output: {}", e), 2))?;

    match output {
        Some(path) => std::fs::write(path, &text)
            .map_err(|e| fail(format!("writing to {}: {}", path.display(), e), 3)),
        None => {
            println!("{}", text.trim_end());
            Ok(())
        }
    }
}

fn run_validate(
    schema_path: &Path,
    document_path: &Path,
    projected: bool,
    json_output: bool,
    strict: bool,
) -> Result<(), u8> {
    let issues = if projected {
        let schema = load_schema(schema_path).map_err(|e| report_error(json_output, &e, e.exit_code()))?;
        let document =
            load_document(document_path).map_err(|e| report_error(json_output, &e, e.exit_code()))?;
        match validate_output(&schema, &document) {
            Ok(()) => Vec::new(),
            Err(ValidateError::Invalid { errors }) => errors,
            Err(e) => return Err(report_error(json_output, &e, e.exit_code())),
        }
    } else {
        let mut doc = open_document(schema_path, Some(document_path), strict, json_output)?;
        doc.validate().to_vec()
    };

    if issues.is_empty() {
        if json_output {
            println!(r#"{{"valid":true}}"#);
        } else {
            println!("Valid");
        }
        return Ok(());
    }

    if json_output {
        let output = serde_json::json!({
            "valid": false,
            "errors": issues
        });
        println!("{}", output);
    } else {
        eprintln!("Validation failed:");
        for issue in &issues {
            eprintln!("  {}", issue);
        }
    }
    Err(1)
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, error: impl Display, code: i32) -> u8 {
    if json_output {
        let output = serde_json::json!({ "valid": false, "error": error.to_string() });
        println!("{}", output);
        code as u8
    } else {
        fail(error, code)
    }
}

fn run_fields(schema_path: &Path, document_path: Option<&Path>, json_output: bool) -> Result<(), u8> {
    let doc = open_document(schema_path, document_path, false, false)?;
    let fields = doc.editable_fields();

    if json_output {
        let text = serde_json::to_string_pretty(&fields)
            .map_err(|e| fail(format!("serializing output: {}", e), 2))?;
        println!("{}", text);
        return Ok(());
    }

    for field in &fields {
        let mut flags = Vec::new();
        if field.required {
            flags.push("required");
        }
        if !field.editable {
            flags.push("read-only");
        }
        let renamed = match field.pointer.rsplit('/').next() {
            Some(name) if name != field.output => format!(" -> {}", field.output),
            _ => String::new(),
        };
        println!(
            "{:<32} {:<12}{}{}",
            field.pointer,
            field.field_type,
            renamed,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
    }
    Ok(())
}

fn run_output_schema(
    schema_path: &Path,
    strict: bool,
    pretty: bool,
    output: Option<&Path>,
) -> Result<(), u8> {
    let schema = load_schema(schema_path).map_err(|e| fail(&e, e.exit_code()))?;
    let options = CompileOptions::new().strict(strict);
    let projected = output_schema_with(&schema, &options).map_err(|e| fail(&e, e.exit_code()))?;
    write_output(&projected, OutputFormat::Json, pretty, output)
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        let text = serde_json::to_string_pretty(&result)
            .map_err(|e| fail(format!("serializing output: {}", e), 2))?;
        println!("{}", text);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
