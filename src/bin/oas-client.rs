//! OpenAPI Contract Client CLI
//!
//! Command-line interface for checking descriptions and validating payloads.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use oas_client::{
    base_uri_for, load_document, load_document_auto, Api, ClientOptions, ValidateError,
};

#[derive(Parser)]
#[command(name = "oas-client")]
#[command(about = "Check OpenAPI descriptions and validate payloads against them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a description and resolve every reference and schema
    Check {
        /// Description source: file path or URL (http:// or https://)
        doc: String,
    },

    /// List the operations of a description
    Operations {
        /// Description source: file path or URL (http:// or https://)
        doc: String,

        /// Only list operations carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Validate a payload against a component schema
    Validate {
        /// Payload file to validate (JSON or YAML)
        payload: PathBuf,

        /// Description source: file path or URL (http:// or https://)
        #[arg(long)]
        doc: String,

        /// Component schema name (e.g., Pet)
        #[arg(long)]
        schema: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Fail on discriminator values that match no mapping
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { doc } => run_check(&doc),
        Commands::Operations { doc, tag } => run_operations(&doc, tag.as_deref()),
        Commands::Validate {
            payload,
            doc,
            schema,
            json,
            strict,
        } => run_validate(&payload, &doc, &schema, json, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn build_api(source: &str, strict: bool, json_output: bool) -> Result<Api, u8> {
    let document = load_document_auto(source).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;
    let base = base_uri_for(source)
        .map(String::from)
        .unwrap_or_else(|| source.to_string());
    let options = ClientOptions::new().strict_discriminator(strict);
    Api::builder(base, document)
        .options(options)
        .build()
        .map_err(|e| {
            report_error(json_output, &e.to_string());
            e.exit_code() as u8
        })
}

fn run_check(source: &str) -> Result<(), u8> {
    let api = build_api(source, false, false)?;
    println!(
        "OK: {} operations, {} schemas",
        api.operations().len(),
        api.engine().len()
    );
    Ok(())
}

fn run_operations(source: &str, tag: Option<&str>) -> Result<(), u8> {
    let api = build_api(source, false, false)?;
    let operations = match tag {
        Some(tag) => api.operations_tagged(tag),
        None => api.operations().iter().collect(),
    };
    for operation in operations {
        println!(
            "{} {} {}",
            operation.operation_id.as_deref().unwrap_or("-"),
            operation.method,
            operation.path
        );
    }
    Ok(())
}

fn run_validate(
    payload_path: &Path,
    source: &str,
    schema: &str,
    json_output: bool,
    strict: bool,
) -> Result<(), u8> {
    let payload = load_document(payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;
    let api = build_api(source, strict, json_output)?;

    match api.validate(schema, &payload) {
        Ok(warnings) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": true,
                    "warnings": warnings
                });
                println!("{}", output);
            } else {
                for warning in &warnings {
                    eprintln!("Warning: {}: {}", warning.path, warning.message);
                }
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({"valid": false, "error": msg}));
    } else {
        eprintln!("Error: {}", msg);
    }
}
