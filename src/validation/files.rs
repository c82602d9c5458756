//! File-level validation and project audits
//!
//! Unlike the engine, these checks parse headers strictly: a malformed
//! header is a `Parse` error for the caller.

use super::schema::{validate_context_schema, SchemaType};
use crate::context::frontmatter;
use crate::context::models::ValidationResult;
use crate::error::{ContextError, Result};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

const CONTEXT_SUFFIX: &str = "-context.md";
const SPEC_PREFIX: &str = "FEAT-";

/// Outcome of validating one context file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileValidationResult {
    pub path: PathBuf,
    pub schema_type: Option<SchemaType>,
    pub result: ValidationResult,
}

/// A file that could not be read or parsed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of validating a set of files
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchValidationReport {
    pub results: Vec<FileValidationResult>,
    pub failures: Vec<FileFailure>,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl BatchValidationReport {
    pub fn all_valid(&self) -> bool {
        self.invalid == 0
    }
}

/// Infer the schema from naming conventions
pub fn infer_schema_type(path: &Path) -> Option<SchemaType> {
    let file_name = path.file_name()?.to_str()?;

    if path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == "agents")
    {
        return Some(SchemaType::Agent);
    }
    if file_name == "project.md" {
        return Some(SchemaType::Project);
    }
    if file_name.ends_with(CONTEXT_SUFFIX) {
        if file_name.starts_with(SPEC_PREFIX) {
            return Some(SchemaType::Spec);
        }
        return Some(SchemaType::Task);
    }
    None
}

/// Load, strictly parse and schema-check one file.
///
/// Without `expected` the schema is inferred from the path; when nothing
/// can be inferred only the header syntax is checked.
pub async fn validate_context_file(
    path: &Path,
    expected: Option<SchemaType>,
) -> Result<FileValidationResult> {
    let text = fs::read_to_string(path).await?;
    let document = frontmatter::parse_strict(&text, &path.display().to_string())?;

    let schema_type = expected.or_else(|| infer_schema_type(path));
    let mut result = ValidationResult::new();
    match schema_type {
        Some(schema_type) => validate_context_schema(&document.header, schema_type, &mut result),
        None => result.warning(format!(
            "Could not determine the schema of {}",
            path.display()
        )),
    }
    result.finish();

    Ok(FileValidationResult {
        path: path.to_path_buf(),
        schema_type,
        result,
    })
}

/// Validate several files, inferring each schema; unreadable or malformed
/// files are recorded as failures and count as invalid.
pub async fn validate_context_files(paths: &[PathBuf]) -> BatchValidationReport {
    let outcomes = join_all(paths.iter().map(|path| validate_context_file(path, None))).await;

    let mut report = BatchValidationReport {
        total: paths.len(),
        ..Default::default()
    };
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok(file) => {
                if file.result.is_valid {
                    report.valid += 1;
                } else {
                    report.invalid += 1;
                }
                report.results.push(file);
            }
            Err(e) => {
                warn!("Failed to validate {}: {}", path.display(), e);
                report.invalid += 1;
                report.failures.push(FileFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Validate every markdown file under the project's `.asd` directory
pub async fn audit_project(root: &Path) -> Result<BatchValidationReport> {
    let pattern = format!(
        "{}/.asd/**/*.md",
        glob::Pattern::escape(&root.to_string_lossy())
    );

    let entries = glob::glob(&pattern)
        .map_err(|e| ContextError::Internal(format!("invalid audit pattern {pattern}: {e}")))?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!("Skipping unreadable path during audit: {}", e),
        }
    }
    paths.sort();

    let report = validate_context_files(&paths).await;
    info!(
        total = report.total,
        valid = report.valid,
        invalid = report.invalid,
        "Audited project context"
    );
    Ok(report)
}
