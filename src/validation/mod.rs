//! Schema and structural validation
//!
//! Validation problems are accumulated into a [`ValidationResult`]; only
//! the strict file path returns errors.

pub mod files;
pub mod schema;
pub mod validator;

pub use crate::context::models::ValidationResult;
pub use files::{
    audit_project, infer_schema_type, validate_context_file, validate_context_files,
    BatchValidationReport, FileFailure, FileValidationResult,
};
pub use schema::{validate_context_schema, FieldType, SchemaType, KNOWN_AGENTS};
pub use validator::{ContextValidator, TOTAL_TIMING_KEY};
