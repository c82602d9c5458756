//! Error types for context composition
//!
//! Soft failures (a missing context file, a malformed state file) never reach
//! this type on the engine path; they are logged and replaced with empty
//! structures. What remains here is what a caller has to act on.

use thiserror::Error;

/// Main error type for context injection operations
#[derive(Error, Debug)]
pub enum ContextError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed header block on the authoritative validation path
    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid project configuration file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine settings could not be assembled
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Request-level failure of the injection pipeline
    #[error("Context injection failed at {stage} after {elapsed_ms}ms: {cause}")]
    Injection {
        stage: String,
        elapsed_ms: u64,
        cause: String,
    },

    /// External collaborator (gatherer, router) failed or is missing
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContextError {
    /// Whether this error means "the file is not there"
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContextError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Build a parse error for a path
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        ContextError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for context operations
pub type Result<T> = std::result::Result<T, ContextError>;
