//! Narrow interfaces to collaborators outside the composition engine
//!
//! Document loading, task gathering and task routing live elsewhere; the
//! engine only sees these traits.

use crate::context::frontmatter::{self, Document};
use crate::context::models::GatheredTaskContext;
use crate::error::{ContextError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Format-agnostic document loading
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load a document; a missing file is an `Io` error with `NotFound`
    async fn load_document(&self, path: &Path) -> Result<Document>;
}

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markdown,
    Json,
    Text,
}

impl DocumentFormat {
    /// Turn raw file text into a document
    pub fn decode(&self, text: &str) -> Result<Document> {
        match self {
            DocumentFormat::Markdown => Ok(frontmatter::parse(text)),
            DocumentFormat::Json => match serde_json::from_str::<Value>(text)? {
                Value::Object(header) => Ok(Document::new(header, "")),
                other => {
                    let mut header = Map::new();
                    header.insert("value".to_string(), other);
                    Ok(Document::new(header, ""))
                }
            },
            DocumentFormat::Text => Ok(Document::body_only(text)),
        }
    }
}

/// Pick a format from the file extension
pub fn format_for_path(path: &Path) -> DocumentFormat {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("md") | Some("markdown") => DocumentFormat::Markdown,
        Some("json") => DocumentFormat::Json,
        _ => DocumentFormat::Text,
    }
}

/// Filesystem loader dispatching on extension
#[derive(Debug, Clone, Default)]
pub struct FsDocumentLoader;

#[async_trait]
impl DocumentLoader for FsDocumentLoader {
    async fn load_document(&self, path: &Path) -> Result<Document> {
        let text = fs::read_to_string(path).await?;
        let format = format_for_path(path);
        debug!("Loaded {} as {:?}", path.display(), format);
        format.decode(&text)
    }
}

/// Load a document, mapping a missing file to `None`
pub async fn load_optional(loader: &dyn DocumentLoader, path: &Path) -> Result<Option<Document>> {
    match loader.load_document(path).await {
        Ok(doc) => Ok(Some(doc)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read a text file, mapping a missing file to `None`
pub async fn read_optional_text(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Request passed to the task gatherer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatherRequest {
    pub spec_id: Option<String>,
    pub task_id: Option<String>,
    pub agent_type: String,
    pub include_files: bool,
    pub use_cache: bool,
}

/// Gathers task-specific material for automated agents
#[async_trait]
pub trait TaskGatherer: Send + Sync {
    async fn gather_task_context(&self, request: GatherRequest) -> Result<GatheredTaskContext>;
}

/// A task proposed by the router
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCandidate {
    pub spec_id: String,
    pub task_id: String,
    #[serde(default)]
    pub priority: Option<String>,
    /// Router-specific fields passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Finds the next tasks suitable for an agent
#[async_trait]
pub trait TaskRouter: Send + Sync {
    async fn get_next_task(&self, agent_type: &str, preferences: &Value) -> Result<Vec<TaskCandidate>>;
}

/// Wrap a collaborator failure
pub fn collaborator_error(what: &str, err: impl std::fmt::Display) -> ContextError {
    ContextError::Collaborator(format!("{what}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_dispatch() {
        assert_eq!(format_for_path(&PathBuf::from("a/b.md")), DocumentFormat::Markdown);
        assert_eq!(format_for_path(&PathBuf::from("a/b.MARKDOWN")), DocumentFormat::Markdown);
        assert_eq!(format_for_path(&PathBuf::from("state.json")), DocumentFormat::Json);
        assert_eq!(format_for_path(&PathBuf::from("notes.txt")), DocumentFormat::Text);
        assert_eq!(format_for_path(&PathBuf::from("README")), DocumentFormat::Text);
    }

    #[test]
    fn test_json_decode() {
        let doc = DocumentFormat::Json.decode(r#"{"a": 1}"#).unwrap();
        assert_eq!(doc.header["a"], 1);
        assert!(doc.body.is_empty());

        let doc = DocumentFormat::Json.decode("[1, 2]").unwrap();
        assert!(doc.header["value"].is_array());

        assert!(DocumentFormat::Json.decode("{broken").is_err());
    }

    #[tokio::test]
    async fn test_fs_loader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsDocumentLoader;
        let missing = dir.path().join("nope.md");

        let err = loader.load_document(&missing).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(load_optional(&loader, &missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_loader_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.md");
        std::fs::write(&path, "---\ncapabilities: [api]\n---\nBody").unwrap();

        let doc = FsDocumentLoader.load_document(&path).await.unwrap();
        assert_eq!(doc.string_list("capabilities"), vec!["api"]);
        assert_eq!(doc.body, "Body");
    }

    #[test]
    fn test_candidate_keeps_extra_fields() {
        let candidate: TaskCandidate = serde_json::from_value(serde_json::json!({
            "specId": "FEAT-1",
            "taskId": "T-1",
            "priority": "P1",
            "title": "Add cache"
        }))
        .unwrap();
        assert_eq!(candidate.priority.as_deref(), Some("P1"));
        assert_eq!(candidate.extra["title"], "Add cache");
    }
}
