//! Context store for static, dynamic and semi-dynamic context
//!
//! Static context is the project document, dynamic context the JSON state
//! files, semi-dynamic context the per-spec and per-task documents. Every
//! read on this path is soft: missing or malformed sources degrade to empty
//! structures and a warning.

use super::frontmatter::{self, Document};
use super::inheritance::{merge_inheritance, LevelContext};
use super::models::{ContextDocument, InheritedContext};
use super::paths::{ContextKind, ContextPaths};
use crate::collaborators::read_optional_text;
use crate::error::{ContextError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Project-level context
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    pub document: Option<Document>,
    pub constraints: Vec<String>,
    pub warnings: Vec<String>,
}

/// State-file context
#[derive(Debug, Clone, Default)]
pub struct DynamicContext {
    pub assignments: Map<String, Value>,
    pub progress: Map<String, Value>,
    pub warnings: Vec<String>,
}

/// Spec- and task-level context
#[derive(Debug, Clone, Default)]
pub struct SemiDynamicContext {
    pub spec: Option<LevelContext>,
    pub task: Option<LevelContext>,
    pub warnings: Vec<String>,
}

impl SemiDynamicContext {
    fn levels(&self) -> impl Iterator<Item = &LevelContext> {
        self.spec.iter().chain(self.task.iter())
    }

    /// Research findings of spec then task, concatenated
    pub fn research_findings(&self) -> Vec<String> {
        self.levels()
            .flat_map(|level| level.research_findings.iter().cloned())
            .collect()
    }

    /// Decisions of spec then task, concatenated
    pub fn decisions(&self) -> Vec<String> {
        self.levels()
            .flat_map(|level| level.decisions.iter().cloned())
            .collect()
    }
}

/// Header merge and optional body replacement for [`ContextStore::update_context`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextUpdate {
    #[serde(default)]
    pub header: Map<String, Value>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Reads and writes context documents under the project's `.asd` directory
#[derive(Debug, Clone)]
pub struct ContextStore {
    paths: ContextPaths,
}

impl ContextStore {
    pub fn new(paths: ContextPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ContextPaths {
        &self.paths
    }

    /// Read a context document; `None` when the file does not exist
    pub async fn read_document(&self, path: &Path) -> Result<Option<Document>> {
        Ok(read_optional_text(path)
            .await?
            .map(|text| frontmatter::parse(&text)))
    }

    /// Read a spec or task document as carried in a bundle
    pub async fn load_context_document(
        &self,
        kind: ContextKind,
        id: &str,
    ) -> Result<Option<ContextDocument>> {
        check_id(kind, id)?;
        let path = self.paths.context_document(kind, id);
        Ok(self.read_document(&path).await?.map(|doc| ContextDocument {
            id: id.to_string(),
            path: path.display().to_string(),
            header: doc.header,
            body: doc.body,
        }))
    }

    /// Load the project document and its constraints
    pub async fn load_static(&self) -> StaticContext {
        let path = self.paths.project_context();
        match self.read_document(&path).await {
            Ok(Some(document)) => StaticContext {
                constraints: document.string_list("constraints"),
                document: Some(document),
                warnings: Vec::new(),
            },
            Ok(None) => {
                warn!("Project context not found at {}", path.display());
                StaticContext::default()
            }
            Err(e) => {
                warn!("Failed to load project context: {}", e);
                StaticContext {
                    warnings: vec![format!("Failed to load project context: {e}")],
                    ..Default::default()
                }
            }
        }
    }

    /// Load the assignment and progress state files
    pub async fn load_dynamic(&self) -> DynamicContext {
        let mut context = DynamicContext::default();
        let assignments_path = self.paths.assignments();
        let progress_path = self.paths.progress();
        let (assignments, progress) = tokio::join!(
            read_state_file(&assignments_path),
            read_state_file(&progress_path),
        );

        context.assignments = assignments.unwrap_or_else(|warning| {
            context.warnings.push(warning);
            Map::new()
        });
        context.progress = progress.unwrap_or_else(|warning| {
            context.warnings.push(warning);
            Map::new()
        });
        context
    }

    /// Load the spec and task documents that exist for the given ids
    pub async fn load_semi_dynamic(
        &self,
        spec_id: Option<&str>,
        task_id: Option<&str>,
    ) -> SemiDynamicContext {
        let mut context = SemiDynamicContext::default();
        let (spec, task) = tokio::join!(
            self.load_level(ContextKind::Spec, spec_id),
            self.load_level(ContextKind::Task, task_id),
        );

        match spec {
            Ok(level) => context.spec = level,
            Err(warning) => context.warnings.push(warning),
        }
        match task {
            Ok(level) => context.task = level,
            Err(warning) => context.warnings.push(warning),
        }
        context
    }

    async fn load_level(
        &self,
        kind: ContextKind,
        id: Option<&str>,
    ) -> std::result::Result<Option<LevelContext>, String> {
        let Some(id) = id else {
            return Ok(None);
        };

        match self.load_context_document(kind, id).await {
            Ok(Some(doc)) => Ok(Some(LevelContext::from_header(kind, &doc.header))),
            Ok(None) => {
                debug!("No {} context for {}", kind, id);
                Ok(None)
            }
            Err(e) => {
                warn!("Failed to load {} context {}: {}", kind, id, e);
                Err(format!("Failed to load {kind} context {id}: {e}"))
            }
        }
    }

    /// Load every level and merge them into inherited context.
    ///
    /// Returns the merged context and the warnings raised while loading.
    pub async fn apply_inheritance(
        &self,
        spec_id: Option<&str>,
        task_id: Option<&str>,
        enabled: bool,
    ) -> (InheritedContext, Vec<String>) {
        let (static_ctx, dynamic_ctx, semi_ctx) = tokio::join!(
            self.load_static(),
            self.load_dynamic(),
            self.load_semi_dynamic(spec_id, task_id),
        );

        let mut warnings = Vec::new();
        warnings.extend(static_ctx.warnings.iter().cloned());
        warnings.extend(dynamic_ctx.warnings.iter().cloned());
        warnings.extend(semi_ctx.warnings.iter().cloned());

        let inherited = merge_inheritance(
            &static_ctx,
            &dynamic_ctx,
            &semi_ctx,
            spec_id,
            task_id,
            enabled,
        );
        (inherited, warnings)
    }

    /// Merge `update` into a context document and rewrite it.
    ///
    /// Returns `false` on any failure; the cause is logged.
    pub async fn update_context(&self, kind: ContextKind, id: &str, update: ContextUpdate) -> bool {
        match self.write_update(kind, id, update).await {
            Ok(()) => {
                info!("Updated {} context {}", kind, id);
                true
            }
            Err(e) => {
                error!("Failed to update {} context {}: {}", kind, id, e);
                false
            }
        }
    }

    async fn write_update(&self, kind: ContextKind, id: &str, update: ContextUpdate) -> Result<()> {
        check_id(kind, id)?;
        let path = self.paths.context_document(kind, id);
        let existing = self.read_document(&path).await?.unwrap_or_default();

        let mut header = existing.header;
        header.extend(update.header);
        header.insert(
            "last_updated".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        let body = update.body.unwrap_or(existing.body);

        let text = frontmatter::serialize(&header, &body)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, text).await?;
        Ok(())
    }
}

/// Ids become file names, so they must be a single plain path segment
fn check_id(kind: ContextKind, id: &str) -> Result<()> {
    if kind == ContextKind::Project {
        return Ok(());
    }
    if id.trim().is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(ContextError::Internal(format!("invalid {kind} id: {id:?}")));
    }
    Ok(())
}

/// Read a JSON state file into a mapping.
///
/// Missing files are silently empty; unreadable or malformed ones produce
/// a warning message.
async fn read_state_file(path: &Path) -> std::result::Result<Map<String, Value>, String> {
    let text = match read_optional_text(path).await {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!("State file {} not found", path.display());
            return Ok(Map::new());
        }
        Err(e) => {
            warn!("Failed to read state file {}: {}", path.display(), e);
            return Err(format!("Failed to read state file {}: {e}", path.display()));
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            warn!("State file {} is not a JSON object", path.display());
            Err(format!("State file {} is not a JSON object", path.display()))
        }
        Err(e) => {
            warn!("Malformed state file {}: {}", path.display(), e);
            Err(format!("Malformed state file {}: {e}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn store(root: &Path) -> ContextStore {
        ContextStore::new(ContextPaths::new(root))
    }

    #[tokio::test]
    async fn test_load_static_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = store(dir.path()).load_static().await;
        assert!(ctx.document.is_none());
        assert!(ctx.constraints.is_empty());
        assert!(ctx.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_load_static_constraints() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".asd/context/project.md",
            "---\ncontext_type: project\nconstraints:\n  - no breaking api changes\n---\n# Project\n",
        );
        let ctx = store(dir.path()).load_static().await;
        assert!(ctx.document.is_some());
        assert_eq!(ctx.constraints, vec!["no breaking api changes"]);
    }

    #[tokio::test]
    async fn test_load_dynamic_malformed_is_empty_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".asd/state/assignments.json", "{oops");
        write(dir.path(), ".asd/state/progress.json", r#"{"T-1": {"percent": 50}}"#);

        let ctx = store(dir.path()).load_dynamic().await;
        assert!(ctx.assignments.is_empty());
        assert_eq!(ctx.progress["T-1"]["percent"], 50);
        assert_eq!(ctx.warnings.len(), 1);
        assert!(ctx.warnings[0].contains("assignments.json"));
    }

    #[tokio::test]
    async fn test_load_semi_dynamic_concatenates() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".asd/context/specs/FEAT-1-context.md",
            "---\nspec_id: FEAT-1\nresearch_findings: [redis is fast]\nimplementation_decisions: [use-redis]\n---\n",
        );
        write(
            dir.path(),
            ".asd/context/tasks/T-1-context.md",
            "---\ntask_id: T-1\nresearch_findings: [ttl matters]\ndecisions_made: [use-redis]\nimplementation_notes: [wrap client]\n---\n",
        );

        let ctx = store(dir.path())
            .load_semi_dynamic(Some("FEAT-1"), Some("T-1"))
            .await;
        assert_eq!(ctx.research_findings(), vec!["redis is fast", "ttl matters"]);
        // spec level first, then task fields in header-field order
        assert_eq!(ctx.decisions(), vec!["use-redis", "wrap client", "use-redis"]);
    }

    #[tokio::test]
    async fn test_apply_inheritance_task_only() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".asd/context/tasks/T-9-context.md",
            "---\ntask_id: T-9\ndecisions_made: [\"use-redis\"]\n---\nnotes",
        );

        let (inherited, warnings) = store(dir.path())
            .apply_inheritance(Some("FEAT-404"), Some("T-9"), true)
            .await;
        assert!(warnings.is_empty());
        assert_eq!(inherited.hierarchy, vec!["task"]);
        assert_eq!(inherited.decisions.len(), 1);
        assert!(inherited.decisions.contains("use-redis"));
    }

    #[tokio::test]
    async fn test_update_context_creates_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let mut header = Map::new();
        header.insert("task_id".to_string(), json!("T-2"));
        header.insert("status".to_string(), json!("active"));
        let created = store
            .update_context(
                ContextKind::Task,
                "T-2",
                ContextUpdate {
                    header,
                    body: Some("first body".to_string()),
                },
            )
            .await;
        assert!(created);

        let mut header = Map::new();
        header.insert("status".to_string(), json!("blocked"));
        assert!(
            store
                .update_context(ContextKind::Task, "T-2", ContextUpdate { header, body: None })
                .await
        );

        let doc = store
            .load_context_document(ContextKind::Task, "T-2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.header["task_id"], "T-2");
        assert_eq!(doc.header["status"], "blocked");
        assert!(doc.header.contains_key("last_updated"));
        assert_eq!(doc.body, "first body");
    }

    #[tokio::test]
    async fn test_update_context_rejects_bad_id() {
        let dir = tempfile::tempdir().unwrap();
        let ok = store(dir.path())
            .update_context(ContextKind::Spec, "../escape", ContextUpdate::default())
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_update_context_io_failure_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the context directory should be makes create_dir_all fail
        write(dir.path(), ".asd/context", "not a directory");
        let ok = store(dir.path())
            .update_context(ContextKind::Project, "", ContextUpdate::default())
            .await;
        assert!(!ok);
    }
}
