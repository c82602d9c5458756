//! Fixed on-disk layout of a project's `.asd` directory

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of context document addressed by [`ContextPaths::context_document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Project,
    Spec,
    Task,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Project => "project",
            ContextKind::Spec => "spec",
            ContextKind::Task => "task",
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path resolver rooted at the project root
#[derive(Debug, Clone)]
pub struct ContextPaths {
    root: PathBuf,
}

impl ContextPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn project_root(&self) -> &Path {
        &self.root
    }

    pub fn asd_dir(&self) -> PathBuf {
        self.root.join(".asd")
    }

    pub fn context_dir(&self) -> PathBuf {
        self.asd_dir().join("context")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.asd_dir().join("state")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.asd_dir().join("config")
    }

    pub fn project_context(&self) -> PathBuf {
        self.context_dir().join("project.md")
    }

    pub fn urgent_constraints(&self) -> PathBuf {
        self.context_dir().join("urgent-constraints.md")
    }

    pub fn spec_context(&self, spec_id: &str) -> PathBuf {
        self.context_dir()
            .join("specs")
            .join(format!("{spec_id}-context.md"))
    }

    pub fn task_context(&self, task_id: &str) -> PathBuf {
        self.context_dir()
            .join("tasks")
            .join(format!("{task_id}-context.md"))
    }

    /// Document for a context kind; `id` is ignored for the project kind
    pub fn context_document(&self, kind: ContextKind, id: &str) -> PathBuf {
        match kind {
            ContextKind::Project => self.project_context(),
            ContextKind::Spec => self.spec_context(id),
            ContextKind::Task => self.task_context(id),
        }
    }

    pub fn agent_definition(&self, agent_type: &str) -> PathBuf {
        self.asd_dir().join("agents").join(format!("{agent_type}.md"))
    }

    pub fn handoff_template(&self) -> PathBuf {
        self.asd_dir()
            .join("processes")
            .join("task-handoff-template.md")
    }

    pub fn validation_checklist(&self) -> PathBuf {
        self.asd_dir()
            .join("processes")
            .join("validation-checklist.md")
    }

    pub fn assignments(&self) -> PathBuf {
        self.state_dir().join("assignments.json")
    }

    pub fn progress(&self) -> PathBuf {
        self.state_dir().join("progress.json")
    }

    pub fn context_config(&self) -> PathBuf {
        self.config_dir().join("context-config.json")
    }

    pub fn agent_capabilities(&self) -> PathBuf {
        self.config_dir().join("agent-capabilities.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = ContextPaths::new("/work/proj");
        assert_eq!(
            paths.spec_context("FEAT-12"),
            PathBuf::from("/work/proj/.asd/context/specs/FEAT-12-context.md")
        );
        assert_eq!(
            paths.task_context("TASK-3"),
            PathBuf::from("/work/proj/.asd/context/tasks/TASK-3-context.md")
        );
        assert_eq!(
            paths.agent_definition("backend-developer"),
            PathBuf::from("/work/proj/.asd/agents/backend-developer.md")
        );
        assert_eq!(
            paths.agent_capabilities(),
            PathBuf::from("/work/proj/.asd/config/agent-capabilities.json")
        );
    }

    #[test]
    fn test_context_document_by_kind() {
        let paths = ContextPaths::new("/p");
        assert_eq!(paths.context_document(ContextKind::Project, "ignored"), paths.project_context());
        assert_eq!(paths.context_document(ContextKind::Task, "T-1"), paths.task_context("T-1"));
    }
}
