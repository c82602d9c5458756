//! Loading of the four context layers
//!
//! Layers load concurrently and independently. A layer that fails to load
//! is replaced by its empty form and the failure becomes a warning.

use super::{elapsed_ms, ContextEngine};
use crate::collaborators::load_optional;
use crate::context::frontmatter::Document;
use crate::context::models::{
    AgentDefinition, ContextDocument, ContextLayers, CriticalLayer, ProcessLayer, TaskSpecificLayer,
};
use crate::context::paths::ContextKind;
use crate::error::{ContextError, Result};
use indexmap::{IndexMap, IndexSet};
use std::future::Future;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Layers of one request with their load timings and warnings
#[derive(Debug, Clone, Default)]
pub struct LoadedLayers {
    pub layers: ContextLayers,
    /// Layer name → milliseconds
    pub timings: IndexMap<String, f64>,
    pub warnings: Vec<String>,
}

async fn timed<T>(future: impl Future<Output = T>) -> (T, f64) {
    let started = Instant::now();
    let output = future.await;
    (output, elapsed_ms(started))
}

impl AgentDefinition {
    /// Build a definition from an agent document.
    ///
    /// The requested agent type is kept even when the header names another
    /// one, so filter rules are always looked up under the requested type.
    pub fn from_document(agent_type: &str, document: &Document) -> Self {
        if let Some(declared) = document.string_field("agent_type") {
            if declared != agent_type {
                warn!(
                    agent_type,
                    declared, "Agent definition declares a different agent type"
                );
            }
        }

        Self {
            agent_type: agent_type.to_string(),
            capabilities: document.string_list("capabilities"),
            specialization_areas: document.string_list("specialization_areas"),
            context_requirements: document.string_list("context_requirements"),
            workflow_steps: document.string_list("workflow_steps"),
            validation_requirements: document.string_list("validation_requirements"),
            handoff_checklist: document.string_list("handoff_checklist"),
            body_text: document.body.clone(),
        }
    }
}

fn context_document(id: &str, path: &Path, document: Document) -> ContextDocument {
    ContextDocument {
        id: id.to_string(),
        path: path.display().to_string(),
        header: document.header,
        body: document.body,
    }
}

impl ContextEngine {
    /// Load all four layers, degrading failed ones to empty
    pub async fn load_layers(
        &self,
        agent_type: &str,
        spec_id: Option<&str>,
        task_id: Option<&str>,
    ) -> LoadedLayers {
        let (critical, task_specific, agent_specific, process) = tokio::join!(
            timed(self.load_critical_layer()),
            timed(self.load_task_specific_layer(spec_id, task_id)),
            timed(self.load_agent_definition(agent_type)),
            timed(self.load_process_layer()),
        );

        let mut loaded = LoadedLayers::default();
        loaded.layers.critical = loaded.settle("critical", critical, CriticalLayer::default);
        loaded.layers.task_specific =
            loaded.settle("taskSpecific", task_specific, TaskSpecificLayer::default);
        loaded.layers.agent_specific = loaded.settle("agentSpecific", agent_specific, || {
            AgentDefinition::empty(agent_type)
        });
        loaded.layers.process = loaded.settle("process", process, ProcessLayer::default);
        loaded
    }

    /// Project and urgent constraints
    pub async fn load_critical_layer(&self) -> Result<CriticalLayer> {
        let project_path = self.paths.project_context();
        let urgent_path = self.paths.urgent_constraints();
        let (project, urgent) = tokio::join!(
            load_optional(self.loader.as_ref(), &project_path),
            load_optional(self.loader.as_ref(), &urgent_path),
        );

        let mut layer = CriticalLayer::default();
        let mut constraints = IndexSet::new();
        for (id, path, document) in [
            ("project", &project_path, project?),
            ("urgent-constraints", &urgent_path, urgent?),
        ] {
            let Some(document) = document else {
                continue;
            };
            constraints.extend(document.string_list("constraints"));
            layer.sources.push(path.display().to_string());
            let document = context_document(id, path, document);
            if id == "project" {
                layer.project = Some(document);
            } else {
                layer.urgent = Some(document);
            }
        }
        layer.constraints = constraints.into_iter().collect();
        Ok(layer)
    }

    /// Spec and task documents for the requested ids
    pub async fn load_task_specific_layer(
        &self,
        spec_id: Option<&str>,
        task_id: Option<&str>,
    ) -> Result<TaskSpecificLayer> {
        let load = |kind: ContextKind, id: Option<&str>| {
            let id = id.map(str::to_string);
            async move {
                match id {
                    Some(id) => self.store.load_context_document(kind, &id).await,
                    None => Ok(None),
                }
            }
        };

        let (spec, task) = tokio::join!(load(ContextKind::Spec, spec_id), load(ContextKind::Task, task_id));
        Ok(TaskSpecificLayer {
            spec: spec?,
            task: task?,
        })
    }

    /// Agent definition from `.asd/agents/{agent_type}.md`.
    ///
    /// A missing file yields a definition carrying only the agent type.
    pub async fn load_agent_definition(&self, agent_type: &str) -> Result<AgentDefinition> {
        if agent_type.contains(['/', '\\']) || agent_type.contains("..") {
            return Err(ContextError::Internal(format!(
                "invalid agent type: {agent_type:?}"
            )));
        }

        let path = self.paths.agent_definition(agent_type);
        match load_optional(self.loader.as_ref(), &path).await? {
            Some(document) => Ok(AgentDefinition::from_document(agent_type, &document)),
            None => {
                debug!("No agent definition for {}", agent_type);
                Ok(AgentDefinition::empty(agent_type))
            }
        }
    }

    /// Handoff template and validation checklist
    pub async fn load_process_layer(&self) -> Result<ProcessLayer> {
        let template_path = self.paths.handoff_template();
        let checklist_path = self.paths.validation_checklist();
        let (template, checklist) = tokio::join!(
            load_optional(self.loader.as_ref(), &template_path),
            load_optional(self.loader.as_ref(), &checklist_path),
        );

        let mut layer = ProcessLayer::default();
        if let Some(document) = template? {
            layer
                .templates
                .insert("task-handoff-template".to_string(), document.body);
        }
        if let Some(document) = checklist? {
            layer
                .checklists
                .insert("validation-checklist".to_string(), document.body);
        }
        Ok(layer)
    }
}

impl LoadedLayers {
    fn settle<T>(&mut self, name: &str, outcome: (Result<T>, f64), empty: impl FnOnce() -> T) -> T {
        let (result, elapsed) = outcome;
        self.timings.insert(name.to_string(), elapsed);
        match result {
            Ok(layer) => layer,
            Err(e) => {
                warn!(layer = name, "Failed to load context layer: {}", e);
                self.warnings
                    .push(format!("Failed to load {name} layer: {e}"));
                empty()
            }
        }
    }
}
