//! Automated task injection and readiness checks

use super::{elapsed_ms, injection_error, ContextEngine, InjectionStage};
use crate::collaborators::GatherRequest;
use crate::config::AutomationOptions;
use crate::context::models::{
    AutomationContext, ContextBundle, GatheredTaskContext, ReadinessValidation, ValidationResult,
};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

fn default_use_cache() -> bool {
    true
}

/// Request for [`ContextEngine::inject_context_for_task`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInjectionRequest {
    pub agent_type: String,
    #[serde(default)]
    pub spec_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub automated: bool,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

impl TaskInjectionRequest {
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            spec_id: None,
            task_id: None,
            automated: false,
            use_cache: default_use_cache(),
        }
    }

    pub fn for_task(
        agent_type: impl Into<String>,
        spec_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            spec_id: Some(spec_id.into()),
            task_id: Some(task_id.into()),
            ..Self::new(agent_type)
        }
    }

    pub fn automated(mut self) -> Self {
        self.automated = true;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

fn has_checklist(task: Option<&Value>) -> bool {
    task.and_then(|task| task.get("checklist"))
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty())
}

/// Decide whether an automated agent has enough context to proceed.
///
/// Four equally weighted checks: specification text, a task checklist,
/// gathering relevance and the standard validation outcome.
pub fn validate_readiness(
    gathered: &GatheredTaskContext,
    validation: &ValidationResult,
    options: &AutomationOptions,
) -> ReadinessValidation {
    let has_specification = gathered
        .task_specific
        .specification
        .as_deref()
        .is_some_and(|text| !text.trim().is_empty());
    let has_task_checklist = has_checklist(gathered.task_specific.task.as_ref());
    let sufficient_relevance = gathered.validation.relevance_score >= options.min_gather_relevance;
    let context_valid = validation.is_valid;

    let checks = [
        (has_specification, "specification"),
        (has_task_checklist, "task checklist"),
        (sufficient_relevance, "sufficient relevance"),
        (context_valid, "valid context"),
    ];
    let passed = checks.iter().filter(|(ok, _)| *ok).count();
    let score = passed as f64 / checks.len() as f64;

    ReadinessValidation {
        has_specification,
        has_task_checklist,
        sufficient_relevance,
        context_valid,
        score,
        ready: score >= options.readiness_threshold,
        missing: checks
            .iter()
            .filter(|(ok, _)| !ok)
            .map(|(_, name)| name.to_string())
            .collect(),
    }
}

impl ContextEngine {
    /// Inject context for a task; automated requests also gather task
    /// material and attach a readiness verdict under `automation`.
    pub async fn inject_context_for_task(&self, request: TaskInjectionRequest) -> Result<ContextBundle> {
        let spec_id = request.spec_id.as_deref();
        let task_id = request.task_id.as_deref();

        if !request.automated {
            return self
                .inject_context(&request.agent_type, spec_id, task_id, request.use_cache)
                .await;
        }

        let started = Instant::now();
        let Some(gatherer) = self.gatherer.as_ref() else {
            return Err(injection_error(
                InjectionStage::Gather,
                started,
                "No task gatherer configured for automated injection",
            ));
        };

        let gather_request = GatherRequest {
            spec_id: request.spec_id.clone(),
            task_id: request.task_id.clone(),
            agent_type: request.agent_type.clone(),
            include_files: true,
            use_cache: request.use_cache,
        };
        let (bundle, gathered) = tokio::join!(
            self.inject_context(&request.agent_type, spec_id, task_id, request.use_cache),
            gatherer.gather_task_context(gather_request),
        );

        let mut bundle = bundle?;
        let gathered =
            gathered.map_err(|e| injection_error(InjectionStage::Gather, started, e))?;

        let config = self.context_config().await;
        let readiness = validate_readiness(&gathered, &bundle.validation, &config.automation);
        let total_ms = elapsed_ms(started);
        let within_target = total_ms <= config.performance.automation_target_ms;

        if !within_target {
            warn!(
                elapsed_ms = total_ms,
                "Automated injection exceeded the {}ms target", config.performance.automation_target_ms
            );
        }
        info!(
            agent_type = %request.agent_type,
            ready = readiness.ready,
            score = readiness.score,
            "Automated context injection finished"
        );

        bundle.automation = Some(AutomationContext {
            gathered,
            readiness,
            total_ms,
            within_target,
        });
        Ok(bundle)
    }
}
