//! Task recommendations enriched with a context preview

use super::ContextEngine;
use crate::collaborators::{collaborator_error, TaskCandidate};
use crate::context::inheritance::LevelContext;
use crate::context::models::{AgentDefinition, ContextDocument};
use crate::context::paths::ContextKind;
use crate::error::{ContextError, Result};
use crate::filter::{calculate_content_relevance, value_to_text, ContentType};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Candidates that receive a context preview
pub const PREVIEW_LIMIT: usize = 3;

const RELEVANCE_WEIGHT: f64 = 0.7;
const COMPLETENESS_WEIGHT: f64 = 0.3;
const BASE_ESTIMATE_MINUTES: f64 = 30.0;
const MISSING_CONTEXT_MINUTES: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Lightweight view of the context available for a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPreview {
    pub relevance: f64,
    pub completeness: f64,
    pub estimated_minutes: f64,
    pub confidence: Confidence,
}

impl ContextPreview {
    /// Preview used when the real one could not be computed
    pub fn neutral() -> Self {
        Self {
            relevance: 0.5,
            completeness: 0.5,
            estimated_minutes: BASE_ESTIMATE_MINUTES + 0.5 * MISSING_CONTEXT_MINUTES,
            confidence: Confidence::Low,
        }
    }

    pub fn ranking_score(&self) -> f64 {
        RELEVANCE_WEIGHT * self.relevance + COMPLETENESS_WEIGHT * self.completeness
    }
}

/// A router candidate with its preview, when one was computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecommendation {
    #[serde(flatten)]
    pub candidate: TaskCandidate,
    pub preview: Option<ContextPreview>,
    pub ranking_score: Option<f64>,
}

impl TaskRecommendation {
    fn with_preview(candidate: TaskCandidate, preview: ContextPreview) -> Self {
        Self {
            ranking_score: Some(preview.ranking_score()),
            preview: Some(preview),
            candidate,
        }
    }

    fn without_preview(candidate: TaskCandidate) -> Self {
        Self {
            candidate,
            preview: None,
            ranking_score: None,
        }
    }
}

fn document_text(document: Option<&ContextDocument>) -> String {
    document
        .map(|doc| format!("{}\n{}", value_to_text(&Value::Object(doc.header.clone())), doc.body))
        .unwrap_or_default()
}

fn level(kind: ContextKind, document: Option<&ContextDocument>) -> Option<LevelContext> {
    document.map(|doc| LevelContext::from_header(kind, &doc.header))
}

impl ContextEngine {
    /// Ask the router for tasks and rank the first few by context quality.
    ///
    /// Up to [`PREVIEW_LIMIT`] candidates are previewed and re-sorted by
    /// `0.7 * relevance + 0.3 * completeness`; the rest keep router order.
    pub async fn get_contextual_task_recommendations(
        &self,
        agent_type: &str,
        preferences: &Value,
    ) -> Result<Vec<TaskRecommendation>> {
        let router = self
            .router
            .as_ref()
            .ok_or_else(|| ContextError::Collaborator("No task router configured".to_string()))?;

        let mut candidates = router
            .get_next_task(agent_type, preferences)
            .await
            .map_err(|e| collaborator_error("task router failed", e))?;

        let agent = self
            .load_agent_definition(agent_type)
            .await
            .unwrap_or_else(|e| {
                debug!("Previewing without agent definition: {}", e);
                AgentDefinition::empty(agent_type)
            });

        let rest = candidates.split_off(candidates.len().min(PREVIEW_LIMIT));
        let previews = join_all(
            candidates
                .iter()
                .map(|candidate| self.preview_task_context(&agent, candidate)),
        )
        .await;

        let mut recommendations: Vec<TaskRecommendation> = candidates
            .into_iter()
            .zip(previews)
            .map(|(candidate, preview)| {
                let preview = preview.unwrap_or_else(|e| {
                    debug!(task_id = %candidate.task_id, "Context preview failed: {}", e);
                    ContextPreview::neutral()
                });
                TaskRecommendation::with_preview(candidate, preview)
            })
            .collect();

        recommendations.sort_by(|a, b| {
            b.ranking_score
                .partial_cmp(&a.ranking_score)
                .unwrap_or(Ordering::Equal)
        });
        recommendations.extend(rest.into_iter().map(TaskRecommendation::without_preview));

        info!(
            agent_type,
            count = recommendations.len(),
            "Prepared task recommendations"
        );
        Ok(recommendations)
    }

    /// Preview the context of a candidate without loading the full layers
    pub async fn preview_task_context(
        &self,
        agent: &AgentDefinition,
        candidate: &TaskCandidate,
    ) -> Result<ContextPreview> {
        let (spec, task) = tokio::join!(
            self.store
                .load_context_document(ContextKind::Spec, &candidate.spec_id),
            self.store
                .load_context_document(ContextKind::Task, &candidate.task_id),
        );
        let (spec, task) = (spec?, task?);

        let text = format!(
            "{}\n{}",
            document_text(spec.as_ref()),
            document_text(task.as_ref())
        );
        let relevance =
            calculate_content_relevance(&text, &agent.context_requirements, ContentType::TaskSpecific)
                .overall_score;

        let levels: Vec<LevelContext> = level(ContextKind::Spec, spec.as_ref())
            .into_iter()
            .chain(level(ContextKind::Task, task.as_ref()))
            .collect();
        let signals = [
            spec.is_some(),
            task.is_some(),
            levels.iter().any(|level| !level.decisions.is_empty()),
            levels.iter().any(|level| !level.research_findings.is_empty()),
        ];
        let completeness =
            signals.iter().filter(|present| **present).count() as f64 / signals.len() as f64;

        let estimated_minutes = task
            .as_ref()
            .and_then(|doc| doc.header.get("estimated_minutes"))
            .and_then(Value::as_f64)
            .unwrap_or(BASE_ESTIMATE_MINUTES + (1.0 - completeness) * MISSING_CONTEXT_MINUTES);

        let confidence = if completeness >= 0.75 {
            Confidence::High
        } else if completeness >= 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        Ok(ContextPreview {
            relevance,
            completeness,
            estimated_minutes,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::TaskRouter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn candidate(spec_id: &str, task_id: &str) -> TaskCandidate {
        TaskCandidate {
            spec_id: spec_id.to_string(),
            task_id: task_id.to_string(),
            ..Default::default()
        }
    }

    struct FixedRouter(Vec<TaskCandidate>);

    #[async_trait]
    impl TaskRouter for FixedRouter {
        async fn get_next_task(&self, _agent_type: &str, _preferences: &Value) -> Result<Vec<TaskCandidate>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_neutral_preview() {
        let preview = ContextPreview::neutral();
        assert_eq!(preview.confidence, Confidence::Low);
        assert!((preview.ranking_score() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_without_router_is_collaborator_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ContextEngine::for_project(dir.path());
        let err = engine
            .get_contextual_task_recommendations("backend-developer", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::Collaborator(_)));
    }

    #[tokio::test]
    async fn test_ranks_head_and_keeps_tail_order() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".asd/agents/backend-developer.md",
            "---\ncontext_requirements: [rate-limiting]\n---\n",
        );
        write(
            dir.path(),
            ".asd/context/specs/FEAT-2-context.md",
            "---\nspec_id: FEAT-2\nimplementation_decisions: [token bucket]\nresearch_findings: [rate-limiting at gateway]\n---\nRate-limiting design",
        );
        write(
            dir.path(),
            ".asd/context/tasks/T-2-context.md",
            "---\ntask_id: T-2\nestimated_minutes: 45\n---\nImplement rate-limiting middleware",
        );

        let router = FixedRouter(vec![
            candidate("FEAT-1", "T-1"),
            candidate("FEAT-2", "T-2"),
            candidate("", "T-3"),
            candidate("FEAT-4", "T-4"),
            candidate("FEAT-5", "T-5"),
        ]);
        let engine = ContextEngine::for_project(dir.path()).with_router(Arc::new(router));
        let recommendations = engine
            .get_contextual_task_recommendations("backend-developer", &json!({"prefer": "api"}))
            .await
            .unwrap();

        let order: Vec<&str> = recommendations
            .iter()
            .map(|r| r.candidate.task_id.as_str())
            .collect();
        // T-3 has an invalid spec id and gets the neutral preview
        assert_eq!(order, vec!["T-2", "T-3", "T-1", "T-4", "T-5"]);

        let best = recommendations[0].preview.as_ref().unwrap();
        assert_eq!(best.completeness, 1.0);
        assert_eq!(best.estimated_minutes, 45.0);
        assert_eq!(best.confidence, Confidence::High);
        assert_eq!(recommendations[1].preview, Some(ContextPreview::neutral()));
        assert!(recommendations[3].preview.is_none());
    }
}
