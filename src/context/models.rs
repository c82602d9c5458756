//! Data models for context bundles

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Names of the four layers, in bundle order
pub const LAYER_NAMES: [&str; 4] = ["critical", "taskSpecific", "agentSpecific", "process"];

/// Priority bucket for filtered content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriorityTier {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl PriorityTier {
    pub const HIGH_THRESHOLD: f64 = 0.7;
    pub const MEDIUM_THRESHOLD: f64 = 0.3;

    /// Bucket for an overall score; each threshold is inclusive
    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            PriorityTier::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }
}

/// Score of one requirement against a piece of content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementScore {
    /// Requirement score (0.0-1.0)
    pub score: f64,
    /// Matched text fragments, as found in the content
    pub matches: Vec<String>,
}

/// Relevance of content to an agent's context requirements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevanceScore {
    pub content_type: String,
    /// Overall score (0.0-1.0), content-type bonus included
    pub overall_score: f64,
    pub requirement_scores: IndexMap<String, RequirementScore>,
    pub matched_terms: IndexSet<String>,
    pub total_requirements: usize,
}

impl RelevanceScore {
    pub fn tier(&self) -> PriorityTier {
        PriorityTier::from_score(self.overall_score)
    }
}

/// A spec or task context document as carried in a bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDocument {
    pub id: String,
    pub path: String,
    pub header: Map<String, Value>,
    pub body: String,
}

/// Project-wide constraints that every agent must see
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalLayer {
    pub constraints: Vec<String>,
    pub sources: Vec<String>,
    pub project: Option<ContextDocument>,
    pub urgent: Option<ContextDocument>,
}

/// Spec and task material for the current request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpecificLayer {
    pub spec: Option<ContextDocument>,
    pub task: Option<ContextDocument>,
}

/// Agent definition loaded from `.asd/agents/{agentType}.md`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub agent_type: String,
    pub capabilities: Vec<String>,
    pub specialization_areas: Vec<String>,
    pub context_requirements: Vec<String>,
    pub workflow_steps: Vec<String>,
    pub validation_requirements: Vec<String>,
    pub handoff_checklist: Vec<String>,
    pub body_text: String,
}

impl AgentDefinition {
    /// Definition carrying only the agent type
    pub fn empty(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            ..Default::default()
        }
    }
}

/// Process templates and checklists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessLayer {
    pub templates: IndexMap<String, String>,
    pub checklists: IndexMap<String, String>,
}

/// The four context layers; every key is always present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextLayers {
    pub critical: CriticalLayer,
    pub task_specific: TaskSpecificLayer,
    pub agent_specific: AgentDefinition,
    pub process: ProcessLayer,
}

/// Merged project → spec → task context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritedContext {
    pub hierarchy: Vec<String>,
    pub constraints: IndexSet<String>,
    pub decisions: IndexSet<String>,
    pub research_findings: IndexSet<String>,
    pub progress: Map<String, Value>,
    pub blockers: Vec<String>,
    pub next_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_assignments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_progress: Option<Value>,
}

/// Which filter produced the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMethod {
    #[default]
    Advanced,
    Basic,
}

/// Layer content grouped by priority
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedContent {
    pub high_priority: IndexMap<String, Value>,
    pub medium_priority: IndexMap<String, Value>,
    pub low_priority: IndexMap<String, Value>,
}

impl PrioritizedContent {
    pub fn insert(&mut self, tier: PriorityTier, name: impl Into<String>, content: Value) {
        let bucket = match tier {
            PriorityTier::High => &mut self.high_priority,
            PriorityTier::Medium => &mut self.medium_priority,
            PriorityTier::Low => &mut self.low_priority,
        };
        bucket.insert(name.into(), content);
    }
}

/// A walked node that matched a requirement, an include or an exclude
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMatch {
    pub path: String,
    pub matched_requirements: Vec<String>,
    pub matched_includes: Vec<String>,
    pub excluded: bool,
}

/// Outcome of relevance filtering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteringReport {
    pub applied: bool,
    pub method: FilterMethod,
    pub agent_type: String,
    pub context_requirements: Vec<String>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub relevance_scores: IndexMap<String, RelevanceScore>,
    pub prioritized_content: PrioritizedContent,
    pub node_matches: Vec<NodeMatch>,
}

/// Per-layer validation outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerValidation {
    pub present: bool,
    pub valid: bool,
}

/// Performance section of a validation result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub total_ms: Option<f64>,
    pub within_budget: bool,
    pub slow_layers: Vec<String>,
}

/// Accumulated validation errors and warnings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub layers: IndexMap<String, LayerValidation>,
    pub performance: PerformanceReport,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.is_valid = false;
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Recompute `is_valid` from the error list
    pub fn finish(&mut self) {
        self.is_valid = self.errors.is_empty();
    }
}

/// Request metadata and stage timings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub request_id: Uuid,
    pub agent_type: String,
    pub spec_id: Option<String>,
    pub task_id: Option<String>,
    pub injection_time: DateTime<Utc>,
    /// Stage name → milliseconds
    pub performance: IndexMap<String, f64>,
}

/// Result of the gatherer call in an automated injection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatheredTaskContext {
    pub task_specific: GatheredTaskSpecific,
    pub validation: GatherValidation,
    #[serde(default)]
    pub metadata: GatherMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatheredTaskSpecific {
    pub specification: Option<String>,
    pub task: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatherValidation {
    pub relevance_score: f64,
    pub is_sufficient: bool,
    pub completeness: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatherMetadata {
    #[serde(default)]
    pub performance: IndexMap<String, f64>,
}

/// Readiness verdict for an automated agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessValidation {
    pub has_specification: bool,
    pub has_task_checklist: bool,
    pub sufficient_relevance: bool,
    pub context_valid: bool,
    /// Readiness score (0.0-1.0)
    pub score: f64,
    pub ready: bool,
    pub missing: Vec<String>,
}

/// Automation sub-object attached by automated task injection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationContext {
    pub gathered: GatheredTaskContext,
    pub readiness: ReadinessValidation,
    pub total_ms: f64,
    pub within_target: bool,
}

/// The assembled, filtered and validated context handed to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub metadata: BundleMetadata,
    pub layers: ContextLayers,
    pub inheritance: InheritedContext,
    pub filtering: FilteringReport,
    pub validation: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation: Option<AutomationContext>,
}
