//! Relevance filtering of context layers for an agent
//!
//! The advanced filter walks every layer, records which nodes matched the
//! agent's requirements and include/exclude patterns, scores each layer and
//! buckets it by priority. The basic filter only computes one aggregate
//! score and is what the engine falls back to when the advanced one fails.

pub mod patterns;
pub mod relevance;

pub use patterns::{generate_patterns, pattern_matches, PatternKind, SearchPattern};
pub use relevance::{calculate_content_relevance, score_requirement, value_to_text, ContentType};

use crate::config::FilterConfig;
use crate::context::models::{
    AgentDefinition, ContextLayers, FilterMethod, FilteringReport, NodeMatch, PrioritizedContent,
    RelevanceScore, LAYER_NAMES,
};
use crate::error::{ContextError, Result};
use indexmap::IndexMap;
use relevance::{is_internal_key, normalize_requirements, MAX_WALK_DEPTH};
use serde_json::Value;
use tracing::debug;

/// Key under which the basic filter reports its single score
pub const AGGREGATE_SCORE_KEY: &str = "overall";

/// Requirement with its compiled search patterns
struct CompiledRequirement {
    requirement: String,
    patterns: Vec<SearchPattern>,
}

/// Patterns applied while walking layer content
struct WalkRules<'a> {
    requirements: Vec<CompiledRequirement>,
    includes: &'a [String],
    excludes: &'a [String],
}

/// Relevance filter
#[derive(Debug, Clone, Default)]
pub struct RelevanceFilter;

impl RelevanceFilter {
    pub fn new() -> Self {
        Self
    }

    /// Score and prioritize every layer for `agent`, flagging (not removing)
    /// nodes that match an exclude pattern.
    pub fn filter_context_for_agent(
        &self,
        layers: &ContextLayers,
        agent: &AgentDefinition,
        filter_config: &FilterConfig,
    ) -> Result<FilteringReport> {
        let agent_type = agent.agent_type.as_str();
        let rules = filter_config.rules_for(agent_type);
        let requirements = normalize_requirements(&agent.context_requirements);

        let walk_rules = WalkRules {
            requirements: requirements
                .iter()
                .map(|requirement| CompiledRequirement {
                    requirement: requirement.clone(),
                    patterns: generate_patterns(requirement),
                })
                .collect(),
            includes: &rules.include_patterns,
            excludes: &rules.exclude_patterns,
        };

        let layer_values = layer_values(layers)?;
        let mut node_matches = Vec::new();
        let mut relevance_scores = IndexMap::new();

        for (name, value) in &layer_values {
            walk_node(value, name, 0, &walk_rules, &mut node_matches)?;
            let text = value_to_text(value);
            let score = calculate_content_relevance(&text, &requirements, ContentType::from_layer(name));
            debug!(
                agent_type,
                layer = name.as_str(),
                score = score.overall_score,
                "Scored context layer"
            );
            relevance_scores.insert(name.clone(), score);
        }

        let prioritized_content = self.prioritize_content(&layer_values, &relevance_scores);

        Ok(FilteringReport {
            applied: true,
            method: FilterMethod::Advanced,
            agent_type: agent_type.to_string(),
            context_requirements: requirements,
            include_patterns: rules.include_patterns.clone(),
            exclude_patterns: rules.exclude_patterns.clone(),
            relevance_scores,
            prioritized_content,
            node_matches,
        })
    }

    /// Score text against requirements
    pub fn calculate_content_relevance(
        &self,
        content: &str,
        requirements: &[String],
        content_type: ContentType,
    ) -> RelevanceScore {
        calculate_content_relevance(content, requirements, content_type)
    }

    /// Bucket each scored layer by its overall score; unscored layers are left out
    pub fn prioritize_content(
        &self,
        layers: &IndexMap<String, Value>,
        scores: &IndexMap<String, RelevanceScore>,
    ) -> PrioritizedContent {
        let mut prioritized = PrioritizedContent::default();
        for (name, content) in layers {
            if let Some(score) = scores.get(name) {
                prioritized.insert(score.tier(), name.clone(), content.clone());
            }
        }
        prioritized
    }

    /// Single aggregate score over all layers
    pub fn basic_filter(&self, layers: &ContextLayers, agent: &AgentDefinition) -> FilteringReport {
        let requirements = normalize_requirements(&agent.context_requirements);
        let text = serde_json::to_value(layers)
            .map(|value| value_to_text(&value))
            .unwrap_or_default();
        let score = calculate_content_relevance(&text, &requirements, ContentType::Combined);

        let mut relevance_scores = IndexMap::new();
        relevance_scores.insert(AGGREGATE_SCORE_KEY.to_string(), score);

        FilteringReport {
            applied: true,
            method: FilterMethod::Basic,
            agent_type: agent.agent_type.clone(),
            context_requirements: requirements,
            relevance_scores,
            ..Default::default()
        }
    }
}

/// Layers as JSON values keyed by layer name, in bundle order
pub fn layer_values(layers: &ContextLayers) -> Result<IndexMap<String, Value>> {
    let value = serde_json::to_value(layers)?;
    let Value::Object(mut map) = value else {
        return Err(ContextError::Internal(
            "context layers did not serialize to an object".to_string(),
        ));
    };

    Ok(LAYER_NAMES
        .iter()
        .map(|name| (name.to_string(), map.remove(*name).unwrap_or(Value::Null)))
        .collect())
}

fn walk_node(
    value: &Value,
    path: &str,
    depth: usize,
    rules: &WalkRules<'_>,
    matches: &mut Vec<NodeMatch>,
) -> Result<()> {
    if depth > MAX_WALK_DEPTH {
        return Err(ContextError::Internal(format!(
            "context nesting at {path} exceeds {MAX_WALK_DEPTH} levels"
        )));
    }

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if is_internal_key(key) {
                    continue;
                }
                walk_node(child, &format!("{path}.{key}"), depth + 1, rules, matches)?;
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk_node(child, &format!("{path}[{index}]"), depth + 1, rules, matches)?;
            }
        }
        Value::Null => {}
        leaf => {
            let text = match leaf {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if let Some(node) = match_node(&text, path, rules) {
                matches.push(node);
            }
        }
    }
    Ok(())
}

fn match_node(text: &str, path: &str, rules: &WalkRules<'_>) -> Option<NodeMatch> {
    if text.trim().is_empty() {
        return None;
    }

    let matched_requirements: Vec<String> = rules
        .requirements
        .iter()
        .filter(|compiled| compiled.patterns.iter().any(|pattern| pattern.is_match(text)))
        .map(|compiled| compiled.requirement.clone())
        .collect();
    let matched_includes: Vec<String> = rules
        .includes
        .iter()
        .filter(|pattern| pattern_matches(text, pattern))
        .cloned()
        .collect();
    let excluded = rules
        .excludes
        .iter()
        .any(|pattern| pattern_matches(text, pattern));

    if matched_requirements.is_empty() && matched_includes.is_empty() && !excluded {
        return None;
    }

    Some(NodeMatch {
        path: path.to_string(),
        matched_requirements,
        matched_includes,
        excluded,
    })
}
