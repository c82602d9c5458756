//! Requirement-driven relevance scoring
//!
//! Each requirement is expanded into search patterns; every pattern earns
//! `min(matches * 0.1, 0.5)` and a verbatim occurrence of the requirement
//! adds 0.3. A region of text is credited once per requirement: a match
//! overlapping one already counted by an earlier pattern is skipped.

use super::patterns::{generate_patterns, SearchPattern};
use crate::context::models::{RelevanceScore, RequirementScore};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::ops::Range;

pub const PER_MATCH_SCORE: f64 = 0.1;
pub const PATTERN_SCORE_CAP: f64 = 0.5;
pub const EXACT_PHRASE_BONUS: f64 = 0.3;
pub const CRITICAL_BONUS: f64 = 1.2;
pub const AGENT_SPECIFIC_BONUS: f64 = 1.1;

/// Nesting depth past which a node is flattened instead of walked
pub const MAX_WALK_DEPTH: usize = 32;

/// Kind of content being scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Critical,
    TaskSpecific,
    AgentSpecific,
    Process,
    Combined,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Critical => "critical",
            ContentType::TaskSpecific => "taskSpecific",
            ContentType::AgentSpecific => "agentSpecific",
            ContentType::Process => "process",
            ContentType::Combined => "combined",
        }
    }

    pub fn from_layer(name: &str) -> Self {
        match name {
            "critical" => ContentType::Critical,
            "taskSpecific" => ContentType::TaskSpecific,
            "agentSpecific" => ContentType::AgentSpecific,
            "process" => ContentType::Process,
            _ => ContentType::Combined,
        }
    }

    /// Multiplier applied to the overall score
    pub fn bonus(&self) -> f64 {
        match self {
            ContentType::Critical => CRITICAL_BONUS,
            ContentType::AgentSpecific => AGENT_SPECIFIC_BONUS,
            _ => 1.0,
        }
    }
}

/// Keys starting with `_` hold bookkeeping, not content
pub fn is_internal_key(key: &str) -> bool {
    key.starts_with('_')
}

/// Flatten a JSON node into searchable text (values only, internal keys skipped)
pub fn value_to_text(value: &Value) -> String {
    let mut out = String::new();
    append_text(value, &mut out, 0);
    out
}

fn append_text(value: &Value, out: &mut String, depth: usize) {
    let mut push = |text: &str, out: &mut String| {
        if text.is_empty() {
            return;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(text);
    };

    match value {
        Value::Null => {}
        Value::String(s) => push(s, out),
        Value::Bool(_) | Value::Number(_) => push(&value.to_string(), out),
        Value::Array(items) => {
            for item in items {
                append_text(item, out, depth + 1);
            }
        }
        Value::Object(map) if depth < MAX_WALK_DEPTH => {
            for (key, item) in map {
                if !is_internal_key(key) {
                    append_text(item, out, depth + 1);
                }
            }
        }
        Value::Object(_) => push(&value.to_string(), out),
    }
}

fn overlaps(claimed: &[Range<usize>], candidate: &Range<usize>) -> bool {
    claimed
        .iter()
        .any(|range| range.start < candidate.end && candidate.start < range.end)
}

/// Score one requirement against text using its pre-generated patterns.
///
/// Each pattern scores `0.1` per match, capped at `0.5`, and an exact phrase
/// adds `0.3`. A text region is credited only once per requirement: a match
/// overlapping a region already claimed by an earlier pattern is skipped.
///
/// For `"api gateway"` against `"The api gateway routes api calls"`:
///
/// | pattern               | matches | credited | score |
/// |-----------------------|---------|----------|-------|
/// | literal `api gateway` | 1       | 1        | 0.1   |
/// | flexible `api gateway`| 1       | 0        | 0.0   |
/// | token `api`           | 2       | 1        | 0.1   |
/// | token `gateway`       | 1       | 0        | 0.0   |
/// | exact phrase bonus    |         |          | 0.3   |
///
/// The total is `0.5`, where counting every pattern independently would
/// give `0.8`.
pub fn score_requirement(text: &str, requirement: &str, patterns: &[SearchPattern]) -> RequirementScore {
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut matches: IndexSet<String> = IndexSet::new();
    let mut score = 0.0;

    for pattern in patterns {
        let mut count = 0usize;
        for found in pattern.find_iter(text) {
            let range = found.range();
            if overlaps(&claimed, &range) {
                continue;
            }
            claimed.push(range);
            matches.insert(found.as_str().to_string());
            count += 1;
        }
        score += (count as f64 * PER_MATCH_SCORE).min(PATTERN_SCORE_CAP);
    }

    let requirement = requirement.trim();
    if !requirement.is_empty() && text.to_lowercase().contains(&requirement.to_lowercase()) {
        score += EXACT_PHRASE_BONUS;
    }

    RequirementScore {
        score: score.clamp(0.0, 1.0),
        matches: matches.into_iter().collect(),
    }
}

/// Requirements trimmed, non-empty and unique, in declaration order
pub fn normalize_requirements(requirements: &[String]) -> Vec<String> {
    let unique: IndexSet<String> = requirements
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    unique.into_iter().collect()
}

/// Score text against a set of requirements.
///
/// The overall score is the mean requirement score times the content-type
/// bonus, clamped to `[0, 1]`. No requirements means a score of zero.
pub fn calculate_content_relevance(
    content: &str,
    requirements: &[String],
    content_type: ContentType,
) -> RelevanceScore {
    let requirements = normalize_requirements(requirements);
    let mut requirement_scores = IndexMap::new();
    let mut matched_terms = IndexSet::new();
    let mut total = 0.0;

    for requirement in &requirements {
        let patterns = generate_patterns(requirement);
        let scored = score_requirement(content, requirement, &patterns);
        total += scored.score;
        matched_terms.extend(scored.matches.iter().map(|m| m.to_lowercase()));
        requirement_scores.insert(requirement.clone(), scored);
    }

    let overall_score = if requirements.is_empty() {
        0.0
    } else {
        (total / requirements.len() as f64 * content_type.bonus()).clamp(0.0, 1.0)
    };

    RelevanceScore {
        content_type: content_type.as_str().to_string(),
        overall_score,
        requirement_scores,
        matched_terms,
        total_requirements: requirements.len(),
    }
}
