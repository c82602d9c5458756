//! Project → spec → task inheritance merge

use super::frontmatter::Document;
use super::models::InheritedContext;
use super::paths::ContextKind;
use super::store::{DynamicContext, SemiDynamicContext, StaticContext};
use serde_json::{Map, Value};

/// Header fields holding decisions, in the order they are read
const DECISION_FIELDS: [&str; 3] = [
    "implementation_decisions",
    "implementation_notes",
    "decisions_made",
];

/// Context contributed by one hierarchy level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelContext {
    pub level: ContextKind,
    pub constraints: Vec<String>,
    pub decisions: Vec<String>,
    pub research_findings: Vec<String>,
    pub progress: Map<String, Value>,
    pub blockers: Vec<String>,
    pub next_steps: Vec<String>,
}

impl LevelContext {
    pub fn from_header(level: ContextKind, header: &Map<String, Value>) -> Self {
        let doc = Document::new(header.clone(), "");
        let progress = match header.get("progress") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        Self {
            level,
            constraints: doc.string_list("constraints"),
            decisions: DECISION_FIELDS
                .iter()
                .flat_map(|field| doc.string_list(field))
                .collect(),
            research_findings: doc.string_list("research_findings"),
            progress,
            blockers: doc.string_list("blockers"),
            next_steps: doc.string_list("next_steps"),
        }
    }
}

/// Merge the loaded levels into inherited context.
///
/// `hierarchy` lists, in project/spec/task order, only the levels whose
/// source exists. Constraints, decisions and findings are deduplicated
/// keeping first-seen order. With `enabled == false` only the hierarchy is
/// computed.
pub fn merge_inheritance(
    static_ctx: &StaticContext,
    dynamic_ctx: &DynamicContext,
    semi_ctx: &SemiDynamicContext,
    spec_id: Option<&str>,
    task_id: Option<&str>,
    enabled: bool,
) -> InheritedContext {
    let project = static_ctx
        .document
        .as_ref()
        .map(|doc| LevelContext::from_header(ContextKind::Project, &doc.header));

    let levels: Vec<&LevelContext> = project
        .iter()
        .chain(semi_ctx.spec.iter())
        .chain(semi_ctx.task.iter())
        .collect();

    let mut inherited = InheritedContext {
        hierarchy: levels
            .iter()
            .map(|level| level.level.as_str().to_string())
            .collect(),
        ..Default::default()
    };

    if !enabled {
        return inherited;
    }

    for level in levels {
        inherited.constraints.extend(level.constraints.iter().cloned());
        inherited.decisions.extend(level.decisions.iter().cloned());
        inherited
            .research_findings
            .extend(level.research_findings.iter().cloned());
        for (key, value) in &level.progress {
            inherited.progress.insert(key.clone(), value.clone());
        }
        inherited.blockers.extend(level.blockers.iter().cloned());
        inherited.next_steps.extend(level.next_steps.iter().cloned());
    }

    inherited.current_assignments = task_id.and_then(|id| dynamic_ctx.assignments.get(id).cloned());
    inherited.current_progress = task_id
        .and_then(|id| dynamic_ctx.progress.get(id))
        .or_else(|| spec_id.and_then(|id| dynamic_ctx.progress.get(id)))
        .cloned();

    inherited
}
