//! Structural validation of injected context bundles
//!
//! The bundle is checked in its serialized form so the checks see exactly
//! what a consumer receives. Validation never mutates the bundle.

use super::schema::{validate_context_schema, SchemaType};
use crate::config::PerformanceTargets;
use crate::context::models::{
    ContextBundle, LayerValidation, PerformanceReport, ValidationResult, LAYER_NAMES,
};
use serde_json::{Map, Value};
use tracing::debug;

/// Key of the whole-request timing in `metadata.performance`
pub const TOTAL_TIMING_KEY: &str = "total";

const REQUIRED_SECTIONS: [&str; 4] = ["metadata", "layers", "inheritance", "filtering"];
const HIERARCHY_LEVELS: [&str; 3] = ["project", "spec", "task"];

/// Checks bundles against the fixed layer contract and performance targets
#[derive(Debug, Clone, Default)]
pub struct ContextValidator {
    targets: PerformanceTargets,
}

impl ContextValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(targets: PerformanceTargets) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &PerformanceTargets {
        &self.targets
    }

    /// Validate a bundle; `is_valid` holds iff no errors were recorded
    pub fn validate_injected_context(&self, bundle: &ContextBundle) -> ValidationResult {
        let mut result = ValidationResult::new();

        let value = match serde_json::to_value(bundle) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                result.error("Context bundle is not an object");
                return result;
            }
            Err(e) => {
                result.error(format!("Context bundle could not be serialized: {e}"));
                return result;
            }
        };

        self.validate_structure(&value, &mut result);
        if let Some(Value::Object(layers)) = value.get("layers") {
            self.validate_layers(layers, &mut result);
        }
        if let Some(Value::Object(inheritance)) = value.get("inheritance") {
            self.validate_inheritance(inheritance, &mut result);
        }
        if let Some(Value::Object(filtering)) = value.get("filtering") {
            self.validate_filtering(filtering, &mut result);
        }
        if let Some(performance) = value
            .get("metadata")
            .and_then(|metadata| metadata.get("performance"))
            .and_then(Value::as_object)
        {
            result.performance = self.validate_performance(performance, &mut result);
        }

        result.finish();
        debug!(
            is_valid = result.is_valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Validated injected context"
        );
        result
    }

    fn validate_structure(&self, bundle: &Map<String, Value>, result: &mut ValidationResult) {
        for section in REQUIRED_SECTIONS {
            if !bundle.get(section).is_some_and(Value::is_object) {
                result.error(format!("Missing context section: {section}"));
            }
        }
    }

    fn validate_layers(&self, layers: &Map<String, Value>, result: &mut ValidationResult) {
        for name in LAYER_NAMES {
            let Some(layer) = layers.get(name).filter(|layer| !layer.is_null()) else {
                result.warning(format!("Missing context layer: {name}"));
                result.layers.insert(name.to_string(), LayerValidation::default());
                continue;
            };

            let errors_before = result.errors.len();
            match layer.as_object() {
                Some(map) => match name {
                    "critical" => validate_critical(map, result),
                    "taskSpecific" => validate_task_specific(map, result),
                    "agentSpecific" => validate_agent_specific(map, result),
                    "process" => validate_process(map, result),
                    _ => {}
                },
                None => result.error(format!("Context layer {name} must be a mapping")),
            }

            result.layers.insert(
                name.to_string(),
                LayerValidation {
                    present: true,
                    valid: result.errors.len() == errors_before,
                },
            );
        }
    }

    fn validate_inheritance(&self, inheritance: &Map<String, Value>, result: &mut ValidationResult) {
        let hierarchy: Vec<&str> = inheritance
            .get("hierarchy")
            .and_then(Value::as_array)
            .map(|levels| levels.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for level in HIERARCHY_LEVELS {
            if !hierarchy.contains(&level) {
                result.warning(format!("Inheritance hierarchy is missing the {level} level"));
            }
        }
    }

    fn validate_filtering(&self, filtering: &Map<String, Value>, result: &mut ValidationResult) {
        let Some(scores) = filtering.get("relevanceScores").and_then(Value::as_object) else {
            return;
        };

        for (name, score) in scores {
            match score.get("overallScore").and_then(Value::as_f64) {
                Some(value) if (0.0..=1.0).contains(&value) => {}
                Some(value) => result.warning(format!(
                    "Relevance score for {name} is out of range: {value}"
                )),
                None => result.warning(format!("Relevance score for {name} is missing")),
            }
        }
    }

    fn validate_performance(
        &self,
        performance: &Map<String, Value>,
        result: &mut ValidationResult,
    ) -> PerformanceReport {
        let total_ms = performance.get(TOTAL_TIMING_KEY).and_then(Value::as_f64);
        let mut report = PerformanceReport {
            total_ms,
            within_budget: true,
            slow_layers: Vec::new(),
        };

        if let Some(total) = total_ms {
            if total > self.targets.target_ms {
                result.warning(format!(
                    "Context injection took {total:.1}ms, above the {:.0}ms target",
                    self.targets.target_ms
                ));
                report.within_budget = false;
            }
        }

        for name in LAYER_NAMES {
            let Some(elapsed) = performance.get(name).and_then(Value::as_f64) else {
                continue;
            };
            if elapsed > self.targets.layer_target_ms {
                result.warning(format!(
                    "Loading layer {name} took {elapsed:.1}ms, above the {:.0}ms target",
                    self.targets.layer_target_ms
                ));
                report.slow_layers.push(name.to_string());
                report.within_budget = false;
            }
        }

        report
    }
}

fn validate_critical(layer: &Map<String, Value>, result: &mut ValidationResult) {
    for field in ["constraints", "sources"] {
        match layer.get(field) {
            Some(Value::Array(_)) => {}
            Some(_) => result.error(format!("Critical layer field {field} must be a sequence")),
            None => result.warning(format!("Critical layer has no {field}")),
        }
    }
}

fn validate_task_specific(layer: &Map<String, Value>, result: &mut ValidationResult) {
    for (field, schema_type) in [("spec", SchemaType::Spec), ("task", SchemaType::Task)] {
        match layer.get(field) {
            None | Some(Value::Null) => {}
            Some(document) => match document.get("header").and_then(Value::as_object) {
                Some(header) => validate_context_schema(header, schema_type, result),
                None => result.error(format!("Task-specific {field} document has no header")),
            },
        }
    }
}

fn validate_agent_specific(layer: &Map<String, Value>, result: &mut ValidationResult) {
    match layer.get("agentType") {
        Some(Value::String(agent_type)) if !agent_type.trim().is_empty() => {}
        _ => result.error("Agent-specific layer requires agentType"),
    }
    for field in ["capabilities", "contextRequirements"] {
        match layer.get(field) {
            Some(Value::Array(_)) => {}
            Some(_) => result.error(format!("Agent-specific field {field} must be a sequence")),
            None => result.error(format!("Agent-specific layer requires {field}")),
        }
    }
}

fn validate_process(layer: &Map<String, Value>, result: &mut ValidationResult) {
    let sections: Vec<&Map<String, Value>> = ["templates", "checklists"]
        .iter()
        .filter_map(|field| layer.get(*field).and_then(Value::as_object))
        .collect();

    if sections.is_empty() {
        result.error("Process layer requires templates or checklists");
    } else if sections.iter().all(|section| section.is_empty()) {
        result.warning("Process layer has no templates or checklists");
    }
}
