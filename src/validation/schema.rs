//! Header schemas for agent, project, spec and task documents

use crate::context::models::ValidationResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Expected shape of a header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Sequence,
    Mapping,
    Number,
    Boolean,
}

impl FieldType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Sequence => value.is_array(),
            FieldType::Mapping => value.is_object(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Sequence => "sequence",
            FieldType::Mapping => "mapping",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Document kinds with a header schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Agent,
    Project,
    Spec,
    Task,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Agent => "agent",
            SchemaType::Project => "project",
            SchemaType::Spec => "spec",
            SchemaType::Task => "task",
        }
    }

    pub fn schema(&self) -> &'static Schema {
        match self {
            SchemaType::Agent => &AGENT_SCHEMA,
            SchemaType::Project => &PROJECT_SCHEMA,
            SchemaType::Spec => &SPEC_SCHEMA,
            SchemaType::Task => &TASK_SCHEMA,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Required and optional fields of one document kind
#[derive(Debug)]
pub struct Schema {
    pub required: &'static [(&'static str, FieldType)],
    pub optional: &'static [(&'static str, FieldType)],
}

impl Schema {
    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .find(|(name, _)| *name == field)
            .map(|(_, ty)| *ty)
    }
}

use FieldType::{Mapping, Sequence, String as Str};

static AGENT_SCHEMA: Schema = Schema {
    required: &[
        ("agent_type", Str),
        ("capabilities", Sequence),
        ("context_requirements", Sequence),
    ],
    optional: &[
        ("specialization_areas", Sequence),
        ("workflow_steps", Sequence),
        ("validation_requirements", Sequence),
        ("handoff_checklist", Sequence),
        ("description", Str),
        ("version", Str),
    ],
};

static PROJECT_SCHEMA: Schema = Schema {
    required: &[("context_type", Str)],
    optional: &[
        ("project_name", Str),
        ("description", Str),
        ("last_updated", Str),
        ("constraints", Sequence),
    ],
};

static SPEC_SCHEMA: Schema = Schema {
    required: &[("spec_id", Str)],
    optional: &[
        ("context_type", Str),
        ("status", Str),
        ("priority", Str),
        ("title", Str),
        ("last_updated", Str),
        ("research_findings", Sequence),
        ("implementation_decisions", Sequence),
        ("constraints", Sequence),
        ("blockers", Sequence),
        ("next_steps", Sequence),
        ("progress", Mapping),
    ],
};

static TASK_SCHEMA: Schema = Schema {
    required: &[("task_id", Str)],
    optional: &[
        ("spec_id", Str),
        ("context_type", Str),
        ("status", Str),
        ("priority", Str),
        ("title", Str),
        ("assigned_agent", Str),
        ("agent_type", Str),
        ("last_updated", Str),
        ("decisions_made", Sequence),
        ("implementation_notes", Sequence),
        ("research_findings", Sequence),
        ("constraints", Sequence),
        ("blockers", Sequence),
        ("next_steps", Sequence),
        ("progress", Mapping),
    ],
};

pub const PRIORITIES: [&str; 4] = ["P0", "P1", "P2", "P3"];

pub const STATUSES: [&str; 6] = [
    "active",
    "ready",
    "in_progress",
    "blocked",
    "completed",
    "cancelled",
];

pub const CONTEXT_TYPES: [&str; 5] = ["project", "spec", "task", "agent", "process"];

pub const KNOWN_AGENTS: [&str; 9] = [
    "backend-developer",
    "frontend-developer",
    "software-architect",
    "testing-specialist",
    "devops-engineer",
    "product-manager",
    "ui-ux-designer",
    "security-specialist",
    "technical-writer",
];

/// Allowed values for enum-constrained fields
fn allowed_values(field: &str) -> Option<&'static [&'static str]> {
    match field {
        "priority" => Some(&PRIORITIES),
        "status" => Some(&STATUSES),
        "context_type" => Some(&CONTEXT_TYPES),
        "agent_type" | "assigned_agent" => Some(&KNOWN_AGENTS),
        _ => None,
    }
}

/// Check a header against a schema, accumulating into `result`.
///
/// Missing required fields and type mismatches are errors; unrecognized
/// enum values are warnings. Fields outside the schema are ignored.
pub fn validate_context_schema(
    header: &Map<String, Value>,
    schema_type: SchemaType,
    result: &mut ValidationResult,
) {
    let schema = schema_type.schema();

    for (field, _) in schema.required {
        if header.get(*field).map_or(true, Value::is_null) {
            result.error(format!(
                "Missing required field '{field}' in {schema_type} context"
            ));
        }
    }

    for (field, value) in header {
        let Some(expected) = schema.field_type(field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if !expected.matches(value) {
            result.error(format!(
                "Field '{field}' in {schema_type} context must be a {}, found {}",
                expected.as_str(),
                type_name(value)
            ));
            continue;
        }

        if let (Some(allowed), Some(text)) = (allowed_values(field), value.as_str()) {
            if !allowed.contains(&text) {
                result.warning(format!(
                    "Unrecognized {field} '{text}' in {schema_type} context"
                ));
            }
        }
    }
}
