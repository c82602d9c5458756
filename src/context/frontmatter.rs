//! Header/body document codec
//!
//! A document starts with a line of exactly `---`, then a YAML block, a
//! closing `---` line and the free-text body. Without that framing the
//! whole text is the body and the header is empty.

use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

const DELIMITER: &str = "---";

/// Parsed header/body document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub header: Map<String, Value>,
    pub body: String,
}

impl Document {
    pub fn new(header: Map<String, Value>, body: impl Into<String>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }

    /// Document with an empty header and the given body
    pub fn body_only(body: impl Into<String>) -> Self {
        Self::new(Map::new(), body)
    }

    /// Look up a header field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.header.get(key)
    }

    /// Read a header field as a list of strings.
    ///
    /// A scalar string is treated as a one-element list; non-string
    /// sequence items are rendered with their JSON text.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.header.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Read a header field as a string
    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.header.get(key).and_then(Value::as_str)
    }
}

/// Split text into the raw header block and the body.
///
/// Returns `None` when the opening or closing delimiter is missing.
fn split_header(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(DELIMITER)?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(|c| c == '\r' || c == '\n') == DELIMITER {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn parse_header(raw: &str) -> std::result::Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(format!("header is not a mapping (found {})", value_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Parse a document, falling back to a header-less document when the
/// header block cannot be read.
pub fn parse(text: &str) -> Document {
    let Some((raw_header, body)) = split_header(text) else {
        return Document::body_only(text);
    };

    match parse_header(raw_header) {
        Ok(header) => Document::new(header, body),
        Err(e) => {
            warn!("Ignoring malformed document header: {}", e);
            Document::body_only(text)
        }
    }
}

/// Parse a document, failing on a malformed header block.
///
/// `origin` names the source in the error (usually a file path).
pub fn parse_strict(text: &str, origin: &str) -> Result<Document> {
    let Some((raw_header, body)) = split_header(text) else {
        return Ok(Document::body_only(text));
    };

    parse_header(raw_header)
        .map(|header| Document::new(header, body))
        .map_err(|message| ContextError::parse(origin, message))
}

/// Emit a document in the delimited format read by [`parse`]
pub fn serialize(header: &Map<String, Value>, body: &str) -> Result<String> {
    let yaml = if header.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(header)?
    };

    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}
