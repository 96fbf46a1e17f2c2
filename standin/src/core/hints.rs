//! Field hints derived from a route's sample schema.
//!
//! The schema is a sample JSON document. Walking it yields one [`FieldHint`]
//! per object key, with nested keys joined by `.` and array elements marked
//! with `[*]`. Free-text instructions are attached by full path from the
//! route's hint map.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

const NO_INSTRUCTIONS: &str = "No specific field instructions found.";

/// One field of the expected response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldHint {
    pub path: String,
    pub kind: &'static str,
    pub hint: Option<String>,
}

/// Collect field hints from `schema`, depth first.
pub fn walk(schema: &Value, hints: &BTreeMap<String, String>) -> Vec<FieldHint> {
    let mut fields = Vec::new();
    walk_value(schema, "", hints, &mut fields);
    fields
}

fn walk_value(
    value: &Value,
    prefix: &str,
    hints: &BTreeMap<String, String>,
    out: &mut Vec<FieldHint>,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                out.push(FieldHint {
                    path: path.clone(),
                    kind: kind_of(child),
                    hint: hints.get(&path).cloned(),
                });
                walk_value(child, &path, hints, out);
            }
        }
        Value::Array(items) => {
            if let Some(first) = items.first() {
                walk_value(first, &format!("{prefix}[*]"), hints, out);
            }
        }
        _ => {}
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render hints as a markdown list for a text-generation prompt.
pub fn format_field_instructions(fields: &[FieldHint]) -> String {
    if fields.is_empty() {
        return NO_INSTRUCTIONS.to_string();
    }

    let mut buf = String::new();
    for field in fields {
        buf.push_str(&format!("- **`{}`** ({})", field.path, field.kind));
        if let Some(hint) = &field.hint {
            buf.push_str(&format!(": {hint}"));
        }
        buf.push('\n');
    }
    buf
}
