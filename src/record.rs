//! Endpoint record construction.
//!
//! Turns one operation into an [`EndpointRecord`]: a stable id derived from
//! the `operationId`, a text body composed for embedding, and flat metadata
//! for filtering at query time.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::OperationError;
use crate::markup::html_to_markdown;
use crate::models::{EndpointRecord, Operation};

/// Namespace for endpoint ids. Changing it re-keys every stored record.
pub const ENDPOINT_NAMESPACE: Uuid = Uuid::from_u128(0x6f70_656e_6170_6949_8e64_7870_6f69_6e74);

/// Deterministic id for an `operationId`.
///
/// Depends on the `operationId` alone, so re-ingesting an operation always
/// targets the same stored record.
pub fn stable_id(operation_id: &str) -> Uuid {
    Uuid::new_v5(&ENDPOINT_NAMESPACE, operation_id.as_bytes())
}

/// Build the record for `op`, using `summary` as its description text.
pub fn build_record(op: &Operation<'_>, summary: &str) -> Result<EndpointRecord, OperationError> {
    let operation_id = op.operation_id().ok_or_else(|| {
        OperationError::Malformed(format!(
            "{} {} has no operationId",
            op.method.to_uppercase(),
            op.path
        ))
    })?;

    let text = format!(
        "{} {} - {}\n\ndescription: {}\n\ntags: {}\n\nparameters: {}\n\nresponses: {}",
        op.method.to_uppercase(),
        op.path,
        operation_id,
        summary.trim(),
        render_tags(op.fields.get("tags")),
        render_value(op.fields.get("parameters")),
        render_value(op.fields.get("responses")),
    );

    Ok(EndpointRecord {
        id: stable_id(operation_id),
        text,
        metadata: build_metadata(op),
    })
}

/// Metadata: upper-cased `method`, `path`, then every operation field.
///
/// The description is stored as markdown and list-valued fields are stored
/// as JSON text, since vector store scalar fields cannot hold arrays of
/// mixed objects.
pub fn build_metadata(op: &Operation<'_>) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("method".to_string(), Value::String(op.method.to_uppercase()));
    metadata.insert("path".to_string(), Value::String(op.path.to_string()));

    for (key, value) in op.fields {
        let stored = match (key.as_str(), value) {
            ("description", Value::String(html)) => Value::String(html_to_markdown(html)),
            (_, Value::Array(_)) => Value::String(value.to_string()),
            _ => value.clone(),
        };
        metadata.insert(key.clone(), stored);
    }
    metadata
}

fn render_tags(tags: Option<&Value>) -> String {
    match tags {
        Some(Value::Array(items)) => items
            .iter()
            .map(|tag| match tag {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => render_value(other),
    }
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "none".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
