//! Core data models used throughout openapi-index.
//!
//! These types represent the specification tree, the records handed to the
//! vector store, and the per-operation checkpoint entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An OpenAPI/Swagger document, held as a JSON tree.
///
/// Equality is deep structural equality and does not depend on key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecDocument(Value);

impl SpecDocument {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// A document with no paths, used as the baseline on a first run.
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The `paths` member, if present and an object.
    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.0.get("paths").and_then(Value::as_object)
    }

    /// Look up one operation object by exact path and method.
    pub fn operation(&self, path: &str, method: &str) -> Option<&Map<String, Value>> {
        self.paths()?.get(path)?.get(method)?.as_object()
    }

    /// Whether the document declares `path` at all.
    pub fn has_path(&self, path: &str) -> bool {
        self.paths().is_some_and(|paths| paths.contains_key(path))
    }

    /// Iterate every operation in path, then method, order.
    ///
    /// Only object-valued entries under a path are operations; path-level
    /// `parameters`, `summary` and `$ref` entries are skipped.
    pub fn operations(&self) -> impl Iterator<Item = Operation<'_>> {
        self.paths().into_iter().flat_map(|paths| {
            paths.iter().flat_map(|(path, item)| {
                item.as_object().into_iter().flat_map(move |methods| {
                    methods.iter().filter_map(move |(method, op)| {
                        op.as_object().map(|fields| Operation {
                            path,
                            method,
                            fields,
                        })
                    })
                })
            })
        })
    }

    pub fn operation_count(&self) -> usize {
        self.operations().count()
    }
}

/// A borrowed view of one `(path, method)` operation.
#[derive(Debug, Clone, Copy)]
pub struct Operation<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub fields: &'a Map<String, Value>,
}

impl<'a> Operation<'a> {
    /// The `operationId`, when present and a string.
    pub fn operation_id(&self) -> Option<&'a str> {
        self.fields.get("operationId").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&'a str> {
        self.fields.get("description").and_then(Value::as_str)
    }

    /// Ledger key for this operation.
    pub fn key(&self) -> String {
        crate::ledger::operation_key(self.method, self.path)
    }
}

/// A retrievable record for one endpoint, ready for the vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointRecord {
    pub id: Uuid,
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// One processed operation in the checkpoint ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub uuid: Uuid,
    pub processed_at: DateTime<Utc>,
}

/// Which embedding backend a descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Openai,
    Ollama,
}

impl EmbeddingBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingBackend::Openai => "openai",
            EmbeddingBackend::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit descriptor for one embedding model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub provider: EmbeddingBackend,
    pub name: String,
    pub dimension: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> SpecDocument {
        SpecDocument::new(json!({
            "swagger": "2.0",
            "paths": {
                "/pets": {
                    "parameters": [{"name": "x-trace", "in": "header"}],
                    "get": {"operationId": "listPets"},
                    "post": {"operationId": "createPet"}
                },
                "/pets/{id}": {
                    "get": {"operationId": "getPet"}
                }
            }
        }))
    }

    #[test]
    fn test_operations_skip_path_level_entries() {
        let spec = petstore();
        let keys: Vec<String> = spec.operations().map(|op| op.key()).collect();
        assert_eq!(keys, vec!["get:/pets", "post:/pets", "get:/pets/{id}"]);
    }

    #[test]
    fn test_operation_lookup() {
        let spec = petstore();
        let op = spec.operation("/pets/{id}", "get").unwrap();
        assert_eq!(op["operationId"], "getPet");
        assert!(spec.operation("/pets/{id}", "GET").is_none());
        assert!(spec.operation("/pets", "parameters").is_none());
    }

    #[test]
    fn test_empty_document_has_no_operations() {
        assert_eq!(SpecDocument::empty().operation_count(), 0);
        assert!(!SpecDocument::empty().has_path("/pets"));
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a: SpecDocument = serde_json::from_str(r#"{"a": 1, "b": {"c": 2, "d": 3}}"#).unwrap();
        let b: SpecDocument = serde_json::from_str(r#"{"b": {"d": 3, "c": 2}, "a": 1}"#).unwrap();
        assert_eq!(a, b);
    }
}
