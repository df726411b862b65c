//! Specification fetching and `$ref` resolution.
//!
//! [`DefaultResolver`] loads a document from an `http(s)://` URL or a local
//! path, checks that it looks like a Swagger 2 / OpenAPI 3 document, and
//! inlines every local `$ref` (`#/definitions/...`, `#/components/...`). A
//! reference that points back into one of its own ancestors is left as a
//! `$ref` so recursive schemas terminate.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

use crate::error::ResolveError;
use crate::models::SpecDocument;

/// Produces a fully dereferenced specification.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, source: &str) -> Result<SpecDocument, ResolveError>;
}

/// Resolver for HTTP(S) URLs and local files.
pub struct DefaultResolver {
    client: reqwest::Client,
}

impl DefaultResolver {
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Invalid(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<String, ResolveError> {
        tracing::info!(url, "fetching specification");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ResolveError::Fetch {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response.text().await.map_err(|source| ResolveError::Fetch {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Resolver for DefaultResolver {
    async fn resolve(&self, source: &str) -> Result<SpecDocument, ResolveError> {
        let raw = if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch(source).await?
        } else {
            let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
            std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
                path: path.to_path_buf(),
                source,
            })?
        };
        parse_and_resolve(&raw)
    }
}

/// Parse, validate and dereference a raw JSON specification.
pub fn parse_and_resolve(raw: &str) -> Result<SpecDocument, ResolveError> {
    let value: Value = serde_json::from_str(raw)?;
    validate(&value)?;
    let resolved = dereference(&value)?;
    tracing::debug!("specification resolved");
    Ok(SpecDocument::new(resolved))
}

/// Structural check: a version marker and a `paths` object.
pub fn validate(value: &Value) -> Result<(), ResolveError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ResolveError::Invalid("document is not a JSON object".into()))?;

    let versioned = match (obj.get("swagger"), obj.get("openapi")) {
        (Some(Value::String(v)), _) => v.starts_with("2."),
        (_, Some(Value::String(v))) => v.starts_with("3."),
        _ => false,
    };
    if !versioned {
        return Err(ResolveError::Invalid(
            "missing 'swagger: 2.x' or 'openapi: 3.x' version field".into(),
        ));
    }

    match obj.get("paths") {
        Some(Value::Object(paths)) => {
            for (path, item) in paths {
                if !item.is_object() {
                    return Err(ResolveError::Invalid(format!(
                        "path item '{}' is not an object",
                        path
                    )));
                }
            }
            Ok(())
        }
        _ => Err(ResolveError::Invalid("missing 'paths' object".into())),
    }
}

/// Inline every local `$ref` in `root`.
pub fn dereference(root: &Value) -> Result<Value, ResolveError> {
    let mut active = Vec::new();
    resolve_node(root, root, &mut active)
}

fn resolve_node(root: &Value, node: &Value, active: &mut Vec<String>) -> Result<Value, ResolveError> {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                return resolve_ref(root, node, reference, active);
            }
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), resolve_node(root, value, active)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_node(root, item, active))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_ref(
    root: &Value,
    node: &Value,
    reference: &str,
    active: &mut Vec<String>,
) -> Result<Value, ResolveError> {
    let Some(pointer) = reference.strip_prefix('#') else {
        // External references are left for the consumer.
        return Ok(node.clone());
    };
    if active.iter().any(|r| r == reference) {
        return Ok(node.clone());
    }
    let target = root
        .pointer(pointer)
        .ok_or_else(|| ResolveError::Invalid(format!("unresolvable reference '{}'", reference)))?;

    active.push(reference.to_string());
    let resolved = resolve_node(root, target, active);
    active.pop();
    resolved
}
