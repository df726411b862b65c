//! Milvus [`VectorStore`] over the v2 REST API.
//!
//! Each upsert embeds the record text with every configured provider and
//! writes one row:
//!
//! | Field | Type |
//! |-------|------|
//! | `id` | `VarChar` primary key (the record's stable id) |
//! | `text` | `VarChar` |
//! | `metadata` | `JSON` |
//! | `<provider>_dense` | `FloatVector(dimension)`, one per embedding model |
//!
//! The collection is created on first use and kept across runs, so an
//! incremental run only replaces the rows it touches.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::embedding::{vector_field_names, EmbeddingProvider};
use crate::error::StoreError;
use crate::models::{EmbeddingModel, EndpointRecord};

use super::VectorStore;

/// Max length of the `text` VarChar field.
const TEXT_MAX_LENGTH: usize = 65_535;

pub struct MilvusStore {
    base_url: String,
    token: String,
    collection: String,
    client: reqwest::Client,
    embedders: Vec<(String, Box<dyn EmbeddingProvider>)>,
    database: RwLock<Option<String>>,
}

impl MilvusStore {
    pub fn new(
        config: &StoreConfig,
        embedders: Vec<Box<dyn EmbeddingProvider>>,
    ) -> Result<Self, StoreError> {
        let base_url = config
            .url
            .as_deref()
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or_else(|| StoreError::Config("store URL must be an http(s) URL".into()))?
            .trim_end_matches('/')
            .to_string();
        if embedders.is_empty() {
            return Err(StoreError::Config(
                "at least one embedding model is required".into(),
            ));
        }

        let models: Vec<EmbeddingModel> = embedders.iter().map(|e| e.model().clone()).collect();
        let embedders = vector_field_names(&models).into_iter().zip(embedders).collect();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            token: config.token.clone(),
            collection: config.collection.clone(),
            client,
            embedders,
            database: RwLock::new(None),
        })
    }

    fn current_database(&self) -> Result<String, StoreError> {
        self.database
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| StoreError::Config("no database selected".into()))
    }

    fn models(&self) -> Vec<(&str, &EmbeddingModel)> {
        self.embedders
            .iter()
            .map(|(field, e)| (field.as_str(), e.model()))
            .collect()
    }

    async fn call(&self, endpoint: &str, body: &Value) -> Result<Value, StoreError> {
        let url = format!("{}/v2/vectordb/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Request(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                code: i64::from(status.as_u16()),
                message: text,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Request(format!("{}: invalid response: {}", url, e)))?;
        check_response(json)
    }

    async fn ensure_collection(&self, database: &str) -> Result<(), StoreError> {
        let has = self
            .call(
                "collections/has",
                &json!({"dbName": database, "collectionName": self.collection}),
            )
            .await?;
        if has.pointer("/data/has").and_then(Value::as_bool) == Some(true) {
            return Ok(());
        }

        tracing::info!(database, collection = %self.collection, "creating collection");
        self.call(
            "collections/create",
            &collection_schema(database, &self.collection, &self.models()),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MilvusStore {
    async fn use_database(&self, name: &str) -> Result<(), StoreError> {
        let listed = self.call("databases/list", &json!({})).await?;
        let exists = listed
            .get("data")
            .and_then(Value::as_array)
            .is_some_and(|dbs| dbs.iter().any(|db| db.as_str() == Some(name)));

        if !exists {
            tracing::info!(database = name, "database not found, creating");
            self.call("databases/create", &json!({"dbName": name}))
                .await?;
        }

        self.ensure_collection(name).await?;
        *self.database.write().unwrap_or_else(|e| e.into_inner()) = Some(name.to_string());
        Ok(())
    }

    async fn upsert(&self, record: &EndpointRecord) -> Result<(), StoreError> {
        let database = self.current_database()?;

        let mut vectors = Vec::with_capacity(self.embedders.len());
        for (field, embedder) in &self.embedders {
            let vector = embedder
                .embed(std::slice::from_ref(&record.text))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::Embedding {
                    model: embedder.model().name.clone(),
                    message: "empty embedding response".into(),
                })?;
            if vector.len() != embedder.model().dimension {
                return Err(StoreError::Embedding {
                    model: embedder.model().name.clone(),
                    message: format!(
                        "expected dimension {}, got {}",
                        embedder.model().dimension,
                        vector.len()
                    ),
                });
            }
            vectors.push((field.clone(), vector));
        }

        let body = upsert_body(&database, &self.collection, record, &vectors);
        self.call("entities/upsert", &body).await?;
        Ok(())
    }
}

/// Milvus answers HTTP 200 with a non-zero `code` on failure.
fn check_response(json: Value) -> Result<Value, StoreError> {
    match json.get("code").and_then(Value::as_i64) {
        Some(0) | None => Ok(json),
        Some(code) => Err(StoreError::Api {
            code,
            message: json
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }),
    }
}

/// Request body for `collections/create`.
pub fn collection_schema(
    database: &str,
    collection: &str,
    models: &[(&str, &EmbeddingModel)],
) -> Value {
    let mut fields = vec![
        json!({
            "fieldName": "id",
            "dataType": "VarChar",
            "isPrimary": true,
            "elementTypeParams": {"max_length": "64"}
        }),
        json!({
            "fieldName": "text",
            "dataType": "VarChar",
            "elementTypeParams": {"max_length": TEXT_MAX_LENGTH.to_string()}
        }),
        json!({"fieldName": "metadata", "dataType": "JSON"}),
    ];
    let mut index_params = Vec::new();
    for (field, model) in models {
        fields.push(json!({
            "fieldName": field,
            "dataType": "FloatVector",
            "elementTypeParams": {"dim": model.dimension.to_string()}
        }));
        index_params.push(json!({
            "fieldName": field,
            "indexName": format!("{}_idx", field),
            "metricType": "COSINE",
            "indexType": "AUTOINDEX"
        }));
    }

    json!({
        "dbName": database,
        "collectionName": collection,
        "schema": {
            "autoId": false,
            "enableDynamicField": false,
            "fields": fields
        },
        "indexParams": index_params
    })
}

/// Request body for `entities/upsert` with one row.
pub fn upsert_body(
    database: &str,
    collection: &str,
    record: &EndpointRecord,
    vectors: &[(String, Vec<f32>)],
) -> Value {
    let mut row = serde_json::Map::new();
    row.insert("id".to_string(), Value::String(record.id.to_string()));
    row.insert("text".to_string(), Value::String(truncate(&record.text)));
    row.insert("metadata".to_string(), Value::Object(record.metadata.clone()));
    for (field, vector) in vectors {
        row.insert(field.clone(), json!(vector));
    }

    json!({
        "dbName": database,
        "collectionName": collection,
        "data": [Value::Object(row)]
    })
}

/// Cut `text` to the VarChar limit on a char boundary.
fn truncate(text: &str) -> String {
    if text.len() <= TEXT_MAX_LENGTH {
        return text.to_string();
    }
    let mut end = TEXT_MAX_LENGTH;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
