//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only storage capability the ingestion
//! driver needs: select a database, then upsert records by id. Upserts are
//! idempotent, so writing the same id twice replaces rather than duplicates.
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | [`milvus::MilvusStore`] | Milvus over its v2 REST API, embedding each record first |
//! | [`memory::InMemoryStore`] | Tests and dry runs |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod milvus;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::EndpointRecord;

pub use memory::InMemoryStore;
pub use milvus::MilvusStore;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Select `name` for subsequent writes, creating it when missing.
    async fn use_database(&self, name: &str) -> Result<(), StoreError>;

    /// Insert `record`, replacing any record with the same id.
    async fn upsert(&self, record: &EndpointRecord) -> Result<(), StoreError>;
}
