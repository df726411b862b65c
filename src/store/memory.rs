//! In-memory [`VectorStore`] implementation for testing and dry runs.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. Records are keyed by id, so
//! repeated upserts of one id keep a single record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::EndpointRecord;

use super::VectorStore;

/// In-memory store for tests.
pub struct InMemoryStore {
    records: RwLock<HashMap<Uuid, EndpointRecord>>,
    databases: RwLock<Vec<String>>,
    current: RwLock<Option<String>>,
    upserts: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            databases: RwLock::new(Vec::new()),
            current: RwLock::new(None),
            upserts: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<EndpointRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Number of distinct records held.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total upsert calls, including replacements.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn current_database(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn databases(&self) -> Vec<String> {
        self.databases
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn use_database(&self, name: &str) -> Result<(), StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::Config("database name must not be empty".into()));
        }
        {
            let mut dbs = self.databases.write().unwrap_or_else(|e| e.into_inner());
            if !dbs.iter().any(|db| db == name) {
                dbs.push(name.to_string());
            }
        }
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(name.to_string());
        Ok(())
    }

    async fn upsert(&self, record: &EndpointRecord) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.id, record.clone());
        Ok(())
    }
}
