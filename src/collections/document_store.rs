//! `DocumentStore`: keyed JSON documents across the named collections (§6.2, §6.5).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::Result;

/// Get/put/list over named collections (`jobs`, `projects`, `pdf_text_cache`, ...).
/// Production wiring binds this against a real document database; the in-memory
/// implementation here is the degrade-to-memory fallback path (§4.1, §6.5).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>>;
    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, collection: &str, key: &str) -> Result<()>;
    async fn list_keys(&self, collection: &str) -> Result<Vec<String>>;
}

/// In-memory `DocumentStore`, keyed by `(collection, key)`.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<(String, String), Value>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&(collection.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<()> {
        let mut documents = self.documents.write().await;
        documents.insert((collection.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<()> {
        let mut documents = self.documents.write().await;
        documents.remove(&(collection.to_string(), key.to_string()));
        Ok(())
    }

    async fn list_keys(&self, collection: &str) -> Result<Vec<String>> {
        let documents = self.documents.read().await;
        Ok(documents.keys().filter(|(c, _)| c == collection).map(|(_, k)| k.clone()).collect())
    }
}
