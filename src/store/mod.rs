//! Document storage
//!
//! Records live in named collections of JSON documents. Collection paths
//! may be nested (`users/{uid}/customVocabUnits`), mirroring the remote
//! database layout.

pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

/// A stored document and its id
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Deserialize the document body
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            AppError::Store(format!("document '{}' has an unexpected shape: {}", self.id, e))
        })
    }
}

/// Collection path for a per-user sub-collection
pub fn user_collection(uid: &str, name: &str) -> String {
    format!("users/{uid}/{name}")
}

/// CRUD over collections of JSON documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    async fn list(&self, collection: &str) -> Result<Vec<Document>>;

    /// Add a document with a generated id and return that id
    async fn create(&self, collection: &str, data: Value) -> Result<String>;

    /// Create or fully replace the document `id`
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()>;

    /// Merge the top-level fields of `fields` into an existing document
    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Documents whose top-level `field` equals `value`
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        Ok(self
            .list(collection)
            .await?
            .into_iter()
            .filter(|doc| doc.data.get(field) == Some(value))
            .collect())
    }
}
