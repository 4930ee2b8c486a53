//! In-process document store
//!
//! Keeps documents in memory for the lifetime of the value. Used by tests
//! and anywhere a throwaway store is enough.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::store::{Document, DocumentStore};

pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    next_id: AtomicU64,
    /// When set, every call fails with this message
    failure: RwLock<Option<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            failure: RwLock::new(None),
        }
    }

    /// Make every following call fail (or succeed again with `None`)
    pub async fn set_failure(&self, message: Option<String>) {
        *self.failure.write().await = message;
    }

    /// Number of documents in `collection`
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    async fn check(&self) -> Result<()> {
        match self.failure.read().await.as_ref() {
            Some(message) => Err(AppError::Store(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.check().await?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        self.check().await?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, collection: &str, data: Value) -> Result<String> {
        self.check().await?;
        let id = format!("doc-{:06}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        self.check().await?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<()> {
        self.check().await?;
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| AppError::Store(format!("no document {collection}/{id}")))?;

        match (existing.as_object_mut(), fields) {
            (Some(target), Value::Object(changes)) => {
                for (key, value) in changes {
                    target.insert(key, value);
                }
                Ok(())
            }
            _ => Err(AppError::Store(
                "update expects an object document and object fields".into(),
            )),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.check().await?;
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let store = MemoryStore::new();
        let id = store.create("notes", json!({"a": 1, "b": 2})).await.unwrap();

        store.update("notes", &id, json!({"b": 3, "c": 4})).await.unwrap();
        let doc = store.get("notes", &id).await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"a": 1, "b": 3, "c": 4}));

        store.delete("notes", &id).await.unwrap();
        assert!(store.get("notes", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryStore::new();
        assert!(store.update("notes", "nope", json!({"a": 1})).await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_field() {
        let store = MemoryStore::new();
        store.create("c", json!({"type": "ai"})).await.unwrap();
        store.create("c", json!({"type": "community"})).await.unwrap();
        let found = store
            .find_by_field("c", "type", &json!("community"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.set_failure(Some("offline".into())).await;
        assert!(matches!(store.list("c").await, Err(AppError::Store(_))));
        store.set_failure(None).await;
        assert!(store.list("c").await.unwrap().is_empty());
    }
}
