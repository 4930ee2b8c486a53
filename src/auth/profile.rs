//! Learner profiles stored in the `users` collection

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::core::records::{now_millis, UserProfile};
use crate::error::{AppError, Result};
use crate::store::DocumentStore;

pub const USERS_COLLECTION: &str = "users";

/// Profile lookups for the session gate
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>>;
}

/// Profiles kept as documents keyed by uid
pub struct DocumentProfileStore {
    store: Arc<dyn DocumentStore>,
}

impl DocumentProfileStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Write the profile of a newly registered learner
    pub async fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        self.store
            .set(USERS_COLLECTION, &profile.uid, serde_json::to_value(profile)?)
            .await
    }

    /// Rename the learner; returns the name as stored
    pub async fn update_display_name(&self, uid: &str, display_name: &str) -> Result<String> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::InvalidInput("Display name cannot be empty".into()));
        }
        self.store
            .update(
                USERS_COLLECTION,
                uid,
                json!({ "displayName": display_name, "updatedAt": now_millis() }),
            )
            .await?;
        Ok(display_name.to_string())
    }
}

#[async_trait]
impl ProfileStore for DocumentProfileStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        match self.store.get(USERS_COLLECTION, uid).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_create_then_get_profile() {
        let store = Arc::new(MemoryStore::new());
        let profiles = DocumentProfileStore::new(store.clone());

        let profile = UserProfile::new_learner("u1", "lan@example.com", "Lan");
        profiles.create_profile(&profile).await.unwrap();

        let loaded = profiles.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert!(profiles.get_profile("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_display_name() {
        let store = Arc::new(MemoryStore::new());
        let profiles = DocumentProfileStore::new(store);
        profiles
            .create_profile(&UserProfile::new_learner("u1", "lan@example.com", "Lan"))
            .await
            .unwrap();

        let stored = profiles.update_display_name("u1", "  Lan Anh ").await.unwrap();
        assert_eq!(stored, "Lan Anh");
        let loaded = profiles.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(loaded.display_name, "Lan Anh");

        assert!(matches!(
            profiles.update_display_name("u1", "   ").await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
