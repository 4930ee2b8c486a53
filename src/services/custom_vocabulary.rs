//! Learner-authored vocabulary units
//!
//! Units live in `users/{uid}/customVocabUnits`; their modules are stored
//! inline in the unit document, so every module change rewrites the
//! `modules` array.

use std::sync::Arc;

use serde_json::json;

use crate::ai::Tutor;
use crate::core::content::Flashcard;
use crate::core::records::{now_millis, CustomVocabModule, CustomVocabUnit};
use crate::error::{AppError, Result};
use crate::services::timestamped_id;
use crate::store::{user_collection, DocumentStore};

const COLLECTION: &str = "customVocabUnits";

/// Fields of a module to change; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct ModuleUpdate {
    pub name: Option<String>,
    pub words: Option<Vec<Flashcard>>,
}

pub struct CustomVocabularyService {
    store: Arc<dyn DocumentStore>,
}

impl CustomVocabularyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn collection(uid: &str) -> String {
        user_collection(uid, COLLECTION)
    }

    pub async fn create_unit(
        &self,
        uid: &str,
        name: &str,
        description: &str,
    ) -> Result<CustomVocabUnit> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Unit name cannot be empty".into()));
        }

        let now = now_millis();
        let mut unit = CustomVocabUnit {
            id: String::new(),
            uid: uid.to_string(),
            name: name.to_string(),
            description: description.trim().to_string(),
            modules: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        unit.id = self
            .store
            .create(&Self::collection(uid), serde_json::to_value(&unit)?)
            .await?;
        tracing::info!(unit = %unit.id, "created custom vocabulary unit");
        Ok(unit)
    }

    /// All of the learner's units, oldest first
    pub async fn list_units(&self, uid: &str) -> Result<Vec<CustomVocabUnit>> {
        let mut units = self
            .store
            .list(&Self::collection(uid))
            .await?
            .into_iter()
            .map(|doc| {
                let mut unit: CustomVocabUnit = doc.decode()?;
                unit.id = doc.id;
                Ok(unit)
            })
            .collect::<Result<Vec<_>>>()?;
        units.sort_by_key(|u| u.created_at);
        Ok(units)
    }

    pub async fn get_unit(&self, uid: &str, unit_id: &str) -> Result<CustomVocabUnit> {
        let doc = self
            .store
            .get(&Self::collection(uid), unit_id)
            .await?
            .ok_or_else(|| AppError::UnitNotFound(unit_id.to_string()))?;
        let mut unit: CustomVocabUnit = doc.decode()?;
        unit.id = doc.id;
        Ok(unit)
    }

    async fn save_modules(
        &self,
        uid: &str,
        unit_id: &str,
        modules: &[CustomVocabModule],
        now: i64,
    ) -> Result<()> {
        self.store
            .update(
                &Self::collection(uid),
                unit_id,
                json!({ "modules": serde_json::to_value(modules)?, "updatedAt": now }),
            )
            .await
    }

    async fn append_module(
        &self,
        uid: &str,
        unit_id: &str,
        name: &str,
        words: Vec<Flashcard>,
        is_ai_generated: bool,
    ) -> Result<CustomVocabModule> {
        let mut unit = self.get_unit(uid, unit_id).await?;
        let now = now_millis();
        let id = timestamped_id("module", now, |candidate| {
            unit.modules.iter().any(|m| m.id == candidate)
        });
        let module = CustomVocabModule {
            id,
            name: name.trim().to_string(),
            words,
            created_at: now,
            updated_at: now,
            is_ai_generated,
        };
        unit.modules.push(module.clone());
        self.save_modules(uid, unit_id, &unit.modules, now).await?;
        Ok(module)
    }

    /// Add a module from hand-written flashcards
    pub async fn add_manual_module(
        &self,
        uid: &str,
        unit_id: &str,
        name: &str,
        words: Vec<Flashcard>,
    ) -> Result<CustomVocabModule> {
        self.append_module(uid, unit_id, name, words, false).await
    }

    /// Add a module whose flashcards the tutor writes from a word list
    pub async fn generate_ai_module(
        &self,
        tutor: &Tutor,
        uid: &str,
        unit_id: &str,
        name: &str,
        words: &[String],
    ) -> Result<CustomVocabModule> {
        // Fail before spending a generation on a unit that is gone
        self.get_unit(uid, unit_id).await?;
        let cards = tutor.vocab_module_from_words(words).await?;
        self.append_module(uid, unit_id, name, cards, true).await
    }

    pub async fn update_module(
        &self,
        uid: &str,
        unit_id: &str,
        module_id: &str,
        update: ModuleUpdate,
    ) -> Result<()> {
        let mut unit = self.get_unit(uid, unit_id).await?;
        let now = now_millis();
        for module in unit.modules.iter_mut().filter(|m| m.id == module_id) {
            if let Some(name) = &update.name {
                module.name = name.trim().to_string();
            }
            if let Some(words) = &update.words {
                module.words = words.clone();
            }
            module.updated_at = now;
        }
        self.save_modules(uid, unit_id, &unit.modules, now).await
    }

    pub async fn delete_module(&self, uid: &str, unit_id: &str, module_id: &str) -> Result<()> {
        let mut unit = self.get_unit(uid, unit_id).await?;
        unit.modules.retain(|m| m.id != module_id);
        self.save_modules(uid, unit_id, &unit.modules, now_millis())
            .await
    }

    pub async fn delete_unit(&self, uid: &str, unit_id: &str) -> Result<()> {
        self.store.delete(&Self::collection(uid), unit_id).await?;
        tracing::info!(unit = %unit_id, "deleted custom vocabulary unit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockTextGenerator;
    use crate::store::MemoryStore;

    fn card(id: u64, word: &str) -> Flashcard {
        Flashcard {
            id,
            word: word.into(),
            pronunciation: String::new(),
            meaning: "nghĩa".into(),
            synonyms: vec![],
            antonyms: vec![],
            examples: vec![],
        }
    }

    fn service() -> (Arc<MemoryStore>, CustomVocabularyService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), CustomVocabularyService::new(store))
    }

    #[tokio::test]
    async fn test_create_and_list_units() {
        let (_, svc) = service();
        let unit = svc.create_unit("u1", " Travel ", "words for trips").await.unwrap();
        assert_eq!(unit.name, "Travel");
        assert!(!unit.id.is_empty());

        let units = svc.list_units("u1").await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, unit.id);
        assert!(svc.list_units("someone-else").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_unit_requires_name() {
        let (_, svc) = service();
        assert!(matches!(
            svc.create_unit("u1", "  ", "").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_module_lifecycle() {
        let (_, svc) = service();
        let unit = svc.create_unit("u1", "Travel", "").await.unwrap();

        let first = svc
            .add_manual_module("u1", &unit.id, "Airport", vec![card(1, "gate")])
            .await
            .unwrap();
        let second = svc
            .add_manual_module("u1", &unit.id, "Hotel", vec![card(2, "lobby")])
            .await
            .unwrap();
        assert!(first.id.starts_with("module_"));
        assert_ne!(first.id, second.id);
        assert!(!first.is_ai_generated);

        svc.update_module(
            "u1",
            &unit.id,
            &first.id,
            ModuleUpdate {
                name: Some("Airport words".into()),
                words: None,
            },
        )
        .await
        .unwrap();
        svc.delete_module("u1", &unit.id, &second.id).await.unwrap();

        let stored = svc.get_unit("u1", &unit.id).await.unwrap();
        assert_eq!(stored.modules.len(), 1);
        assert_eq!(stored.modules[0].name, "Airport words");
        assert_eq!(stored.word_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_unit_is_reported() {
        let (_, svc) = service();
        let err = svc
            .add_manual_module("u1", "nope", "x", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnitNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_generate_ai_module() {
        let (_, svc) = service();
        let unit = svc.create_unit("u1", "Travel", "").await.unwrap();

        let mut mock = MockTextGenerator::new();
        mock.expect_generate().times(1).returning(|_| {
            Ok(r#"[{"word":"passport (n)","pronunciation":"/ˈpɑːspɔːt/","meaning":"hộ chiếu","examples":[]}]"#.into())
        });
        let tutor = Tutor::new(Arc::new(mock));

        let module = svc
            .generate_ai_module(&tutor, "u1", &unit.id, "Documents", &["passport".into()])
            .await
            .unwrap();
        assert!(module.is_ai_generated);
        assert_eq!(module.words[0].meaning, "hộ chiếu");
        assert_eq!(svc.get_unit("u1", &unit.id).await.unwrap().modules.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_for_missing_unit_skips_model() {
        let (_, svc) = service();
        let mut mock = MockTextGenerator::new();
        mock.expect_generate().times(0);
        let tutor = Tutor::new(Arc::new(mock));

        let err = svc
            .generate_ai_module(&tutor, "u1", "gone", "x", &["word".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnitNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_unit() {
        let (store, svc) = service();
        let unit = svc.create_unit("u1", "Travel", "").await.unwrap();
        svc.delete_unit("u1", &unit.id).await.unwrap();
        assert_eq!(store.count("users/u1/customVocabUnits").await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (store, svc) = service();
        store.set_failure(Some("offline".into())).await;
        assert!(matches!(
            svc.list_units("u1").await,
            Err(AppError::Store(_))
        ));
    }
}
