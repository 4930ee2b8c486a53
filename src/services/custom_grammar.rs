//! Learner-authored grammar units
//!
//! Units live in `users/{uid}/customGrammarUnits` with their lessons
//! stored inline.

use std::sync::Arc;

use serde_json::json;

use crate::ai::Tutor;
use crate::core::records::{now_millis, CustomGrammarLesson, CustomGrammarUnit, LessonLevel};
use crate::error::{AppError, Result};
use crate::services::timestamped_id;
use crate::store::{user_collection, DocumentStore};

const COLLECTION: &str = "customGrammarUnits";

/// A lesson as typed in by the learner
#[derive(Debug, Clone, Default)]
pub struct LessonDraft {
    pub title: String,
    pub description: String,
    pub content: String,
    pub examples: Vec<String>,
    pub difficulty: LessonLevel,
}

/// Fields of a lesson to change; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub examples: Option<Vec<String>>,
    pub difficulty: Option<LessonLevel>,
}

pub struct CustomGrammarService {
    store: Arc<dyn DocumentStore>,
}

impl CustomGrammarService {
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
    ) -> Result<CustomGrammarUnit> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Unit name cannot be empty".into()));
        }

        let now = now_millis();
        let mut unit = CustomGrammarUnit {
            id: String::new(),
            uid: uid.to_string(),
            name: name.to_string(),
            description: description.trim().to_string(),
            lessons: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        unit.id = self
            .store
            .create(&Self::collection(uid), serde_json::to_value(&unit)?)
            .await?;
        tracing::info!(unit = %unit.id, "created custom grammar unit");
        Ok(unit)
    }

    /// All of the learner's units, oldest first
    pub async fn list_units(&self, uid: &str) -> Result<Vec<CustomGrammarUnit>> {
        let mut units = self
            .store
            .list(&Self::collection(uid))
            .await?
            .into_iter()
            .map(|doc| {
                let mut unit: CustomGrammarUnit = doc.decode()?;
                unit.id = doc.id;
                Ok(unit)
            })
            .collect::<Result<Vec<_>>>()?;
        units.sort_by_key(|u| u.created_at);
        Ok(units)
    }

    pub async fn get_unit(&self, uid: &str, unit_id: &str) -> Result<CustomGrammarUnit> {
        let doc = self
            .store
            .get(&Self::collection(uid), unit_id)
            .await?
            .ok_or_else(|| AppError::UnitNotFound(unit_id.to_string()))?;
        let mut unit: CustomGrammarUnit = doc.decode()?;
        unit.id = doc.id;
        Ok(unit)
    }

    async fn save_lessons(
        &self,
        uid: &str,
        unit_id: &str,
        lessons: &[CustomGrammarLesson],
        now: i64,
    ) -> Result<()> {
        self.store
            .update(
                &Self::collection(uid),
                unit_id,
                json!({ "lessons": serde_json::to_value(lessons)?, "updatedAt": now }),
            )
            .await
    }

    async fn append_lesson(
        &self,
        uid: &str,
        unit_id: &str,
        draft: LessonDraft,
        is_ai_generated: bool,
    ) -> Result<CustomGrammarLesson> {
        let mut unit = self.get_unit(uid, unit_id).await?;
        let now = now_millis();
        let id = timestamped_id("lesson", now, |candidate| {
            unit.lessons.iter().any(|l| l.id == candidate)
        });
        let lesson = CustomGrammarLesson {
            id,
            title: draft.title,
            description: draft.description,
            content: draft.content,
            examples: draft.examples,
            difficulty: draft.difficulty,
            created_at: now,
            updated_at: now,
            is_ai_generated,
        };
        unit.lessons.push(lesson.clone());
        self.save_lessons(uid, unit_id, &unit.lessons, now).await?;
        Ok(lesson)
    }

    pub async fn add_manual_lesson(
        &self,
        uid: &str,
        unit_id: &str,
        draft: LessonDraft,
    ) -> Result<CustomGrammarLesson> {
        if draft.title.trim().is_empty() || draft.content.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "A lesson needs a title and content".into(),
            ));
        }
        self.append_lesson(uid, unit_id, draft, false).await
    }

    /// Add a lesson written by the tutor about `topic`
    pub async fn generate_ai_lesson(
        &self,
        tutor: &Tutor,
        uid: &str,
        unit_id: &str,
        topic: &str,
        level: LessonLevel,
    ) -> Result<CustomGrammarLesson> {
        self.get_unit(uid, unit_id).await?;
        let generated = tutor.grammar_lesson(topic, level).await?;
        let draft = LessonDraft {
            title: generated.title,
            description: generated.description,
            content: generated.content,
            examples: generated.examples,
            difficulty: level,
        };
        self.append_lesson(uid, unit_id, draft, true).await
    }

    pub async fn update_lesson(
        &self,
        uid: &str,
        unit_id: &str,
        lesson_id: &str,
        update: LessonUpdate,
    ) -> Result<()> {
        let mut unit = self.get_unit(uid, unit_id).await?;
        let now = now_millis();
        for lesson in unit.lessons.iter_mut().filter(|l| l.id == lesson_id) {
            if let Some(title) = &update.title {
                lesson.title = title.clone();
            }
            if let Some(description) = &update.description {
                lesson.description = description.clone();
            }
            if let Some(content) = &update.content {
                lesson.content = content.clone();
            }
            if let Some(examples) = &update.examples {
                lesson.examples = examples.clone();
            }
            if let Some(difficulty) = update.difficulty {
                lesson.difficulty = difficulty;
            }
            lesson.updated_at = now;
        }
        self.save_lessons(uid, unit_id, &unit.lessons, now).await
    }

    pub async fn delete_lesson(&self, uid: &str, unit_id: &str, lesson_id: &str) -> Result<()> {
        let mut unit = self.get_unit(uid, unit_id).await?;
        unit.lessons.retain(|l| l.id != lesson_id);
        self.save_lessons(uid, unit_id, &unit.lessons, now_millis())
            .await
    }

    pub async fn delete_unit(&self, uid: &str, unit_id: &str) -> Result<()> {
        self.store.delete(&Self::collection(uid), unit_id).await?;
        tracing::info!(unit = %unit_id, "deleted custom grammar unit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockTextGenerator;
    use crate::store::MemoryStore;

    fn service() -> CustomGrammarService {
        CustomGrammarService::new(Arc::new(MemoryStore::new()))
    }

    fn draft(title: &str) -> LessonDraft {
        LessonDraft {
            title: title.into(),
            content: "## Form\nS + V".into(),
            ..LessonDraft::default()
        }
    }

    #[tokio::test]
    async fn test_manual_lesson_lifecycle() {
        let svc = service();
        let unit = svc.create_unit("u1", "My tenses", "").await.unwrap();

        let lesson = svc
            .add_manual_lesson("u1", &unit.id, draft("Present Simple"))
            .await
            .unwrap();
        assert!(lesson.id.starts_with("lesson_"));
        assert!(!lesson.is_ai_generated);

        svc.update_lesson(
            "u1",
            &unit.id,
            &lesson.id,
            LessonUpdate {
                difficulty: Some(LessonLevel::Advanced),
                examples: Some(vec!["She works.".into()]),
                ..LessonUpdate::default()
            },
        )
        .await
        .unwrap();

        let stored = svc.get_unit("u1", &unit.id).await.unwrap();
        assert_eq!(stored.lessons[0].difficulty, LessonLevel::Advanced);
        assert_eq!(stored.lessons[0].title, "Present Simple");

        svc.delete_lesson("u1", &unit.id, &lesson.id).await.unwrap();
        assert!(svc.get_unit("u1", &unit.id).await.unwrap().lessons.is_empty());
    }

    #[tokio::test]
    async fn test_manual_lesson_needs_title_and_content() {
        let svc = service();
        let unit = svc.create_unit("u1", "Mine", "").await.unwrap();
        let err = svc
            .add_manual_lesson("u1", &unit.id, LessonDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_generate_ai_lesson() {
        let svc = service();
        let unit = svc.create_unit("u1", "Mine", "").await.unwrap();

        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|req| req.prompt.contains("intermediate"))
            .times(1)
            .returning(|_| {
                Ok(r#"{"title":"Used to","description":"Past habits","content":"**used to** + V","examples":["I used to swim."]}"#.into())
            });
        let tutor = Tutor::new(Arc::new(mock));

        let lesson = svc
            .generate_ai_lesson(&tutor, "u1", &unit.id, "used to", LessonLevel::Intermediate)
            .await
            .unwrap();
        assert!(lesson.is_ai_generated);
        assert_eq!(lesson.difficulty, LessonLevel::Intermediate);
        assert_eq!(svc.list_units("u1").await.unwrap()[0].lessons.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unit_then_lookup_fails() {
        let svc = service();
        let unit = svc.create_unit("u1", "Mine", "").await.unwrap();
        svc.delete_unit("u1", &unit.id).await.unwrap();
        assert!(matches!(
            svc.get_unit("u1", &unit.id).await,
            Err(AppError::UnitNotFound(_))
        ));
    }
}
