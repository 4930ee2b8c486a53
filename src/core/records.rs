//! Records stored in the document database
//!
//! Field names are camelCase on the wire so documents written by other
//! clients of the same project stay readable. Timestamps are Unix epoch
//! milliseconds.

use serde::{Deserialize, Serialize};

use crate::core::content::{Flashcard, Unit, VocabularyPart};

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    #[default]
    User,
    Moderator,
    AiBot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStats {
    pub total_lessons: u32,
    pub current_level: String,
    pub streak: u32,
}

impl Default for LearningStats {
    fn default() -> Self {
        Self {
            total_lessons: 0,
            current_level: "Beginner".to_string(),
            streak: 0,
        }
    }
}

/// Profile document under `users/{uid}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_stats: Option<LearningStats>,
}

impl UserProfile {
    /// Profile for a freshly registered learner
    pub fn new_learner(uid: &str, email: &str, display_name: &str) -> Self {
        let now = now_millis();
        Self {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            avatar: None,
            role: UserRole::User,
            is_admin: false,
            created_at: now,
            updated_at: now,
            learning_stats: Some(LearningStats::default()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Custom vocabulary
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomVocabModule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub words: Vec<Flashcard>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub is_ai_generated: bool,
}

/// A learner-authored vocabulary unit under `users/{uid}/customVocabUnits`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomVocabUnit {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modules: Vec<CustomVocabModule>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CustomVocabUnit {
    pub fn word_count(&self) -> usize {
        self.modules.iter().map(|m| m.words.len()).sum()
    }

    /// View the unit as a built-in unit, one part per module
    pub fn to_unit(&self) -> Unit {
        Unit {
            name: self.name.clone(),
            parts: self
                .modules
                .iter()
                .map(|module| VocabularyPart {
                    name: module.name.clone(),
                    words: module.words.clone(),
                })
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Custom grammar
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl LessonLevel {
    pub fn all() -> &'static [LessonLevel] {
        &[
            LessonLevel::Beginner,
            LessonLevel::Intermediate,
            LessonLevel::Advanced,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LessonLevel::Beginner => "beginner",
            LessonLevel::Intermediate => "intermediate",
            LessonLevel::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomGrammarLesson {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub difficulty: LessonLevel,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub is_ai_generated: bool,
}

/// A learner-authored grammar unit under `users/{uid}/customGrammarUnits`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomGrammarUnit {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub lessons: Vec<CustomGrammarLesson>,
    pub created_at: i64,
    pub updated_at: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Community,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConversationKind,
    pub name: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_sender: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_role: Option<UserRole>,
    pub content: String,
    pub timestamp: i64,
    #[serde(default)]
    pub is_ai_response: bool,
    #[serde(default)]
    pub mentions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_wire_format() {
        let profile = UserProfile::new_learner("u1", "a@b.c", "An");
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["displayName"], "An");
        assert_eq!(value["role"], "user");
        assert_eq!(value["learningStats"]["currentLevel"], "Beginner");
    }

    #[test]
    fn test_role_parses_ai_bot() {
        let role: UserRole = serde_json::from_value(json!("ai_bot")).unwrap();
        assert_eq!(role, UserRole::AiBot);
    }

    #[test]
    fn test_custom_unit_to_unit_keeps_module_order() {
        let module = |id: &str, words: usize| CustomVocabModule {
            id: id.into(),
            name: id.to_uppercase(),
            words: (0..words)
                .map(|i| Flashcard {
                    id: i as u64,
                    word: format!("{id}-{i}"),
                    pronunciation: String::new(),
                    meaning: String::new(),
                    synonyms: vec![],
                    antonyms: vec![],
                    examples: vec![],
                })
                .collect(),
            created_at: 0,
            updated_at: 0,
            is_ai_generated: false,
        };
        let unit = CustomVocabUnit {
            id: "x".into(),
            uid: "u".into(),
            name: "Mine".into(),
            description: String::new(),
            modules: vec![module("a", 2), module("b", 1)],
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(unit.word_count(), 3);
        let words = unit.to_unit().words();
        assert_eq!(words[2].word, "b-0");
    }

    #[test]
    fn test_document_id_not_serialized() {
        let conversation = Conversation {
            id: "c1".into(),
            kind: ConversationKind::Community,
            name: "Community".into(),
            participants: vec![],
            last_message: None,
            last_message_time: None,
            last_message_sender: None,
            unread_count: 0,
            created_at: 1,
            updated_at: 1,
        };
        let value = serde_json::to_value(&conversation).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["type"], "community");
    }
}
