//! Learning content model and the bundled catalog
//!
//! Vocabulary is organised as classroom → grade → unit → part → flashcard.
//! Grammar is organised as category → topic → section.

use std::fmt;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Bundled catalog, compiled into the binary
const CATALOG_JSON: &str = include_str!("../../assets/catalog.json");

static CATALOG: OnceCell<Catalog> = OnceCell::new();

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary
// ─────────────────────────────────────────────────────────────────────────────

/// A synonym or antonym attached to a flashcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedWord {
    pub word: String,
    pub pos: String,
    pub meaning: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// A single vocabulary card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: u64,
    pub word: String,
    pub pronunciation: String,
    /// Vietnamese meaning
    pub meaning: String,
    #[serde(default)]
    pub synonyms: Vec<RelatedWord>,
    #[serde(default)]
    pub antonyms: Vec<RelatedWord>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl Flashcard {
    /// The headword without a trailing part-of-speech marker, e.g. `sustain (v)` → `sustain`
    pub fn headword(&self) -> &str {
        self.word
            .split_once('(')
            .map(|(head, _)| head.trim())
            .unwrap_or(self.word.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyPart {
    pub name: String,
    pub words: Vec<Flashcard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub parts: Vec<VocabularyPart>,
}

impl Unit {
    /// All words of the unit in part order
    pub fn words(&self) -> Vec<Flashcard> {
        self.parts
            .iter()
            .flat_map(|part| part.words.iter().cloned())
            .collect()
    }

    pub fn word_count(&self) -> usize {
        self.parts.iter().map(|part| part.words.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub name: String,
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classroom {
    pub name: String,
    pub description: String,
    pub grades: Vec<Grade>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Grammar
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarSection {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Cheat sheet table shown at the end of a lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarTopic {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub sections: Vec<GrammarSection>,
    #[serde(default)]
    pub cheat_sheet: Option<GrammarTable>,
    /// Topics covered together in a mixed practice session
    #[serde(default)]
    pub sub_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub topics: Vec<GrammarTopic>,
}

/// Grammar practice difficulty, mapped to CEFR bands in prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DifficultyLevel {
    #[serde(rename = "Very Easy")]
    VeryEasy,
    #[serde(rename = "Easy")]
    Easy,
    #[default]
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Hard")]
    Hard,
}

impl DifficultyLevel {
    pub fn all() -> &'static [DifficultyLevel] {
        &[
            DifficultyLevel::VeryEasy,
            DifficultyLevel::Easy,
            DifficultyLevel::Medium,
            DifficultyLevel::Hard,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            DifficultyLevel::VeryEasy => "Very Easy",
            DifficultyLevel::Easy => "Easy",
            DifficultyLevel::Medium => "Medium",
            DifficultyLevel::Hard => "Hard",
        }
    }

    pub fn band(&self) -> &'static str {
        match self {
            DifficultyLevel::VeryEasy => "A1",
            DifficultyLevel::Easy => "A2",
            DifficultyLevel::Medium => "B1",
            DifficultyLevel::Hard => "B2/C1",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Kind of AI-generated grammar exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PracticeType {
    #[default]
    MultipleChoice,
    ErrorCorrection,
    ExplainDifference,
}

impl PracticeType {
    pub fn all() -> &'static [PracticeType] {
        &[
            PracticeType::MultipleChoice,
            PracticeType::ErrorCorrection,
            PracticeType::ExplainDifference,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            PracticeType::MultipleChoice => "Multiple choice",
            PracticeType::ErrorCorrection => "Find and fix the error",
            PracticeType::ExplainDifference => "Explain the difference",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Exam preparation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamQuestionType {
    NoticeFlyer,
    Arrangement,
    Cloze,
    Reading,
}

impl ExamQuestionType {
    pub fn all() -> &'static [ExamQuestionType] {
        &[
            ExamQuestionType::NoticeFlyer,
            ExamQuestionType::Arrangement,
            ExamQuestionType::Cloze,
            ExamQuestionType::Reading,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExamQuestionType::NoticeFlyer => "Notice / flyer",
            ExamQuestionType::Arrangement => "Sentence arrangement",
            ExamQuestionType::Cloze => "Cloze passage",
            ExamQuestionType::Reading => "Reading comprehension",
        }
    }

    pub fn api_name(&self) -> &'static str {
        match self {
            ExamQuestionType::NoticeFlyer => "NOTICE_FLYER",
            ExamQuestionType::Arrangement => "ARRANGEMENT",
            ExamQuestionType::Cloze => "CLOZE",
            ExamQuestionType::Reading => "READING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingLength {
    Short,
    Medium,
    Long,
}

impl ReadingLength {
    pub fn words(&self) -> &'static str {
        match self {
            ReadingLength::Short => "150-200",
            ReadingLength::Medium => "250-300",
            ReadingLength::Long => "350-400",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPracticeConfig {
    #[serde(rename = "type")]
    pub question_type: ExamQuestionType,
    pub topic: String,
    #[serde(default)]
    pub reading_length: Option<ReadingLength>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the app ships with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub classrooms: Vec<Classroom>,
    pub grammar: Vec<GrammarCategory>,
    #[serde(default)]
    pub exam_topics: Vec<String>,
    #[serde(default)]
    pub writing_topics: Vec<String>,
}

impl Catalog {
    /// Parse a catalog document
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AppError::Catalog(e.to_string()))
    }

    /// The bundled catalog, parsed once
    pub fn builtin() -> Result<&'static Catalog> {
        CATALOG.get_or_try_init(|| Self::parse(CATALOG_JSON))
    }

    /// Every unit of every grade, with its breadcrumb
    pub fn units(&self) -> impl Iterator<Item = (&Classroom, &Grade, &Unit)> {
        self.classrooms.iter().flat_map(|classroom| {
            classroom
                .grades
                .iter()
                .flat_map(move |grade| grade.units.iter().map(move |unit| (classroom, grade, unit)))
        })
    }

    /// Find a unit by exact name, falling back to a case-insensitive prefix match
    pub fn find_unit(&self, name: &str) -> Option<&Unit> {
        let needle = name.trim().to_lowercase();
        self.units()
            .map(|(_, _, unit)| unit)
            .find(|unit| unit.name == name)
            .or_else(|| {
                self.units()
                    .map(|(_, _, unit)| unit)
                    .find(|unit| unit.name.to_lowercase().starts_with(&needle))
            })
    }

    /// All flashcards in catalog order
    pub fn all_words(&self) -> Vec<Flashcard> {
        self.units().flat_map(|(_, _, unit)| unit.words()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = Catalog::builtin().expect("bundled catalog must parse");
        assert!(!catalog.classrooms.is_empty());
        assert!(!catalog.grammar.is_empty());
        assert!(catalog.units().count() >= 2);
        assert!(!catalog.exam_topics.is_empty());
    }

    #[test]
    fn test_unit_words_flatten_parts_in_order() {
        let catalog = Catalog::builtin().unwrap();
        let (_, _, unit) = catalog.units().next().unwrap();
        let words = unit.words();
        assert_eq!(words.len(), unit.word_count());
        assert_eq!(words[0], unit.parts[0].words[0]);
    }

    #[test]
    fn test_find_unit_by_prefix() {
        let catalog = Catalog::builtin().unwrap();
        let first = catalog.units().next().unwrap().2.name.clone();
        let prefix = &first[..6];
        assert_eq!(catalog.find_unit(&prefix.to_uppercase()).unwrap().name, first);
        assert!(catalog.find_unit("no such unit").is_none());
    }

    #[test]
    fn test_headword_strips_part_of_speech() {
        let card = Flashcard {
            id: 1,
            word: "sustain (v)".into(),
            pronunciation: "/səˈsteɪn/".into(),
            meaning: "duy trì".into(),
            synonyms: vec![],
            antonyms: vec![],
            examples: vec![],
        };
        assert_eq!(card.headword(), "sustain");
    }

    #[test]
    fn test_difficulty_serde_names() {
        let json = serde_json::to_string(&DifficultyLevel::VeryEasy).unwrap();
        assert_eq!(json, "\"Very Easy\"");
        let parsed: PracticeType = serde_json::from_str("\"ERROR_CORRECTION\"").unwrap();
        assert_eq!(parsed, PracticeType::ErrorCorrection);
    }
}
