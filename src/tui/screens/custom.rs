//! Managers for learner-authored vocabulary and grammar units

use crate::core::content::Flashcard;
use crate::core::records::{now_millis, CustomGrammarLesson, CustomGrammarUnit, CustomVocabUnit, LessonLevel};
use crate::error::{AppError, Result};
use crate::tui::screens::{Loadable, TextInput};

/// Parse `word = meaning` entries separated by `;` or new lines
///
/// Ids are derived from the current time so cards added together stay
/// distinct and ordered.
pub fn parse_manual_entries(text: &str) -> Result<Vec<Flashcard>> {
    let base = u64::try_from(now_millis()).unwrap_or_default();
    let cards: Vec<Flashcard> = text
        .split(['\n', ';'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(i, entry)| {
            let (word, meaning) = entry.split_once('=').ok_or_else(|| {
                AppError::InvalidInput(format!("'{entry}' is missing '= meaning'"))
            })?;
            let (word, meaning) = (word.trim(), meaning.trim());
            if word.is_empty() || meaning.is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "'{entry}' needs both a word and a meaning"
                )));
            }
            Ok(Flashcard {
                id: base + i as u64,
                word: word.to_string(),
                pronunciation: String::new(),
                meaning: meaning.to_string(),
                synonyms: vec![],
                antonyms: vec![],
                examples: vec![],
            })
        })
        .collect::<Result<_>>()?;

    if cards.is_empty() {
        return Err(AppError::InvalidInput("Add at least one word".into()));
    }
    Ok(cards)
}

/// Comma or newline separated words for the tutor
pub fn parse_word_list(text: &str) -> Vec<String> {
    text.split([',', '\n', ';'])
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary
// ─────────────────────────────────────────────────────────────────────────────

/// Two-field prompt shown over the unit list
#[derive(Debug, Default)]
pub struct PairPrompt {
    pub first: TextInput,
    pub second: TextInput,
    pub on_second: bool,
}

impl PairPrompt {
    /// A short first field over a multi-line second one
    pub fn long_form() -> Self {
        Self {
            second: TextInput::multiline(),
            ..Self::default()
        }
    }

    pub fn focused(&mut self) -> &mut TextInput {
        if self.on_second {
            &mut self.second
        } else {
            &mut self.first
        }
    }

    pub fn toggle_focus(&mut self) {
        self.on_second = !self.on_second;
    }
}

#[derive(Debug)]
pub enum VocabPrompt {
    /// Name and description of a new unit
    NewUnit(PairPrompt),
    /// Module name and `word = meaning` entries
    ManualModule { unit_id: String, fields: PairPrompt },
    /// Module name and the words the tutor should explain
    AiModule { unit_id: String, fields: PairPrompt },
    ConfirmDelete { unit_id: String, name: String },
}

#[derive(Debug, Default)]
pub struct CustomVocabularyManager {
    pub units: Loadable<Vec<CustomVocabUnit>>,
    pub prompt: Option<VocabPrompt>,
    pub busy: bool,
    pub error: Option<String>,
}

impl CustomVocabularyManager {
    pub fn unit(&self, index: usize) -> Option<&CustomVocabUnit> {
        self.units.ready().and_then(|units| units.get(index))
    }

    pub fn len(&self) -> usize {
        self.units.ready().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grammar
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum GrammarPrompt {
    NewUnit(PairPrompt),
    /// Title and markdown content
    ManualLesson { unit_id: String, fields: PairPrompt },
    /// Topic for a lesson the tutor writes
    AiLesson {
        unit_id: String,
        topic: TextInput,
        level: LessonLevel,
    },
    ConfirmDelete { unit_id: String, name: String },
}

#[derive(Debug, Default)]
pub struct CustomGrammarManager {
    pub units: Loadable<Vec<CustomGrammarUnit>>,
    pub prompt: Option<GrammarPrompt>,
    /// Unit whose lessons are listed instead of the units
    pub open_unit: Option<String>,
    /// Lesson being read
    pub reading: Option<CustomGrammarLesson>,
    pub scroll: usize,
    pub busy: bool,
    pub error: Option<String>,
}

impl CustomGrammarManager {
    pub fn unit(&self, index: usize) -> Option<&CustomGrammarUnit> {
        self.units.ready().and_then(|units| units.get(index))
    }

    pub fn opened(&self) -> Option<&CustomGrammarUnit> {
        let id = self.open_unit.as_deref()?;
        self.units.ready()?.iter().find(|u| u.id == id)
    }

    /// Rows in the list currently shown
    pub fn len(&self) -> usize {
        match self.opened() {
            Some(unit) => unit.lessons.len(),
            None => self.units.ready().map(Vec::len).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn next_level(level: LessonLevel) -> LessonLevel {
    let all = LessonLevel::all();
    let at = all.iter().position(|l| *l == level).unwrap_or_default();
    all[(at + 1) % all.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manual_entries() {
        let cards = parse_manual_entries("gate = cổng; lobby = sảnh\n\n passport=hộ chiếu").unwrap();
        let pairs: Vec<_> = cards
            .iter()
            .map(|c| (c.word.as_str(), c.meaning.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [("gate", "cổng"), ("lobby", "sảnh"), ("passport", "hộ chiếu")]
        );
        assert!(cards.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_parse_manual_entries_rejects_bad_lines() {
        assert!(parse_manual_entries("gate").is_err());
        assert!(parse_manual_entries("gate = ").is_err());
        assert!(parse_manual_entries("  ;  ").is_err());
    }

    #[test]
    fn test_parse_word_list() {
        assert_eq!(
            parse_word_list("habitat, species (n)\nrecycle,,"),
            vec!["habitat", "species (n)", "recycle"]
        );
    }

    #[test]
    fn test_level_cycles() {
        assert_eq!(next_level(LessonLevel::Beginner), LessonLevel::Intermediate);
        assert_eq!(next_level(LessonLevel::Advanced), LessonLevel::Beginner);
    }

    #[test]
    fn test_grammar_manager_lists_lessons_of_open_unit() {
        let unit = CustomGrammarUnit {
            id: "g1".into(),
            uid: "u1".into(),
            name: "Tenses".into(),
            description: String::new(),
            lessons: vec![],
            created_at: 0,
            updated_at: 0,
        };
        let mut manager = CustomGrammarManager {
            units: Loadable::Ready(vec![unit.clone(), CustomGrammarUnit { id: "g2".into(), ..unit }]),
            ..CustomGrammarManager::default()
        };
        assert_eq!(manager.len(), 2);
        manager.open_unit = Some("g1".into());
        assert_eq!(manager.len(), 0);
        assert_eq!(manager.opened().unwrap().name, "Tenses");
    }
}
