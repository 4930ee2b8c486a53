//! Vocabulary study: flashcards, word quizzes and sentence practice

use rand::seq::SliceRandom;
use rand::Rng;

use crate::ai::tutor::WritingCheck;
use crate::core::content::Flashcard;
use crate::tui::screens::{Loadable, TextInput};

/// Options offered per quiz question, the answer included
const QUIZ_OPTIONS: usize = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Flashcards
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FlashcardDeck {
    pub index: usize,
    pub flipped: bool,
}

impl FlashcardDeck {
    pub fn next(&mut self, total: usize) {
        if total > 0 {
            self.index = (self.index + 1) % total;
            self.flipped = false;
        }
    }

    pub fn previous(&mut self, total: usize) {
        if total > 0 {
            self.index = self.index.checked_sub(1).unwrap_or(total - 1);
            self.flipped = false;
        }
    }

    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    pub fn current<'a>(&self, words: &'a [Flashcard]) -> Option<&'a Flashcard> {
        words.get(self.index.min(words.len().saturating_sub(1)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Word quiz
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizDirection {
    /// Show the English word, pick the Vietnamese meaning
    EnToVi,
    /// Show the meaning, pick the English word
    ViToEn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub word: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: usize,
}

#[derive(Debug)]
pub struct WordQuiz {
    pub direction: QuizDirection,
    pub questions: Vec<QuizQuestion>,
    pub current: usize,
    pub cursor: usize,
    /// Option picked for the current question, once answered
    pub chosen: Option<usize>,
    pub score: usize,
}

impl WordQuiz {
    /// One question per card, in random order, with distractors drawn from
    /// the other cards
    pub fn build<R: Rng + ?Sized>(words: &[Flashcard], direction: QuizDirection, rng: &mut R) -> Self {
        let side = |card: &Flashcard| match direction {
            QuizDirection::EnToVi => card.meaning.clone(),
            QuizDirection::ViToEn => card.headword().to_string(),
        };

        let mut questions: Vec<QuizQuestion> = words
            .iter()
            .map(|card| {
                let answer_text = side(card);
                let mut pool: Vec<String> = words
                    .iter()
                    .filter(|other| other.id != card.id)
                    .map(side)
                    .filter(|text| *text != answer_text)
                    .collect();
                pool.sort();
                pool.dedup();
                pool.shuffle(rng);
                pool.truncate(QUIZ_OPTIONS - 1);

                let mut options = pool;
                options.push(answer_text.clone());
                options.shuffle(rng);
                let answer = options
                    .iter()
                    .position(|o| *o == answer_text)
                    .unwrap_or_default();

                QuizQuestion {
                    word: card.headword().to_string(),
                    prompt: match direction {
                        QuizDirection::EnToVi => card.word.clone(),
                        QuizDirection::ViToEn => card.meaning.clone(),
                    },
                    options,
                    answer,
                }
            })
            .collect();
        questions.shuffle(rng);

        Self {
            direction,
            questions,
            current: 0,
            cursor: 0,
            chosen: None,
            score: 0,
        }
    }

    pub fn question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current)
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }

    pub fn move_cursor(&mut self, down: bool) {
        let Some(len) = self.question().map(|q| q.options.len()) else {
            return;
        };
        if len == 0 || self.chosen.is_some() {
            return;
        }
        self.cursor = if down {
            (self.cursor + 1) % len
        } else {
            self.cursor.checked_sub(1).unwrap_or(len - 1)
        };
    }

    /// Lock in an option for the current question
    pub fn choose(&mut self, option: usize) {
        if self.chosen.is_some() {
            return;
        }
        let Some(question) = self.question() else {
            return;
        };
        if option >= question.options.len() {
            return;
        }
        if option == question.answer {
            self.score += 1;
        }
        self.cursor = option;
        self.chosen = Some(option);
    }

    /// Move on once the current question is answered
    pub fn advance(&mut self) {
        if self.chosen.is_some() {
            self.current += 1;
            self.cursor = 0;
            self.chosen = None;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sentence practice
// ─────────────────────────────────────────────────────────────────────────────

/// Write a sentence with each word in turn; the tutor sets the task and checks it
#[derive(Debug, Default)]
pub struct SentencePractice {
    pub index: usize,
    pub task: Loadable<String>,
    pub input: TextInput,
    pub check: Loadable<WritingCheck>,
}

impl SentencePractice {
    pub fn next_word(&mut self, total: usize) {
        if total > 0 {
            self.index = (self.index + 1) % total;
        }
        self.task = Loadable::Idle;
        self.check = Loadable::Idle;
        self.input.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn card(id: u64, word: &str, meaning: &str) -> Flashcard {
        Flashcard {
            id,
            word: word.into(),
            pronunciation: String::new(),
            meaning: meaning.into(),
            synonyms: vec![],
            antonyms: vec![],
            examples: vec![],
        }
    }

    fn words() -> Vec<Flashcard> {
        vec![
            card(1, "sustain (v)", "duy trì"),
            card(2, "habitat (n)", "môi trường sống"),
            card(3, "species (n)", "loài"),
            card(4, "emission (n)", "khí thải"),
            card(5, "recycle (v)", "tái chế"),
        ]
    }

    #[test]
    fn test_quiz_has_one_question_per_word_with_answer_among_options() {
        let mut rng = StdRng::seed_from_u64(7);
        let quiz = WordQuiz::build(&words(), QuizDirection::EnToVi, &mut rng);
        assert_eq!(quiz.questions.len(), 5);
        for q in &quiz.questions {
            assert_eq!(q.options.len(), QUIZ_OPTIONS);
            let card = words().into_iter().find(|c| c.word == q.prompt).unwrap();
            assert_eq!(q.options[q.answer], card.meaning);
        }
    }

    #[test]
    fn test_vi_to_en_asks_for_headword() {
        let mut rng = StdRng::seed_from_u64(1);
        let quiz = WordQuiz::build(&words()[..1], QuizDirection::ViToEn, &mut rng);
        let q = &quiz.questions[0];
        assert_eq!(q.prompt, "duy trì");
        assert_eq!(q.options, vec!["sustain".to_string()]);
    }

    #[test]
    fn test_scoring_and_advance() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut quiz = WordQuiz::build(&words(), QuizDirection::EnToVi, &mut rng);
        let answer = quiz.question().unwrap().answer;

        quiz.advance();
        assert_eq!(quiz.current, 0, "cannot skip an unanswered question");

        quiz.choose(answer);
        quiz.choose((answer + 1) % QUIZ_OPTIONS);
        assert_eq!(quiz.score, 1, "the first choice is final");

        quiz.advance();
        assert_eq!(quiz.current, 1);
        assert!(quiz.chosen.is_none());
    }

    #[test]
    fn test_deck_wraps_and_unflips() {
        let mut deck = FlashcardDeck::default();
        deck.flip();
        deck.previous(3);
        assert_eq!(deck.index, 2);
        assert!(!deck.flipped);
        deck.next(3);
        assert_eq!(deck.index, 0);
    }
}
