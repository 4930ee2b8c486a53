//! Typed AI tutor operations
//!
//! Each operation builds a prompt, asks the [`TextGenerator`] for either
//! free text or schema-constrained JSON, and validates the answer before it
//! reaches a screen. Anything that does not fit is reported as
//! [`AppError::MalformedAiOutput`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ai::gemini::{extract_json_bool, extract_json_field, parse_json};
use crate::ai::{prompts, schema, GeminiClient, GenerateRequest, TextGenerator};
use crate::core::content::{DifficultyLevel, ExamPracticeConfig, Flashcard, RelatedWord};
use crate::core::records::{now_millis, LessonLevel};
use crate::error::{AppError, Result};

const LESSON_MAX_TOKENS: u32 = 8192;

// ─────────────────────────────────────────────────────────────────────────────
// Result types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordMeaning {
    pub meaning: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDefinition {
    pub part_of_speech: String,
    #[serde(default)]
    pub common_meanings: String,
    #[serde(default)]
    pub meanings: Vec<WordMeaning>,
}

/// Dictionary entry shown in the word detail overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDetails {
    pub word: String,
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default)]
    pub definitions: Vec<WordDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarQuestion {
    pub question: String,
    #[serde(default)]
    pub question_translation: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub related_theory: String,
}

impl GrammarQuestion {
    pub fn is_correct(&self, answer: &str) -> bool {
        answer.trim() == self.correct_answer.trim()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCorrectionQuestion {
    pub sentence: String,
    pub error_target: String,
    pub correct_form: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub related_theory: String,
}

impl ErrorCorrectionQuestion {
    /// Whether `answer` is the corrected form, ignoring case and outer spaces
    pub fn is_fixed_by(&self, answer: &str) -> bool {
        answer.trim().eq_ignore_ascii_case(self.correct_form.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuanceOption {
    pub text: String,
    pub nuance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NuanceQuestion {
    pub context_question: String,
    pub options: Vec<NuanceOption>,
    pub correct_option_index: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub topic: String,
}

/// One answered question, sent back for an assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarAssessment {
    pub general_comment: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub advice: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingCheck {
    pub is_correct: bool,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamSubQuestion {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub question_type: String,
    pub context: String,
    #[serde(default)]
    pub sub_questions: Vec<ExamSubQuestion>,
    #[serde(default)]
    pub arrangement_items: Vec<String>,
    #[serde(default)]
    pub correct_arrangement: Vec<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationCorrection {
    pub original_phrase: String,
    pub corrected_phrase: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationFeedback {
    pub score: f32,
    #[serde(default)]
    pub general_comment: String,
    #[serde(default)]
    pub specific_corrections: Vec<TranslationCorrection>,
    #[serde(default)]
    pub corrected_version: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WritingMistake {
    pub original: String,
    pub correction: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingFeedback {
    pub score: f32,
    #[serde(default)]
    pub corrected_text: String,
    #[serde(default)]
    pub grammar_mistakes: Vec<WritingMistake>,
    #[serde(default)]
    pub vocabulary_suggestions: Vec<String>,
    #[serde(default)]
    pub general_comment: String,
}

/// A grammar lesson written by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLesson {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Kind of writing exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritingMode {
    #[default]
    Paragraph,
    TranslateToEnglish,
    FillBlanks,
}

impl WritingMode {
    pub fn all() -> &'static [WritingMode] {
        &[
            WritingMode::Paragraph,
            WritingMode::TranslateToEnglish,
            WritingMode::FillBlanks,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            WritingMode::Paragraph => "Write a paragraph",
            WritingMode::TranslateToEnglish => "Translate into English",
            WritingMode::FillBlanks => "Fill in the blanks",
        }
    }

    pub fn api_name(&self) -> &'static str {
        match self {
            WritingMode::Paragraph => "PARAGRAPH",
            WritingMode::TranslateToEnglish => "TRANSLATE_TO_EN",
            WritingMode::FillBlanks => "FILL_BLANKS",
        }
    }
}

/// Flashcard as produced by the model, before ids are assigned
#[derive(Debug, Deserialize)]
struct FlashcardDraft {
    #[serde(default)]
    word: String,
    #[serde(default)]
    pronunciation: String,
    #[serde(default)]
    meaning: String,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    synonyms: Vec<RelatedWord>,
    #[serde(default)]
    antonyms: Vec<RelatedWord>,
}

/// Strip glosses such as `return (trả lại)` down to `return` and drop blanks
pub fn clean_word_list(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.split('(').next().unwrap_or_default().trim().to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tutor
// ─────────────────────────────────────────────────────────────────────────────

/// AI tutor backed by any text generator
#[derive(Clone)]
pub struct Tutor {
    generator: Arc<dyn TextGenerator>,
}

impl Tutor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Tutor backed by Gemini with the stored key and configured model
    pub fn gemini() -> Result<Self> {
        Ok(Self::new(Arc::new(GeminiClient::new()?)))
    }

    async fn ask_json<T: serde::de::DeserializeOwned>(
        &self,
        prompt: String,
        schema: serde_json::Value,
    ) -> Result<T> {
        let answer = self
            .generator
            .generate(GenerateRequest::json(prompt, schema))
            .await?;
        parse_json(&answer)
    }

    async fn ask_text(&self, prompt: String) -> Result<String> {
        let answer = self.generator.generate(GenerateRequest::text(prompt)).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AppError::MalformedAiOutput("empty answer".into()));
        }
        Ok(answer.to_string())
    }

    pub async fn word_details(&self, word: &str) -> Result<WordDetails> {
        self.ask_json(prompts::word_details_prompt(word), schema::word_details())
            .await
    }

    /// Multiple-choice questions; malformed items are dropped
    pub async fn grammar_quiz(
        &self,
        topic_title: &str,
        difficulty: DifficultyLevel,
        count: usize,
        sub_topics: &[String],
        scope: Option<&str>,
    ) -> Result<Vec<GrammarQuestion>> {
        let prompt =
            prompts::grammar_quiz_prompt(topic_title, difficulty, count, sub_topics, scope);
        let questions: Vec<GrammarQuestion> = self.ask_json(prompt, schema::grammar_quiz()).await?;
        let questions: Vec<_> = questions
            .into_iter()
            .filter(|q| q.options.len() >= 2 && q.options.iter().any(|o| q.is_correct(o)))
            .take(count)
            .collect();
        non_empty(questions, "quiz")
    }

    pub async fn error_correction_quiz(
        &self,
        topic_title: &str,
        difficulty: DifficultyLevel,
        count: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ErrorCorrectionQuestion>> {
        let prompt = prompts::error_correction_prompt(topic_title, difficulty, count, scope);
        let questions: Vec<ErrorCorrectionQuestion> = self
            .ask_json(prompt, schema::error_correction_quiz())
            .await?;
        let questions: Vec<_> = questions
            .into_iter()
            .filter(|q| !q.error_target.trim().is_empty() && q.sentence.contains(q.error_target.trim()))
            .take(count)
            .collect();
        non_empty(questions, "error correction quiz")
    }

    pub async fn nuance_quiz(
        &self,
        topic_title: &str,
        count: usize,
        scope: Option<&str>,
    ) -> Result<Vec<NuanceQuestion>> {
        let prompt = prompts::nuance_prompt(topic_title, count, scope);
        let questions: Vec<NuanceQuestion> = self.ask_json(prompt, schema::nuance_quiz()).await?;
        let questions: Vec<_> = questions
            .into_iter()
            .filter(|q| q.correct_option_index < q.options.len())
            .take(count)
            .collect();
        non_empty(questions, "nuance quiz")
    }

    pub async fn evaluate_quiz_performance(
        &self,
        topic_title: &str,
        results: &[QuizResult],
    ) -> Result<GrammarAssessment> {
        let results_json = serde_json::to_string(results)?;
        self.ask_json(
            prompts::assessment_prompt(topic_title, &results_json),
            schema::assessment(),
        )
        .await
    }

    /// Check one written answer; salvages the verdict from slightly broken JSON
    pub async fn check_grammar_writing(
        &self,
        topic: &str,
        question: &str,
        answer: &str,
    ) -> Result<WritingCheck> {
        let raw = self
            .generator
            .generate(GenerateRequest::json(
                prompts::writing_check_prompt(topic, question, answer),
                schema::writing_check(),
            ))
            .await?;

        match parse_json::<WritingCheck>(&raw) {
            Ok(check) => Ok(check),
            Err(e) => match (
                extract_json_bool(&raw, "isCorrect"),
                extract_json_field(&raw, "feedback"),
            ) {
                (Some(is_correct), feedback) => Ok(WritingCheck {
                    is_correct,
                    feedback: feedback.unwrap_or_default(),
                }),
                _ => Err(e),
            },
        }
    }

    pub async fn exam_practice(&self, config: &ExamPracticeConfig) -> Result<ExamQuestion> {
        let question: ExamQuestion = self
            .ask_json(prompts::exam_prompt(config), schema::exam_question())
            .await?;
        if question.context.trim().is_empty() {
            return Err(AppError::MalformedAiOutput("exam task has no text".into()));
        }
        Ok(question)
    }

    pub async fn translation_task(
        &self,
        topic: &str,
        vocabulary: &[String],
        difficulty: DifficultyLevel,
    ) -> Result<String> {
        self.ask_text(prompts::translation_task_prompt(topic, vocabulary, difficulty))
            .await
    }

    pub async fn evaluate_translation(
        &self,
        source_en: &str,
        attempt_vi: &str,
    ) -> Result<TranslationFeedback> {
        self.ask_json(
            prompts::translation_evaluation_prompt(source_en, attempt_vi),
            schema::translation_feedback(),
        )
        .await
    }

    pub async fn writing_task(
        &self,
        mode: WritingMode,
        topic: &str,
        difficulty: DifficultyLevel,
    ) -> Result<String> {
        self.ask_text(prompts::writing_task_prompt(mode, topic, difficulty))
            .await
    }

    pub async fn evaluate_writing(&self, task: &str, work: &str) -> Result<WritingFeedback> {
        self.ask_json(
            prompts::writing_evaluation_prompt(task, work),
            schema::writing_feedback(),
        )
        .await
    }

    /// Vietnamese sentence to translate with the card's word
    pub async fn sentence_task(&self, card: &Flashcard) -> Result<String> {
        self.ask_text(prompts::sentence_task_prompt(card.headword(), &card.meaning))
            .await
    }

    /// Build flashcards for `words`, assigning fresh ids
    pub async fn vocab_module_from_words(&self, words: &[String]) -> Result<Vec<Flashcard>> {
        let cleaned = clean_word_list(words);
        if cleaned.is_empty() {
            return Err(AppError::InvalidInput("No valid words to generate".into()));
        }

        let drafts: Vec<FlashcardDraft> = self
            .ask_json(prompts::vocab_module_prompt(&cleaned), schema::vocab_module())
            .await?;
        if drafts.is_empty() {
            return Err(AppError::MalformedAiOutput("no words were generated".into()));
        }

        let base = now_millis().max(0) as u64;
        Ok(drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| Flashcard {
                id: base + index as u64,
                word: draft.word,
                pronunciation: draft.pronunciation,
                meaning: draft.meaning,
                synonyms: draft.synonyms,
                antonyms: draft.antonyms,
                examples: draft.examples,
            })
            .collect())
    }

    pub async fn chat_reply(&self, message: &str, topic: Option<&str>) -> Result<String> {
        self.ask_text(prompts::chat_reply_prompt(message, topic))
            .await
    }

    /// Full lesson; these run longer than the other answers
    pub async fn grammar_lesson(&self, topic: &str, level: LessonLevel) -> Result<GeneratedLesson> {
        let request = GenerateRequest::json(
            prompts::grammar_lesson_prompt(topic, level),
            schema::grammar_lesson(),
        )
        .with_max_tokens(LESSON_MAX_TOKENS);
        let answer = self.generator.generate(request).await?;
        parse_json(&answer)
    }
}

fn non_empty<T>(items: Vec<T>, what: &str) -> Result<Vec<T>> {
    if items.is_empty() {
        Err(AppError::MalformedAiOutput(format!("the {what} had no usable questions")))
    } else {
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockTextGenerator;

    fn tutor_answering(answer: &'static str) -> Tutor {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .times(1)
            .returning(move |_| Ok(answer.to_string()));
        Tutor::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn test_word_details_requests_json_schema() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|req| req.schema.is_some() && req.prompt.contains("\"resilient\""))
            .times(1)
            .returning(|_| {
                Ok(r#"{"word":"resilient","pronunciation":"/rɪˈzɪliənt/","definitions":[{"partOfSpeech":"adj","commonMeanings":"kiên cường","meanings":[{"meaning":"kiên cường","examples":["She is resilient."]}]}]}"#.into())
            });

        let details = Tutor::new(Arc::new(mock))
            .word_details("resilient")
            .await
            .unwrap();
        assert_eq!(details.definitions[0].part_of_speech, "adj");
        assert_eq!(details.definitions[0].meanings[0].examples.len(), 1);
    }

    #[tokio::test]
    async fn test_grammar_quiz_drops_unanswerable_questions() {
        let tutor = tutor_answering(
            r#"```json
[
  {"question":"She ____ to school.","questionTranslation":"Cô ấy đi học.","options":["go","goes"],"correctAnswer":"goes","explanation":"","relatedTheory":""},
  {"question":"Broken","questionTranslation":"","options":["a","b"],"correctAnswer":"c","explanation":"","relatedTheory":""}
]
```"#,
        );
        let quiz = tutor
            .grammar_quiz("Present Simple", DifficultyLevel::Easy, 10, &[], None)
            .await
            .unwrap();
        assert_eq!(quiz.len(), 1);
        assert!(quiz[0].is_correct(" goes "));
    }

    #[tokio::test]
    async fn test_grammar_quiz_with_nothing_usable_is_malformed() {
        let tutor = tutor_answering("[]");
        let err = tutor
            .grammar_quiz("Present Simple", DifficultyLevel::Easy, 10, &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedAiOutput(_)));
    }

    #[tokio::test]
    async fn test_nuance_quiz_checks_index() {
        let tutor = tutor_answering(
            r#"[{"contextQuestion":"Ai còn ở Tokyo?","options":[{"text":"I lived","nuance":"ended"},{"text":"I have lived","nuance":"ongoing"}],"correctOptionIndex":1,"explanation":"","topic":"Tenses"},
                {"contextQuestion":"bad","options":[],"correctOptionIndex":3,"explanation":"","topic":""}]"#,
        );
        let quiz = tutor.nuance_quiz("Tenses", 5, None).await.unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].options[quiz[0].correct_option_index].text, "I have lived");
    }

    #[tokio::test]
    async fn test_error_correction_target_must_be_in_sentence() {
        let tutor = tutor_answering(
            r#"[{"sentence":"He go to work yesterday.","errorTarget":"go","correctForm":"went","translation":"","explanation":"","relatedTheory":""},
                {"sentence":"Fine sentence.","errorTarget":"missing","correctForm":"x","translation":"","explanation":"","relatedTheory":""}]"#,
        );
        let quiz = tutor
            .error_correction_quiz("Past Simple", DifficultyLevel::VeryEasy, 10, None)
            .await
            .unwrap();
        assert_eq!(quiz.len(), 1);
        assert!(quiz[0].is_fixed_by("Went"));
    }

    #[tokio::test]
    async fn test_check_grammar_writing_salvages_broken_json() {
        let tutor = tutor_answering(r#"{"isCorrect": true, "feedback": "Đúng rồi"#);
        let check = tutor
            .check_grammar_writing("Past Simple", "Yesterday I ____ (go)", "went")
            .await
            .unwrap();
        assert!(check.is_correct);
        assert_eq!(check.feedback, "Đúng rồi");
    }

    #[tokio::test]
    async fn test_vocab_module_cleans_input_and_assigns_ids() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|req| req.prompt.contains("return, sustain") && !req.prompt.contains("trả lại"))
            .times(1)
            .returning(|_| {
                Ok(r#"[{"word":"return (v)","pronunciation":"/rɪˈtɜːn/","meaning":"trả lại","examples":["Return it."]},
                       {"word":"sustain (v)","pronunciation":"/səˈsteɪn/","meaning":"duy trì","examples":[]}]"#.into())
            });

        let words = vec![
            "return (trả lại)".to_string(),
            "  ".to_string(),
            "sustain".to_string(),
        ];
        let cards = Tutor::new(Arc::new(mock))
            .vocab_module_from_words(&words)
            .await
            .unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].id, cards[0].id + 1);
        assert!(cards[0].synonyms.is_empty());
    }

    #[tokio::test]
    async fn test_vocab_module_rejects_empty_input_without_calling_model() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate().times(0);
        let err = Tutor::new(Arc::new(mock))
            .vocab_module_from_words(&["(only a gloss)".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_vocab_module_empty_answer_is_malformed() {
        let tutor = tutor_answering("[]");
        let err = tutor
            .vocab_module_from_words(&["apple".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedAiOutput(_)));
    }

    #[tokio::test]
    async fn test_text_tasks_are_plain_requests() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|req| req.schema.is_none())
            .times(1)
            .returning(|_| Ok("  Tôi đã trả lại cuốn sách.  ".into()));
        let card = Flashcard {
            id: 1,
            word: "return (v)".into(),
            pronunciation: String::new(),
            meaning: "trả lại".into(),
            synonyms: vec![],
            antonyms: vec![],
            examples: vec![],
        };
        let task = Tutor::new(Arc::new(mock)).sentence_task(&card).await.unwrap();
        assert_eq!(task, "Tôi đã trả lại cuốn sách.");
    }

    #[tokio::test]
    async fn test_blank_text_answer_is_malformed() {
        let tutor = tutor_answering("   ");
        let err = tutor.chat_reply("hello", None).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedAiOutput(_)));
    }

    #[tokio::test]
    async fn test_generator_errors_propagate() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .returning(|_| Err(AppError::GeminiApi("quota".into())));
        let err = Tutor::new(Arc::new(mock))
            .evaluate_writing("task", "work")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_grammar_lesson_gets_a_larger_budget() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|request| request.max_tokens == LESSON_MAX_TOKENS && request.schema.is_some())
            .times(1)
            .returning(|_| {
                Ok(r#"{"title":"Articles","description":"a, an, the","content":"Use **a** before consonants.","examples":["a cat"]}"#.to_string())
            });
        let lesson = Tutor::new(Arc::new(mock))
            .grammar_lesson("Articles", LessonLevel::Beginner)
            .await
            .unwrap();
        assert_eq!(lesson.title, "Articles");
        assert_eq!(lesson.examples, vec!["a cat"]);
    }

    #[test]
    fn test_clean_word_list() {
        let words = vec!["a (x)".to_string(), "b".to_string(), "(c)".to_string()];
        assert_eq!(clean_word_list(&words), vec!["a", "b"]);
    }
}
