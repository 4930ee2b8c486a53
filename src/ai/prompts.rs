//! Prompt templates for AI generation
//!
//! Learners are Vietnamese speakers: explanations and feedback are asked
//! for in Vietnamese, exercise material in English.

use crate::ai::tutor::WritingMode;
use crate::core::content::{DifficultyLevel, ExamPracticeConfig, ExamQuestionType};
use crate::core::records::LessonLevel;

fn scope_constraint(scope: Option<&str>, what: &str) -> String {
    match scope.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => format!(
            "SCOPE: Limit the {what} strictly to the concepts described in this summary: \"{summary}\". \
             Do not include grammar points, vocabulary or structures outside this scope."
        ),
        None => String::new(),
    }
}

/// Dictionary entry for a single word
pub fn word_details_prompt(word: &str) -> String {
    format!(
        "Provide a detailed dictionary entry for \"{word}\": IPA pronunciation, every common part \
         of speech, Vietnamese meanings and English example sentences."
    )
}

/// Multiple-choice grammar questions
pub fn grammar_quiz_prompt(
    topic_title: &str,
    difficulty: DifficultyLevel,
    count: usize,
    sub_topics: &[String],
    scope: Option<&str>,
) -> String {
    let topic_context = if sub_topics.is_empty() {
        format!("the topic \"{topic_title}\"")
    } else {
        format!(
            "a MIXED practice covering these sub-topics: {}",
            sub_topics.join(", ")
        )
    };
    let scope = scope_constraint(scope, "questions");

    format!(
        r#"Act as an expert English teacher for Vietnamese students.
Create EXACTLY {count} multiple-choice questions for {topic_context}.

{scope}

Difficulty: {difficulty} ({band}).
- Very Easy (A1): the most basic form with obvious signal words ("yesterday", "every day", "now"). Short Subject + Verb + Object sentences. Distractors use clearly wrong tenses.
- Easy (A2): everyday usage in simple compound sentences ("and", "but"). Distractors are common mistakes such as a missing third-person "s" or a wrong irregular verb.
- Medium (B1): context clues instead of signal words, complex sentences with time clauses ("when", "while", "after"). Distractors are confusing pairs such as past simple vs present perfect.
- Hard (B2/C1): exceptions, formal structures, passive voice combined with tenses, idioms. Distractors differ only in nuance.

Vary the subjects (names, "the government", "scientists") and cover affirmative, negative and question forms.
Distractors must be plausible learner mistakes and real words.

For each question return:
- question: the English sentence with a blank (________)
- questionTranslation: a natural Vietnamese translation
- options: the choices, one of them correct
- correctAnswer: the correct option, copied exactly
- explanation: why the answer is right and the others wrong, in Vietnamese
- relatedTheory: the usage context, formatted "signal or context -> tense or structure""#,
        difficulty = difficulty.label(),
        band = difficulty.band(),
    )
}

/// Find-and-fix-the-error questions
pub fn error_correction_prompt(
    topic_title: &str,
    difficulty: DifficultyLevel,
    count: usize,
    scope: Option<&str>,
) -> String {
    let scope = scope_constraint(scope, "errors");
    format!(
        r#"Act as a strict English grammar teacher.
Create EXACTLY {count} error identification and correction questions for the topic "{topic_title}".
Difficulty: {difficulty}.
{scope}

Difficulty rules:
- Very Easy: the error is an obviously wrong verb form next to a clear time signal, in a short sentence.
- Easy: the error is in subject-verb agreement or basic tense usage.
- Medium: the error sits inside a complex sentence (time clause, conditional).
- Hard: the error is subtle (nuance, preposition, article, advanced structure).

Rules:
1. Each sentence contains EXACTLY ONE grammatical or logical error related to "{topic_title}".
2. errorTarget is the exact incorrect word or short phrase (at most 3 words) as it appears in the sentence.
3. correctForm is how it should be written.
4. translation is the Vietnamese meaning of the corrected sentence.
5. explanation (in Vietnamese) says why it is wrong; relatedTheory states the rule or signal words."#,
        difficulty = difficulty.label(),
    )
}

/// Questions about the difference in meaning between correct sentences
pub fn nuance_prompt(topic_title: &str, count: usize, scope: Option<&str>) -> String {
    let scope = scope_constraint(scope, "nuances");
    format!(
        r#"Create EXACTLY {count} nuance distinction questions for the English grammar topic "{topic_title}".
{scope}
The exercise tests understanding of reality and context rather than grammatical correctness.

1. Give 2-3 options that are all grammatically correct but imply different things (e.g. "stop to smoke" vs "stop smoking", "lived" vs "have lived").
2. Ask a thinking question (contextQuestion, in Vietnamese) about the reality of the situation, e.g. "Which speaker no longer lives in Tokyo?".
3. For EACH option explain its implication (nuance) in Vietnamese.
4. correctOptionIndex is the zero-based index of the option that answers the question.
5. explanation summarises the logic in Vietnamese; topic names the grammar point."#
    )
}

/// Assessment of a finished quiz; `results_json` is the list of answers
pub fn assessment_prompt(topic_title: &str, results_json: &str) -> String {
    format!(
        "Analyze these quiz results for the topic \"{topic_title}\": {results_json}. \
         Give a friendly but professional assessment in Vietnamese and name exactly which \
         sub-rules the learner missed."
    )
}

/// Check a free-form answer to a grammar writing exercise
pub fn writing_check_prompt(topic: &str, question: &str, answer: &str) -> String {
    format!(
        "Topic: {topic}. Question: \"{question}\". Learner answer: \"{answer}\".\n\
         Check whether the grammar is correct. Ignore capitalization and minor punctuation unless \
         the rule depends on them.\n\
         Return isCorrect and feedback (in Vietnamese, explaining why it is right or wrong)."
    )
}

/// One exam task in the national high-school exam format
pub fn exam_prompt(config: &ExamPracticeConfig) -> String {
    let length = match (config.question_type, config.reading_length) {
        (ExamQuestionType::Reading | ExamQuestionType::Cloze, Some(length)) => {
            format!("The passage must be about {} words long.\n", length.words())
        }
        _ => String::new(),
    };

    format!(
        r#"Create a high-quality English exam task in the Vietnamese national high-school exam (2025) format.
Topic: "{topic}".
Type: {kind}.
{length}
Guidelines:
- Reading/Cloze: the passage is coherent, logical and informative (B2/C1 academic vocabulary), not a children's story.
- Arrangement: sentences are long compound sentences with linking words (however, therefore, although) so the order is challenging but logical. Put the shuffled sentences in arrangementItems and their correct order in correctArrangement.
- Notice/Flyer: looks professional and follows the standard layout (heading, body, call to action).
- Questions require understanding, inference or vocabulary in context, not simple scanning.
Write every explanation in Vietnamese."#,
        topic = config.topic,
        kind = config.question_type.api_name(),
    )
}

/// An English paragraph for the learner to translate into Vietnamese
pub fn translation_task_prompt(
    topic: &str,
    vocabulary: &[String],
    difficulty: DifficultyLevel,
) -> String {
    let vocabulary = if vocabulary.is_empty() {
        String::new()
    } else {
        format!(
            "It must naturally use these words: {}.\n",
            vocabulary.join(", ")
        )
    };
    format!(
        "Write a short English paragraph (3-4 sentences) about \"{topic}\".\n\
         Difficulty: {difficulty}.\n\
         {vocabulary}\
         The text must be coherent, grammatically rich and sound natural.\n\
         Output ONLY the paragraph."
    )
}

/// Grade an English to Vietnamese translation
pub fn translation_evaluation_prompt(source_en: &str, attempt_vi: &str) -> String {
    format!(
        r#"Evaluate this translation.
Source (EN): "{source_en}"
Learner (VI): "{attempt_vi}"

1. Rate the accuracy from 1 to 10 (score).
2. List mistranslations or awkward phrasing in specificCorrections.
3. Give a correctedVersion that reads naturally in Vietnamese and keeps the meaning.
4. List what the learner did well in highlights.
Write generalComment in Vietnamese."#
    )
}

/// A writing exercise of the given kind
pub fn writing_task_prompt(mode: WritingMode, topic: &str, difficulty: DifficultyLevel) -> String {
    let instruction = match mode {
        WritingMode::Paragraph => {
            "Ask the learner to write a paragraph of 100-150 words. Provide a structure or guiding questions."
        }
        WritingMode::TranslateToEnglish => {
            "Provide a Vietnamese paragraph (3-4 sentences) for the learner to translate into English. Use interesting vocabulary."
        }
        WritingMode::FillBlanks => {
            "Write a short English paragraph with 5 blanks, each written as [___]. The blanks test vocabulary or grammar related to the topic."
        }
    };
    format!(
        "Generate a writing task. Mode: {mode}. Topic: {topic}. Difficulty: {difficulty}.\n\
         {instruction}\n\
         Output ONLY the task text.",
        mode = mode.api_name(),
    )
}

/// Grade a piece of writing
pub fn writing_evaluation_prompt(task: &str, work: &str) -> String {
    format!(
        "Act as an IELTS examiner and evaluate this writing.\n\
         Task: {task}\n\
         Learner's work: {work}\n\n\
         Analyze grammar, vocabulary and coherence. Give a score out of 10, a corrected text, \
         the grammar mistakes with corrections, vocabulary suggestions and a general comment in \
         Vietnamese."
    )
}

/// A Vietnamese sentence the learner translates using `word`
pub fn sentence_task_prompt(word: &str, meaning: &str) -> String {
    format!(
        "Create a context-rich, natural Vietnamese sentence that the learner must translate into \
         English using the word \"{word}\" (meaning: {meaning}).\n\
         1. The sentence implies a concrete situation (work, travel, feelings) so the meaning is clear.\n\
         2. Avoid bland sentences such as \"This is a {word}\".\n\
         3. Output ONLY the Vietnamese sentence."
    )
}

/// Flashcards for a list of headwords
pub fn vocab_module_prompt(words: &[String]) -> String {
    format!(
        r#"Create a complete vocabulary learning module for these English words: {}.

For EACH word provide:
1. word: the word with its part of speech in parentheses, e.g. "sustain (v)"
2. pronunciation: IPA transcription, e.g. "/səˈsteɪn/"
3. meaning: the Vietnamese meaning
4. examples: 2-3 English example sentences
5. synonyms: 2-3 synonyms with part of speech, Vietnamese meaning and one example each
6. antonyms: 1-2 antonyms with part of speech, Vietnamese meaning and one example each

Keep the information accurate and the examples natural and practical."#,
        words.join(", ")
    )
}

/// Reply of the in-app assistant
pub fn chat_reply_prompt(message: &str, topic: Option<&str>) -> String {
    let focus = topic
        .map(|t| format!("The learner is currently studying \"{t}\".\n"))
        .unwrap_or_default();
    format!(
        "You are an English-learning assistant called \"EnglishMaster Assistant\".\n\
         {focus}\
         The learner wrote: \"{message}\"\n\n\
         Answer in a friendly, helpful and short way (2-3 sentences at most). \
         Explain English questions in detail. Answer in Vietnamese unless the learner writes in English."
    )
}

/// A custom grammar lesson
pub fn grammar_lesson_prompt(topic: &str, level: LessonLevel) -> String {
    format!(
        "Create an English grammar lesson about \"{topic}\" at {level} level.\n\
         Return a title, a brief description, the content as a well-structured markdown \
         explanation, and 5 practical example sentences.",
        level = level.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::ReadingLength;

    #[test]
    fn test_quiz_prompt_mentions_count_and_band() {
        let prompt = grammar_quiz_prompt("Past Simple", DifficultyLevel::Hard, 7, &[], None);
        assert!(prompt.contains("EXACTLY 7"));
        assert!(prompt.contains("\"Past Simple\""));
        assert!(prompt.contains("Hard (B2/C1)"));
        assert!(!prompt.contains("SCOPE:"));
    }

    #[test]
    fn test_quiz_prompt_mixed_sub_topics_and_scope() {
        let subs = vec!["Present Simple".to_string(), "Past Simple".to_string()];
        let prompt = grammar_quiz_prompt(
            "Review",
            DifficultyLevel::Easy,
            10,
            &subs,
            Some("And, But, So"),
        );
        assert!(prompt.contains("MIXED practice covering these sub-topics: Present Simple, Past Simple"));
        assert!(prompt.contains("SCOPE: Limit the questions"));
        assert!(prompt.contains("\"And, But, So\""));
    }

    #[test]
    fn test_exam_prompt_reading_length() {
        let config = ExamPracticeConfig {
            question_type: ExamQuestionType::Reading,
            topic: "Environment".into(),
            reading_length: Some(ReadingLength::Long),
        };
        let prompt = exam_prompt(&config);
        assert!(prompt.contains("READING"));
        assert!(prompt.contains("350-400 words"));

        let arrangement = ExamPracticeConfig {
            question_type: ExamQuestionType::Arrangement,
            topic: "Education".into(),
            reading_length: Some(ReadingLength::Long),
        };
        assert!(!exam_prompt(&arrangement).contains("words long"));
    }

    #[test]
    fn test_writing_task_prompt_modes() {
        let prompt = writing_task_prompt(WritingMode::FillBlanks, "Travel", DifficultyLevel::Medium);
        assert!(prompt.contains("FILL_BLANKS"));
        assert!(prompt.contains("[___]"));
    }
}
