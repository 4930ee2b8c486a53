//! Grammar practice, exam drills, translation and writing

use crate::ai::tutor::{
    ErrorCorrectionQuestion, ExamQuestion, GrammarAssessment, GrammarQuestion, NuanceQuestion,
    QuizResult, TranslationFeedback, WritingFeedback, WritingMode,
};
use crate::core::content::{
    DifficultyLevel, ExamPracticeConfig, ExamQuestionType, PracticeType, ReadingLength,
};
use crate::tui::screens::{Loadable, TextInput};

/// Question counts offered on the settings screen
pub const QUESTION_COUNTS: [usize; 4] = [5, 10, 15, 20];

/// Step `current` through `len` choices
fn cycle(current: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        return 0;
    }
    if forward {
        (current + 1) % len
    } else {
        current.checked_sub(1).unwrap_or(len - 1)
    }
}

fn position_of<T: PartialEq>(all: &[T], value: &T) -> usize {
    all.iter().position(|v| v == value).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Practice settings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Difficulty,
    Count,
    Kind,
    Start,
}

const SETTINGS_FIELDS: [SettingsField; 4] = [
    SettingsField::Difficulty,
    SettingsField::Count,
    SettingsField::Kind,
    SettingsField::Start,
];

/// Difficulty, question count and exercise kind before a practice run
#[derive(Debug, Clone)]
pub struct PracticeSettingsForm {
    focus: usize,
    pub difficulty: DifficultyLevel,
    pub count: usize,
    pub practice_type: PracticeType,
}

impl PracticeSettingsForm {
    /// Start from the last values the learner used
    pub fn new(difficulty: DifficultyLevel, count: usize, practice_type: PracticeType) -> Self {
        Self {
            focus: 0,
            difficulty,
            count,
            practice_type,
        }
    }

    pub fn focused(&self) -> SettingsField {
        SETTINGS_FIELDS[self.focus]
    }

    pub fn move_focus(&mut self, down: bool) {
        self.focus = cycle(self.focus, SETTINGS_FIELDS.len(), down);
    }

    /// Change the focused value
    pub fn change(&mut self, forward: bool) {
        match self.focused() {
            SettingsField::Difficulty => {
                let all = DifficultyLevel::all();
                self.difficulty = all[cycle(position_of(all, &self.difficulty), all.len(), forward)];
            }
            SettingsField::Count => {
                let at = QUESTION_COUNTS
                    .iter()
                    .position(|c| *c == self.count)
                    .unwrap_or(1);
                self.count = QUESTION_COUNTS[cycle(at, QUESTION_COUNTS.len(), forward)];
            }
            SettingsField::Kind => {
                let all = PracticeType::all();
                self.practice_type =
                    all[cycle(position_of(all, &self.practice_type), all.len(), forward)];
            }
            SettingsField::Start => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grammar practice run
// ─────────────────────────────────────────────────────────────────────────────

/// Questions of one practice run, by exercise kind
#[derive(Debug, Clone, PartialEq)]
pub enum PracticeSet {
    MultipleChoice(Vec<GrammarQuestion>),
    ErrorCorrection(Vec<ErrorCorrectionQuestion>),
    Nuance(Vec<NuanceQuestion>),
}

impl PracticeSet {
    pub fn len(&self) -> usize {
        match self {
            PracticeSet::MultipleChoice(q) => q.len(),
            PracticeSet::ErrorCorrection(q) => q.len(),
            PracticeSet::Nuance(q) => q.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Options to pick from at `index`; empty for typed answers
    pub fn options(&self, index: usize) -> Vec<String> {
        match self {
            PracticeSet::MultipleChoice(q) => {
                q.get(index).map(|q| q.options.clone()).unwrap_or_default()
            }
            PracticeSet::Nuance(q) => q
                .get(index)
                .map(|q| q.options.iter().map(|o| o.text.clone()).collect())
                .unwrap_or_default(),
            PracticeSet::ErrorCorrection(_) => Vec::new(),
        }
    }

    pub fn prompt(&self, index: usize) -> String {
        match self {
            PracticeSet::MultipleChoice(q) => q.get(index).map(|q| q.question.clone()),
            PracticeSet::ErrorCorrection(q) => q.get(index).map(|q| q.sentence.clone()),
            PracticeSet::Nuance(q) => q.get(index).map(|q| q.context_question.clone()),
        }
        .unwrap_or_default()
    }

    pub fn explanation(&self, index: usize) -> String {
        match self {
            PracticeSet::MultipleChoice(q) => q.get(index).map(|q| q.explanation.clone()),
            PracticeSet::ErrorCorrection(q) => q.get(index).map(|q| q.explanation.clone()),
            PracticeSet::Nuance(q) => q.get(index).map(|q| q.explanation.clone()),
        }
        .unwrap_or_default()
    }

    /// Grade an answer to question `index`
    pub fn grade(&self, index: usize, answer: &str) -> Option<QuizResult> {
        let (question, correct_answer, is_correct) = match self {
            PracticeSet::MultipleChoice(q) => {
                let q = q.get(index)?;
                (q.question.clone(), q.correct_answer.clone(), q.is_correct(answer))
            }
            PracticeSet::ErrorCorrection(q) => {
                let q = q.get(index)?;
                (
                    format!("{} (fix: \"{}\")", q.sentence, q.error_target),
                    q.correct_form.clone(),
                    q.is_fixed_by(answer),
                )
            }
            PracticeSet::Nuance(q) => {
                let q = q.get(index)?;
                let correct = q.options.get(q.correct_option_index)?.text.clone();
                let is_correct = answer.trim() == correct.trim();
                (q.context_question.clone(), correct, is_correct)
            }
        };
        Some(QuizResult {
            question,
            user_answer: answer.trim().to_string(),
            correct_answer,
            is_correct,
        })
    }
}

#[derive(Debug, Default)]
pub struct GrammarPractice {
    pub questions: Loadable<PracticeSet>,
    pub current: usize,
    pub cursor: usize,
    pub input: TextInput,
    /// Result of the current question once answered
    pub answered: Option<QuizResult>,
    pub results: Vec<QuizResult>,
    pub assessment: Loadable<GrammarAssessment>,
}

impl GrammarPractice {
    pub fn total(&self) -> usize {
        self.questions.ready().map(PracticeSet::len).unwrap_or(0)
    }

    pub fn is_finished(&self) -> bool {
        self.questions.ready().is_some() && self.current >= self.total()
    }

    pub fn score(&self) -> usize {
        self.results.iter().filter(|r| r.is_correct).count()
    }

    pub fn move_cursor(&mut self, down: bool) {
        if self.answered.is_some() {
            return;
        }
        let len = self
            .questions
            .ready()
            .map(|set| set.options(self.current).len())
            .unwrap_or(0);
        self.cursor = cycle(self.cursor, len, down);
    }

    /// Answer the current question with the highlighted option or the typed text
    pub fn submit(&mut self) -> Option<&QuizResult> {
        if self.answered.is_some() {
            return self.answered.as_ref();
        }
        let set = self.questions.ready()?;
        let answer = match set {
            PracticeSet::ErrorCorrection(_) => {
                if self.input.is_empty() {
                    return None;
                }
                self.input.value().to_string()
            }
            _ => set.options(self.current).get(self.cursor)?.clone(),
        };
        let result = set.grade(self.current, &answer)?;
        self.results.push(result.clone());
        self.answered = Some(result);
        self.answered.as_ref()
    }

    pub fn advance(&mut self) {
        if self.answered.take().is_some() {
            self.current += 1;
            self.cursor = 0;
            self.input.clear();
        }
    }

    /// Whether answers are typed rather than picked
    pub fn expects_text(&self) -> bool {
        matches!(self.questions, Loadable::Ready(PracticeSet::ErrorCorrection(_)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tutor chat
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub from_tutor: bool,
    pub text: String,
}

/// Questions about one grammar topic, answered by the tutor
#[derive(Debug, Default)]
pub struct TutorChat {
    pub lines: Vec<ChatLine>,
    pub input: TextInput,
    pub waiting: bool,
    pub scroll: usize,
}

impl TutorChat {
    /// Queue the typed question; `None` when there is nothing to send
    pub fn ask(&mut self) -> Option<String> {
        if self.waiting || self.input.is_empty() {
            return None;
        }
        let question = self.input.take().trim().to_string();
        self.lines.push(ChatLine {
            from_tutor: false,
            text: question.clone(),
        });
        self.waiting = true;
        Some(question)
    }

    pub fn answer(&mut self, text: String) {
        self.waiting = false;
        self.lines.push(ChatLine {
            from_tutor: true,
            text,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Exam preparation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamField {
    Kind,
    Topic,
    Length,
    Start,
}

const EXAM_FIELDS: [ExamField; 4] = [
    ExamField::Kind,
    ExamField::Topic,
    ExamField::Length,
    ExamField::Start,
];

const READING_LENGTHS: [ReadingLength; 3] = [
    ReadingLength::Short,
    ReadingLength::Medium,
    ReadingLength::Long,
];

#[derive(Debug, Clone)]
pub struct ExamForm {
    focus: usize,
    pub question_type: ExamQuestionType,
    pub topic: usize,
    pub reading_length: ReadingLength,
}

impl Default for ExamForm {
    fn default() -> Self {
        Self {
            focus: 0,
            question_type: ExamQuestionType::Reading,
            topic: 0,
            reading_length: ReadingLength::Medium,
        }
    }
}

impl ExamForm {
    pub fn focused(&self) -> ExamField {
        EXAM_FIELDS[self.focus]
    }

    /// Reading length only matters for passages
    pub fn uses_length(&self) -> bool {
        matches!(
            self.question_type,
            ExamQuestionType::Reading | ExamQuestionType::Cloze
        )
    }

    pub fn move_focus(&mut self, down: bool) {
        self.focus = cycle(self.focus, EXAM_FIELDS.len(), down);
        if self.focused() == ExamField::Length && !self.uses_length() {
            self.focus = cycle(self.focus, EXAM_FIELDS.len(), down);
        }
    }

    pub fn change(&mut self, forward: bool, topic_count: usize) {
        match self.focused() {
            ExamField::Kind => {
                let all = ExamQuestionType::all();
                self.question_type =
                    all[cycle(position_of(all, &self.question_type), all.len(), forward)];
            }
            ExamField::Topic => self.topic = cycle(self.topic, topic_count, forward),
            ExamField::Length => {
                self.reading_length = READING_LENGTHS[cycle(
                    position_of(&READING_LENGTHS, &self.reading_length),
                    READING_LENGTHS.len(),
                    forward,
                )];
            }
            ExamField::Start => {}
        }
    }

    pub fn config(&self, topics: &[String]) -> ExamPracticeConfig {
        ExamPracticeConfig {
            question_type: self.question_type,
            topic: topics.get(self.topic).cloned().unwrap_or_default(),
            reading_length: self.uses_length().then_some(self.reading_length),
        }
    }
}

#[derive(Debug, Default)]
pub struct ExamSession {
    pub question: Loadable<ExamQuestion>,
    /// Picked option per sub-question
    pub answers: Vec<Option<usize>>,
    pub sub: usize,
    pub cursor: usize,
    pub revealed: bool,
    pub scroll: usize,
}

impl ExamSession {
    pub fn load(&mut self, question: ExamQuestion) {
        self.answers = vec![None; question.sub_questions.len()];
        self.sub = 0;
        self.cursor = 0;
        self.revealed = false;
        self.scroll = 0;
        self.question = Loadable::Ready(question);
    }

    fn option_count(&self) -> usize {
        self.question
            .ready()
            .and_then(|q| q.sub_questions.get(self.sub))
            .map(|s| s.options.len())
            .unwrap_or(0)
    }

    pub fn move_cursor(&mut self, down: bool) {
        self.cursor = cycle(self.cursor, self.option_count(), down);
    }

    pub fn move_sub(&mut self, forward: bool) {
        self.sub = cycle(self.sub, self.answers.len(), forward);
        self.cursor = self.answers.get(self.sub).copied().flatten().unwrap_or(0);
    }

    pub fn pick(&mut self) {
        if self.revealed || self.option_count() == 0 {
            return;
        }
        if let Some(slot) = self.answers.get_mut(self.sub) {
            *slot = Some(self.cursor);
        }
        if self.sub + 1 < self.answers.len() {
            self.move_sub(true);
        }
    }

    /// Correct answers so far, counted once revealed
    pub fn score(&self) -> usize {
        let Some(question) = self.question.ready() else {
            return 0;
        };
        question
            .sub_questions
            .iter()
            .zip(&self.answers)
            .filter(|(sub, picked)| {
                picked
                    .and_then(|i| sub.options.get(i))
                    .is_some_and(|o| o.trim() == sub.correct_answer.trim())
            })
            .count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation and writing
// ─────────────────────────────────────────────────────────────────────────────

/// Translate an English passage into Vietnamese, then get it marked
#[derive(Debug)]
pub struct TranslationSession {
    pub topic: usize,
    /// Id of the latest task request; answers carrying another id are stale
    pub request: u64,
    pub task: Loadable<String>,
    pub input: TextInput,
    pub feedback: Loadable<TranslationFeedback>,
}

impl Default for TranslationSession {
    fn default() -> Self {
        Self {
            topic: 0,
            request: 0,
            task: Loadable::Idle,
            input: TextInput::multiline(),
            feedback: Loadable::Idle,
        }
    }
}

impl TranslationSession {
    pub fn next_topic(&mut self, count: usize) {
        self.topic = cycle(self.topic, count, true);
    }

    /// Mark a new task as loading and return the id its answer must carry
    pub fn begin_task(&mut self) -> u64 {
        self.request += 1;
        self.task = Loadable::Loading;
        self.reset_attempt();
        self.request
    }

    /// Back on the screen after requests were dropped; `true` when the task
    /// has to be requested again
    pub fn resume(&mut self) -> bool {
        if self.feedback.is_loading() {
            self.feedback = Loadable::Idle;
        }
        matches!(self.task, Loadable::Idle | Loadable::Loading)
    }

    pub fn reset_attempt(&mut self) {
        self.input.clear();
        self.feedback = Loadable::Idle;
    }
}

#[derive(Debug)]
pub struct WritingSession {
    pub mode: WritingMode,
    pub topic: usize,
    /// Id of the latest task request; answers carrying another id are stale
    pub request: u64,
    pub task: Loadable<String>,
    pub input: TextInput,
    pub feedback: Loadable<WritingFeedback>,
}

impl Default for WritingSession {
    fn default() -> Self {
        Self {
            mode: WritingMode::default(),
            topic: 0,
            request: 0,
            task: Loadable::Idle,
            input: TextInput::multiline(),
            feedback: Loadable::Idle,
        }
    }
}

impl WritingSession {
    pub fn next_mode(&mut self) {
        let all = WritingMode::all();
        self.mode = all[cycle(position_of(all, &self.mode), all.len(), true)];
        self.task = Loadable::Idle;
        self.reset_attempt();
    }

    pub fn next_topic(&mut self, count: usize) {
        self.topic = cycle(self.topic, count, true);
    }

    /// Mark a new task as loading and return the id its answer must carry
    pub fn begin_task(&mut self) -> u64 {
        self.request += 1;
        self.task = Loadable::Loading;
        self.reset_attempt();
        self.request
    }

    /// Back on the screen after requests were dropped; `true` when the task
    /// has to be requested again
    pub fn resume(&mut self) -> bool {
        if self.feedback.is_loading() {
            self.feedback = Loadable::Idle;
        }
        matches!(self.task, Loadable::Idle | Loadable::Loading)
    }

    pub fn reset_attempt(&mut self) {
        self.input.clear();
        self.feedback = Loadable::Idle;
    }
}
