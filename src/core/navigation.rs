//! Screen navigation and selection state
//!
//! The controller owns a history stack that always starts at the main menu,
//! plus the sticky selection slots screens read from. Selections are only
//! replaced, never cleared, so returning to an earlier screen finds it in
//! the state it was left.
//!
//! Every mutation bumps a revision counter. Background work captures a
//! [`RequestToken`] when it starts and checks [`NavigationController::is_current`]
//! before applying its result, so late answers for a screen the user has
//! already left are dropped.

use crate::core::content::{
    Classroom, DifficultyLevel, ExamPracticeConfig, Flashcard, Grade, GrammarCategory,
    GrammarTopic, PracticeType, Unit,
};
use crate::core::partition::VocabularyModule;
use crate::core::records::CustomVocabUnit;

/// Every screen of the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    MainMenu,
    ClassroomSelection,
    GradeSelection,
    UnitSelection,
    ModuleSelection,
    CustomModuleSelection,
    FlashcardMenu,
    Flashcards,
    FlashcardViewAll,
    QuizEnToVi,
    QuizViToEn,
    VocabSentencePractice,
    GrammarDashboard,
    GrammarCategorySelection,
    GrammarTheorySelection,
    GrammarDetail,
    GrammarPracticeSelection,
    GrammarDifficultySelection,
    GrammarPracticeMode,
    GrammarAiChat,
    CustomGrammar,
    CustomVocabulary,
    ExamPrepMenu,
    ExamPracticeMode,
    WritingTranslationMenu,
    TranslationPractice,
    WritingPractice,
    CommunityChat,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::MainMenu => "Home",
            Screen::ClassroomSelection => "Classrooms",
            Screen::GradeSelection => "Grades",
            Screen::UnitSelection => "Units",
            Screen::ModuleSelection => "Modules",
            Screen::CustomModuleSelection => "My Modules",
            Screen::FlashcardMenu => "Study Modes",
            Screen::Flashcards => "Flashcards",
            Screen::FlashcardViewAll => "All Cards",
            Screen::QuizEnToVi => "Quiz: English → Vietnamese",
            Screen::QuizViToEn => "Quiz: Vietnamese → English",
            Screen::VocabSentencePractice => "Sentence Practice",
            Screen::GrammarDashboard => "Grammar",
            Screen::GrammarCategorySelection => "Grammar Categories",
            Screen::GrammarTheorySelection => "Grammar Lessons",
            Screen::GrammarDetail => "Lesson",
            Screen::GrammarPracticeSelection => "Practice Topics",
            Screen::GrammarDifficultySelection => "Practice Settings",
            Screen::GrammarPracticeMode => "Grammar Practice",
            Screen::GrammarAiChat => "Ask the Tutor",
            Screen::CustomGrammar => "My Grammar",
            Screen::CustomVocabulary => "My Vocabulary",
            Screen::ExamPrepMenu => "Exam Prep",
            Screen::ExamPracticeMode => "Exam Practice",
            Screen::WritingTranslationMenu => "Writing & Translation",
            Screen::TranslationPractice => "Translation",
            Screen::WritingPractice => "Writing",
            Screen::CommunityChat => "Community",
        }
    }
}

/// Whether the grammar screens lead to lessons or to exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrammarFlow {
    #[default]
    Theory,
    Practice,
}

/// Sticky selections shared by every screen
#[derive(Debug, Clone)]
pub struct Selections {
    pub classroom: Option<Classroom>,
    pub grade: Option<Grade>,
    pub unit: Option<Unit>,
    pub words: Vec<Flashcard>,
    pub module: Option<VocabularyModule>,
    pub custom_unit: Option<CustomVocabUnit>,
    pub grammar_category: Option<GrammarCategory>,
    pub grammar_topic: Option<GrammarTopic>,
    pub grammar_flow: GrammarFlow,
    pub difficulty: DifficultyLevel,
    pub question_count: usize,
    pub practice_type: PracticeType,
    pub exam_config: Option<ExamPracticeConfig>,
}

impl Default for Selections {
    fn default() -> Self {
        Self {
            classroom: None,
            grade: None,
            unit: None,
            words: Vec::new(),
            module: None,
            custom_unit: None,
            grammar_category: None,
            grammar_topic: None,
            grammar_flow: GrammarFlow::Theory,
            difficulty: DifficultyLevel::Medium,
            question_count: 10,
            practice_type: PracticeType::MultipleChoice,
            exam_config: None,
        }
    }
}

/// Snapshot of navigation state taken when background work starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    screen: Screen,
    revision: u64,
}

impl RequestToken {
    pub fn screen(&self) -> Screen {
        self.screen
    }
}

/// Owns the current screen, its history and the selections
#[derive(Debug, Clone)]
pub struct NavigationController {
    history: Vec<Screen>,
    selections: Selections,
    detail_word: Option<String>,
    revision: u64,
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationController {
    pub fn new() -> Self {
        Self {
            history: vec![Screen::MainMenu],
            selections: Selections::default(),
            detail_word: None,
            revision: 0,
        }
    }

    /// Start with a word list already selected (quiz screens never open empty-handed)
    pub fn with_words(words: Vec<Flashcard>) -> Self {
        let mut nav = Self::new();
        nav.selections.words = words;
        nav
    }

    pub fn current(&self) -> Screen {
        // The history is never empty; MainMenu is the floor.
        self.history.last().copied().unwrap_or(Screen::MainMenu)
    }

    pub fn history(&self) -> &[Screen] {
        &self.history
    }

    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ─────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────

    /// Push `screen` and make it current
    pub fn enter(&mut self, screen: Screen) {
        tracing::debug!(from = ?self.current(), to = ?screen, "enter");
        self.history.push(screen);
        self.touch();
    }

    /// Enter a screen from the main menu, priming the grammar flow for grammar entry points
    pub fn select_mode(&mut self, screen: Screen) {
        match screen {
            Screen::GrammarCategorySelection => self.selections.grammar_flow = GrammarFlow::Practice,
            Screen::GrammarDetail => self.selections.grammar_flow = GrammarFlow::Theory,
            _ => {}
        }
        self.enter(screen);
    }

    /// Return to the previous screen; stays on the main menu when already there
    pub fn go_back(&mut self) {
        if self.history.len() > 1 {
            let left = self.history.pop();
            tracing::debug!(?left, to = ?self.current(), "back");
            self.touch();
        }
    }

    /// Drop the whole history (used on sign-out)
    pub fn reset_to_menu(&mut self) {
        self.history.truncate(1);
        self.detail_word = None;
        self.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Selection setters
    // ─────────────────────────────────────────────────────────────────────────

    pub fn select_classroom(&mut self, classroom: Classroom) {
        self.selections.classroom = Some(classroom);
        self.touch();
    }

    pub fn select_grade(&mut self, grade: Grade) {
        self.selections.grade = Some(grade);
        self.touch();
    }

    pub fn select_unit(&mut self, unit: Unit) {
        self.selections.unit = Some(unit);
        self.touch();
    }

    pub fn select_words(&mut self, words: Vec<Flashcard>) {
        self.selections.words = words;
        self.touch();
    }

    pub fn select_module(&mut self, module: VocabularyModule) {
        self.selections.module = Some(module);
        self.touch();
    }

    pub fn select_custom_unit(&mut self, unit: CustomVocabUnit) {
        self.selections.custom_unit = Some(unit);
        self.touch();
    }

    pub fn select_grammar_category(&mut self, category: GrammarCategory) {
        self.selections.grammar_category = Some(category);
        self.touch();
    }

    pub fn select_grammar_topic(&mut self, topic: GrammarTopic) {
        self.selections.grammar_topic = Some(topic);
        self.touch();
    }

    pub fn select_grammar_flow(&mut self, flow: GrammarFlow) {
        self.selections.grammar_flow = flow;
        self.touch();
    }

    pub fn select_difficulty(&mut self, difficulty: DifficultyLevel) {
        self.selections.difficulty = difficulty;
        self.touch();
    }

    pub fn select_question_count(&mut self, count: usize) {
        self.selections.question_count = count;
        self.touch();
    }

    pub fn select_practice_type(&mut self, practice_type: PracticeType) {
        self.selections.practice_type = practice_type;
        self.touch();
    }

    pub fn select_exam_config(&mut self, config: ExamPracticeConfig) {
        self.selections.exam_config = Some(config);
        self.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Select-and-enter helpers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn open_classroom(&mut self, classroom: Classroom) {
        self.select_classroom(classroom);
        self.enter(Screen::GradeSelection);
    }

    pub fn open_grade(&mut self, grade: Grade) {
        self.select_grade(grade);
        self.enter(Screen::UnitSelection);
    }

    /// Pick a unit from the unit list; its modules are chosen next
    pub fn open_unit(&mut self, unit: Unit) {
        self.selections.words = unit.words();
        self.select_unit(unit);
        self.enter(Screen::ModuleSelection);
    }

    /// Study a whole unit at once
    pub fn study_unit(&mut self, unit: Unit) {
        self.selections.words = unit.words();
        self.select_unit(unit);
        self.enter(Screen::FlashcardMenu);
    }

    pub fn open_module(&mut self, module: VocabularyModule) {
        self.selections.words = module.words.clone();
        self.select_module(module);
        self.enter(Screen::FlashcardMenu);
    }

    /// Open a learner-authored unit. Returns `false` and changes nothing when
    /// the unit has no words yet.
    pub fn open_custom_unit(&mut self, unit: CustomVocabUnit) -> bool {
        let as_unit = unit.to_unit();
        let words = as_unit.words();
        if words.is_empty() {
            return false;
        }
        self.selections.words = words;
        self.selections.unit = Some(as_unit);
        self.select_custom_unit(unit);
        self.enter(Screen::CustomModuleSelection);
        true
    }

    /// Pick a grammar category; the flow decides between lessons and exercises
    pub fn choose_grammar_category(&mut self, category: GrammarCategory) {
        self.select_grammar_category(category);
        match self.selections.grammar_flow {
            GrammarFlow::Practice => self.enter(Screen::GrammarPracticeSelection),
            GrammarFlow::Theory => self.enter(Screen::GrammarTheorySelection),
        }
    }

    pub fn open_topic_theory(&mut self, topic: GrammarTopic) {
        self.select_grammar_topic(topic);
        self.enter(Screen::GrammarDetail);
    }

    pub fn open_topic_practice(&mut self, topic: GrammarTopic) {
        self.select_grammar_topic(topic);
        self.enter(Screen::GrammarDifficultySelection);
    }

    /// Jump straight to a lesson from anywhere (outline shortcut)
    pub fn open_sidebar_topic(&mut self, topic: GrammarTopic) {
        self.selections.grammar_flow = GrammarFlow::Theory;
        self.open_topic_theory(topic);
    }

    pub fn open_ai_chat(&mut self, topic: GrammarTopic) {
        self.select_grammar_topic(topic);
        self.enter(Screen::GrammarAiChat);
    }

    pub fn start_practice_from_detail(&mut self, topic: GrammarTopic) {
        self.selections.grammar_flow = GrammarFlow::Practice;
        self.open_topic_practice(topic);
    }

    pub fn start_practice(
        &mut self,
        difficulty: DifficultyLevel,
        count: usize,
        practice_type: PracticeType,
    ) {
        self.select_difficulty(difficulty);
        self.select_question_count(count);
        self.select_practice_type(practice_type);
        self.enter(Screen::GrammarPracticeMode);
    }

    pub fn start_exam(&mut self, config: ExamPracticeConfig) {
        self.select_exam_config(config);
        self.enter(Screen::ExamPracticeMode);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Word detail overlay
    // ─────────────────────────────────────────────────────────────────────────

    pub fn show_detail(&mut self, word: impl Into<String>) {
        self.detail_word = Some(word.into());
    }

    pub fn close_detail(&mut self) {
        self.detail_word = None;
    }

    pub fn detail_word(&self) -> Option<&str> {
        self.detail_word.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stale response detection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn request_token(&self) -> RequestToken {
        RequestToken {
            screen: self.current(),
            revision: self.revision,
        }
    }

    /// Whether a result requested under `token` still belongs on screen
    pub fn is_current(&self, token: &RequestToken) -> bool {
        token.revision == self.revision && token.screen == self.current()
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::Catalog;
    use crate::core::partition::{partition, DEFAULT_MODULE_SIZE};
    use crate::core::records::CustomVocabModule;

    fn topic(id: &str) -> GrammarTopic {
        GrammarTopic {
            id: id.into(),
            title: id.into(),
            summary: String::new(),
            sections: vec![],
            cheat_sheet: None,
            sub_topics: vec![],
        }
    }

    fn category() -> GrammarCategory {
        GrammarCategory {
            id: "tenses".into(),
            name: "Tenses".into(),
            description: String::new(),
            topics: vec![topic("present-simple")],
        }
    }

    #[test]
    fn test_starts_at_main_menu_with_defaults() {
        let nav = NavigationController::new();
        assert_eq!(nav.current(), Screen::MainMenu);
        assert_eq!(nav.history(), &[Screen::MainMenu]);
        let s = nav.selections();
        assert_eq!(s.difficulty, DifficultyLevel::Medium);
        assert_eq!(s.question_count, 10);
        assert_eq!(s.practice_type, PracticeType::MultipleChoice);
        assert_eq!(s.grammar_flow, GrammarFlow::Theory);
        assert!(s.words.is_empty());
    }

    #[test]
    fn test_back_is_idempotent_at_the_floor() {
        let mut nav = NavigationController::new();
        for _ in 0..5 {
            nav.go_back();
            assert_eq!(nav.history(), &[Screen::MainMenu]);
        }
    }

    #[test]
    fn test_back_is_lifo() {
        let mut nav = NavigationController::new();
        nav.enter(Screen::FlashcardMenu);
        nav.enter(Screen::Flashcards);
        assert_eq!(
            nav.history(),
            &[Screen::MainMenu, Screen::FlashcardMenu, Screen::Flashcards]
        );
        nav.go_back();
        assert_eq!(nav.current(), Screen::FlashcardMenu);
        nav.go_back();
        assert_eq!(nav.current(), Screen::MainMenu);
        nav.go_back();
        assert_eq!(nav.history(), &[Screen::MainMenu]);
    }

    #[test]
    fn test_back_after_several_enters() {
        let mut nav = NavigationController::new();
        nav.enter(Screen::GradeSelection);
        nav.enter(Screen::UnitSelection);
        nav.enter(Screen::ModuleSelection);
        nav.go_back();
        assert_eq!(
            nav.history(),
            &[Screen::MainMenu, Screen::GradeSelection, Screen::UnitSelection]
        );

        for screen in [Screen::ExamPrepMenu, Screen::CommunityChat, Screen::CustomGrammar] {
            nav.enter(screen);
            assert_eq!(nav.history()[0], Screen::MainMenu);
            assert!(!nav.history().is_empty());
        }
        for _ in 0..10 {
            nav.go_back();
        }
        assert_eq!(nav.history(), &[Screen::MainMenu]);
    }

    #[test]
    fn test_enter_then_back_restores_previous_for_every_screen() {
        let screens = [
            Screen::ClassroomSelection,
            Screen::GrammarDetail,
            Screen::ExamPracticeMode,
            Screen::CommunityChat,
            Screen::MainMenu,
        ];
        let mut nav = NavigationController::new();
        nav.enter(Screen::ExamPrepMenu);
        for screen in screens {
            let before = nav.history().to_vec();
            nav.enter(screen);
            assert_eq!(nav.current(), screen);
            nav.go_back();
            assert_eq!(nav.history(), before.as_slice());
        }
    }

    #[test]
    fn test_select_mode_primes_grammar_flow() {
        let mut nav = NavigationController::new();
        nav.select_mode(Screen::GrammarCategorySelection);
        assert_eq!(nav.selections().grammar_flow, GrammarFlow::Practice);

        nav.choose_grammar_category(category());
        assert_eq!(nav.current(), Screen::GrammarPracticeSelection);

        nav.select_mode(Screen::GrammarDetail);
        assert_eq!(nav.selections().grammar_flow, GrammarFlow::Theory);
    }

    #[test]
    fn test_category_in_theory_flow_opens_lessons() {
        let mut nav = NavigationController::new();
        nav.enter(Screen::GrammarCategorySelection);
        nav.choose_grammar_category(category());
        assert_eq!(nav.current(), Screen::GrammarTheorySelection);
        assert_eq!(nav.selections().grammar_category.as_ref().unwrap().id, "tenses");
    }

    #[test]
    fn test_grammar_topic_helpers() {
        let mut nav = NavigationController::new();
        nav.open_topic_practice(topic("past-simple"));
        assert_eq!(nav.current(), Screen::GrammarDifficultySelection);

        nav.start_practice(DifficultyLevel::Hard, 15, PracticeType::ErrorCorrection);
        assert_eq!(nav.current(), Screen::GrammarPracticeMode);
        assert_eq!(nav.selections().difficulty, DifficultyLevel::Hard);
        assert_eq!(nav.selections().question_count, 15);
        assert_eq!(nav.selections().practice_type, PracticeType::ErrorCorrection);

        nav.open_sidebar_topic(topic("conditionals"));
        assert_eq!(nav.current(), Screen::GrammarDetail);
        assert_eq!(nav.selections().grammar_flow, GrammarFlow::Theory);

        nav.start_practice_from_detail(topic("conditionals"));
        assert_eq!(nav.selections().grammar_flow, GrammarFlow::Practice);
        assert_eq!(nav.current(), Screen::GrammarDifficultySelection);

        nav.open_ai_chat(topic("conditionals"));
        assert_eq!(nav.current(), Screen::GrammarAiChat);
    }

    #[test]
    fn test_selections_survive_back_navigation() {
        let catalog = Catalog::builtin().unwrap();
        let (_, _, unit) = catalog.units().next().unwrap();
        let mut nav = NavigationController::new();
        nav.open_unit(unit.clone());
        assert_eq!(nav.current(), Screen::ModuleSelection);
        assert_eq!(nav.selections().words.len(), unit.word_count());

        let module = partition(&unit.words(), DEFAULT_MODULE_SIZE).remove(0);
        let module_len = module.word_count();
        nav.open_module(module);
        assert_eq!(nav.current(), Screen::FlashcardMenu);
        assert_eq!(nav.selections().words.len(), module_len);

        nav.go_back();
        nav.go_back();
        assert_eq!(nav.current(), Screen::MainMenu);
        assert!(nav.selections().unit.is_some());
        assert!(nav.selections().module.is_some());
    }

    #[test]
    fn test_empty_custom_unit_is_refused() {
        let mut nav = NavigationController::new();
        let mut unit = CustomVocabUnit {
            id: "c1".into(),
            uid: "u1".into(),
            name: "Empty".into(),
            description: String::new(),
            modules: vec![],
            created_at: 0,
            updated_at: 0,
        };
        let revision = nav.revision();
        assert!(!nav.open_custom_unit(unit.clone()));
        assert_eq!(nav.current(), Screen::MainMenu);
        assert_eq!(nav.revision(), revision);

        let words = Catalog::builtin().unwrap().all_words();
        unit.modules.push(CustomVocabModule {
            id: "module_1".into(),
            name: "First".into(),
            words: words[..3].to_vec(),
            created_at: 0,
            updated_at: 0,
            is_ai_generated: false,
        });
        assert!(nav.open_custom_unit(unit));
        assert_eq!(nav.current(), Screen::CustomModuleSelection);
        assert_eq!(nav.selections().words.len(), 3);
    }

    #[test]
    fn test_stale_token_after_navigation() {
        let mut nav = NavigationController::new();
        nav.enter(Screen::GrammarPracticeMode);
        let token = nav.request_token();
        assert!(nav.is_current(&token));

        nav.go_back();
        assert!(!nav.is_current(&token));

        // Coming back to the same screen is a new visit, the old request stays stale
        nav.enter(Screen::GrammarPracticeMode);
        assert!(!nav.is_current(&token));
    }

    #[test]
    fn test_token_survives_detail_overlay() {
        let mut nav = NavigationController::new();
        nav.enter(Screen::Flashcards);
        let token = nav.request_token();
        nav.show_detail("bond");
        assert_eq!(nav.detail_word(), Some("bond"));
        assert!(nav.is_current(&token));
        nav.close_detail();
        assert_eq!(nav.detail_word(), None);
    }

    #[test]
    fn test_setters_replace_slots_and_stale_tokens() {
        let mut nav = NavigationController::new();
        let token = nav.request_token();

        let words = Catalog::builtin().unwrap().all_words();
        nav.select_words(words[..3].to_vec());
        assert!(!nav.is_current(&token));

        nav.select_difficulty(DifficultyLevel::Hard);
        nav.select_question_count(5);
        nav.select_practice_type(PracticeType::ErrorCorrection);
        let s = nav.selections();
        assert_eq!(s.words.len(), 3);
        assert_eq!(s.difficulty, DifficultyLevel::Hard);
        assert_eq!(s.question_count, 5);
        assert_eq!(s.practice_type, PracticeType::ErrorCorrection);
        assert_eq!(nav.current(), Screen::MainMenu);
    }

    #[test]
    fn test_reset_to_menu() {
        let mut nav = NavigationController::new();
        nav.enter(Screen::ExamPrepMenu);
        nav.enter(Screen::ExamPracticeMode);
        nav.reset_to_menu();
        assert_eq!(nav.history(), &[Screen::MainMenu]);
    }
}
