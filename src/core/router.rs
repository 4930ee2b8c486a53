//! Mapping screens to the view that renders them
//!
//! Each screen has one route: the view to draw and, optionally, a guard
//! naming the selection the view cannot work without. When that selection
//! is missing the guard's policy decides between a short placeholder
//! message and rendering nothing at all.

use crate::auth::UserIdentity;
use crate::core::navigation::{Screen, Selections};

/// What gets drawn in the content area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    ClassroomList,
    GradeList,
    UnitList,
    ModuleList,
    CustomModuleList,
    StudyModeMenu,
    FlashcardDeck,
    CardList,
    WordQuiz,
    SentencePractice,
    GrammarCategoryList,
    GrammarTopicList,
    GrammarLesson,
    PracticeSettings,
    GrammarPractice,
    TutorChat,
    CustomGrammarManager,
    CustomVocabularyManager,
    ExamMenu,
    ExamPractice,
    WritingMenu,
    TranslationPractice,
    WritingPractice,
    CommunityChat,
}

/// Selection a view depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Words,
    Grade,
    Classroom,
    Unit,
    CustomUnit,
    GrammarCategory,
    GrammarTopic,
    ExamConfig,
    SignedInUser,
}

impl Requirement {
    pub fn is_met(&self, selections: &Selections, user: Option<&UserIdentity>) -> bool {
        match self {
            Requirement::Words => !selections.words.is_empty(),
            Requirement::Classroom => selections.classroom.is_some(),
            Requirement::Grade => selections.grade.is_some(),
            Requirement::Unit => selections.unit.is_some(),
            Requirement::CustomUnit => selections.custom_unit.is_some(),
            Requirement::GrammarCategory => selections.grammar_category.is_some(),
            Requirement::GrammarTopic => selections.grammar_topic.is_some(),
            Requirement::ExamConfig => selections.exam_config.is_some(),
            Requirement::SignedInUser => user.is_some(),
        }
    }
}

/// What to show when a guard fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    Placeholder(&'static str),
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub requires: Requirement,
    pub on_missing: OnMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub view: View,
    pub guard: Option<Guard>,
}

/// Outcome of resolving a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Render(View),
    Placeholder(&'static str),
    Nothing,
}

pub const NO_WORDS_TO_STUDY: &str = "No vocabulary to study yet. Pick a unit or module first.";
pub const NO_WORDS_TO_LIST: &str = "No vocabulary to show yet. Pick a unit or module first.";
pub const NO_WORDS_FOR_QUIZ: &str = "Not enough vocabulary for a quiz. Pick a unit or module first.";
pub const NO_WORDS_TO_PRACTICE: &str =
    "No vocabulary to practise with. Pick a unit or module first.";
pub const NO_LESSON_SELECTED: &str = "Choose a lesson from the grammar menu to start reading.";

const fn open(view: View) -> Route {
    Route { view, guard: None }
}

const fn needs(view: View, requires: Requirement, on_missing: OnMissing) -> Route {
    Route {
        view,
        guard: Some(Guard {
            requires,
            on_missing,
        }),
    }
}

/// The route table
pub fn route(screen: Screen) -> Route {
    use OnMissing::{Nothing, Placeholder};
    use Requirement::*;

    match screen {
        Screen::MainMenu => open(View::Home),
        Screen::ClassroomSelection => open(View::ClassroomList),
        Screen::GradeSelection => needs(View::GradeList, Classroom, Nothing),
        Screen::UnitSelection => needs(View::UnitList, Grade, Nothing),
        Screen::ModuleSelection => needs(View::ModuleList, Unit, Nothing),
        Screen::CustomModuleSelection => needs(View::CustomModuleList, CustomUnit, Nothing),
        Screen::FlashcardMenu => open(View::StudyModeMenu),
        Screen::Flashcards => needs(View::FlashcardDeck, Words, Placeholder(NO_WORDS_TO_STUDY)),
        Screen::FlashcardViewAll => needs(View::CardList, Words, Placeholder(NO_WORDS_TO_LIST)),
        Screen::QuizEnToVi | Screen::QuizViToEn => {
            needs(View::WordQuiz, Words, Placeholder(NO_WORDS_FOR_QUIZ))
        }
        Screen::VocabSentencePractice => needs(
            View::SentencePractice,
            Words,
            Placeholder(NO_WORDS_TO_PRACTICE),
        ),
        Screen::GrammarDashboard | Screen::GrammarCategorySelection => {
            open(View::GrammarCategoryList)
        }
        Screen::GrammarTheorySelection | Screen::GrammarPracticeSelection => {
            needs(View::GrammarTopicList, GrammarCategory, Nothing)
        }
        Screen::GrammarDetail => needs(
            View::GrammarLesson,
            GrammarTopic,
            Placeholder(NO_LESSON_SELECTED),
        ),
        Screen::GrammarDifficultySelection => needs(View::PracticeSettings, GrammarTopic, Nothing),
        Screen::GrammarPracticeMode => needs(View::GrammarPractice, GrammarTopic, Nothing),
        Screen::GrammarAiChat => needs(View::TutorChat, GrammarTopic, Nothing),
        Screen::CustomGrammar => needs(View::CustomGrammarManager, SignedInUser, Nothing),
        Screen::CustomVocabulary => needs(View::CustomVocabularyManager, SignedInUser, Nothing),
        Screen::ExamPrepMenu => open(View::ExamMenu),
        Screen::ExamPracticeMode => needs(View::ExamPractice, ExamConfig, Nothing),
        Screen::WritingTranslationMenu => open(View::WritingMenu),
        Screen::TranslationPractice => open(View::TranslationPractice),
        Screen::WritingPractice => open(View::WritingPractice),
        Screen::CommunityChat => needs(View::CommunityChat, SignedInUser, Nothing),
    }
}

/// Resolve a screen against the current selections and signed-in user
pub fn resolve(
    screen: Screen,
    selections: &Selections,
    user: Option<&UserIdentity>,
) -> Resolution {
    let route = route(screen);
    match route.guard {
        Some(guard) if !guard.requires.is_met(selections, user) => match guard.on_missing {
            OnMissing::Placeholder(message) => Resolution::Placeholder(message),
            OnMissing::Nothing => Resolution::Nothing,
        },
        _ => Resolution::Render(route.view),
    }
}
