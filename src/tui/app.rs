//! Main TUI application state and logic

use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Stdout};
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::Terminal;
use tokio::sync::mpsc;

use crate::ai::tutor::{
    ExamQuestion, GrammarAssessment, TranslationFeedback, WordDetails, WritingCheck,
    WritingFeedback,
};
use crate::ai::Tutor;
use crate::auth::firebase::FirebaseAuth;
use crate::auth::profile::{DocumentProfileStore, ProfileStore};
use crate::auth::AuthProvider;
use crate::core::content::{Catalog, Flashcard, PracticeType};
use crate::core::navigation::{GrammarFlow, NavigationController, RequestToken, Screen};
use crate::core::partition::{partition, Module, VocabularyModule};
use crate::core::records::{ChatMessage, Conversation, CustomGrammarUnit, CustomVocabUnit, UserProfile};
use crate::core::router::{self, Resolution, View};
use crate::core::{Config, SessionGate, SessionState};
use crate::error::{AppError, Result};
use crate::services::chat::{is_mentioning_ai, Sender};
use crate::services::{ChatService, CustomGrammarService, CustomVocabularyService};
use crate::store::firestore::FirestoreStore;
use crate::store::DocumentStore;
use crate::tui::event::{
    is_back_key, is_force_quit_key, is_quit_key, AppEvent, EventHandler, TICK_RATE,
};
use crate::tui::screens::auth::{AuthForm, AuthRequest};
use crate::tui::screens::chat::{ChatRoom, CommunityChat};
use crate::tui::screens::profile::ProfilePanel;
use crate::tui::screens::custom::{
    next_level, parse_manual_entries, parse_word_list, CustomGrammarManager,
    CustomVocabularyManager, GrammarPrompt, PairPrompt, VocabPrompt,
};
use crate::tui::screens::practice::{
    ExamField, ExamForm, ExamSession, GrammarPractice, PracticeSet, PracticeSettingsForm,
    SettingsField, TranslationSession, TutorChat, WritingSession,
};
use crate::tui::screens::study::{FlashcardDeck, QuizDirection, SentencePractice, WordQuiz};
use crate::tui::screens::{Loadable, TextInput};
use crate::tui::ui;

/// Entries of the home menu
pub const HOME_MENU: [(&str, Screen); 8] = [
    ("Vocabulary", Screen::ClassroomSelection),
    ("Grammar lessons", Screen::GrammarDashboard),
    ("Grammar practice", Screen::GrammarCategorySelection),
    ("Exam preparation", Screen::ExamPrepMenu),
    ("Writing & translation", Screen::WritingTranslationMenu),
    ("My vocabulary", Screen::CustomVocabulary),
    ("My grammar", Screen::CustomGrammar),
    ("Community chat", Screen::CommunityChat),
];

pub const STUDY_MODES: [(&str, Screen); 5] = [
    ("Flashcards", Screen::Flashcards),
    ("All cards", Screen::FlashcardViewAll),
    ("Quiz: English → Vietnamese", Screen::QuizEnToVi),
    ("Quiz: Vietnamese → English", Screen::QuizViToEn),
    ("Sentence practice", Screen::VocabSentencePractice),
];

pub const WRITING_MODES: [(&str, Screen); 2] = [
    ("Translation (English → Vietnamese)", Screen::TranslationPractice),
    ("Writing", Screen::WritingPractice),
];

/// Headwords handed to the tutor as suggested vocabulary
const SUGGESTED_VOCABULARY: usize = 8;

/// Message type for async operation results
#[derive(Debug)]
pub enum AsyncMessage {
    /// The session gate resolved a new auth state
    Session(SessionState),
    /// Sign in or sign up was rejected
    AuthFailed(String),
    /// Sign-up wrote the learner's profile
    ProfileCreated(UserProfile),
    /// Status line text from a task not tied to a screen
    Notice(String),
    /// Display name saved from the profile overlay
    ProfileUpdated(Result<String>),
    /// Result of a request made from a screen
    Response {
        token: RequestToken,
        payload: Payload,
    },
}

impl From<SessionState> for AsyncMessage {
    fn from(state: SessionState) -> Self {
        AsyncMessage::Session(state)
    }
}

/// Screen request results
#[derive(Debug)]
pub enum Payload {
    WordDetails {
        word: String,
        result: Result<WordDetails>,
    },
    SentenceTask {
        index: usize,
        result: Result<String>,
    },
    SentenceCheck {
        index: usize,
        result: Result<WritingCheck>,
    },
    Practice(Result<PracticeSet>),
    Assessment(Result<GrammarAssessment>),
    TutorReply(Result<String>),
    VocabUnits(Result<Vec<CustomVocabUnit>>),
    VocabChanged(Result<String>),
    GrammarUnits(Result<Vec<CustomGrammarUnit>>),
    GrammarChanged(Result<String>),
    Exam(Result<ExamQuestion>),
    TranslationTask {
        request: u64,
        result: Result<String>,
    },
    TranslationFeedback {
        request: u64,
        result: Result<TranslationFeedback>,
    },
    WritingTask {
        request: u64,
        result: Result<String>,
    },
    WritingFeedback {
        request: u64,
        result: Result<WritingFeedback>,
    },
    ChatRoom {
        room: ChatRoom,
        result: Result<Conversation>,
    },
    ChatPeople(Result<Vec<UserProfile>>),
    ChatMessages {
        channel_id: String,
        result: Result<Vec<ChatMessage>>,
    },
    ChatSent {
        channel_id: String,
        result: Result<Vec<ChatMessage>>,
    },
}

/// List selection state
#[derive(Debug, Default)]
pub struct ListState {
    pub selected: usize,
    pub total: usize,
}

impl ListState {
    pub fn new(total: usize) -> Self {
        Self { selected: 0, total }
    }

    pub fn next(&mut self) {
        if self.total > 0 {
            self.selected = (self.selected + 1) % self.total;
        }
    }

    pub fn previous(&mut self) {
        if self.total > 0 {
            self.selected = self.selected.checked_sub(1).unwrap_or(self.total - 1);
        }
    }
}

/// Error popup for failures that need acknowledging
#[derive(Debug, Clone)]
pub struct ErrorPopup {
    pub title: String,
    pub message: String,
}

/// Collaborators the app talks to
pub struct Services {
    pub auth: Arc<FirebaseAuth>,
    pub store: Arc<dyn DocumentStore>,
    pub tutor: Option<Tutor>,
}

impl Services {
    /// Firebase-backed services from the saved configuration
    pub fn connect(config: &Config) -> Result<Self> {
        let (_, project_id) = config.require_firebase()?;
        let auth = Arc::new(FirebaseAuth::from_config(config)?);
        let store: Arc<dyn DocumentStore> = Arc::new(FirestoreStore::new(&project_id, auth.clone()));
        let tutor = match Tutor::gemini() {
            Ok(tutor) => Some(tutor),
            Err(e) => {
                tracing::warn!(error = %e, "AI features disabled");
                None
            }
        };
        Ok(Self { auth, store, tutor })
    }
}

/// Main TUI application
pub struct App {
    pub running: bool,
    pub catalog: &'static Catalog,
    pub config: Config,
    pub nav: NavigationController,
    pub session: SessionGate,
    /// Cursor per list screen
    pub lists: HashMap<Screen, ListState>,
    pub status_message: Option<String>,
    pub show_help: bool,
    pub error_popup: Option<ErrorPopup>,
    /// Tick counter for spinners and polling
    pub tick_counter: u64,

    // ─────────────────────────────────────────────────────────────────────────
    // Async communication
    // ─────────────────────────────────────────────────────────────────────────
    pub async_tx: mpsc::Sender<AsyncMessage>,
    pub async_rx: mpsc::Receiver<AsyncMessage>,

    // ─────────────────────────────────────────────────────────────────────────
    // Collaborators
    // ─────────────────────────────────────────────────────────────────────────
    auth: Arc<FirebaseAuth>,
    profiles: Arc<DocumentProfileStore>,
    vocabulary: Arc<CustomVocabularyService>,
    grammar: Arc<CustomGrammarService>,
    chat: Arc<ChatService>,
    tutor: Option<Tutor>,

    // ─────────────────────────────────────────────────────────────────────────
    // Screen state
    // ─────────────────────────────────────────────────────────────────────────
    pub auth_form: AuthForm,
    /// AI dictionary entry for the word detail overlay
    pub detail: Loadable<WordDetails>,
    pub deck: FlashcardDeck,
    pub quiz: Option<WordQuiz>,
    pub sentence: SentencePractice,
    pub lesson_scroll: usize,
    /// Topic outline popup over a lesson
    pub outline: Option<ListState>,
    pub settings: PracticeSettingsForm,
    pub practice: GrammarPractice,
    pub tutor_chat: TutorChat,
    pub custom_vocabulary: CustomVocabularyManager,
    pub custom_grammar: CustomGrammarManager,
    pub exam_form: ExamForm,
    pub exam: ExamSession,
    pub translation: TranslationSession,
    pub writing: WritingSession,
    pub community: CommunityChat,
    /// Profile overlay over the home menu
    pub profile_panel: Option<ProfilePanel>,
}

impl App {
    /// Create the app against the configured Firebase project
    pub fn new(config: Config) -> Result<Self> {
        let services = Services::connect(&config)?;
        Self::with_services(config, services)
    }

    pub fn with_services(config: Config, services: Services) -> Result<Self> {
        let catalog = Catalog::builtin()?;
        let (async_tx, async_rx) = mpsc::channel(64);

        let profiles = Arc::new(DocumentProfileStore::new(services.store.clone()));
        let auth_provider: Arc<dyn AuthProvider> = services.auth.clone();
        let profile_store: Arc<dyn ProfileStore> = profiles.clone();
        let session = SessionGate::start(auth_provider, profile_store, async_tx.clone());

        let nav = NavigationController::with_words(catalog.all_words());
        let settings = PracticeSettingsForm::new(
            nav.selections().difficulty,
            nav.selections().question_count,
            nav.selections().practice_type,
        );

        Ok(Self {
            running: true,
            catalog,
            config,
            nav,
            session,
            lists: HashMap::new(),
            status_message: None,
            show_help: false,
            error_popup: None,
            tick_counter: 0,

            async_tx,
            async_rx,

            auth: services.auth,
            profiles,
            vocabulary: Arc::new(CustomVocabularyService::new(services.store.clone())),
            grammar: Arc::new(CustomGrammarService::new(services.store.clone())),
            chat: Arc::new(ChatService::new(services.store)),
            tutor: services.tutor,

            auth_form: AuthForm::default(),
            detail: Loadable::Idle,
            deck: FlashcardDeck::default(),
            quiz: None,
            sentence: SentencePractice::default(),
            lesson_scroll: 0,
            outline: None,
            settings,
            practice: GrammarPractice::default(),
            tutor_chat: TutorChat::default(),
            custom_vocabulary: CustomVocabularyManager::default(),
            custom_grammar: CustomGrammarManager::default(),
            exam_form: ExamForm::default(),
            exam: ExamSession::default(),
            translation: TranslationSession::default(),
            writing: WritingSession::default(),
            community: CommunityChat::default(),
            profile_panel: None,
        })
    }

    /// Setup terminal for TUI
    fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode().map_err(|e| AppError::Terminal(e.to_string()))?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).map_err(|e| AppError::Terminal(e.to_string()))?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).map_err(|e| AppError::Terminal(e.to_string()))?;
        Ok(terminal)
    }

    /// Restore terminal to normal state
    fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        disable_raw_mode().map_err(|e| AppError::Terminal(e.to_string()))?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(|e| AppError::Terminal(e.to_string()))?;
        terminal
            .show_cursor()
            .map_err(|e| AppError::Terminal(e.to_string()))?;
        Ok(())
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = Self::setup_terminal()?;
        let mut events = EventHandler::new(TICK_RATE);

        while self.running {
            if let Err(e) = terminal.draw(|frame| ui::render(frame, self)) {
                Self::restore_terminal(&mut terminal)?;
                return Err(AppError::Terminal(e.to_string()));
            }

            while let Ok(msg) = self.async_rx.try_recv() {
                self.handle_async_message(msg);
            }

            if let Some(event) = events.next().await {
                match event {
                    AppEvent::Key(key) => self.handle_key_event(key),
                    AppEvent::Resize(_, _) => {}
                    AppEvent::Tick => {
                        self.tick_counter = self.tick_counter.wrapping_add(1);
                        self.maybe_poll_chat();
                    }
                }
            }
        }

        Self::restore_terminal(&mut terminal)?;
        Ok(())
    }

    /// Stop observing the session
    pub async fn shutdown(self) {
        self.session.shutdown().await;
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived state
    // ─────────────────────────────────────────────────────────────────────────

    /// What the router says to draw for the current screen
    pub fn resolution(&self) -> Resolution {
        router::resolve(
            self.nav.current(),
            self.nav.selections(),
            self.session.user(),
        )
    }

    fn current_view(&self) -> Option<View> {
        match self.resolution() {
            Resolution::Render(view) => Some(view),
            _ => None,
        }
    }

    pub fn tutor_available(&self) -> bool {
        self.tutor.is_some()
    }

    fn uid(&self) -> Option<String> {
        self.session.user().map(|u| u.uid.clone())
    }

    /// Modules of the selected built-in unit at the configured size
    pub fn unit_modules(&self) -> Vec<VocabularyModule> {
        self.nav
            .selections()
            .unit
            .as_ref()
            .map(|unit| partition(&unit.words(), self.config.module_size()))
            .unwrap_or_default()
    }

    /// Modules of the selected custom unit, as authored
    pub fn custom_modules(&self) -> Vec<VocabularyModule> {
        self.nav
            .selections()
            .custom_unit
            .as_ref()
            .map(|unit| {
                unit.modules
                    .iter()
                    .filter(|m| !m.words.is_empty())
                    .map(|m| Module {
                        id: m.id.clone(),
                        name: m.name.clone(),
                        words: m.words.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rows in the list shown by `view`
    pub fn list_len(&self, view: View) -> usize {
        let selections = self.nav.selections();
        match view {
            View::Home => HOME_MENU.len(),
            View::ClassroomList => self.catalog.classrooms.len(),
            View::GradeList => selections.classroom.as_ref().map_or(0, |c| c.grades.len()),
            View::UnitList => selections.grade.as_ref().map_or(0, |g| g.units.len()),
            View::ModuleList => self.unit_modules().len(),
            View::CustomModuleList => self.custom_modules().len(),
            View::StudyModeMenu => STUDY_MODES.len(),
            View::CardList => selections.words.len(),
            View::GrammarCategoryList => self.catalog.grammar.len(),
            View::GrammarTopicList => selections
                .grammar_category
                .as_ref()
                .map_or(0, |c| c.topics.len()),
            View::WritingMenu => WRITING_MODES.len(),
            View::CustomVocabularyManager => self.custom_vocabulary.len(),
            View::CustomGrammarManager => self.custom_grammar.len(),
            _ => 0,
        }
    }

    /// Selected row of the current list, clamped to its length
    pub fn cursor(&self) -> usize {
        let total = self.current_view().map_or(0, |v| self.list_len(v));
        let selected = self
            .lists
            .get(&self.nav.current())
            .map_or(0, |l| l.selected);
        selected.min(total.saturating_sub(1))
    }

    fn move_selection(&mut self, down: bool) {
        let total = self.current_view().map_or(0, |v| self.list_len(v));
        let state = self.lists.entry(self.nav.current()).or_default();
        state.total = total;
        state.selected = state.selected.min(total.saturating_sub(1));
        if down {
            state.next();
        } else {
            state.previous();
        }
    }

    /// The flashcard behind the word detail overlay, if it is one of the selected words
    pub fn detail_card(&self) -> Option<&Flashcard> {
        let word = self.nav.detail_word()?;
        self.nav
            .selections()
            .words
            .iter()
            .find(|card| card.headword().eq_ignore_ascii_case(word) || card.word == word)
    }

    /// A prompt or reader drawn over a manager's list
    fn has_overlay(&self) -> bool {
        self.custom_vocabulary.prompt.is_some()
            || self.custom_grammar.prompt.is_some()
            || self.custom_grammar.reading.is_some()
    }

    /// Whether keys go to a text field instead of the global shortcuts
    fn is_typing(&self) -> bool {
        match self.current_view() {
            Some(View::SentencePractice)
            | Some(View::TutorChat)
            | Some(View::TranslationPractice)
            | Some(View::WritingPractice) => true,
            Some(View::CommunityChat) => !self.community.choosing_partner(),
            Some(View::GrammarPractice) => {
                self.practice.expects_text() && self.practice.answered.is_none()
            }
            Some(View::CustomVocabularyManager) => matches!(
                self.custom_vocabulary.prompt,
                Some(VocabPrompt::NewUnit(_))
                    | Some(VocabPrompt::ManualModule { .. })
                    | Some(VocabPrompt::AiModule { .. })
            ),
            Some(View::CustomGrammarManager) => matches!(
                self.custom_grammar.prompt,
                Some(GrammarPrompt::NewUnit(_))
                    | Some(GrammarPrompt::ManualLesson { .. })
                    | Some(GrammarPrompt::AiLesson { .. })
            ),
            _ => false,
        }
    }

    /// The tutor, or an explanation of why AI features are off
    fn tutor_or_report(&mut self) -> Option<Tutor> {
        if self.tutor.is_none() {
            self.error_popup = Some(ErrorPopup {
                title: "AI unavailable".into(),
                message: AppError::GeminiNotConfigured.to_string(),
            });
        }
        self.tutor.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a navigation change and prepare whatever screen it lands on
    fn navigate(&mut self, change: impl FnOnce(&mut NavigationController)) {
        let before = self.nav.current();
        let depth = self.nav.history().len();
        change(&mut self.nav);

        let moved_forward = self.nav.history().len() > depth;
        if self.nav.current() != before || moved_forward {
            if moved_forward {
                self.lists.remove(&self.nav.current());
            }
            self.status_message = None;
            self.outline = None;
            self.prepare_screen();
        }
    }

    pub fn go_back(&mut self) {
        self.navigate(NavigationController::go_back);
    }

    fn open_home_entry(&mut self, screen: Screen) {
        match screen {
            // Lessons always start in the theory flow
            Screen::GrammarDashboard => self.navigate(|nav| {
                nav.select_grammar_flow(GrammarFlow::Theory);
                nav.enter(Screen::GrammarDashboard);
            }),
            other => self.navigate(|nav| nav.select_mode(other)),
        }
    }

    /// Reset the landing screen's state and start its loads
    fn prepare_screen(&mut self) {
        let Some(view) = self.current_view() else {
            return;
        };
        match view {
            View::FlashcardDeck => self.deck = FlashcardDeck::default(),
            View::WordQuiz => {
                let direction = if self.nav.current() == Screen::QuizViToEn {
                    QuizDirection::ViToEn
                } else {
                    QuizDirection::EnToVi
                };
                self.quiz = Some(WordQuiz::build(
                    &self.nav.selections().words,
                    direction,
                    &mut rand::rng(),
                ));
            }
            View::SentencePractice => {
                self.sentence = SentencePractice::default();
                self.load_sentence_task();
            }
            View::GrammarLesson => self.lesson_scroll = 0,
            View::PracticeSettings => {
                let s = self.nav.selections();
                self.settings =
                    PracticeSettingsForm::new(s.difficulty, s.question_count, s.practice_type);
            }
            View::GrammarPractice => {
                self.practice = GrammarPractice::default();
                self.load_practice();
            }
            View::TutorChat => self.tutor_chat = TutorChat::default(),
            View::CustomVocabularyManager => {
                self.custom_vocabulary.prompt = None;
                self.load_vocab_units();
            }
            View::CustomGrammarManager => {
                self.custom_grammar.prompt = None;
                self.custom_grammar.reading = None;
                self.load_grammar_units();
            }
            View::ExamPractice => {
                self.exam = ExamSession::default();
                self.load_exam();
            }
            // Requests from an earlier visit were dropped with its token
            View::TranslationPractice => {
                if self.translation.resume() {
                    self.load_translation_task();
                }
            }
            View::WritingPractice => {
                if self.writing.resume() {
                    self.load_writing_task();
                }
            }
            View::CommunityChat => {
                self.community.restart();
                self.community.conversation = Loadable::Idle;
                self.open_chat_room();
            }
            _ => {}
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Async plumbing
    // ─────────────────────────────────────────────────────────────────────────

    /// Run `work` in the background; its payload is applied only while the
    /// screen that asked for it is still current
    fn spawn_request<F>(&self, work: F)
    where
        F: Future<Output = Payload> + Send + 'static,
    {
        let token = self.nav.request_token();
        let tx = self.async_tx.clone();
        tokio::spawn(async move {
            let payload = work.await;
            let _ = tx.send(AsyncMessage::Response { token, payload }).await;
        });
    }

    /// Handle async message from background tasks
    pub fn handle_async_message(&mut self, msg: AsyncMessage) {
        match msg {
            AsyncMessage::Session(state) => self.apply_session(state),
            AsyncMessage::AuthFailed(message) => {
                tracing::error!(%message, "authentication failed");
                self.auth_form.submitting = false;
                self.auth_form.error = Some(message);
            }
            AsyncMessage::ProfileCreated(profile) => {
                if let Some(user) = self.session.user().cloned() {
                    if user.uid == profile.uid {
                        self.session.apply(SessionState::Authenticated {
                            user,
                            profile: Some(profile),
                        });
                    }
                }
            }
            AsyncMessage::Notice(text) => self.status_message = Some(text),
            AsyncMessage::ProfileUpdated(result) => self.apply_profile_update(result),
            AsyncMessage::Response { token, payload } => {
                if !self.nav.is_current(&token) {
                    tracing::debug!(screen = ?token.screen(), "discarding stale result");
                    return;
                }
                self.apply_payload(payload);
            }
        }
    }

    fn apply_session(&mut self, state: SessionState) {
        let previous = self.uid();
        self.session.apply(state);

        match self.session.state() {
            SessionState::Unauthenticated => {
                self.auth_form.submitting = false;
                if previous.is_some() {
                    self.navigate(NavigationController::reset_to_menu);
                    self.custom_vocabulary = CustomVocabularyManager::default();
                    self.custom_grammar = CustomGrammarManager::default();
                    self.community = CommunityChat::default();
                    self.profile_panel = None;
                    self.status_message = Some("Signed out".into());
                }
            }
            SessionState::Authenticated { user, .. } => {
                if previous.as_deref() != Some(user.uid.as_str()) {
                    self.status_message = Some(format!("Welcome, {}", user.label()));
                }
                self.auth_form = AuthForm::default();
            }
            SessionState::Loading => {}
        }
    }

    fn apply_profile_update(&mut self, result: Result<String>) {
        let outcome = match result {
            Ok(name) => {
                let user = self.session.user().cloned();
                let profile = self.session.profile().cloned();
                if let (Some(user), Some(mut profile)) = (user, profile) {
                    profile.display_name = name;
                    self.session.apply(SessionState::Authenticated {
                        user,
                        profile: Some(profile),
                    });
                }
                self.status_message = Some("Display name updated".into());
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "display name update failed");
                Err(first_line(&e))
            }
        };
        if let Some(panel) = self.profile_panel.as_mut() {
            panel.finish(outcome);
        }
    }

    fn apply_payload(&mut self, payload: Payload) {
        match payload {
            Payload::WordDetails { word, result } => {
                if self.nav.detail_word() == Some(word.as_str()) {
                    self.detail.settle(result);
                }
            }
            Payload::SentenceTask { index, result } => {
                if index == self.sentence.index {
                    self.sentence.task.settle(result);
                }
            }
            Payload::SentenceCheck { index, result } => {
                if index == self.sentence.index {
                    self.sentence.check.settle(result);
                }
            }
            Payload::Practice(result) => self.practice.questions.settle(result),
            Payload::Assessment(result) => self.practice.assessment.settle(result),
            Payload::TutorReply(result) => match result {
                Ok(text) => self.tutor_chat.answer(text),
                Err(e) => {
                    tracing::warn!(error = %e, "tutor reply failed");
                    self.tutor_chat.waiting = false;
                    self.status_message = Some(format!("The tutor could not answer: {}", first_line(&e)));
                }
            },
            Payload::VocabUnits(result) => {
                self.custom_vocabulary.busy = false;
                self.custom_vocabulary.units.settle(result);
            }
            Payload::VocabChanged(result) => {
                self.custom_vocabulary.busy = false;
                match result {
                    Ok(message) => {
                        self.custom_vocabulary.prompt = None;
                        self.custom_vocabulary.error = None;
                        self.status_message = Some(message);
                        self.load_vocab_units();
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "custom vocabulary change failed");
                        self.custom_vocabulary.error = Some(e.to_string());
                    }
                }
            }
            Payload::GrammarUnits(result) => {
                self.custom_grammar.busy = false;
                self.custom_grammar.units.settle(result);
            }
            Payload::GrammarChanged(result) => {
                self.custom_grammar.busy = false;
                match result {
                    Ok(message) => {
                        self.custom_grammar.prompt = None;
                        self.custom_grammar.error = None;
                        self.status_message = Some(message);
                        self.load_grammar_units();
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "custom grammar change failed");
                        self.custom_grammar.error = Some(e.to_string());
                    }
                }
            }
            Payload::Exam(result) => match result {
                Ok(question) => self.exam.load(question),
                Err(e) => self.exam.question.settle(Err(e)),
            },
            Payload::TranslationTask { request, result } => {
                if request == self.translation.request {
                    self.translation.task.settle(result);
                }
            }
            Payload::TranslationFeedback { request, result } => {
                if request == self.translation.request {
                    self.translation.feedback.settle(result);
                }
            }
            Payload::WritingTask { request, result } => {
                if request == self.writing.request {
                    self.writing.task.settle(result);
                }
            }
            Payload::WritingFeedback { request, result } => {
                if request == self.writing.request {
                    self.writing.feedback.settle(result);
                }
            }
            Payload::ChatRoom { room, result } => {
                if room != self.community.room {
                    return;
                }
                self.community.conversation.settle(result);
                self.fetch_chat_messages();
            }
            Payload::ChatPeople(result) => {
                if self.community.room == ChatRoom::Direct {
                    self.community.people.settle(result);
                    self.community.people_cursor = 0;
                }
            }
            Payload::ChatMessages { channel_id, result } => {
                if self.community.channel_id() != Some(channel_id.as_str()) {
                    return;
                }
                self.community.fetching = false;
                match result {
                    Ok(messages) => self.community.set_messages(messages),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to load messages");
                        self.community.error = Some(first_line(&e));
                    }
                }
            }
            Payload::ChatSent { channel_id, result } => {
                if self.community.channel_id() != Some(channel_id.as_str()) {
                    return;
                }
                self.community.sending = false;
                match result {
                    Ok(messages) => self.community.set_messages(messages),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to send message");
                        self.error_popup = Some(ErrorPopup {
                            title: "Message not sent".into(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Requests
    // ─────────────────────────────────────────────────────────────────────────

    fn show_word_detail(&mut self, word: String) {
        self.nav.show_detail(word.clone());
        let Some(tutor) = self.tutor.clone() else {
            self.detail = Loadable::Failed(AppError::GeminiNotConfigured.to_string());
            return;
        };
        self.detail = Loadable::Loading;
        self.spawn_request(async move {
            let result = tutor.word_details(&word).await;
            Payload::WordDetails { word, result }
        });
    }

    fn load_sentence_task(&mut self) {
        let index = self.sentence.index;
        let Some(card) = self.nav.selections().words.get(index).cloned() else {
            return;
        };
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        self.sentence.task = Loadable::Loading;
        self.spawn_request(async move {
            Payload::SentenceTask {
                index,
                result: tutor.sentence_task(&card).await,
            }
        });
    }

    fn check_sentence(&mut self) {
        let index = self.sentence.index;
        let (Some(card), Some(task)) = (
            self.nav.selections().words.get(index).cloned(),
            self.sentence.task.ready().cloned(),
        ) else {
            return;
        };
        if self.sentence.input.is_empty() || self.sentence.check.is_loading() {
            return;
        }
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        let answer = self.sentence.input.value().to_string();
        self.sentence.check = Loadable::Loading;
        self.spawn_request(async move {
            Payload::SentenceCheck {
                index,
                result: tutor
                    .check_grammar_writing(card.headword(), &task, &answer)
                    .await,
            }
        });
    }

    fn load_practice(&mut self) {
        let selections = self.nav.selections();
        let Some(topic) = selections.grammar_topic.clone() else {
            return;
        };
        let (difficulty, count, kind) = (
            selections.difficulty,
            selections.question_count,
            selections.practice_type,
        );
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        self.practice.questions = Loadable::Loading;
        self.spawn_request(async move {
            let scope = Some(topic.summary.as_str()).filter(|s| !s.is_empty());
            let result = match kind {
                PracticeType::MultipleChoice => tutor
                    .grammar_quiz(&topic.title, difficulty, count, &topic.sub_topics, scope)
                    .await
                    .map(PracticeSet::MultipleChoice),
                PracticeType::ErrorCorrection => tutor
                    .error_correction_quiz(&topic.title, difficulty, count, scope)
                    .await
                    .map(PracticeSet::ErrorCorrection),
                PracticeType::ExplainDifference => tutor
                    .nuance_quiz(&topic.title, count, scope)
                    .await
                    .map(PracticeSet::Nuance),
            };
            Payload::Practice(result)
        });
    }

    fn load_assessment(&mut self) {
        if !self.practice.is_finished() || self.practice.assessment.is_loading() {
            return;
        }
        let Some(topic) = self.nav.selections().grammar_topic.clone() else {
            return;
        };
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        let results = self.practice.results.clone();
        self.practice.assessment = Loadable::Loading;
        self.spawn_request(async move {
            Payload::Assessment(
                tutor
                    .evaluate_quiz_performance(&topic.title, &results)
                    .await,
            )
        });
    }

    fn ask_tutor(&mut self) {
        let Some(topic) = self.nav.selections().grammar_topic.clone() else {
            return;
        };
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        let Some(question) = self.tutor_chat.ask() else {
            return;
        };
        self.spawn_request(async move {
            Payload::TutorReply(tutor.chat_reply(&question, Some(&topic.title)).await)
        });
    }

    fn load_vocab_units(&mut self) {
        let Some(uid) = self.uid() else {
            return;
        };
        let service = self.vocabulary.clone();
        self.custom_vocabulary.units = Loadable::Loading;
        self.spawn_request(async move { Payload::VocabUnits(service.list_units(&uid).await) });
    }

    fn load_grammar_units(&mut self) {
        let Some(uid) = self.uid() else {
            return;
        };
        let service = self.grammar.clone();
        self.custom_grammar.units = Loadable::Loading;
        self.spawn_request(async move { Payload::GrammarUnits(service.list_units(&uid).await) });
    }

    fn load_exam(&mut self) {
        let Some(config) = self.nav.selections().exam_config.clone() else {
            return;
        };
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        self.exam.question = Loadable::Loading;
        self.spawn_request(async move { Payload::Exam(tutor.exam_practice(&config).await) });
    }

    fn suggested_vocabulary(&self) -> Vec<String> {
        self.nav
            .selections()
            .words
            .iter()
            .take(SUGGESTED_VOCABULARY)
            .map(|card| card.headword().to_string())
            .collect()
    }

    fn writing_topic(&self, index: usize) -> String {
        self.catalog
            .writing_topics
            .get(index)
            .cloned()
            .unwrap_or_else(|| "Daily life".to_string())
    }

    fn load_translation_task(&mut self) {
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        let topic = self.writing_topic(self.translation.topic);
        let vocabulary = self.suggested_vocabulary();
        let difficulty = self.nav.selections().difficulty;
        let request = self.translation.begin_task();
        self.spawn_request(async move {
            let result = tutor
                .translation_task(&topic, &vocabulary, difficulty)
                .await;
            Payload::TranslationTask { request, result }
        });
    }

    fn submit_translation(&mut self) {
        let Some(source) = self.translation.task.ready().cloned() else {
            return;
        };
        if self.translation.input.is_empty() || self.translation.feedback.is_loading() {
            return;
        }
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        let attempt = self.translation.input.value().to_string();
        let request = self.translation.request;
        self.translation.feedback = Loadable::Loading;
        self.spawn_request(async move {
            let result = tutor.evaluate_translation(&source, &attempt).await;
            Payload::TranslationFeedback { request, result }
        });
    }

    fn load_writing_task(&mut self) {
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        let mode = self.writing.mode;
        let topic = self.writing_topic(self.writing.topic);
        let difficulty = self.nav.selections().difficulty;
        let request = self.writing.begin_task();
        self.spawn_request(async move {
            let result = tutor.writing_task(mode, &topic, difficulty).await;
            Payload::WritingTask { request, result }
        });
    }

    fn submit_writing(&mut self) {
        let Some(task) = self.writing.task.ready().cloned() else {
            return;
        };
        if self.writing.input.is_empty() || self.writing.feedback.is_loading() {
            return;
        }
        let Some(tutor) = self.tutor_or_report() else {
            return;
        };
        let work = self.writing.input.value().to_string();
        let request = self.writing.request;
        self.writing.feedback = Loadable::Loading;
        self.spawn_request(async move {
            let result = tutor.evaluate_writing(&task, &work).await;
            Payload::WritingFeedback { request, result }
        });
    }

    /// Load what the current room shows: its conversation, the people to
    /// message, or the open direct room
    fn open_chat_room(&mut self) {
        let Some(uid) = self.uid() else {
            return;
        };
        let room = self.community.room;
        let service = self.chat.clone();
        match room {
            ChatRoom::Direct if self.community.partner.is_some() => self.fetch_chat_messages(),
            ChatRoom::Direct => {
                self.community.people = Loadable::Loading;
                self.spawn_request(async move {
                    Payload::ChatPeople(service.available_users(&uid).await)
                });
            }
            ChatRoom::Community | ChatRoom::Assistant => {
                self.community.conversation = Loadable::Loading;
                self.spawn_request(async move {
                    let result = if room == ChatRoom::Community {
                        service.get_or_create_community_chat(&uid).await
                    } else {
                        service.get_or_create_ai_chat(&uid).await
                    };
                    Payload::ChatRoom { room, result }
                });
            }
        }
    }

    fn switch_chat_room(&mut self) {
        self.community.switch_room();
        self.open_chat_room();
    }

    fn fetch_chat_messages(&mut self) {
        let Some(channel_id) = self.community.channel_id().map(String::from) else {
            return;
        };
        let direct = self.community.room == ChatRoom::Direct;
        let service = self.chat.clone();
        self.community.fetching = true;
        self.community.last_poll_tick = self.tick_counter;
        self.spawn_request(async move {
            let result = if direct {
                service.list_dm_messages(&channel_id).await
            } else {
                service.list_messages(&channel_id).await
            };
            Payload::ChatMessages { channel_id, result }
        });
    }

    /// Re-read the open room every poll interval
    fn maybe_poll_chat(&mut self) {
        if self.current_view() != Some(View::CommunityChat) {
            return;
        }
        let every = poll_every_ticks(self.config.chat_poll_interval_secs);
        if self.community.poll_due(self.tick_counter, every) {
            self.fetch_chat_messages();
        }
    }

    fn send_chat_message(&mut self) {
        if self.community.sending || self.community.input.is_empty() {
            return;
        }
        let (Some(user), Some(channel_id)) = (
            self.session.user(),
            self.community.channel_id().map(String::from),
        ) else {
            return;
        };
        let sender = Sender::from_session(user, self.session.profile());
        let service = self.chat.clone();

        if self.community.room == ChatRoom::Direct {
            let content = self.community.input.take();
            self.community.sending = true;
            self.spawn_request(async move {
                let result = match service.send_dm(&channel_id, &sender, &content).await {
                    Ok(_) => service.list_dm_messages(&channel_id).await,
                    Err(e) => Err(e),
                };
                Payload::ChatSent { channel_id, result }
            });
            return;
        }

        let in_assistant_room = self.community.room == ChatRoom::Assistant;

        let tutor = if in_assistant_room || is_mentioning_ai(self.community.input.value()) {
            match self.tutor_or_report() {
                Some(tutor) => Some(tutor),
                // Nobody would ever answer in the assistant room
                None if in_assistant_room => return,
                None => None,
            }
        } else {
            None
        };
        let content = self.community.input.take();

        self.community.sending = true;
        self.spawn_request(async move {
            let sent = match tutor {
                Some(tutor) => service
                    .handle_ai_message(&tutor, &channel_id, &sender, &content, None)
                    .await
                    .map(|_| ()),
                None => service
                    .send_message(&channel_id, &sender, &content)
                    .await
                    .map(|_| ()),
            };
            let result = match sent {
                Ok(()) => service.list_messages(&channel_id).await,
                Err(e) => Err(e),
            };
            Payload::ChatSent { channel_id, result }
        });
    }

    fn save_display_name(&mut self) {
        let Some(uid) = self.uid() else {
            return;
        };
        let Some(panel) = self.profile_panel.as_mut() else {
            return;
        };
        let Some(name) = panel.pending_name() else {
            return;
        };
        panel.saving = true;
        let profiles = self.profiles.clone();
        let tx = self.async_tx.clone();
        tokio::spawn(async move {
            let result = profiles.update_display_name(&uid, &name).await;
            let _ = tx.send(AsyncMessage::ProfileUpdated(result)).await;
        });
    }

    fn submit_auth_form(&mut self) {
        if self.auth_form.submitting {
            return;
        }
        let request = match self.auth_form.validate() {
            Ok(request) => request,
            Err(e) => {
                self.auth_form.error = Some(e.to_string());
                return;
            }
        };
        self.auth_form.submitting = true;
        self.auth_form.error = None;
        self.auth_form.reset_password();

        let auth = self.auth.clone();
        let profiles = self.profiles.clone();
        let tx = self.async_tx.clone();
        tokio::spawn(async move {
            let outcome = match request {
                AuthRequest::SignIn { email, password } => {
                    auth.sign_in(&email, &password).await.map(|_| None)
                }
                AuthRequest::SignUp {
                    email,
                    password,
                    display_name,
                } => match auth.sign_up(&email, &password, &display_name).await {
                    Ok(user) => {
                        let profile = UserProfile::new_learner(&user.uid, &user.email, &display_name);
                        match profiles.create_profile(&profile).await {
                            Ok(()) => Ok(Some(profile)),
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to create profile");
                                Ok(None)
                            }
                        }
                    }
                    Err(e) => Err(e),
                },
            };
            let message = match outcome {
                Ok(Some(profile)) => AsyncMessage::ProfileCreated(profile),
                Ok(None) => return,
                Err(e) => AsyncMessage::AuthFailed(e.to_string()),
            };
            let _ = tx.send(message).await;
        });
    }

    fn sign_out(&mut self) {
        let auth = self.auth.clone();
        let tx = self.async_tx.clone();
        self.status_message = Some("Signing out...".into());
        tokio::spawn(async move {
            if let Err(e) = auth.sign_out().await {
                tracing::error!(error = %e, "sign out failed");
                let _ = tx
                    .send(AsyncMessage::Notice(format!("Sign out failed: {}", first_line(&e))))
                    .await;
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Key handling
    // ─────────────────────────────────────────────────────────────────────────

    pub fn handle_key_event(&mut self, key: KeyEvent) {
        if is_force_quit_key(&key) {
            self.quit();
            return;
        }

        // Help dismisses on any key
        if self.show_help {
            self.show_help = false;
            return;
        }

        // The popup blocks everything else until acknowledged
        if self.error_popup.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q')) {
                self.error_popup = None;
            }
            return;
        }

        match self.session.state() {
            SessionState::Loading => {
                if is_quit_key(&key) {
                    self.quit();
                }
                return;
            }
            SessionState::Unauthenticated => {
                self.handle_auth_key(key);
                return;
            }
            SessionState::Authenticated { .. } => {}
        }

        if self.nav.detail_word().is_some() {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('i')
            ) {
                self.nav.close_detail();
                self.detail = Loadable::Idle;
            }
            return;
        }

        if self.outline.is_some() {
            self.handle_outline_key(key);
            return;
        }

        if self.profile_panel.is_some() {
            self.handle_profile_key(key);
            return;
        }

        if self.is_typing() {
            if key.code == KeyCode::Esc {
                if !self.close_prompt() {
                    self.go_back();
                }
                return;
            }
            self.handle_view_key(key);
            return;
        }

        if key.code == KeyCode::Char('?') {
            self.show_help = true;
            return;
        }

        if is_quit_key(&key) || is_back_key(&key) {
            if self.close_prompt() {
                return;
            }
            if self.nav.current() == Screen::MainMenu {
                if is_quit_key(&key) {
                    self.quit();
                }
            } else {
                self.go_back();
            }
            return;
        }

        self.handle_view_key(key);
    }

    /// Close whatever sits on top of the current screen; `false` if nothing did
    fn close_prompt(&mut self) -> bool {
        match self.current_view() {
            Some(View::CustomVocabularyManager) if self.custom_vocabulary.prompt.is_some() => {
                self.custom_vocabulary.prompt = None;
                self.custom_vocabulary.error = None;
                true
            }
            Some(View::CommunityChat) if self.community.leave_partner() => {
                if self.community.people.ready().is_none() {
                    self.open_chat_room();
                }
                true
            }
            Some(View::CustomGrammarManager) => {
                let manager = &mut self.custom_grammar;
                if manager.prompt.take().is_some() {
                    manager.error = None;
                    true
                } else if manager.reading.take().is_some() {
                    true
                } else if manager.open_unit.take().is_some() {
                    self.lists.remove(&Screen::CustomGrammar);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn handle_auth_key(&mut self, key: KeyEvent) {
        let form = &mut self.auth_form;
        match key.code {
            KeyCode::Esc => self.quit(),
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                form.toggle_mode()
            }
            KeyCode::Enter => self.submit_auth_form(),
            _ => {
                if !form.submitting {
                    form.focused_input().handle_key(&key);
                }
            }
        }
    }

    fn handle_profile_key(&mut self, key: KeyEvent) {
        let current_name = self
            .session
            .profile()
            .map(|p| p.display_name.clone())
            .or_else(|| self.session.user().map(|u| u.label().to_string()))
            .unwrap_or_default();
        let Some(panel) = self.profile_panel.as_mut() else {
            return;
        };
        if let Some(input) = panel.editing.as_mut() {
            match key.code {
                KeyCode::Esc => {
                    panel.cancel();
                }
                KeyCode::Enter => self.save_display_name(),
                _ if !panel.saving => {
                    input.handle_key(&key);
                }
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Char('e') => panel.start_editing(&current_name),
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('p') => self.profile_panel = None,
            _ => {}
        }
    }

    fn handle_outline_key(&mut self, key: KeyEvent) {
        let catalog = self.catalog;
        let topics: Vec<_> = catalog
            .grammar
            .iter()
            .flat_map(|c| c.topics.iter())
            .collect();
        let Some(outline) = self.outline.as_mut() else {
            return;
        };
        outline.total = topics.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => outline.next(),
            KeyCode::Char('k') | KeyCode::Up => outline.previous(),
            KeyCode::Enter => {
                if let Some(topic) = topics.get(outline.selected).map(|t| (*t).clone()) {
                    self.navigate(|nav| nav.open_sidebar_topic(topic));
                    self.outline = None;
                    self.lesson_scroll = 0;
                }
            }
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('t') => self.outline = None,
            _ => {}
        }
    }

    fn handle_view_key(&mut self, key: KeyEvent) {
        let Some(view) = self.current_view() else {
            return;
        };

        if is_list_view(view) && !self.has_overlay() {
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => return self.move_selection(true),
                KeyCode::Char('k') | KeyCode::Up => return self.move_selection(false),
                _ => {}
            }
        }

        match view {
            View::Home => self.handle_home_key(key),
            View::ClassroomList
            | View::GradeList
            | View::UnitList
            | View::ModuleList
            | View::CustomModuleList
            | View::StudyModeMenu
            | View::GrammarCategoryList
            | View::GrammarTopicList
            | View::WritingMenu => self.handle_browse_key(view, key),
            View::CardList => {
                if key.code == KeyCode::Enter {
                    let words = &self.nav.selections().words;
                    if let Some(card) = words.get(self.cursor()) {
                        let word = card.headword().to_string();
                        self.show_word_detail(word);
                    }
                }
            }
            View::FlashcardDeck => self.handle_deck_key(key),
            View::WordQuiz => self.handle_quiz_key(key),
            View::SentencePractice => self.handle_sentence_key(key),
            View::GrammarLesson => self.handle_lesson_key(key),
            View::PracticeSettings => self.handle_settings_key(key),
            View::GrammarPractice => self.handle_practice_key(key),
            View::TutorChat => match key.code {
                KeyCode::Enter => self.ask_tutor(),
                _ => {
                    self.tutor_chat.input.handle_key(&key);
                }
            },
            View::CustomVocabularyManager => self.handle_custom_vocabulary_key(key),
            View::CustomGrammarManager => self.handle_custom_grammar_key(key),
            View::ExamMenu => self.handle_exam_menu_key(key),
            View::ExamPractice => self.handle_exam_key(key),
            View::TranslationPractice => self.handle_translation_key(key),
            View::WritingPractice => self.handle_writing_key(key),
            View::CommunityChat => self.handle_chat_key(key),
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                if let Some((_, screen)) = HOME_MENU.get(self.cursor()) {
                    self.open_home_entry(*screen);
                }
            }
            KeyCode::Char('l') => self.navigate(|nav| nav.select_mode(Screen::GrammarDetail)),
            KeyCode::Char('o') => self.sign_out(),
            KeyCode::Char('p') => self.profile_panel = Some(ProfilePanel::default()),
            _ => {}
        }
    }

    /// Select-and-enter lists
    fn handle_browse_key(&mut self, view: View, key: KeyEvent) {
        let index = self.cursor();
        let selections = self.nav.selections();

        match (view, key.code) {
            (View::ClassroomList, KeyCode::Enter) => {
                if let Some(classroom) = self.catalog.classrooms.get(index).cloned() {
                    self.navigate(|nav| nav.open_classroom(classroom));
                }
            }
            (View::GradeList, KeyCode::Enter) => {
                if let Some(grade) = selections
                    .classroom
                    .as_ref()
                    .and_then(|c| c.grades.get(index))
                    .cloned()
                {
                    self.navigate(|nav| nav.open_grade(grade));
                }
            }
            (View::UnitList, KeyCode::Enter | KeyCode::Char('s')) => {
                let Some(unit) = selections
                    .grade
                    .as_ref()
                    .and_then(|g| g.units.get(index))
                    .cloned()
                else {
                    return;
                };
                if key.code == KeyCode::Enter {
                    self.navigate(|nav| nav.open_unit(unit));
                } else {
                    self.navigate(|nav| nav.study_unit(unit));
                }
            }
            (View::ModuleList, KeyCode::Enter) => {
                if let Some(module) = self.unit_modules().into_iter().nth(index) {
                    self.navigate(|nav| nav.open_module(module));
                }
            }
            (View::ModuleList, KeyCode::Char('s')) => {
                if let Some(unit) = selections.unit.clone() {
                    self.navigate(|nav| nav.study_unit(unit));
                }
            }
            (View::CustomModuleList, KeyCode::Enter) => {
                if let Some(module) = self.custom_modules().into_iter().nth(index) {
                    self.navigate(|nav| nav.open_module(module));
                }
            }
            (View::CustomModuleList, KeyCode::Char('s')) => {
                if let Some(unit) = selections.custom_unit.as_ref().map(|u| u.to_unit()) {
                    self.navigate(|nav| nav.study_unit(unit));
                }
            }
            (View::StudyModeMenu, KeyCode::Enter) => {
                if let Some((_, screen)) = STUDY_MODES.get(index) {
                    let screen = *screen;
                    self.navigate(|nav| nav.enter(screen));
                }
            }
            (View::GrammarCategoryList, KeyCode::Enter) => {
                if let Some(category) = self.catalog.grammar.get(index).cloned() {
                    self.navigate(|nav| nav.choose_grammar_category(category));
                }
            }
            (View::GrammarTopicList, KeyCode::Enter | KeyCode::Char('a')) => {
                let Some(topic) = selections
                    .grammar_category
                    .as_ref()
                    .and_then(|c| c.topics.get(index))
                    .cloned()
                else {
                    return;
                };
                let flow = selections.grammar_flow;
                self.navigate(|nav| match (key.code, flow) {
                    (KeyCode::Char('a'), _) => nav.open_ai_chat(topic),
                    (_, GrammarFlow::Theory) => nav.open_topic_theory(topic),
                    (_, GrammarFlow::Practice) => nav.open_topic_practice(topic),
                });
            }
            (View::WritingMenu, KeyCode::Enter) => {
                if let Some((_, screen)) = WRITING_MODES.get(index) {
                    let screen = *screen;
                    self.navigate(|nav| nav.enter(screen));
                }
            }
            _ => {}
        }
    }

    fn handle_deck_key(&mut self, key: KeyEvent) {
        let total = self.nav.selections().words.len();
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => self.deck.flip(),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::Char('j') | KeyCode::Down => {
                self.deck.next(total)
            }
            KeyCode::Char('h') | KeyCode::Left | KeyCode::Char('k') | KeyCode::Up => {
                self.deck.previous(total)
            }
            KeyCode::Char('i') => {
                if let Some(card) = self.deck.current(&self.nav.selections().words) {
                    let word = card.headword().to_string();
                    self.show_word_detail(word);
                }
            }
            _ => {}
        }
    }

    fn handle_quiz_key(&mut self, key: KeyEvent) {
        let Some(quiz) = self.quiz.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => quiz.move_cursor(true),
            KeyCode::Char('k') | KeyCode::Up => quiz.move_cursor(false),
            KeyCode::Char(c @ '1'..='9') => {
                quiz.choose(c as usize - '1' as usize);
            }
            KeyCode::Enter => {
                if quiz.chosen.is_some() {
                    quiz.advance();
                } else {
                    quiz.choose(quiz.cursor);
                }
            }
            KeyCode::Char('n') => quiz.advance(),
            KeyCode::Char('r') => self.prepare_screen(),
            KeyCode::Char('i') => {
                if let Some(word) = quiz.question().map(|q| q.word.clone()) {
                    self.show_word_detail(word);
                }
            }
            _ => {}
        }
    }

    fn handle_sentence_key(&mut self, key: KeyEvent) {
        let total = self.nav.selections().words.len();
        match key.code {
            KeyCode::Enter => self.check_sentence(),
            KeyCode::Tab => {
                self.sentence.next_word(total);
                self.load_sentence_task();
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.load_sentence_task()
            }
            _ => {
                self.sentence.input.handle_key(&key);
            }
        }
    }

    fn handle_lesson_key(&mut self, key: KeyEvent) {
        let Some(topic) = self.nav.selections().grammar_topic.clone() else {
            return;
        };
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.lesson_scroll = self.lesson_scroll.saturating_add(1)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.lesson_scroll = self.lesson_scroll.saturating_sub(1)
            }
            KeyCode::PageDown => self.lesson_scroll = self.lesson_scroll.saturating_add(10),
            KeyCode::PageUp => self.lesson_scroll = self.lesson_scroll.saturating_sub(10),
            KeyCode::Char('p') => self.navigate(|nav| nav.start_practice_from_detail(topic)),
            KeyCode::Char('a') => self.navigate(|nav| nav.open_ai_chat(topic)),
            KeyCode::Char('c') => self.navigate(|nav| nav.enter(Screen::GrammarDashboard)),
            KeyCode::Char('t') => self.open_outline(),
            _ => {}
        }
    }

    fn open_outline(&mut self) {
        let current = self.nav.selections().grammar_topic.as_ref().map(|t| t.id.clone());
        let topics: Vec<_> = self
            .catalog
            .grammar
            .iter()
            .flat_map(|c| c.topics.iter())
            .collect();
        let mut outline = ListState::new(topics.len());
        outline.selected = current
            .and_then(|id| topics.iter().position(|t| t.id == id))
            .unwrap_or(0);
        self.outline = Some(outline);
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => self.settings.move_focus(true),
            KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => {
                self.settings.move_focus(false)
            }
            KeyCode::Char('h') | KeyCode::Left => self.settings.change(false),
            KeyCode::Char('l') | KeyCode::Right => self.settings.change(true),
            KeyCode::Enter => {
                if self.settings.focused() == SettingsField::Start {
                    let form = self.settings.clone();
                    self.navigate(|nav| {
                        nav.start_practice(form.difficulty, form.count, form.practice_type)
                    });
                } else {
                    self.settings.change(true);
                }
            }
            _ => {}
        }
    }

    fn handle_practice_key(&mut self, key: KeyEvent) {
        if self.practice.is_finished() {
            match key.code {
                KeyCode::Char('e') => self.load_assessment(),
                KeyCode::Char('r') => self.prepare_screen(),
                _ => {}
            }
            return;
        }
        if matches!(self.practice.questions, Loadable::Failed(_)) {
            if key.code == KeyCode::Char('r') {
                self.load_practice();
            }
            return;
        }

        match key.code {
            KeyCode::Enter => {
                if self.practice.answered.is_some() {
                    self.practice.advance();
                } else {
                    self.practice.submit();
                }
            }
            KeyCode::Char('n') if self.practice.answered.is_some() => self.practice.advance(),
            KeyCode::Char('j') | KeyCode::Down if !self.practice.expects_text() => {
                self.practice.move_cursor(true)
            }
            KeyCode::Char('k') | KeyCode::Up if !self.practice.expects_text() => {
                self.practice.move_cursor(false)
            }
            _ => {
                if self.practice.expects_text() {
                    self.practice.input.handle_key(&key);
                }
            }
        }
    }

    fn handle_custom_vocabulary_key(&mut self, key: KeyEvent) {
        if self.custom_vocabulary.busy {
            return;
        }
        if self.custom_vocabulary.prompt.is_some() {
            self.handle_vocab_prompt_key(key);
            return;
        }

        let index = self.cursor();
        let unit = self.custom_vocabulary.unit(index).cloned();
        match key.code {
            KeyCode::Char('r') => self.load_vocab_units(),
            KeyCode::Char('n') => {
                self.custom_vocabulary.prompt = Some(VocabPrompt::NewUnit(PairPrompt::default()))
            }
            KeyCode::Enter => {
                let Some(unit) = unit else {
                    return;
                };
                let name = unit.name.clone();
                let mut opened = false;
                self.navigate(|nav| opened = nav.open_custom_unit(unit));
                if !opened {
                    self.status_message =
                        Some(format!("'{name}' has no words yet. Add a module first."));
                }
            }
            KeyCode::Char('m') => {
                if let Some(unit) = unit {
                    self.custom_vocabulary.prompt = Some(VocabPrompt::ManualModule {
                        unit_id: unit.id,
                        fields: PairPrompt::long_form(),
                    });
                }
            }
            KeyCode::Char('g') => {
                if let Some(unit) = unit {
                    self.custom_vocabulary.prompt = Some(VocabPrompt::AiModule {
                        unit_id: unit.id,
                        fields: PairPrompt::default(),
                    });
                }
            }
            KeyCode::Char('d') => {
                if let Some(unit) = unit {
                    self.custom_vocabulary.prompt = Some(VocabPrompt::ConfirmDelete {
                        unit_id: unit.id,
                        name: unit.name,
                    });
                }
            }
            _ => {}
        }
    }

    fn handle_vocab_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.custom_vocabulary.prompt.as_mut() else {
            return;
        };
        match prompt {
            VocabPrompt::ConfirmDelete { .. } => {
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Enter) {
                    self.submit_vocab_prompt();
                } else {
                    self.custom_vocabulary.prompt = None;
                }
            }
            VocabPrompt::NewUnit(fields)
            | VocabPrompt::ManualModule { fields, .. }
            | VocabPrompt::AiModule { fields, .. } => match key.code {
                KeyCode::Tab | KeyCode::BackTab => fields.toggle_focus(),
                KeyCode::Enter => self.submit_vocab_prompt(),
                _ => {
                    fields.focused().handle_key(&key);
                }
            },
        }
    }

    fn submit_vocab_prompt(&mut self) {
        let Some(uid) = self.uid() else {
            return;
        };
        let service = self.vocabulary.clone();
        let manager = &mut self.custom_vocabulary;
        let Some(prompt) = manager.prompt.as_ref() else {
            return;
        };

        match prompt {
            VocabPrompt::NewUnit(fields) => {
                let name = fields.first.value().to_string();
                let description = fields.second.value().to_string();
                manager.busy = true;
                self.spawn_request(async move {
                    Payload::VocabChanged(
                        service
                            .create_unit(&uid, &name, &description)
                            .await
                            .map(|unit| format!("Created unit '{}'", unit.name)),
                    )
                });
            }
            VocabPrompt::ManualModule { unit_id, fields } => {
                let cards = match parse_manual_entries(fields.second.value()) {
                    Ok(cards) => cards,
                    Err(e) => {
                        manager.error = Some(e.to_string());
                        return;
                    }
                };
                let name = module_name(fields.first.value());
                let unit_id = unit_id.clone();
                manager.busy = true;
                self.spawn_request(async move {
                    Payload::VocabChanged(
                        service
                            .add_manual_module(&uid, &unit_id, &name, cards)
                            .await
                            .map(|m| format!("Added '{}' ({} words)", m.name, m.words.len())),
                    )
                });
            }
            VocabPrompt::AiModule { unit_id, fields } => {
                let words = parse_word_list(fields.second.value());
                if words.is_empty() {
                    manager.error = Some("List the words to generate, separated by commas".into());
                    return;
                }
                let name = module_name(fields.first.value());
                let unit_id = unit_id.clone();
                let Some(tutor) = self.tutor_or_report() else {
                    return;
                };
                self.custom_vocabulary.busy = true;
                self.status_message = Some("Generating flashcards...".into());
                self.spawn_request(async move {
                    Payload::VocabChanged(
                        service
                            .generate_ai_module(&tutor, &uid, &unit_id, &name, &words)
                            .await
                            .map(|m| format!("Generated '{}' ({} words)", m.name, m.words.len())),
                    )
                });
            }
            VocabPrompt::ConfirmDelete { unit_id, name } => {
                let (unit_id, name) = (unit_id.clone(), name.clone());
                manager.busy = true;
                self.spawn_request(async move {
                    Payload::VocabChanged(
                        service
                            .delete_unit(&uid, &unit_id)
                            .await
                            .map(|()| format!("Deleted '{name}'")),
                    )
                });
            }
        }
    }

    fn handle_custom_grammar_key(&mut self, key: KeyEvent) {
        if self.custom_grammar.busy {
            return;
        }
        if self.custom_grammar.prompt.is_some() {
            self.handle_grammar_prompt_key(key);
            return;
        }
        if self.custom_grammar.reading.is_some() {
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    self.custom_grammar.scroll = self.custom_grammar.scroll.saturating_add(1)
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    self.custom_grammar.scroll = self.custom_grammar.scroll.saturating_sub(1)
                }
                _ => {}
            }
            return;
        }

        let index = self.cursor();
        let manager = &mut self.custom_grammar;
        match (manager.opened().cloned(), key.code) {
            (_, KeyCode::Char('r')) => self.load_grammar_units(),
            (None, KeyCode::Char('n')) => {
                manager.prompt = Some(GrammarPrompt::NewUnit(PairPrompt::default()))
            }
            (None, KeyCode::Enter) => {
                if let Some(unit) = manager.unit(index) {
                    manager.open_unit = Some(unit.id.clone());
                    self.lists.remove(&Screen::CustomGrammar);
                }
            }
            (None, KeyCode::Char('d')) => {
                if let Some(unit) = manager.unit(index).cloned() {
                    manager.prompt = Some(GrammarPrompt::ConfirmDelete {
                        unit_id: unit.id,
                        name: unit.name,
                    });
                }
            }
            (Some(unit), KeyCode::Enter) => {
                if let Some(lesson) = unit.lessons.get(index) {
                    manager.reading = Some(lesson.clone());
                    manager.scroll = 0;
                }
            }
            (Some(unit), KeyCode::Char('m')) => {
                manager.prompt = Some(GrammarPrompt::ManualLesson {
                    unit_id: unit.id,
                    fields: PairPrompt::long_form(),
                })
            }
            (Some(unit), KeyCode::Char('g')) => {
                manager.prompt = Some(GrammarPrompt::AiLesson {
                    unit_id: unit.id,
                    topic: TextInput::new(),
                    level: Default::default(),
                })
            }
            (Some(unit), KeyCode::Char('d')) => {
                let Some(lesson) = unit.lessons.get(index).cloned() else {
                    return;
                };
                let Some(uid) = self.uid() else {
                    return;
                };
                let service = self.grammar.clone();
                self.custom_grammar.busy = true;
                self.spawn_request(async move {
                    Payload::GrammarChanged(
                        service
                            .delete_lesson(&uid, &unit.id, &lesson.id)
                            .await
                            .map(|()| format!("Deleted lesson '{}'", lesson.title)),
                    )
                });
            }
            _ => {}
        }
    }

    fn handle_grammar_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.custom_grammar.prompt.as_mut() else {
            return;
        };
        match prompt {
            GrammarPrompt::ConfirmDelete { .. } => {
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Enter) {
                    self.submit_grammar_prompt();
                } else {
                    self.custom_grammar.prompt = None;
                }
            }
            GrammarPrompt::NewUnit(fields) | GrammarPrompt::ManualLesson { fields, .. } => {
                match key.code {
                    KeyCode::Tab | KeyCode::BackTab => fields.toggle_focus(),
                    KeyCode::Enter => self.submit_grammar_prompt(),
                    _ => {
                        fields.focused().handle_key(&key);
                    }
                }
            }
            GrammarPrompt::AiLesson { topic, level, .. } => match key.code {
                KeyCode::Tab => *level = next_level(*level),
                KeyCode::Enter => self.submit_grammar_prompt(),
                _ => {
                    topic.handle_key(&key);
                }
            },
        }
    }

    fn submit_grammar_prompt(&mut self) {
        let Some(uid) = self.uid() else {
            return;
        };
        let service = self.grammar.clone();
        let Some(prompt) = self.custom_grammar.prompt.as_ref() else {
            return;
        };

        match prompt {
            GrammarPrompt::NewUnit(fields) => {
                let name = fields.first.value().to_string();
                let description = fields.second.value().to_string();
                self.custom_grammar.busy = true;
                self.spawn_request(async move {
                    Payload::GrammarChanged(
                        service
                            .create_unit(&uid, &name, &description)
                            .await
                            .map(|unit| format!("Created unit '{}'", unit.name)),
                    )
                });
            }
            GrammarPrompt::ManualLesson { unit_id, fields } => {
                let draft = crate::services::custom_grammar::LessonDraft {
                    title: fields.first.value().trim().to_string(),
                    content: fields.second.value().to_string(),
                    ..Default::default()
                };
                let unit_id = unit_id.clone();
                self.custom_grammar.busy = true;
                self.spawn_request(async move {
                    Payload::GrammarChanged(
                        service
                            .add_manual_lesson(&uid, &unit_id, draft)
                            .await
                            .map(|l| format!("Added lesson '{}'", l.title)),
                    )
                });
            }
            GrammarPrompt::AiLesson {
                unit_id,
                topic,
                level,
            } => {
                if topic.is_empty() {
                    self.custom_grammar.error = Some("Enter a topic for the lesson".into());
                    return;
                }
                let (unit_id, topic, level) = (unit_id.clone(), topic.value().trim().to_string(), *level);
                let Some(tutor) = self.tutor_or_report() else {
                    return;
                };
                self.custom_grammar.busy = true;
                self.status_message = Some("Writing the lesson...".into());
                self.spawn_request(async move {
                    Payload::GrammarChanged(
                        service
                            .generate_ai_lesson(&tutor, &uid, &unit_id, &topic, level)
                            .await
                            .map(|l| format!("Generated lesson '{}'", l.title)),
                    )
                });
            }
            GrammarPrompt::ConfirmDelete { unit_id, name } => {
                let (unit_id, name) = (unit_id.clone(), name.clone());
                self.custom_grammar.busy = true;
                self.spawn_request(async move {
                    Payload::GrammarChanged(
                        service
                            .delete_unit(&uid, &unit_id)
                            .await
                            .map(|()| format!("Deleted '{name}'")),
                    )
                });
            }
        }
    }

    fn handle_exam_menu_key(&mut self, key: KeyEvent) {
        let topic_count = self.catalog.exam_topics.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => self.exam_form.move_focus(true),
            KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => {
                self.exam_form.move_focus(false)
            }
            KeyCode::Char('h') | KeyCode::Left => self.exam_form.change(false, topic_count),
            KeyCode::Char('l') | KeyCode::Right => self.exam_form.change(true, topic_count),
            KeyCode::Enter => {
                if self.exam_form.focused() == ExamField::Start {
                    let config = self.exam_form.config(&self.catalog.exam_topics);
                    self.navigate(|nav| nav.start_exam(config));
                } else {
                    self.exam_form.change(true, topic_count);
                }
            }
            _ => {}
        }
    }

    fn handle_exam_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.exam.move_cursor(true),
            KeyCode::Char('k') | KeyCode::Up => self.exam.move_cursor(false),
            KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => self.exam.move_sub(true),
            KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => self.exam.move_sub(false),
            KeyCode::Enter => self.exam.pick(),
            KeyCode::Char('s') => self.exam.revealed = true,
            KeyCode::Char('J') | KeyCode::PageDown => {
                self.exam.scroll = self.exam.scroll.saturating_add(3)
            }
            KeyCode::Char('K') | KeyCode::PageUp => {
                self.exam.scroll = self.exam.scroll.saturating_sub(3)
            }
            KeyCode::Char('r') => {
                self.exam = ExamSession::default();
                self.load_exam();
            }
            _ => {}
        }
    }

    fn handle_translation_key(&mut self, key: KeyEvent) {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter if !key.modifiers.contains(KeyModifiers::ALT) => {
                self.submit_translation()
            }
            KeyCode::Char('n') if control => self.load_translation_task(),
            KeyCode::Tab => {
                self.translation
                    .next_topic(self.catalog.writing_topics.len());
                self.load_translation_task();
            }
            _ => {
                self.translation.input.handle_key(&key);
            }
        }
    }

    fn handle_writing_key(&mut self, key: KeyEvent) {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter if !key.modifiers.contains(KeyModifiers::ALT) => self.submit_writing(),
            KeyCode::Char('n') if control => self.load_writing_task(),
            KeyCode::Tab => {
                self.writing.next_topic(self.catalog.writing_topics.len());
                self.load_writing_task();
            }
            KeyCode::BackTab => {
                self.writing.next_mode();
                self.load_writing_task();
            }
            _ => {
                self.writing.input.handle_key(&key);
            }
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        if self.community.choosing_partner() {
            match key.code {
                KeyCode::Char('j') | KeyCode::Down => self.community.move_people_cursor(true),
                KeyCode::Char('k') | KeyCode::Up => self.community.move_people_cursor(false),
                KeyCode::Enter => {
                    if let Some(uid) = self.uid() {
                        if self.community.pick_partner(&uid) {
                            self.fetch_chat_messages();
                        }
                    }
                }
                KeyCode::Tab => self.switch_chat_room(),
                KeyCode::Char('r') if control => self.open_chat_room(),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Enter => self.send_chat_message(),
            KeyCode::Tab => self.switch_chat_room(),
            KeyCode::Char('r') if control => self.fetch_chat_messages(),
            _ => {
                self.community.input.handle_key(&key);
            }
        }
    }
}

/// Views whose content is a selectable list
fn is_list_view(view: View) -> bool {
    matches!(
        view,
        View::Home
            | View::ClassroomList
            | View::GradeList
            | View::UnitList
            | View::ModuleList
            | View::CustomModuleList
            | View::StudyModeMenu
            | View::CardList
            | View::GrammarCategoryList
            | View::GrammarTopicList
            | View::WritingMenu
            | View::CustomVocabularyManager
            | View::CustomGrammarManager
    )
}

fn module_name(typed: &str) -> String {
    match typed.trim() {
        "" => "New module".to_string(),
        name => name.to_string(),
    }
}

/// Ticks between chat polls
fn poll_every_ticks(interval_secs: u64) -> u64 {
    interval_secs.saturating_mul(1000) / (TICK_RATE.as_millis() as u64).max(1)
}

/// First line of an error, for the status bar
fn first_line(e: &AppError) -> String {
    e.to_string().lines().next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockTextGenerator;
    use crate::auth::test_utils::learner;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_on(store: Arc<MemoryStore>, tutor: Option<Tutor>) -> App {
        let services = Services {
            auth: Arc::new(FirebaseAuth::ephemeral("test-key")),
            store,
            tutor,
        };
        App::with_services(Config::default(), services).unwrap()
    }

    fn app_with(tutor: Option<Tutor>) -> App {
        app_on(Arc::new(MemoryStore::new()), tutor)
    }

    /// Next screen response, skipping what the session gate reports
    async fn next_response(app: &mut App) -> AsyncMessage {
        loop {
            match app.async_rx.recv().await {
                Some(AsyncMessage::Session(_)) => continue,
                Some(msg) => return msg,
                None => panic!("channel closed"),
            }
        }
    }

    /// Apply responses until `done` holds
    async fn settle_until(app: &mut App, done: impl Fn(&App) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(&*app) {
                let msg = next_response(app).await;
                app.handle_async_message(msg);
            }
        })
        .await
        .expect("responses never settled");
    }

    fn signed_in(tutor: Option<Tutor>) -> App {
        let mut app = app_with(tutor);
        app.handle_async_message(AsyncMessage::Session(SessionState::Authenticated {
            user: learner(),
            profile: None,
        }));
        app
    }

    fn text_tutor(answer: &'static str) -> Tutor {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate().returning(move |_| Ok(answer.into()));
        Tutor::new(Arc::new(mock))
    }

    fn room_ready(app: &App) -> bool {
        app.community.conversation_id().is_some() && !app.community.fetching
    }

    #[tokio::test]
    async fn test_starts_loading_and_blocks_keys() {
        let mut app = app_with(None);
        assert!(app.session.is_loading());
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::MainMenu);
    }

    #[tokio::test]
    async fn test_quiz_screens_have_words_from_the_start() {
        let app = app_with(None);
        assert!(!app.nav.selections().words.is_empty());
    }

    #[tokio::test]
    async fn test_browse_to_a_module_and_back() {
        let mut app = signed_in(None);

        app.handle_key_event(key(KeyCode::Enter)); // Vocabulary
        assert_eq!(app.nav.current(), Screen::ClassroomSelection);
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::GradeSelection);
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::UnitSelection);
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::ModuleSelection);

        let modules = app.unit_modules();
        assert!(!modules.is_empty());
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::FlashcardMenu);
        assert_eq!(app.nav.selections().words, modules[0].words);

        app.handle_key_event(key(KeyCode::Esc));
        app.handle_key_event(key(KeyCode::Char('q')));
        assert_eq!(app.nav.current(), Screen::UnitSelection);
        assert!(app.running);
    }

    #[tokio::test]
    async fn test_quit_only_from_home() {
        let mut app = signed_in(None);
        app.handle_key_event(key(KeyCode::Char('q')));
        assert!(!app.running);
    }

    #[tokio::test]
    async fn test_grammar_lessons_entry_primes_theory_flow() {
        let mut app = signed_in(None);
        app.handle_key_event(key(KeyCode::Down));
        app.handle_key_event(key(KeyCode::Down)); // Grammar practice
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.selections().grammar_flow, GrammarFlow::Practice);
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::GrammarPracticeSelection);

        app.handle_key_event(key(KeyCode::Esc));
        app.handle_key_event(key(KeyCode::Esc));
        app.handle_key_event(key(KeyCode::Up)); // Grammar lessons
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::GrammarDashboard);
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::GrammarTheorySelection);
    }

    #[tokio::test]
    async fn test_lesson_shortcut_without_topic_shows_placeholder() {
        let mut app = signed_in(None);
        app.handle_key_event(key(KeyCode::Char('l')));
        assert_eq!(app.nav.current(), Screen::GrammarDetail);
        assert_eq!(
            app.resolution(),
            Resolution::Placeholder(router::NO_LESSON_SELECTED)
        );
    }

    #[tokio::test]
    async fn test_stale_results_are_dropped() {
        let mut app = signed_in(None);
        app.handle_key_event(key(KeyCode::Enter));
        let token = app.nav.request_token();
        app.handle_key_event(key(KeyCode::Esc));

        app.custom_vocabulary.units = Loadable::Loading;
        app.handle_async_message(AsyncMessage::Response {
            token,
            payload: Payload::VocabUnits(Ok(vec![])),
        });
        assert!(app.custom_vocabulary.units.is_loading());
    }

    #[tokio::test]
    async fn test_current_results_are_applied() {
        let mut app = signed_in(None);
        let token = app.nav.request_token();
        app.handle_async_message(AsyncMessage::Response {
            token,
            payload: Payload::VocabUnits(Ok(vec![])),
        });
        assert_eq!(app.custom_vocabulary.units, Loadable::Ready(vec![]));
    }

    #[tokio::test]
    async fn test_sign_out_returns_home_and_drops_user_state() {
        let mut app = signed_in(None);
        app.handle_key_event(key(KeyCode::Enter));
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.history().len(), 3);

        app.handle_async_message(AsyncMessage::Session(SessionState::Unauthenticated));
        assert_eq!(app.nav.history(), &[Screen::MainMenu]);
        assert_eq!(app.status_message.as_deref(), Some("Signed out"));
    }

    #[tokio::test]
    async fn test_auth_form_validation_error_stays_local() {
        let mut app = app_with(None);
        app.handle_async_message(AsyncMessage::Session(SessionState::Unauthenticated));
        app.handle_key_event(key(KeyCode::Enter));
        assert!(app.auth_form.error.is_some());
        assert!(!app.auth_form.submitting);
    }

    #[tokio::test]
    async fn test_ai_features_report_missing_key() {
        let mut app = signed_in(None);
        for _ in 0..4 {
            app.handle_key_event(key(KeyCode::Down));
        }
        app.handle_key_event(key(KeyCode::Enter)); // Writing & translation
        app.handle_key_event(key(KeyCode::Enter)); // Translation
        assert_eq!(app.nav.current(), Screen::TranslationPractice);
        let popup = app.error_popup.as_ref().unwrap();
        assert!(popup.message.contains("gemini-key"));
    }

    #[tokio::test]
    async fn test_practice_loads_from_the_tutor() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate().returning(|_| {
            Ok(r#"[{"question":"She ___ tea.","options":["drink","drinks"],"correctAnswer":"drinks","explanation":"3rd person"}]"#.into())
        });
        let mut app = signed_in(Some(Tutor::new(Arc::new(mock))));

        let category = app.catalog.grammar[0].clone();
        let topic = category.topics[0].clone();
        app.navigate(|nav| {
            nav.select_mode(Screen::GrammarCategorySelection);
            nav.choose_grammar_category(category);
            nav.open_topic_practice(topic);
        });
        assert_eq!(app.nav.current(), Screen::GrammarDifficultySelection);

        for _ in 0..3 {
            app.handle_key_event(key(KeyCode::Down));
        }
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::GrammarPracticeMode);
        assert!(app.practice.questions.is_loading());

        let msg = next_response(&mut app).await;
        app.handle_async_message(msg);
        assert_eq!(app.practice.total(), 1);
    }

    #[tokio::test]
    async fn test_empty_custom_unit_is_not_opened() {
        let mut app = signed_in(None);
        for _ in 0..5 {
            app.handle_key_event(key(KeyCode::Down));
        }
        app.handle_key_event(key(KeyCode::Enter)); // My vocabulary
        assert_eq!(app.nav.current(), Screen::CustomVocabulary);
        let msg = next_response(&mut app).await;
        app.handle_async_message(msg);

        app.custom_vocabulary.units = Loadable::Ready(vec![CustomVocabUnit {
            id: "v1".into(),
            uid: "uid-1".into(),
            name: "Travel".into(),
            description: String::new(),
            modules: vec![],
            created_at: 0,
            updated_at: 0,
        }]);
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.nav.current(), Screen::CustomVocabulary);
        assert!(app.status_message.unwrap().contains("no words"));
    }

    #[tokio::test]
    async fn test_switching_rooms_mid_send_allows_the_next_send() {
        let mut app = signed_in(None);
        app.open_home_entry(Screen::CommunityChat);
        settle_until(&mut app, room_ready).await;

        app.community.input.set("first");
        app.handle_key_event(key(KeyCode::Enter));
        assert!(app.community.sending);

        app.handle_key_event(key(KeyCode::Tab));
        assert_eq!(app.community.room, ChatRoom::Assistant);
        assert!(!app.community.sending);
        app.handle_key_event(key(KeyCode::Tab));
        app.handle_key_event(key(KeyCode::Tab));
        assert_eq!(app.community.room, ChatRoom::Community);
        settle_until(&mut app, room_ready).await;

        app.community.input.set("second");
        app.handle_key_event(key(KeyCode::Enter));
        assert!(app.community.sending);
        settle_until(&mut app, |app| {
            app.community.messages.iter().any(|m| m.content == "second")
        })
        .await;
        assert!(!app.community.sending);
    }

    #[tokio::test]
    async fn test_chat_poll_resumes_after_leaving_mid_fetch() {
        let mut app = signed_in(None);
        app.open_home_entry(Screen::CommunityChat);
        settle_until(&mut app, |app| app.community.conversation_id().is_some()).await;
        assert!(app.community.fetching);

        app.go_back();
        app.open_home_entry(Screen::CommunityChat);
        assert!(!app.community.fetching);
        settle_until(&mut app, room_ready).await;

        let every = poll_every_ticks(app.config.chat_poll_interval_secs);
        app.tick_counter += every;
        app.maybe_poll_chat();
        assert!(app.community.fetching);
    }

    #[tokio::test]
    async fn test_direct_messages_from_the_people_list() {
        let store = Arc::new(MemoryStore::new());
        DocumentProfileStore::new(store.clone())
            .create_profile(&UserProfile::new_learner("friend-1", "minh@example.com", "Minh"))
            .await
            .unwrap();
        let mut app = app_on(store, None);
        app.handle_async_message(AsyncMessage::Session(SessionState::Authenticated {
            user: learner(),
            profile: None,
        }));

        app.open_home_entry(Screen::CommunityChat);
        app.handle_key_event(key(KeyCode::Tab));
        app.handle_key_event(key(KeyCode::Tab));
        assert!(app.community.choosing_partner());
        settle_until(&mut app, |app| app.community.people.ready().is_some()).await;
        let names: Vec<_> = app
            .community
            .people
            .ready()
            .unwrap()
            .iter()
            .map(|p| p.display_name.clone())
            .collect();
        assert_eq!(names, ["Minh"]);

        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.community.partner.as_ref().unwrap().name, "Minh");
        app.community.input.set("hi Minh");
        app.handle_key_event(key(KeyCode::Enter));
        settle_until(&mut app, |app| app.community.messages.len() == 1).await;
        assert_eq!(app.community.messages[0].content, "hi Minh");

        app.handle_key_event(key(KeyCode::Esc));
        assert!(app.community.choosing_partner());
        assert_eq!(app.nav.current(), Screen::CommunityChat);
    }

    #[tokio::test]
    async fn test_translation_reloads_after_leaving_mid_load() {
        let mut app = signed_in(Some(text_tutor("I like reading books.")));
        for _ in 0..4 {
            app.handle_key_event(key(KeyCode::Down));
        }
        app.handle_key_event(key(KeyCode::Enter)); // Writing & translation
        app.handle_key_event(key(KeyCode::Enter)); // Translation
        assert!(app.translation.task.is_loading());

        app.handle_key_event(key(KeyCode::Esc));
        assert_eq!(app.nav.current(), Screen::WritingTranslationMenu);
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.translation.request, 2);
        settle_until(&mut app, |app| !app.translation.task.is_loading()).await;
        assert_eq!(
            app.translation.task.ready().map(String::as_str),
            Some("I like reading books.")
        );

        // Feedback lost with the old visit does not lock the screen
        app.translation.feedback = Loadable::Loading;
        app.handle_key_event(key(KeyCode::Esc));
        app.handle_key_event(key(KeyCode::Enter));
        assert_eq!(app.translation.feedback, Loadable::Idle);
        assert_eq!(app.translation.request, 2, "a ready task is kept");
    }

    #[tokio::test]
    async fn test_answer_for_an_older_task_is_ignored() {
        let mut app = signed_in(Some(text_tutor("Good morning.")));
        app.navigate(|nav| {
            nav.select_mode(Screen::WritingTranslationMenu);
            nav.select_mode(Screen::TranslationPractice);
        });
        settle_until(&mut app, |app| !app.translation.task.is_loading()).await;

        app.handle_key_event(key(KeyCode::Tab));
        assert!(app.translation.task.is_loading());
        app.handle_async_message(AsyncMessage::Response {
            token: app.nav.request_token(),
            payload: Payload::TranslationTask {
                request: app.translation.request - 1,
                result: Ok("stale".into()),
            },
        });
        assert!(app.translation.task.is_loading());
    }

    #[tokio::test]
    async fn test_profile_overlay_saves_display_name() {
        let store = Arc::new(MemoryStore::new());
        let profile = UserProfile::new_learner(&learner().uid, &learner().email, "Lan");
        DocumentProfileStore::new(store.clone())
            .create_profile(&profile)
            .await
            .unwrap();
        let mut app = app_on(store, None);
        app.handle_async_message(AsyncMessage::Session(SessionState::Authenticated {
            user: learner(),
            profile: Some(profile),
        }));

        app.handle_key_event(key(KeyCode::Char('p')));
        app.handle_key_event(key(KeyCode::Char('e')));
        let panel = app.profile_panel.as_mut().unwrap();
        let input = panel.editing.as_mut().unwrap();
        assert_eq!(input.value(), "Lan");
        input.set("Lan Anh");

        app.handle_key_event(key(KeyCode::Enter));
        assert!(app.profile_panel.as_ref().unwrap().saving);
        let msg = next_response(&mut app).await;
        app.handle_async_message(msg);
        assert_eq!(app.session.profile().unwrap().display_name, "Lan Anh");
        assert!(app.profile_panel.as_ref().unwrap().editing.is_none());

        app.handle_key_event(key(KeyCode::Esc));
        assert!(app.profile_panel.is_none());
        assert_eq!(app.nav.current(), Screen::MainMenu);
    }

    #[test]
    fn test_poll_interval_in_ticks() {
        assert_eq!(poll_every_ticks(5), 20);
        assert_eq!(poll_every_ticks(u64::MAX), u64::MAX / 250);
    }
}
