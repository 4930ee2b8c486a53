//! Main UI renderer

use once_cell::sync::Lazy;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState as ListView, Paragraph, Wrap};
use regex::Regex;

/// Regex patterns for stripping HTML from markdown
static HTML_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static HTML_COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!--[\s\S]*?-->").unwrap());

/// Strip HTML tags and comments from markdown content
/// Generated lessons sometimes carry `<br>` or `<b>` the terminal can't show
fn strip_html(input: &str) -> String {
    let without_comments = HTML_COMMENT_REGEX.replace_all(input, "");
    HTML_TAG_REGEX
        .replace_all(&without_comments, "")
        .to_string()
}

/// Convert markdown string to styled ratatui Text
fn markdown_to_text(input: &str) -> Text<'static> {
    let cleaned = strip_html(input);

    if cleaned.trim().is_empty() {
        return Text::raw("(no content)");
    }

    let lines: Vec<Line<'static>> = cleaned.lines().map(parse_markdown_line).collect();

    Text::from(lines)
}

/// Parse a single line of markdown into a styled Line
fn parse_markdown_line(line: &str) -> Line<'static> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return Line::from("");
    }

    // Horizontal rule (---, ___, ***)
    if is_horizontal_rule(trimmed) {
        return Line::from(Span::styled(
            "─".repeat(40),
            Style::default().fg(Color::DarkGray),
        ));
    }

    // Headers (# ## ### etc.)
    if let Some((level, content)) = parse_header(trimmed) {
        let style = match level {
            1 => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            2 => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            _ => Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        };
        return Line::from(Span::styled(content.to_string(), style));
    }

    // List items (- or * or numbered)
    if let Some(content) = parse_list_item(trimmed) {
        let mut spans = vec![Span::styled("  • ", Style::default().fg(Color::Yellow))];
        spans.extend(parse_inline_spans(content));
        return Line::from(spans);
    }

    // Blockquote (>), used for example sentences
    if trimmed.starts_with('>') {
        let content = trimmed.trim_start_matches('>').trim();
        return Line::from(vec![
            Span::styled("│ ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                content.to_string(),
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            ),
        ]);
    }

    let spans = parse_inline_spans(trimmed);
    Line::from(spans)
}

/// Check if line is a horizontal rule
fn is_horizontal_rule(line: &str) -> bool {
    let chars: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.len() < 3 {
        return false;
    }
    let first = chars[0];
    (first == '-' || first == '_' || first == '*') && chars.iter().all(|&c| c == first)
}

/// Parse a header line, returns (level, content)
fn parse_header(line: &str) -> Option<(usize, &str)> {
    let mut level = 0;
    let mut chars = line.chars().peekable();

    while chars.peek() == Some(&'#') {
        level += 1;
        chars.next();
    }

    if level == 0 || level > 6 {
        return None;
    }

    // Must have space after #
    if chars.peek() != Some(&' ') {
        return None;
    }

    let content = &line[level..].trim();
    Some((level, content))
}

/// Parse a list item, returns the content without the marker
fn parse_list_item(line: &str) -> Option<&str> {
    if line.starts_with("- ") || line.starts_with("* ") {
        return Some(&line[2..]);
    }

    // Numbered list (1. 2. etc.)
    let mut chars = line.chars().peekable();
    let mut num_len = 0;
    while chars.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        chars.next();
        num_len += 1;
    }
    if num_len > 0 && chars.next() == Some('.') && chars.next() == Some(' ') {
        return Some(&line[num_len + 2..]);
    }

    None
}

/// Parse inline formatting (bold, italic, code)
///
/// Runs of underscores are fill-in blanks in exercises, not emphasis.
fn parse_inline_spans(text: &str) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            // Bold (**text**)
            '*' if chars.peek() == Some(&'*') => {
                if !current.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current)));
                }
                chars.next(); // consume second *
                let bold_text = consume_until(&mut chars, "**");
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            }
            '_' if chars.peek() == Some(&'_') => {
                current.push(c);
                while chars.peek() == Some(&'_') {
                    current.push('_');
                    chars.next();
                }
            }
            // Italic (*text* or _text_)
            '*' | '_' => {
                let delimiter = c;
                if !current.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current)));
                }
                let italic_text = consume_until_char(&mut chars, delimiter);
                spans.push(Span::styled(
                    italic_text,
                    Style::default().add_modifier(Modifier::ITALIC),
                ));
            }
            // Inline code (`code`), used for sentence patterns
            '`' => {
                if !current.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current)));
                }
                let code_text = consume_until_char(&mut chars, '`');
                spans.push(Span::styled(
                    code_text,
                    Style::default().fg(Color::Green).bg(Color::Black),
                ));
            }
            _ => {
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        spans.push(Span::raw(current));
    }

    if spans.is_empty() {
        spans.push(Span::raw(""));
    }

    spans
}

/// Consume characters until we hit the delimiter string
fn consume_until(chars: &mut std::iter::Peekable<std::str::Chars>, delimiter: &str) -> String {
    let mut result = String::new();
    let delim_chars: Vec<char> = delimiter.chars().collect();

    while let Some(&c) = chars.peek() {
        if delim_chars.len() == 2 && c == delim_chars[0] {
            chars.next();
            if chars.peek() == Some(&delim_chars[1]) {
                chars.next();
                break;
            } else {
                result.push(c);
            }
        } else if delim_chars.len() == 1 && c == delim_chars[0] {
            chars.next();
            break;
        } else {
            result.push(c);
            chars.next();
        }
    }
    result
}

/// Consume characters until we hit a single delimiter character
fn consume_until_char(chars: &mut std::iter::Peekable<std::str::Chars>, delimiter: char) -> String {
    let mut result = String::new();
    while let Some(&c) = chars.peek() {
        if c == delimiter {
            chars.next();
            break;
        }
        result.push(c);
        chars.next();
    }
    result
}

use crate::core::content::{GrammarTopic, ReadingLength};
use crate::core::records::CustomGrammarLesson;
use crate::core::router::{Resolution, View};
use crate::core::SessionState;
use crate::tui::app::{App, HOME_MENU, STUDY_MODES, WRITING_MODES};
use crate::tui::screens::auth::{AuthField, AuthMode};
use crate::tui::screens::chat::ChatRoom;
use crate::tui::screens::custom::{GrammarPrompt, PairPrompt, VocabPrompt};
use crate::tui::screens::practice::{ExamField, PracticeSet, SettingsField};
use crate::tui::screens::profile::is_admin;
use crate::tui::screens::study::QuizDirection;
use crate::tui::screens::{Loadable, TextInput};
use crate::tui::theme::Theme;

const SPINNER: &[&str] = &["\u{25d0}", "\u{25d3}", "\u{25d1}", "\u{25d2}"]; // ◐ ◓ ◑ ◒

/// Lesson text for a built-in grammar topic
pub fn lesson_markdown(topic: &GrammarTopic) -> String {
    let mut out = format!("# {}\n\n{}\n", topic.title, topic.summary);
    for section in &topic.sections {
        out.push_str(&format!("\n## {}\n\n{}\n", section.title, section.content));
        if !section.examples.is_empty() {
            out.push('\n');
            for example in &section.examples {
                out.push_str(&format!("> {}\n", example));
            }
        }
    }
    if let Some(table) = &topic.cheat_sheet {
        out.push_str("\n## Cheat sheet\n\n");
        out.push_str(&format!("**{}**\n", table.headers.join(" │ ")));
        for row in &table.rows {
            out.push_str(&row.join(" │ "));
            out.push('\n');
        }
    }
    out
}

/// Lesson text for a learner-authored lesson
pub fn custom_lesson_markdown(lesson: &CustomGrammarLesson) -> String {
    let mut out = format!("# {}\n", lesson.title);
    if !lesson.description.is_empty() {
        out.push_str(&format!("\n*{}*\n", lesson.description));
    }
    out.push_str(&format!("\n{}\n", lesson.content));
    if !lesson.examples.is_empty() {
        out.push_str("\n## Examples\n\n");
        for example in &lesson.examples {
            out.push_str(&format!("> {}\n", example));
        }
    }
    out
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Status bar
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);
    render_content(frame, chunks[1], app);
    render_status_bar(frame, chunks[2], app);

    if app.nav.detail_word().is_some() {
        render_word_detail(frame, app);
    }
    if app.outline.is_some() {
        render_outline(frame, app);
    }
    if app.profile_panel.is_some() {
        render_profile(frame, app);
    }
    if app.error_popup.is_some() {
        render_error_popup(frame, app);
    }
    if app.show_help {
        render_help_overlay(frame, app);
    }
}

/// Render the header
fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let user = app
        .session
        .user()
        .map(|u| u.label().to_string())
        .unwrap_or_else(|| "Not signed in".to_string());

    let title = format!(
        " EnglishMaster │ {} │ {} ",
        app.nav.current().title(),
        user
    );

    let mut spans = vec![Span::raw(title)];
    if app.session.profile().is_some_and(is_admin) {
        spans.push(Span::styled(" ADMIN ", Theme::incorrect().add_modifier(Modifier::BOLD)));
    }

    let header = Paragraph::new(Line::from(spans))
        .style(Theme::header())
        .block(Block::default().borders(Borders::BOTTOM));

    frame.render_widget(header, area);
}

/// Render the main content area for the session and current screen
fn render_content(frame: &mut Frame, area: Rect, app: &App) {
    match app.session.state() {
        SessionState::Loading => {
            let text = format!("\n  {} Checking your session...", spinner(app.tick_counter));
            let loading = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
            frame.render_widget(loading, area);
        }
        SessionState::Unauthenticated => render_auth(frame, area, app),
        SessionState::Authenticated { .. } => match app.resolution() {
            Resolution::Render(view) => render_view(frame, area, app, view),
            Resolution::Placeholder(message) => {
                render_placeholder(frame, area, app.nav.current().title(), message)
            }
            Resolution::Nothing => {
                frame.render_widget(Block::default().borders(Borders::ALL), area)
            }
        },
    }
}

fn render_view(frame: &mut Frame, area: Rect, app: &App, view: View) {
    match view {
        View::Home => render_home(frame, area, app),
        View::ClassroomList
        | View::GradeList
        | View::UnitList
        | View::ModuleList
        | View::CustomModuleList
        | View::StudyModeMenu
        | View::GrammarCategoryList
        | View::GrammarTopicList
        | View::WritingMenu => render_browse(frame, area, app, view),
        View::CardList => render_card_list(frame, area, app),
        View::FlashcardDeck => render_deck(frame, area, app),
        View::WordQuiz => render_quiz(frame, area, app),
        View::SentencePractice => render_sentence_practice(frame, area, app),
        View::GrammarLesson => render_lesson(frame, area, app),
        View::PracticeSettings => render_practice_settings(frame, area, app),
        View::GrammarPractice => render_grammar_practice(frame, area, app),
        View::TutorChat => render_tutor_chat(frame, area, app),
        View::CustomVocabularyManager => render_custom_vocabulary(frame, area, app),
        View::CustomGrammarManager => render_custom_grammar(frame, area, app),
        View::ExamMenu => render_exam_menu(frame, area, app),
        View::ExamPractice => render_exam(frame, area, app),
        View::TranslationPractice => render_translation(frame, area, app),
        View::WritingPractice => render_writing(frame, area, app),
        View::CommunityChat => render_community_chat(frame, area, app),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared pieces
// ─────────────────────────────────────────────────────────────────────────────

fn spinner(tick: u64) -> &'static str {
    SPINNER[tick as usize % SPINNER.len()]
}

fn bordered(title: impl Into<String>) -> Block<'static> {
    Block::default()
        .title(format!(" {} ", title.into()))
        .borders(Borders::ALL)
        .border_style(Theme::normal())
}

fn help_line(frame: &mut Frame, area: Rect, text: &str) {
    frame.render_widget(Paragraph::new(text.to_string()).style(Theme::muted()), area);
}

/// Split off a one-line help bar at the bottom
fn with_help_bar(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    (chunks[0], chunks[1])
}

/// A selectable list that keeps the cursor in view
fn render_list(frame: &mut Frame, area: Rect, title: String, items: Vec<ListItem>, selected: usize) {
    let empty = items.is_empty();
    let list = List::new(items)
        .block(bordered(title))
        .highlight_style(Theme::selected());
    let mut state = ListView::default().with_selected((!empty).then_some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

/// Lines describing a background request that has not produced a value
fn pending_lines<T>(loadable: &Loadable<T>, tick: u64, what: &str) -> Vec<Line<'static>> {
    match loadable {
        Loadable::Idle => vec![Line::from(Span::styled(
            format!("  {} is not available.", what),
            Theme::muted(),
        ))],
        Loadable::Loading => vec![Line::from(format!("  {} Loading {}...", spinner(tick), what))],
        Loadable::Failed(message) => {
            let mut lines = vec![Line::from(Span::styled(
                "  Something went wrong:",
                Theme::incorrect(),
            ))];
            lines.extend(
                message
                    .lines()
                    .map(|l| Line::from(Span::styled(format!("  {}", l), Theme::incorrect()))),
            );
            lines
        }
        Loadable::Ready(_) => vec![],
    }
}

/// A text field with the terminal cursor placed inside it when focused
fn render_input(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    input: &TextInput,
    focused: bool,
    hint: &str,
    masked: bool,
) {
    let border = if focused {
        Theme::focused_border()
    } else {
        Theme::normal()
    };
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(border);
    let inner = block.inner(area);

    let (row, col) = input.cursor_position();
    let row_offset = row.saturating_sub(inner.height.saturating_sub(1) as usize);
    let col_offset = col.saturating_sub(inner.width.saturating_sub(1) as usize);

    let text = if input.value().is_empty() && !focused {
        Text::styled(hint.to_string(), Theme::muted())
    } else if masked {
        Text::raw(input.masked())
    } else {
        Text::raw(input.value().to_string())
    };

    let paragraph = Paragraph::new(text)
        .block(block)
        .scroll((row_offset as u16, col_offset as u16));
    frame.render_widget(paragraph, area);

    if focused && inner.width > 0 && inner.height > 0 {
        frame.set_cursor_position((
            inner.x + (col - col_offset) as u16,
            inner.y + (row - row_offset) as u16,
        ));
    }
}

/// Centered popup area, clamped to the frame
fn popup_area(frame: &Frame, percent_x: u16, percent_y: u16, max_w: u16, max_h: u16) -> Rect {
    let area = frame.area();
    let width = (area.width * percent_x / 100).min(max_w).max(20).min(area.width);
    let height = (area.height * percent_y / 100).min(max_h).max(5).min(area.height);
    let x = (area.width.saturating_sub(width)) / 2;
    let y = (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Scroll offset that keeps the last lines of a conversation visible
fn bottom_scroll(lines: &[Line], width: u16, height: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|l| l.width().max(1).div_ceil(width))
        .sum();
    rows.saturating_sub(height as usize) as u16
}

fn render_placeholder(frame: &mut Frame, area: Rect, title: &str, message: &str) {
    let paragraph = Paragraph::new(format!("\n  {}", message)).block(
        Block::default()
            .title(format!(" {} ", title))
            .borders(Borders::ALL),
    );
    frame.render_widget(paragraph, area);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let status_text = if let Some(msg) = &app.status_message {
        format!(" {}", msg)
    } else {
        let tutor = if app.tutor_available() { "on" } else { "off" };
        format!(
            " {} words selected │ AI tutor {} │ ? for help ",
            app.nav.selections().words.len(),
            tutor
        )
    };

    let status = Paragraph::new(status_text)
        .style(Theme::status_bar())
        .block(Block::default().borders(Borders::TOP));

    frame.render_widget(status, area);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sign in
// ─────────────────────────────────────────────────────────────────────────────

fn render_auth(frame: &mut Frame, area: Rect, app: &App) {
    let form = &app.auth_form;
    let (title, switch_hint) = match form.mode {
        AuthMode::SignIn => ("Sign in", "[Ctrl+S] Create an account"),
        AuthMode::SignUp => ("Create account", "[Ctrl+S] I already have an account"),
    };

    let width = area.width.min(60);
    let height = (form.fields().len() as u16 * 3 + 6).min(area.height);
    let boxed = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );
    let block = bordered(title).border_style(Theme::focused_border());
    let inner = block.inner(boxed);
    frame.render_widget(block, boxed);

    let mut constraints: Vec<Constraint> = form.fields().iter().map(|_| Constraint::Length(3)).collect();
    constraints.push(Constraint::Length(2));
    constraints.push(Constraint::Min(0));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (i, field) in form.fields().iter().enumerate() {
        let focused = form.focused() == *field && !form.submitting;
        let (label, input, masked) = match field {
            AuthField::DisplayName => ("Display name", &form.display_name, false),
            AuthField::Email => ("Email", &form.email, false),
            AuthField::Password => ("Password", &form.password, true),
        };
        render_input(frame, chunks[i], label, input, focused, "", masked);
    }

    let n = form.fields().len();
    let message = if form.submitting {
        Line::from(format!(" {} Contacting Firebase...", spinner(app.tick_counter)))
    } else if let Some(error) = &form.error {
        Line::from(Span::styled(
            format!(" {}", error.lines().next().unwrap_or_default()),
            Theme::incorrect(),
        ))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(message), chunks[n]);
    help_line(
        frame,
        chunks[n + 1],
        &format!(" [Tab] Next  [Enter] Submit  {}  [Esc] Quit", switch_hint),
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Menus and lists
// ─────────────────────────────────────────────────────────────────────────────

fn render_home(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let items: Vec<ListItem> = HOME_MENU
        .iter()
        .map(|(label, _)| ListItem::new(format!("  {}", label)))
        .collect();
    render_list(frame, chunks[0], "Menu".into(), items, app.cursor());

    let tutor_indicator = if app.tutor_available() {
        Span::styled("AI tutor ✓", Style::default().fg(Color::Green))
    } else {
        Span::styled(
            "AI tutor ✗ (run: em config set gemini-key KEY)",
            Style::default().fg(Color::DarkGray),
        )
    };
    let reading = match &app.nav.selections().grammar_topic {
        Some(topic) => Span::styled(format!("  Reading: {}", topic.title), Theme::muted()),
        None => Span::raw(""),
    };
    let lines = vec![
        Line::from(vec![Span::raw("  "), tutor_indicator, reading]),
        Line::from(Span::styled(
            "  [Enter] Open  [l] Continue reading  [p] Profile  [o] Sign out  [q] Quit",
            Theme::muted(),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), chunks[1]);
}

/// Select-and-enter lists
fn render_browse(frame: &mut Frame, area: Rect, app: &App, view: View) {
    let (list_area, help_area) = with_help_bar(area);
    let selections = app.nav.selections();

    let (title, items, help): (String, Vec<ListItem>, &str) = match view {
        View::ClassroomList => (
            "Classrooms".into(),
            app.catalog
                .classrooms
                .iter()
                .map(|c| {
                    ListItem::new(Line::from(vec![
                        Span::raw(format!("  {}", c.name)),
                        Span::styled(format!("  {}", c.description), Theme::muted()),
                    ]))
                })
                .collect(),
            " [Enter] Open  [Esc] Back",
        ),
        View::GradeList => (
            selections
                .classroom
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            selections
                .classroom
                .iter()
                .flat_map(|c| &c.grades)
                .map(|g| ListItem::new(format!("  {}  ({} units)", g.name, g.units.len())))
                .collect(),
            " [Enter] Open  [Esc] Back",
        ),
        View::UnitList => (
            selections
                .grade
                .as_ref()
                .map(|g| g.name.clone())
                .unwrap_or_default(),
            selections
                .grade
                .iter()
                .flat_map(|g| &g.units)
                .map(|u| ListItem::new(format!("  {}  ({} words)", u.name, u.word_count())))
                .collect(),
            " [Enter] Modules  [s] Study the whole unit  [Esc] Back",
        ),
        View::ModuleList | View::CustomModuleList => {
            let modules = if view == View::ModuleList {
                app.unit_modules()
            } else {
                app.custom_modules()
            };
            let title = selections
                .unit
                .as_ref()
                .map(|u| u.name.clone())
                .unwrap_or_default();
            (
                title,
                modules
                    .iter()
                    .map(|m| {
                        let first = m.words.first().map(|w| w.headword()).unwrap_or_default();
                        let last = m.words.last().map(|w| w.headword()).unwrap_or_default();
                        ListItem::new(Line::from(vec![
                            Span::raw(format!("  {}  ({} words)", m.name, m.words.len())),
                            Span::styled(format!("  {} … {}", first, last), Theme::muted()),
                        ]))
                    })
                    .collect(),
                " [Enter] Study module  [s] Study all  [Esc] Back",
            )
        }
        View::StudyModeMenu => (
            format!("Study {} words", selections.words.len()),
            STUDY_MODES
                .iter()
                .map(|(label, _)| ListItem::new(format!("  {}", label)))
                .collect(),
            " [Enter] Start  [Esc] Back",
        ),
        View::GrammarCategoryList => (
            "Grammar".into(),
            app.catalog
                .grammar
                .iter()
                .map(|c| {
                    ListItem::new(Line::from(vec![
                        Span::raw(format!("  {}  ({} topics)", c.name, c.topics.len())),
                        Span::styled(format!("  {}", c.description), Theme::muted()),
                    ]))
                })
                .collect(),
            " [Enter] Open  [Esc] Back",
        ),
        View::GrammarTopicList => (
            selections
                .grammar_category
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            selections
                .grammar_category
                .iter()
                .flat_map(|c| &c.topics)
                .map(|t| {
                    ListItem::new(Line::from(vec![
                        Span::raw(format!("  {}", t.title)),
                        Span::styled(format!("  {}", t.summary), Theme::muted()),
                    ]))
                })
                .collect(),
            " [Enter] Open  [a] Ask the AI tutor  [Esc] Back",
        ),
        View::WritingMenu => (
            "Writing & translation".into(),
            WRITING_MODES
                .iter()
                .map(|(label, _)| ListItem::new(format!("  {}", label)))
                .collect(),
            " [Enter] Start  [Esc] Back",
        ),
        _ => (String::new(), vec![], ""),
    };

    render_list(frame, list_area, title, items, app.cursor());
    help_line(frame, help_area, help);
}

fn render_card_list(frame: &mut Frame, area: Rect, app: &App) {
    let (list_area, help_area) = with_help_bar(area);
    let words = &app.nav.selections().words;
    let items: Vec<ListItem> = words
        .iter()
        .map(|card| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("  {}", card.word), Theme::accent()),
                Span::styled(format!("  {}", card.pronunciation), Theme::muted()),
                Span::raw(format!("  {}", card.meaning)),
            ]))
        })
        .collect();
    render_list(frame, list_area, format!("All cards ({})", words.len()), items, app.cursor());
    help_line(frame, help_area, " [Enter] Word details  [j/k] Navigate  [Esc] Back");
}

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary study
// ─────────────────────────────────────────────────────────────────────────────

fn render_deck(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let words = &app.nav.selections().words;
    let Some(card) = app.deck.current(words) else {
        return;
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(card.word.clone(), Theme::accent())).centered(),
        Line::from(Span::styled(card.pronunciation.clone(), Theme::muted())).centered(),
        Line::from(""),
    ];
    if app.deck.flipped {
        lines.push(Line::from(Span::styled(card.meaning.clone(), Theme::title())).centered());
        for (label, related) in [("Synonyms", &card.synonyms), ("Antonyms", &card.antonyms)] {
            if !related.is_empty() {
                let words: Vec<&str> = related.iter().map(|r| r.word.as_str()).collect();
                lines.push(Line::from(format!("{}: {}", label, words.join(", "))).centered());
            }
        }
        for example in &card.examples {
            lines.push(Line::from(""));
            lines.push(
                Line::from(Span::styled(
                    example.clone(),
                    Style::default().add_modifier(Modifier::ITALIC),
                ))
                .centered(),
            );
        }
    } else {
        lines.push(Line::from(Span::styled("[Space] to reveal", Theme::muted())).centered());
    }

    let title = format!("Card {}/{}", app.deck.index + 1, words.len());
    let paragraph = Paragraph::new(lines)
        .block(bordered(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, body);
    help_line(
        frame,
        help_area,
        " [Space] Flip  [l/→] Next  [h/←] Previous  [i] Word details  [Esc] Back",
    );
}

fn render_quiz(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let Some(quiz) = &app.quiz else {
        return;
    };
    let direction = match quiz.direction {
        QuizDirection::EnToVi => "English → Vietnamese",
        QuizDirection::ViToEn => "Vietnamese → English",
    };

    if quiz.is_finished() {
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled("Quiz complete", Theme::title())).centered(),
            Line::from(format!("Score: {}/{}", quiz.score, quiz.questions.len())).centered(),
        ];
        frame.render_widget(Paragraph::new(lines).block(bordered(direction)), body);
        help_line(frame, help_area, " [r] Try again  [Esc] Back");
        return;
    }

    let Some(question) = quiz.question() else {
        return;
    };
    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "Question {}/{} · Score {}",
                quiz.current + 1,
                quiz.questions.len(),
                quiz.score
            ),
            Theme::muted(),
        )),
        Line::from(""),
        Line::from(Span::styled(question.prompt.clone(), Theme::accent())),
        Line::from(""),
    ];
    for (i, option) in question.options.iter().enumerate() {
        let marker = if i == quiz.cursor { "›" } else { " " };
        let style = match quiz.chosen {
            Some(_) if i == question.answer => Theme::correct(),
            Some(chosen) if chosen == i => Theme::incorrect(),
            None if i == quiz.cursor => Theme::focused_border(),
            _ => Theme::normal(),
        };
        lines.push(Line::from(Span::styled(
            format!("{} {}. {}", marker, i + 1, option),
            style,
        )));
    }
    if let Some(chosen) = quiz.chosen {
        lines.push(Line::from(""));
        lines.push(if chosen == question.answer {
            Line::from(Span::styled("Correct!", Theme::correct()))
        } else {
            Line::from(Span::styled(
                format!("The answer is: {}", question.options[question.answer]),
                Theme::incorrect(),
            ))
        });
    }

    let paragraph = Paragraph::new(lines)
        .block(bordered(direction))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, body);
    help_line(
        frame,
        help_area,
        " [1-4] Answer  [j/k] Move  [Enter] Choose / Next  [i] Word details  [Esc] Back",
    );
}

fn render_sentence_practice(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(5),
            Constraint::Min(0),
        ])
        .split(body);

    let practice = &app.sentence;
    let words = &app.nav.selections().words;
    let Some(card) = words.get(practice.index) else {
        return;
    };

    let mut task = vec![Line::from(vec![
        Span::styled(card.word.clone(), Theme::accent()),
        Span::styled(format!("  {}", card.meaning), Theme::muted()),
    ])];
    match practice.task.ready() {
        Some(text) => task.extend(markdown_to_text(text).lines),
        None => task.extend(pending_lines(&practice.task, app.tick_counter, "the task")),
    }
    let title = format!("Word {}/{}", practice.index + 1, words.len());
    frame.render_widget(
        Paragraph::new(task)
            .block(bordered(title))
            .wrap(Wrap { trim: false }),
        chunks[0],
    );

    render_input(
        frame,
        chunks[1],
        "Your sentence",
        &practice.input,
        true,
        "",
        false,
    );

    let feedback = match &practice.check {
        Loadable::Ready(check) => {
            let verdict = if check.is_correct {
                Span::styled("Well done!", Theme::correct())
            } else {
                Span::styled("Not quite.", Theme::incorrect())
            };
            let mut lines = vec![Line::from(verdict), Line::from("")];
            lines.extend(markdown_to_text(&check.feedback).lines);
            lines
        }
        Loadable::Idle => vec![Line::from(Span::styled(
            "  Write a sentence that uses the word, then press Enter.",
            Theme::muted(),
        ))],
        other => pending_lines(other, app.tick_counter, "feedback"),
    };
    frame.render_widget(
        Paragraph::new(feedback)
            .block(bordered("Feedback"))
            .wrap(Wrap { trim: false }),
        chunks[2],
    );
    help_line(
        frame,
        help_area,
        " [Enter] Check  [Tab] Next word  [Ctrl+R] New task  [Esc] Back",
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Grammar
// ─────────────────────────────────────────────────────────────────────────────

fn render_lesson(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let Some(topic) = &app.nav.selections().grammar_topic else {
        return;
    };
    let text = markdown_to_text(&lesson_markdown(topic));
    let max_scroll = text.lines.len().saturating_sub(1);
    let paragraph = Paragraph::new(text)
        .block(bordered(&topic.title))
        .wrap(Wrap { trim: false })
        .scroll((app.lesson_scroll.min(max_scroll) as u16, 0));
    frame.render_widget(paragraph, body);
    help_line(
        frame,
        help_area,
        " [j/k] Scroll  [p] Practice  [a] Ask the AI tutor  [t] Outline  [c] Categories  [Esc] Back",
    );
}

fn render_outline(frame: &mut Frame, app: &App) {
    let Some(outline) = &app.outline else {
        return;
    };
    let area = popup_area(frame, 60, 70, 70, 30);
    frame.render_widget(Clear, area);

    let mut items = Vec::new();
    for category in &app.catalog.grammar {
        for topic in &category.topics {
            items.push(ListItem::new(Line::from(vec![
                Span::styled(format!("  {} · ", category.name), Theme::muted()),
                Span::raw(topic.title.clone()),
            ])));
        }
    }
    let list = List::new(items)
        .block(bordered("Lessons").border_style(Theme::focused_border()))
        .highlight_style(Theme::selected())
        .style(Style::default().bg(Color::Black));
    let mut state = ListView::default().with_selected(Some(outline.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

/// A row of a settings form: `label  < value >`
fn setting_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let style = if focused {
        Theme::focused_border()
    } else {
        Theme::normal()
    };
    let marker = if focused { "›" } else { " " };
    Line::from(vec![
        Span::styled(format!(" {} {:<14}", marker, label), style),
        Span::styled(format!("< {} >", value), style),
    ])
}

fn start_button(label: &str, focused: bool) -> Line<'static> {
    let style = if focused {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Theme::normal()
    };
    Line::from(Span::styled(format!("   [ {} ]", label), style))
}

fn render_practice_settings(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let form = &app.settings;
    let topic = app
        .nav
        .selections()
        .grammar_topic
        .as_ref()
        .map(|t| t.title.clone())
        .unwrap_or_default();
    let focused = form.focused();

    let lines = vec![
        Line::from(""),
        setting_line(
            "Difficulty",
            form.difficulty.label(),
            focused == SettingsField::Difficulty,
        ),
        setting_line(
            "Questions",
            &form.count.to_string(),
            focused == SettingsField::Count,
        ),
        setting_line(
            "Exercise",
            form.practice_type.label(),
            focused == SettingsField::Kind,
        ),
        Line::from(""),
        start_button("Start practice", focused == SettingsField::Start),
        Line::from(""),
        Line::from(Span::styled(
            format!("   {}", form.difficulty.band()),
            Theme::muted(),
        )),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(bordered(format!("Practice: {}", topic))),
        body,
    );
    help_line(
        frame,
        help_area,
        " [j/k] Move  [h/l] Change  [Enter] Start  [Esc] Back",
    );
}

fn render_grammar_practice(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let practice = &app.practice;
    let title = app
        .nav
        .selections()
        .grammar_topic
        .as_ref()
        .map(|t| t.title.clone())
        .unwrap_or_default();

    let Some(set) = practice.questions.ready() else {
        let lines = pending_lines(&practice.questions, app.tick_counter, "questions");
        frame.render_widget(
            Paragraph::new(lines)
                .block(bordered(title))
                .wrap(Wrap { trim: false }),
            body,
        );
        help_line(frame, help_area, " [r] Retry  [Esc] Back");
        return;
    };

    if practice.is_finished() {
        render_practice_summary(frame, body, app, &title);
        help_line(
            frame,
            help_area,
            " [e] Ask the tutor for feedback  [r] New set  [Esc] Back",
        );
        return;
    }

    let index = practice.current;
    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "Question {}/{} · Score {}",
                index + 1,
                practice.total(),
                practice.score()
            ),
            Theme::muted(),
        )),
        Line::from(""),
    ];
    lines.extend(markdown_to_text(&set.prompt(index)).lines);
    lines.push(Line::from(""));

    let options = set.options(index);
    for (i, option) in options.iter().enumerate() {
        let marker = if i == practice.cursor { "›" } else { " " };
        let style = if i == practice.cursor {
            Theme::focused_border()
        } else {
            Theme::normal()
        };
        lines.push(Line::from(Span::styled(
            format!("{} {}. {}", marker, i + 1, option),
            style,
        )));
    }

    if let Some(result) = &practice.answered {
        lines.push(Line::from(""));
        if result.is_correct {
            lines.push(Line::from(Span::styled("Correct!", Theme::correct())));
        } else {
            lines.push(Line::from(Span::styled(
                format!("Answer: {}", result.correct_answer),
                Theme::incorrect(),
            )));
        }
        lines.extend(markdown_to_text(&set.explanation(index)).lines);
    }

    let needs_input = practice.expects_text() && practice.answered.is_none();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(if needs_input { 3 } else { 0 }),
        ])
        .split(body);

    let kind = match set {
        PracticeSet::MultipleChoice(_) => "Multiple choice",
        PracticeSet::ErrorCorrection(_) => "Find and fix the error",
        PracticeSet::Nuance(_) => "Explain the difference",
    };
    frame.render_widget(
        Paragraph::new(lines)
            .block(bordered(format!("{} · {}", title, kind)))
            .wrap(Wrap { trim: false }),
        chunks[0],
    );
    if needs_input {
        render_input(
            frame,
            chunks[1],
            "Corrected form",
            &practice.input,
            true,
            "",
            false,
        );
    }

    let help = if practice.answered.is_some() {
        " [Enter] Next question  [Esc] Back"
    } else if practice.expects_text() {
        " [Enter] Check  [Esc] Back"
    } else {
        " [j/k] Move  [Enter] Answer  [Esc] Back"
    };
    help_line(frame, help_area, help);
}

fn render_practice_summary(frame: &mut Frame, area: Rect, app: &App, title: &str) {
    let practice = &app.practice;
    let mut lines = vec![
        Line::from(Span::styled(
            format!("Score: {}/{}", practice.score(), practice.total()),
            Theme::title(),
        )),
        Line::from(""),
    ];
    for result in &practice.results {
        let (mark, style) = if result.is_correct {
            ("✓", Theme::correct())
        } else {
            ("✗", Theme::incorrect())
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", mark), style),
            Span::raw(result.question.clone()),
        ]));
    }
    lines.push(Line::from(""));

    match &practice.assessment {
        Loadable::Ready(assessment) => {
            lines.push(Line::from(Span::styled("Tutor feedback", Theme::title())));
            lines.extend(markdown_to_text(&assessment.general_comment).lines);
            for (heading, items) in [
                ("Strengths", &assessment.strengths),
                ("To work on", &assessment.weaknesses),
            ] {
                if !items.is_empty() {
                    lines.push(Line::from(Span::styled(heading, Theme::accent())));
                    lines.extend(items.iter().map(|s| Line::from(format!("  • {}", s))));
                }
            }
            if !assessment.advice.is_empty() {
                lines.push(Line::from(Span::styled("Advice", Theme::accent())));
                lines.extend(markdown_to_text(&assessment.advice).lines);
            }
        }
        Loadable::Idle => {}
        other => lines.extend(pending_lines(other, app.tick_counter, "feedback")),
    }

    frame.render_widget(
        Paragraph::new(lines)
            .block(bordered(format!("{} · results", title)))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn render_tutor_chat(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(body);
    let chat = &app.tutor_chat;
    let topic = app
        .nav
        .selections()
        .grammar_topic
        .as_ref()
        .map(|t| t.title.clone())
        .unwrap_or_default();

    let mut lines: Vec<Line> = Vec::new();
    if chat.lines.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Ask anything about {}.", topic),
            Theme::muted(),
        )));
    }
    for line in &chat.lines {
        let (who, style) = if line.from_tutor {
            ("Tutor", Theme::accent())
        } else {
            ("You", Theme::title())
        };
        lines.push(Line::from(Span::styled(format!("{}:", who), style)));
        lines.extend(markdown_to_text(&line.text).lines);
        lines.push(Line::from(""));
    }
    if chat.waiting {
        lines.push(Line::from(format!("{} The tutor is typing...", spinner(app.tick_counter))));
    }

    let block = bordered(format!("AI tutor · {}", topic));
    let inner = block.inner(chunks[0]);
    let scroll = bottom_scroll(&lines, inner.width, inner.height);
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        chunks[0],
    );
    render_input(frame, chunks[1], "Message", &chat.input, !chat.waiting, "", false);
    help_line(frame, help_area, " [Enter] Send  [Esc] Back");
}

// ─────────────────────────────────────────────────────────────────────────────
// Custom content
// ─────────────────────────────────────────────────────────────────────────────

fn render_custom_vocabulary(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let manager = &app.custom_vocabulary;

    match manager.units.ready() {
        Some(units) if units.is_empty() => render_placeholder(
            frame,
            body,
            "My vocabulary",
            "No units yet. Press [n] to create one.",
        ),
        Some(units) => {
            let items = units
                .iter()
                .map(|u| {
                    ListItem::new(Line::from(vec![
                        Span::raw(format!(
                            "  {}  ({} modules, {} words)",
                            u.name,
                            u.modules.len(),
                            u.word_count()
                        )),
                        Span::styled(format!("  {}", u.description), Theme::muted()),
                    ]))
                })
                .collect();
            render_list(frame, body, "My vocabulary".into(), items, app.cursor());
        }
        None => frame.render_widget(
            Paragraph::new(pending_lines(&manager.units, app.tick_counter, "your units"))
                .block(bordered("My vocabulary")),
            body,
        ),
    }

    let help = if manager.busy {
        format!(" {} Saving...", spinner(app.tick_counter))
    } else if let Some(error) = &manager.error {
        format!(" Error: {}", error.lines().next().unwrap_or_default())
    } else {
        " [Enter] Study  [n] New unit  [m] Add words  [g] Generate with AI  [d] Delete  [r] Refresh"
            .to_string()
    };
    help_line(frame, help_area, &help);

    if let Some(prompt) = &manager.prompt {
        match prompt {
            VocabPrompt::NewUnit(fields) => render_pair_prompt(
                frame,
                "New unit",
                ("Name", "Description"),
                fields,
                manager.error.as_deref(),
            ),
            VocabPrompt::ManualModule { fields, .. } => render_pair_prompt(
                frame,
                "Add words",
                ("Module name", "word = meaning, one per line or separated by ;"),
                fields,
                manager.error.as_deref(),
            ),
            VocabPrompt::AiModule { fields, .. } => render_pair_prompt(
                frame,
                "Generate with AI",
                ("Module name", "Words, separated by commas"),
                fields,
                manager.error.as_deref(),
            ),
            VocabPrompt::ConfirmDelete { name, .. } => render_confirm(frame, name),
        }
    }
}

fn render_custom_grammar(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let manager = &app.custom_grammar;

    if let Some(lesson) = &manager.reading {
        let text = markdown_to_text(&custom_lesson_markdown(lesson));
        let max_scroll = text.lines.len().saturating_sub(1);
        frame.render_widget(
            Paragraph::new(text)
                .block(bordered(format!("{} · {}", lesson.title, lesson.difficulty.as_str())))
                .wrap(Wrap { trim: false })
                .scroll((manager.scroll.min(max_scroll) as u16, 0)),
            body,
        );
        help_line(frame, help_area, " [j/k] Scroll  [Esc] Close");
        return;
    }

    let help = match manager.opened() {
        Some(unit) => {
            let items = unit
                .lessons
                .iter()
                .map(|l| {
                    let source = if l.is_ai_generated { "  AI" } else { "" };
                    ListItem::new(Line::from(vec![
                        Span::raw(format!("  {}", l.title)),
                        Span::styled(
                            format!("  {}{}", l.difficulty.as_str(), source),
                            Theme::muted(),
                        ),
                    ]))
                })
                .collect::<Vec<_>>();
            if items.is_empty() {
                render_placeholder(
                    frame,
                    body,
                    &unit.name,
                    "No lessons yet. Press [m] to write one or [g] to generate one.",
                );
            } else {
                render_list(frame, body, unit.name.clone(), items, app.cursor());
            }
            " [Enter] Read  [m] Write lesson  [g] Generate with AI  [d] Delete  [Esc] Units"
        }
        None => {
            match manager.units.ready() {
                Some(units) if units.is_empty() => render_placeholder(
                    frame,
                    body,
                    "My grammar",
                    "No units yet. Press [n] to create one.",
                ),
                Some(units) => {
                    let items = units
                        .iter()
                        .map(|u| {
                            ListItem::new(Line::from(vec![
                                Span::raw(format!("  {}  ({} lessons)", u.name, u.lessons.len())),
                                Span::styled(format!("  {}", u.description), Theme::muted()),
                            ]))
                        })
                        .collect();
                    render_list(frame, body, "My grammar".into(), items, app.cursor());
                }
                None => frame.render_widget(
                    Paragraph::new(pending_lines(&manager.units, app.tick_counter, "your units"))
                        .block(bordered("My grammar")),
                    body,
                ),
            }
            " [Enter] Open  [n] New unit  [d] Delete  [r] Refresh  [Esc] Back"
        }
    };

    let help = if manager.busy {
        format!(" {} Saving...", spinner(app.tick_counter))
    } else if let Some(error) = &manager.error {
        format!(" Error: {}", error.lines().next().unwrap_or_default())
    } else {
        help.to_string()
    };
    help_line(frame, help_area, &help);

    if let Some(prompt) = &manager.prompt {
        match prompt {
            GrammarPrompt::NewUnit(fields) => render_pair_prompt(
                frame,
                "New unit",
                ("Name", "Description"),
                fields,
                manager.error.as_deref(),
            ),
            GrammarPrompt::ManualLesson { fields, .. } => render_pair_prompt(
                frame,
                "Write a lesson",
                ("Title", "Content (markdown)"),
                fields,
                manager.error.as_deref(),
            ),
            GrammarPrompt::AiLesson { topic, level, .. } => {
                let area = popup_area(frame, 60, 40, 70, 10);
                frame.render_widget(Clear, area);
                let block = bordered("Generate a lesson")
                    .border_style(Theme::focused_border())
                    .style(Style::default().bg(Color::Black));
                let inner = block.inner(area);
                frame.render_widget(block, area);
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Length(1),
                        Constraint::Min(0),
                    ])
                    .split(inner);
                render_input(frame, chunks[0], "Topic", topic, true, "", false);
                frame.render_widget(
                    Paragraph::new(format!(" Level: < {} >", level.as_str())),
                    chunks[1],
                );
                help_line(
                    frame,
                    chunks[2],
                    &prompt_footer(" [Tab] Level  [Enter] Generate  [Esc] Cancel", manager.error.as_deref()),
                );
            }
            GrammarPrompt::ConfirmDelete { name, .. } => render_confirm(frame, name),
        }
    }
}

fn prompt_footer(help: &str, error: Option<&str>) -> String {
    match error {
        Some(error) => format!(" {}", error.lines().next().unwrap_or_default()),
        None => help.to_string(),
    }
}

/// Popup with a one-line field over a larger one
fn render_pair_prompt(
    frame: &mut Frame,
    title: &str,
    labels: (&str, &str),
    fields: &PairPrompt,
    error: Option<&str>,
) {
    let area = popup_area(frame, 70, 60, 80, 18);
    frame.render_widget(Clear, area);
    let block = bordered(title)
        .border_style(Theme::focused_border())
        .style(Style::default().bg(Color::Black));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(inner);
    render_input(frame, chunks[0], labels.0, &fields.first, !fields.on_second, "", false);
    render_input(frame, chunks[1], labels.1, &fields.second, fields.on_second, "", false);
    help_line(
        frame,
        chunks[2],
        &prompt_footer(" [Tab] Switch field  [Enter] Save  [Esc] Cancel", error),
    );
}

fn render_confirm(frame: &mut Frame, name: &str) {
    let area = popup_area(frame, 50, 20, 60, 5);
    frame.render_widget(Clear, area);
    let text = vec![
        Line::from(format!(" Delete '{}' and everything in it?", name)),
        Line::from(Span::styled(" [y] Delete  [any other key] Keep", Theme::muted())),
    ];
    frame.render_widget(
        Paragraph::new(text).block(
            bordered("Confirm")
                .border_style(Theme::incorrect())
                .style(Style::default().bg(Color::Black)),
        ),
        area,
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Exam preparation
// ─────────────────────────────────────────────────────────────────────────────

fn reading_length_label(length: ReadingLength) -> String {
    format!("{} words", length.words())
}

fn render_exam_menu(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let form = &app.exam_form;
    let focused = form.focused();
    let topic = app
        .catalog
        .exam_topics
        .get(form.topic)
        .cloned()
        .unwrap_or_default();

    let mut lines = vec![
        Line::from(""),
        setting_line(
            "Question type",
            form.question_type.label(),
            focused == ExamField::Kind,
        ),
        setting_line("Topic", &topic, focused == ExamField::Topic),
    ];
    if form.uses_length() {
        lines.push(setting_line(
            "Passage",
            &reading_length_label(form.reading_length),
            focused == ExamField::Length,
        ));
    }
    lines.push(Line::from(""));
    lines.push(start_button("Generate exercise", focused == ExamField::Start));

    frame.render_widget(
        Paragraph::new(lines).block(bordered("Exam preparation")),
        body,
    );
    help_line(
        frame,
        help_area,
        " [j/k] Move  [h/l] Change  [Enter] Start  [Esc] Back",
    );
}

fn render_exam(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let exam = &app.exam;
    let Some(question) = exam.question.ready() else {
        frame.render_widget(
            Paragraph::new(pending_lines(&exam.question, app.tick_counter, "the exercise"))
                .block(bordered("Exam practice"))
                .wrap(Wrap { trim: false }),
            body,
        );
        help_line(frame, help_area, " [r] Retry  [Esc] Back");
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(body);

    // Passage and arrangement items
    let mut context = markdown_to_text(&question.context).lines;
    if !question.arrangement_items.is_empty() {
        context.push(Line::from(""));
        for (i, item) in question.arrangement_items.iter().enumerate() {
            context.push(Line::from(format!("{}. {}", (b'a' + (i % 26) as u8) as char, item)));
        }
    }
    if exam.revealed && !question.correct_arrangement.is_empty() {
        context.push(Line::from(""));
        context.push(Line::from(Span::styled(
            format!("Order: {}", question.correct_arrangement.join(" → ")),
            Theme::correct(),
        )));
    }
    if exam.revealed {
        if let Some(explanation) = &question.explanation {
            context.push(Line::from(""));
            context.extend(markdown_to_text(explanation).lines);
        }
    }
    frame.render_widget(
        Paragraph::new(context)
            .block(bordered(&question.question_type))
            .wrap(Wrap { trim: false })
            .scroll((exam.scroll as u16, 0)),
        chunks[0],
    );

    // Current sub-question
    let total = question.sub_questions.len();
    let mut lines = Vec::new();
    if let Some(sub) = question.sub_questions.get(exam.sub) {
        lines.extend(markdown_to_text(&sub.question_text).lines);
        lines.push(Line::from(""));
        let picked = exam.answers.get(exam.sub).copied().flatten();
        for (i, option) in sub.options.iter().enumerate() {
            let is_answer = option.trim() == sub.correct_answer.trim();
            let style = if exam.revealed && is_answer {
                Theme::correct()
            } else if exam.revealed && picked == Some(i) {
                Theme::incorrect()
            } else if i == exam.cursor {
                Theme::focused_border()
            } else {
                Theme::normal()
            };
            let marker = match (i == exam.cursor, picked == Some(i)) {
                (_, true) => "●",
                (true, false) => "›",
                _ => " ",
            };
            lines.push(Line::from(Span::styled(format!("{} {}", marker, option), style)));
        }
        if exam.revealed && !sub.explanation.is_empty() {
            lines.push(Line::from(""));
            lines.extend(markdown_to_text(&sub.explanation).lines);
        }
    }
    if exam.revealed {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Score: {}/{}", exam.score(), total),
            Theme::title(),
        )));
    }
    let title = if total > 0 {
        format!("Question {}/{}", exam.sub + 1, total)
    } else {
        "Answer".to_string()
    };
    frame.render_widget(
        Paragraph::new(lines)
            .block(bordered(title))
            .wrap(Wrap { trim: false }),
        chunks[1],
    );
    help_line(
        frame,
        help_area,
        " [j/k] Option  [Enter] Pick  [Tab] Next question  [J/K] Scroll  [s] Show answers  [r] New  [Esc] Back",
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Writing and translation
// ─────────────────────────────────────────────────────────────────────────────

fn score_line(score: f32) -> Line<'static> {
    let style = if score >= 8.0 {
        Theme::correct()
    } else if score >= 5.0 {
        Theme::accent()
    } else {
        Theme::incorrect()
    };
    Line::from(Span::styled(format!("Score: {:.1}/10", score), style))
}

/// Task, answer box and feedback stacked top to bottom
fn practice_layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(25),
            Constraint::Min(0),
        ])
        .split(area)
}

fn render_translation(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let chunks = practice_layout(body);
    let session = &app.translation;
    let topic = app
        .catalog
        .writing_topics
        .get(session.topic)
        .cloned()
        .unwrap_or_default();

    let task = match session.task.ready() {
        Some(text) => markdown_to_text(text).lines,
        None => pending_lines(&session.task, app.tick_counter, "the passage"),
    };
    frame.render_widget(
        Paragraph::new(task)
            .block(bordered(format!("Translate into Vietnamese · {}", topic)))
            .wrap(Wrap { trim: false }),
        chunks[0],
    );
    render_input(
        frame,
        chunks[1],
        "Your translation",
        &session.input,
        true,
        "",
        false,
    );

    let feedback = match &session.feedback {
        Loadable::Ready(feedback) => {
            let mut lines = vec![score_line(feedback.score)];
            lines.extend(markdown_to_text(&feedback.general_comment).lines);
            if !feedback.specific_corrections.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Corrections", Theme::accent())));
                for c in &feedback.specific_corrections {
                    lines.push(Line::from(vec![
                        Span::styled(format!("  {}", c.original_phrase), Theme::incorrect()),
                        Span::raw(" → "),
                        Span::styled(c.corrected_phrase.clone(), Theme::correct()),
                    ]));
                    if !c.explanation.is_empty() {
                        lines.push(Line::from(Span::styled(
                            format!("    {}", c.explanation),
                            Theme::muted(),
                        )));
                    }
                }
            }
            if !feedback.corrected_version.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Suggested translation", Theme::accent())));
                lines.extend(markdown_to_text(&feedback.corrected_version).lines);
            }
            if !feedback.highlights.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Well done", Theme::accent())));
                lines.extend(feedback.highlights.iter().map(|h| Line::from(format!("  • {}", h))));
            }
            lines
        }
        Loadable::Idle => vec![Line::from(Span::styled(
            "  Write your translation, then press Enter to have it marked.",
            Theme::muted(),
        ))],
        other => pending_lines(other, app.tick_counter, "feedback"),
    };
    frame.render_widget(
        Paragraph::new(feedback)
            .block(bordered("Feedback"))
            .wrap(Wrap { trim: false }),
        chunks[2],
    );
    help_line(
        frame,
        help_area,
        " [Enter] Submit  [Alt+Enter] New line  [Ctrl+N] New passage  [Tab] Next topic  [Esc] Back",
    );
}

fn render_writing(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let chunks = practice_layout(body);
    let session = &app.writing;
    let topic = app
        .catalog
        .writing_topics
        .get(session.topic)
        .cloned()
        .unwrap_or_default();

    let task = match session.task.ready() {
        Some(text) => markdown_to_text(text).lines,
        None => pending_lines(&session.task, app.tick_counter, "the task"),
    };
    frame.render_widget(
        Paragraph::new(task)
            .block(bordered(format!("{} · {}", session.mode.label(), topic)))
            .wrap(Wrap { trim: false }),
        chunks[0],
    );
    render_input(
        frame,
        chunks[1],
        "Your answer",
        &session.input,
        true,
        "",
        false,
    );

    let feedback = match &session.feedback {
        Loadable::Ready(feedback) => {
            let mut lines = vec![score_line(feedback.score)];
            lines.extend(markdown_to_text(&feedback.general_comment).lines);
            if !feedback.grammar_mistakes.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Grammar", Theme::accent())));
                for m in &feedback.grammar_mistakes {
                    lines.push(Line::from(vec![
                        Span::styled(format!("  {}", m.original), Theme::incorrect()),
                        Span::raw(" → "),
                        Span::styled(m.correction.clone(), Theme::correct()),
                    ]));
                    if !m.explanation.is_empty() {
                        lines.push(Line::from(Span::styled(
                            format!("    {}", m.explanation),
                            Theme::muted(),
                        )));
                    }
                }
            }
            if !feedback.vocabulary_suggestions.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Vocabulary", Theme::accent())));
                lines.extend(
                    feedback
                        .vocabulary_suggestions
                        .iter()
                        .map(|s| Line::from(format!("  • {}", s))),
                );
            }
            if !feedback.corrected_text.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Corrected version", Theme::accent())));
                lines.extend(markdown_to_text(&feedback.corrected_text).lines);
            }
            lines
        }
        Loadable::Idle => vec![Line::from(Span::styled(
            "  Write your answer, then press Enter to have it marked.",
            Theme::muted(),
        ))],
        other => pending_lines(other, app.tick_counter, "feedback"),
    };
    frame.render_widget(
        Paragraph::new(feedback)
            .block(bordered("Feedback"))
            .wrap(Wrap { trim: false }),
        chunks[2],
    );
    help_line(
        frame,
        help_area,
        " [Enter] Submit  [Ctrl+N] New task  [Tab] Next topic  [Shift+Tab] Next mode  [Esc] Back",
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Community
// ─────────────────────────────────────────────────────────────────────────────

fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_default()
}

fn render_community_chat(frame: &mut Frame, area: Rect, app: &App) {
    let (body, help_area) = with_help_bar(area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(body);
    let chat = &app.community;

    let tabs: Vec<Span> = ChatRoom::all()
        .iter()
        .flat_map(|room| {
            let style = if *room == chat.room {
                Theme::selected()
            } else {
                Theme::muted()
            };
            [Span::styled(format!(" {} ", room.label()), style), Span::raw(" ")]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(tabs)), chunks[0]);

    if chat.choosing_partner() {
        render_chat_people(frame, chunks[1], app);
        render_input(frame, chunks[2], "Message", &chat.input, false, "Pick someone to message", false);
        help_line(
            frame,
            help_area,
            " [Enter] Message  [j/k] Move  [Tab] Switch room  [Ctrl+R] Refresh  [Esc] Back",
        );
        return;
    }

    let me = app.session.user().map(|u| u.uid.as_str());
    let open = match chat.room {
        ChatRoom::Direct => chat.partner.is_some(),
        _ => chat.conversation.ready().is_some(),
    };
    let mut lines: Vec<Line> = match open {
        true if chat.messages.is_empty() => vec![Line::from(Span::styled(
            match (&chat.room, &chat.partner) {
                (ChatRoom::Direct, Some(partner)) => {
                    format!("No messages with {} yet. Say hello!", partner.name)
                }
                (ChatRoom::Assistant, _) => {
                    "Ask the AI assistant anything about English.".to_string()
                }
                _ => "No messages yet. Say hello! Mention @AI to ask the tutor.".to_string(),
            },
            Theme::muted(),
        ))],
        true => chat
            .messages
            .iter()
            .flat_map(|m| {
                let name_style = if m.is_ai_response {
                    Theme::accent()
                } else if Some(m.sender_id.as_str()) == me {
                    Theme::title()
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                let mut lines = vec![Line::from(vec![
                    Span::styled(format!("[{}] ", format_time(m.timestamp)), Theme::muted()),
                    Span::styled(m.sender_name.clone(), name_style),
                ])];
                lines.extend(m.content.lines().map(|l| Line::from(format!("  {}", l))));
                lines
            })
            .collect(),
        false => pending_lines(&chat.conversation, app.tick_counter, "the room"),
    };
    if chat.sending {
        lines.push(Line::from(format!("{} Sending...", spinner(app.tick_counter))));
    }
    if let Some(error) = &chat.error {
        lines.push(Line::from(Span::styled(error.clone(), Theme::incorrect())));
    }

    let title = match &chat.partner {
        Some(partner) => format!("Direct · {}", partner.name),
        None => chat
            .conversation
            .ready()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| chat.room.label().to_string()),
    };
    let block = bordered(title);
    let inner = block.inner(chunks[1]);
    let scroll = bottom_scroll(&lines, inner.width, inner.height);
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        chunks[1],
    );
    render_input(frame, chunks[2], "Message", &chat.input, !chat.sending, "", false);
    let help = if chat.partner.is_some() {
        " [Enter] Send  [Tab] Switch room  [Ctrl+R] Refresh  [Esc] People"
    } else {
        " [Enter] Send  [Tab] Switch room  [Ctrl+R] Refresh  [Esc] Back"
    };
    help_line(frame, help_area, help);
}

/// People to start a direct conversation with
fn render_chat_people(frame: &mut Frame, area: Rect, app: &App) {
    let chat = &app.community;
    let Some(people) = chat.people.ready() else {
        let lines = pending_lines(&chat.people, app.tick_counter, "people");
        frame.render_widget(Paragraph::new(lines).block(bordered("People")), area);
        return;
    };
    if people.is_empty() {
        let empty = Paragraph::new(Span::styled("  Nobody else is here yet.", Theme::muted()))
            .block(bordered("People"));
        frame.render_widget(empty, area);
        return;
    }
    let items: Vec<ListItem> = people
        .iter()
        .map(|person| {
            let mut spans = vec![Span::raw(format!("  {}", person.display_name))];
            if is_admin(person) {
                spans.push(Span::styled("  ADMIN", Theme::incorrect()));
            }
            spans.push(Span::styled(format!("  {}", person.email), Theme::muted()));
            ListItem::new(Line::from(spans))
        })
        .collect();
    render_list(frame, area, "People".into(), items, chat.people_cursor);
}

// ─────────────────────────────────────────────────────────────────────────────
// Overlays
// ─────────────────────────────────────────────────────────────────────────────

/// Dictionary entry for a word, over whatever screen asked for it
fn render_word_detail(frame: &mut Frame, app: &App) {
    let Some(word) = app.nav.detail_word() else {
        return;
    };
    let area = popup_area(frame, 80, 70, 90, 30);
    frame.render_widget(Clear, area);

    let mut lines = Vec::new();
    if let Some(card) = app.detail_card() {
        lines.push(Line::from(vec![
            Span::styled(card.word.clone(), Theme::accent()),
            Span::styled(format!("  {}", card.pronunciation), Theme::muted()),
        ]));
        lines.push(Line::from(card.meaning.clone()));
        lines.push(Line::from("─".repeat(area.width.saturating_sub(4) as usize)));
    }

    match app.detail.ready() {
        Some(details) => {
            if !details.pronunciation.is_empty() && app.detail_card().is_none() {
                lines.push(Line::from(Span::styled(
                    details.pronunciation.clone(),
                    Theme::muted(),
                )));
            }
            for definition in &details.definitions {
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::styled(definition.part_of_speech.clone(), Theme::title()),
                    Span::raw(format!("  {}", definition.common_meanings)),
                ]));
                for meaning in &definition.meanings {
                    lines.push(Line::from(format!("  • {}", meaning.meaning)));
                    for example in &meaning.examples {
                        lines.push(Line::from(Span::styled(
                            format!("      {}", example),
                            Style::default().add_modifier(Modifier::ITALIC),
                        )));
                    }
                }
            }
        }
        None => lines.extend(pending_lines(&app.detail, app.tick_counter, "the dictionary entry")),
    }

    let paragraph = Paragraph::new(lines)
        .block(
            bordered(word)
                .border_style(Style::default().fg(Color::Yellow))
                .style(Style::default().bg(Color::Black)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Account details over the home menu
fn render_profile(frame: &mut Frame, app: &App) {
    let Some(panel) = &app.profile_panel else {
        return;
    };
    let area = popup_area(frame, 60, 60, 70, 18);
    frame.render_widget(Clear, area);

    let mut lines = Vec::new();
    match app.session.profile() {
        Some(profile) => {
            let mut name = vec![Span::styled(format!(" {}", profile.display_name), Theme::title())];
            if is_admin(profile) {
                name.push(Span::styled(
                    "  ADMIN",
                    Theme::incorrect().add_modifier(Modifier::BOLD),
                ));
            }
            lines.push(Line::from(name));
            lines.push(Line::from(Span::styled(format!(" {}", profile.email), Theme::muted())));
            lines.push(Line::from(format!(" Role: {:?}", profile.role)));
            let stats = profile.learning_stats.clone().unwrap_or_default();
            lines.push(Line::from(format!(
                " Level: {}  Lessons: {}  Streak: {} days",
                stats.current_level, stats.total_lessons, stats.streak
            )));
            if let Some(joined) = chrono::DateTime::from_timestamp_millis(profile.created_at) {
                lines.push(Line::from(Span::styled(
                    format!(" Member since {}", joined.with_timezone(&chrono::Local).format("%Y-%m-%d")),
                    Theme::muted(),
                )));
            }
        }
        None => lines.push(Line::from(Span::styled(
            " Profile not loaded yet.",
            Theme::muted(),
        ))),
    }
    if panel.saving {
        lines.push(Line::from(format!(" {} Saving...", spinner(app.tick_counter))));
    }
    if let Some(error) = &panel.error {
        lines.push(Line::from(Span::styled(format!(" {}", error), Theme::incorrect())));
    }
    lines.push(Line::from(""));
    let help = if panel.editing.is_some() {
        " [Enter] Save  [Esc] Cancel"
    } else {
        " [e] Edit display name  [Esc] Close"
    };
    lines.push(Line::from(Span::styled(help, Theme::muted())));

    let block = bordered("Profile")
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));
    let inner = block.inner(area);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );

    if let Some(input) = &panel.editing {
        let field = Rect::new(
            inner.x,
            inner.y + inner.height.saturating_sub(5),
            inner.width,
            3.min(inner.height),
        );
        frame.render_widget(Clear, field);
        render_input(frame, field, "Display name", input, !panel.saving, "", false);
    }
}

fn render_error_popup(frame: &mut Frame, app: &App) {
    let Some(popup) = &app.error_popup else {
        return;
    };
    let area = popup_area(frame, 60, 40, 70, 12);
    frame.render_widget(Clear, area);

    let mut lines: Vec<Line> = popup
        .message
        .lines()
        .map(|l| Line::from(format!(" {}", l)))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" [Enter] Dismiss", Theme::muted())));

    let paragraph = Paragraph::new(lines)
        .block(
            bordered(&popup.title)
                .border_style(Theme::incorrect())
                .style(Style::default().bg(Color::Black)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Render the help overlay
fn render_help_overlay(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Calculate centered popup area (60% width, 70% height)
    let popup_width = (area.width * 60 / 100).min(60);
    let popup_height = (area.height * 70 / 100).min(20);
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let view = match app.resolution() {
        Resolution::Render(view) => Some(view),
        _ => None,
    };
    let (title, help_lines) = get_help_content(view);

    let text: Vec<Line> = help_lines
        .into_iter()
        .map(|(key, desc)| {
            Line::from(vec![
                Span::styled(format!("  {:12}", key), Style::default().fg(Color::Cyan)),
                Span::raw(desc),
            ])
        })
        .collect();

    let help = Paragraph::new(text)
        .block(
            Block::default()
                .title(format!(" {} ", title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .style(Style::default().bg(Color::Black));

    frame.render_widget(help, popup_area);
}

/// Get help content for the current view
fn get_help_content(view: Option<View>) -> (&'static str, Vec<(&'static str, &'static str)>) {
    let global_keys = vec![
        ("?", "Show this help"),
        ("q / Esc", "Go back / Quit"),
        ("j / ↓", "Move down"),
        ("k / ↑", "Move up"),
        ("Enter", "Select / Confirm"),
    ];

    let Some(view) = view else {
        return ("Help", global_keys);
    };

    match view {
        View::Home => (
            "Help - Home",
            vec![
                ("Enter", "Open the selected section"),
                ("l", "Continue the last lesson"),
                ("p", "Profile and display name"),
                ("o", "Sign out"),
                ("q", "Quit application"),
                ("?", "Show this help"),
            ],
        ),
        View::UnitList | View::ModuleList | View::CustomModuleList => (
            "Help - Vocabulary",
            vec![
                ("j / ↓", "Move down"),
                ("k / ↑", "Move up"),
                ("Enter", "Open"),
                ("s", "Study every word of the unit"),
                ("Esc", "Go back"),
            ],
        ),
        View::FlashcardDeck => (
            "Help - Flashcards",
            vec![
                ("Space", "Flip the card"),
                ("l / →", "Next card"),
                ("h / ←", "Previous card"),
                ("i", "Dictionary entry"),
                ("Esc", "Go back"),
            ],
        ),
        View::CardList => (
            "Help - All cards",
            vec![
                ("j / ↓", "Move down"),
                ("k / ↑", "Move up"),
                ("Enter", "Dictionary entry"),
                ("Esc", "Go back"),
            ],
        ),
        View::WordQuiz => (
            "Help - Quiz",
            vec![
                ("1-4", "Choose an answer"),
                ("j / k", "Move between answers"),
                ("Enter", "Choose / Next question"),
                ("i", "Dictionary entry"),
                ("r", "Restart"),
                ("Esc", "Go back"),
            ],
        ),
        View::GrammarTopicList => (
            "Help - Topics",
            vec![
                ("Enter", "Open the lesson or practice"),
                ("a", "Ask the AI tutor"),
                ("Esc", "Go back"),
            ],
        ),
        View::GrammarLesson => (
            "Help - Lesson",
            vec![
                ("j / k", "Scroll"),
                ("PgDn / PgUp", "Scroll a page"),
                ("p", "Practice this topic"),
                ("a", "Ask the AI tutor"),
                ("t", "Lesson outline"),
                ("c", "Grammar categories"),
                ("Esc", "Go back"),
            ],
        ),
        View::PracticeSettings | View::ExamMenu => (
            "Help - Settings",
            vec![
                ("j / k", "Move between fields"),
                ("h / l", "Change the value"),
                ("Enter", "Start"),
                ("Esc", "Go back"),
            ],
        ),
        View::GrammarPractice => (
            "Help - Practice",
            vec![
                ("j / k", "Move between answers"),
                ("Enter", "Answer / Next question"),
                ("e", "Tutor feedback when finished"),
                ("r", "New set"),
                ("Esc", "Go back"),
            ],
        ),
        View::CustomVocabularyManager => (
            "Help - My vocabulary",
            vec![
                ("Enter", "Study the unit"),
                ("n", "New unit"),
                ("m", "Add words by hand"),
                ("g", "Generate flashcards with AI"),
                ("d", "Delete the unit"),
                ("r", "Refresh"),
                ("Esc", "Go back"),
            ],
        ),
        View::CustomGrammarManager => (
            "Help - My grammar",
            vec![
                ("Enter", "Open unit / Read lesson"),
                ("n", "New unit"),
                ("m", "Write a lesson"),
                ("g", "Generate a lesson with AI"),
                ("d", "Delete"),
                ("r", "Refresh"),
                ("Esc", "Go back"),
            ],
        ),
        View::ExamPractice => (
            "Help - Exam",
            vec![
                ("j / k", "Move between options"),
                ("Enter", "Pick the option"),
                ("Tab / l", "Next question"),
                ("J / K", "Scroll the passage"),
                ("s", "Show the answers"),
                ("r", "New exercise"),
                ("Esc", "Go back"),
            ],
        ),
        View::CommunityChat => (
            "Help - Chat",
            vec![
                ("Enter", "Send / Message the selected person"),
                ("Tab", "Community, AI assistant, direct"),
                ("j / k", "Move through people"),
                ("Ctrl+R", "Refresh"),
                ("Esc", "Back to people / Go back"),
            ],
        ),
        _ => ("Help", global_keys),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content::{GrammarSection, GrammarTable};

    fn topic() -> GrammarTopic {
        GrammarTopic {
            id: "present-simple".into(),
            title: "Present simple".into(),
            summary: "Habits and facts".into(),
            sections: vec![GrammarSection {
                title: "Form".into(),
                content: "S + V(s/es)".into(),
                examples: vec!["She works here.".into()],
            }],
            cheat_sheet: Some(GrammarTable {
                headers: vec!["Subject".into(), "Verb".into()],
                rows: vec![vec!["He/She/It".into(), "works".into()]],
            }),
            sub_topics: vec![],
        }
    }

    #[test]
    fn test_lesson_markdown_layout() {
        let md = lesson_markdown(&topic());
        assert!(md.starts_with("# Present simple\n"));
        assert!(md.contains("## Form"));
        assert!(md.contains("> She works here."));
        assert!(md.contains("**Subject │ Verb**"));
        assert!(md.ends_with("He/She/It │ works\n"));
    }

    #[test]
    fn test_blanks_are_not_italics() {
        let spans = parse_inline_spans("She ____ to school every day.");
        let text: String = spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "She ____ to school every day.");
        assert!(spans
            .iter()
            .all(|s| !s.style.add_modifier.contains(Modifier::ITALIC)));
    }

    #[test]
    fn test_markdown_styles() {
        let header = parse_markdown_line("## Form");
        assert_eq!(header.spans[0].content, "Form");

        let item = parse_markdown_line("- **am/is/are** + V-ing");
        assert_eq!(item.spans[0].content, "  • ");
        assert!(item.spans[1].style.add_modifier.contains(Modifier::BOLD));

        assert!(is_horizontal_rule("---"));
        assert!(!is_horizontal_rule("--"));
        assert_eq!(strip_html("a<br/>b<!-- x -->"), "ab");
    }

    #[test]
    fn test_bottom_scroll_follows_last_line() {
        let lines: Vec<Line> = (0..10).map(|i| Line::from(format!("line {i}"))).collect();
        assert_eq!(bottom_scroll(&lines, 40, 4), 6);
        assert_eq!(bottom_scroll(&lines, 40, 20), 0);
        // Long lines wrap onto several rows
        let long = vec![Line::from("x".repeat(100))];
        assert_eq!(bottom_scroll(&long, 40, 1), 2);
    }

    #[test]
    fn test_every_view_has_help() {
        let (title, keys) = get_help_content(Some(View::GrammarLesson));
        assert_eq!(title, "Help - Lesson");
        assert!(keys.iter().any(|(k, _)| *k == "t"));
        assert_eq!(get_help_content(None).0, "Help");
        let (title, _) = get_help_content(Some(View::CommunityChat));
        assert_eq!(title, "Help - Chat");
    }
}
