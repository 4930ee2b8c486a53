//! Colors and styles shared by every screen

use ratatui::style::{Color, Modifier, Style};

pub struct Theme;

impl Theme {
    pub const PRIMARY: Color = Color::Cyan;
    pub const SECONDARY: Color = Color::Yellow;
    pub const SUCCESS: Color = Color::Green;
    pub const ERROR: Color = Color::Red;
    pub const MUTED: Color = Color::DarkGray;

    pub fn header() -> Style {
        Style::default().fg(Self::PRIMARY)
    }

    pub fn status_bar() -> Style {
        Style::default().bg(Color::DarkGray)
    }

    pub fn selected() -> Style {
        Style::default().bg(Self::PRIMARY).fg(Color::Black)
    }

    pub fn normal() -> Style {
        Style::default()
    }

    pub fn muted() -> Style {
        Style::default().fg(Self::MUTED)
    }

    /// Section titles inside a screen
    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Highlighted headwords and key terms
    pub fn accent() -> Style {
        Style::default()
            .fg(Self::SECONDARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn correct() -> Style {
        Style::default().fg(Self::SUCCESS)
    }

    pub fn incorrect() -> Style {
        Style::default().fg(Self::ERROR)
    }

    /// Border of the focused input field
    pub fn focused_border() -> Style {
        Style::default().fg(Self::SECONDARY)
    }
}
