//! Terminal user interface
//!
//! `app` owns the state and the event loop, `screens` holds per-screen
//! state, `ui` draws a frame from the app.

pub mod app;
pub mod event;
pub mod screens;
pub mod theme;
pub mod ui;

pub use app::App;

/// Split a string into lines, preserving trailing empty lines.
///
/// Unlike `str::lines()` which drops trailing newlines, this keeps them as
/// empty strings, so a cursor sitting on a fresh line can be placed.
///
/// # Examples
/// ```
/// use englishmaster::tui::split_lines_preserve_trailing;
///
/// assert_eq!("hello\n".lines().collect::<Vec<_>>(), vec!["hello"]);
/// assert_eq!(split_lines_preserve_trailing("hello\n"), vec!["hello", ""]);
/// ```
pub fn split_lines_preserve_trailing(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}
