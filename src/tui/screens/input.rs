//! Single and multi-line text fields

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::split_lines_preserve_trailing;

/// Editable text with a cursor measured in characters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
    multiline: bool,
}

impl TextInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// A field where Alt+Enter inserts a line break
    pub fn multiline() -> Self {
        Self {
            multiline: true,
            ..Self::default()
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Take the text out, leaving the field empty
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.value)
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.value.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_index(self.cursor);
            self.value.remove(at);
        }
    }

    /// Apply an editing key. Returns `false` for keys the field ignores
    /// (Enter, Esc, Tab, arrows up and down) so the screen can act on them.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Enter if self.multiline && key.modifiers.contains(KeyModifiers::ALT) => {
                self.insert('\n');
            }
            KeyCode::Char('j') if self.multiline && key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert('\n');
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => self.clear(),
            KeyCode::Char(c)
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT) =>
            {
                self.insert(c)
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.value.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.chars().count(),
            _ => return false,
        }
        true
    }

    /// Row and column of the cursor, for placing the terminal cursor
    pub fn cursor_position(&self) -> (usize, usize) {
        let before: String = self.value.chars().take(self.cursor).collect();
        let lines = split_lines_preserve_trailing(&before);
        let row = lines.len().saturating_sub(1);
        let col = lines.last().map(|l| l.chars().count()).unwrap_or(0);
        (row, col)
    }

    /// The value with every character replaced, for password fields
    pub fn masked(&self) -> String {
        "•".repeat(self.value.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut TextInput, code: KeyCode) -> bool {
        input.handle_key(&KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_typing_and_editing_multibyte_text() {
        let mut input = TextInput::new();
        for c in "xin chào".chars() {
            press(&mut input, KeyCode::Char(c));
        }
        assert_eq!(input.value(), "xin chào");

        press(&mut input, KeyCode::Left);
        press(&mut input, KeyCode::Backspace);
        assert_eq!(input.value(), "xin cho");
        assert_eq!(input.cursor(), 5);

        press(&mut input, KeyCode::Home);
        press(&mut input, KeyCode::Delete);
        assert_eq!(input.value(), "in cho");
    }

    #[test]
    fn test_enter_is_left_to_the_screen() {
        let mut input = TextInput::new();
        assert!(!press(&mut input, KeyCode::Enter));
        assert!(!press(&mut input, KeyCode::Esc));
        assert!(!press(&mut input, KeyCode::Tab));
    }

    #[test]
    fn test_multiline_break_and_cursor_position() {
        let mut input = TextInput::multiline();
        input.set("Dear Sir,");
        assert!(input.handle_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT)));
        input.insert('I');
        assert_eq!(input.value(), "Dear Sir,\nI");
        assert_eq!(input.cursor_position(), (1, 1));

        let mut single = TextInput::new();
        assert!(!single.handle_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT)));
    }

    #[test]
    fn test_take_and_mask() {
        let mut input = TextInput::new();
        input.set("secret");
        assert_eq!(input.masked().chars().count(), 6);
        assert_eq!(input.take(), "secret");
        assert!(input.is_empty());
        assert_eq!(input.cursor(), 0);
    }
}
