//! Terminal input and tick events

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tokio::time::interval;

/// Tick period driving spinners and chat polling
pub const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    /// Periodic wake-up, every [`TICK_RATE`]
    Tick,
}

/// Reads crossterm events on a blocking thread and forwards them with ticks
pub struct EventHandler {
    rx: mpsc::Receiver<AppEvent>,
    _task: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel(100);

        let task = tokio::spawn(async move {
            let mut ticks = interval(tick_rate);

            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        if tx.send(AppEvent::Tick).await.is_err() {
                            break;
                        }
                    }
                    ready = tokio::task::spawn_blocking(|| {
                        event::poll(Duration::from_millis(50)).unwrap_or(false)
                    }) => {
                        if !ready.unwrap_or(false) {
                            continue;
                        }
                        let forwarded = match event::read() {
                            // Windows reports releases too; only presses drive the app
                            Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                                Some(AppEvent::Key(key))
                            }
                            Ok(CrosstermEvent::Resize(w, h)) => Some(AppEvent::Resize(w, h)),
                            Ok(_) => None,
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to read terminal event");
                                None
                            }
                        };
                        if let Some(event) = forwarded {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self { rx, _task: task }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

/// `q` or Ctrl+C
pub fn is_quit_key(key: &KeyEvent) -> bool {
    matches!(
        key,
        KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            ..
        } | KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            ..
        }
    )
}

/// Esc, or Backspace outside of text fields
pub fn is_back_key(key: &KeyEvent) -> bool {
    matches!(
        key,
        KeyEvent {
            code: KeyCode::Esc,
            ..
        } | KeyEvent {
            code: KeyCode::Backspace,
            modifiers: KeyModifiers::NONE,
            ..
        }
    )
}

/// Ctrl+C always quits, even while typing
pub fn is_force_quit_key(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit_key(&key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit_key(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit_key(&key(KeyCode::Char('Q'), KeyModifiers::SHIFT)));
        assert!(!is_quit_key(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn test_back_keys() {
        assert!(is_back_key(&key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_back_key(&key(KeyCode::Backspace, KeyModifiers::NONE)));
        assert!(!is_back_key(&key(KeyCode::Backspace, KeyModifiers::ALT)));
        assert!(!is_back_key(&key(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn test_force_quit_only_with_control() {
        assert!(is_force_quit_key(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_force_quit_key(&key(KeyCode::Char('q'), KeyModifiers::NONE)));
    }
}
