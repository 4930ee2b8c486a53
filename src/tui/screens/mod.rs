//! Per-screen state
//!
//! Each module holds the state one group of screens keeps between frames
//! and the pure logic behind it. Key handling lives in the app; drawing
//! lives in `ui`.

pub mod auth;
pub mod chat;
pub mod custom;
pub mod input;
pub mod practice;
pub mod profile;
pub mod study;

pub use input::TextInput;

/// Data a screen fetches in the background
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Loadable<T> {
    #[default]
    Idle,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Loadable<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Loadable::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Store a finished request, keeping only the message of a failure
    pub fn settle(&mut self, result: crate::error::Result<T>) {
        *self = match result {
            Ok(value) => Loadable::Ready(value),
            Err(e) => {
                tracing::warn!(error = %e, "background request failed");
                Loadable::Failed(e.to_string())
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_settle() {
        let mut value: Loadable<u8> = Loadable::Loading;
        assert!(value.is_loading());
        value.settle(Ok(3));
        assert_eq!(value.ready(), Some(&3));

        value.settle(Err(AppError::Store("offline".into())));
        match value {
            Loadable::Failed(message) => assert!(message.contains("offline")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
