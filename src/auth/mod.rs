//! Identity: who is signed in, and how the app hears about it
//!
//! An [`AuthProvider`] publishes the signed-in user as a stream of
//! [`AuthEvent`]s. Every subscription receives the current state as its
//! first event, then one event per change. Dropping the
//! [`AuthSubscription`] releases it.

pub mod firebase;
pub mod profile;

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

pub use firebase::FirebaseAuth;
pub use profile::{DocumentProfileStore, ProfileStore};

/// The signed-in user as reported by the identity service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl UserIdentity {
    /// Name to show in the UI and on chat messages
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(UserIdentity),
    SignedOut,
}

/// Receiving end of an auth observation
#[derive(Debug)]
pub struct AuthSubscription {
    rx: mpsc::UnboundedReceiver<AuthEvent>,
}

impl AuthSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<AuthEvent>) -> Self {
        Self { rx }
    }

    /// Next auth change, or `None` once the provider is gone
    pub async fn next(&mut self) -> Option<AuthEvent> {
        self.rx.recv().await
    }
}

/// Fan-out of auth events to every live subscription
#[derive(Debug, Default)]
pub struct AuthBroadcaster {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AuthEvent>>>,
}

impl AuthBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// New subscription that starts with `initial`
    pub fn subscribe(&self, initial: AuthEvent) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, this cannot fail
        let _ = tx.send(initial);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        AuthSubscription::new(rx)
    }

    /// Deliver `event` to every subscription, forgetting released ones
    pub fn publish(&self, event: AuthEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Number of subscriptions that have not been released
    pub fn live_subscribers(&self) -> usize {
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.retain(|tx| !tx.is_closed());
                subscribers.len()
            }
            Err(_) => 0,
        }
    }
}

/// Source of the user session
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Subscribe to session changes; the current state arrives first
    fn observe(&self) -> AuthSubscription;

    async fn sign_out(&self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod test_utils {
    //! In-process auth provider for tests

    use super::*;

    pub struct MockAuthProvider {
        broadcaster: AuthBroadcaster,
        current: Mutex<AuthEvent>,
    }

    impl MockAuthProvider {
        pub fn signed_out() -> Self {
            Self {
                broadcaster: AuthBroadcaster::new(),
                current: Mutex::new(AuthEvent::SignedOut),
            }
        }

        pub fn signed_in(user: UserIdentity) -> Self {
            Self {
                broadcaster: AuthBroadcaster::new(),
                current: Mutex::new(AuthEvent::SignedIn(user)),
            }
        }

        pub fn emit(&self, event: AuthEvent) {
            *self.current.lock().unwrap() = event.clone();
            self.broadcaster.publish(event);
        }

        pub fn live_subscribers(&self) -> usize {
            self.broadcaster.live_subscribers()
        }
    }

    #[async_trait]
    impl AuthProvider for MockAuthProvider {
        fn observe(&self) -> AuthSubscription {
            let current = self.current.lock().unwrap().clone();
            self.broadcaster.subscribe(current)
        }

        async fn sign_out(&self) -> Result<()> {
            self.emit(AuthEvent::SignedOut);
            Ok(())
        }
    }

    pub fn learner() -> UserIdentity {
        UserIdentity {
            uid: "learner-1".into(),
            email: "learner@example.com".into(),
            display_name: Some("Lan".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[tokio::test]
    async fn test_subscription_receives_initial_state_first() {
        let provider = MockAuthProvider::signed_in(learner());
        let mut sub = provider.observe();
        assert_eq!(sub.next().await, Some(AuthEvent::SignedIn(learner())));

        provider.emit(AuthEvent::SignedOut);
        assert_eq!(sub.next().await, Some(AuthEvent::SignedOut));
    }

    #[tokio::test]
    async fn test_dropping_subscription_releases_it() {
        let provider = MockAuthProvider::signed_out();
        let first = provider.observe();
        let _second = provider.observe();
        assert_eq!(provider.live_subscribers(), 2);

        drop(first);
        assert_eq!(provider.live_subscribers(), 1);
        provider.emit(AuthEvent::SignedIn(learner()));
        assert_eq!(provider.live_subscribers(), 1);
    }

    #[test]
    fn test_label_falls_back_to_email() {
        let mut user = learner();
        assert_eq!(user.label(), "Lan");
        user.display_name = Some(String::new());
        assert_eq!(user.label(), "learner@example.com");
    }
}
