//! Session gate
//!
//! Watches the auth provider and decides what the app may show: a loading
//! screen until the first auth event arrives, the sign-in form when nobody
//! is signed in, and the app proper once a user (and, if it loads, their
//! profile) is known.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::{AuthEvent, AuthProvider, ProfileStore, UserIdentity};
use crate::core::records::UserProfile;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Waiting for the first auth event
    #[default]
    Loading,
    Unauthenticated,
    Authenticated {
        user: UserIdentity,
        /// `None` when the profile is missing or could not be fetched
        profile: Option<UserProfile>,
    },
}

/// Turn an auth event into a session state, fetching the profile on sign-in
pub async fn resolve_session(event: AuthEvent, profiles: &dyn ProfileStore) -> SessionState {
    match event {
        AuthEvent::SignedOut => SessionState::Unauthenticated,
        AuthEvent::SignedIn(user) => {
            let profile = match profiles.get_profile(&user.uid).await {
                Ok(profile) => profile,
                Err(e) => {
                    tracing::warn!(uid = %user.uid, "failed to load profile: {}", e);
                    None
                }
            };
            SessionState::Authenticated { user, profile }
        }
    }
}

/// Owns the auth subscription for as long as the UI runs
pub struct SessionGate {
    state: SessionState,
    task: Option<JoinHandle<()>>,
}

impl SessionGate {
    /// Subscribe to `auth` and forward each resolved state to `tx`
    ///
    /// The subscription lives inside the spawned task; it is released when
    /// the gate is shut down or dropped.
    pub fn start<M>(
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        tx: mpsc::Sender<M>,
    ) -> Self
    where
        M: From<SessionState> + Send + 'static,
    {
        let mut subscription = auth.observe();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                let state = resolve_session(event, profiles.as_ref()).await;
                if tx.send(M::from(state)).await.is_err() {
                    break;
                }
            }
        });

        Self {
            state: SessionState::Loading,
            task: Some(task),
        }
    }

    /// Record a state delivered by the gate's task
    pub fn apply(&mut self, state: SessionState) {
        tracing::debug!(
            "session is now {}",
            match &state {
                SessionState::Loading => "loading",
                SessionState::Unauthenticated => "signed out",
                SessionState::Authenticated { .. } => "signed in",
            }
        );
        self.state = state;
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Loading
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        match &self.state {
            SessionState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match &self.state {
            SessionState::Authenticated { profile, .. } => profile.as_ref(),
            _ => None,
        }
    }

    /// Stop observing and wait until the subscription is released
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
