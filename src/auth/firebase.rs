//! Email/password authentication against Firebase Identity Toolkit
//!
//! Sign-in returns a short-lived ID token and a long-lived refresh token.
//! The pair is persisted in the system keyring so the learner stays signed
//! in between runs; the ID token is refreshed transparently when it is
//! about to expire.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::auth::{AuthBroadcaster, AuthEvent, AuthProvider, AuthSubscription, UserIdentity};
use crate::core::config::Config;
use crate::core::credentials::CredentialStore;
use crate::error::{AppError, Result};
use crate::store::firestore::IdTokenSource;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Refresh this long before the ID token actually expires
const EXPIRY_BUFFER_SECS: i64 = 300;

/// A signed-in session with its token pair
#[derive(Debug, Clone)]
pub struct FirebaseSession {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub id_token: SecretString,
    pub refresh_token: SecretString,
    /// When the ID token expires (absolute timestamp)
    pub expires_at: DateTime<Utc>,
}

/// Serializable format for keyring storage
///
/// Uses plain strings since SecretString doesn't implement Serialize.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredSession {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// ISO 8601 timestamp for ID token expiration
    pub expires_at: String,
    /// Version for future migrations
    pub version: u8,
}

impl FirebaseSession {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// Whether the ID token is expired or about to be
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_BUFFER_SECS) >= self.expires_at
    }

    /// Convert to storable format for keyring persistence
    pub fn to_stored(&self) -> StoredSession {
        StoredSession {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            id_token: self.id_token.expose_secret().to_string(),
            refresh_token: self.refresh_token.expose_secret().to_string(),
            expires_at: self.expires_at.to_rfc3339(),
            version: 1,
        }
    }

    /// Create from stored format after keyring retrieval
    pub fn from_stored(stored: StoredSession) -> Result<Self> {
        let expires_at = DateTime::parse_from_rfc3339(&stored.expires_at)
            .map_err(|e| AppError::Config(format!("Invalid session expiration date: {}", e)))?
            .with_timezone(&Utc);

        Ok(Self {
            uid: stored.uid,
            email: stored.email,
            display_name: stored.display_name,
            id_token: SecretString::from(stored.id_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at,
        })
    }
}

/// `accounts:signInWithPassword` / `accounts:signUp` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// `accounts:update` response; tokens are only present when rotated
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Secure token endpoint response
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turn an Identity Toolkit error code into a message a learner can act on
pub fn describe_auth_error(code: &str) -> String {
    // Codes may carry a suffix, e.g. "WEAK_PASSWORD : Password should be..."
    let key = code.split(':').next().unwrap_or(code).trim();
    match key {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Incorrect email or password".to_string()
        }
        "EMAIL_EXISTS" => "An account with this email already exists".to_string(),
        "INVALID_EMAIL" => "The email address is not valid".to_string(),
        "WEAK_PASSWORD" => "Password must be at least 6 characters".to_string(),
        "USER_DISABLED" => "This account has been disabled".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later".to_string(),
        "MISSING_PASSWORD" => "Password is required".to_string(),
        "MISSING_EMAIL" => "Email is required".to_string(),
        other => other.replace('_', " ").to_lowercase(),
    }
}

fn expiry_from(expires_in: &str) -> DateTime<Utc> {
    let secs = expires_in.parse::<i64>().unwrap_or(3600);
    Utc::now() + Duration::seconds(secs)
}

/// Firebase email/password authentication
pub struct FirebaseAuth {
    client: Client,
    api_key: String,
    session: RwLock<Option<FirebaseSession>>,
    broadcaster: AuthBroadcaster,
    /// Serializes refresh attempts so concurrent callers share one refresh
    refresh_lock: Mutex<()>,
    /// Whether sessions are written to the keyring
    persist: bool,
}

impl FirebaseAuth {
    /// Create an auth handle, restoring the session saved in the keyring
    pub fn new(api_key: impl Into<String>) -> Self {
        let restored = match CredentialStore::get_session() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("could not restore saved session: {}", e);
                None
            }
        };
        Self::build(api_key.into(), restored, true)
    }

    /// Create from the Firebase settings in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .firebase_api_key()
            .ok_or(AppError::FirebaseNotConfigured)?;
        Ok(Self::new(api_key))
    }

    /// An auth handle that never touches the keyring
    pub fn ephemeral(api_key: impl Into<String>) -> Self {
        Self::build(api_key.into(), None, false)
    }

    fn build(api_key: String, session: Option<FirebaseSession>, persist: bool) -> Self {
        Self {
            client: Client::new(),
            api_key,
            session: RwLock::new(session),
            broadcaster: AuthBroadcaster::new(),
            refresh_lock: Mutex::new(()),
            persist,
        }
    }

    /// The signed-in user, if any
    pub fn current_user(&self) -> Option<UserIdentity> {
        self.current_session().map(|s| s.identity())
    }

    fn current_session(&self) -> Option<FirebaseSession> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    fn current_event(&self) -> AuthEvent {
        match self.current_user() {
            Some(user) => AuthEvent::SignedIn(user),
            None => AuthEvent::SignedOut,
        }
    }

    /// Replace the session, persist it, and notify observers
    fn install(&self, session: Option<FirebaseSession>) -> Result<()> {
        if self.persist {
            match &session {
                Some(s) => CredentialStore::store_session(s)?,
                None => CredentialStore::delete_session()?,
            }
        }
        if let Ok(mut current) = self.session.write() {
            *current = session;
        }
        self.broadcaster.publish(self.current_event());
        Ok(())
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}:{}?key={}", IDENTITY_TOOLKIT_URL, method, self.api_key);
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(AppError::AuthenticationFailed(describe_auth_error(&code)));
        }

        Ok(response.json().await?)
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let response: SignInResponse = self
            .post_json(
                "signInWithPassword",
                &serde_json::json!({
                    "email": email.trim(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let session = FirebaseSession {
            uid: response.local_id,
            email: response.email,
            display_name: response.display_name.filter(|n| !n.is_empty()),
            id_token: SecretString::from(response.id_token),
            refresh_token: SecretString::from(response.refresh_token),
            expires_at: expiry_from(&response.expires_in),
        };
        let user = session.identity();
        tracing::info!(uid = %user.uid, "signed in");
        self.install(Some(session))?;
        Ok(user)
    }

    /// Create an account, set its display name and sign it in
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserIdentity> {
        let created: SignInResponse = self
            .post_json(
                "signUp",
                &serde_json::json!({
                    "email": email.trim(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let mut session = FirebaseSession {
            uid: created.local_id,
            email: created.email,
            display_name: None,
            id_token: SecretString::from(created.id_token),
            refresh_token: SecretString::from(created.refresh_token),
            expires_at: expiry_from(&created.expires_in),
        };

        let display_name = display_name.trim();
        if !display_name.is_empty() {
            let updated: UpdateProfileResponse = self
                .post_json(
                    "update",
                    &serde_json::json!({
                        "idToken": session.id_token.expose_secret(),
                        "displayName": display_name,
                        "returnSecureToken": true,
                    }),
                )
                .await?;
            session.display_name = updated.display_name.or(Some(display_name.to_string()));
            if let (Some(id_token), Some(refresh_token)) = (updated.id_token, updated.refresh_token)
            {
                session.id_token = SecretString::from(id_token);
                session.refresh_token = SecretString::from(refresh_token);
                if let Some(expires_in) = updated.expires_in {
                    session.expires_at = expiry_from(&expires_in);
                }
            }
        }

        let user = session.identity();
        tracing::info!(uid = %user.uid, "account created");
        self.install(Some(session))?;
        Ok(user)
    }

    /// Exchange the refresh token for a new ID token
    async fn refresh(&self) -> Result<SecretString> {
        let _lock = self.refresh_lock.lock().await;

        // Another task may have refreshed while we waited for the lock
        let session = self.current_session().ok_or(AppError::NotAuthenticated)?;
        if !session.is_expired() {
            return Ok(session.id_token);
        }

        let url = format!("{}?key={}", SECURE_TOKEN_URL, self.api_key);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.expose_secret()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("token refresh rejected: {}", text);
            // Refresh token is no longer usable, the learner has to sign in again
            self.install(None)?;
            return Err(AppError::SessionExpired);
        }

        let refreshed: RefreshResponse = response.json().await?;
        let renewed = FirebaseSession {
            id_token: SecretString::from(refreshed.id_token),
            refresh_token: SecretString::from(refreshed.refresh_token),
            expires_at: expiry_from(&refreshed.expires_in),
            ..session
        };
        let token = renewed.id_token.clone();
        if self.persist {
            CredentialStore::store_session(&renewed)?;
        }
        if let Ok(mut current) = self.session.write() {
            *current = Some(renewed);
        }
        tracing::debug!("ID token refreshed");
        Ok(token)
    }
}

#[async_trait]
impl IdTokenSource for FirebaseAuth {
    async fn id_token(&self) -> Result<Option<SecretString>> {
        match self.current_session() {
            None => Ok(None),
            Some(session) if !session.is_expired() => Ok(Some(session.id_token)),
            Some(_) => self.refresh().await.map(Some),
        }
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuth {
    fn observe(&self) -> AuthSubscription {
        self.broadcaster.subscribe(self.current_event())
    }

    async fn sign_out(&self) -> Result<()> {
        tracing::info!("signed out");
        self.install(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>) -> FirebaseSession {
        FirebaseSession {
            uid: "u1".into(),
            email: "lan@example.com".into(),
            display_name: Some("Lan".into()),
            id_token: SecretString::from("id-token"),
            refresh_token: SecretString::from("refresh-token"),
            expires_at,
        }
    }

    #[test]
    fn test_stored_session_round_trip() {
        let original = session(Utc::now() + Duration::hours(1));
        let json = serde_json::to_string(&original.to_stored()).unwrap();
        let restored =
            FirebaseSession::from_stored(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.identity(), original.identity());
        assert_eq!(restored.refresh_token.expose_secret(), "refresh-token");
        assert_eq!(
            restored.expires_at.timestamp(),
            original.expires_at.timestamp()
        );
    }

    #[test]
    fn test_from_stored_rejects_bad_date() {
        let mut stored = session(Utc::now()).to_stored();
        stored.expires_at = "yesterday".into();
        assert!(matches!(
            FirebaseSession::from_stored(stored),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_expiry_buffer() {
        assert!(!session(Utc::now() + Duration::hours(1)).is_expired());
        assert!(session(Utc::now() + Duration::minutes(2)).is_expired());
        assert!(session(Utc::now() - Duration::minutes(1)).is_expired());
    }

    #[test]
    fn test_describe_auth_error() {
        assert_eq!(
            describe_auth_error("INVALID_LOGIN_CREDENTIALS"),
            "Incorrect email or password"
        );
        assert_eq!(
            describe_auth_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            "Password must be at least 6 characters"
        );
        assert_eq!(describe_auth_error("OPERATION_NOT_ALLOWED"), "operation not allowed");
    }

    #[tokio::test]
    async fn test_observe_reports_changes() {
        let auth = FirebaseAuth::ephemeral("key");
        let mut sub = auth.observe();
        assert_eq!(sub.next().await, Some(AuthEvent::SignedOut));

        auth.install(Some(session(Utc::now() + Duration::hours(1))))
            .unwrap();
        let Some(AuthEvent::SignedIn(user)) = sub.next().await else {
            panic!("expected a sign-in event");
        };
        assert_eq!(user.uid, "u1");

        auth.sign_out().await.unwrap();
        assert_eq!(sub.next().await, Some(AuthEvent::SignedOut));
        assert!(auth.current_user().is_none());
    }

    #[tokio::test]
    async fn test_id_token_for_fresh_session() {
        let auth = FirebaseAuth::ephemeral("key");
        assert!(auth.id_token().await.unwrap().is_none());

        auth.install(Some(session(Utc::now() + Duration::hours(1))))
            .unwrap();
        let token = auth.id_token().await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "id-token");
    }
}
