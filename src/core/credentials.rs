//! Secure credential storage using the system keyring
//!
//! Two secrets are kept for the learner:
//! - the Firebase sign-in session (ID token + refresh token), as JSON
//! - the Gemini API key
//!
//! Each lives in its own keyring entry fronted by an in-memory cache, so the
//! keychain is asked at most once per process. `GEMINI_API_KEY` in the
//! environment takes precedence over the stored key.

use std::sync::RwLock;

use keyring::Entry;
use secrecy::{ExposeSecret, SecretString};

use crate::auth::firebase::{FirebaseSession, StoredSession};
use crate::error::{AppError, Result};

const SERVICE_NAME: &str = "englishmaster";
const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// One keyring entry and what has been read from it
///
/// `cached` is `None` until the entry is first read, then `Some(None)` when
/// the keyring holds nothing.
struct KeyringSlot<T> {
    name: &'static str,
    cached: RwLock<Option<Option<T>>>,
}

impl<T: Clone> KeyringSlot<T> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            cached: RwLock::new(None),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Ok(Entry::new(SERVICE_NAME, self.name)?)
    }

    fn remember(&self, value: Option<T>) {
        if let Ok(mut cached) = self.cached.write() {
            *cached = Some(value);
        }
    }

    /// Read through the cache, decoding the raw secret with `decode`
    fn load(&self, decode: impl FnOnce(String) -> Result<T>) -> Result<Option<T>> {
        if let Some(hit) = self.cached.read().ok().and_then(|c| c.clone()) {
            return Ok(hit);
        }

        let value = match self.entry()?.get_password() {
            Ok(raw) => Some(decode(raw)?),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                return Err(AppError::Credential(format!(
                    "Cannot access system keychain. Make sure your keyring is unlocked. ({})",
                    e
                )))
            }
        };
        self.remember(value.clone());
        Ok(value)
    }

    fn save(&self, raw: &str, value: T) -> Result<()> {
        self.entry()?.set_password(raw)?;
        self.remember(Some(value));
        Ok(())
    }

    /// Delete the entry; a missing entry is not an error
    fn clear(&self) -> Result<()> {
        let outcome = match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::Credential(e.to_string())),
        };
        self.remember(None);
        outcome
    }
}

static SESSION: KeyringSlot<FirebaseSession> = KeyringSlot::new("firebase_session");
static GEMINI_KEY: KeyringSlot<SecretString> = KeyringSlot::new("gemini_api_key");

/// Credential store for secure token management
pub struct CredentialStore;

impl CredentialStore {
    /// Persist the sign-in session as JSON in the keyring
    pub fn store_session(session: &FirebaseSession) -> Result<()> {
        let json = serde_json::to_string(&session.to_stored())
            .map_err(|e| AppError::Config(format!("Failed to serialize session: {}", e)))?;
        SESSION.save(&json, session.clone())
    }

    /// The persisted session, if any
    pub fn get_session() -> Result<Option<FirebaseSession>> {
        SESSION.load(|json| {
            let stored: StoredSession = serde_json::from_str(&json)
                .map_err(|e| AppError::Config(format!("Invalid stored session: {}", e)))?;
            FirebaseSession::from_stored(stored)
        })
    }

    /// Forget the persisted session
    pub fn delete_session() -> Result<()> {
        SESSION.clear()
    }

    /// Store the Gemini API key securely
    pub fn store_gemini_key(key: &str) -> Result<()> {
        GEMINI_KEY.save(key, SecretString::from(key.to_string()))
    }

    /// The Gemini API key from the environment or the keyring
    pub fn get_gemini_key() -> Result<Option<SecretString>> {
        if let Some(key) = std::env::var(GEMINI_API_KEY_ENV).ok().filter(|k| !k.is_empty()) {
            return Ok(Some(SecretString::from(key)));
        }
        GEMINI_KEY.load(|raw| Ok(SecretString::from(raw)))
    }

    pub fn delete_gemini_key() -> Result<()> {
        GEMINI_KEY.clear()
    }

    /// Get the Gemini API key, returning an error if not configured
    pub fn require_gemini_key() -> Result<SecretString> {
        Self::get_gemini_key()?.ok_or(AppError::GeminiNotConfigured)
    }

    /// Masked secret for display: first and last four characters
    pub fn mask_token(token: &SecretString) -> String {
        let chars: Vec<char> = token.expose_secret().chars().collect();
        match chars.len() {
            0..=8 => "*".repeat(chars.len()),
            n => format!(
                "{}...{}",
                chars[..4].iter().collect::<String>(),
                chars[n - 4..].iter().collect::<String>()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        let short = SecretString::from("abc");
        assert_eq!(CredentialStore::mask_token(&short), "***");

        let long = SecretString::from("AIzaSy1234567890abcdef");
        assert_eq!(CredentialStore::mask_token(&long), "AIza...cdef");
    }

    #[test]
    fn test_gemini_key_from_env() {
        std::env::set_var(GEMINI_API_KEY_ENV, "env-key-for-test");
        let key = CredentialStore::get_gemini_key().unwrap().unwrap();
        assert_eq!(key.expose_secret(), "env-key-for-test");
        std::env::remove_var(GEMINI_API_KEY_ENV);
    }

    #[test]
    fn test_cached_slot_skips_the_keyring() {
        let slot: KeyringSlot<String> = KeyringSlot::new("unit-test-slot");
        slot.remember(Some("cached".to_string()));
        let value = slot.load(|_| panic!("keyring must not be read")).unwrap();
        assert_eq!(value.as_deref(), Some("cached"));

        slot.remember(None);
        assert_eq!(slot.load(|_| panic!("keyring must not be read")).unwrap(), None);
    }
}
