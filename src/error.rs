//! Custom error types for EnglishMaster
//!
//! User-friendly error messages for every collaborator failure.
//! Navigation and module partitioning never produce errors.

use thiserror::Error;

/// Main error type for the EnglishMaster application
#[derive(Error, Debug)]
pub enum AppError {
    /// No signed-in user for an operation that needs one
    #[error("You are not signed in.\n\n  → Run 'em auth login' or sign in from the app.")]
    NotAuthenticated,

    /// Sign in or sign up was rejected
    #[error("Authentication failed: {0}\n\n  → Check your email and password and try again.")]
    AuthenticationFailed(String),

    /// Refresh token rejected by the identity service
    #[error("Your session has expired.\n\n  → Run 'em auth login' to sign in again.")]
    SessionExpired,

    /// Firebase project settings are missing
    #[error("Firebase is not configured.\n\n  → Run 'em config set firebase-api-key YOUR_KEY'\n  → Run 'em config set firebase-project YOUR_PROJECT_ID'")]
    FirebaseNotConfigured,

    /// Document store request failed
    #[error("Database request failed: {0}\n\n  → Check your internet connection and try again.")]
    Store(String),

    /// Unit (custom vocabulary or grammar) does not exist
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// Built-in catalog could not be loaded
    #[error("Built-in content is corrupted: {0}")]
    Catalog(String),

    /// Credential storage error
    #[error("Cannot access secure storage: {0}\n\n  → On macOS: Make sure Keychain Access is available.\n  → On Linux: Ensure a secret service (like gnome-keyring) is running.")]
    Credential(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// Network request error
    #[error("Network request failed: {0}\n\n  → Check your internet connection.")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Failed to parse response: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization/deserialization error
    #[error("Configuration file is invalid: {0}")]
    Toml(String),

    /// Terminal/TUI error
    #[error("Terminal error: {0}\n\n  → Try resizing your terminal or restarting it.")]
    Terminal(String),

    /// Gemini API error
    #[error("AI generation failed: {0}\n\n  → Check your Gemini API key with 'em config get gemini-key'.")]
    GeminiApi(String),

    /// Gemini API not configured
    #[error("Gemini API key is not set up.\n\n  → Get an API key from https://aistudio.google.com/apikey\n  → Run 'em config set gemini-key YOUR_KEY' to configure it.")]
    GeminiNotConfigured,

    /// The model answered, but not in the requested shape
    #[error("The AI returned an unexpected answer: {0}\n\n  → Press 'r' to try again.")]
    MalformedAiOutput(String),

    /// Invalid input from user
    #[error("{0}")]
    InvalidInput(String),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),
}

impl AppError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Network(_)
                | AppError::Store(_)
                | AppError::GeminiApi(_)
                | AppError::MalformedAiOutput(_)
        )
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::Credential(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::Toml(err.to_string())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
