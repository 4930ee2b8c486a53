//! Application configuration management
//!
//! Handles loading and saving application settings including:
//! - Gemini model selection
//! - Vocabulary module size
//! - Firebase project settings
//!
//! `FIREBASE_API_KEY` and `FIREBASE_PROJECT_ID` override the file values.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::core::partition::DEFAULT_MODULE_SIZE;
use crate::error::{AppError, Result};

const FIREBASE_API_KEY_ENV: &str = "FIREBASE_API_KEY";
const FIREBASE_PROJECT_ENV: &str = "FIREBASE_PROJECT_ID";

/// Available Gemini models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GeminiModel {
    /// Gemini 2.0 Flash
    #[serde(rename = "gemini-2.0-flash")]
    Gemini20Flash,
    /// Gemini 2.5 Flash (default)
    #[default]
    #[serde(rename = "gemini-2.5-flash")]
    Gemini25Flash,
    /// Gemini 2.5 Pro
    #[serde(rename = "gemini-2.5-pro")]
    Gemini25Pro,
}

impl GeminiModel {
    /// Get the API model identifier
    pub fn api_name(&self) -> &'static str {
        match self {
            GeminiModel::Gemini20Flash => "gemini-2.0-flash",
            GeminiModel::Gemini25Flash => "gemini-2.5-flash",
            GeminiModel::Gemini25Pro => "gemini-2.5-pro",
        }
    }

    /// Get a human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            GeminiModel::Gemini20Flash => "Gemini 2.0 Flash",
            GeminiModel::Gemini25Flash => "Gemini 2.5 Flash",
            GeminiModel::Gemini25Pro => "Gemini 2.5 Pro",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|m| m.api_name() == s)
    }

    /// Get all available models
    pub fn all() -> &'static [GeminiModel] {
        &[
            GeminiModel::Gemini20Flash,
            GeminiModel::Gemini25Flash,
            GeminiModel::Gemini25Pro,
        ]
    }
}

impl std::fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

/// Firebase project settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FirebaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Selected Gemini model for AI features
    #[serde(default)]
    pub gemini_model: GeminiModel,

    /// Target number of words per vocabulary module
    #[serde(default = "default_module_size")]
    pub module_size: usize,

    /// How often open chat rooms are refreshed, in seconds
    #[serde(default = "default_chat_poll_interval")]
    pub chat_poll_interval_secs: u64,

    #[serde(default)]
    pub firebase: FirebaseConfig,
}

fn default_module_size() -> usize {
    DEFAULT_MODULE_SIZE.get()
}

fn default_chat_poll_interval() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_model: GeminiModel::default(),
            module_size: default_module_size(),
            chat_poll_interval_secs: default_chat_poll_interval(),
            firebase: FirebaseConfig::default(),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from file, or create default if not exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the configuration directory
    pub fn config_dir() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "englishmaster", "englishmaster")
            .ok_or_else(|| AppError::Config("Could not determine config directory".into()))?;

        Ok(project_dirs.config_dir().to_path_buf())
    }

    /// Directory for the TUI log file
    pub fn log_dir() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "englishmaster", "englishmaster")
            .ok_or_else(|| AppError::Config("Could not determine data directory".into()))?;

        Ok(project_dirs.data_local_dir().to_path_buf())
    }

    /// Set the Gemini model
    pub fn set_gemini_model(&mut self, model: GeminiModel) {
        self.gemini_model = model;
    }

    /// Module size as used by the partitioner; zero falls back to the default
    pub fn module_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.module_size).unwrap_or(DEFAULT_MODULE_SIZE)
    }

    /// Set the module size, rejecting zero
    pub fn set_module_size(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(AppError::InvalidInput(
                "Module size must be at least 1".into(),
            ));
        }
        self.module_size = size;
        Ok(())
    }

    /// Firebase Web API key (env var first)
    pub fn firebase_api_key(&self) -> Option<String> {
        env_value(FIREBASE_API_KEY_ENV).or_else(|| self.firebase.api_key.clone())
    }

    /// Firebase project id (env var first)
    pub fn firebase_project_id(&self) -> Option<String> {
        env_value(FIREBASE_PROJECT_ENV).or_else(|| self.firebase.project_id.clone())
    }

    /// Both Firebase settings, or an error naming what is missing
    pub fn require_firebase(&self) -> Result<(String, String)> {
        match (self.firebase_api_key(), self.firebase_project_id()) {
            (Some(key), Some(project)) => Ok((key, project)),
            _ => Err(AppError::FirebaseNotConfigured),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gemini_model_parse() {
        assert_eq!(
            GeminiModel::parse("gemini-2.0-flash"),
            Some(GeminiModel::Gemini20Flash)
        );
        assert_eq!(
            GeminiModel::parse("gemini-2.5-flash"),
            Some(GeminiModel::Gemini25Flash)
        );
        assert_eq!(
            GeminiModel::parse("gemini-2.5-pro"),
            Some(GeminiModel::Gemini25Pro)
        );
        assert_eq!(GeminiModel::parse("invalid"), None);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gemini_model, GeminiModel::Gemini25Flash);
        assert_eq!(config.module_size, 20);
        assert_eq!(config.chat_poll_interval_secs, 5);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = toml::from_str("gemini_model = \"gemini-2.5-pro\"").unwrap();
        assert_eq!(config.gemini_model, GeminiModel::Gemini25Pro);
        assert_eq!(config.module_size().get(), 20);
        assert!(config.firebase.api_key.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set_module_size(12).unwrap();
        config.firebase.project_id = Some("english-master".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.module_size, 12);
        assert_eq!(loaded.firebase.project_id.as_deref(), Some("english-master"));
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.module_size, 20);
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "module_size = \"many\"").unwrap();
        assert!(matches!(Config::load_from(&path), Err(AppError::Toml(_))));
    }

    #[test]
    fn test_module_size_rules() {
        let mut config = Config::default();
        assert!(config.set_module_size(0).is_err());
        config.module_size = 0;
        assert_eq!(config.module_size(), DEFAULT_MODULE_SIZE);
    }
}
