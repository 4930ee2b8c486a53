//! Configuration CLI command handlers

use crate::cli::commands::{ConfigCommand, ConfigKey};
use crate::core::config::{Config, GeminiModel};
use crate::core::credentials::CredentialStore;
use crate::error::{AppError, Result};

/// Handle configuration commands
pub fn handle_config(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Set { key, value } => handle_set(key, value),
        ConfigCommand::Get { key } => handle_get(key),
        ConfigCommand::Remove { key } => handle_remove(key),
    }
}

/// Apply a file-backed setting; the Gemini key lives in the keyring instead
pub fn apply_setting(config: &mut Config, key: ConfigKey, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
        ConfigKey::GeminiKey => {
            return Err(AppError::InvalidInput(
                "The Gemini key is stored in the system keyring, not the config file".to_string(),
            ))
        }
        ConfigKey::GeminiModel => {
            let model = GeminiModel::parse(value).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Invalid model '{}'. Available models: {}",
                    value,
                    GeminiModel::all()
                        .iter()
                        .map(|m| m.api_name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;
            config.set_gemini_model(model);
        }
        ConfigKey::ModuleSize => {
            let size: usize = value.parse().map_err(|_| {
                AppError::InvalidInput(format!("'{}' is not a number of words", value))
            })?;
            config.set_module_size(size)?;
        }
        ConfigKey::FirebaseApiKey => config.firebase.api_key = non_empty(value, "API key")?,
        ConfigKey::FirebaseProject => config.firebase.project_id = non_empty(value, "project id")?,
    }
    Ok(())
}

fn non_empty(value: &str, what: &str) -> Result<Option<String>> {
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!("The {} cannot be empty", what)));
    }
    Ok(Some(value.to_string()))
}

/// Handle setting a configuration value
fn handle_set(key: ConfigKey, value: String) -> Result<()> {
    if key == ConfigKey::GeminiKey {
        CredentialStore::store_gemini_key(value.trim())?;
        println!("Gemini API key has been stored securely.");
        return Ok(());
    }

    let mut config = Config::load()?;
    apply_setting(&mut config, key, &value)?;
    config.save()?;

    match key {
        ConfigKey::GeminiModel => {
            println!("Gemini model set to: {}", config.gemini_model.display_name())
        }
        ConfigKey::ModuleSize => println!("Module size set to: {} words", config.module_size),
        ConfigKey::FirebaseApiKey => println!("Firebase API key saved."),
        ConfigKey::FirebaseProject => println!("Firebase project set to: {}", value.trim()),
        ConfigKey::GeminiKey => {}
    }
    Ok(())
}

/// Handle getting a configuration value
fn handle_get(key: ConfigKey) -> Result<()> {
    match key {
        ConfigKey::GeminiKey => {
            if let Some(key) = CredentialStore::get_gemini_key()? {
                println!("Gemini API key: {}", CredentialStore::mask_token(&key));
            } else {
                println!("Gemini API key: Not configured");
            }
        }
        ConfigKey::GeminiModel => {
            let config = Config::load()?;
            println!(
                "Gemini model: {} ({})",
                config.gemini_model.display_name(),
                config.gemini_model.api_name()
            );
        }
        ConfigKey::ModuleSize => {
            let config = Config::load()?;
            println!("Module size: {} words", config.module_size());
        }
        ConfigKey::FirebaseApiKey => {
            let config = Config::load()?;
            match config.firebase_api_key() {
                Some(key) => println!("Firebase API key: {}", key),
                None => println!("Firebase API key: Not configured"),
            }
        }
        ConfigKey::FirebaseProject => {
            let config = Config::load()?;
            match config.firebase_project_id() {
                Some(project) => println!("Firebase project: {}", project),
                None => println!("Firebase project: Not configured"),
            }
        }
    }
    Ok(())
}

/// Handle removing a configuration value
fn handle_remove(key: ConfigKey) -> Result<()> {
    if key == ConfigKey::GeminiKey {
        CredentialStore::delete_gemini_key()?;
        println!("Gemini API key has been removed.");
        return Ok(());
    }

    let mut config = Config::load()?;
    let defaults = Config::default();
    match key {
        ConfigKey::GeminiModel => {
            config.set_gemini_model(GeminiModel::default());
            println!(
                "Gemini model reset to default: {}",
                GeminiModel::default().display_name()
            );
        }
        ConfigKey::ModuleSize => {
            config.module_size = defaults.module_size;
            println!("Module size reset to default: {} words", defaults.module_size);
        }
        ConfigKey::FirebaseApiKey => {
            config.firebase.api_key = None;
            println!("Firebase API key has been removed.");
        }
        ConfigKey::FirebaseProject => {
            config.firebase.project_id = None;
            println!("Firebase project has been removed.");
        }
        ConfigKey::GeminiKey => {}
    }
    config.save()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_module_size() {
        let mut config = Config::default();
        apply_setting(&mut config, ConfigKey::ModuleSize, " 12 ").unwrap();
        assert_eq!(config.module_size().get(), 12);

        assert!(apply_setting(&mut config, ConfigKey::ModuleSize, "0").is_err());
        assert!(apply_setting(&mut config, ConfigKey::ModuleSize, "ten").is_err());
        assert_eq!(config.module_size, 12);
    }

    #[test]
    fn test_apply_gemini_model() {
        let mut config = Config::default();
        apply_setting(&mut config, ConfigKey::GeminiModel, "gemini-2.5-pro").unwrap();
        assert_eq!(config.gemini_model, GeminiModel::Gemini25Pro);

        let err = apply_setting(&mut config, ConfigKey::GeminiModel, "gpt-4").unwrap_err();
        assert!(err.to_string().contains("gemini-2.0-flash"));
    }

    #[test]
    fn test_apply_firebase_settings() {
        let mut config = Config::default();
        apply_setting(&mut config, ConfigKey::FirebaseProject, "english-master").unwrap();
        apply_setting(&mut config, ConfigKey::FirebaseApiKey, "AIza-test").unwrap();
        assert_eq!(config.firebase.project_id.as_deref(), Some("english-master"));
        assert_eq!(config.firebase.api_key.as_deref(), Some("AIza-test"));

        assert!(apply_setting(&mut config, ConfigKey::FirebaseProject, "  ").is_err());
    }

    #[test]
    fn test_gemini_key_is_not_a_file_setting() {
        let mut config = Config::default();
        assert!(apply_setting(&mut config, ConfigKey::GeminiKey, "secret").is_err());
    }
}
