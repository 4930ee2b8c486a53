//! Authentication CLI command handlers

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Utc;

use crate::auth::firebase::FirebaseAuth;
use crate::auth::profile::DocumentProfileStore;
use crate::auth::AuthProvider;
use crate::cli::commands::AuthCommand;
use crate::core::config::Config;
use crate::core::credentials::CredentialStore;
use crate::core::records::UserProfile;
use crate::error::{AppError, Result};
use crate::store::firestore::FirestoreStore;

/// Handle authentication commands
pub async fn handle_auth(command: AuthCommand) -> Result<()> {
    let config = Config::load()?;
    match command {
        AuthCommand::Login { email } => handle_login(&config, email).await,
        AuthCommand::Signup { email, name } => handle_signup(&config, email, name).await,
        AuthCommand::Logout => handle_logout(&config).await,
        AuthCommand::Status => handle_status(&config),
    }
}

/// Read one trimmed line from stdin after printing `label`
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_required(label: &str, given: Option<String>, what: &str) -> Result<String> {
    let value = match given {
        Some(value) => value.trim().to_string(),
        None => prompt(label)?,
    };
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!("No {} provided", what)));
    }
    Ok(value)
}

/// Handle the login command
async fn handle_login(config: &Config, email: Option<String>) -> Result<()> {
    let auth = FirebaseAuth::from_config(config)?;

    if let Some(user) = auth.current_user() {
        println!("✓ Already signed in as {} ({}).", user.label(), user.email);
        println!();
        println!("  To switch accounts, first run: em auth logout");
        return Ok(());
    }

    let email = prompt_required("Email: ", email, "email")?;
    let password = prompt_required("Password: ", None, "password")?;

    println!();
    println!("Signing in...");
    let user = auth.sign_in(&email, &password).await?;

    println!("\n✓ Signed in as {}!", user.label());
    Ok(())
}

/// Handle the signup command: create the account and its learner profile
async fn handle_signup(config: &Config, email: Option<String>, name: Option<String>) -> Result<()> {
    let (_, project_id) = config.require_firebase()?;
    let auth = Arc::new(FirebaseAuth::from_config(config)?);

    if let Some(user) = auth.current_user() {
        println!("✓ Already signed in as {}.", user.label());
        println!();
        println!("  To create another account, first run: em auth logout");
        return Ok(());
    }

    let display_name = prompt_required("Display name: ", name, "display name")?;
    let email = prompt_required("Email: ", email, "email")?;
    let password = prompt_required("Password (at least 6 characters): ", None, "password")?;
    if password.chars().count() < 6 {
        return Err(AppError::InvalidInput(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    println!();
    println!("Creating account...");
    let user = auth.sign_up(&email, &password, &display_name).await?;

    let profiles = DocumentProfileStore::new(Arc::new(FirestoreStore::new(&project_id, auth.clone())));
    let profile = UserProfile::new_learner(&user.uid, &user.email, &display_name);
    if let Err(e) = profiles.create_profile(&profile).await {
        tracing::warn!(error = %e, "failed to create profile");
        eprintln!("Warning: account created, but the profile could not be saved: {}", e);
    }

    println!("\n✓ Welcome, {}! You are now signed in.", display_name);
    Ok(())
}

/// Handle the logout command
async fn handle_logout(config: &Config) -> Result<()> {
    let signed_in = match FirebaseAuth::from_config(config) {
        Ok(auth) if auth.current_user().is_some() => {
            auth.sign_out().await?;
            true
        }
        // Without Firebase settings there can still be a stale session
        _ => match CredentialStore::get_session()? {
            Some(_) => {
                CredentialStore::delete_session()?;
                true
            }
            None => false,
        },
    };

    if signed_in {
        println!("Successfully signed out.");
    } else {
        println!("Not currently signed in.");
    }
    Ok(())
}

/// Handle the status command
fn handle_status(config: &Config) -> Result<()> {
    let session = CredentialStore::get_session()?;
    let gemini_key = CredentialStore::get_gemini_key()?;
    let firebase_ready = config.require_firebase().is_ok();

    println!("Authentication Status:");
    println!(
        "  Firebase: {}",
        if firebase_ready {
            "Configured"
        } else {
            "Not configured"
        }
    );
    match &session {
        Some(session) => {
            let identity = session.identity();
            println!("  Account:  {} ({})", identity.label(), identity.email);
        }
        None => println!("  Account:  Not signed in"),
    }
    println!(
        "  Gemini:   {}",
        if gemini_key.is_some() {
            "Configured"
        } else {
            "Not configured"
        }
    );

    if let Some(session) = session {
        let expires_in = session.expires_at.signed_duration_since(Utc::now());
        if expires_in.num_seconds() > 0 {
            println!("\n  Session token expires in: {}m", expires_in.num_minutes());
        } else {
            println!("\n  Session token expired (will refresh on next request)");
        }
    }

    if let Some(key) = gemini_key {
        println!("  Gemini key: {}", CredentialStore::mask_token(&key));
    }

    Ok(())
}
