//! Core functionality for EnglishMaster
//!
//! This module contains shared business logic including:
//! - Built-in learning content
//! - Vocabulary module partitioning
//! - Navigation state and screen routing
//! - Session tracking
//! - Credential management
//! - Application configuration

pub mod config;
pub mod content;
pub mod credentials;
pub mod navigation;
pub mod partition;
pub mod records;
pub mod router;
pub mod session;

pub use config::Config;
pub use content::Catalog;
pub use credentials::CredentialStore;
pub use navigation::{NavigationController, RequestToken, Screen};
pub use session::{SessionGate, SessionState};
