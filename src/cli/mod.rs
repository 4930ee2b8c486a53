//! CLI module for EnglishMaster
//!
//! This module contains all CLI command definitions and handlers using clap.

pub mod auth;
pub mod commands;
pub mod config;
pub mod vocab;
pub mod word;

pub use commands::{Cli, Commands};
