//! EnglishMaster - a terminal English-learning app
//!
//! This library provides both CLI and TUI interfaces for studying the
//! built-in vocabulary and grammar curriculum, with Firebase accounts and
//! storage and Gemini-powered practice and feedback.

pub mod ai;
pub mod auth;
pub mod cli;
pub mod core;
pub mod error;
pub mod services;
pub mod store;
pub mod tui;

pub use error::{AppError, Result};
