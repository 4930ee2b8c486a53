//! AI integration module
//!
//! This module provides Gemini AI integration for:
//! - Dictionary lookups for flashcards
//! - Grammar, exam and writing exercises
//! - Feedback on learner answers
//! - Chat replies and custom lesson generation

pub mod gemini;
pub mod prompts;
pub mod schema;
pub mod tutor;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use gemini::GeminiClient;
pub use tutor::Tutor;

/// Default output budget for a single generation
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// One text generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    /// When set, the model is asked for JSON matching this schema
    pub schema: Option<Value>,
    pub max_tokens: u32,
}

impl GenerateRequest {
    /// Free-form text answer
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            schema: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// JSON answer constrained by `schema`
    pub fn json(prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            prompt: prompt.into(),
            schema: Some(schema),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A language model that turns prompts into text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String>;
}
