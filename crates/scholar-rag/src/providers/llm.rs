//! LLM provider trait for chat completions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::TokenUsage;

/// A fully assembled request for the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// System instruction
    pub system: String,
    /// User message: evidence, history and the query
    pub user: String,
    /// Overrides the configured temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Overrides the configured completion limit
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Total size in chars, the unit the prompt budget is expressed in
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// Model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Raw completion text
    pub text: String,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
    /// Attempts used, including retries
    pub attempts: u32,
}

/// Trait for LLM text generation
///
/// Implementations:
/// - `LlmGateway`: OpenAI-compatible chat completions (DeepSeek, OpenAI, vLLM, ...)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a prompt
    async fn complete(&self, prompt: &Prompt) -> Result<Completion>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
