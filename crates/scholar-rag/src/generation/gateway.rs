//! Chat-completion gateway for OpenAI-compatible APIs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::retry::RetryPolicy;
use crate::providers::llm::{Completion, LlmProvider, Prompt};
use crate::providers::openai::OpenAiClient;
use crate::types::TokenUsage;

/// Sends assembled prompts to `{base_url}/chat/completions`
pub struct LlmGateway {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl LlmGateway {
    /// Create a gateway from configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Self::with_policy(config, RetryPolicy::from(config))
    }

    /// Create a gateway with an explicit retry policy
    pub fn with_policy(config: &LlmConfig, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: OpenAiClient::new(&config.base_url, &config.api_key, config.timeout(), policy)?,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

fn into_completion(response: ChatResponse) -> Result<(String, Option<TokenUsage>)> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::transient("Model returned an empty completion"))?;
    Ok((text, response.usage))
}

#[async_trait]
impl LlmProvider for LlmGateway {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion> {
        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &prompt.system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.user,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: prompt.temperature.unwrap_or(self.temperature),
            max_tokens: prompt.max_tokens.unwrap_or(self.max_tokens),
            stream: false,
        };

        tracing::debug!("Sending {} prompt chars to {}", prompt.char_len(), self.model);
        let ((text, usage), attempts) = self
            .client
            .post_json_map("/chat/completions", &request, "chat completion", into_completion)
            .await?;

        if let Some(usage) = &usage {
            tracing::debug!(
                "Completion used {} prompt + {} completion tokens",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        Ok(Completion { text, usage, attempts })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.client.is_reachable().await)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
