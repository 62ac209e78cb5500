//! Provider abstractions for embeddings and chat completions
//!
//! Backends are selected from configuration at startup; the rest of the
//! pipeline only sees the traits.

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod openai;

pub use embedding::EmbeddingProvider;
pub use hashing::HashingEmbedder;
pub use llm::{Completion, LlmProvider, Prompt};
pub use openai::{OpenAiClient, OpenAiEmbedder};

use std::sync::Arc;

use crate::config::{AppConfig, EmbeddingBackend};
use crate::error::Result;
use crate::generation::retry::RetryPolicy;

/// Build the configured embedding backend
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embeddings.backend {
        EmbeddingBackend::OpenAi => {
            tracing::info!(
                "Using OpenAI-compatible embeddings ({} at {})",
                config.embeddings.model,
                config.embeddings.base_url
            );
            Ok(Arc::new(OpenAiEmbedder::new(
                &config.embeddings,
                config.llm.timeout(),
                RetryPolicy::from(&config.llm),
            )?))
        }
        EmbeddingBackend::Hashing => {
            tracing::info!("Using local hashing embeddings ({} dims)", config.embeddings.dimensions);
            Ok(Arc::new(HashingEmbedder::new(config.embeddings.dimensions)))
        }
    }
}
