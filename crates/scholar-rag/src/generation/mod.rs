//! Prompt assembly, templates and the model gateway

pub mod gateway;
pub mod prompt;
pub mod retry;
pub mod templates;

pub use gateway::LlmGateway;
pub use prompt::{AssembledPrompt, Evidence, PromptAssembler};
pub use retry::RetryPolicy;
pub use templates::{TemplateId, TemplateInfo};
