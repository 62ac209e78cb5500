//! Request types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::response::SummaryKind;

/// Pagination parameters shared by listing endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}

/// Which section to summarize
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SectionSelector {
    Index(usize),
    Heading(String),
}

/// Summary request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub document_id: Uuid,
    pub kind: SummaryKind,
    /// Section to summarize; all sections when absent
    #[serde(default)]
    pub section: Option<SectionSelector>,
    /// Focus keywords (custom summaries)
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Structured template id (custom summaries)
    #[serde(default)]
    pub template: Option<String>,
}

/// Question about a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub document_id: Uuid,
    pub question: String,
    /// Continue this conversation instead of asking standalone
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    /// Override retrieved chunk count
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Start a conversation, optionally with its first question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConversationRequest {
    pub document_id: Uuid,
    #[serde(default)]
    pub question: Option<String>,
}

/// Continue a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueConversationRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}
