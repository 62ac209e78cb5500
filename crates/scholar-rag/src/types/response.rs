//! Response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::ConversationSummary;
use super::document::{Chunk, DocumentSummary, SectionKind};

/// Token accounting reported by the model API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Coarse intent of a question
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Looks something up ("what", "who", "when")
    Factual,
    /// Asks for a causal or argumentative chain ("why", "how")
    Logical,
    /// Asks for judgement ("evaluate", "compare", "limitations")
    Analytical,
}

/// A chunk used as evidence in an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub chunk_id: Uuid,
    pub section_index: usize,
    pub section_heading: String,
    pub char_offset: usize,
    pub score: f32,
    /// First chars of the chunk text
    pub snippet: String,
}

impl SourceRef {
    const SNIPPET_CHARS: usize = 240;

    pub fn new(chunk: &Chunk, score: f32) -> Self {
        let mut snippet: String = chunk.text.chars().take(Self::SNIPPET_CHARS).collect();
        if chunk.text.chars().count() > Self::SNIPPET_CHARS {
            snippet.push_str("...");
        }
        Self {
            chunk_id: chunk.id,
            section_index: chunk.section_index,
            section_heading: chunk.section_heading.clone(),
            char_offset: chunk.char_offset,
            score,
            snippet,
        }
    }
}

/// Suggested questions for a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub document_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    pub suggestions: Vec<String>,
}

/// Answer to a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub document_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    pub question: String,
    pub answer: String,
    pub question_type: QuestionType,
    /// Best similarity score, clamped to [0, 1]
    pub confidence: f32,
    pub sources: Vec<SourceRef>,
    pub follow_up_questions: Vec<String>,
    pub usage: Option<TokenUsage>,
    /// Model API attempts, including retries
    pub attempts: u32,
    pub processing_ms: u64,
}

/// Summary flavour
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    Full,
    Section,
    Custom,
}

/// Summary of a single section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    pub section_index: usize,
    pub heading: String,
    pub kind: SectionKind,
    /// Present on success
    pub summary: Option<String>,
    /// Present when this section could not be summarized
    pub error: Option<String>,
}

/// A generated summary, as stored in the document's summary log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub kind: SummaryKind,
    /// Template that produced `text`
    pub template: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Whole-document or custom summary text
    #[serde(default)]
    pub text: Option<String>,
    /// Per-section results for section summaries
    #[serde(default)]
    pub sections: Vec<SectionSummary>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    pub created_at: DateTime<Utc>,
    pub processing_ms: u64,
}

/// Response for document listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
    pub total_count: usize,
}

/// Per-file upload failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadError {
    pub filename: String,
    pub error_kind: String,
    pub message: String,
}

/// Response for uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub documents: Vec<DocumentSummary>,
    pub errors: Vec<UploadError>,
    pub processing_ms: u64,
}

/// Response for conversation listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub total_count: usize,
}

/// Keyword suggestions for custom summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSuggestions {
    pub document_id: Uuid,
    pub keywords: Vec<String>,
}
