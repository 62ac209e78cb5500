//! Conversation log types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::response::{QuestionType, TokenUsage};

const TITLE_MAX_CHARS: usize = 50;

/// Lifecycle of a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Archived,
}

impl std::str::FromStr for ConversationStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(crate::error::Error::invalid(format!("Unknown conversation status '{}'", other))),
        }
    }
}

/// One question/answer exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    /// Chunks the answer was grounded on, best first
    pub retrieved_chunk_ids: Vec<Uuid>,
    /// Similarity score per retrieved chunk
    #[serde(default)]
    pub scores: Vec<f32>,
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    pub asked_at: DateTime<Utc>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    /// Wall-clock time spent answering
    #[serde(default)]
    pub processing_ms: u64,
}

/// Append-only question/answer log bound to one document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    pub title: String,
    pub status: ConversationStatus,
    #[serde(default)]
    turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Start an empty conversation
    pub fn new(document_id: Uuid, document_title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id,
            document_title: document_title.into(),
            title: "New conversation".to_string(),
            status: ConversationStatus::Active,
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Turns in the order they were asked
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Append a turn; the first question also names the conversation
    pub fn append(&mut self, turn: Turn) {
        if self.turns.is_empty() {
            self.title = title_from_question(&turn.question);
        }
        self.updated_at = turn.asked_at.max(self.updated_at);
        self.turns.push(turn);
    }

    pub fn archive(&mut self) {
        self.status = ConversationStatus::Archived;
        self.updated_at = Utc::now();
    }

    /// Render as Markdown for export
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        out.push_str(&format!("- Document: {} (`{}`)\n", self.document_title, self.document_id));
        out.push_str(&format!("- Started: {}\n", self.created_at.to_rfc3339()));
        out.push_str(&format!("- Turns: {}\n", self.turns.len()));

        for (i, turn) in self.turns.iter().enumerate() {
            out.push_str(&format!("\n## Q{}: {}\n\n", i + 1, turn.question));
            out.push_str(turn.answer.trim());
            out.push('\n');
            if !turn.retrieved_chunk_ids.is_empty() {
                out.push_str(&format!("\n_Sources: {} chunk(s)_\n", turn.retrieved_chunk_ids.len()));
            }
        }
        out
    }
}

fn title_from_question(question: &str) -> String {
    let question = question.trim();
    if question.chars().count() > TITLE_MAX_CHARS {
        let head: String = question.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        question.to_string()
    }
}

/// Listing view of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    pub title: String,
    pub status: ConversationStatus,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id,
            document_id: c.document_id,
            document_title: c.document_title.clone(),
            title: c.title.clone(),
            status: c.status,
            turn_count: c.turns.len(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(q: &str) -> Turn {
        Turn {
            question: q.to_string(),
            answer: format!("answer to {}", q),
            retrieved_chunk_ids: vec![Uuid::new_v4()],
            scores: vec![0.9],
            question_type: None,
            asked_at: Utc::now(),
            usage: None,
            processing_ms: 1,
        }
    }

    #[test]
    fn test_title_from_first_question() {
        let mut c = Conversation::new(Uuid::new_v4(), "Paper");
        c.append(turn("What is the main contribution?"));
        c.append(turn("And the limitations?"));
        assert_eq!(c.title, "What is the main contribution?");
        assert_eq!(c.turns().len(), 2);
    }

    #[test]
    fn test_long_title_truncated() {
        let mut c = Conversation::new(Uuid::new_v4(), "Paper");
        let q = "x".repeat(80);
        c.append(turn(&q));
        assert_eq!(c.title, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn test_markdown_export_lists_turns_in_order() {
        let mut c = Conversation::new(Uuid::new_v4(), "Paper");
        c.append(turn("first"));
        c.append(turn("second"));
        let md = c.to_markdown();
        let first = md.find("## Q1: first").unwrap();
        let second = md.find("## Q2: second").unwrap();
        assert!(first < second);
    }
}
