//! scholar-rag: literature assistant with section-aware retrieval
//!
//! Papers (PDF, Word, HTML, LaTeX, Markdown, plain text) are parsed into a
//! section tree, chunked and embedded into a per-document index, and served
//! through summary and question-answering orchestrators that call an
//! OpenAI-compatible chat API. Everything is stored as flat JSON files.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use server::{state::AppState, ScholarServer};
pub use types::{
    conversation::{Conversation, Turn},
    document::{Chunk, Document, DocumentFormat, DocumentStatus, Section},
    response::{AnswerResponse, SummaryRecord},
};
