//! API routes for the literature server

pub mod conversations;
pub mod documents;
pub mod qa;
pub mod summaries;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Documents - uploads get the larger body limit
        .route(
            "/documents",
            get(documents::list_documents)
                .post(documents::upload_documents)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/url", post(documents::import_url))
        .route("/documents/:id/reprocess", post(documents::reprocess_document))
        .route("/documents/:id/keywords", get(documents::document_keywords))
        .route("/documents/:id/summaries", get(documents::document_summaries))
        // Summaries
        .route("/summaries", post(summaries::create_summary))
        .route("/summaries/templates", get(summaries::list_templates))
        // Q&A
        .route("/qa/ask", post(qa::ask_question))
        .route("/qa/suggestions/:document_id", get(qa::question_suggestions))
        // Conversations
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::start_conversation),
        )
        .route(
            "/conversations/:id",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .route("/conversations/:id/turns", post(conversations::continue_conversation))
        .route("/conversations/:id/export", get(conversations::export_conversation))
        .route("/conversations/:id/archive", post(conversations::archive_conversation))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "scholar-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Paper parsing, summaries and grounded Q&A over uploaded literature",
        "endpoints": {
            "POST /api/documents": "Upload papers (multipart 'files'; ?wait=true parses before responding)",
            "POST /api/documents/url": "Import a paper from a URL (JSON url, filename; ?wait=true)",
            "GET /api/documents": "List documents (skip, limit, status)",
            "GET /api/documents/:id": "Get the parsed document tree",
            "DELETE /api/documents/:id": "Delete a document with its index and conversations",
            "POST /api/documents/:id/reprocess": "Re-parse and rebuild the index",
            "GET /api/documents/:id/keywords": "Keyword suggestions",
            "GET /api/documents/:id/summaries": "Stored summaries",
            "POST /api/summaries": "Generate a full, section or custom summary",
            "GET /api/summaries/templates": "Summary templates",
            "POST /api/qa/ask": "Ask a question about a document",
            "GET /api/qa/suggestions/:document_id": "Suggested questions (question_type)",
            "POST /api/conversations": "Start a conversation",
            "GET /api/conversations": "List conversations (document_id, status, skip, limit)",
            "GET /api/conversations/:id": "Get a conversation",
            "POST /api/conversations/:id/turns": "Continue a conversation",
            "GET /api/conversations/:id/export": "Export as json or markdown",
            "POST /api/conversations/:id/archive": "Archive a conversation",
            "DELETE /api/conversations/:id": "Delete a conversation"
        },
        "formats": ["pdf", "docx", "html", "tex", "md", "txt"]
    }))
}
