//! Conversation endpoints

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{
    AnswerResponse, Conversation, ConversationListResponse, ConversationStatus,
    ConversationSummary, ContinueConversationRequest, Page, StartConversationRequest,
};

/// Query parameters for listing conversations
#[derive(Debug, Default, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub document_id: Option<Uuid>,
    /// active or archived
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Query parameters for export
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    /// json (default) or markdown
    #[serde(default)]
    pub format: Option<String>,
}

/// Response for a started conversation
#[derive(Debug, Serialize)]
pub struct StartConversationResponse {
    pub conversation: Conversation,
    /// Answer to the opening question, if one was asked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerResponse>,
}

/// POST /api/conversations - Start a conversation
pub async fn start_conversation(
    State(state): State<AppState>,
    Json(request): Json<StartConversationRequest>,
) -> Result<Json<StartConversationResponse>> {
    let (conversation, answer) = state.qa().start_conversation(&request).await?;
    Ok(Json(StartConversationResponse {
        conversation,
        answer,
    }))
}

/// GET /api/conversations - List conversations, most recently updated first
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<ConversationListResponse>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty() && *s != "all")
        .map(str::parse::<ConversationStatus>)
        .transpose()?;
    let page = Page {
        skip: query.skip.unwrap_or(0),
        limit: query.limit.unwrap_or(Page::default().limit),
    };

    let all = state.conversations().list(query.document_id, status).await?;
    let total_count = all.len();
    let conversations = all
        .iter()
        .skip(page.skip)
        .take(page.limit)
        .map(ConversationSummary::from)
        .collect();

    Ok(Json(ConversationListResponse {
        conversations,
        total_count,
    }))
}

/// GET /api/conversations/:id
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>> {
    Ok(Json(state.conversations().get(id).await?))
}

/// POST /api/conversations/:id/turns - Ask the next question
pub async fn continue_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ContinueConversationRequest>,
) -> Result<Json<AnswerResponse>> {
    let answer = state
        .qa()
        .continue_conversation(id, &request.question, request.top_k)
        .await?;
    Ok(Json(answer))
}

/// GET /api/conversations/:id/export - JSON or Markdown transcript
pub async fn export_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let conversation = state.conversations().get(id).await?;
    match query.format.as_deref().unwrap_or("json") {
        "json" => Ok(Json(conversation).into_response()),
        "markdown" | "md" => Ok((
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            conversation.to_markdown(),
        )
            .into_response()),
        other => Err(Error::invalid(format!(
            "Unknown export format '{}' (expected json or markdown)",
            other
        ))),
    }
}

/// POST /api/conversations/:id/archive
pub async fn archive_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationSummary>> {
    let conversation = state.conversations().archive(id).await?;
    Ok(Json(ConversationSummary::from(&conversation)))
}

/// DELETE /api/conversations/:id
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.conversations().delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}
