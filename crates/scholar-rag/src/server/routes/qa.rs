//! Question answering endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::processing::question_suggestions as suggest;
use crate::server::state::AppState;
use crate::types::{AnswerResponse, AskRequest, QuestionType, SuggestionsResponse};

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionsQuery {
    pub question_type: Option<QuestionType>,
}

/// POST /api/qa/ask - Answer a question about one document
pub async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AnswerResponse>> {
    tracing::info!("Question on {}: {}", request.document_id, request.question);
    Ok(Json(state.qa().ask(&request).await?))
}

/// GET /api/qa/suggestions/:document_id - Questions worth asking about a document
pub async fn question_suggestions(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Query(query): Query<SuggestionsQuery>,
) -> Result<Json<SuggestionsResponse>> {
    let doc = state.documents().get(document_id)?;
    Ok(Json(SuggestionsResponse {
        document_id,
        question_type: query.question_type,
        suggestions: suggest(&doc, query.question_type),
    }))
}
