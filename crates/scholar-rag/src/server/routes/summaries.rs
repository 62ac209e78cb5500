//! Summary endpoints

use axum::{extract::State, Json};

use crate::error::Result;
use crate::generation::{TemplateId, TemplateInfo};
use crate::server::state::AppState;
use crate::types::{SummaryRecord, SummaryRequest};

/// POST /api/summaries - Generate a full, section or custom summary
pub async fn create_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<SummaryRecord>> {
    Ok(Json(state.summarizer().summarize(&request).await?))
}

/// GET /api/summaries/templates - Registered summary templates
pub async fn list_templates() -> Json<Vec<TemplateInfo>> {
    Json(
        TemplateId::all()
            .iter()
            .copied()
            .filter(|t| *t != TemplateId::QuestionAnswer)
            .map(TemplateInfo::from)
            .collect(),
    )
}
