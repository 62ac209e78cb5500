//! Document upload and management endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::{suggest_keywords, Intake};
use crate::server::state::AppState;
use crate::types::{
    Document, DocumentListResponse, DocumentStatus, DocumentSummary, KeywordSuggestions, Page,
    SummaryRecord, UploadError, UploadResponse,
};

/// Query parameters for uploads
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Parse and index before responding
    #[serde(default)]
    pub wait: bool,
}

/// Body for importing a paper by URL
#[derive(Debug, Deserialize)]
pub struct ImportUrlRequest {
    pub url: String,
    /// Stored filename; defaults to the last URL path segment
    #[serde(default)]
    pub filename: Option<String>,
}

/// Query parameters for listing documents
#[derive(Debug, Default, Deserialize)]
pub struct ListDocumentsQuery {
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// uploaded, parsing, parsed or failed
    #[serde(default)]
    pub status: Option<String>,
}

/// POST /api/documents - Upload one or more files
pub async fn upload_documents(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();
    let max_batch = state.config().limits.max_batch_size;
    let mut documents = Vec::new();
    let mut errors = Vec::new();
    let mut received = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid(format!("Failed to read multipart field: {}", e)))?
    {
        // only file parts count; stray form fields are ignored
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        received += 1;
        if received > max_batch {
            errors.push(upload_error(
                &filename,
                &Error::invalid(format!("Batch limit of {} files exceeded", max_batch)),
            ));
            continue;
        }

        let mime = field.content_type().map(|s| s.to_string());
        let data = match field.bytes().await {
            Ok(d) => d,
            Err(e) => {
                errors.push(upload_error(
                    &filename,
                    &Error::invalid(format!("Failed to read file: {}", e)),
                ));
                continue;
            }
        };
        tracing::info!("Received file: {} ({} bytes)", filename, data.len());

        let intake = match state.worker().accept(&filename, &data, mime.as_deref()).await {
            Ok(intake) => intake,
            Err(e) => {
                tracing::warn!("Rejected '{}': {}", filename, e);
                errors.push(upload_error(&filename, &e));
                continue;
            }
        };
        let doc = schedule(&state, intake, query.wait, &mut errors).await?;
        documents.push(DocumentSummary::from(&doc));
    }

    if received == 0 {
        return Err(Error::invalid("No files in upload (expected multipart 'files' fields)"));
    }

    Ok(Json(UploadResponse {
        documents,
        errors,
        processing_ms: start.elapsed().as_millis() as u64,
    }))
}

/// POST /api/documents/url - Download a paper and ingest it
pub async fn import_url(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    Json(request): Json<ImportUrlRequest>,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();
    let file = state
        .fetcher()
        .fetch(&request.url, request.filename.as_deref())
        .await?;
    let intake = state
        .worker()
        .accept(&file.filename, &file.data, file.content_type.as_deref())
        .await?;

    let mut errors = Vec::new();
    let doc = schedule(&state, intake, query.wait, &mut errors).await?;
    Ok(Json(UploadResponse {
        documents: vec![DocumentSummary::from(&doc)],
        errors,
        processing_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Parse now when `wait` is set, otherwise in the background. A failed
/// parse is reported in `errors` and the stored document is returned.
async fn schedule(state: &AppState, intake: Intake, wait: bool, errors: &mut Vec<UploadError>) -> Result<Document> {
    match intake {
        Intake::Duplicate(existing) => Ok(existing),
        Intake::Created(doc) if wait => match state.worker().process(doc.id).await {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                errors.push(upload_error(&doc.filename, &e));
                state.documents().get(doc.id)
            }
        },
        Intake::Created(doc) => {
            state.worker().spawn(doc.id);
            Ok(doc)
        }
    }
}

fn upload_error(filename: &str, error: &Error) -> UploadError {
    UploadError {
        filename: filename.to_string(),
        error_kind: error.kind().to_string(),
        message: error.to_string(),
    }
}

/// GET /api/documents - List documents, newest first
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<DocumentListResponse>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty() && *s != "all")
        .map(str::parse::<DocumentStatus>)
        .transpose()?;
    let page = Page {
        skip: query.skip.unwrap_or(0),
        limit: query.limit.unwrap_or(Page::default().limit),
    };

    let all = state.documents().list(status);
    let total_count = all.len();
    let documents = all
        .iter()
        .skip(page.skip)
        .take(page.limit)
        .map(DocumentSummary::from)
        .collect();

    Ok(Json(DocumentListResponse {
        documents,
        total_count,
    }))
}

/// GET /api/documents/:id - Full document tree
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>> {
    Ok(Json(state.documents().get(id)?))
}

/// DELETE /api/documents/:id - Delete a document with its index and conversations
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentSummary>> {
    let doc = state.worker().delete(id).await?;
    Ok(Json(DocumentSummary::from(&doc)))
}

/// POST /api/documents/:id/reprocess - Re-parse and rebuild the index
pub async fn reprocess_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>> {
    let doc = state.documents().get(id)?;
    if doc.status == DocumentStatus::Parsing {
        return Err(Error::invalid(format!("Document {} is already being processed", id)));
    }
    tracing::info!("Reprocessing '{}' ({})", doc.filename, id);
    Ok(Json(state.worker().process(id).await?))
}

/// GET /api/documents/:id/keywords - Keyword suggestions for custom summaries
pub async fn document_keywords(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<KeywordSuggestions>> {
    let doc = state.documents().get(id)?;
    Ok(Json(KeywordSuggestions {
        document_id: id,
        keywords: suggest_keywords(&doc),
    }))
}

/// GET /api/documents/:id/summaries - Stored summaries, oldest first
pub async fn document_summaries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SummaryRecord>>> {
    Ok(Json(state.documents().summaries(id).await?))
}
