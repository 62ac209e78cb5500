//! Upload intake and the parse/index state machine
//!
//! `uploaded -> parsing -> parsed | failed`. Any failed stage leaves the
//! document `failed` with the reason recorded. Work on one document is
//! serialized; different documents proceed independently.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::{hash_content, DocumentParser, Indexer};
use crate::retrieval::ChunkIndex;
use crate::storage::{ConversationStore, DocumentStore};
use crate::types::{Document, DocumentFormat, DocumentStatus};

/// Outcome of accepting one uploaded file
#[derive(Debug, Clone)]
pub enum Intake {
    /// Stored as a new document
    Created(Document),
    /// Same bytes were uploaded before
    Duplicate(Document),
}

impl Intake {
    pub fn document(&self) -> &Document {
        match self {
            Intake::Created(doc) | Intake::Duplicate(doc) => doc,
        }
    }
}

/// Runs parsing and indexing for stored documents
pub struct ProcessingWorker {
    parser: DocumentParser,
    indexer: Indexer,
    documents: Arc<DocumentStore>,
    conversations: Arc<ConversationStore>,
    index: Arc<ChunkIndex>,
    max_file_size: usize,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ProcessingWorker {
    pub fn new(
        parser: DocumentParser,
        indexer: Indexer,
        documents: Arc<DocumentStore>,
        conversations: Arc<ConversationStore>,
        index: Arc<ChunkIndex>,
        max_file_size: usize,
    ) -> Self {
        Self {
            parser,
            indexer,
            documents,
            conversations,
            index,
            max_file_size,
            locks: DashMap::new(),
        }
    }

    /// Validate and store an upload. Parsing happens in [`process`](Self::process).
    pub async fn accept(&self, filename: &str, data: &[u8], declared_mime: Option<&str>) -> Result<Intake> {
        if data.is_empty() {
            return Err(Error::invalid(format!("'{}' is empty", filename)));
        }
        if data.len() > self.max_file_size {
            return Err(Error::invalid(format!(
                "'{}' is {} bytes, above the {} byte limit",
                filename,
                data.len(),
                self.max_file_size
            )));
        }

        let format = DocumentFormat::detect(filename, data, declared_mime)?;
        let hash = hash_content(data);
        if let Some(existing) = self.documents.find_by_hash(&hash) {
            tracing::info!("'{}' duplicates document {} ({})", filename, existing.id, existing.filename);
            return Ok(Intake::Duplicate(existing));
        }

        let doc = Document::new(filename, format, data.len() as u64, hash);
        let doc = self.documents.create(doc, data).await?;
        tracing::info!("Stored '{}' as {} ({} bytes)", filename, doc.id, data.len());
        Ok(Intake::Created(doc))
    }

    /// Parse and index a stored document (also used for reprocessing)
    pub async fn process(&self, id: Uuid) -> Result<Document> {
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        let _guard = lock.lock().await;
        let start = Instant::now();

        let doc = self
            .documents
            .update(id, |d| d.set_status(DocumentStatus::Parsing, None))
            .await?;

        match self.run_stages(&doc).await {
            Ok(doc) => {
                tracing::info!(
                    "Processed '{}' in {:.1}s: {} sections, {} chunks",
                    doc.filename,
                    start.elapsed().as_secs_f64(),
                    doc.sections.len(),
                    doc.chunk_count
                );
                Ok(doc)
            }
            Err(e) => {
                tracing::error!("Processing '{}' failed: {}", doc.filename, e);
                Err(self.mark_failed(id, e).await)
            }
        }
    }

    /// Record the failure on the document; the processing error is what callers see
    async fn mark_failed(&self, id: Uuid, error: Error) -> Error {
        let reason = error.to_string();
        if let Err(store_err) = self
            .documents
            .update(id, |d| d.set_status(DocumentStatus::Failed, Some(reason)))
            .await
        {
            tracing::error!("Could not mark {} as failed: {}", id, store_err);
        }
        error
    }

    async fn run_stages(&self, doc: &Document) -> Result<Document> {
        let data = self.documents.read_original(doc.id).await?;
        let parsed = self.parser.parse(&doc.filename, &data, None).await?;
        for issue in &parsed.issues {
            tracing::warn!("'{}': {:?} {}", doc.filename, issue.page, issue.message);
        }

        let parsed_doc = self.documents.update(doc.id, |d| parsed.apply_to(d)).await?;
        let snapshot = self.indexer.index_document(&parsed_doc).await?;

        self.documents
            .update(doc.id, |d| {
                d.chunk_count = snapshot.len();
                d.indexed_at = Some(Utc::now());
                d.set_status(DocumentStatus::Parsed, None);
            })
            .await
    }

    /// Process in the background
    pub fn spawn(self: &Arc<Self>, id: Uuid) {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = worker.process(id).await {
                tracing::debug!("Background processing of {} ended with: {}", id, e);
            }
        });
    }

    /// Delete a document with its index and conversations
    pub async fn delete(&self, id: Uuid) -> Result<Document> {
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        let _guard = lock.lock().await;

        self.index.remove(id).await?;
        let doc = self.documents.delete(id).await?;
        let dropped = self.conversations.forget_document(id);
        if dropped > 0 {
            tracing::info!("Dropped {} conversations with document {}", dropped, id);
        }
        drop(_guard);
        self.locks.remove(&id);
        Ok(doc)
    }
}
