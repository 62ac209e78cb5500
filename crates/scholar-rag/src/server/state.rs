//! Application state for the literature server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::generation::LlmGateway;
use crate::ingestion::{DocumentParser, Indexer, OcrEngine, RemoteFetcher, TextChunker};
use crate::processing::{ProcessingWorker, QaService, Summarizer};
use crate::providers::{build_embedder, EmbeddingProvider, LlmProvider};
use crate::retrieval::{ChunkIndex, Retriever};
use crate::storage::{ConversationStore, DocumentStore, StorageLayout};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: AppConfig,
    /// Document registry and summary logs
    documents: Arc<DocumentStore>,
    /// Conversation logs
    conversations: Arc<ConversationStore>,
    /// Per-document chunk indexes
    index: Arc<ChunkIndex>,
    /// Parse/index state machine
    worker: Arc<ProcessingWorker>,
    /// URL imports
    fetcher: RemoteFetcher,
    summarizer: Summarizer,
    qa: QaService,
    /// Embedding provider (API or local hashing)
    embedder: Arc<dyn EmbeddingProvider>,
    /// Chat-completion provider
    llm: Arc<dyn LlmProvider>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create application state with the configured providers
    pub async fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("Initializing application state (data dir: {})", config.storage.data_dir.display());

        let embedder = build_embedder(&config)?;
        let llm: Arc<dyn LlmProvider> = Arc::new(LlmGateway::new(&config.llm)?);
        tracing::info!("LLM gateway initialized ({} at {})", config.llm.model, config.llm.base_url);

        Self::with_providers(config, embedder, llm).await
    }

    /// Create application state around given providers
    pub async fn with_providers(
        config: AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let layout = StorageLayout::new(&config.storage.data_dir);
        let documents = Arc::new(DocumentStore::open(layout.clone()).await?);
        let conversations = Arc::new(ConversationStore::open(layout.clone()).await?);
        let index = Arc::new(ChunkIndex::new(layout));

        let ocr = OcrEngine::new(config.ocr.clone());
        if ocr.enabled() && !ocr.is_available().await {
            tracing::warn!(
                "OCR enabled but {} / {} not found; scanned pages will be skipped",
                config.ocr.tesseract_cmd,
                config.ocr.pdftoppm_cmd
            );
        }
        let parser = DocumentParser::new(ocr, config.ocr.min_chars_per_page);
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
        let indexer = Indexer::new(
            chunker,
            Arc::clone(&embedder),
            Arc::clone(&index),
            config.embeddings.batch_size,
        );
        let worker = Arc::new(ProcessingWorker::new(
            parser,
            indexer,
            Arc::clone(&documents),
            Arc::clone(&conversations),
            Arc::clone(&index),
            config.limits.max_file_size,
        ));

        let fetcher = RemoteFetcher::new(config.limits.fetch_timeout(), config.limits.max_file_size)?;

        let retriever = Arc::new(Retriever::new(Arc::clone(&index), Arc::clone(&embedder)));
        let summarizer = Summarizer::new(
            Arc::clone(&documents),
            Arc::clone(&retriever),
            Arc::clone(&llm),
            &config.prompt,
        );
        let qa = QaService::new(
            Arc::clone(&documents),
            Arc::clone(&conversations),
            retriever,
            Arc::clone(&llm),
            &config.prompt,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                documents,
                conversations,
                index,
                worker,
                fetcher,
                summarizer,
                qa,
                embedder,
                llm,
                ready: RwLock::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.inner.documents
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.inner.conversations
    }

    pub fn index(&self) -> &Arc<ChunkIndex> {
        &self.inner.index
    }

    pub fn worker(&self) -> &Arc<ProcessingWorker> {
        &self.inner.worker
    }

    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.inner.fetcher
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.inner.summarizer
    }

    pub fn qa(&self) -> &QaService {
        &self.inner.qa
    }

    /// Get embedding provider
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    /// Get LLM provider
    pub fn llm_provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
