//! Chunk, embed and publish a document's index

use std::sync::Arc;

use super::chunker::TextChunker;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::retrieval::{ChunkIndex, IndexSnapshot};
use crate::types::Document;

/// Builds and replaces per-document chunk indexes
pub struct Indexer {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<ChunkIndex>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<ChunkIndex>,
        batch_size: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    /// Chunk every section, embed the chunks and swap in the new set.
    /// Nothing is published unless every chunk got an embedding.
    pub async fn index_document(&self, doc: &Document) -> Result<Arc<IndexSnapshot>> {
        let mut chunks = self.chunker.chunk_document(doc);
        tracing::info!(
            "Indexing '{}': {} sections -> {} chunks",
            doc.filename,
            doc.sections.len(),
            chunks.len()
        );

        for batch in chunks.chunks_mut(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::internal(format!(
                    "{} returned {} embeddings for {} chunks",
                    self.embedder.name(),
                    embeddings.len(),
                    batch.len()
                )));
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        self.index.replace(doc.id, self.embedder.name(), chunks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::HashingEmbedder;
    use crate::storage::fs::StorageLayout;
    use crate::types::{DocumentFormat, Section, SectionKind};

    #[tokio::test]
    async fn test_index_document_embeds_every_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(ChunkIndex::new(StorageLayout::new(dir.path())));
        let indexer = Indexer::new(
            TextChunker::new(50, 10),
            Arc::new(HashingEmbedder::new(32)),
            Arc::clone(&index),
            3,
        );

        let mut doc = Document::new("a.txt", DocumentFormat::Text, 0, String::new());
        let mut section = Section::new("Body", SectionKind::Other, 1);
        section.paragraphs = vec!["word ".repeat(60)];
        doc.sections = vec![section];

        let snapshot = indexer.index_document(&doc).await.unwrap();
        assert_eq!(snapshot.len(), 6);
        assert!(snapshot.chunks.iter().all(|c| c.embedding.len() == 32));
        assert_eq!(index.get(doc.id).await.unwrap().len(), snapshot.len());
    }
}
