//! Similarity search over one document's chunks

use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use super::index::ChunkIndex;
use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

/// A chunk with its similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity, higher is better
    pub score: f32,
}

/// Cosine similarity; 0.0 for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0f32;
    let mut norm_a = 0f32;
    let mut norm_b = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Ranking order shared by retrieval and prompt assembly:
/// score descending, NaN last, then earlier offset first
pub fn rank_order(a: (f32, usize), b: (f32, usize)) -> Ordering {
    match (a.0.is_nan(), b.0.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => a.1.cmp(&b.1),
        (false, false) => b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)),
    }
}

/// Score every chunk and keep the top `k`
pub fn rank(chunks: &[Chunk], query: &[f32], k: usize) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .iter()
        .map(|chunk| ScoredChunk {
            score: cosine_similarity(query, &chunk.embedding),
            chunk: chunk.clone(),
        })
        .collect();
    scored.sort_by(|a, b| {
        rank_order((a.score, a.chunk.char_offset), (b.score, b.chunk.char_offset))
            .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    scored.truncate(k);
    scored
}

/// Retriever over the chunk index
pub struct Retriever {
    index: Arc<ChunkIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(index: Arc<ChunkIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embedder }
    }

    /// Top `k` chunks of a document for a free-text query.
    ///
    /// Fails with `NotFound` when the document has not been indexed.
    pub async fn search(&self, document_id: Uuid, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.index.get(document_id).await?;
        if k == 0 || snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        snapshot.ensure_compatible(self.embedder.name(), query_embedding.len())?;
        let results = rank(&snapshot.chunks, &query_embedding, k);
        tracing::debug!(
            "Retrieved {} of {} chunks for {} (best score {:.3})",
            results.len(),
            snapshot.len(),
            document_id,
            results.first().map(|r| r.score).unwrap_or(0.0)
        );
        Ok(results)
    }

    /// Top `k` chunks containing at least one keyword (case-insensitive),
    /// ranked by similarity to the keywords. Falls back to plain search when
    /// no chunk mentions any keyword.
    pub async fn search_keywords(&self, document_id: Uuid, keywords: &[String], k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.index.get(document_id).await?;
        let query = keywords.join(" ");
        if k == 0 || snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let needles: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let matching: Vec<Chunk> = snapshot
            .chunks
            .iter()
            .filter(|c| {
                let text = c.text.to_lowercase();
                needles.iter().any(|n| text.contains(n.as_str()))
            })
            .cloned()
            .collect();

        let query_embedding = self.embedder.embed(&query).await?;
        snapshot.ensure_compatible(self.embedder.name(), query_embedding.len())?;
        if matching.is_empty() {
            tracing::debug!("No chunk mentions {:?}; using similarity only", keywords);
            return Ok(rank(&snapshot.chunks, &query_embedding, k));
        }
        Ok(rank(&matching, &query_embedding, k))
    }
}
