//! Per-document chunk index
//!
//! Each document's chunk set lives in `chunks.json` and, once touched, as an
//! immutable in-memory snapshot behind an `Arc`. Rebuilds write the new file
//! and then swap the pointer, so readers holding a snapshot keep a complete
//! set and new readers get the complete replacement.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Missing, Result};
use crate::storage::fs::{read_json, remove_if_exists, write_json_atomic, StorageLayout};
use crate::types::Chunk;

/// A complete, immutable chunk set for one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub document_id: Uuid,
    pub built_at: DateTime<Utc>,
    /// Embedder that produced the chunk vectors
    #[serde(default)]
    pub embedder: String,
    /// Length of every chunk vector
    #[serde(default)]
    pub dimensions: usize,
    /// Chunks in `chunk_index` order
    pub chunks: Vec<Chunk>,
}

impl IndexSnapshot {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Fails with `StaleIndex` when vectors from `embedder` with `dimensions`
    /// entries cannot be scored against this set
    pub fn ensure_compatible(&self, embedder: &str, dimensions: usize) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        // indexes written before embedders were recorded only carry vectors
        let same_embedder = self.embedder.is_empty() || self.embedder == embedder;
        if same_embedder && self.dimensions == dimensions {
            return Ok(());
        }
        Err(Error::StaleIndex(format!(
            "index for {} was built by '{}' with {}-dimensional vectors, but '{}' produces {}; reprocess the document",
            self.document_id,
            if self.embedder.is_empty() { "unknown" } else { &self.embedder },
            self.dimensions,
            embedder,
            dimensions
        )))
    }
}

/// File-backed chunk index keyed by document id
pub struct ChunkIndex {
    layout: StorageLayout,
    snapshots: RwLock<HashMap<Uuid, Arc<IndexSnapshot>>>,
}

impl ChunkIndex {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Current snapshot, loading it from disk on first access
    pub async fn get(&self, document_id: Uuid) -> Result<Arc<IndexSnapshot>> {
        if let Some(snapshot) = self.snapshots.read().get(&document_id) {
            return Ok(Arc::clone(snapshot));
        }

        let path = self.layout.chunks_json(document_id);
        let mut loaded: IndexSnapshot = read_json(&path)
            .await?
            .ok_or_else(|| Error::not_found(Missing::Index, document_id))?;
        if loaded.dimensions == 0 {
            loaded.dimensions = loaded.chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        }
        tracing::debug!("Loaded {} chunks for {} from disk", loaded.len(), document_id);

        let mut snapshots = self.snapshots.write();
        // a rebuild that finished while we were reading wins
        if let Some(current) = snapshots.get(&document_id) {
            return Ok(Arc::clone(current));
        }
        // a removal that finished while we were reading wins too
        if !path.is_file() {
            return Err(Error::not_found(Missing::Index, document_id));
        }
        let loaded = Arc::new(loaded);
        snapshots.insert(document_id, Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Whether an index exists, in memory or on disk
    pub async fn contains(&self, document_id: Uuid) -> bool {
        if self.snapshots.read().contains_key(&document_id) {
            return true;
        }
        tokio::fs::try_exists(self.layout.chunks_json(document_id))
            .await
            .unwrap_or(false)
    }

    /// Persist a new chunk set embedded by `embedder` and make it visible to
    /// readers. The previous set is replaced wholesale.
    pub async fn replace(&self, document_id: Uuid, embedder: &str, chunks: Vec<Chunk>) -> Result<Arc<IndexSnapshot>> {
        if let Some(stray) = chunks.iter().find(|c| c.document_id != document_id) {
            return Err(Error::internal(format!(
                "Chunk {} belongs to {}, not {}",
                stray.id, stray.document_id, document_id
            )));
        }
        let dimensions = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        if let Some(odd) = chunks.iter().find(|c| c.embedding.len() != dimensions) {
            return Err(Error::internal(format!(
                "Chunk {} has a {}-dimensional vector, expected {}",
                odd.id,
                odd.embedding.len(),
                dimensions
            )));
        }

        let snapshot = Arc::new(IndexSnapshot {
            document_id,
            built_at: Utc::now(),
            embedder: embedder.to_string(),
            dimensions,
            chunks,
        });
        write_json_atomic(&self.layout.chunks_json(document_id), snapshot.as_ref()).await?;

        let previous = self
            .snapshots
            .write()
            .insert(document_id, Arc::clone(&snapshot));
        tracing::info!(
            "Index for {} now has {} chunks (previously {})",
            document_id,
            snapshot.len(),
            previous.map(|p| p.len().to_string()).unwrap_or_else(|| "none".to_string())
        );
        Ok(snapshot)
    }

    /// Drop the index from disk, then from memory
    pub async fn remove(&self, document_id: Uuid) -> Result<()> {
        remove_if_exists(&self.layout.chunks_json(document_id)).await?;
        self.snapshots.write().remove(&document_id);
        Ok(())
    }
}
