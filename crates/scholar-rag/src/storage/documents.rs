//! Document registry backed by per-document directories

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::fs::{read_json, write_atomic, write_json_atomic, StorageLayout};
use crate::error::{Error, Missing, Result};
use crate::types::{Document, DocumentStatus, SummaryRecord};

/// Documents and their summary logs
pub struct DocumentStore {
    layout: StorageLayout,
    documents: DashMap<Uuid, Document>,
    /// Serializes read-modify-write cycles per document
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl DocumentStore {
    /// Open the store, loading every `document.json` under the data directory
    pub async fn open(layout: StorageLayout) -> Result<Self> {
        let documents = DashMap::new();
        let dir = layout.documents_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(id) = entry.file_name().to_str().and_then(|n| Uuid::parse_str(n).ok()) else {
                continue;
            };
            match read_json::<Document>(&layout.document_json(id)).await {
                Ok(Some(mut doc)) => {
                    // a crash mid-parse leaves the document stuck in `parsing`
                    if doc.status == DocumentStatus::Parsing {
                        doc.set_status(DocumentStatus::Failed, Some("Interrupted while parsing".to_string()));
                    }
                    documents.insert(id, doc);
                }
                Ok(None) => tracing::warn!("Document directory {} has no document.json", id),
                Err(e) => tracing::warn!("Skipping unreadable document {}: {}", id, e),
            }
        }

        tracing::info!("Loaded {} documents from {}", documents.len(), dir.display());
        Ok(Self {
            layout,
            documents,
            locks: DashMap::new(),
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id).or_default().value())
    }

    /// Persist a new document together with its raw upload
    pub async fn create(&self, doc: Document, original: &[u8]) -> Result<Document> {
        write_atomic(&self.layout.original(doc.id, doc.format.extension()), original).await?;
        write_json_atomic(&self.layout.document_json(doc.id), &doc).await?;
        self.documents.insert(doc.id, doc.clone());
        Ok(doc)
    }

    pub fn get(&self, id: Uuid) -> Result<Document> {
        self.documents
            .get(&id)
            .map(|d| d.value().clone())
            .ok_or_else(|| Error::not_found(Missing::Document, id))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.documents.contains_key(&id)
    }

    /// Newest first, optionally filtered by status
    pub fn list(&self, status: Option<DocumentStatus>) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .map(|d| d.value().clone())
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        docs
    }

    /// A stored document with the same content hash
    pub fn find_by_hash(&self, hash: &str) -> Option<Document> {
        self.documents
            .iter()
            .find(|d| d.content_hash == hash)
            .map(|d| d.value().clone())
    }

    /// Apply `change` and persist the result
    pub async fn update<F>(&self, id: Uuid, change: F) -> Result<Document>
    where
        F: FnOnce(&mut Document),
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut doc = self.get(id)?;
        change(&mut doc);
        write_json_atomic(&self.layout.document_json(id), &doc).await?;
        self.documents.insert(id, doc.clone());
        Ok(doc)
    }

    /// Raw bytes of the original upload
    pub async fn read_original(&self, id: Uuid) -> Result<Vec<u8>> {
        let doc = self.get(id)?;
        Ok(tokio::fs::read(self.layout.original(id, doc.format.extension())).await?)
    }

    /// Remove the document directory: upload, tree, index, summaries, conversations
    pub async fn delete(&self, id: Uuid) -> Result<Document> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let (_, doc) = self
            .documents
            .remove(&id)
            .ok_or_else(|| Error::not_found(Missing::Document, id))?;
        match tokio::fs::remove_dir_all(self.layout.document_dir(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        drop(_guard);
        self.locks.remove(&id);
        tracing::info!("Deleted document {} ({})", id, doc.filename);
        Ok(doc)
    }

    /// Append to the document's summary log
    pub async fn append_summary(&self, record: &SummaryRecord) -> Result<()> {
        let id = record.document_id;
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        if !self.contains(id) {
            return Err(Error::not_found(Missing::Document, id));
        }
        let path = self.layout.summaries_json(id);
        let mut log: Vec<SummaryRecord> = read_json(&path).await?.unwrap_or_default();
        log.push(record.clone());
        write_json_atomic(&path, &log).await
    }

    /// Stored summaries, oldest first
    pub async fn summaries(&self, id: Uuid) -> Result<Vec<SummaryRecord>> {
        if !self.contains(id) {
            return Err(Error::not_found(Missing::Document, id));
        }
        Ok(read_json(&self.layout.summaries_json(id)).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentFormat, SummaryKind};
    use chrono::Utc;

    fn record(document_id: Uuid, text: &str) -> SummaryRecord {
        SummaryRecord {
            id: Uuid::new_v4(),
            document_id,
            kind: SummaryKind::Full,
            template: "full_summary".into(),
            keywords: Vec::new(),
            text: Some(text.into()),
            sections: Vec::new(),
            usage: None,
            created_at: Utc::now(),
            processing_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_create_reload_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::new("paper.pdf", DocumentFormat::Pdf, 4, "hash".into());
        let id = doc.id;
        {
            let store = DocumentStore::open(StorageLayout::new(dir.path())).await.unwrap();
            store.create(doc, b"%PDF").await.unwrap();
            store
                .update(id, |d| d.set_status(DocumentStatus::Parsing, None))
                .await
                .unwrap();
            assert_eq!(store.read_original(id).await.unwrap(), b"%PDF");
        }

        let store = DocumentStore::open(StorageLayout::new(dir.path())).await.unwrap();
        let reloaded = store.get(id).unwrap();
        // interrupted parse is surfaced as a failure on restart
        assert_eq!(reloaded.status, DocumentStatus::Failed);
        assert_eq!(store.find_by_hash("hash").map(|d| d.id), Some(id));

        store.delete(id).await.unwrap();
        assert!(matches!(store.get(id), Err(Error::NotFound { what: Missing::Document, .. })));
        assert!(!dir.path().join("documents").join(id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_summary_log_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(StorageLayout::new(dir.path())).await.unwrap());
        let doc = store
            .create(Document::new("a.txt", DocumentFormat::Text, 1, "h".into()), b"a")
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let id = doc.id;
            tasks.push(tokio::spawn(async move {
                store.append_summary(&record(id, &format!("s{}", i))).await.unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(store.summaries(doc.id).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(StorageLayout::new(dir.path())).await.unwrap();
        let a = store
            .create(Document::new("a.txt", DocumentFormat::Text, 1, "a".into()), b"a")
            .await
            .unwrap();
        store
            .create(Document::new("b.txt", DocumentFormat::Text, 1, "b".into()), b"b")
            .await
            .unwrap();
        store
            .update(a.id, |d| d.set_status(DocumentStatus::Failed, Some("x".into())))
            .await
            .unwrap();
        assert_eq!(store.list(None).len(), 2);
        let failed = store.list(Some(DocumentStatus::Failed));
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, a.id);
    }
}
