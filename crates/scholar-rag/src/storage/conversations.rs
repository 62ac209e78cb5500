//! Conversation logs, one JSON file per conversation

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::fs::{read_json, remove_if_exists, write_json_atomic, StorageLayout};
use crate::error::{Error, Missing, Result};
use crate::types::{Conversation, ConversationStatus, Turn};

/// Append-only conversation storage
pub struct ConversationStore {
    layout: StorageLayout,
    /// conversation id -> owning document id
    owners: DashMap<Uuid, Uuid>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ConversationStore {
    /// Open the store, indexing every conversation file on disk
    pub async fn open(layout: StorageLayout) -> Result<Self> {
        let owners = DashMap::new();
        let documents_dir = layout.documents_dir();
        tokio::fs::create_dir_all(&documents_dir).await?;

        let mut documents = tokio::fs::read_dir(&documents_dir).await?;
        while let Some(doc_entry) = documents.next_entry().await? {
            let Some(document_id) = doc_entry.file_name().to_str().and_then(|n| Uuid::parse_str(n).ok()) else {
                continue;
            };
            let dir = layout.conversations_dir(document_id);
            let mut files = match tokio::fs::read_dir(&dir).await {
                Ok(files) => files,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(file) = files.next_entry().await? {
                let name = file.file_name();
                let Some(id) = name
                    .to_str()
                    .and_then(|n| n.strip_suffix(".json"))
                    .and_then(|n| Uuid::parse_str(n).ok())
                else {
                    continue;
                };
                owners.insert(id, document_id);
            }
        }

        tracing::info!("Indexed {} conversations", owners.len());
        Ok(Self {
            layout,
            owners,
            locks: DashMap::new(),
        })
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id).or_default().value())
    }

    fn path_of(&self, id: Uuid) -> Result<std::path::PathBuf> {
        let document_id = self
            .owners
            .get(&id)
            .map(|d| *d.value())
            .ok_or_else(|| Error::not_found(Missing::Conversation, id))?;
        Ok(self.layout.conversation_json(document_id, id))
    }

    pub async fn create(&self, conversation: &Conversation) -> Result<()> {
        let path = self.layout.conversation_json(conversation.document_id, conversation.id);
        write_json_atomic(&path, conversation).await?;
        self.owners.insert(conversation.id, conversation.document_id);
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Conversation> {
        let path = self.path_of(id)?;
        read_json(&path)
            .await?
            .ok_or_else(|| Error::not_found(Missing::Conversation, id))
    }

    /// Append a turn. Archived conversations are read-only.
    pub async fn append_turn(&self, id: Uuid, turn: Turn) -> Result<Conversation> {
        self.modify(id, |c| {
            if c.status == ConversationStatus::Archived {
                return Err(Error::invalid(format!("Conversation {} is archived", id)));
            }
            c.append(turn);
            Ok(())
        })
        .await
    }

    pub async fn archive(&self, id: Uuid) -> Result<Conversation> {
        self.modify(id, |c| {
            c.archive();
            Ok(())
        })
        .await
    }

    async fn modify<F>(&self, id: Uuid, change: F) -> Result<Conversation>
    where
        F: FnOnce(&mut Conversation) -> Result<()>,
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut conversation = self.get(id).await?;
        change(&mut conversation)?;
        write_json_atomic(&self.path_of(id)?, &conversation).await?;
        Ok(conversation)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let path = self.path_of(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        remove_if_exists(&path).await?;
        self.owners.remove(&id);
        Ok(())
    }

    /// Forget conversations of a deleted document (files go with its directory)
    pub fn forget_document(&self, document_id: Uuid) -> usize {
        let before = self.owners.len();
        self.owners.retain(|_, owner| *owner != document_id);
        before - self.owners.len()
    }

    /// Most recently updated first
    pub async fn list(
        &self,
        document_id: Option<Uuid>,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>> {
        let ids: Vec<Uuid> = self
            .owners
            .iter()
            .filter(|e| document_id.map_or(true, |d| *e.value() == d))
            .map(|e| *e.key())
            .collect();

        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(id).await {
                Ok(c) if status.map_or(true, |s| c.status == s) => conversations.push(c),
                Ok(_) => {}
                // deleted concurrently
                Err(Error::NotFound { .. }) => {}
                Err(e) => tracing::warn!("Skipping unreadable conversation {}: {}", id, e),
            }
        }
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }
}
