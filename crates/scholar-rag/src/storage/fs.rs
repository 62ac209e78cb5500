//! On-disk layout and atomic JSON files

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Result;

/// Paths under the data directory
///
/// ```text
/// documents/<id>/original.<ext>
/// documents/<id>/document.json
/// documents/<id>/chunks.json
/// documents/<id>/summaries.json
/// documents/<id>/conversations/<cid>.json
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    pub fn document_dir(&self, id: Uuid) -> PathBuf {
        self.documents_dir().join(id.to_string())
    }

    pub fn original(&self, id: Uuid, extension: &str) -> PathBuf {
        self.document_dir(id).join(format!("original.{}", extension))
    }

    pub fn document_json(&self, id: Uuid) -> PathBuf {
        self.document_dir(id).join("document.json")
    }

    pub fn chunks_json(&self, id: Uuid) -> PathBuf {
        self.document_dir(id).join("chunks.json")
    }

    pub fn summaries_json(&self, id: Uuid) -> PathBuf {
        self.document_dir(id).join("summaries.json")
    }

    pub fn conversations_dir(&self, id: Uuid) -> PathBuf {
        self.document_dir(id).join("conversations")
    }

    pub fn conversation_json(&self, document_id: Uuid, conversation_id: Uuid) -> PathBuf {
        self.conversations_dir(document_id)
            .join(format!("{}.json", conversation_id))
    }
}

/// Write JSON to a sibling temp file, then rename it over `path`
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes).await
}

/// Write bytes to a sibling temp file, then rename it over `path`
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Read a JSON file; `None` when it does not exist
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove a file, ignoring a missing one
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<u32>,
    }

    #[tokio::test]
    async fn test_atomic_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/sample.json");
        let sample = Sample {
            name: "a".into(),
            values: vec![1, 2, 3],
        };
        write_json_atomic(&path, &sample).await.unwrap();
        let back: Option<Sample> = read_json(&path).await.unwrap();
        assert_eq!(back, Some(sample));

        // no temp files left behind
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let back: Option<Sample> = read_json(&dir.path().join("nope.json")).await.unwrap();
        assert!(back.is_none());
        remove_if_exists(&dir.path().join("nope.json")).await.unwrap();
    }

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/data");
        let id = Uuid::nil();
        assert_eq!(
            layout.chunks_json(id),
            PathBuf::from("/data/documents/00000000-0000-0000-0000-000000000000/chunks.json")
        );
        assert!(layout.original(id, "pdf").ends_with("original.pdf"));
    }
}
