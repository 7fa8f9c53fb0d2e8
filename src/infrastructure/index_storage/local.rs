use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{
    ports::IndexStorage, Document, DocumentChunk, DomainError, Embedding, IndexManifest,
    IndexedChunk, PersistedIndex,
};

const MANIFEST_FILE: &str = "index_store.json";
const DOCSTORE_FILE: &str = "docstore.json";
const VECTORS_FILE: &str = "vector_store.json";

#[derive(Serialize, Deserialize)]
struct DocStore {
    documents: Vec<Document>,
    chunks: Vec<DocumentChunk>,
}

#[derive(Serialize, Deserialize)]
struct VectorFile {
    embeddings: HashMap<Uuid, Embedding>,
}

/// Index persisted as three JSON files in one directory. The manifest is
/// written last, so a directory without it never counts as a finished index.
pub struct LocalIndexStorage {
    dir: PathBuf,
}

impl LocalIndexStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T, DomainError> {
        let path = self.path(file);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DomainError::storage(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| DomainError::storage(format!("{}: {e}", path.display())))
    }

    async fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<(), DomainError> {
        let path = self.path(file);
        let tmp = self.path(&format!("{file}.tmp"));
        let json = serde_json::to_vec(value)
            .map_err(|e| DomainError::internal(format!("serialize {file}: {e}")))?;

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl IndexStorage for LocalIndexStorage {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn load(&self) -> Result<Option<PersistedIndex>, DomainError> {
        let present: Vec<bool> = [MANIFEST_FILE, DOCSTORE_FILE, VECTORS_FILE]
            .iter()
            .map(|f| self.path(f).is_file())
            .collect();

        if present.iter().all(|p| !p) {
            return Ok(None);
        }
        if !present[0] {
            return Err(DomainError::storage(format!(
                "{} is missing; the last build did not finish",
                self.path(MANIFEST_FILE).display()
            )));
        }

        let manifest: IndexManifest = self.read_json(MANIFEST_FILE).await?;
        let docstore: DocStore = self.read_json(DOCSTORE_FILE).await?;
        let mut vectors: VectorFile = self.read_json(VECTORS_FILE).await?;

        let entries = docstore
            .chunks
            .into_iter()
            .map(|chunk| {
                vectors
                    .embeddings
                    .remove(&chunk.id)
                    .map(|embedding| IndexedChunk { chunk, embedding })
                    .ok_or_else(|| DomainError::storage("chunk without a stored vector"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(chunks = entries.len(), "index files read");

        Ok(Some(PersistedIndex {
            manifest,
            documents: docstore.documents,
            entries,
        }))
    }

    async fn prepare(&self) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    #[instrument(
        skip(self, index),
        fields(dir = %self.dir.display(), chunks = index.entries.len())
    )]
    async fn save(&self, index: &PersistedIndex) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Drop the manifest first so a crash mid-write leaves an unfinished index.
        let manifest_path = self.path(MANIFEST_FILE);
        if manifest_path.exists() {
            tokio::fs::remove_file(&manifest_path).await?;
        }

        let docstore = DocStore {
            documents: index.documents.clone(),
            chunks: index.entries.iter().map(|e| e.chunk.clone()).collect(),
        };
        let vectors = VectorFile {
            embeddings: index
                .entries
                .iter()
                .map(|e| (e.chunk.id, e.embedding.clone()))
                .collect(),
        };

        self.write_json(DOCSTORE_FILE, &docstore).await?;
        self.write_json(VECTORS_FILE, &vectors).await?;
        self.write_json(MANIFEST_FILE, &index.manifest).await?;
        Ok(())
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> PersistedIndex {
        let doc = Document::new("patagonia.md");
        let entries = vec![
            IndexedChunk {
                chunk: DocumentChunk::new(doc.id, "Torres del Paine W trek", 0),
                embedding: Embedding::new(vec![0.25, 0.5]),
            },
            IndexedChunk {
                chunk: DocumentChunk::new(doc.id, "Perito Moreno glacier", 1),
                embedding: Embedding::new(vec![0.75, 0.125]),
            },
        ];
        PersistedIndex::new("embedding-001", vec![doc], entries)
    }

    #[tokio::test]
    async fn test_empty_dir_has_no_index() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalIndexStorage::new(dir.path());
        assert!(storage.load().await.unwrap().is_none());

        let missing = LocalIndexStorage::new(dir.path().join("never-created"));
        assert!(missing.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prepare_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalIndexStorage::new(dir.path().join("nested").join("storage"));

        storage.prepare().await.unwrap();

        assert!(dir.path().join("nested").join("storage").is_dir());
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalIndexStorage::new(dir.path().join("storage"));
        let index = sample_index();

        storage.save(&index).await.unwrap();
        let loaded = storage.load().await.unwrap().expect("index present");

        assert_eq!(loaded.manifest, index.manifest);
        assert_eq!(loaded.documents, index.documents);
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries[1].chunk.content, "Perito Moreno glacier");
        assert_eq!(
            loaded.entries[1].embedding,
            Embedding::new(vec![0.75, 0.125])
        );
        assert!(loaded.validate("embedding-001", 2).is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalIndexStorage::new(dir.path());
        storage.save(&sample_index()).await.unwrap();

        std::fs::write(dir.path().join(VECTORS_FILE), "{ not json").unwrap();

        assert!(matches!(storage.load().await, Err(DomainError::Storage(_))));
    }

    #[tokio::test]
    async fn test_unfinished_build_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalIndexStorage::new(dir.path());
        storage.save(&sample_index()).await.unwrap();

        std::fs::remove_file(dir.path().join(MANIFEST_FILE)).unwrap();

        assert!(storage.load().await.is_err());
    }
}
