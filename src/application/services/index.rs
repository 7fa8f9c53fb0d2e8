use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::domain::{
    ports::{DocumentSource, EmbeddingService, IndexStorage, VectorStore},
    split_into_chunks, DomainError, IndexOrigin, IndexSummary, IndexedChunk, PersistedIndex,
};

/// Owns the lifecycle of the vector index: restore it from storage when a
/// usable copy exists, otherwise build it from the corpus and persist it.
pub struct IndexService {
    source: Arc<dyn DocumentSource>,
    storage: Arc<dyn IndexStorage>,
    embedding: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    chunk_size: usize,
    chunk_overlap: usize,
    ready: Mutex<Option<IndexSummary>>,
}

impl IndexService {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        storage: Arc<dyn IndexStorage>,
        embedding: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            source,
            storage,
            embedding,
            vector_store,
            chunk_size: 800,
            chunk_overlap: 20,
            ready: Mutex::new(None),
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Loads or builds the index the first time it is called; later calls
    /// return the cached summary.
    pub async fn ensure_ready(&self) -> Result<IndexSummary, DomainError> {
        let mut ready = self.ready.lock().await;
        if let Some(summary) = ready.as_ref() {
            return Ok(summary.clone());
        }

        let summary = self.load_or_build().await?;
        *ready = Some(summary.clone());
        Ok(summary)
    }

    /// Builds from the corpus even when a valid index is stored.
    pub async fn rebuild(&self) -> Result<IndexSummary, DomainError> {
        let mut ready = self.ready.lock().await;
        let summary = self.build().await?;
        *ready = Some(summary.clone());
        Ok(summary)
    }

    pub async fn summary(&self) -> Option<IndexSummary> {
        self.ready.lock().await.clone()
    }

    async fn load_or_build(&self) -> Result<IndexSummary, DomainError> {
        let location = self.storage.location();
        self.storage.prepare().await?;

        match self.storage.load().await {
            Ok(Some(index)) => {
                match index.validate(self.embedding.model(), self.embedding.dimension()) {
                    Ok(()) => return self.restore(index).await,
                    Err(reason) => {
                        warn!(storage = %location, %reason, "stored index is stale, rebuilding")
                    }
                }
            }
            Ok(None) => info!(storage = %location, "no stored index, building a new one"),
            Err(e) => {
                warn!(storage = %location, error = %e, "stored index is unreadable, rebuilding")
            }
        }

        self.build().await
    }

    #[instrument(skip(self, index), fields(chunks = index.entries.len()))]
    async fn restore(&self, index: PersistedIndex) -> Result<IndexSummary, DomainError> {
        self.vector_store.clear().await?;
        for entry in &index.entries {
            self.vector_store.upsert(&entry.chunk, &entry.embedding).await?;
        }

        info!(
            documents = index.manifest.document_count,
            chunks = index.manifest.chunk_count,
            "index loaded from storage"
        );
        Ok(IndexSummary::from_manifest(
            IndexOrigin::Loaded,
            &index.manifest,
            self.storage.location(),
        ))
    }

    #[instrument(skip(self), fields(source = %self.source.describe()))]
    async fn build(&self) -> Result<IndexSummary, DomainError> {
        let started = Instant::now();

        let loaded = self.source.load_documents().await?;
        if loaded.is_empty() {
            return Err(DomainError::validation(format!(
                "no documents found in {}",
                self.source.describe()
            )));
        }

        let mut chunks = Vec::new();
        for doc in &loaded {
            chunks.extend(
                split_into_chunks(
                    doc.document.id,
                    &doc.text,
                    self.chunk_size,
                    self.chunk_overlap,
                )
                .into_iter()
                .map(|mut chunk| {
                    chunk.metadata.source = Some(doc.document.name.clone());
                    chunk
                }),
            );
        }
        if chunks.is_empty() {
            return Err(DomainError::validation(
                "documents contain no indexable text",
            ));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedding.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(DomainError::internal(format!(
                "embedded {} of {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        let expected = self.embedding.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.dimension() != expected) {
            return Err(DomainError::external(format!(
                "embedding model '{}' returned {}-dimensional vectors, expected {}",
                self.embedding.model(),
                bad.dimension(),
                expected
            )));
        }

        let entries: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();

        self.vector_store.clear().await?;
        for entry in &entries {
            self.vector_store.upsert(&entry.chunk, &entry.embedding).await?;
        }

        let documents = loaded.into_iter().map(|d| d.document).collect();
        let index = PersistedIndex::new(self.embedding.model(), documents, entries);
        self.storage.save(&index).await?;

        info!(
            documents = index.manifest.document_count,
            chunks = index.manifest.chunk_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index built and saved"
        );
        Ok(IndexSummary::from_manifest(
            IndexOrigin::Built,
            &index.manifest,
            self.storage.location(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{DirectoryDocumentSource, InMemoryVectorStore, LocalIndexStorage};
    use crate::test_support::KeywordEmbedding;
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        docs: std::path::PathBuf,
        storage: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("Data");
        std::fs::create_dir(&docs).unwrap();
        std::fs::write(
            docs.join("japan.md"),
            "Kyoto is best in autumn. The maples turn red in November.\n\nTake the shinkansen from Tokyo.",
        )
        .unwrap();
        std::fs::write(
            docs.join("peru.txt"),
            "Machu Picchu needs a permit. Book months ahead.",
        )
        .unwrap();

        Fixture {
            docs,
            storage: dir.path().join("storage"),
            _dir: dir,
        }
    }

    fn service(docs: &Path, storage: &Path, embedding: Arc<KeywordEmbedding>) -> IndexService {
        IndexService::new(
            Arc::new(DirectoryDocumentSource::new(docs)),
            Arc::new(LocalIndexStorage::new(storage)),
            embedding,
            Arc::new(InMemoryVectorStore::new()),
        )
        .with_chunking(8, 2)
    }

    #[tokio::test]
    async fn test_builds_once_when_no_index() {
        let fx = fixture();
        let embedding = Arc::new(KeywordEmbedding::new());
        let index = service(&fx.docs, &fx.storage, embedding.clone());

        let first = index.ensure_ready().await.unwrap();
        let second = index.ensure_ready().await.unwrap();

        assert_eq!(first.origin, IndexOrigin::Built);
        assert_eq!(first.documents, 2);
        assert!(first.chunks >= 3);
        assert_eq!(second.origin, IndexOrigin::Built);
        assert_eq!(embedding.batch_calls(), 1);
        assert!(fx.storage.join("index_store.json").is_file());
    }

    #[tokio::test]
    async fn test_existing_index_is_loaded_without_rebuild() {
        let fx = fixture();
        let built = service(&fx.docs, &fx.storage, Arc::new(KeywordEmbedding::new()))
            .ensure_ready()
            .await
            .unwrap();

        let embedding = Arc::new(KeywordEmbedding::new());
        let store = Arc::new(InMemoryVectorStore::new());
        let index = IndexService::new(
            Arc::new(DirectoryDocumentSource::new(&fx.docs)),
            Arc::new(LocalIndexStorage::new(&fx.storage)),
            embedding.clone(),
            store.clone(),
        );

        let loaded = index.ensure_ready().await.unwrap();

        assert_eq!(loaded.origin, IndexOrigin::Loaded);
        assert_eq!(loaded.chunks, built.chunks);
        assert_eq!(embedding.batch_calls(), 0);
        assert_eq!(store.count().await.unwrap(), built.chunks);
    }

    #[tokio::test]
    async fn test_corrupt_index_falls_back_to_rebuild() {
        let fx = fixture();
        service(&fx.docs, &fx.storage, Arc::new(KeywordEmbedding::new()))
            .ensure_ready()
            .await
            .unwrap();
        std::fs::write(fx.storage.join("docstore.json"), "garbage").unwrap();

        let embedding = Arc::new(KeywordEmbedding::new());
        let summary = service(&fx.docs, &fx.storage, embedding.clone())
            .ensure_ready()
            .await
            .unwrap();

        assert_eq!(summary.origin, IndexOrigin::Built);
        assert_eq!(embedding.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_changed_embedding_model_rebuilds() {
        let fx = fixture();
        service(&fx.docs, &fx.storage, Arc::new(KeywordEmbedding::new()))
            .ensure_ready()
            .await
            .unwrap();

        let embedding = Arc::new(KeywordEmbedding::with_model("keyword-v2"));
        let summary = service(&fx.docs, &fx.storage, embedding.clone())
            .ensure_ready()
            .await
            .unwrap();

        assert_eq!(summary.origin, IndexOrigin::Built);
        assert_eq!(summary.embedding_model, "keyword-v2");
    }

    #[tokio::test]
    async fn test_changed_dimension_rebuilds() {
        let fx = fixture();
        service(&fx.docs, &fx.storage, Arc::new(KeywordEmbedding::new()))
            .ensure_ready()
            .await
            .unwrap();

        let embedding = Arc::new(KeywordEmbedding::with_dimension(256));
        let summary = service(&fx.docs, &fx.storage, embedding.clone())
            .ensure_ready()
            .await
            .unwrap();

        assert_eq!(summary.origin, IndexOrigin::Built);
        assert_eq!(summary.dimension, 256);
        assert_eq!(embedding.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_vectors_of_unexpected_dimension_are_rejected() {
        let fx = fixture();
        let index = service(
            &fx.docs,
            &fx.storage,
            Arc::new(KeywordEmbedding::misreporting(768)),
        );

        let err = index.ensure_ready().await.unwrap_err();

        assert!(matches!(err, DomainError::ExternalService(_)));
        assert!(err.to_string().contains("768"));
        assert!(!fx.storage.join("index_store.json").exists());
    }

    #[tokio::test]
    async fn test_rebuild_ignores_stored_index() {
        let fx = fixture();
        let embedding = Arc::new(KeywordEmbedding::new());
        let index = service(&fx.docs, &fx.storage, embedding.clone());

        index.ensure_ready().await.unwrap();
        let rebuilt = index.rebuild().await.unwrap();

        assert_eq!(rebuilt.origin, IndexOrigin::Built);
        assert_eq!(embedding.batch_calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_corpus_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("Data");
        std::fs::create_dir(&docs).unwrap();

        let index = service(
            &docs,
            &dir.path().join("storage"),
            Arc::new(KeywordEmbedding::new()),
        );

        assert!(matches!(
            index.ensure_ready().await,
            Err(DomainError::Validation(_))
        ));
        assert!(index.summary().await.is_none());
        // The storage location exists before any build is attempted.
        assert!(dir.path().join("storage").is_dir());
    }
}
