use std::sync::Arc;
use tracing::instrument;

use crate::domain::{
    ports::{EmbeddingService, VectorStore},
    DomainError, SearchResult,
};

/// Embeds a query and returns the closest indexed chunks.
pub struct RagService {
    embedding: Arc<dyn EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    default_top_k: usize,
}

impl RagService {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedding,
            vector_store,
            default_top_k,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    #[instrument(skip(self, query), fields(top_k = self.default_top_k))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>, DomainError> {
        self.retrieve_top_k(query, self.default_top_k).await
    }

    #[instrument(skip(self, query))]
    pub async fn retrieve_top_k(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("query must not be empty"));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedding.embed(query).await?;
        let results = self.vector_store.search(&embedding, top_k).await?;
        tracing::debug!(hits = results.len(), "retrieved context");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentChunk, Embedding};
    use crate::infrastructure::InMemoryVectorStore;
    use crate::test_support::KeywordEmbedding;
    use uuid::Uuid;

    async fn seeded() -> RagService {
        let embedding = Arc::new(KeywordEmbedding::new());
        let store = Arc::new(InMemoryVectorStore::new());
        let doc_id = Uuid::new_v4();

        for (i, text) in ["beach resorts in Bali", "museums in Vienna", "ski lodges in Zermatt"]
            .iter()
            .enumerate()
        {
            let chunk = DocumentChunk::new(doc_id, *text, i);
            let vector: Embedding = embedding.embed(text).await.unwrap();
            store.upsert(&chunk, &vector).await.unwrap();
        }

        RagService::new(embedding, store, 2)
    }

    #[tokio::test]
    async fn test_retrieve_ranks_best_match_first() {
        let rag = seeded().await;
        let results = rag.retrieve("which museums should I see in Vienna").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.content, "museums in Vienna");
    }

    #[tokio::test]
    async fn test_retrieve_top_k_limits() {
        let rag = seeded().await;
        assert_eq!(rag.retrieve_top_k("Bali", 1).await.unwrap().len(), 1);
        assert!(rag.retrieve_top_k("Bali", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let rag = seeded().await;
        assert!(matches!(
            rag.retrieve("   ").await,
            Err(DomainError::Validation(_))
        ));
    }
}
