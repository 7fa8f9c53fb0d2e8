//! Wires configuration into concrete adapters and services.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::application::{ChatService, IndexService, RagService};
use crate::domain::ports::{EmbeddingService, SessionStore, VectorStore};
use crate::infrastructure::{
    config::require_api_key, session_store::create_pool, AppConfig, DirectoryDocumentSource,
    GeminiEmbedding, GeminiLlm, InMemorySessionStore, InMemoryVectorStore, LocalIndexStorage,
    RedisSessionStore, SessionBackend,
};

pub struct Services {
    pub index: Arc<IndexService>,
    pub rag: Arc<RagService>,
    pub chat: Arc<ChatService>,
    pub sessions: Arc<dyn SessionStore>,
}

/// Index and retrieval services backed by Gemini embeddings.
pub fn build_index(app: &AppConfig) -> anyhow::Result<(Arc<IndexService>, Arc<RagService>)> {
    require_api_key()?;
    let config = &app.config;

    let embedding: Arc<dyn EmbeddingService> =
        Arc::new(GeminiEmbedding::from_config(&config.embedding));
    let vector_store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

    let source = DirectoryDocumentSource::new(&config.rag.documents_dir)
        .recursive(config.rag.recursive_documents);
    let index = IndexService::new(
        Arc::new(source),
        Arc::new(LocalIndexStorage::new(&config.rag.storage_dir)),
        embedding.clone(),
        vector_store.clone(),
    )
    .with_chunking(config.rag.chunk_size, config.rag.chunk_overlap);

    let rag = RagService::new(embedding, vector_store, config.rag.top_k);
    Ok((Arc::new(index), Arc::new(rag)))
}

pub fn build_session_store(app: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    let sessions = &app.config.sessions;
    Ok(match sessions.backend {
        SessionBackend::Memory => {
            info!("sessions kept in memory");
            Arc::new(InMemorySessionStore::new(sessions.ttl_seconds))
        }
        SessionBackend::Redis => {
            let pool = create_pool(&sessions.redis_url).context("creating Redis pool")?;
            info!("sessions kept in Redis");
            Arc::new(RedisSessionStore::new(pool, sessions.ttl_seconds))
        }
    })
}

pub fn build_services(app: &AppConfig) -> anyhow::Result<Services> {
    let (index, rag) = build_index(app)?;
    let sessions = build_session_store(app)?;
    let llm = Arc::new(GeminiLlm::from_config(&app.config.llm));

    let chat = ChatService::new(
        sessions.clone(),
        index.clone(),
        rag.clone(),
        llm,
        app.chat_prompts(),
    );

    Ok(Services {
        index,
        rag,
        chat: Arc::new(chat),
        sessions,
    })
}
