mod document_source;
mod embedding;
mod index_storage;
mod llm;
mod session_store;
mod vector_store;

pub use document_source::DocumentSource;
pub use embedding::EmbeddingService;
pub use index_storage::IndexStorage;
pub use llm::{LlmService, TextStream};
pub use session_store::SessionStore;
pub use vector_store::VectorStore;
