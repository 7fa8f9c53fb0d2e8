pub mod config;
pub mod documents;
pub mod embedding;
pub mod index_storage;
pub mod llm;
pub mod session_store;
pub mod telemetry;
pub mod vector_store;

pub use config::{AppConfig, Config, ConfigError, PromptsConfig, SessionBackend};
pub use documents::DirectoryDocumentSource;
pub use embedding::GeminiEmbedding;
pub use index_storage::LocalIndexStorage;
pub use llm::GeminiLlm;
pub use session_store::{InMemorySessionStore, RedisSessionStore};
pub use vector_store::InMemoryVectorStore;
