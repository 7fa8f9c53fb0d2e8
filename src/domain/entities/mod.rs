mod document;
mod embedding;
mod index;
mod preferences;
mod session;

pub use document::{
    split_into_chunks, ChunkMetadata, Document, DocumentChunk, LoadedDocument, SearchResult,
};
pub use embedding::Embedding;
pub use index::{
    IndexManifest, IndexOrigin, IndexSummary, IndexedChunk, PersistedIndex, INDEX_FORMAT_VERSION,
};
pub use preferences::{
    preference_options, PreferenceOption, PreferenceOptions, TravelCompanion, TravelInterest,
    TravelPreferences,
};
pub use session::{ChatSession, Message, MessageRole};
