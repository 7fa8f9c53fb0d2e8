mod text;

pub use text::GeminiEmbedding;
