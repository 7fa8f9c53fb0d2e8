use crate::domain::errors::DomainError;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Incremental text chunks of one generated answer.
pub type TextStream = BoxStream<'static, Result<String, DomainError>>;

#[async_trait]
pub trait LlmService: Send + Sync {
    async fn stream_with_system(&self, system: &str, prompt: &str)
        -> Result<TextStream, DomainError>;
}
