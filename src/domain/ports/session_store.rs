use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{errors::DomainError, ChatSession, Message};

/// Each mutation is applied atomically with respect to the others on the same
/// session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self) -> Result<ChatSession, DomainError>;
    async fn get(&self, id: Uuid) -> Result<Option<ChatSession>, DomainError>;
    /// Returns the session's generation after the append. Fails with
    /// `NotFound` when the session is unknown or expired.
    async fn append(&self, id: Uuid, message: Message) -> Result<u64, DomainError>;
    /// Appends only while the session is still at `generation`. Returns
    /// `false`, leaving the session untouched, when it was cleared since.
    async fn append_if_generation(
        &self,
        id: Uuid,
        generation: u64,
        message: Message,
    ) -> Result<bool, DomainError>;
    async fn clear(&self, id: Uuid) -> Result<(), DomainError>;
    async fn delete(&self, id: Uuid) -> Result<(), DomainError>;
    async fn ping(&self) -> Result<(), DomainError>;
}
