use async_trait::async_trait;

use crate::domain::{errors::DomainError, PersistedIndex};

#[async_trait]
pub trait IndexStorage: Send + Sync {
    /// Creates the storage location if it does not exist yet.
    async fn prepare(&self) -> Result<(), DomainError>;
    /// `Ok(None)` when nothing has been persisted yet; `Err` when something is
    /// there but cannot be read back.
    async fn load(&self) -> Result<Option<PersistedIndex>, DomainError>;
    async fn save(&self, index: &PersistedIndex) -> Result<(), DomainError>;
    fn location(&self) -> String;
}
