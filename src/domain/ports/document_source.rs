use async_trait::async_trait;

use crate::domain::{errors::DomainError, LoadedDocument};

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load_documents(&self) -> Result<Vec<LoadedDocument>, DomainError>;
    fn describe(&self) -> String;
}
