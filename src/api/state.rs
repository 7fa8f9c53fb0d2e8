use std::sync::Arc;

use crate::application::{ChatService, IndexService, RagService};
use crate::bootstrap::Services;
use crate::domain::ports::SessionStore;
use crate::infrastructure::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub rag: Arc<RagService>,
    pub index: Arc<IndexService>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(services: Services, config: AppConfig) -> Self {
        Self {
            chat: services.chat,
            rag: services.rag,
            index: services.index,
            sessions: services.sessions,
            config: Arc::new(config),
        }
    }
}
