use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::domain::{ports::SessionStore, ChatSession, DomainError, Message};

/// Process-local sessions that expire after `ttl` without activity.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, ChatSession>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: i64::try_from(ttl_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    fn with_live_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ChatSession) -> T,
    ) -> Result<Option<T>, DomainError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let expired = match sessions.get(&id) {
            Some(session) => session.is_expired(self.ttl, Utc::now()),
            None => return Ok(None),
        };
        if expired {
            sessions.remove(&id);
            return Ok(None);
        }

        Ok(sessions.get_mut(&id).map(f))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> Result<ChatSession, DomainError> {
        let session = ChatSession::new();
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let now = Utc::now();
        sessions.retain(|_, s| !s.is_expired(self.ttl, now));
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatSession>, DomainError> {
        self.with_live_session(id, |session| session.clone())
    }

    async fn append(&self, id: Uuid, message: Message) -> Result<u64, DomainError> {
        self.with_live_session(id, |session| {
            session.push(message);
            session.generation
        })?
        .ok_or_else(|| DomainError::not_found(format!("session {id}")))
    }

    async fn append_if_generation(
        &self,
        id: Uuid,
        generation: u64,
        message: Message,
    ) -> Result<bool, DomainError> {
        self.with_live_session(id, |session| {
            let current = session.generation == generation;
            if current {
                session.push(message);
            }
            current
        })?
        .ok_or_else(|| DomainError::not_found(format!("session {id}")))
    }

    async fn clear(&self, id: Uuid) -> Result<(), DomainError> {
        self.with_live_session(id, ChatSession::clear)?
            .ok_or_else(|| DomainError::not_found(format!("session {id}")))
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        self.sessions
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(format!("session {id}")))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
