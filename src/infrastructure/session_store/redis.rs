use async_trait::async_trait;
use deadpool_redis::redis::{self, cmd, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use uuid::Uuid;

use crate::domain::{ports::SessionStore, ChatSession, DomainError, Message};

pub type RedisPool = Pool;

/// Optimistic transactions give up after this many conflicting writes.
const MAX_ATTEMPTS: usize = 16;

pub mod keys {
    use uuid::Uuid;

    pub fn session(session_id: &Uuid) -> String {
        format!("session:{}", session_id)
    }
}

pub fn create_pool(redis_url: &str) -> Result<RedisPool, DomainError> {
    let cfg = Config::from_url(redis_url);
    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| DomainError::external(format!("Redis pool: {e}")))
}

fn redis_error(e: redis::RedisError) -> DomainError {
    DomainError::external(format!("Redis: {e}"))
}

/// Sessions as JSON values under `session:{id}`, expiring `ttl_seconds` after
/// the last write. Updates run under `WATCH`, so concurrent writers to one
/// session never overwrite each other.
#[derive(Clone)]
pub struct RedisSessionStore {
    pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub fn new(pool: RedisPool, ttl_seconds: u64) -> Self {
        Self { pool, ttl_seconds }
    }

    async fn conn(&self) -> Result<Connection, DomainError> {
        self.pool
            .get()
            .await
            .map_err(|e| DomainError::external(format!("Redis pool: {e}")))
    }

    async fn load(
        &self,
        conn: &mut Connection,
        id: Uuid,
    ) -> Result<Option<ChatSession>, DomainError> {
        let raw: Option<String> = conn.get(keys::session(&id)).await.map_err(redis_error)?;

        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| DomainError::storage(format!("session {id}: {e}")))
        })
        .transpose()
    }

    async fn unwatch(conn: &mut Connection) -> Result<(), DomainError> {
        let _: () = cmd("UNWATCH")
            .query_async(&mut **conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    /// Applies `f` and writes the session back in one `MULTI`/`EXEC`. `f`
    /// returning `None` leaves the session unwritten. Retried when another
    /// client touches the key between the read and the write.
    async fn update<T: Send>(
        &self,
        id: Uuid,
        mut f: impl FnMut(&mut ChatSession) -> Option<T> + Send,
    ) -> Result<Option<T>, DomainError> {
        let key = keys::session(&id);
        let mut conn = self.conn().await?;

        for attempt in 1..=MAX_ATTEMPTS {
            let _: () = cmd("WATCH")
                .arg(&key)
                .query_async(&mut *conn)
                .await
                .map_err(redis_error)?;

            let Some(mut session) = self.load(&mut conn, id).await? else {
                Self::unwatch(&mut conn).await?;
                return Err(DomainError::not_found(format!("session {id}")));
            };
            let Some(value) = f(&mut session) else {
                Self::unwatch(&mut conn).await?;
                return Ok(None);
            };

            let json = serde_json::to_string(&session)
                .map_err(|e| DomainError::internal(e.to_string()))?;
            let committed: Option<()> = redis::pipe()
                .atomic()
                .set_ex(&key, json, self.ttl_seconds)
                .ignore()
                .query_async(&mut *conn)
                .await
                .map_err(redis_error)?;

            if committed.is_some() {
                return Ok(Some(value));
            }
            tracing::debug!(session_id = %id, attempt, "session changed concurrently, retrying");
        }

        Err(DomainError::storage(format!(
            "session {id} kept changing, gave up after {MAX_ATTEMPTS} attempts"
        )))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self) -> Result<ChatSession, DomainError> {
        let session = ChatSession::new();
        let json = serde_json::to_string(&session)
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(keys::session(&session.id), json, self.ttl_seconds)
            .await
            .map_err(redis_error)?;

        tracing::debug!(session_id = %session.id, "session created");
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatSession>, DomainError> {
        let mut conn = self.conn().await?;
        self.load(&mut conn, id).await
    }

    async fn append(&self, id: Uuid, message: Message) -> Result<u64, DomainError> {
        self.update(id, |session| {
            session.push(message.clone());
            Some(session.generation)
        })
        .await?
        .ok_or_else(|| DomainError::internal("append produced no write"))
    }

    async fn append_if_generation(
        &self,
        id: Uuid,
        generation: u64,
        message: Message,
    ) -> Result<bool, DomainError> {
        let written = self
            .update(id, |session| {
                (session.generation == generation).then(|| session.push(message.clone()))
            })
            .await?;
        Ok(written.is_some())
    }

    async fn clear(&self, id: Uuid) -> Result<(), DomainError> {
        self.update(id, |session| {
            session.clear();
            Some(())
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.conn().await?;
        let removed: u64 = conn.del(keys::session(&id)).await.map_err(redis_error)?;

        if removed == 0 {
            return Err(DomainError::not_found(format!("session {id}")));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let mut conn = self.conn().await?;
        let _: String = cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key() {
        let id = Uuid::nil();
        assert_eq!(
            keys::session(&id),
            "session:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_create_pool_is_lazy() {
        // No connection is attempted until a client is checked out.
        assert!(create_pool("redis://127.0.0.1:6399").is_ok());
    }

    /// A store on the server named by `REDIS_URL`; the tests below are
    /// skipped when it is unset.
    fn live_store() -> Option<RedisSessionStore> {
        let url = std::env::var("REDIS_URL").ok()?;
        Some(RedisSessionStore::new(create_pool(&url).ok()?, 60))
    }

    async fn transcript(store: &RedisSessionStore, id: Uuid) -> Vec<Message> {
        store.get(id).await.unwrap().unwrap().messages
    }

    #[tokio::test]
    async fn test_append_clear_delete() {
        let Some(store) = live_store() else { return };
        let id = store.create().await.unwrap().id;

        store.append(id, Message::user("Hi!")).await.unwrap();
        store
            .append(id, Message::assistant("Hello, traveler!"))
            .await
            .unwrap();
        assert_eq!(transcript(&store, id).await.len(), 2);

        store.clear(id).await.unwrap();
        let cleared = store.get(id).await.unwrap().unwrap();
        assert!(cleared.messages.is_empty());
        assert_eq!(cleared.generation, 1);

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
        assert!(matches!(
            store.append(id, Message::user("gone")).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_kept() {
        let Some(store) = live_store() else { return };
        let id = store.create().await.unwrap().id;

        let appends = (0..8).map(|i| store.append(id, Message::user(format!("m{i}"))));
        for result in futures::future::join_all(appends).await {
            result.unwrap();
        }

        assert_eq!(transcript(&store, id).await.len(), 8);
        store.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_reply_after_clear_is_not_stored() {
        let Some(store) = live_store() else { return };
        let id = store.create().await.unwrap().id;

        let generation = store.append(id, Message::user("Hi!")).await.unwrap();
        store.clear(id).await.unwrap();
        let stored = store
            .append_if_generation(id, generation, Message::assistant("late"))
            .await
            .unwrap();

        assert!(!stored);
        assert!(transcript(&store, id).await.is_empty());
        store.delete(id).await.unwrap();
    }
}
