mod in_memory;
mod redis;

pub use self::redis::{create_pool, keys, RedisPool, RedisSessionStore};
pub use in_memory::InMemorySessionStore;
