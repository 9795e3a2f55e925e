//! Redis-backed memory (feature `redis-memory`)

use crate::error::MemoryError;
use crate::memory::Memory;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Memory backend over a Redis server
///
/// Keys are namespaced with a prefix so several agents can share one
/// database. TTLs map to Redis `SET EX`, so expiry is enforced server-side.
pub struct RedisMemory {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisMemory {
    /// Connect to a Redis server
    ///
    /// `url` is a `redis://` connection string; `prefix` namespaces every
    /// key written through this instance.
    pub async fn connect<S: Into<String>>(url: &str, prefix: S) -> Result<Self, MemoryError> {
        let client = redis::Client::open(url).map_err(|e| MemoryError::Unavailable {
            message: e.to_string(),
        })?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| MemoryError::Unavailable {
                message: e.to_string(),
            })?;

        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl Memory for RedisMemory {
    async fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
        let mut conn = self.conn.clone();
        let value: Option<String> =
            conn.get(self.full_key(key))
                .await
                .map_err(|e| MemoryError::Unavailable {
                    message: e.to_string(),
                })?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), MemoryError> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);

        let result = match ttl {
            Some(ttl) => {
                // SET EX takes whole seconds; round sub-second TTLs up so a
                // small positive TTL never means "no expiry".
                let seconds = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(full_key, value, seconds).await
            }
            None => conn.set::<_, _, ()>(full_key, value).await,
        };

        result.map_err(|e| MemoryError::Unavailable {
            message: e.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<bool, MemoryError> {
        let mut conn = self.conn.clone();
        let removed: usize =
            conn.del(self.full_key(key))
                .await
                .map_err(|e| MemoryError::Unavailable {
                    message: e.to_string(),
                })?;
        Ok(removed > 0)
    }
}
