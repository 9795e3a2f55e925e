//! In-process memory store (non-persistent)

use crate::error::MemoryError;
use crate::memory::Memory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// In-memory key/value store with passive TTL expiry
///
/// Expired records are dropped lazily on access. Cloning shares the
/// underlying map, so one store can back several agents.
#[derive(Clone)]
pub struct InMemoryStore {
    records: Arc<RwLock<HashMap<String, StoredValue>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live (unexpired) records
    pub async fn len(&self) -> usize {
        let records = self.records.read().await;
        records.values().filter(|v| !v.is_expired()).count()
    }

    /// Whether the store holds no live records
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Memory for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
        {
            let records = self.records.read().await;
            match records.get(key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired() => return Ok(Some(stored.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict under the write lock, re-checking in case of a
        // concurrent overwrite between the two lock acquisitions.
        let mut records = self.records.write().await;
        if records.get(key).is_some_and(|stored| stored.is_expired()) {
            records.remove(key);
        }
        Ok(records.get(key).map(|stored| stored.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), MemoryError> {
        let stored = StoredValue {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.records.write().await.insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, MemoryError> {
        let mut records = self.records.write().await;
        match records.remove(key) {
            Some(stored) => Ok(!stored.is_expired()),
            None => Ok(false),
        }
    }
}
