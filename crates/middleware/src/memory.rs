use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::kv::{KvError, KvStore, KvValue};

pub(crate) fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct Entry {
    value: Bytes,
    cas: u64,
    expiry: u64,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        self.expiry <= now
    }
}

/// In-memory CAS store used in tests and single-node deployments.
pub struct InMemoryKvStore {
    name: String,
    data: Arc<RwLock<HashMap<String, Entry>>>,
    next_cas: AtomicU64,
}

impl InMemoryKvStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(RwLock::new(HashMap::new())),
            next_cas: AtomicU64::new(1),
        }
    }

    fn fresh_cas(&self) -> u64 {
        self.next_cas.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<KvValue>, KvError> {
        let data = self.data.read().await;
        let now = now_epoch();
        Ok(data.get(key).and_then(|e| {
            if e.is_expired(now) {
                None
            } else {
                Some(KvValue { value: e.value.clone(), cas: e.cas })
            }
        }))
    }

    async fn add(&self, key: &str, value: Bytes, expiry: u64) -> Result<(), KvError> {
        let mut data = self.data.write().await;
        let now = now_epoch();
        match data.get(key) {
            Some(e) if !e.is_expired(now) => Err(KvError::Contention),
            _ => {
                data.insert(
                    key.to_string(),
                    Entry { value, cas: self.fresh_cas(), expiry },
                );
                Ok(())
            }
        }
    }

    async fn set(&self, key: &str, value: Bytes, cas: u64, expiry: u64) -> Result<(), KvError> {
        let mut data = self.data.write().await;
        let now = now_epoch();
        match data.get(key) {
            None => Err(KvError::NotFound),
            Some(e) if e.is_expired(now) => Err(KvError::NotFound),
            Some(e) if e.cas != cas => Err(KvError::Contention),
            Some(_) => {
                data.insert(
                    key.to_string(),
                    Entry { value, cas: self.fresh_cas(), expiry },
                );
                Ok(())
            }
        }
    }

    async fn set_unconditional(
        &self,
        key: &str,
        value: Bytes,
        expiry: u64,
    ) -> Result<(), KvError> {
        let mut data = self.data.write().await;
        data.insert(
            key.to_string(),
            Entry { value, cas: self.fresh_cas(), expiry },
        );
        Ok(())
    }

    async fn delete(&self, key: &str, cas: u64) -> Result<(), KvError> {
        let mut data = self.data.write().await;
        let now = now_epoch();
        match data.get(key) {
            None => Err(KvError::NotFound),
            Some(e) if e.is_expired(now) => Err(KvError::NotFound),
            Some(e) if e.cas != cas => Err(KvError::Contention),
            Some(_) => {
                data.remove(key);
                Ok(())
            }
        }
    }
}
