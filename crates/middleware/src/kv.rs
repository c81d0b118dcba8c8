use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    /// A compare-and-store lost the race; the caller re-reads and retries.
    #[error("data contention")]
    Contention,

    /// The key vanished under a conditional operation.
    #[error("not found")]
    NotFound,

    #[error("backend error: {0}")]
    Backend(String),
}

/// A value read from the store together with its compare-and-store token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvValue {
    pub value: Bytes,
    pub cas: u64,
}

/// CAS-capable key-value replica.
///
/// One instance wraps one replica: the co-located local store (authoritative
/// for writes from this node) or a geo-redundant remote. The `cas` token is
/// opaque; the only legal use is handing it back on `set`/`delete`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Replica label used in logs and for origin tracking on read handles.
    fn name(&self) -> &str;

    /// Read a live value. Expired records are never returned.
    async fn get(&self, key: &str) -> Result<Option<KvValue>, KvError>;

    /// Create a key that must not already exist. `expiry` is absolute epoch
    /// seconds. Fails with `Contention` if the key is present.
    async fn add(&self, key: &str, value: Bytes, expiry: u64) -> Result<(), KvError>;

    /// Conditionally replace an existing value. Fails with `Contention` when
    /// the stored token no longer matches, `NotFound` when the key is gone.
    async fn set(&self, key: &str, value: Bytes, cas: u64, expiry: u64) -> Result<(), KvError>;

    /// Blind overwrite, reserved for writes that are safe to lose (the
    /// associated-IMPU pointer path).
    async fn set_unconditional(&self, key: &str, value: Bytes, expiry: u64)
        -> Result<(), KvError>;

    /// Conditionally delete. Deleting an absent key is `NotFound`.
    async fn delete(&self, key: &str, cas: u64) -> Result<(), KvError>;
}
