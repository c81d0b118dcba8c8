use hsgw_middleware::KvError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Kv(#[from] KvError),

    #[error("record decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::Kv(KvError::Contention))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Kv(KvError::NotFound))
    }
}
