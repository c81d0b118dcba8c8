use hsgw_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("not found")]
    NotFound,

    /// The store holds a record this write cannot reconcile with (e.g. the
    /// key became an associated pointer and our data is not fresh enough to
    /// overwrite it).
    #[error("conflicting record for {0}")]
    Conflict(String),

    #[error("contention retries exhausted for {0}")]
    RetriesExhausted(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed service profile: {0}")]
    Profile(#[from] hsgw_types::TypesError),
}
