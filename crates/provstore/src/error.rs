use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvError {
    #[error("not found")]
    NotFound,

    /// The store could not satisfy the requested consistency level.
    #[error("unavailable")]
    Unavailable,

    #[error("timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ProvError {
    /// Errors that make the HA policy retry at a weaker consistency level
    /// or on another host.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvError::Timeout | ProvError::Unavailable)
    }
}
