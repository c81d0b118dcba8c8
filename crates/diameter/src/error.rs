use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiameterError {
    #[error("timed out waiting for answer")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("stack closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
