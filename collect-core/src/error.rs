use thiserror::Error;

/// Error kinds surfaced internally across the ingestion pipeline.
///
/// These map 1:1 onto the kinds named by the error handling design: each
/// variant is mapped to an HTTP status at the service edge, and to a
/// requeue/dead-letter decision inside the worker loops.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("authentication failed")]
    AuthFailure,

    #[error("bad payload: {0}")]
    BadPayload(String),

    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("shutdown in progress")]
    Shutdown,

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CollectError>;

impl From<sqlx::Error> for CollectError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = ?err, "database operation failed");
        Self::PersistenceFailure(err.to_string())
    }
}

impl From<redis::RedisError> for CollectError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!(error = ?err, "queue substrate operation failed");
        Self::QueueUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CollectError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailure(err.to_string())
    }
}
