use dt_types::JobId;
use thiserror::Error;

pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {0} has no valid lock to renew or ack")]
    NotLocked(JobId),

    #[error("job {0} is cancelled and may not be claimed")]
    Cancelled(JobId),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<surrealdb::Error> for QueueError {
    fn from(err: surrealdb::Error) -> Self {
        QueueError::Backend(err.to_string())
    }
}
