//! Error types for the Blob Store and Record Store adapters.

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("blob not found: {key}")]
    BlobNotFound { key: String },

    #[error("record not found: {kind} {id}")]
    RecordNotFound { kind: &'static str, id: String },

    #[error("record {kind} {id} is {status}, expected {expected}")]
    InvalidRecordState {
        kind: &'static str,
        id: String,
        status: String,
        expected: String,
    },

    #[error("backend query failed: {0}")]
    Backend(String),

    #[error("schema setup failed: {0}")]
    SchemaSetup(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Domain(#[from] dt_types::DtError),
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
