#[derive(Debug, thiserror::Error)]
pub enum SelfHealError {
    #[error("blob store error: {0}")]
    Store(#[from] dt_store::StoreError),

    #[error(transparent)]
    Types(#[from] dt_types::DtError),

    #[error("generator request failed: {0}")]
    Generator(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type SelfHealResult<T> = std::result::Result<T, SelfHealError>;
