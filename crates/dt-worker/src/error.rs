//! Worker-level error taxonomy. Every lower-crate error the dispatch loop
//! can observe is wrapped here; the outer handler (spec §7 propagation
//! policy: "only the outer worker handler converts failures into a
//! persisted FAILED status") is the only place a `WorkerError` is produced
//! from a `WorkerResult`.

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] dt_store::StoreError),

    #[error(transparent)]
    Queue(#[from] dt_queue::QueueError),

    #[error(transparent)]
    Sandbox(#[from] dt_sandbox::SandboxError),

    #[error(transparent)]
    Runner(#[from] dt_runner::RunnerError),

    #[error(transparent)]
    Hybrid(#[from] dt_hybrid::HybridError),

    #[error(transparent)]
    SelfHeal(#[from] dt_selfheal::SelfHealError),

    #[error(transparent)]
    Types(#[from] dt_types::DtError),

    #[error("malformed job payload: {0}")]
    InvalidPayload(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type WorkerResult<T> = std::result::Result<T, WorkerError>;
