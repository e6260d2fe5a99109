//! Error taxonomy for the execution and self-healing subsystem.
//!
//! Kinds, not types (spec §7): config, bootstrap, spec-runtime, agent,
//! cancellation, and storage errors are modeled by the crates that own
//! those stages; this enum covers the data-model-level failures shared
//! across all of them.

use uuid::Uuid;

pub type Result<T> = std::result::Result<T, DtError>;

#[derive(Debug, thiserror::Error)]
pub enum DtError {
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("spec {0} has status DRAFT and is not eligible to run")]
    SpecNotEligible(Uuid),

    #[error("spec {0} is not eligible for self-heal (attempt >= maxAttempts)")]
    SelfHealNotEligible(Uuid),

    #[error("run {0} not found")]
    RunNotFound(Uuid),

    #[error("spec {0} not found")]
    SpecNotFound(Uuid),

    #[error("project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("invalid state transition for run {run_id}: {from} -> {to}")]
    InvalidRunTransition {
        run_id: Uuid,
        from: String,
        to: String,
    },

    #[error("digest mismatch: expected {expected}, actual {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
