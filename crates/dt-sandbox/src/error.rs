//! Error types for the sandbox module.

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("bootstrap failed after {attempts} attempt(s): {reason}")]
    BootstrapFailed { attempts: u32, reason: String },

    #[error("circuit breaker open: {consecutive_failures} consecutive failures (threshold {threshold})")]
    CircuitBreakerOpen {
        consecutive_failures: u32,
        threshold: u32,
    },

    #[error("no free port available in range {start}..{end}")]
    PortPoolExhausted { start: u16, end: u16 },

    #[error("teardown failed: {0}")]
    TeardownFailed(String),

    #[error("trace archive error: {0}")]
    Trace(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
