#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("empty test program")]
    EmptyProgram,

    #[error("failed to spawn child process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("run timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
