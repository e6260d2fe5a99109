#[derive(Debug, thiserror::Error)]
pub enum HybridError {
    #[error("empty test program")]
    EmptyProgram,

    #[error("unbalanced braces in step {step} body")]
    UnbalancedBraces { step: u32 },

    #[error("unbalanced braces in main test declaration")]
    UnbalancedTestBody,

    #[error("step {step} evaluation failed: {message}")]
    StepFailed { step: u32, message: String },

    #[error("sandbox error: {0}")]
    Sandbox(#[from] dt_sandbox::SandboxError),

    #[error("agent error: {0}")]
    Agent(#[from] dt_agent::AgentError),
}

pub type HybridResult<T> = std::result::Result<T, HybridError>;
