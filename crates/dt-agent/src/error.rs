#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("planner request failed: {0}")]
    Planner(String),

    #[error("planner is rate-limited or overloaded")]
    RateLimited,

    #[error("exceeded maxApiCalls budget of {limit}")]
    ApiCallBudgetExceeded { limit: u32 },

    #[error("exceeded maxCallsPerStep budget of {limit} for step {step}")]
    StepCallBudgetExceeded { step: u32, limit: u32 },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid tool input for {tool}: {reason}")]
    InvalidToolInput { tool: String, reason: String },

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;
