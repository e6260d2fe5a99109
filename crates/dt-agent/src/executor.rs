use async_trait::async_trait;

use crate::error::AgentResult;
use crate::tools::AgentTool;

/// Executes a dispatched tool against the live sandbox (`dt_sandbox::Sandbox`
/// in the concrete implementation owned by `dt-hybrid`). Decoupled from
/// `dt-sandbox` so this crate can be tested without a browser driver.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool: &AgentTool) -> AgentResult<serde_json::Value>;
}
