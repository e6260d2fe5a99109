//! The closed tool vocabulary (spec.md §4.5) and its flat dispatch table.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, AgentResult};
use crate::protocol::ToolDefinition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "input", rename_all = "snake_case")]
pub enum AgentTool {
    // Browser
    Snapshot,
    Click { element_ref: String },
    Type { element_ref: String, text: String },
    Select { element_ref: String, value: String },
    Navigate { url: String },
    Scroll { dx: i64, dy: i64 },
    Wait { duration_ms: u64 },
    GoBack,
    Evaluate { script: String },
    PressKey { key: String },
    Screenshot,
    AssertWalletConnected,

    // Wallet
    Approve,
    Sign,
    ConfirmTransaction,
    SwitchNetwork { name: String },
    Reject,
    HandleSiwePopup,

    // Control
    StepComplete,
    StepFailed { reason: String },
    TestComplete,
}

impl AgentTool {
    /// Only these translate into spec code when a hybrid-executor recovery
    /// patch is assembled (spec.md §4.4 "State-changing action filter").
    pub fn is_state_changing(&self) -> bool {
        matches!(
            self,
            AgentTool::Click { .. }
                | AgentTool::Type { .. }
                | AgentTool::PressKey { .. }
                | AgentTool::Select { .. }
                | AgentTool::Approve
                | AgentTool::ConfirmTransaction
                | AgentTool::SwitchNetwork { .. }
        )
    }

    pub fn is_control(&self) -> bool {
        matches!(
            self,
            AgentTool::StepComplete | AgentTool::StepFailed { .. } | AgentTool::TestComplete
        )
    }

    /// Parses a planner tool call (`name`, `input`) against the flat
    /// dispatch table.
    pub fn parse(name: &str, input: &Value) -> AgentResult<Self> {
        let field = |key: &str| -> AgentResult<String> {
            input
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| AgentError::InvalidToolInput {
                    tool: name.to_string(),
                    reason: format!("missing field `{key}`"),
                })
        };

        Ok(match name {
            "snapshot" | "browser_snapshot" => AgentTool::Snapshot,
            "click" | "browser_click" => AgentTool::Click { element_ref: field("ref")? },
            "type" | "browser_type" => AgentTool::Type {
                element_ref: field("ref")?,
                text: field("text")?,
            },
            "select" | "browser_select" => AgentTool::Select {
                element_ref: field("ref")?,
                value: field("value")?,
            },
            "navigate" | "browser_navigate" => AgentTool::Navigate { url: field("url")? },
            "scroll" => AgentTool::Scroll {
                dx: input.get("dx").and_then(|v| v.as_i64()).unwrap_or(0),
                dy: input.get("dy").and_then(|v| v.as_i64()).unwrap_or(0),
            },
            "wait" => AgentTool::Wait {
                duration_ms: input.get("duration_ms").and_then(|v| v.as_u64()).unwrap_or(1000),
            },
            "go_back" => AgentTool::GoBack,
            "evaluate" | "browser_evaluate" => AgentTool::Evaluate { script: field("script")? },
            "press_key" | "browser_press_key" => AgentTool::PressKey { key: field("key")? },
            "screenshot" | "browser_screenshot" => AgentTool::Screenshot,
            "assert_wallet_connected" => AgentTool::AssertWalletConnected,
            "approve" | "wallet_approve" => AgentTool::Approve,
            "sign" | "wallet_sign" => AgentTool::Sign,
            "confirm_transaction" | "wallet_confirm_transaction" => AgentTool::ConfirmTransaction,
            "switch_network" | "wallet_switch_network" => AgentTool::SwitchNetwork { name: field("name")? },
            "reject" | "wallet_reject" => AgentTool::Reject,
            "handle_siwe_popup" => AgentTool::HandleSiwePopup,
            "step_complete" => AgentTool::StepComplete,
            "step_failed" => AgentTool::StepFailed {
                reason: field("reason").unwrap_or_else(|_| "unspecified".to_string()),
            },
            "test_complete" => AgentTool::TestComplete,
            other => return Err(AgentError::UnknownTool(other.to_string())),
        })
    }
}

/// Tool definitions sent to the planner (spec.md §6 `tools[]`).
pub fn tool_catalog() -> Vec<ToolDefinition> {
    let simple = |name: &str, description: &str| ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::json!({"type": "object", "properties": {}}),
    };

    vec![
        ToolDefinition {
            name: "snapshot".into(),
            description: "Return a textual accessibility tree with opaque refs".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "click".into(),
            description: "Click the element addressed by ref from the most recent snapshot".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {"ref": {"type": "string"}}, "required": ["ref"]}),
        },
        ToolDefinition {
            name: "type".into(),
            description: "Type text into the element addressed by ref".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {"ref": {"type": "string"}, "text": {"type": "string"}}, "required": ["ref", "text"]}),
        },
        ToolDefinition {
            name: "select".into(),
            description: "Select a value in the element addressed by ref".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {"ref": {"type": "string"}, "value": {"type": "string"}}, "required": ["ref", "value"]}),
        },
        ToolDefinition {
            name: "navigate".into(),
            description: "Navigate the page to a URL".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {"url": {"type": "string"}}, "required": ["url"]}),
        },
        simple("scroll", "Scroll the page by (dx, dy)"),
        simple("wait", "Wait a number of milliseconds"),
        simple("go_back", "Navigate back"),
        ToolDefinition {
            name: "evaluate".into(),
            description: "Evaluate a script in the page context".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {"script": {"type": "string"}}, "required": ["script"]}),
        },
        ToolDefinition {
            name: "press_key".into(),
            description: "Press a keyboard key".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {"key": {"type": "string"}}, "required": ["key"]}),
        },
        simple("screenshot", "Capture a screenshot of the non-extension tab"),
        simple("assert_wallet_connected", "Assert the wallet is connected"),
        simple("approve", "Approve the pending wallet request"),
        simple("sign", "Sign the pending wallet message"),
        simple("confirm_transaction", "Confirm the pending wallet transaction"),
        ToolDefinition {
            name: "switch_network".into(),
            description: "Switch the wallet's active network".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
        },
        simple("reject", "Reject the pending wallet request"),
        simple("handle_siwe_popup", "Handle a sign-in-with-Ethereum popup"),
        simple("step_complete", "Mark the current step complete"),
        ToolDefinition {
            name: "step_failed".into(),
            description: "Mark the current step failed".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {"reason": {"type": "string"}}}),
        },
        simple("test_complete", "Mark the whole test complete"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changing_filter_matches_spec_list() {
        assert!(AgentTool::Click { element_ref: "e1".into() }.is_state_changing());
        assert!(AgentTool::Approve.is_state_changing());
        assert!(!AgentTool::Snapshot.is_state_changing());
        assert!(!AgentTool::Evaluate { script: "1".into() }.is_state_changing());
        assert!(!AgentTool::Navigate { url: "x".into() }.is_state_changing());
    }

    #[test]
    fn parses_click_with_ref() {
        let parsed = AgentTool::parse("browser_click", &serde_json::json!({"ref": "e5"})).unwrap();
        assert_eq!(parsed, AgentTool::Click { element_ref: "e5".into() });
    }

    #[test]
    fn rejects_unknown_tool() {
        assert!(matches!(
            AgentTool::parse("teleport", &serde_json::json!({})),
            Err(AgentError::UnknownTool(_))
        ));
    }

    #[test]
    fn missing_required_field_is_an_error() {
        assert!(matches!(
            AgentTool::parse("click", &serde_json::json!({})),
            Err(AgentError::InvalidToolInput { .. })
        ));
    }
}
