//! Drives a single step of the conversation loop against the Planner and a
//! `ToolExecutor`, including the deterministic short-circuit and the
//! single-step agent's richer opening message (spec.md §4.5).

use std::time::Duration;

use tracing::{instrument, warn};

use crate::budget::BudgetState;
use crate::cost::CostTracker;
use crate::error::{AgentError, AgentResult};
use crate::executor::ToolExecutor;
use crate::planner::Planner;
use crate::protocol::{Message, PlannerRequest, StopReason};
use crate::tools::{tool_catalog, AgentTool};

/// How long to sleep before retrying a rate-limited/overloaded planner call
/// (spec.md §4.5).
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Complete,
    Failed(String),
}

/// Steps whose type is purely scripted (e.g. `navigate(url)`) bypass the
/// planner entirely. Returns `None` if the step isn't deterministic.
pub fn deterministic_tool_for(step_description: &str) -> Option<AgentTool> {
    let trimmed = step_description.trim();
    let rest = trimmed.strip_prefix("navigate(")?;
    let inner = rest.strip_suffix(')')?;
    let url = inner.trim().trim_matches(|c| c == '"' || c == '\'');
    Some(AgentTool::Navigate { url: url.to_string() })
}

/// Runs the conversation loop for one step until the agent emits a control
/// tool (`step_complete`/`step_failed`/`test_complete`) or the planner stops
/// without one (treated as a step failure).
#[instrument(skip(planner, executor, budgets, cost, opening_message))]
pub async fn run_step(
    planner: &dyn Planner,
    executor: &dyn ToolExecutor,
    model: &str,
    system_prompt: &str,
    opening_message: Message,
    step_index: u32,
    budgets: &mut BudgetState,
    cost: &mut CostTracker,
) -> AgentResult<StepResult> {
    let mut messages = vec![opening_message];

    loop {
        budgets.record_call(step_index)?;

        let request = PlannerRequest {
            model: model.to_string(),
            max_tokens: 4096,
            system_prompt: system_prompt.to_string(),
            tools: tool_catalog(),
            messages: messages.clone(),
        };
        let response = match planner.complete(request).await {
            Ok(response) => response,
            Err(AgentError::RateLimited) => {
                budgets.release_call(step_index);
                warn!(step = step_index, "planner rate-limited or overloaded, retrying in 5s");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                continue;
            }
            Err(e) => return Err(e),
        };
        cost.record(model, &response.usage);

        let mut control = None;
        let mut tool_results = Vec::new();

        for (id, name, input) in response.tool_calls() {
            match AgentTool::parse(name, input) {
                Ok(AgentTool::StepComplete) | Ok(AgentTool::TestComplete) => {
                    control = Some(StepResult::Complete);
                }
                Ok(AgentTool::StepFailed { reason }) => {
                    control = Some(StepResult::Failed(reason));
                }
                Ok(tool) => {
                    let (content, is_error) = match executor.execute(&tool).await {
                        Ok(v) => (v, false),
                        Err(e) => (serde_json::json!({"error": e.to_string()}), true),
                    };
                    tool_results.push(Message::tool_result(id, content, is_error));
                }
                Err(e) => {
                    tool_results.push(Message::tool_result(
                        id,
                        serde_json::json!({"error": e.to_string()}),
                        true,
                    ));
                }
            }
        }

        if let Some(outcome) = control {
            return Ok(outcome);
        }

        messages.push(Message {
            role: "assistant".to_string(),
            content: response.content.clone(),
        });
        messages.extend(tool_results);

        if matches!(response.stop_reason, StopReason::EndTurn) {
            return Ok(StepResult::Failed(
                "planner ended turn without completing the step".to_string(),
            ));
        }
    }
}

/// Runs a step, bypassing the planner entirely when it's purely scripted.
pub async fn run_step_with_short_circuit(
    planner: &dyn Planner,
    executor: &dyn ToolExecutor,
    model: &str,
    system_prompt: &str,
    opening_message: Message,
    step_description: &str,
    step_index: u32,
    budgets: &mut BudgetState,
    cost: &mut CostTracker,
) -> AgentResult<StepResult> {
    if let Some(tool) = deterministic_tool_for(step_description) {
        return match executor.execute(&tool).await {
            Ok(_) => Ok(StepResult::Complete),
            Err(e) => Ok(StepResult::Failed(e.to_string())),
        };
    }
    run_step(
        planner,
        executor,
        model,
        system_prompt,
        opening_message,
        step_index,
        budgets,
        cost,
    )
    .await
}

/// The single-step agent invoked by the Hybrid Executor: same contract as
/// `run_step`, with a richer opening message and the caller expected to use
/// `Budgets::single_step()`.
pub fn single_step_opening_message(
    goal: &str,
    dapp_url: &str,
    failed_spec_code: &str,
    error: &str,
    completed_steps: &[String],
    upcoming_step_descriptions: &[String],
) -> Message {
    let text = format!(
        "Goal: {goal}\nDapp URL: {dapp_url}\nFailed spec code:\n{failed_spec_code}\nError: {error}\nAlready-completed steps: {}\nUpcoming steps: {}\n\nIf the current target no longer exists but the page state already matches the next step's precondition, mark complete.",
        completed_steps.join(", "),
        upcoming_step_descriptions.join(", "),
    );
    Message::user_text(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Budgets;
    use crate::planner::{FakePlanner, FakePlannerStep};
    use crate::protocol::{ContentBlock, PlannerResponse, Usage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingExecutor {
        calls: Mutex<Vec<AgentTool>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ToolExecutor for RecordingExecutor {
        async fn execute(&self, tool: &AgentTool) -> AgentResult<serde_json::Value> {
            self.calls.lock().unwrap().push(tool.clone());
            Ok(serde_json::json!({"ok": true}))
        }
    }

    fn response_with(blocks: Vec<ContentBlock>) -> PlannerResponse {
        PlannerResponse {
            content: blocks,
            stop_reason: StopReason::ToolUse,
            usage: Usage::default(),
        }
    }

    #[tokio::test]
    async fn step_completes_when_agent_emits_step_complete() {
        let planner = FakePlanner::new(vec![response_with(vec![
            ContentBlock::ToolUse {
                id: "1".into(),
                name: "browser_click".into(),
                input: serde_json::json!({"ref": "e5"}),
            },
            ContentBlock::ToolUse {
                id: "2".into(),
                name: "step_complete".into(),
                input: serde_json::json!({}),
            },
        ])]);
        let executor = RecordingExecutor::new();
        let mut budgets = BudgetState::new(Budgets::default());
        let mut cost = CostTracker::new();

        let result = run_step(
            &planner,
            &executor,
            "claude-opus",
            "system",
            Message::user_text("go"),
            1,
            &mut budgets,
            &mut cost,
        )
        .await
        .unwrap();

        assert_eq!(result, StepResult::Complete);
        assert_eq!(executor.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn step_fails_when_agent_emits_step_failed() {
        let planner = FakePlanner::new(vec![response_with(vec![ContentBlock::ToolUse {
            id: "1".into(),
            name: "step_failed".into(),
            input: serde_json::json!({"reason": "selector not found"}),
        }])]);
        let executor = RecordingExecutor::new();
        let mut budgets = BudgetState::new(Budgets::default());
        let mut cost = CostTracker::new();

        let result = run_step(
            &planner,
            &executor,
            "claude-opus",
            "system",
            Message::user_text("go"),
            1,
            &mut budgets,
            &mut cost,
        )
        .await
        .unwrap();

        assert_eq!(result, StepResult::Failed("selector not found".to_string()));
    }

    #[tokio::test]
    async fn deterministic_navigate_step_bypasses_the_planner() {
        let planner = FakePlanner::new(vec![]);
        let executor = RecordingExecutor::new();
        let mut budgets = BudgetState::new(Budgets::default());
        let mut cost = CostTracker::new();

        let result = run_step_with_short_circuit(
            &planner,
            &executor,
            "claude-opus",
            "system",
            Message::user_text("go"),
            "navigate(\"https://example-dapp.test\")",
            1,
            &mut budgets,
            &mut cost,
        )
        .await
        .unwrap();

        assert_eq!(result, StepResult::Complete);
        assert_eq!(executor.calls.lock().unwrap()[0], AgentTool::Navigate {
            url: "https://example-dapp.test".to_string()
        });
    }

    #[tokio::test]
    async fn step_call_budget_is_enforced() {
        let response = response_with(vec![ContentBlock::ToolUse {
            id: "1".into(),
            name: "browser_click".into(),
            input: serde_json::json!({"ref": "e5"}),
        }]);
        let planner = FakePlanner::new(vec![response.clone(), response.clone(), response]);
        let executor = RecordingExecutor::new();
        let mut budgets = BudgetState::new(Budgets {
            max_api_calls: 100,
            max_calls_per_step: 2,
        });
        let mut cost = CostTracker::new();

        let result = run_step(
            &planner,
            &executor,
            "claude-opus",
            "system",
            Message::user_text("go"),
            1,
            &mut budgets,
            &mut cost,
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_planner_response_sleeps_and_retries_without_spending_budget() {
        let planner = FakePlanner::scripted(vec![
            FakePlannerStep::RateLimited,
            FakePlannerStep::RateLimited,
            FakePlannerStep::Response(response_with(vec![ContentBlock::ToolUse {
                id: "1".into(),
                name: "step_complete".into(),
                input: serde_json::json!({}),
            }])),
        ]);
        let executor = RecordingExecutor::new();
        let mut budgets = BudgetState::new(Budgets { max_api_calls: 1, max_calls_per_step: 1 });
        let mut cost = CostTracker::new();

        let result = run_step(
            &planner,
            &executor,
            "claude-opus",
            "system",
            Message::user_text("go"),
            1,
            &mut budgets,
            &mut cost,
        )
        .await
        .unwrap();

        assert_eq!(result, StepResult::Complete);
        // both rate-limited attempts were refunded; only the final,
        // successful call counts against the (otherwise exhausted) budget.
        assert_eq!(budgets.total_calls(), 1);
    }
}
