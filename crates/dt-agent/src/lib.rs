//! Agent Loop (C7): drives a scripted or autonomous conversation against a
//! Planner, dispatching tool calls through a `ToolExecutor` and tracking
//! budgets and token cost.

pub mod budget;
pub mod cost;
pub mod engine;
pub mod error;
pub mod executor;
pub mod planner;
pub mod protocol;
pub mod tools;

pub use budget::{BudgetState, Budgets};
pub use cost::CostTracker;
pub use engine::{
    deterministic_tool_for, run_step, run_step_with_short_circuit, single_step_opening_message,
    StepResult,
};
pub use error::{AgentError, AgentResult};
pub use executor::ToolExecutor;
pub use planner::{FakePlanner, HttpPlanner, Planner};
pub use protocol::{
    ContentBlock, Message, PlannerRequest, PlannerResponse, StopReason, ToolDefinition, Usage,
};
pub use tools::{tool_catalog, AgentTool};
