//! Run: one execution of a spec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DtError, Result};
use crate::ids::{RunId, SpecId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Cancelled,
    Timeout,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Passed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Timeout
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    Spec,
    Agent,
    Hybrid,
    Suite,
    SelfHeal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamingMode {
    None,
    Vnc,
    Video,
}

/// Per-model token tally, persisted on the run (C7 cost accounting).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
}

/// One entry in the agent's step timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStepRecord {
    pub step: u32,
    pub mode: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentData {
    pub steps: Vec<AgentStepRecord>,
    pub usage_by_model: std::collections::BTreeMap<String, ModelUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub spec_id: SpecId,
    pub status: RunStatus,
    pub execution_mode: ExecutionMode,
    pub streaming_mode: StreamingMode,
    pub is_auto_retry: bool,
    pub agent_data: AgentData,
    pub logs: String,
    pub error: Option<String>,
    pub container_id: Option<String>,
    pub duration_ms: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Run {
    pub fn new(spec_id: SpecId, execution_mode: ExecutionMode, streaming_mode: StreamingMode) -> Self {
        Self {
            id: RunId::new(),
            spec_id,
            status: RunStatus::Pending,
            execution_mode,
            streaming_mode,
            is_auto_retry: false,
            agent_data: AgentData::default(),
            logs: String::new(),
            error: None,
            container_id: None,
            duration_ms: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// A run is cancellable only while `PENDING` or `RUNNING`.
    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, RunStatus::Pending | RunStatus::Running)
    }

    pub fn start(&mut self) -> Result<()> {
        if self.status != RunStatus::Pending {
            return Err(DtError::InvalidRunTransition {
                run_id: self.id.0,
                from: format!("{:?}", self.status),
                to: "RUNNING".into(),
            });
        }
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Transition to a terminal status. Enforces cancel dominance (P6):
    /// once `CANCELLED`, no later call may overwrite the status.
    pub fn complete(&mut self, status: RunStatus) -> Result<()> {
        if !status.is_terminal() {
            return Err(DtError::InvalidRunTransition {
                run_id: self.id.0,
                from: format!("{:?}", self.status),
                to: format!("{:?}", status),
            });
        }
        if self.status == RunStatus::Cancelled {
            // already terminal and dominant; silently ignore further writes
            return Ok(());
        }
        if self.status.is_terminal() {
            return Err(DtError::InvalidRunTransition {
                run_id: self.id.0,
                from: format!("{:?}", self.status),
                to: format!("{:?}", status),
            });
        }
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds().max(0) as u64);
        }
        Ok(())
    }

    /// Cooperative cancellation: wins over any other terminal status if
    /// observed first (P6).
    pub fn cancel(&mut self) -> Result<()> {
        if !self.is_cancellable() {
            return Err(DtError::InvalidRunTransition {
                run_id: self.id.0,
                from: format!("{:?}", self.status),
                to: "CANCELLED".into(),
            });
        }
        self.status = RunStatus::Cancelled;
        let now = Utc::now();
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds().max(0) as u64);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_run() -> Run {
        Run::new(SpecId::new(), ExecutionMode::Spec, StreamingMode::None)
    }

    #[test]
    fn terminal_exclusivity_p1() {
        let mut run = new_run();
        assert!(run.completed_at.is_none());
        run.start().unwrap();
        assert!(run.completed_at.is_none());
        run.complete(RunStatus::Passed).unwrap();
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn started_before_completed() {
        let mut run = new_run();
        run.start().unwrap();
        run.complete(RunStatus::Passed).unwrap();
        assert!(run.started_at.unwrap() <= run.completed_at.unwrap());
    }

    #[test]
    fn cancel_dominance_p6() {
        let mut run = new_run();
        run.start().unwrap();
        run.cancel().unwrap();
        // A later attempt to write a different terminal status must not
        // overwrite CANCELLED.
        run.complete(RunStatus::Passed).unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[test]
    fn cannot_cancel_terminal_run() {
        let mut run = new_run();
        run.start().unwrap();
        run.complete(RunStatus::Failed).unwrap();
        assert!(run.cancel().is_err());
    }

    #[test]
    fn cannot_start_twice() {
        let mut run = new_run();
        run.start().unwrap();
        assert!(run.start().is_err());
    }
}
