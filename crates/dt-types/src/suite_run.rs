//! SuiteRun: an ordered multiset of Runs sharing one sandbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RunId, SuiteRunId};
use crate::run::RunStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteRun {
    pub id: SuiteRunId,
    /// Child runs in submission order.
    pub run_ids: Vec<RunId>,
    pub passed_tests: u32,
    pub failed_tests: u32,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SuiteRun {
    pub fn new(run_ids: Vec<RunId>) -> Self {
        Self {
            id: SuiteRunId::new(),
            run_ids,
            passed_tests: 0,
            failed_tests: 0,
            status: RunStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Record one child run's terminal outcome. Once every child run has
    /// reported, aggregates the suite's own terminal status.
    pub fn record_child_result(&mut self, passed: bool, completed_children: usize) {
        if passed {
            self.passed_tests += 1;
        } else {
            self.failed_tests += 1;
        }
        if completed_children >= self.run_ids.len() {
            self.status = if self.failed_tests == 0 {
                RunStatus::Passed
            } else {
                RunStatus::Failed
            };
            self.completed_at = Some(Utc::now());
        }
    }

    /// P-invariant: sum equals number of child runs once terminal.
    pub fn is_consistent(&self) -> bool {
        if self.status.is_terminal() {
            (self.passed_tests + self.failed_tests) as usize == self.run_ids.len()
        } else {
            true
        }
    }
}
