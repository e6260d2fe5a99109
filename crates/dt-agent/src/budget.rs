//! Planner-call budgets and ordering (spec.md §4.5 "Budgets and ordering").

use crate::error::{AgentError, AgentResult};

#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    /// Hard cap; exceeding it aborts the run with all remaining steps failed.
    pub max_api_calls: u32,
    /// Hard cap; exceeding it fails only the current step.
    pub max_calls_per_step: u32,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            max_api_calls: 100,
            max_calls_per_step: 20,
        }
    }
}

impl Budgets {
    /// The single-step agent invoked by the Hybrid Executor (spec.md §4.5).
    pub fn single_step() -> Self {
        Self {
            max_api_calls: 15,
            max_calls_per_step: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BudgetState {
    budgets: Budgets,
    total_calls: u32,
    current_step: Option<u32>,
    step_calls: u32,
}

impl BudgetState {
    pub fn new(budgets: Budgets) -> Self {
        Self {
            budgets,
            total_calls: 0,
            current_step: None,
            step_calls: 0,
        }
    }

    /// Called before each planner call. `step` is the step index the call
    /// belongs to (single-step invocations should always pass the same
    /// value).
    pub fn record_call(&mut self, step: u32) -> AgentResult<()> {
        if self.current_step != Some(step) {
            self.current_step = Some(step);
            self.step_calls = 0;
        }

        self.total_calls += 1;
        if self.total_calls > self.budgets.max_api_calls {
            return Err(AgentError::ApiCallBudgetExceeded {
                limit: self.budgets.max_api_calls,
            });
        }

        self.step_calls += 1;
        if self.step_calls > self.budgets.max_calls_per_step {
            return Err(AgentError::StepCallBudgetExceeded {
                step,
                limit: self.budgets.max_calls_per_step,
            });
        }

        Ok(())
    }

    pub fn total_calls(&self) -> u32 {
        self.total_calls
    }

    /// Undoes the last `record_call` for `step`. Used when a planner call
    /// turned out to be rate-limited/overloaded: that attempt is retried for
    /// free rather than counted against the budget (spec.md §4.5).
    pub fn release_call(&mut self, step: u32) {
        debug_assert_eq!(self.current_step, Some(step));
        self.total_calls = self.total_calls.saturating_sub(1);
        self.step_calls = self.step_calls.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_budget_resets_on_new_step() {
        let mut state = BudgetState::new(Budgets {
            max_api_calls: 100,
            max_calls_per_step: 2,
        });
        assert!(state.record_call(1).is_ok());
        assert!(state.record_call(1).is_ok());
        assert!(matches!(
            state.record_call(1),
            Err(AgentError::StepCallBudgetExceeded { step: 1, .. })
        ));
        // a new step resets the per-step counter
        assert!(state.record_call(2).is_ok());
    }

    #[test]
    fn total_budget_is_never_reset() {
        let mut state = BudgetState::new(Budgets {
            max_api_calls: 2,
            max_calls_per_step: 100,
        });
        assert!(state.record_call(1).is_ok());
        assert!(state.record_call(2).is_ok());
        assert!(matches!(
            state.record_call(3),
            Err(AgentError::ApiCallBudgetExceeded { limit: 2 })
        ));
    }
}
