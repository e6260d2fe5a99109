//! Per-response usage accounting, persisted on the Run as `AgentData`.

use std::collections::BTreeMap;

use dt_types::run::ModelUsage;

use crate::protocol::Usage;

#[derive(Debug, Default, Clone)]
pub struct CostTracker {
    by_model: BTreeMap<String, ModelUsage>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: &str, usage: &Usage) {
        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.input_tokens += usage.input_tokens;
        entry.output_tokens += usage.output_tokens;
        entry.cache_read_input_tokens += usage.cache_read_input_tokens;
        entry.cache_creation_input_tokens += usage.cache_creation_input_tokens;
    }

    pub fn into_usage_by_model(self) -> BTreeMap<String, ModelUsage> {
        self.by_model
    }

    pub fn usage_by_model(&self) -> &BTreeMap<String, ModelUsage> {
        &self.by_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_calls_and_models() {
        let mut tracker = CostTracker::new();
        tracker.record(
            "claude-opus",
            &Usage {
                input_tokens: 100,
                output_tokens: 20,
                cache_read_input_tokens: 0,
                cache_creation_input_tokens: 0,
            },
        );
        tracker.record(
            "claude-opus",
            &Usage {
                input_tokens: 50,
                output_tokens: 10,
                cache_read_input_tokens: 5,
                cache_creation_input_tokens: 0,
            },
        );

        let usage = tracker.usage_by_model().get("claude-opus").unwrap();
        assert_eq!(usage.input_tokens, 150);
        assert_eq!(usage.output_tokens, 30);
        assert_eq!(usage.cache_read_input_tokens, 5);
    }
}
