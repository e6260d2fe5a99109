//! Clarification: a question the generator raised about a spec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClarificationId, SpecId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationStatus {
    Pending,
    Answered,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clarification {
    pub id: ClarificationId,
    pub spec_id: SpecId,
    pub question: String,
    pub status: ClarificationStatus,
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Clarification {
    pub fn new(spec_id: SpecId, question: String) -> Self {
        Self {
            id: ClarificationId::new(),
            spec_id,
            question,
            status: ClarificationStatus::Pending,
            answer: None,
            created_at: Utc::now(),
        }
    }

    pub fn answer(&mut self, answer: String) {
        self.answer = Some(answer);
        self.status = ClarificationStatus::Answered;
    }

    pub fn skip(&mut self) {
        self.status = ClarificationStatus::Skipped;
    }
}

/// Whether every clarification for a spec has been resolved (not `PENDING`),
/// i.e. the spec may advance to `READY`.
pub fn all_resolved(clarifications: &[Clarification]) -> bool {
    clarifications
        .iter()
        .all(|c| c.status != ClarificationStatus::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_ready_once_no_pending_clarifications() {
        let spec_id = SpecId::new();
        let mut c1 = Clarification::new(spec_id, "q1".into());
        let mut c2 = Clarification::new(spec_id, "q2".into());
        assert!(!all_resolved(&[c1.clone(), c2.clone()]));
        c1.answer("a1".into());
        c2.skip();
        assert!(all_resolved(&[c1, c2]));
    }
}
