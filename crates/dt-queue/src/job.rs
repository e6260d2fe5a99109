//! Job vocabulary: kinds, options, status, and the stored job record.
//!
//! Mirrors the `other_examples` oddjobs crate's tag-only status/outcome
//! split (`StepStatus` / `StepOutcome`) generalized from "workflow step" to
//! "queued run dispatch".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dt_types::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Execute,
    ExecuteHybrid,
    ExecuteAgent,
    ExecuteSuite,
    SelfHeal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// Options accepted by `enqueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueOpts {
    pub attempts: u32,
    /// Exponential backoff base, in milliseconds.
    pub backoff_base_ms: u64,
    pub remove_on_complete: u32,
    pub remove_on_fail: u32,
    pub delay_ms: Option<u64>,
}

impl Default for EnqueueOpts {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base_ms: 1_000,
            remove_on_complete: 100,
            remove_on_fail: 100,
            delay_ms: None,
        }
    }
}

/// A persisted job. `locked_until` implements the visibility timeout: a
/// claimed job is invisible to other claimants until this instant, after
/// which — if never acked — it is eligible for reclaim (the lock "expired").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub opts: EnqueueOpts,
    pub status: JobStatus,
    pub attempts_made: u32,
    pub last_error: Option<String>,
    pub available_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(kind: JobKind, payload: serde_json::Value, opts: EnqueueOpts) -> Self {
        let now = Utc::now();
        let available_at = match opts.delay_ms {
            Some(ms) => now + chrono::Duration::milliseconds(ms as i64),
            None => now,
        };
        Self {
            id: JobId::new(),
            kind,
            payload,
            opts,
            status: JobStatus::Waiting,
            attempts_made: 0,
            last_error: None,
            available_at,
            locked_until: None,
            progress: 0,
            created_at: now,
        }
    }

    /// Exponential backoff delay for the next retry: `base * 2^(attempt-1)`,
    /// matching the teacher's `execute_with_controls` retry idiom.
    pub fn next_retry_delay(&self) -> chrono::Duration {
        let exp = self.attempts_made.saturating_sub(1);
        let ms = self.opts.backoff_base_ms.saturating_mul(1u64 << exp.min(16));
        chrono::Duration::milliseconds(ms as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let mut job = JobRecord::new(JobKind::Execute, serde_json::json!({}), EnqueueOpts::default());
        job.attempts_made = 1;
        let d1 = job.next_retry_delay();
        job.attempts_made = 2;
        let d2 = job.next_retry_delay();
        job.attempts_made = 3;
        let d3 = job.next_retry_delay();
        assert!(d2 > d1);
        assert!(d3 > d2);
    }

    #[test]
    fn delayed_job_is_not_immediately_available() {
        let opts = EnqueueOpts {
            delay_ms: Some(60_000),
            ..Default::default()
        };
        let job = JobRecord::new(JobKind::Execute, serde_json::json!({}), opts);
        assert!(job.available_at > Utc::now());
    }
}
