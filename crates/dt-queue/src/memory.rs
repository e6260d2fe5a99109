//! In-memory `QueueStore`, mirroring `MemoryRunLedger`'s
//! `Mutex<HashMap<Id, State>>` shape.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use dt_types::JobId;

use crate::error::{QueueError, QueueResult};
use crate::job::{EnqueueOpts, JobKind, JobRecord, JobStatus};
use crate::store::QueueStore;

#[derive(Default)]
pub struct MemoryQueueStore {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        opts: EnqueueOpts,
    ) -> QueueResult<JobId> {
        let job = JobRecord::new(kind, payload, opts);
        let id = job.id;
        self.jobs.lock().unwrap().insert(id, job);
        Ok(id)
    }

    async fn claim(&self, kinds: &[JobKind], lock_duration_ms: u64) -> QueueResult<Option<JobRecord>> {
        let mut jobs = self.jobs.lock().unwrap();
        let now = Utc::now();

        let mut candidates: Vec<&mut JobRecord> = jobs
            .values_mut()
            .filter(|j| {
                j.status == JobStatus::Waiting
                    && kinds.contains(&j.kind)
                    && j.available_at <= now
                    && j.locked_until.map(|l| l <= now).unwrap_or(true)
            })
            .collect();
        candidates.sort_by_key(|j| j.created_at);

        if let Some(job) = candidates.into_iter().next() {
            job.status = JobStatus::Active;
            job.attempts_made += 1;
            job.locked_until = Some(now + chrono::Duration::milliseconds(lock_duration_ms as i64));
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    async fn extend_lock(&self, id: JobId, lock_duration_ms: u64) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if job.status != JobStatus::Active {
            return Err(QueueError::NotLocked(id));
        }
        job.locked_until =
            Some(Utc::now() + chrono::Duration::milliseconds(lock_duration_ms as i64));
        Ok(())
    }

    async fn complete(&self, id: JobId) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if job.status == JobStatus::Cancelled {
            return Ok(());
        }
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.locked_until = None;
        Ok(())
    }

    async fn fail(&self, id: JobId, error: String) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if job.status == JobStatus::Cancelled {
            return Ok(());
        }
        job.last_error = Some(error);
        if job.attempts_made < job.opts.attempts {
            // retried: reopen for the next claim after backoff
            let delay = job.next_retry_delay();
            job.status = JobStatus::Waiting;
            job.available_at = Utc::now() + delay;
            job.locked_until = None;
        } else {
            job.status = JobStatus::Failed;
            job.locked_until = None;
        }
        Ok(())
    }

    async fn cancel(&self, id: JobId) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        // a cancelled job never retries, regardless of current state
        job.status = JobStatus::Cancelled;
        job.locked_until = None;
        Ok(())
    }

    async fn is_cancelled(&self, id: JobId) -> QueueResult<bool> {
        let jobs = self.jobs.lock().unwrap();
        let job = jobs.get(&id).ok_or(QueueError::NotFound(id))?;
        Ok(job.status == JobStatus::Cancelled)
    }

    async fn set_progress(&self, id: JobId, progress: u8) -> QueueResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        job.progress = progress;
        Ok(())
    }

    async fn get(&self, id: JobId) -> QueueResult<JobRecord> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(QueueError::NotFound(id))
    }

    async fn reclaim_expired_locks(&self) -> QueueResult<usize> {
        let mut jobs = self.jobs.lock().unwrap();
        let now = Utc::now();
        let mut reclaimed = 0;
        for job in jobs.values_mut() {
            if job.status == JobStatus::Active
                && job.locked_until.map(|l| l <= now).unwrap_or(false)
            {
                job.status = JobStatus::Waiting;
                job.locked_until = None;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_cancel_never_runs_r3() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(JobKind::Execute, serde_json::json!({}), EnqueueOpts::default())
            .await
            .unwrap();
        store.cancel(id).await.unwrap();
        let claimed = store.claim(&[JobKind::Execute], 300_000).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn failed_job_retries_up_to_attempts() {
        let store = MemoryQueueStore::new();
        let opts = EnqueueOpts {
            attempts: 2,
            backoff_base_ms: 0,
            ..Default::default()
        };
        let id = store
            .enqueue(JobKind::Execute, serde_json::json!({}), opts)
            .await
            .unwrap();

        let claimed = store.claim(&[JobKind::Execute], 300_000).await.unwrap().unwrap();
        assert_eq!(claimed.attempts_made, 1);
        store.fail(id, "boom".into()).await.unwrap();
        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Waiting);

        let claimed2 = store.claim(&[JobKind::Execute], 300_000).await.unwrap().unwrap();
        assert_eq!(claimed2.attempts_made, 2);
        store.fail(id, "boom again".into()).await.unwrap();
        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn cancel_always_wins_even_after_active() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(JobKind::Execute, serde_json::json!({}), EnqueueOpts::default())
            .await
            .unwrap();
        store.claim(&[JobKind::Execute], 300_000).await.unwrap();
        store.cancel(id).await.unwrap();
        assert!(store.is_cancelled(id).await.unwrap());
        // a completion attempt after cancellation must not resurrect it
        store.complete(id).await.unwrap();
        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn expired_lock_is_reclaimed() {
        let store = MemoryQueueStore::new();
        let id = store
            .enqueue(JobKind::Execute, serde_json::json!({}), EnqueueOpts::default())
            .await
            .unwrap();
        store.claim(&[JobKind::Execute], 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let reclaimed = store.reclaim_expired_locks().await.unwrap();
        assert_eq!(reclaimed, 1);
        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Waiting);
    }
}
