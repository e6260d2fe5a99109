//! SurrealDB-backed `QueueStore`, following the record store's connect +
//! schema-DDL-then-CRUD idiom (`dt_store::surreal::SurrealStore`).

use async_trait::async_trait;
use chrono::Utc;
use surrealdb::engine::local::{Db, Mem};
use surrealdb::Surreal;
use tracing::instrument;

use dt_types::JobId;

use crate::error::{QueueError, QueueResult};
use crate::job::{EnqueueOpts, JobKind, JobRecord, JobStatus};
use crate::store::QueueStore;

pub struct SurrealQueueStore {
    db: Surreal<Db>,
}

impl SurrealQueueStore {
    #[instrument(skip_all)]
    pub async fn connect_in_memory() -> QueueResult<Self> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns("dt").use_db("queue").await?;
        db.query("DEFINE TABLE jobs SCHEMALESS; DEFINE INDEX idx_jobs_id ON jobs FIELDS id UNIQUE;")
            .await?;
        Ok(Self { db })
    }
}

#[async_trait]
impl QueueStore for SurrealQueueStore {
    async fn enqueue(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        opts: EnqueueOpts,
    ) -> QueueResult<JobId> {
        let job = JobRecord::new(kind, payload, opts);
        let id = job.id;
        let _: Option<JobRecord> = self.db.create(("jobs", id.to_string())).content(job).await?;
        Ok(id)
    }

    async fn claim(&self, kinds: &[JobKind], lock_duration_ms: u64) -> QueueResult<Option<JobRecord>> {
        // SurrealDB has no built-in SELECT-FOR-UPDATE here; claim races are
        // acceptable in the single-worker-per-process deployment this
        // adapter targets (spec §5: a run is never executed by more than
        // one worker simultaneously, enforced by the job lock we write back
        // immediately after selecting).
        let kind_strs: Vec<String> = kinds.iter().map(|k| format!("{:?}", k)).collect();
        let mut result = self
            .db
            .query(
                "SELECT * FROM jobs WHERE status = 'waiting' AND available_at <= time::now() ORDER BY created_at LIMIT 50",
            )
            .await?;
        let candidates: Vec<JobRecord> = result.take(0)?;
        let Some(mut job) = candidates
            .into_iter()
            .find(|j| kind_strs.contains(&format!("{:?}", j.kind)))
        else {
            return Ok(None);
        };
        job.status = JobStatus::Active;
        job.attempts_made += 1;
        job.locked_until = Some(Utc::now() + chrono::Duration::milliseconds(lock_duration_ms as i64));
        let _: Option<JobRecord> = self
            .db
            .update(("jobs", job.id.to_string()))
            .content(job.clone())
            .await?;
        Ok(Some(job))
    }

    async fn extend_lock(&self, id: JobId, lock_duration_ms: u64) -> QueueResult<()> {
        let mut job = self.get(id).await?;
        job.locked_until = Some(Utc::now() + chrono::Duration::milliseconds(lock_duration_ms as i64));
        let _: Option<JobRecord> = self.db.update(("jobs", id.to_string())).content(job).await?;
        Ok(())
    }

    async fn complete(&self, id: JobId) -> QueueResult<()> {
        let mut job = self.get(id).await?;
        if job.status == JobStatus::Cancelled {
            return Ok(());
        }
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.locked_until = None;
        let _: Option<JobRecord> = self.db.update(("jobs", id.to_string())).content(job).await?;
        Ok(())
    }

    async fn fail(&self, id: JobId, error: String) -> QueueResult<()> {
        let mut job = self.get(id).await?;
        if job.status == JobStatus::Cancelled {
            return Ok(());
        }
        job.last_error = Some(error);
        if job.attempts_made < job.opts.attempts {
            let delay = job.next_retry_delay();
            job.status = JobStatus::Waiting;
            job.available_at = Utc::now() + delay;
            job.locked_until = None;
        } else {
            job.status = JobStatus::Failed;
            job.locked_until = None;
        }
        let _: Option<JobRecord> = self.db.update(("jobs", id.to_string())).content(job).await?;
        Ok(())
    }

    async fn cancel(&self, id: JobId) -> QueueResult<()> {
        let mut job = self.get(id).await?;
        job.status = JobStatus::Cancelled;
        job.locked_until = None;
        let _: Option<JobRecord> = self.db.update(("jobs", id.to_string())).content(job).await?;
        Ok(())
    }

    async fn is_cancelled(&self, id: JobId) -> QueueResult<bool> {
        Ok(self.get(id).await?.status == JobStatus::Cancelled)
    }

    async fn set_progress(&self, id: JobId, progress: u8) -> QueueResult<()> {
        let mut job = self.get(id).await?;
        job.progress = progress;
        let _: Option<JobRecord> = self.db.update(("jobs", id.to_string())).content(job).await?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> QueueResult<JobRecord> {
        let found: Option<JobRecord> = self.db.select(("jobs", id.to_string())).await?;
        found.ok_or(QueueError::NotFound(id))
    }

    async fn reclaim_expired_locks(&self) -> QueueResult<usize> {
        let mut result = self
            .db
            .query("SELECT * FROM jobs WHERE status = 'active' AND locked_until <= time::now()")
            .await?;
        let expired: Vec<JobRecord> = result.take(0)?;
        let count = expired.len();
        for mut job in expired {
            job.status = JobStatus::Waiting;
            job.locked_until = None;
            let _: Option<JobRecord> = self
                .db
                .update(("jobs", job.id.to_string()))
                .content(job)
                .await?;
        }
        Ok(count)
    }
}
