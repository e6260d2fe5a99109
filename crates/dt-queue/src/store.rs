//! `QueueStore`: the persistence seam for enqueue/claim/ack/cancel, backed
//! by `MemoryQueueStore` (tests) or `SurrealQueueStore` (production),
//! following the teacher's storage-trait / fake split.

use async_trait::async_trait;

use dt_types::JobId;

use crate::error::QueueResult;
use crate::job::{EnqueueOpts, JobKind, JobRecord};

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn enqueue(&self, kind: JobKind, payload: serde_json::Value, opts: EnqueueOpts) -> QueueResult<JobId>;

    /// Atomically claim the oldest available job of one of `kinds`, locking
    /// it for `lock_duration_ms`. Returns `None` if nothing is available.
    async fn claim(&self, kinds: &[JobKind], lock_duration_ms: u64) -> QueueResult<Option<JobRecord>>;

    async fn extend_lock(&self, id: JobId, lock_duration_ms: u64) -> QueueResult<()>;

    /// Commit progress = 100 atomically with the final status write.
    async fn complete(&self, id: JobId) -> QueueResult<()>;

    /// A handler that threw: retried per `attempts`, else marked failed.
    async fn fail(&self, id: JobId, error: String) -> QueueResult<()>;

    /// Marks a job cancelled. Never retries.
    async fn cancel(&self, id: JobId) -> QueueResult<()>;

    async fn is_cancelled(&self, id: JobId) -> QueueResult<bool>;

    async fn set_progress(&self, id: JobId, progress: u8) -> QueueResult<()>;

    async fn get(&self, id: JobId) -> QueueResult<JobRecord>;

    /// Re-queue jobs whose lock has expired without being acked.
    async fn reclaim_expired_locks(&self) -> QueueResult<usize>;
}
