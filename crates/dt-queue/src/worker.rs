//! Worker loop: `consume(kind*, handler)` with concurrency, lock renewal,
//! a 5/min claim rate limit, and cooperative cancellation (spec §4.1, §4.7).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

use crate::job::{JobKind, JobRecord};
use crate::store::QueueStore;

#[derive(Debug, Clone)]
pub struct ConsumeConfig {
    pub concurrency: usize,
    pub lock_duration_ms: u64,
    pub lock_renew_ms: u64,
    pub rate_limit_per_min: u32,
}

impl Default for ConsumeConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            lock_duration_ms: 300_000,
            lock_renew_ms: 60_000,
            rate_limit_per_min: 5,
        }
    }
}

/// Mutable progress channel handed to the handler; progress values must be
/// strictly increasing up to 100 (P2).
#[derive(Clone)]
pub struct Progress {
    store: Arc<dyn QueueStore>,
    job_id: dt_types::JobId,
}

impl Progress {
    pub async fn report(&self, value: u8) -> crate::error::QueueResult<()> {
        self.store.set_progress(self.job_id, value).await
    }
}

/// Handed to a handler alongside its job, exposing the cooperative
/// cancellation poll (C9).
#[derive(Clone)]
pub struct JobHandle {
    store: Arc<dyn QueueStore>,
    job_id: dt_types::JobId,
}

impl JobHandle {
    pub fn progress(&self) -> Progress {
        Progress {
            store: self.store.clone(),
            job_id: self.job_id,
        }
    }

    pub async fn cancelled(&self) -> bool {
        self.store.is_cancelled(self.job_id).await.unwrap_or(false)
    }
}

/// Run the consume loop until cancelled via `shutdown`. Claims at most
/// `rate_limit_per_min` jobs per minute, executes up to `concurrency`
/// handlers concurrently, renews each claimed job's lock every
/// `lock_renew_ms`, and commits the final status (complete/fail) once the
/// handler resolves.
#[instrument(skip(store, handler, shutdown), fields(kinds = ?kinds))]
pub async fn consume<F, Fut>(
    store: Arc<dyn QueueStore>,
    kinds: Vec<JobKind>,
    config: ConsumeConfig,
    handler: F,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) where
    F: Fn(JobRecord, JobHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    let handler = Arc::new(handler);
    let permits = Arc::new(Semaphore::new(config.concurrency));
    let rate_interval = Duration::from_secs(60) / config.rate_limit_per_min.max(1);
    let mut ticker = interval(rate_interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("consume loop shutting down");
                    break;
                }
            }
            _ = ticker.tick() => {
                let Ok(permit) = permits.clone().try_acquire_owned() else {
                    continue;
                };
                let claimed = match store.claim(&kinds, config.lock_duration_ms).await {
                    Ok(Some(job)) => job,
                    Ok(None) => {
                        drop(permit);
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "claim failed");
                        drop(permit);
                        continue;
                    }
                };

                let store = store.clone();
                let handler = handler.clone();
                let lock_duration_ms = config.lock_duration_ms;
                let lock_renew_ms = config.lock_renew_ms;

                tokio::spawn(async move {
                    let _permit = permit;
                    run_one(store, claimed, handler, lock_duration_ms, lock_renew_ms).await;
                });
            }
        }
    }
}

async fn run_one<F, Fut>(
    store: Arc<dyn QueueStore>,
    job: JobRecord,
    handler: Arc<F>,
    lock_duration_ms: u64,
    lock_renew_ms: u64,
) where
    F: Fn(JobRecord, JobHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    let job_id = job.id;
    let handle = JobHandle {
        store: store.clone(),
        job_id,
    };

    let renew_store = store.clone();
    let renew = tokio::spawn(async move {
        let mut tick = interval(Duration::from_millis(lock_renew_ms));
        loop {
            tick.tick().await;
            if renew_store.extend_lock(job_id, lock_duration_ms).await.is_err() {
                break;
            }
        }
    });

    debug!(job_id = %job_id, "dispatching job");
    let result = handler(job, handle).await;
    renew.abort();

    match result {
        Ok(()) => {
            if let Err(e) = store.complete(job_id).await {
                error!(job_id = %job_id, error = %e, "failed to commit completion");
            }
        }
        Err(msg) => {
            if let Err(e) = store.fail(job_id, msg).await {
                error!(job_id = %job_id, error = %e, "failed to commit failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::EnqueueOpts;
    use crate::memory::MemoryQueueStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn consume_dispatches_and_commits_completion() {
        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        let id = store
            .enqueue(JobKind::Execute, serde_json::json!({}), EnqueueOpts::default())
            .await
            .unwrap();

        let (tx, rx) = tokio::sync::watch::channel(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let store_clone = store.clone();
        let task = tokio::spawn(async move {
            consume(
                store_clone,
                vec![JobKind::Execute],
                ConsumeConfig {
                    concurrency: 1,
                    lock_duration_ms: 1_000,
                    lock_renew_ms: 500,
                    rate_limit_per_min: 600,
                },
                move |_job, handle| {
                    let calls = calls_clone.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = handle.progress().report(100).await;
                        Ok(())
                    }
                },
                rx,
            )
            .await;
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(1), task).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, crate::job::JobStatus::Completed);
        assert_eq!(job.progress, 100);
    }
}
