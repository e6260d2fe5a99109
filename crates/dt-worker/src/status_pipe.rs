//! Cancellation & Status Pipe (C9): the handler polls the Record Store
//! every 5s for a `CANCELLED` run, racing the in-flight work (spec.md
//! §4.7). The first writer wins: once a run observes `CANCELLED` the
//! handler must not subsequently write any other terminal status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{info, instrument};

use dt_store::RecordStore;
use dt_types::{RunId, RunStatus};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls until either the run is observed `CANCELLED` (returns `true`) or
/// `stop` is notified because the in-flight work finished first (returns
/// `false`).
#[instrument(skip(store, stop), fields(run_id = %run_id))]
pub async fn watch_for_cancellation(
    store: Arc<dyn RecordStore>,
    run_id: RunId,
    stop: Arc<Notify>,
) -> bool {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            _ = stop.notified() => return false,
            _ = ticker.tick() => {
                match store.get_run(run_id).await {
                    Ok(run) if run.status == RunStatus::Cancelled => {
                        info!("observed cancellation");
                        return true;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "status poll failed, will retry");
                        continue;
                    }
                }
            }
        }
    }
}

/// Races `work` against the cancellation poller. Returns `Ok(Some(output))`
/// if `work` wins, `Ok(None)` if cancellation wins first.
pub async fn race_cancellation<F, T>(
    store: Arc<dyn RecordStore>,
    run_id: RunId,
    work: F,
) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    let stop = Arc::new(Notify::new());
    let watcher = watch_for_cancellation(store, run_id, stop.clone());
    tokio::pin!(work);

    tokio::select! {
        cancelled = watcher => {
            if cancelled {
                None
            } else {
                Some(work.await)
            }
        }
        output = &mut work => {
            stop.notify_one();
            Some(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_store::MemoryRecordStore;
    use dt_types::{ExecutionMode, Run, StreamingMode};

    #[tokio::test(start_paused = true)]
    async fn work_wins_when_it_finishes_first() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let mut run = Run::new(dt_types::SpecId::new(), ExecutionMode::Spec, StreamingMode::None);
        run.start().unwrap();
        let run = store.create_run(run).await.unwrap();

        let result = race_cancellation(store, run.id, async { 42 }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_when_observed_first() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let mut run = Run::new(dt_types::SpecId::new(), ExecutionMode::Spec, StreamingMode::None);
        run.start().unwrap();
        let mut run = store.create_run(run).await.unwrap();
        run.cancel().unwrap();
        store.update_run(run.clone()).await.unwrap();

        let result = race_cancellation(store, run.id, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            "never"
        })
        .await;
        assert_eq!(result, None);
    }
}
