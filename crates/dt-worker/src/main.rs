//! `dt-worker`: claims jobs off the durable queue (C3) and dispatches each
//! by `JobKind` to the matching execution-mode module (spec.md §2 "Control
//! flow"). Generalizes the teacher's `aivcsd` daemon entrypoint.

use std::sync::Arc;

use tracing::{error, warn, Level};

use dt_queue::{consume, EnqueueOpts, JobKind, JobRecord};
use dt_worker::{init_tracing, AppContext, WorkerConfig};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

async fn run() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    init_tracing(config.json_logs, Level::INFO);
    tracing::info!(concurrency = config.concurrency, "dt-worker starting");

    let ctx = Arc::new(AppContext::new(config.clone()).await?);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown_tx_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx_signal.send(true);
    });

    let kinds = vec![
        JobKind::Execute,
        JobKind::ExecuteHybrid,
        JobKind::ExecuteAgent,
        JobKind::ExecuteSuite,
        JobKind::SelfHeal,
    ];

    consume(
        ctx.queue.clone(),
        kinds,
        config.consume_config(),
        move |job, _handle| dispatch(ctx.clone(), job),
        shutdown_rx,
    )
    .await;

    tracing::info!("dt-worker stopped");
    Ok(())
}

/// Routes a claimed job to its execution mode. Any error here drives the
/// queue's own retry/backoff (spec.md §4.1); only the terminal status write
/// inside each mode module persists a `FAILED` run (spec.md §7 propagation
/// policy — only the outer handler converts failures into a persisted
/// status, and that happens one layer down, inside each `*_mode::run`).
async fn dispatch(ctx: Arc<AppContext>, job: JobRecord) -> Result<(), String> {
    let result = match job.kind {
        JobKind::Execute => {
            let payload = parse_payload(&job)?;
            dt_worker::spec_mode::run(ctx, payload).await
        }
        JobKind::ExecuteHybrid => {
            let payload = parse_payload(&job)?;
            dt_worker::hybrid_mode::run(ctx, payload).await
        }
        JobKind::ExecuteAgent => {
            let payload = parse_payload(&job)?;
            dt_worker::agent_mode::run(ctx, payload).await
        }
        JobKind::ExecuteSuite => {
            let payload = parse_payload(&job)?;
            dt_worker::suite_mode::run(ctx, payload).await
        }
        JobKind::SelfHeal => {
            let payload = parse_payload(&job)?;
            dt_worker::self_heal_mode::run(ctx, payload).await
        }
    };

    result.map_err(|e| {
        error!(job_id = %job.id, kind = ?job.kind, error = %e, "job handler returned an error");
        e.to_string()
    })
}

fn parse_payload<T: serde::de::DeserializeOwned>(job: &JobRecord) -> Result<T, String> {
    serde_json::from_value(job.payload.clone()).map_err(|e| {
        warn!(job_id = %job.id, error = %e, "malformed job payload");
        format!("malformed job payload: {e}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payload_rejects_malformed_json() {
        let job = JobRecord::new(
            JobKind::Execute,
            serde_json::json!({"not": "a run payload"}),
            EnqueueOpts::default(),
        );
        let result: Result<dt_worker::payload::RunJobPayload, String> = parse_payload(&job);
        assert!(result.is_err());
    }
}
