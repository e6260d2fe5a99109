//! `SELF_HEAL` execution mode: classifies a failed run, gathers context,
//! asks the `Generator` for a fix, and — if accepted — enqueues the
//! regenerated spec as an auto-retry `HYBRID` run (spec.md §4.6).

use std::sync::Arc;

use tracing::{info, instrument, warn};

use dt_queue::{EnqueueOpts, JobKind};
use dt_selfheal::{run_self_heal, SelfHealOutcome};
use dt_types::run::StreamingMode;

use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::payload::{RunJobPayload, SelfHealJobPayload};

#[instrument(skip(ctx, payload), fields(failed_run_id = %payload.failed_run_id))]
pub async fn run(ctx: Arc<AppContext>, payload: SelfHealJobPayload) -> WorkerResult<()> {
    let failed_run = ctx.store.get_run(payload.failed_run_id).await?;
    let parent_spec = ctx.store.get_spec(failed_run.spec_id).await?;
    let run_artifacts = ctx.store.list_artifacts_by_run(failed_run.id).await?;

    let outcome = run_self_heal(
        &failed_run,
        &parent_spec,
        &run_artifacts,
        ctx.blob.as_ref(),
        ctx.generator.as_ref(),
        payload.hybrid_took_over,
    )
    .await?;

    match outcome {
        SelfHealOutcome::Regenerated { spec } => {
            let spec = ctx.store.create_spec(spec).await?;
            let new_run = dt_selfheal::auto_retry_run(&spec, StreamingMode::None);
            let new_run = ctx.store.create_run(new_run).await?;

            let job_payload = RunJobPayload {
                run_id: new_run.id,
                spec_id: spec.id,
                dapp_url: payload.dapp_url.clone(),
            };
            ctx.queue
                .enqueue(
                    JobKind::ExecuteHybrid,
                    serde_json::to_value(&job_payload)?,
                    EnqueueOpts::default(),
                )
                .await?;
            info!(new_run_id = %new_run.id, spec_id = %spec.id, "self-heal enqueued auto-retry run");
        }
        SelfHealOutcome::NotEligible => {
            info!("run not eligible for self-heal");
        }
        SelfHealOutcome::HybridTookOver => {
            info!("hybrid executor already took over, skipping self-heal");
        }
        SelfHealOutcome::GeneratorDeclined { reason } => {
            warn!(%reason, "generator declined to produce a fix");
        }
    }

    Ok(())
}
