//! `SUITE` execution mode: runs an ordered multiset of specs against a
//! single shared sandbox bootstrap (spec.md §3 SuiteRun, §8 scenario 6).
//! Each child `Run` is driven the same way a standalone `HYBRID` run would
//! be, except the sandbox is bootstrapped once for the whole suite and torn
//! down once at the end, so a failing test doesn't stop the remaining
//! children from being attempted in submission order.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use dt_hybrid::{run_hybrid_test, HybridConfig};
use dt_sandbox::{bootstrap, BootstrapConfig, FakeBrowser, FakeBrowserConfig, Sandbox};
use dt_types::run::RunStatus;
use dt_types::{Artifact, ArtifactType, SuiteRun};

use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::payload::{RunJobPayload, SuiteJobPayload};
use crate::status_pipe;

#[instrument(skip(ctx, payload), fields(suite_run_id = %payload.suite_run_id))]
pub async fn run(ctx: Arc<AppContext>, payload: SuiteJobPayload) -> WorkerResult<()> {
    let mut suite = SuiteRun::new(payload.runs.iter().map(|r| r.run_id).collect());
    suite.id = payload.suite_run_id;
    let mut suite = ctx.store.create_suite_run(suite).await?;

    let port_pool = ctx.port_pool.clone();
    let port_assignment = port_pool.allocate(payload.suite_run_id.to_string()).ok();

    let breaker = ctx.breaker.clone();
    let bootstrap_config = BootstrapConfig::default();
    let sandbox = bootstrap(breaker.as_ref(), &bootstrap_config, || {}, || async {
        Ok::<FakeBrowser, String>(FakeBrowser::new(FakeBrowserConfig::default()))
    })
    .await;

    let sandbox = match sandbox {
        Ok(driver) => Sandbox::new(driver, port_assignment),
        Err(e) => {
            for run_payload in &payload.runs {
                fail_run_bootstrap(&ctx, run_payload.run_id, &e.to_string()).await?;
            }
            suite.status = RunStatus::Failed;
            suite.failed_tests = suite.run_ids.len() as u32;
            suite.completed_at = Some(chrono::Utc::now());
            ctx.store.update_suite_run(suite).await?;
            return Ok(());
        }
    };
    info!("suite sandbox bootstrapped once for all child runs");

    let mut completed = 0usize;
    let mut last_run_id = None;

    for run_payload in &payload.runs {
        completed += 1;
        last_run_id = Some(run_payload.run_id);

        let passed = run_one_child(&ctx, &sandbox, run_payload).await;
        suite.record_child_result(passed, completed);
        suite = ctx.store.update_suite_run(suite).await?;
    }

    let frames = sandbox.teardown(Some(port_pool.as_ref())).await.ok().unwrap_or_default();
    if let (false, Some(run_id)) = (frames.is_empty(), last_run_id) {
        persist_trace(&ctx, run_id, &frames).await;
    }

    info!(
        passed = suite.passed_tests,
        failed = suite.failed_tests,
        "suite run complete"
    );
    Ok(())
}

/// Runs one child spec against the shared sandbox; returns whether it
/// passed. Failures here never abort the suite loop — each child still gets
/// its own terminal status, matching the independent-Run semantics of §3.
async fn run_one_child<B>(
    ctx: &Arc<AppContext>,
    sandbox: &Sandbox<B>,
    run_payload: &RunJobPayload,
) -> bool
where
    B: dt_sandbox::Page + dt_sandbox::Wallet + dt_sandbox::Context + dt_sandbox::Tracing + Send + Sync + 'static,
{
    let spec = match ctx.store.get_spec(run_payload.spec_id).await {
        Ok(spec) => spec,
        Err(e) => {
            warn!(error = %e, spec_id = %run_payload.spec_id, "suite child spec lookup failed");
            let _ = fail_run_bootstrap(ctx, run_payload.run_id, &e.to_string()).await;
            return false;
        }
    };

    let mut run = match ctx.store.get_run(run_payload.run_id).await {
        Ok(run) => run,
        Err(_) => return false,
    };
    if run.start().is_err() {
        return false;
    }
    let _ = ctx.store.update_run(run.clone()).await;

    let hybrid_config = HybridConfig {
        model: ctx.config.agent_model.clone(),
        dapp_url: run_payload.dapp_url.clone(),
    };
    let planner = ctx.planner.clone();
    let code = spec.code.clone();

    let outcome = status_pipe::race_cancellation(ctx.store.clone(), run.id, async {
        run_hybrid_test(sandbox, &code, planner.as_ref(), &hybrid_config).await
    })
    .await;

    let mut run = match ctx.store.get_run(run.id).await {
        Ok(run) => run,
        Err(_) => return false,
    };

    let passed = match outcome {
        None => false, // cancelled; status already CANCELLED, don't overwrite
        Some(Ok(result)) => {
            run.agent_data.steps = result.step_records;
            run.error = result.error.clone();
            let passed = result.passed;
            if run.complete(if passed { RunStatus::Passed } else { RunStatus::Failed }).is_ok() {
                let _ = ctx.store.update_run(run).await;
            }
            passed
        }
        Some(Err(e)) => {
            run.error = Some(e.to_string());
            if run.complete(RunStatus::Failed).is_ok() {
                let _ = ctx.store.update_run(run).await;
            }
            false
        }
    };

    passed
}

async fn fail_run_bootstrap(ctx: &Arc<AppContext>, run_id: dt_types::RunId, reason: &str) -> WorkerResult<()> {
    let mut run = ctx.store.get_run(run_id).await?;
    if run.status == RunStatus::Pending {
        run.start().ok();
    }
    run.error = Some(reason.to_string());
    run.complete(RunStatus::Failed).ok();
    ctx.store.update_run(run).await?;
    Ok(())
}

async fn persist_trace(ctx: &Arc<AppContext>, run_id: dt_types::RunId, frames: &[dt_sandbox::traits::Frame]) {
    let artifacts_dir = ctx.config.artifacts_base_path.join(run_id.to_string());
    if tokio::fs::create_dir_all(&artifacts_dir).await.is_err() {
        return;
    }
    let trace_path = artifacts_dir.join("screencast-trace.zip");
    if dt_sandbox::write_archive(frames, dt_sandbox::trace::MAX_WIDTH, dt_sandbox::trace::MAX_HEIGHT, &trace_path).is_err() {
        return;
    }
    if let Ok(bytes) = tokio::fs::read(&trace_path).await {
        let artifact = Artifact::new(run_id, ArtifactType::Trace, "screencast-trace.zip".to_string());
        if ctx.blob.put(&artifact.storage_path, &bytes).await.is_ok() {
            let _ = ctx.store.create_artifact(artifact).await;
        }
    }
}
