//! `HYBRID` execution mode: bootstraps a sandbox, runs the hybrid executor
//! (C6) over the spec's code, applies any resulting patches to the spec,
//! and archives the trace.

use std::sync::Arc;

use tracing::instrument;

use dt_hybrid::{extract_test_body, parse_steps, run_hybrid_test, HybridConfig};
use dt_sandbox::{bootstrap, BootstrapConfig, FakeBrowser, FakeBrowserConfig, Sandbox};
use dt_types::run::RunStatus;
use dt_types::{Artifact, ArtifactType, Spec};

use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::payload::RunJobPayload;
use crate::status_pipe;

/// Whether `spec` runs behind a connection prelude, and if so how many steps
/// that prelude occupies in the composite program the hybrid executor sees.
/// Mirrors `spec_mode::resolve_prelude` so patch step numbers line up with
/// the flow-relative numbering the executor assigns during a connected run.
async fn resolve_flow_prefix(ctx: &AppContext, spec: &Spec) -> WorkerResult<(bool, u32)> {
    let project = ctx.store.get_project(spec.project_id).await?;
    match project.connection_spec_id {
        Some(connection_spec_id) if connection_spec_id != spec.id => {
            match ctx.store.get_spec(connection_spec_id).await {
                Ok(prelude_spec) => {
                    let count = extract_test_body(&prelude_spec.code)
                        .ok()
                        .and_then(|body| parse_steps(body).ok())
                        .map(|steps| steps.len() as u32)
                        .unwrap_or(0);
                    Ok((true, count))
                }
                Err(_) => Ok((false, 0)),
            }
        }
        _ => Ok((false, 0)),
    }
}

#[instrument(skip(ctx, payload), fields(run_id = %payload.run_id))]
pub async fn run(ctx: Arc<AppContext>, payload: RunJobPayload) -> WorkerResult<()> {
    let mut spec = ctx.store.get_spec(payload.spec_id).await?;

    let mut run = ctx.store.get_run(payload.run_id).await?;
    run.start()?;
    ctx.store.update_run(run.clone()).await?;

    let port_pool = ctx.port_pool.clone();
    let port_assignment = port_pool.allocate(run.id.to_string()).ok();

    let breaker = ctx.breaker.clone();
    let bootstrap_config = BootstrapConfig::default();
    let sandbox = bootstrap(breaker.as_ref(), &bootstrap_config, || {}, || async {
        Ok::<FakeBrowser, String>(FakeBrowser::new(FakeBrowserConfig::default()))
    })
    .await;

    let sandbox = match sandbox {
        Ok(driver) => Sandbox::new(driver, port_assignment),
        Err(e) => {
            let mut run = ctx.store.get_run(run.id).await?;
            run.error = Some(e.to_string());
            run.complete(RunStatus::Failed)?;
            ctx.store.update_run(run).await?;
            return Ok(());
        }
    };

    let hybrid_config = HybridConfig { model: ctx.config.agent_model.clone(), dapp_url: payload.dapp_url.clone() };
    let planner = ctx.planner.clone();
    let code = spec.code.clone();

    let outcome = status_pipe::race_cancellation(ctx.store.clone(), run.id, async {
        run_hybrid_test(&sandbox, &code, planner.as_ref(), &hybrid_config).await
    })
    .await;

    let frames = sandbox.teardown(Some(port_pool.as_ref())).await.ok().unwrap_or_default();

    let mut run = ctx.store.get_run(run.id).await?;
    match outcome {
        None => {}
        Some(Ok(outcome)) => {
            run.agent_data.steps = outcome.step_records;
            run.error = outcome.error.clone();

            if !outcome.patches.is_empty() {
                let (is_flow, connection_step_count) = resolve_flow_prefix(&ctx, &spec).await?;
                if let Ok(patched_code) =
                    dt_hybrid::apply_patches(&spec.code, &outcome.patches, connection_step_count, is_flow)
                {
                    spec.apply_patch(patched_code)?;
                    ctx.store.update_spec(spec.clone()).await?;
                }
            }

            run.complete(if outcome.passed { RunStatus::Passed } else { RunStatus::Failed })?;
        }
        Some(Err(e)) => {
            run.error = Some(e.to_string());
            run.complete(RunStatus::Failed)?;
        }
    }
    ctx.store.update_run(run.clone()).await?;

    if !frames.is_empty() {
        let artifacts_dir = ctx.config.artifacts_base_path.join(run.id.to_string());
        tokio::fs::create_dir_all(&artifacts_dir).await.ok();
        let trace_path = artifacts_dir.join("screencast-trace.zip");
        let width = dt_sandbox::trace::MAX_WIDTH;
        let height = dt_sandbox::trace::MAX_HEIGHT;
        if dt_sandbox::write_archive(&frames, width, height, &trace_path).is_ok() {
            if let Ok(bytes) = tokio::fs::read(&trace_path).await {
                let artifact = Artifact::new(run.id, ArtifactType::Trace, "screencast-trace.zip".to_string());
                ctx.blob.put(&artifact.storage_path, &bytes).await?;
                ctx.store.create_artifact(artifact).await?;
            }
        }
    }

    Ok(())
}
