//! `SPEC` execution mode: runs a spec's code as a supervised child process
//! via the Spec Runner (C5), persisting artifacts and the final status.

use std::sync::Arc;

use tracing::instrument;

use dt_runner::{RunInputs, TestType};
use dt_types::run::RunStatus;
use dt_types::Spec;

use crate::context::AppContext;
use crate::error::{WorkerError, WorkerResult};
use crate::payload::RunJobPayload;
use crate::status_pipe;

/// Resolves the connection prelude for a flow-type spec: the project's
/// `connectionSpecId`, if set and still present in the store.
async fn resolve_prelude(ctx: &AppContext, spec: &Spec) -> WorkerResult<(TestType, Option<String>)> {
    let project = ctx.store.get_project(spec.project_id).await?;
    match project.connection_spec_id {
        Some(connection_spec_id) if connection_spec_id != spec.id => {
            match ctx.store.get_spec(connection_spec_id).await {
                Ok(prelude_spec) => Ok((TestType::Flow, Some(prelude_spec.code))),
                Err(_) => Ok((TestType::Flow, None)),
            }
        }
        _ => Ok((TestType::Connection, None)),
    }
}

#[instrument(skip(ctx, payload), fields(run_id = %payload.run_id))]
pub async fn run(ctx: Arc<AppContext>, payload: RunJobPayload) -> WorkerResult<()> {
    let spec = ctx.store.get_spec(payload.spec_id).await?;
    if !spec.is_eligible_to_run() {
        return Err(WorkerError::InvalidPayload(format!(
            "spec {} is not eligible to run (status is draft)",
            spec.id
        )));
    }

    let mut run = ctx.store.get_run(payload.run_id).await?;
    run.start()?;
    ctx.store.update_run(run.clone()).await?;

    let (test_type, prelude) = resolve_prelude(&ctx, &spec).await?;
    let project = ctx.store.get_project(spec.project_id).await?;
    let wallet_seed = ctx.store.get_wallet_seed(project.id).await?;
    let artifacts_dir = ctx.config.artifacts_base_path.join(run.id.to_string());

    let inputs = RunInputs {
        run_id: run.id,
        test_type,
        program: spec.code.clone(),
        prelude,
        wallet_seed,
        artifacts_dir,
        headless: ctx.config.headless,
        timeout_ms: ctx.config.default_timeout_ms,
        command: vec!["node".to_string(), "run-test.js".to_string()],
    };

    let outcome = status_pipe::race_cancellation(ctx.store.clone(), run.id, dt_runner::execute(&inputs)).await;

    let mut run = ctx.store.get_run(run.id).await?;
    match outcome {
        None => {
            // cancellation already won the race; the run is CANCELLED.
        }
        Some(Ok(outcome)) => {
            for artifact in &outcome.artifacts {
                let local_path = inputs_artifact_path(&ctx, &run.id, artifact);
                if let Ok(bytes) = tokio::fs::read(&local_path).await {
                    ctx.blob.put(&artifact.storage_path, &bytes).await?;
                    ctx.store.create_artifact(artifact.clone()).await?;
                }
            }
            run.logs = outcome.logs;
            run.error = outcome.error;
            run.complete(if outcome.passed { RunStatus::Passed } else { RunStatus::Failed })?;
            ctx.store.update_run(run.clone()).await?;

            if outcome.passed && matches!(test_type, TestType::Connection) {
                let mut project = ctx.store.get_project(spec.project_id).await?;
                project.set_connection_spec_once(spec.id);
                ctx.store.update_project(project).await?;
            }
        }
        Some(Err(e)) => {
            run.error = Some(e.to_string());
            run.complete(RunStatus::Failed)?;
            ctx.store.update_run(run.clone()).await?;
        }
    }

    Ok(())
}

fn inputs_artifact_path(ctx: &AppContext, run_id: &dt_types::RunId, artifact: &dt_types::Artifact) -> std::path::PathBuf {
    ctx.config.artifacts_base_path.join(run_id.to_string()).join(&artifact.name)
}
