//! `AGENT` execution mode: the entire test is driven by the Agent Loop
//! (C7), one step at a time, with no inline scripted pass. Shares the
//! Hybrid Executor's step parser and sandbox tool bridge, but skips
//! straight to the agent for every step (spec.md §4.5).

use std::sync::Arc;

use tracing::instrument;

use dt_agent::{run_step_with_short_circuit, BudgetState, CostTracker, Message, StepResult};
use dt_hybrid::{extract_test_body, parse_steps, strip_ts_annotations, SandboxToolExecutor};
use dt_sandbox::{bootstrap, BootstrapConfig, FakeBrowser, FakeBrowserConfig, Sandbox};
use dt_types::run::RunStatus;
use dt_types::{Artifact, ArtifactType};

use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::payload::RunJobPayload;
use crate::status_pipe;

#[instrument(skip(ctx, payload), fields(run_id = %payload.run_id))]
pub async fn run(ctx: Arc<AppContext>, payload: RunJobPayload) -> WorkerResult<()> {
    let spec = ctx.store.get_spec(payload.spec_id).await?;

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

    dt_sandbox::Tracing::start(sandbox.tracing()).await.ok();
    let tool_executor = SandboxToolExecutor::new(&sandbox);
    let planner = ctx.planner.clone();
    let model = ctx.config.agent_model.clone();
    let dapp_url = payload.dapp_url.clone();

    let work = async {
        let stripped = strip_ts_annotations(&spec.code);
        let body = extract_test_body(&stripped)?;
        let steps = parse_steps(body)?;

        let mut budgets = BudgetState::new(ctx.config.agent_budgets());
        let mut cost = CostTracker::new();
        let mut step_records = Vec::with_capacity(steps.len());
        let mut failure: Option<String> = None;

        for step in &steps {
            let opening = Message::user_text(format!(
                "Goal: {}\nDapp URL: {}\nStep {}: {}",
                "execute this step of the dApp test", dapp_url, step.number, step.description
            ));
            let start = std::time::Instant::now();
            let result = run_step_with_short_circuit(
                planner.as_ref(),
                &tool_executor,
                &model,
                "You are driving a browser and wallet to complete one step of a dApp test.",
                opening,
                &step.body,
                step.number,
                &mut budgets,
                &mut cost,
            )
            .await;

            let (mode, outcome) = match result {
                Ok(StepResult::Complete) => ("agent", Ok(())),
                Ok(StepResult::Failed(reason)) => ("agent", Err(reason)),
                Err(e) => ("agent", Err(e.to_string())),
            };

            step_records.push(dt_types::run::AgentStepRecord {
                step: step.number,
                mode: mode.to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
            });

            if let Err(reason) = outcome {
                failure = Some(reason);
                break;
            }
        }

        Ok::<_, dt_hybrid::HybridError>((step_records, failure, cost))
    };

    let outcome = status_pipe::race_cancellation(ctx.store.clone(), run.id, work).await;
    let frames = dt_sandbox::Tracing::stop(sandbox.tracing()).await.unwrap_or_default();
    sandbox.teardown(Some(port_pool.as_ref())).await.ok();

    let mut run = ctx.store.get_run(run.id).await?;
    match outcome {
        None => {}
        Some(Ok((step_records, failure, cost))) => {
            run.agent_data.steps = step_records;
            run.agent_data.usage_by_model = cost.into_usage_by_model();
            run.error = failure.clone();
            run.complete(if failure.is_none() { RunStatus::Passed } else { RunStatus::Failed })?;
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
        if dt_sandbox::write_archive(&frames, dt_sandbox::trace::MAX_WIDTH, dt_sandbox::trace::MAX_HEIGHT, &trace_path).is_ok() {
            if let Ok(bytes) = tokio::fs::read(&trace_path).await {
                let artifact = Artifact::new(run.id, ArtifactType::Trace, "screencast-trace.zip".to_string());
                ctx.blob.put(&artifact.storage_path, &bytes).await?;
                ctx.store.create_artifact(artifact).await?;
            }
        }
    }

    Ok(())
}
