//! Bounded self-heal decision (spec.md §4.6), generalized from the
//! teacher's `ci_repair::plan_repair` (`RepairOutcome` → `SelfHealOutcome`)
//! and `self_healing::execute_recovery_loop`'s "classify, decide, act" shape.

use tracing::instrument;

use dt_store::BlobStore;
use dt_types::run::RunStatus;
use dt_types::{Artifact, Run, Spec};

use crate::classify::classify_failure;
use crate::error::SelfHealResult;
use crate::gather::gather_failure_context;
use crate::generator::{FailureAnalysis, Generator, GeneratorOutput};

#[derive(Debug, Clone)]
pub enum SelfHealOutcome {
    /// A new spec generation was produced and is ready to enqueue as an
    /// auto-retry run.
    Regenerated { spec: Spec },
    /// The run didn't fail, or the spec has exhausted `maxAttempts`.
    NotEligible,
    /// The Hybrid Executor already took over this run; self-heal is
    /// mutually exclusive with that fallback (spec.md §4.6).
    HybridTookOver,
    /// The `Generator` declined to produce a fix.
    GeneratorDeclined { reason: String },
}

/// Runs only for terminal `FAILED` runs whose spec is eligible
/// (spec.md §4.6). `hybrid_took_over` reflects whether the Hybrid Executor
/// already attempted an agent-driven fallback for this run.
#[instrument(skip_all, fields(run_id = %run.id, spec_id = %parent_spec.id))]
pub async fn run_self_heal(
    run: &Run,
    parent_spec: &Spec,
    run_artifacts: &[Artifact],
    blob: &dyn BlobStore,
    generator: &dyn Generator,
    hybrid_took_over: bool,
) -> SelfHealResult<SelfHealOutcome> {
    if run.status != RunStatus::Failed {
        return Ok(SelfHealOutcome::NotEligible);
    }
    if hybrid_took_over {
        return Ok(SelfHealOutcome::HybridTookOver);
    }
    if !parent_spec.is_eligible_for_self_heal() {
        return Ok(SelfHealOutcome::NotEligible);
    }

    let gathered = gather_failure_context(run, parent_spec, run_artifacts, blob).await?;
    let class = classify_failure(&gathered.error, &run.logs);
    let analysis = FailureAnalysis { class, error: gathered.error.clone() };
    let context = gathered.into_failure_context();

    let GeneratorOutput { code, reason } = generator.regenerate(&analysis, &context).await?;

    match code {
        Some(new_code) => {
            let spec = Spec::regenerate(parent_spec, new_code, context)?;
            Ok(SelfHealOutcome::Regenerated { spec })
        }
        None => Ok(SelfHealOutcome::GeneratorDeclined {
            reason: reason.unwrap_or_else(|| "generator declined without a reason".to_string()),
        }),
    }
}

/// Builds the auto-retry run for a self-heal regeneration (spec.md §4.6
/// "enqueues a new Run flagged `isAutoRetry`"). Enqueuing itself is the
/// queue's responsibility (C3, owned by `dt-worker`).
pub fn auto_retry_run(spec: &Spec, streaming_mode: dt_types::run::StreamingMode) -> Run {
    let mut run = Run::new(spec.id, dt_types::run::ExecutionMode::Hybrid, streaming_mode);
    run.is_auto_retry = true;
    run
}
