//! Hybrid Executor (C6): runs a step program's own TypeScript-flavored
//! spec code inline, falling back to a single-step agent invocation per
//! step on failure, then splicing the agent's state-changing actions back
//! into the spec as a patch (spec.md §4.4).

pub mod error;
pub mod executor;
pub mod parser;
pub mod patch;

pub use error::{HybridError, HybridResult};
pub use executor::{
    is_code_bug_or_network_error, run_hybrid_test, run_step_with_recovery, HybridConfig,
    HybridRunOutcome, SandboxToolExecutor, StepRunResult,
};
pub use parser::{extract_test_body, parse_step_calls, parse_steps, strip_ts_annotations, Step};
pub use patch::{apply_patches, prefix_with_cleared_blockers, state_changing_patch_body, StepPatch};
