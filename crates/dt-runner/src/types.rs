use std::path::PathBuf;

use dt_types::{Artifact, RunId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestType {
    Flow,
    Connection,
}

/// Inputs to a single supervised run (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub run_id: RunId,
    pub test_type: TestType,
    /// The program text under test.
    pub program: String,
    /// Resolved connection-prelude test body, already fetched by the caller
    /// (the prelude Spec's existence check belongs to the caller, since it
    /// needs Record Store access this crate does not depend on).
    pub prelude: Option<String>,
    pub wallet_seed: String,
    pub artifacts_dir: PathBuf,
    pub headless: bool,
    pub timeout_ms: u64,
    /// The external test-harness command, e.g. `["node", "run-test.js"]`.
    /// The composed program text is written to a temp file and passed as
    /// its final argument.
    pub command: Vec<String>,
}

impl RunInputs {
    pub fn default_timeout_ms() -> u64 {
        300_000
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub passed: bool,
    pub duration_ms: u64,
    pub logs: String,
    pub error: Option<String>,
    pub artifacts: Vec<Artifact>,
}
