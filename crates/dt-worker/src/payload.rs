//! Job payload shapes enqueued by the (external) Run-control API. The dApp
//! URL has no home on the persisted data model (spec.md §3 has no such
//! field on `Project`/`Recording`/`Spec`/`Run`), so the submitter threads it
//! through on the job payload instead.

use serde::{Deserialize, Serialize};

use dt_types::{RunId, SpecId, SuiteRunId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunJobPayload {
    pub run_id: RunId,
    pub spec_id: SpecId,
    pub dapp_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteJobPayload {
    pub suite_run_id: SuiteRunId,
    pub runs: Vec<RunJobPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfHealJobPayload {
    pub failed_run_id: RunId,
    pub hybrid_took_over: bool,
    pub dapp_url: String,
}
