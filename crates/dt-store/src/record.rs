//! C2 — Record Store Adapter.
//!
//! Transactional CRUD and status transitions for `Project`, `Recording`,
//! `Spec`, `Run`, `Artifact`, `SuiteRun`, and `Clarification`.

use async_trait::async_trait;

use dt_types::{
    Artifact, ArtifactId, Clarification, ClarificationId, Project, ProjectId, Recording,
    RecordingId, Run, RunId, Spec, SpecId, SuiteRun, SuiteRunId,
};

use crate::error::StoreResult;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_project(&self, project: Project) -> StoreResult<Project>;
    async fn get_project(&self, id: ProjectId) -> StoreResult<Project>;
    async fn update_project(&self, project: Project) -> StoreResult<Project>;

    /// Persists a project's wallet seed phrase in a keyspace separate from
    /// the `Project` record, so it's never returned by `get_project` once
    /// the creation response has surfaced it.
    async fn put_wallet_seed(&self, project_id: ProjectId, seed_phrase: &str) -> StoreResult<()>;
    async fn get_wallet_seed(&self, project_id: ProjectId) -> StoreResult<String>;

    async fn create_recording(&self, recording: Recording) -> StoreResult<Recording>;
    async fn get_recording(&self, id: RecordingId) -> StoreResult<Recording>;

    async fn create_spec(&self, spec: Spec) -> StoreResult<Spec>;
    async fn get_spec(&self, id: SpecId) -> StoreResult<Spec>;
    /// Atomic with artifact persistence for the run that produced the patch
    /// (callers commit both within the same logical transaction).
    async fn update_spec(&self, spec: Spec) -> StoreResult<Spec>;
    async fn delete_spec(&self, id: SpecId) -> StoreResult<()>;

    async fn create_run(&self, run: Run) -> StoreResult<Run>;
    async fn get_run(&self, id: RunId) -> StoreResult<Run>;
    async fn update_run(&self, run: Run) -> StoreResult<Run>;
    async fn list_runs_by_spec(&self, spec_id: SpecId) -> StoreResult<Vec<Run>>;
    /// Deleting a Run deletes its artifacts (spec §3 ownership rule).
    async fn delete_run(&self, id: RunId) -> StoreResult<()>;

    async fn create_artifact(&self, artifact: Artifact) -> StoreResult<Artifact>;
    async fn get_artifact(&self, id: ArtifactId) -> StoreResult<Artifact>;
    async fn list_artifacts_by_run(&self, run_id: RunId) -> StoreResult<Vec<Artifact>>;

    async fn create_suite_run(&self, suite: SuiteRun) -> StoreResult<SuiteRun>;
    async fn get_suite_run(&self, id: SuiteRunId) -> StoreResult<SuiteRun>;
    async fn update_suite_run(&self, suite: SuiteRun) -> StoreResult<SuiteRun>;

    async fn create_clarification(&self, c: Clarification) -> StoreResult<Clarification>;
    async fn list_clarifications_by_spec(&self, spec_id: SpecId) -> StoreResult<Vec<Clarification>>;
    async fn update_clarification(&self, c: Clarification) -> StoreResult<Clarification>;
}
