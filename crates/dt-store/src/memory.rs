//! In-memory `RecordStore` fake, mirroring the teacher's
//! `MemoryRunLedger`/`MemoryCasStore` split: one `Mutex<HashMap<Id, T>>` per
//! entity table, used in unit tests and as the default backend for
//! `dt-worker`'s end-to-end dispatch-loop test.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use dt_types::{
    Artifact, ArtifactId, Clarification, ClarificationId, Project, ProjectId, Recording,
    RecordingId, Run, RunId, Spec, SpecId, SuiteRun, SuiteRunId,
};

use crate::error::{StoreError, StoreResult};
use crate::record::RecordStore;

#[derive(Default)]
pub struct MemoryRecordStore {
    projects: Mutex<HashMap<ProjectId, Project>>,
    recordings: Mutex<HashMap<RecordingId, Recording>>,
    specs: Mutex<HashMap<SpecId, Spec>>,
    runs: Mutex<HashMap<RunId, Run>>,
    artifacts: Mutex<HashMap<ArtifactId, Artifact>>,
    suite_runs: Mutex<HashMap<SuiteRunId, SuiteRun>>,
    clarifications: Mutex<HashMap<ClarificationId, Clarification>>,
    wallet_seeds: Mutex<HashMap<ProjectId, String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

macro_rules! get_or_not_found {
    ($table:expr, $id:expr, $kind:literal) => {
        $table
            .lock()
            .unwrap()
            .get(&$id)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound {
                kind: $kind,
                id: $id.to_string(),
            })
    };
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_project(&self, project: Project) -> StoreResult<Project> {
        self.projects.lock().unwrap().insert(project.id, project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: ProjectId) -> StoreResult<Project> {
        get_or_not_found!(self.projects, id, "Project")
    }

    async fn update_project(&self, project: Project) -> StoreResult<Project> {
        self.projects.lock().unwrap().insert(project.id, project.clone());
        Ok(project)
    }

    async fn put_wallet_seed(&self, project_id: ProjectId, seed_phrase: &str) -> StoreResult<()> {
        self.wallet_seeds.lock().unwrap().insert(project_id, seed_phrase.to_string());
        Ok(())
    }

    async fn get_wallet_seed(&self, project_id: ProjectId) -> StoreResult<String> {
        self.wallet_seeds
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound { kind: "WalletSeed", id: project_id.to_string() })
    }

    async fn create_recording(&self, recording: Recording) -> StoreResult<Recording> {
        self.recordings
            .lock()
            .unwrap()
            .insert(recording.id, recording.clone());
        Ok(recording)
    }

    async fn get_recording(&self, id: RecordingId) -> StoreResult<Recording> {
        get_or_not_found!(self.recordings, id, "Recording")
    }

    async fn create_spec(&self, spec: Spec) -> StoreResult<Spec> {
        self.specs.lock().unwrap().insert(spec.id, spec.clone());
        Ok(spec)
    }

    async fn get_spec(&self, id: SpecId) -> StoreResult<Spec> {
        get_or_not_found!(self.specs, id, "Spec")
    }

    async fn update_spec(&self, spec: Spec) -> StoreResult<Spec> {
        self.specs.lock().unwrap().insert(spec.id, spec.clone());
        Ok(spec)
    }

    async fn delete_spec(&self, id: SpecId) -> StoreResult<()> {
        self.specs.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn create_run(&self, run: Run) -> StoreResult<Run> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: RunId) -> StoreResult<Run> {
        get_or_not_found!(self.runs, id, "Run")
    }

    async fn update_run(&self, run: Run) -> StoreResult<Run> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(run)
    }

    async fn list_runs_by_spec(&self, spec_id: SpecId) -> StoreResult<Vec<Run>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.spec_id == spec_id)
            .cloned()
            .collect())
    }

    async fn delete_run(&self, id: RunId) -> StoreResult<()> {
        self.runs.lock().unwrap().remove(&id);
        self.artifacts.lock().unwrap().retain(|_, a| a.run_id != id);
        Ok(())
    }

    async fn create_artifact(&self, artifact: Artifact) -> StoreResult<Artifact> {
        self.artifacts
            .lock()
            .unwrap()
            .insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn get_artifact(&self, id: ArtifactId) -> StoreResult<Artifact> {
        get_or_not_found!(self.artifacts, id, "Artifact")
    }

    async fn list_artifacts_by_run(&self, run_id: RunId) -> StoreResult<Vec<Artifact>> {
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn create_suite_run(&self, suite: SuiteRun) -> StoreResult<SuiteRun> {
        self.suite_runs.lock().unwrap().insert(suite.id, suite.clone());
        Ok(suite)
    }

    async fn get_suite_run(&self, id: SuiteRunId) -> StoreResult<SuiteRun> {
        get_or_not_found!(self.suite_runs, id, "SuiteRun")
    }

    async fn update_suite_run(&self, suite: SuiteRun) -> StoreResult<SuiteRun> {
        self.suite_runs.lock().unwrap().insert(suite.id, suite.clone());
        Ok(suite)
    }

    async fn create_clarification(&self, c: Clarification) -> StoreResult<Clarification> {
        self.clarifications.lock().unwrap().insert(c.id, c.clone());
        Ok(c)
    }

    async fn list_clarifications_by_spec(
        &self,
        spec_id: SpecId,
    ) -> StoreResult<Vec<Clarification>> {
        Ok(self
            .clarifications
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.spec_id == spec_id)
            .cloned()
            .collect())
    }

    async fn update_clarification(&self, c: Clarification) -> StoreResult<Clarification> {
        self.clarifications.lock().unwrap().insert(c.id, c.clone());
        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_types::{ExecutionMode, RecordingType, StreamingMode};

    #[tokio::test]
    async fn run_delete_cascades_to_artifacts() {
        let store = MemoryRecordStore::new();
        let spec_id = SpecId::new();
        let run = Run::new(spec_id, ExecutionMode::Spec, StreamingMode::None);
        let run = store.create_run(run).await.unwrap();

        let artifact = dt_types::Artifact::new(
            run.id,
            dt_types::ArtifactType::Log,
            "out.log".into(),
        );
        store.create_artifact(artifact).await.unwrap();
        assert_eq!(store.list_artifacts_by_run(run.id).await.unwrap().len(), 1);

        store.delete_run(run.id).await.unwrap();
        assert!(store.get_run(run.id).await.is_err());
        assert_eq!(store.list_artifacts_by_run(run.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn recording_round_trips() {
        let store = MemoryRecordStore::new();
        let recording = Recording::new(ProjectId::new(), RecordingType::Flow, vec![]);
        let id = recording.id;
        store.create_recording(recording).await.unwrap();
        let fetched = store.get_recording(id).await.unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = MemoryRecordStore::new();
        let err = store.get_project(ProjectId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn wallet_seed_is_kept_separate_from_the_project_record() {
        let store = MemoryRecordStore::new();
        let (project, material) = dt_types::Project::create();
        let project = store.create_project(project).await.unwrap();
        store.put_wallet_seed(project.id, &material.seed_phrase).await.unwrap();

        let fetched_project = store.get_project(project.id).await.unwrap();
        assert_eq!(fetched_project.wallet_address, material.derived_address);

        let fetched_seed = store.get_wallet_seed(project.id).await.unwrap();
        assert_eq!(fetched_seed, material.seed_phrase);
    }
}
