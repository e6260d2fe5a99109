//! SurrealDB-backed `RecordStore`, mirroring the teacher's `SurrealHandle`:
//! connect to an in-memory (or `kv-surrealkv`-persisted) instance, run the
//! schema DDL once, then CRUD domain structs directly via `.content()`
//! (the `ci_run_record.rs` idiom — store the domain type, not a hand-mapped
//! row type, since SurrealDB is schemaless-by-default and our fields are
//! already serde-friendly).

use async_trait::async_trait;
use surrealdb::engine::local::{Db, Mem};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use dt_types::{
    Artifact, ArtifactId, Clarification, ClarificationId, Project, ProjectId, Recording,
    RecordingId, Run, RunId, Spec, SpecId, SuiteRun, SuiteRunId,
};

use crate::error::{StoreError, StoreResult};
use crate::record::RecordStore;

pub struct SurrealStore {
    db: Surreal<Db>,
}

/// Row shape for the `wallet_seeds` table, kept separate from `projects` so
/// a project read never carries the seed phrase along with it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct WalletSeedRow {
    project_id: ProjectId,
    seed_phrase: String,
}

const SCHEMA: &str = r#"
    DEFINE TABLE projects SCHEMALESS;
    DEFINE INDEX idx_projects_id ON projects FIELDS id UNIQUE;

    DEFINE TABLE wallet_seeds SCHEMALESS;

    DEFINE TABLE recordings SCHEMALESS;
    DEFINE INDEX idx_recordings_project ON recordings FIELDS project_id;

    DEFINE TABLE specs SCHEMALESS;
    DEFINE INDEX idx_specs_recording ON specs FIELDS recording_id;
    DEFINE INDEX idx_specs_parent ON specs FIELDS parent_spec_id;

    DEFINE TABLE runs SCHEMALESS;
    DEFINE INDEX idx_runs_spec ON runs FIELDS spec_id;

    DEFINE TABLE artifacts SCHEMALESS;
    DEFINE INDEX idx_artifacts_run ON artifacts FIELDS run_id;

    DEFINE TABLE suite_runs SCHEMALESS;

    DEFINE TABLE clarifications SCHEMALESS;
    DEFINE INDEX idx_clarifications_spec ON clarifications FIELDS spec_id;
"#;

impl SurrealStore {
    #[instrument(skip_all)]
    pub async fn connect_in_memory() -> StoreResult<Self> {
        info!("connecting to SurrealDB (in-memory)");
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns("dt").use_db("main").await?;
        let store = Self { db };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StoreResult<()> {
        debug!("initializing record store schema");
        self.db
            .query(SCHEMA)
            .await
            .map_err(|e| StoreError::SchemaSetup(e.to_string()))?;
        Ok(())
    }

    async fn put<T>(&self, table: &str, id: impl std::fmt::Display, value: T) -> StoreResult<T>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone + 'static,
    {
        let key = id.to_string();
        let existing: Option<T> = self.db.select((table, key.as_str())).await?;
        let stored: Option<T> = if existing.is_some() {
            self.db.update((table, key.as_str())).content(value.clone()).await?
        } else {
            self.db.create((table, key.as_str())).content(value.clone()).await?
        };
        stored.ok_or_else(|| StoreError::Backend(format!("failed to persist into {table}")))
    }

    async fn fetch<T>(&self, table: &'static str, id: impl std::fmt::Display) -> StoreResult<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let key = id.to_string();
        let found: Option<T> = self.db.select((table, key.as_str())).await?;
        found.ok_or(StoreError::RecordNotFound { kind: table, id: key })
    }
}

#[async_trait]
impl RecordStore for SurrealStore {
    async fn create_project(&self, project: Project) -> StoreResult<Project> {
        self.put("projects", project.id, project).await
    }

    async fn get_project(&self, id: ProjectId) -> StoreResult<Project> {
        self.fetch("projects", id).await
    }

    async fn update_project(&self, project: Project) -> StoreResult<Project> {
        self.put("projects", project.id, project).await
    }

    async fn put_wallet_seed(&self, project_id: ProjectId, seed_phrase: &str) -> StoreResult<()> {
        let row = WalletSeedRow { project_id, seed_phrase: seed_phrase.to_string() };
        self.put("wallet_seeds", project_id, row).await?;
        Ok(())
    }

    async fn get_wallet_seed(&self, project_id: ProjectId) -> StoreResult<String> {
        let row: WalletSeedRow = self.fetch("wallet_seeds", project_id).await?;
        Ok(row.seed_phrase)
    }

    async fn create_recording(&self, recording: Recording) -> StoreResult<Recording> {
        self.put("recordings", recording.id, recording).await
    }

    async fn get_recording(&self, id: RecordingId) -> StoreResult<Recording> {
        self.fetch("recordings", id).await
    }

    async fn create_spec(&self, spec: Spec) -> StoreResult<Spec> {
        self.put("specs", spec.id, spec).await
    }

    async fn get_spec(&self, id: SpecId) -> StoreResult<Spec> {
        self.fetch("specs", id).await
    }

    async fn update_spec(&self, spec: Spec) -> StoreResult<Spec> {
        self.put("specs", spec.id, spec).await
    }

    async fn delete_spec(&self, id: SpecId) -> StoreResult<()> {
        let _: Option<Spec> = self.db.delete(("specs", id.to_string())).await?;
        Ok(())
    }

    async fn create_run(&self, run: Run) -> StoreResult<Run> {
        self.put("runs", run.id, run).await
    }

    async fn get_run(&self, id: RunId) -> StoreResult<Run> {
        self.fetch("runs", id).await
    }

    async fn update_run(&self, run: Run) -> StoreResult<Run> {
        self.put("runs", run.id, run).await
    }

    async fn list_runs_by_spec(&self, spec_id: SpecId) -> StoreResult<Vec<Run>> {
        let mut result = self
            .db
            .query("SELECT * FROM runs WHERE spec_id = $spec_id")
            .bind(("spec_id", spec_id))
            .await?;
        let runs: Vec<Run> = result.take(0)?;
        Ok(runs)
    }

    async fn delete_run(&self, id: RunId) -> StoreResult<()> {
        let _: Option<Run> = self.db.delete(("runs", id.to_string())).await?;
        self.db
            .query("DELETE FROM artifacts WHERE run_id = $run_id")
            .bind(("run_id", id))
            .await?;
        Ok(())
    }

    async fn create_artifact(&self, artifact: Artifact) -> StoreResult<Artifact> {
        self.put("artifacts", artifact.id, artifact).await
    }

    async fn get_artifact(&self, id: ArtifactId) -> StoreResult<Artifact> {
        self.fetch("artifacts", id).await
    }

    async fn list_artifacts_by_run(&self, run_id: RunId) -> StoreResult<Vec<Artifact>> {
        let mut result = self
            .db
            .query("SELECT * FROM artifacts WHERE run_id = $run_id")
            .bind(("run_id", run_id))
            .await?;
        let artifacts: Vec<Artifact> = result.take(0)?;
        Ok(artifacts)
    }

    async fn create_suite_run(&self, suite: SuiteRun) -> StoreResult<SuiteRun> {
        self.put("suite_runs", suite.id, suite).await
    }

    async fn get_suite_run(&self, id: SuiteRunId) -> StoreResult<SuiteRun> {
        self.fetch("suite_runs", id).await
    }

    async fn update_suite_run(&self, suite: SuiteRun) -> StoreResult<SuiteRun> {
        self.put("suite_runs", suite.id, suite).await
    }

    async fn create_clarification(&self, c: Clarification) -> StoreResult<Clarification> {
        self.put("clarifications", c.id, c).await
    }

    async fn list_clarifications_by_spec(
        &self,
        spec_id: SpecId,
    ) -> StoreResult<Vec<Clarification>> {
        let mut result = self
            .db
            .query("SELECT * FROM clarifications WHERE spec_id = $spec_id")
            .bind(("spec_id", spec_id))
            .await?;
        let clarifications: Vec<Clarification> = result.take(0)?;
        Ok(clarifications)
    }

    async fn update_clarification(&self, c: Clarification) -> StoreResult<Clarification> {
        self.put("clarifications", c.id, c).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_types::{ExecutionMode, StreamingMode};

    #[tokio::test]
    async fn connects_and_initializes_schema() {
        let store = SurrealStore::connect_in_memory().await.unwrap();
        let project = Project::new("0xabc".into());
        let created = store.create_project(project.clone()).await.unwrap();
        assert_eq!(created.id, project.id);
        let fetched = store.get_project(project.id).await.unwrap();
        assert_eq!(fetched.wallet_address, "0xabc");
    }

    #[tokio::test]
    async fn list_runs_by_spec_filters_correctly() {
        let store = SurrealStore::connect_in_memory().await.unwrap();
        let spec_id = SpecId::new();
        let other_spec_id = SpecId::new();
        store
            .create_run(Run::new(spec_id, ExecutionMode::Spec, StreamingMode::None))
            .await
            .unwrap();
        store
            .create_run(Run::new(
                other_spec_id,
                ExecutionMode::Spec,
                StreamingMode::None,
            ))
            .await
            .unwrap();
        let runs = store.list_runs_by_spec(spec_id).await.unwrap();
        assert_eq!(runs.len(), 1);
    }
}
