//! Failure-context gathering (spec.md §4.6): previous code, error, a tail
//! of the run's logs, and up to 5 latest screenshot artifacts decoded to
//! base64.

use base64::Engine;

use dt_store::BlobStore;
use dt_types::{Artifact, ArtifactId, ArtifactType, FailureContext, Run, Spec};

use crate::error::SelfHealResult;

const LOGS_TAIL_CHARS: usize = 3000;
const MAX_SCREENSHOTS: usize = 5;

/// Ephemeral bundle handed to the `Generator`; only `screenshot_artifact_ids`
/// (not the decoded bytes) survives onto the persisted `FailureContext`.
#[derive(Debug, Clone)]
pub struct GatheredFailure {
    pub previous_code: String,
    pub error: String,
    pub logs_tail: String,
    pub screenshots_base64: Vec<String>,
    pub screenshot_artifact_ids: Vec<ArtifactId>,
}

impl GatheredFailure {
    pub fn into_failure_context(self) -> FailureContext {
        FailureContext {
            previous_code: self.previous_code,
            error: self.error,
            logs_tail: self.logs_tail,
            screenshot_artifact_ids: self.screenshot_artifact_ids,
        }
    }
}

fn tail_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(char_count - max_chars).collect()
}

/// `run_artifacts` need not be pre-sorted; the latest `MAX_SCREENSHOTS`
/// screenshots by `created_at` are selected here.
pub async fn gather_failure_context(
    run: &Run,
    spec: &Spec,
    run_artifacts: &[Artifact],
    blob: &dyn BlobStore,
) -> SelfHealResult<GatheredFailure> {
    let mut screenshots: Vec<&Artifact> =
        run_artifacts.iter().filter(|a| a.artifact_type == ArtifactType::Screenshot).collect();
    screenshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    screenshots.truncate(MAX_SCREENSHOTS);

    let mut screenshots_base64 = Vec::with_capacity(screenshots.len());
    let mut screenshot_artifact_ids = Vec::with_capacity(screenshots.len());
    for artifact in screenshots {
        let bytes = blob.get(&artifact.storage_path).await?;
        screenshots_base64.push(base64::engine::general_purpose::STANDARD.encode(bytes));
        screenshot_artifact_ids.push(artifact.id);
    }

    Ok(GatheredFailure {
        previous_code: spec.code.clone(),
        error: run.error.clone().unwrap_or_default(),
        logs_tail: tail_chars(&run.logs, LOGS_TAIL_CHARS),
        screenshots_base64,
        screenshot_artifact_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_store::MemoryBlobStore;
    use dt_types::ids::{ProjectId, RecordingId, RunId};
    use dt_types::run::{ExecutionMode, StreamingMode};

    fn make_run(error: &str, logs: &str) -> Run {
        let mut run = Run::new(dt_types::ids::SpecId::new(), ExecutionMode::Spec, StreamingMode::None);
        run.error = Some(error.to_string());
        run.logs = logs.to_string();
        run
    }

    fn make_spec() -> Spec {
        Spec::new(ProjectId::new(), RecordingId::new(), "await page.click('e1');".into()).unwrap()
    }

    #[tokio::test]
    async fn truncates_logs_to_the_tail() {
        let logs = "x".repeat(LOGS_TAIL_CHARS + 500);
        let run = make_run("boom", &logs);
        let spec = make_spec();
        let blob = MemoryBlobStore::new();

        let gathered = gather_failure_context(&run, &spec, &[], &blob).await.unwrap();

        assert_eq!(gathered.logs_tail.len(), LOGS_TAIL_CHARS);
        assert_eq!(gathered.previous_code, spec.code);
    }

    #[tokio::test]
    async fn selects_the_five_latest_screenshots() {
        let run_id = RunId::new();
        let run = make_run("timeout", "");
        let spec = make_spec();
        let blob = MemoryBlobStore::new();

        let mut artifacts = Vec::new();
        for i in 0..8 {
            let mut artifact = Artifact::new(run_id, ArtifactType::Screenshot, format!("step-{i}.png"));
            artifact.created_at = artifact.created_at + chrono::Duration::seconds(i as i64);
            blob.put(&artifact.storage_path, format!("frame-{i}").as_bytes()).await.unwrap();
            artifacts.push(artifact);
        }

        let gathered = gather_failure_context(&run, &spec, &artifacts, &blob).await.unwrap();

        assert_eq!(gathered.screenshots_base64.len(), MAX_SCREENSHOTS);
        assert_eq!(gathered.screenshot_artifact_ids.len(), MAX_SCREENSHOTS);
    }

    #[tokio::test]
    async fn ignores_non_screenshot_artifacts() {
        let run_id = RunId::new();
        let run = make_run("err", "");
        let spec = make_spec();
        let blob = MemoryBlobStore::new();
        let log_artifact = Artifact::new(run_id, ArtifactType::Log, "out.log".into());
        blob.put(&log_artifact.storage_path, b"log bytes").await.unwrap();

        let gathered = gather_failure_context(&run, &spec, &[log_artifact], &blob).await.unwrap();

        assert!(gathered.screenshots_base64.is_empty());
    }
}
