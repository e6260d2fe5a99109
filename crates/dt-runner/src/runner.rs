//! Supervised child-process execution, generalized from the teacher's
//! `CiRunner::execute_stage` (tokio spawn, piped stdout/stderr, timeout)
//! from "run a CI stage command" to "run a test program to completion".

use std::collections::HashSet;
use std::process::Stdio;
use std::time::{Duration, Instant};

use dt_types::artifact::classify_extension;
use dt_types::Artifact;
use tokio::process::Command;
use tracing::instrument;

use crate::error::{RunnerError, RunnerResult};
use crate::types::{RunInputs, RunOutcome, TestType};

/// Textually prepends the connection prelude's test body under a serial
/// grouping named `"Connection + Flow"` (spec.md §4.3). If there is no
/// prelude (standalone flow, or a stale `connectionSpecId` already cleared
/// by the caller), the program runs unmodified.
pub fn compose_program(inputs: &RunInputs) -> String {
    match (&inputs.test_type, &inputs.prelude) {
        (TestType::Flow, Some(prelude)) => format!(
            "// Connection + Flow\n{}\n\n{}",
            prelude.trim_end(),
            inputs.program
        ),
        _ => inputs.program.clone(),
    }
}

/// Extracts the first `/Error:.*/` line from combined output.
fn extract_error_line(stdout: &str, stderr: &str) -> Option<String> {
    stderr
        .lines()
        .chain(stdout.lines())
        .find_map(|line| line.find("Error:").map(|idx| line[idx..].trim().to_string()))
}

/// Walks `artifacts_dir`, classifying each file by extension into
/// `{SCREENSHOT, VIDEO, TRACE, LOG}`, deduplicating by `(name, type)`.
fn classify_artifacts(run_id: dt_types::RunId, artifacts_dir: &std::path::Path) -> Vec<Artifact> {
    let mut seen = HashSet::new();
    let mut artifacts = Vec::new();

    let Ok(entries) = std::fs::read_dir(artifacts_dir) else {
        return artifacts;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((artifact_type, _mime)) = classify_extension(name) else {
            continue;
        };
        let key = (name.to_string(), artifact_type);
        if !seen.insert(key) {
            continue;
        }
        artifacts.push(Artifact::new(run_id, artifact_type, name.to_string()));
    }

    artifacts
}

/// Executes `inputs.command <composed-program-path>` as a supervised child,
/// bounded by `inputs.timeout_ms`, and classifies the resulting artifact
/// directory.
#[instrument(skip(inputs), fields(run_id = %inputs.run_id))]
pub async fn execute(inputs: &RunInputs) -> RunnerResult<RunOutcome> {
    if inputs.program.trim().is_empty() {
        return Err(RunnerError::EmptyProgram);
    }
    let Some((exe, args)) = inputs.command.split_first() else {
        return Err(RunnerError::EmptyProgram);
    };

    let composed = compose_program(inputs);
    let program_file = tempfile::Builder::new()
        .suffix(".spec")
        .tempfile()
        .map_err(RunnerError::Spawn)?;
    std::fs::write(program_file.path(), composed).map_err(RunnerError::Spawn)?;

    std::fs::create_dir_all(&inputs.artifacts_dir).map_err(RunnerError::Spawn)?;
    let report_path = inputs.artifacts_dir.join("report.json");

    let start = Instant::now();
    let child = Command::new(exe)
        .args(args)
        .arg(program_file.path())
        .env("DISPLAY", if inputs.headless { "" } else { ":99" })
        .env("HEADLESS", inputs.headless.to_string())
        .env("SEED_PHRASE", &inputs.wallet_seed)
        .env("REPORT_PATH", &report_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = tokio::time::timeout(
        Duration::from_millis(inputs.timeout_ms),
        child.wait_with_output(),
    )
    .await
    .map_err(|_| RunnerError::Timeout { timeout_ms: inputs.timeout_ms })??;

    let duration_ms = start.elapsed().as_millis() as u64;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let passed = output.status.success();
    let error = if passed {
        None
    } else {
        Some(extract_error_line(&stdout, &stderr).unwrap_or_else(|| "unknown failure".to_string()))
    };

    let artifacts = classify_artifacts(inputs.run_id, &inputs.artifacts_dir);
    let logs = format!("{stdout}{stderr}");

    Ok(RunOutcome {
        passed,
        duration_ms,
        logs,
        error,
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_types::RunId;
    use tempfile::tempdir;

    fn base_inputs(artifacts_dir: std::path::PathBuf) -> RunInputs {
        RunInputs {
            run_id: RunId::new(),
            test_type: TestType::Connection,
            program: "console.log('hello')".to_string(),
            prelude: None,
            wallet_seed: "seed phrase here".to_string(),
            artifacts_dir,
            headless: true,
            timeout_ms: 10_000,
            command: vec!["sh".to_string(), "-c".to_string(), "exit 0".to_string()],
        }
    }

    #[test]
    fn flow_prelude_is_prepended_under_connection_plus_flow_grouping() {
        let inputs = RunInputs {
            test_type: TestType::Flow,
            prelude: Some("// prelude body".to_string()),
            ..base_inputs(std::env::temp_dir())
        };
        let composed = compose_program(&inputs);
        assert!(composed.starts_with("// Connection + Flow"));
        assert!(composed.contains("// prelude body"));
        assert!(composed.contains(&inputs.program));
    }

    #[test]
    fn standalone_flow_runs_unmodified_when_prelude_is_absent() {
        let inputs = RunInputs {
            test_type: TestType::Flow,
            prelude: None,
            ..base_inputs(std::env::temp_dir())
        };
        assert_eq!(compose_program(&inputs), inputs.program);
    }

    #[test]
    fn error_line_is_extracted_from_stderr_first() {
        let stdout = "building...\nError: stdout should not win\n";
        let stderr = "Error: assertion failed at step 3\n";
        assert_eq!(
            extract_error_line(stdout, stderr).as_deref(),
            Some("Error: assertion failed at step 3")
        );
    }

    #[tokio::test]
    async fn successful_command_reports_passed_and_classified_artifacts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("step-1.png"), b"fake-png").unwrap();
        std::fs::write(dir.path().join("notes.pdf"), b"ignored").unwrap();

        let inputs = base_inputs(dir.path().to_path_buf());
        let outcome = execute(&inputs).await.unwrap();

        assert!(outcome.passed);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.artifacts[0].name, "step-1.png");
    }

    #[tokio::test]
    async fn failing_command_extracts_error_and_fails() {
        let dir = tempdir().unwrap();
        let inputs = RunInputs {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo 'Error: wallet popup never appeared' >&2; exit 1".to_string(),
            ],
            ..base_inputs(dir.path().to_path_buf())
        };

        let outcome = execute(&inputs).await.unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.error.as_deref(), Some("Error: wallet popup never appeared"));
    }

    #[tokio::test]
    async fn empty_program_is_rejected() {
        let dir = tempdir().unwrap();
        let inputs = RunInputs {
            program: "   ".to_string(),
            ..base_inputs(dir.path().to_path_buf())
        };
        assert!(matches!(execute(&inputs).await, Err(RunnerError::EmptyProgram)));
    }
}
