//! Spec: a generated, executable test program for one recording.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::compute_digest;
use crate::error::{DtError, Result};
use crate::ids::{ProjectId, RecordingId, SpecId};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecStatus {
    Draft,
    NeedsReview,
    Ready,
    Tested,
}

/// Snapshot of the failure that produced a self-heal regenerated spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    pub previous_code: String,
    pub error: String,
    pub logs_tail: String,
    pub screenshot_artifact_ids: Vec<crate::ids::ArtifactId>,
}

/// Fields that participate in `specDigest` — excludes bookkeeping fields
/// (`status`, timestamps) that do not change the program's behavior.
#[derive(Debug, Clone, Serialize)]
struct SpecDigestFields<'a> {
    recording_id: &'a RecordingId,
    code: &'a str,
    version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spec {
    pub id: SpecId,
    pub project_id: ProjectId,
    pub recording_id: RecordingId,
    pub code: String,
    pub status: SpecStatus,
    /// Monotonic per lineage (a spec and its self-heal descendants).
    pub version: u32,
    pub attempt: u32,
    pub max_attempts: u32,
    pub parent_spec_id: Option<SpecId>,
    pub failure_context: Option<FailureContext>,
    pub spec_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Spec {
    pub fn new(
        project_id: ProjectId,
        recording_id: RecordingId,
        code: String,
    ) -> Result<Self> {
        let now = Utc::now();
        let spec_digest = Self::digest(&recording_id, &code, 1)?;
        Ok(Self {
            id: SpecId::new(),
            project_id,
            recording_id,
            code,
            status: SpecStatus::Draft,
            version: 1,
            attempt: 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            parent_spec_id: None,
            failure_context: None,
            spec_digest,
            created_at: now,
            updated_at: now,
        })
    }

    fn digest(recording_id: &RecordingId, code: &str, version: u32) -> Result<String> {
        let fields = SpecDigestFields {
            recording_id,
            code,
            version,
        };
        compute_digest(&serde_json::to_value(fields)?)
    }

    pub fn recompute_digest(&mut self) -> Result<()> {
        self.spec_digest = Self::digest(&self.recording_id, &self.code, self.version)?;
        Ok(())
    }

    /// Only specs with status != DRAFT are eligible to run.
    pub fn is_eligible_to_run(&self) -> bool {
        self.status != SpecStatus::Draft
    }

    /// A spec is eligible for self-heal iff `attempt < maxAttempts`.
    pub fn is_eligible_for_self_heal(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Apply a hybrid-executor patch to the spec's code. Increments
    /// `version` by 1, atomically with the new digest.
    pub fn apply_patch(&mut self, patched_code: String) -> Result<()> {
        self.code = patched_code;
        self.version += 1;
        self.recompute_digest()?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Create the next self-heal generation from a failed parent spec.
    pub fn regenerate(
        parent: &Spec,
        new_code: String,
        failure_context: FailureContext,
    ) -> Result<Self> {
        if !parent.is_eligible_for_self_heal() {
            return Err(DtError::SelfHealNotEligible(parent.id.0));
        }
        let now = Utc::now();
        let version = parent.version + 1;
        let spec_digest = Self::digest(&parent.recording_id, &new_code, version)?;
        Ok(Self {
            id: SpecId::new(),
            project_id: parent.project_id,
            recording_id: parent.recording_id,
            code: new_code,
            status: SpecStatus::Ready,
            version,
            attempt: parent.attempt + 1,
            max_attempts: parent.max_attempts,
            parent_spec_id: Some(parent.id),
            failure_context: Some(failure_context),
            spec_digest,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure_context() -> FailureContext {
        FailureContext {
            previous_code: "old".into(),
            error: "timeout".into(),
            logs_tail: "...".into(),
            screenshot_artifact_ids: vec![],
        }
    }

    #[test]
    fn new_spec_starts_at_version_1_attempt_1() {
        let spec = Spec::new(ProjectId::new(), RecordingId::new(), "code".into()).unwrap();
        assert_eq!(spec.version, 1);
        assert_eq!(spec.attempt, 1);
        assert_eq!(spec.status, SpecStatus::Draft);
        assert!(!spec.is_eligible_to_run());
    }

    #[test]
    fn apply_patch_increments_version_and_digest() {
        let mut spec = Spec::new(ProjectId::new(), RecordingId::new(), "code".into()).unwrap();
        let before = spec.spec_digest.clone();
        spec.apply_patch("new code".into()).unwrap();
        assert_eq!(spec.version, 2);
        assert_ne!(spec.spec_digest, before);
    }

    #[test]
    fn regenerate_bumps_attempt_and_links_parent() {
        let mut parent =
            Spec::new(ProjectId::new(), RecordingId::new(), "code".into()).unwrap();
        parent.status = SpecStatus::Ready;
        let child = Spec::regenerate(&parent, "fixed code".into(), failure_context()).unwrap();
        assert_eq!(child.attempt, 2);
        assert_eq!(child.version, 2);
        assert_eq!(child.parent_spec_id, Some(parent.id));
        assert_eq!(child.max_attempts, parent.max_attempts);
    }

    #[test]
    fn regenerate_rejects_exhausted_attempts() {
        let mut parent =
            Spec::new(ProjectId::new(), RecordingId::new(), "code".into()).unwrap();
        parent.attempt = parent.max_attempts;
        let err = Spec::regenerate(&parent, "x".into(), failure_context()).unwrap_err();
        assert!(matches!(err, DtError::SelfHealNotEligible(_)));
    }

    #[test]
    fn self_heal_ladder_attempt_strictly_increases() {
        let mut v1 = Spec::new(ProjectId::new(), RecordingId::new(), "a".into()).unwrap();
        v1.status = SpecStatus::Ready;
        let v2 = Spec::regenerate(&v1, "b".into(), failure_context()).unwrap();
        let mut v2 = v2;
        v2.status = SpecStatus::Ready;
        let v3 = Spec::regenerate(&v2, "c".into(), failure_context()).unwrap();
        assert!(v1.attempt < v2.attempt);
        assert!(v2.attempt < v3.attempt);
        assert_eq!(v3.attempt, v3.max_attempts);
    }
}
