//! Shared data model and error taxonomy for the execution and self-healing
//! subsystem: `Project`, `Recording`, `Spec`, `Run`, `SuiteRun`, `Artifact`,
//! and `Clarification`, plus the canonical-JSON digest scheme used to
//! fingerprint specs and runs.

pub mod artifact;
pub mod clarification;
pub mod digest;
pub mod error;
pub mod ids;
pub mod project;
pub mod recording;
pub mod run;
pub mod spec;
pub mod suite_run;

pub use artifact::{classify_extension, Artifact, ArtifactType};
pub use clarification::{Clarification, ClarificationStatus};
pub use error::{DtError, Result};
pub use ids::{ArtifactId, ClarificationId, JobId, ProjectId, RecordingId, RunId, SpecId, SuiteRunId};
pub use project::{Project, WalletMaterial};
pub use recording::{RecordedAction, Recording, RecordingType};
pub use run::{AgentData, AgentStepRecord, ExecutionMode, ModelUsage, Run, RunStatus, StreamingMode};
pub use spec::{FailureContext, Spec, SpecStatus};
pub use suite_run::SuiteRun;
