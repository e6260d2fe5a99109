//! Recording: an immutable, ordered sequence of user actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProjectId, RecordingId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingType {
    Connection,
    Flow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedAction {
    Click { selector: String },
    Input { selector: String, value: String },
    Navigation { url: String },
    Wallet { op: String },
}

/// Immutable once created; bound to at most one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: RecordingId,
    pub project_id: ProjectId,
    pub recording_type: RecordingType,
    pub actions: Vec<RecordedAction>,
    pub created_at: DateTime<Utc>,
}

impl Recording {
    pub fn new(
        project_id: ProjectId,
        recording_type: RecordingType,
        actions: Vec<RecordedAction>,
    ) -> Self {
        Self {
            id: RecordingId::new(),
            project_id,
            recording_type,
            actions,
            created_at: Utc::now(),
        }
    }
}
