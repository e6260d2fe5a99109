//! Artifact: a typed, write-once blob reference owned by a Run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ArtifactId, RunId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactType {
    Screenshot,
    Video,
    Trace,
    Log,
}

/// Maps a file extension (and, for traces, a filename hint) to its
/// artifact type and MIME, per the storage layout table (spec §6).
pub fn classify_extension(filename: &str) -> Option<(ArtifactType, &'static str)> {
    let lower = filename.to_ascii_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or("");
    match ext {
        "png" => Some((ArtifactType::Screenshot, "image/png")),
        "jpg" | "jpeg" => Some((ArtifactType::Screenshot, "image/jpeg")),
        "webm" => Some((ArtifactType::Video, "video/webm")),
        "mp4" => Some((ArtifactType::Video, "video/mp4")),
        "zip" if lower.contains("trace") => Some((ArtifactType::Trace, "application/zip")),
        "json" => Some((ArtifactType::Log, "application/json")),
        "txt" | "log" => Some((ArtifactType::Log, "text/plain")),
        _ => None,
    }
}

/// Write-once; constructed once and never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub run_id: RunId,
    pub artifact_type: ArtifactType,
    pub name: String,
    /// `runs/{runId}/{type}/{name}` key into the Blob Store.
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(run_id: RunId, artifact_type: ArtifactType, name: String) -> Self {
        let type_segment = match artifact_type {
            ArtifactType::Screenshot => "screenshot",
            ArtifactType::Video => "video",
            ArtifactType::Trace => "trace",
            ArtifactType::Log => "logs",
        };
        let storage_path = format!("runs/{}/{}/{}", run_id, type_segment, name);
        Self {
            id: ArtifactId::new(),
            run_id,
            artifact_type,
            name,
            storage_path,
            created_at: Utc::now(),
        }
    }
}
