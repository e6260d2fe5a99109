//! Trace archive writer (spec.md §6 "Trace archive"): JPEG screencast
//! frames addressed by SHA-1 of their bytes, plus a `screencast-manifest.json`,
//! sealed into a zip. Generalizes the teacher's
//! `trace_artifact::{write_trace_artifact, RetentionPolicy}` idiom from
//! "JSON event log + digest sidecar" to "frame archive + manifest".

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{SandboxError, SandboxResult};
use crate::traits::Frame;

pub const MAX_WIDTH: u32 = 1280;
pub const MAX_HEIGHT: u32 = 720;
pub const JPEG_QUALITY: u8 = 80;
/// Every 3rd captured frame is retained.
pub const FRAME_STRIDE: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameManifestEntry {
    pub index: usize,
    pub filename: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreencastManifest {
    pub frame_count: usize,
    pub frames: Vec<FrameManifestEntry>,
    pub start_timestamp_ms: u64,
    pub end_timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Downsample to every `FRAME_STRIDE`th frame, build the manifest, and write
/// a zip of `<sha1>.jpg` entries plus `screencast-manifest.json` to
/// `out_path`.
pub fn write_archive(
    frames: &[Frame],
    width: u32,
    height: u32,
    out_path: &Path,
) -> SandboxResult<PathBuf> {
    let sampled: Vec<&Frame> = frames.iter().step_by(FRAME_STRIDE).collect();

    let file = File::create(out_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut entries = Vec::with_capacity(sampled.len());
    for (index, frame) in sampled.iter().enumerate() {
        let filename = format!("{}.jpg", sha1_hex(&frame.jpeg_bytes));
        zip.start_file(&filename, options)
            .map_err(|e| SandboxError::Trace(e.to_string()))?;
        zip.write_all(&frame.jpeg_bytes)?;
        entries.push(FrameManifestEntry {
            index,
            filename,
            timestamp_ms: frame.timestamp_ms,
        });
    }

    let manifest = ScreencastManifest {
        frame_count: entries.len(),
        start_timestamp_ms: sampled.first().map(|f| f.timestamp_ms).unwrap_or(0),
        end_timestamp_ms: sampled.last().map(|f| f.timestamp_ms).unwrap_or(0),
        width: width.min(MAX_WIDTH),
        height: height.min(MAX_HEIGHT),
        quality: JPEG_QUALITY,
        frames: entries,
    };

    zip.start_file("screencast-manifest.json", options)
        .map_err(|e| SandboxError::Trace(e.to_string()))?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    zip.finish().map_err(|e| SandboxError::Trace(e.to_string()))?;

    Ok(out_path.to_path_buf())
}

/// Reads back `screencast-manifest.json` from a sealed archive for
/// verification.
pub fn read_manifest(archive_path: &Path) -> SandboxResult<ScreencastManifest> {
    let file = File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| SandboxError::Trace(e.to_string()))?;
    let mut entry = zip
        .by_name("screencast-manifest.json")
        .map_err(|e| SandboxError::Trace(e.to_string()))?;
    let mut buf = Vec::new();
    std::io::Read::read_to_end(&mut entry, &mut buf)?;
    Ok(serde_json::from_slice(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn frame(ts: u64, payload: &[u8]) -> Frame {
        Frame {
            timestamp_ms: ts,
            jpeg_bytes: payload.to_vec(),
        }
    }

    #[test]
    fn archive_samples_every_third_frame() {
        let frames: Vec<Frame> = (0..9)
            .map(|i| frame(i as u64 * 100, &[i as u8, i as u8]))
            .collect();
        let dir = tempdir().unwrap();
        let out = dir.path().join("trace.zip");
        write_archive(&frames, 1920, 1080, &out).unwrap();

        let manifest = read_manifest(&out).unwrap();
        assert_eq!(manifest.frame_count, 3);
        assert_eq!(manifest.width, MAX_WIDTH);
        assert_eq!(manifest.height, MAX_HEIGHT);
        assert_eq!(manifest.quality, JPEG_QUALITY);
    }

    #[test]
    fn frame_filenames_are_content_addressed() {
        let frames = vec![frame(0, b"same-bytes"), frame(300, b"same-bytes")];
        let dir = tempdir().unwrap();
        let out = dir.path().join("trace.zip");
        write_archive(&frames, 800, 600, &out).unwrap();
        let manifest = read_manifest(&out).unwrap();
        // only one frame survives the stride=3 sample (index 0)
        assert_eq!(manifest.frame_count, 1);
        assert_eq!(manifest.frames[0].filename, format!("{}.jpg", sha1_hex(b"same-bytes")));
    }
}
