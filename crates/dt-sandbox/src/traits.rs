//! Driver seams. The concrete browser/wallet-extension driver is an external
//! collaborator (spec.md §1); this crate only defines the contract and a
//! [`crate::fake::FakeBrowser`] satisfying it for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SandboxResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
    pub is_extension: bool,
}

/// The primary tab against the dApp.
#[async_trait]
pub trait Page: Send + Sync {
    async fn navigate(&self, url: &str) -> SandboxResult<()>;
    async fn click(&self, selector: &str) -> SandboxResult<()>;
    async fn type_text(&self, selector: &str, text: &str) -> SandboxResult<()>;
    async fn select(&self, selector: &str, value: &str) -> SandboxResult<()>;
    async fn press_key(&self, key: &str) -> SandboxResult<()>;
    async fn scroll(&self, dx: i64, dy: i64) -> SandboxResult<()>;
    async fn wait(&self, duration_ms: u64) -> SandboxResult<()>;
    async fn go_back(&self) -> SandboxResult<()>;
    /// Textual accessibility tree with opaque refs (e.g. `e5`), consumed by
    /// the Agent Loop (C7).
    async fn snapshot(&self) -> SandboxResult<String>;
    async fn evaluate(&self, script: &str) -> SandboxResult<serde_json::Value>;
    async fn screenshot(&self) -> SandboxResult<Vec<u8>>;
    async fn url(&self) -> SandboxResult<String>;
}

/// Wallet extension operations, always non-fatal per the race-safe protocol
/// in [`crate::wallet`].
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn approve(&self) -> SandboxResult<bool>;
    async fn sign(&self) -> SandboxResult<bool>;
    async fn confirm_transaction(&self) -> SandboxResult<bool>;
    async fn switch_network(&self, name: &str) -> SandboxResult<bool>;
    async fn reject(&self) -> SandboxResult<bool>;
    async fn add_network(&self, name: &str) -> SandboxResult<bool>;
    async fn handle_siwe_popup(&self) -> SandboxResult<bool>;
    async fn get_address(&self) -> SandboxResult<String>;
    /// Opens the wallet's notification URL manually (protocol step 3).
    async fn open_notification(&self) -> SandboxResult<TabInfo>;
    /// Tolerates three UI versions: testid anchors, semantic role + text,
    /// structural fallback. Returns whether the popup was found and driven.
    async fn drive_popup(&self, tab: &TabInfo, action: &str) -> SandboxResult<bool>;
}

/// The set of open tabs, including wallet-extension pages.
#[async_trait]
pub trait Context: Send + Sync {
    async fn tabs(&self) -> SandboxResult<Vec<TabInfo>>;
    async fn bring_forward(&self, tab_id: &str) -> SandboxResult<()>;
    /// Screenshot filtered to non-extension URLs.
    async fn screenshot(&self) -> SandboxResult<Vec<u8>>;
    async fn close(&self) -> SandboxResult<()>;
}

/// A single captured screencast frame, JPEG-encoded.
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp_ms: u64,
    pub jpeg_bytes: Vec<u8>,
}

/// Captures DOM snapshots and JPEG screencast frames into a sealed archive.
#[async_trait]
pub trait Tracing: Send + Sync {
    async fn start(&self) -> SandboxResult<()>;
    /// Stops capture and returns the recorded frames for archival.
    async fn stop(&self) -> SandboxResult<Vec<Frame>>;
}
