//! Sandbox Supervisor (C4): isolated browser session lifecycle, the
//! race-safe wallet popup protocol, the streaming port pool, and the trace
//! archive writer.

pub mod bootstrap;
pub mod error;
pub mod fake;
pub mod port_pool;
pub mod trace;
pub mod traits;
pub mod wallet;

pub use bootstrap::{bootstrap, BootstrapConfig, CircuitBreaker, Sandbox};
pub use error::{SandboxError, SandboxResult};
pub use fake::{FakeBrowser, FakeBrowserConfig};
pub use port_pool::{PortAssignment, PortPool};
pub use trace::{write_archive, FrameManifestEntry, ScreencastManifest};
pub use traits::{Context, Frame, Page, TabInfo, Tracing, Wallet};
pub use wallet::{drive, drive_with_dependent_popup, WalletOutcome};
