//! Worker-loop dispatch, Cancellation & Status Pipe (C9), config, and
//! telemetry for the execution subsystem. The `dt-worker` binary wires a
//! [`context::AppContext`] into `dt_queue::consume`, dispatching each
//! claimed job by [`dt_types::run::ExecutionMode`] to the matching mode
//! module (spec.md §2 "Control flow").

pub mod agent_mode;
pub mod config;
pub mod context;
pub mod error;
pub mod hybrid_mode;
pub mod payload;
pub mod self_heal_mode;
pub mod spec_mode;
pub mod status_pipe;
pub mod suite_mode;
pub mod telemetry;

pub use config::WorkerConfig;
pub use context::AppContext;
pub use error::{WorkerError, WorkerResult};
pub use telemetry::init_tracing;
