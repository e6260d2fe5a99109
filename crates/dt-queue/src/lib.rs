//! Durable job queue (C3): named channels with retry, visibility timeout,
//! cancellation and progress reporting, backed by either an in-memory store
//! (tests) or SurrealDB (production).

pub mod error;
pub mod job;
pub mod memory;
pub mod store;
pub mod surreal;
pub mod worker;

pub use error::{QueueError, QueueResult};
pub use job::{EnqueueOpts, JobKind, JobRecord, JobStatus};
pub use memory::MemoryQueueStore;
pub use store::QueueStore;
pub use surreal::SurrealQueueStore;
pub use worker::{consume, ConsumeConfig, JobHandle, Progress};
