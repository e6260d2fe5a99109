//! Self-Heal Regenerator (C8): classifies a failed run's error, gathers
//! failure context, and asks a `Generator` for the spec's next generation.

pub mod classify;
pub mod error;
pub mod gather;
pub mod generator;
pub mod regenerate;

pub use classify::{classify_failure, FailureClass};
pub use error::{SelfHealError, SelfHealResult};
pub use gather::{gather_failure_context, GatheredFailure};
pub use generator::{FailureAnalysis, FakeGenerator, Generator, GeneratorOutput, HttpGenerator};
pub use regenerate::{auto_retry_run, run_self_heal, SelfHealOutcome};
