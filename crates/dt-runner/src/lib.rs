//! Spec Runner (C5): executes a test program as a supervised child process,
//! splices the connection prelude for flow tests, classifies exit-code and
//! error-line outcome, and walks the artifact directory.

pub mod error;
pub mod runner;
pub mod types;

pub use error::{RunnerError, RunnerResult};
pub use runner::{compose_program, execute};
pub use types::{RunInputs, RunOutcome, TestType};
