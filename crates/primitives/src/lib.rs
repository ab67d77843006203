//! Small async building blocks shared by the loader crates.

/// Deadline races for asynchronous operations.
pub mod deadline;

pub use deadline::{DEFAULT_TIMEOUT, DEFAULT_TIMEOUT_MESSAGE, TimedOptions, TimeoutError, race, timed};
