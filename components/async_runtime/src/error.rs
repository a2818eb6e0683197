//! Error types for the runtime host.
//!
//! Promise-level failures never appear here: they are rejections carried as
//! [`Value`]s. These errors describe the host failing to make progress.

use crate::promise::PromiseId;
use core_types::Value;
use thiserror::Error;

/// Runtime-specific errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A single drain ran its full budget and work was still queued
    #[error("microtask budget of {budget} exhausted with {remaining} microtasks still queued")]
    MicrotaskBudgetExhausted {
        /// Configured budget
        budget: usize,
        /// Microtasks left in the queue
        remaining: usize,
    },

    /// A task returned an error
    #[error("task failed: {0}")]
    TaskFailed(Value),

    /// The event loop ran out of work before the awaited promise settled
    #[error("promise {0} can no longer settle: no tasks or microtasks remain")]
    Stalled(PromiseId),

    /// Configuration could not be parsed
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration file could not be read
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
