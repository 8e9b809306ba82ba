//! Domain errors for the taskchain engine.

use std::time::Duration;

use thiserror::Error;

use crate::domain::models::value::DataType;

/// Errors surfaced by chain execution and its collaborators.
///
/// Retry policy is decided by the engine, not here: executor-level failures
/// (`Exec`, `Model`, `TypeMismatch`, `Timeout`) participate in the per-task
/// retry loop, while `Cancelled` and `UnknownHook` abort the attempt loop
/// immediately.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("chain validation failed: {0}")]
    Validation(String),

    #[error("task {task_id}: template error: {reason}")]
    Template { task_id: String, reason: String },

    #[error("task execution failed: {0}")]
    Exec(String),

    #[error("task {task_id} failed after {retries} retries: {reason}")]
    TaskFailed {
        task_id: String,
        retries: u32,
        reason: String,
    },

    #[error("unknown hook provider: {0}")]
    UnknownHook(String),

    #[error("transition error: {0}")]
    Transition(String),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: DataType, actual: DataType },

    #[error("execution cancelled")]
    Cancelled,

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("resolver error: {0}")]
    Resolver(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Whether this error aborts the attempt loop instead of consuming a retry.
    pub fn is_fatal_in_attempt(&self) -> bool {
        matches!(self, EngineError::Cancelled | EngineError::UnknownHook(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
