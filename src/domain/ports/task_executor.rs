//! Task executor port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::EngineResult;
use crate::domain::models::chain::ChainTask;
use crate::domain::models::value::Value;
use crate::services::resolver::ResolverPolicy;

/// Result of executing one task: the typed output plus the textual eval
/// that transition branches compare against.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput {
    pub value: Value,
    pub transition_eval: String,
}

impl TaskOutput {
    pub fn new(value: Value, transition_eval: impl Into<String>) -> Self {
        Self {
            value,
            transition_eval: transition_eval.into(),
        }
    }
}

/// Performs the per-type action for a single task.
///
/// Implementations must be `Send + Sync`; the engine shares one executor
/// across concurrent chain executions. The mock in `adapters::mock_exec`
/// scripts outcomes per call for tests.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn exec(
        &self,
        started_at: DateTime<Utc>,
        resolver: &ResolverPolicy,
        task: &ChainTask,
        input: Value,
    ) -> EngineResult<TaskOutput>;
}
