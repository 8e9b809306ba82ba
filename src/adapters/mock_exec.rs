//! Mock task executor for tests.
//!
//! Returns a fixed output and transition eval, optionally preceded by a
//! scripted sequence of per-call failures so retry behavior can be
//! exercised deterministically. Calls are recorded for assertions.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::chain::ChainTask;
use crate::domain::models::value::Value;
use crate::domain::ports::task_executor::{TaskExecutor, TaskOutput};
use crate::services::resolver::ResolverPolicy;

/// One recorded executor call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub task_id: String,
    pub input: Value,
}

#[derive(Default)]
struct Script {
    /// Per-call outcome: `Some(msg)` fails the call, `None` succeeds.
    /// Calls beyond the script succeed.
    errors: Vec<Option<String>>,
    cursor: usize,
}

pub struct MockTaskExecutor {
    output: Value,
    transition_eval: String,
    delay: Option<Duration>,
    script: Mutex<Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTaskExecutor {
    /// Executor that always succeeds with the given output and eval.
    pub fn returning(output: Value, transition_eval: impl Into<String>) -> Self {
        Self {
            output,
            transition_eval: transition_eval.into(),
            delay: None,
            script: Mutex::new(Script::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the first calls: `Some(message)` fails, `None` succeeds.
    pub fn with_error_sequence(self, errors: Vec<Option<&str>>) -> Self {
        {
            let mut script = self.script.lock().expect("mock script poisoned");
            script.errors = errors
                .into_iter()
                .map(|e| e.map(|s| s.to_string()))
                .collect();
        }
        self
    }

    /// Sleep before answering each call, to trip attempt deadlines.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock calls poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock calls poisoned").len()
    }
}

#[async_trait]
impl TaskExecutor for MockTaskExecutor {
    async fn exec(
        &self,
        _started_at: DateTime<Utc>,
        _resolver: &ResolverPolicy,
        task: &ChainTask,
        input: Value,
    ) -> EngineResult<TaskOutput> {
        self.calls
            .lock()
            .expect("mock calls poisoned")
            .push(RecordedCall {
                task_id: task.id.clone(),
                input,
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = {
            let mut script = self.script.lock().expect("mock script poisoned");
            let entry = script.errors.get(script.cursor).cloned().flatten();
            script.cursor += 1;
            entry
        };

        match scripted {
            Some(message) => Err(EngineError::Exec(message)),
            None => Ok(TaskOutput::new(
                self.output.clone(),
                self.transition_eval.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::chain::TaskType;

    #[tokio::test]
    async fn test_error_sequence_then_success() {
        let exec = MockTaskExecutor::returning(Value::from("ok"), "ok")
            .with_error_sequence(vec![Some("first"), Some("second"), None]);
        let task = ChainTask::new("t", TaskType::Noop);
        let policy = ResolverPolicy::random_seeded(0);

        for expected in ["first", "second"] {
            let err = exec
                .exec(Utc::now(), &policy, &task, Value::from("x"))
                .await
                .unwrap_err();
            assert!(err.to_string().contains(expected));
        }

        let out = exec
            .exec(Utc::now(), &policy, &task, Value::from("x"))
            .await
            .unwrap();
        assert_eq!(out.value, Value::from("ok"));
        assert_eq!(exec.call_count(), 3);
    }
}
