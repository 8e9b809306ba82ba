//! Standard task executor.
//!
//! Dispatches on the task type: prompt tasks resolve a runtime through the
//! resolver policy and call the model client, parse tasks apply the same
//! numeric handling to their input directly, hook tasks go through the
//! hook registry, and the remaining types are deterministic transforms.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, instrument};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::chain::{ChainTask, TaskType};
use crate::domain::models::value::{DataType, Value};
use crate::domain::ports::hook::{HookDispatch, HookStatus};
use crate::domain::ports::model_client::ModelClient;
use crate::domain::ports::task_executor::{TaskExecutor, TaskOutput};
use crate::services::resolver::{ResolverPolicy, RuntimeState};
use crate::services::transition::{parse_number, Number};

pub struct StandardTaskExecutor {
    runtimes: Vec<RuntimeState>,
    model_client: Arc<dyn ModelClient>,
    hooks: Arc<dyn HookDispatch>,
}

impl StandardTaskExecutor {
    pub fn new(
        runtimes: Vec<RuntimeState>,
        model_client: Arc<dyn ModelClient>,
        hooks: Arc<dyn HookDispatch>,
    ) -> Self {
        Self {
            runtimes,
            model_client,
            hooks,
        }
    }

    async fn prompt_model(
        &self,
        resolver: &ResolverPolicy,
        prompt: &str,
    ) -> EngineResult<String> {
        let runtime = resolver.select(&self.runtimes)?;
        debug!(runtime = %runtime.id, model = %runtime.model, "dispatching prompt");
        self.model_client.prompt(&runtime.model, prompt).await
    }
}

#[async_trait]
impl TaskExecutor for StandardTaskExecutor {
    #[instrument(skip(self, task, input), fields(task_id = %task.id, task_type = %task.task_type))]
    async fn exec(
        &self,
        started_at: DateTime<Utc>,
        resolver: &ResolverPolicy,
        task: &ChainTask,
        input: Value,
    ) -> EngineResult<TaskOutput> {
        match task.task_type {
            TaskType::RawString => {
                let text = input.as_display_string();
                Ok(TaskOutput::new(Value::String(text.clone()), text))
            }
            TaskType::PromptToString => {
                let prompt = require_string(&input)?;
                let text = self.prompt_model(resolver, prompt).await?;
                Ok(TaskOutput::new(Value::String(text.clone()), text))
            }
            TaskType::PromptToNumber => {
                let prompt = require_string(&input)?;
                let text = self.prompt_model(resolver, prompt).await?;
                number_output(text.trim())
            }
            TaskType::PromptToScore => {
                let prompt = require_string(&input)?;
                let text = self.prompt_model(resolver, prompt).await?;
                score_output(text.trim())
            }
            TaskType::PromptToRange => {
                let prompt = require_string(&input)?;
                let text = self.prompt_model(resolver, prompt).await?;
                range_output(text.trim())
            }
            TaskType::ParseNumber => number_output(require_string(&input)?.trim()),
            TaskType::ParseScore => score_output(require_string(&input)?.trim()),
            TaskType::ParseRange => range_output(require_string(&input)?.trim()),
            TaskType::ConditionKey => {
                let key = require_string(&input)?;
                let allowed = task.valid_conditions.get(key).copied().unwrap_or(false);
                if !allowed {
                    return Err(EngineError::Exec(format!(
                        "condition key '{}' is not in the valid conditions",
                        key
                    )));
                }
                let key = key.to_string();
                Ok(TaskOutput::new(Value::String(key.clone()), key))
            }
            TaskType::Hook => {
                let call = task.hook.as_ref().ok_or_else(|| {
                    EngineError::Exec(format!("task {} has no hook call", task.id))
                })?;
                let outcome = self
                    .hooks
                    .exec(started_at, input, task.transition.default_goto(), call)
                    .await?;
                match outcome.status {
                    HookStatus::Success => {
                        Ok(TaskOutput::new(outcome.output, outcome.transition_eval))
                    }
                    HookStatus::UnknownProvider => {
                        Err(EngineError::UnknownHook(call.name.clone()))
                    }
                    HookStatus::Error => Err(EngineError::Exec(format!(
                        "hook {} reported an error",
                        call.name
                    ))),
                }
            }
            TaskType::Noop => {
                let eval = input.as_display_string();
                Ok(TaskOutput::new(input, eval))
            }
        }
    }
}

fn require_string(input: &Value) -> EngineResult<&str> {
    match input {
        Value::String(s) => Ok(s.as_str()),
        other => Err(EngineError::TypeMismatch {
            expected: DataType::String,
            actual: other.data_type(),
        }),
    }
}

/// Parse text into a numeric output, int first then float. The output tag
/// follows whichever form parsed.
fn number_output(text: &str) -> EngineResult<TaskOutput> {
    let number = parse_number(text)
        .map_err(|e| EngineError::Exec(format!("cannot parse '{}' as a number: {}", text, e)))?;
    Ok(match number {
        Number::Int(i) => TaskOutput::new(Value::Int(i), i.to_string()),
        Number::Float(f) => TaskOutput::new(Value::Float(f), f.to_string()),
    })
}

/// Parse text as a number and clamp it into the 0..=100 score range.
fn score_output(text: &str) -> EngineResult<TaskOutput> {
    let number = parse_number(text)
        .map_err(|e| EngineError::Exec(format!("cannot parse '{}' as a score: {}", text, e)))?;
    let score = match number {
        Number::Int(i) => i.clamp(0, 100),
        Number::Float(f) => f.clamp(0.0, 100.0).round() as i64,
    };
    Ok(TaskOutput::new(Value::Int(score), score.to_string()))
}

/// Parse `"lo-hi"` text into a range. Both bounds must be numeric.
fn range_output(text: &str) -> EngineResult<TaskOutput> {
    let (lower, upper) = text
        .split_once('-')
        .ok_or_else(|| EngineError::Exec(format!("invalid range format '{}'", text)))?;
    let lower = parse_number(lower.trim())
        .map_err(|e| EngineError::Exec(format!("invalid range lower bound '{}': {}", lower, e)))?;
    let upper = parse_number(upper.trim())
        .map_err(|e| EngineError::Exec(format!("invalid range upper bound '{}': {}", upper, e)))?;
    let value = Value::Json(json!({
        "from": number_json(lower),
        "to": number_json(upper),
    }));
    Ok(TaskOutput::new(value, text.to_string()))
}

fn number_json(number: Number) -> serde_json::Value {
    match number {
        Number::Int(i) => json!(i),
        Number::Float(f) => json!(f),
    }
}
