//! Chain execution engine.
//!
//! `SimpleEnv` drives a chain from its entry task to the reserved `end`
//! id: it validates the definition, renders prompt templates against the
//! execution scope, runs each task through the pluggable executor with
//! retry and timeout handling, evaluates transitions, and reports every
//! step to the activity tracker. One captured state unit is appended per
//! task visit and returned with the final output.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::chain::{validate_chain, ChainDefinition, ChainTask, TERM_END};
use crate::domain::models::state::{CapturedStateUnit, ErrorResponse};
use crate::domain::models::value::Value;
use crate::domain::ports::task_executor::{TaskExecutor, TaskOutput};
use crate::services::config::EngineConfig;
use crate::services::resolver::ResolverPolicy;
use crate::services::template::render;
use crate::services::tracker::{ActivityEvent, ActivityTracker, TransitionReason};
use crate::services::transition::evaluate_transitions;

/// Result of one chain execution.
#[derive(Debug)]
pub struct ChainRun {
    pub execution_id: Uuid,
    pub output: Value,
    pub state: Vec<CapturedStateUnit>,
}

/// Environment capable of executing chain definitions.
#[async_trait]
pub trait ChainEnv: Send + Sync {
    async fn exec(
        &self,
        cancel: CancellationToken,
        chain: &ChainDefinition,
        input: Value,
    ) -> EngineResult<ChainRun>;
}

/// The default `ChainEnv` implementation.
pub struct SimpleEnv {
    executor: Arc<dyn TaskExecutor>,
    tracker: Arc<dyn ActivityTracker>,
    config: EngineConfig,
}

impl SimpleEnv {
    pub fn new(executor: Arc<dyn TaskExecutor>, tracker: Arc<dyn ActivityTracker>) -> Self {
        Self {
            executor,
            tracker,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one attempt under the cancellation token and optional deadline.
    /// A deadline expiry counts as a failed attempt, not a fatal error.
    async fn run_attempt(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Duration>,
        started_at: DateTime<Utc>,
        resolver: &ResolverPolicy,
        task: &ChainTask,
        input: Value,
    ) -> EngineResult<TaskOutput> {
        let attempt = self.executor.exec(started_at, resolver, task, input);
        tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = async {
                match deadline {
                    Some(limit) => match timeout(limit, attempt).await {
                        Ok(result) => result,
                        Err(_) => Err(EngineError::Timeout(limit)),
                    },
                    None => attempt.await,
                }
            } => result,
        }
    }
}

#[async_trait]
impl ChainEnv for SimpleEnv {
    #[instrument(skip(self, cancel, chain, input), fields(chain_id = %chain.id))]
    async fn exec(
        &self,
        cancel: CancellationToken,
        chain: &ChainDefinition,
        input: Value,
    ) -> EngineResult<ChainRun> {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();

        // The policy instance belongs to this call alone; stateful policies
        // (the round-robin cursor, the seeded generator) start fresh here.
        let strategy = if chain.routing_strategy.is_empty() {
            self.config.default_routing.as_str()
        } else {
            chain.routing_strategy.as_str()
        };
        let resolver = ResolverPolicy::parse(strategy, self.config.resolver_seed)?;

        validate_chain(chain)?;

        let mut vars: HashMap<String, Value> = HashMap::new();
        vars.insert("input".to_string(), input.clone());

        let mut state: Vec<CapturedStateUnit> = Vec::new();
        let mut current: &ChainTask = &chain.tasks[0];
        let mut payload = input;

        info!(execution_id = %execution_id, tasks = chain.tasks.len(), "starting chain execution");

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            if matches!(payload, Value::String(_)) && !current.template.is_empty() {
                let rendered = render(&current.template, &vars).map_err(|e| {
                    EngineError::Template {
                        task_id: current.id.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if rendered.is_empty() {
                    return Err(EngineError::Template {
                        task_id: current.id.clone(),
                        reason: "template rendered empty string".to_string(),
                    });
                }
                payload = Value::String(rendered);
            }

            let deadline = match current.deadline()? {
                Some(limit) => Some(limit),
                None => self.config.default_timeout(),
            };
            let input_type = payload.data_type();
            let visit_start = Instant::now();
            let max_retries = current.retry_on_failure;

            let mut success: Option<TaskOutput> = None;
            let mut last_error: Option<EngineError> = None;

            for retry in 0..=max_retries {
                self.tracker
                    .publish(ActivityEvent::TaskAttemptStarted {
                        execution_id,
                        task_id: current.id.clone(),
                        task_type: current.task_type.to_string(),
                        retry,
                    })
                    .await;

                match self
                    .run_attempt(
                        &cancel,
                        deadline,
                        started_at,
                        &resolver,
                        current,
                        payload.clone(),
                    )
                    .await
                {
                    Ok(output) => {
                        debug!(task_id = %current.id, retry, "attempt succeeded");
                        self.tracker
                            .publish(ActivityEvent::TaskAttemptSucceeded {
                                execution_id,
                                task_id: current.id.clone(),
                                output: output.value.as_display_string(),
                            })
                            .await;
                        success = Some(output);
                        break;
                    }
                    Err(err) => {
                        warn!(task_id = %current.id, retry, error = %err, "attempt failed");
                        self.tracker
                            .publish(ActivityEvent::TaskAttemptFailed {
                                execution_id,
                                task_id: current.id.clone(),
                                retry,
                                error: err.to_string(),
                            })
                            .await;
                        let fatal = err.is_fatal_in_attempt();
                        last_error = Some(err);
                        if fatal {
                            break;
                        }
                    }
                }
            }

            let output = match success {
                Some(output) => output,
                None => {
                    let err = last_error.expect("failed attempt loop must record an error");
                    state.push(CapturedStateUnit {
                        task_id: current.id.clone(),
                        task_type: current.task_type,
                        input_type,
                        output_type: input_type,
                        transition: String::new(),
                        duration: visit_start.elapsed(),
                        error: Some(ErrorResponse {
                            error: err.to_string(),
                        }),
                    });

                    if err.is_fatal_in_attempt() {
                        return Err(err);
                    }

                    if !current.transition.on_failure.is_empty() {
                        let previous = current.id.clone();
                        let target = current.transition.on_failure.clone();
                        current = chain.find_task(&target).ok_or_else(|| {
                            EngineError::Transition(format!(
                                "error transition target not found: {}",
                                target
                            ))
                        })?;
                        self.tracker
                            .publish(ActivityEvent::NextTask {
                                execution_id,
                                from_task: previous,
                                to_task: target,
                                reason: TransitionReason::Error,
                            })
                            .await;
                        continue;
                    }

                    return Err(EngineError::TaskFailed {
                        task_id: current.id.clone(),
                        retries: max_retries,
                        reason: err.to_string(),
                    });
                }
            };

            state.push(CapturedStateUnit {
                task_id: current.id.clone(),
                task_type: current.task_type,
                input_type,
                output_type: output.value.data_type(),
                transition: output.transition_eval.clone(),
                duration: visit_start.elapsed(),
                error: None,
            });

            vars.insert("previous_output".to_string(), output.value.clone());
            vars.insert(current.id.clone(), output.value.clone());

            if !current.print.is_empty() {
                let message = render(&current.print, &vars).map_err(|e| EngineError::Template {
                    task_id: current.id.clone(),
                    reason: format!("print template error: {}", e),
                })?;
                self.tracker
                    .publish(ActivityEvent::TaskPrinted {
                        execution_id,
                        task_id: current.id.clone(),
                        message,
                    })
                    .await;
            }

            let next_id = evaluate_transitions(&current.transition, &output.transition_eval)
                .map_err(|err| match err {
                    EngineError::Transition(msg) => {
                        EngineError::Transition(format!("task {}: {}", current.id, msg))
                    }
                    other => other,
                })?;

            if next_id.is_empty() || next_id == TERM_END {
                info!(execution_id = %execution_id, visits = state.len(), "chain completed");
                self.tracker
                    .publish(ActivityEvent::ChainCompleted {
                        execution_id,
                        chain_id: chain.id.clone(),
                        final_output: output.value.as_display_string(),
                    })
                    .await;
                return Ok(ChainRun {
                    execution_id,
                    output: output.value,
                    state,
                });
            }

            self.tracker
                .publish(ActivityEvent::NextTask {
                    execution_id,
                    from_task: current.id.clone(),
                    to_task: next_id.clone(),
                    reason: TransitionReason::Match,
                })
                .await;

            current = chain.find_task(&next_id).ok_or_else(|| {
                EngineError::Transition(format!("next task {} not found", next_id))
            })?;
            payload = output.value;
        }
    }
}
