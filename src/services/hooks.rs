//! Hook registry.
//!
//! Maps hook names to runner implementations and dispatches calls from
//! `hook` tasks. Unknown names come back with their own status so the
//! engine can fail fast on misconfigured chains instead of retrying.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::errors::EngineResult;
use crate::domain::models::chain::HookCall;
use crate::domain::models::value::Value;
use crate::domain::ports::hook::{HookDispatch, HookOutcome, HookRunner, HookStatus};

/// Name-keyed registry of hook runners.
pub struct HookRegistry {
    hooks: HashMap<String, Arc<dyn HookRunner>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Register a runner under its own name. The last registration wins.
    pub fn register(&mut self, runner: Arc<dyn HookRunner>) {
        let name = runner.name().to_string();
        debug!(hook = %name, "registering hook");
        self.hooks.insert(name, runner);
    }

    pub fn with_hook(mut self, runner: Arc<dyn HookRunner>) -> Self {
        self.register(runner);
        self
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HookDispatch for HookRegistry {
    async fn supports(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hooks.keys().cloned().collect();
        names.sort();
        names
    }

    async fn exec(
        &self,
        started_at: DateTime<Utc>,
        input: Value,
        transition: &str,
        call: &HookCall,
    ) -> EngineResult<HookOutcome> {
        match self.hooks.get(&call.name) {
            Some(runner) => runner.run(started_at, input, transition, &call.args).await,
            None => {
                warn!(hook = %call.name, "hook provider not registered");
                Ok(HookOutcome {
                    status: HookStatus::UnknownProvider,
                    output: input,
                    transition_eval: String::new(),
                })
            }
        }
    }
}

/// Reference hook: returns its input unchanged.
///
/// Useful as a chain no-op side effect and as the baseline runner in tests.
pub struct EchoHook;

#[async_trait]
impl HookRunner for EchoHook {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(
        &self,
        _started_at: DateTime<Utc>,
        input: Value,
        _transition: &str,
        _args: &BTreeMap<String, String>,
    ) -> EngineResult<HookOutcome> {
        let eval = input.as_display_string();
        Ok(HookOutcome::success(input, eval))
    }
}
