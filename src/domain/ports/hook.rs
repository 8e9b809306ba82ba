//! Hook dispatch port.
//!
//! Hooks are named side effects invoked by tasks of type `hook`. An unknown
//! hook name is reported with its own status so the engine can treat it as
//! a configuration error rather than a retriable failure.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::EngineResult;
use crate::domain::models::chain::HookCall;
use crate::domain::models::value::Value;

/// Outcome status of a hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Success = 1,
    UnknownProvider = 2,
    Error = 3,
}

impl HookStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// What a hook produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HookOutcome {
    pub status: HookStatus,
    pub output: Value,
    pub transition_eval: String,
}

impl HookOutcome {
    pub fn success(output: Value, transition_eval: impl Into<String>) -> Self {
        Self {
            status: HookStatus::Success,
            output,
            transition_eval: transition_eval.into(),
        }
    }
}

/// A single named hook implementation.
#[async_trait]
pub trait HookRunner: Send + Sync {
    fn name(&self) -> &str;

    /// Run the side effect. `transition` carries the calling task's default
    /// transition target so hooks that steer control flow know where the
    /// chain goes if they return an unmatched eval.
    async fn run(
        &self,
        started_at: DateTime<Utc>,
        input: Value,
        transition: &str,
        args: &BTreeMap<String, String>,
    ) -> EngineResult<HookOutcome>;
}

/// Registry-level dispatch over all known hooks.
#[async_trait]
pub trait HookDispatch: Send + Sync {
    /// Names of every hook this dispatcher can execute.
    async fn supports(&self) -> Vec<String>;

    /// Dispatch a hook call by name. Unknown names yield an outcome with
    /// `HookStatus::UnknownProvider` rather than an `Err`.
    async fn exec(
        &self,
        started_at: DateTime<Utc>,
        input: Value,
        transition: &str,
        call: &HookCall,
    ) -> EngineResult<HookOutcome>;
}
