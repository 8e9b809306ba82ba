//! Declarative chain, task, and transition definitions.
//!
//! A chain is an ordered list of tasks whose edges are chosen at runtime by
//! comparing each task's transition eval against declared branches. The
//! structures here round-trip the persisted JSON format unchanged; chains
//! are stored by an external key-value collaborator under `chain:<id>`.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{EngineError, EngineResult};

/// Reserved task id that terminates execution successfully.
pub const TERM_END: &str = "end";

/// The kinds of work a single task can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    RawString,
    PromptToString,
    PromptToNumber,
    PromptToScore,
    PromptToRange,
    Hook,
    ParseNumber,
    ParseScore,
    ParseRange,
    ConditionKey,
    Noop,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RawString => "raw_string",
            Self::PromptToString => "prompt_to_string",
            Self::PromptToNumber => "prompt_to_number",
            Self::PromptToScore => "prompt_to_score",
            Self::PromptToRange => "prompt_to_range",
            Self::Hook => "hook",
            Self::ParseNumber => "parse_number",
            Self::ParseScore => "parse_score",
            Self::ParseRange => "parse_range",
            Self::ConditionKey => "condition_key",
            Self::Noop => "noop",
        };
        write!(f, "{}", name)
    }
}

/// Comparison operators usable in transition branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    GreaterThan,
    LessThan,
    InRange,
    Default,
}

impl std::fmt::Display for BranchOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::InRange => "in_range",
            Self::Default => "default",
        };
        write!(f, "{}", name)
    }
}

/// One candidate edge out of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionBranch {
    pub operator: BranchOperator,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub when: String,
    #[serde(rename = "goto")]
    pub goto_task: String,
}

impl TransitionBranch {
    pub fn new(operator: BranchOperator, when: impl Into<String>, goto_task: impl Into<String>) -> Self {
        Self {
            operator,
            when: when.into(),
            goto_task: goto_task.into(),
        }
    }

    /// Shorthand for the catch-all branch.
    pub fn default_to(goto_task: impl Into<String>) -> Self {
        Self::new(BranchOperator::Default, "", goto_task)
    }
}

/// Ordered branch list plus the optional error edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTransition {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_failure: String,
    #[serde(default)]
    pub branches: Vec<TransitionBranch>,
}

impl TaskTransition {
    pub fn branches(branches: Vec<TransitionBranch>) -> Self {
        Self {
            on_failure: String::new(),
            branches,
        }
    }

    /// Target of the first `default` branch, empty if none is declared.
    pub fn default_goto(&self) -> &str {
        self.branches
            .iter()
            .find(|b| b.operator == BranchOperator::Default)
            .map(|b| b.goto_task.as_str())
            .unwrap_or("")
    }
}

/// A named side-effect invocation carried by `hook` tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookCall {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

impl HookCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// A single step in a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTask {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Prompt template rendered against the execution scope when the
    /// incoming payload is a string.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookCall>,
    /// Per-attempt deadline as a duration string such as `"30s"`.
    /// Empty means the caller's deadline alone applies.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timeout: String,
    #[serde(default)]
    pub retry_on_failure: u32,
    /// Template rendered after success and emitted to the activity tracker.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub print: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub valid_conditions: BTreeMap<String, bool>,
    #[serde(default)]
    pub transition: TaskTransition,
}

impl ChainTask {
    pub fn new(id: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            task_type,
            template: String::new(),
            hook: None,
            timeout: String::new(),
            retry_on_failure: 0,
            print: String::new(),
            valid_conditions: BTreeMap::new(),
            transition: TaskTransition::default(),
        }
    }

    pub fn with_transition(mut self, transition: TaskTransition) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_hook(mut self, hook: HookCall) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Parsed per-attempt deadline, `None` when no timeout is declared.
    pub fn deadline(&self) -> EngineResult<Option<Duration>> {
        if self.timeout.is_empty() {
            return Ok(None);
        }
        parse_duration(&self.timeout)
            .map(Some)
            .map_err(|reason| {
                EngineError::Validation(format!("task {}: invalid timeout: {}", self.id, reason))
            })
    }
}

/// A complete executable chain definition.
///
/// The task at index 0 is the entry point. `routing_strategy` names a
/// resolver policy; empty means the engine default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub routing_strategy: String,
    pub tasks: Vec<ChainTask>,
}

impl ChainDefinition {
    pub fn find_task(&self, id: &str) -> Option<&ChainTask> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// Parse a duration string in the `"250ms"` / `"30s"` / `"5m"` / `"2h"` form.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| format!("missing unit in duration '{}'", s))?;
    let (number, unit) = s.split_at(split);
    let amount: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration value '{}'", s))?;
    let millis = match unit {
        "ms" => amount,
        "s" => amount * 1_000.0,
        "m" => amount * 60_000.0,
        "h" => amount * 3_600_000.0,
        _ => return Err(format!("unknown duration unit '{}' in '{}'", unit, s)),
    };
    if millis < 0.0 {
        return Err(format!("negative duration '{}'", s));
    }
    Ok(Duration::from_millis(millis.round() as u64))
}

/// Statically validate a chain before execution.
///
/// Rejects empty chains, empty or reserved task ids, duplicate ids, and
/// branch or failure targets that resolve to no task.
pub fn validate_chain(chain: &ChainDefinition) -> EngineResult<()> {
    if chain.tasks.is_empty() {
        return Err(EngineError::Validation("chain has no tasks".to_string()));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for task in &chain.tasks {
        if task.id.is_empty() {
            return Err(EngineError::Validation("task ID cannot be empty".to_string()));
        }
        if task.id == TERM_END {
            return Err(EngineError::Validation(format!(
                "task ID cannot be '{}'",
                TERM_END
            )));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(EngineError::Validation(format!(
                "duplicate task ID '{}'",
                task.id
            )));
        }
    }

    for task in &chain.tasks {
        for branch in &task.transition.branches {
            if branch.goto_task != TERM_END && !seen.contains(branch.goto_task.as_str()) {
                return Err(EngineError::Validation(format!(
                    "task {}: transition target '{}' does not exist",
                    task.id, branch.goto_task
                )));
            }
        }
        let on_failure = task.transition.on_failure.as_str();
        if !on_failure.is_empty() && on_failure != TERM_END && !seen.contains(on_failure) {
            return Err(EngineError::Validation(format!(
                "task {}: on_failure target '{}' does not exist",
                task.id, on_failure
            )));
        }
    }

    Ok(())
}
