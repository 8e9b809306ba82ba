//! Transition evaluation over task outputs.
//!
//! Branches are checked in declared order; `default` branches are only
//! consulted after every explicit branch has failed to match, regardless
//! of where they appear in the list.

use std::num::ParseFloatError;

use tracing::debug;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::chain::{BranchOperator, TaskTransition};

/// A parsed numeric operand. Integer parsing is attempted first and the
/// variant records which form succeeded; downstream tagging of numeric
/// outputs relies on this order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Parse a string as an integer first, falling back to float.
pub fn parse_number(s: &str) -> Result<Number, ParseFloatError> {
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Number::Int(i));
    }
    s.parse::<f64>().map(Number::Float)
}

/// Pick the next task id for the given eval string.
///
/// Returns `TERM_END` or a task id; the caller resolves the id. An eval
/// that matches no branch and has no default is a fatal transition error.
pub fn evaluate_transitions(transition: &TaskTransition, eval: &str) -> EngineResult<String> {
    for branch in &transition.branches {
        if branch.operator == BranchOperator::Default {
            continue;
        }
        if compare(branch.operator, eval, &branch.when)? {
            debug!(operator = %branch.operator, when = %branch.when, goto = %branch.goto_task, "transition matched");
            return Ok(branch.goto_task.clone());
        }
    }

    for branch in &transition.branches {
        if branch.operator == BranchOperator::Default {
            return Ok(branch.goto_task.clone());
        }
    }

    Err(EngineError::Transition(
        "no matching transition found".to_string(),
    ))
}

/// Apply a comparison operator to an eval string and a branch literal.
pub fn compare(operator: BranchOperator, response: &str, when: &str) -> EngineResult<bool> {
    match operator {
        BranchOperator::Equals => Ok(response == when),
        BranchOperator::Contains => Ok(response.contains(when)),
        BranchOperator::StartsWith => Ok(response.starts_with(when)),
        BranchOperator::EndsWith => Ok(response.ends_with(when)),
        BranchOperator::Gt | BranchOperator::GreaterThan => {
            let response = parse_operand(response)?;
            let target = parse_operand(when)?;
            Ok(response.as_f64() > target.as_f64())
        }
        BranchOperator::Lt | BranchOperator::LessThan => {
            let response = parse_operand(response)?;
            let target = parse_operand(when)?;
            Ok(response.as_f64() < target.as_f64())
        }
        BranchOperator::InRange => {
            let (lower, upper) = parse_range_literal(when)?;
            let response = parse_operand(response)?;
            Ok(response.as_f64() >= lower.as_f64() && response.as_f64() <= upper.as_f64())
        }
        BranchOperator::Default => Err(EngineError::Transition(
            "unsupported operator: default".to_string(),
        )),
    }
}

/// Parse a `"lo-hi"` range literal with trimmed bounds.
pub fn parse_range_literal(when: &str) -> EngineResult<(Number, Number)> {
    let (lower, upper) = when.split_once('-').ok_or_else(|| {
        EngineError::Transition(format!("invalid between range format: {}", when))
    })?;
    let lower = parse_number(lower.trim())
        .map_err(|e| EngineError::Transition(format!("invalid lower bound: {}", e)))?;
    let upper = parse_number(upper.trim())
        .map_err(|e| EngineError::Transition(format!("invalid upper bound: {}", e)))?;
    Ok((lower, upper))
}

fn parse_operand(s: &str) -> EngineResult<Number> {
    parse_number(s).map_err(|e| {
        EngineError::Transition(format!("cannot compare non-numeric value '{}': {}", s, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::chain::{TransitionBranch, TERM_END};

    #[test]
    fn test_parse_number_int_first() {
        assert_eq!(parse_number("42").unwrap(), Number::Int(42));
        assert_eq!(parse_number("-7").unwrap(), Number::Int(-7));
        assert_eq!(parse_number("42.5").unwrap(), Number::Float(42.5));
        assert!(parse_number("nope").is_err());
    }

    #[test]
    fn test_string_operators() {
        assert!(compare(BranchOperator::Equals, "yes", "yes").unwrap());
        assert!(!compare(BranchOperator::Equals, "yes", "no").unwrap());
        assert!(compare(BranchOperator::Contains, "the answer", "answer").unwrap());
        assert!(compare(BranchOperator::StartsWith, "score: 4", "score").unwrap());
        assert!(compare(BranchOperator::EndsWith, "done!", "!").unwrap());
    }

    #[test]
    fn test_numeric_operators_are_strict() {
        assert!(compare(BranchOperator::Gt, "51", "50").unwrap());
        assert!(!compare(BranchOperator::Gt, "50", "50").unwrap());
        assert!(compare(BranchOperator::LessThan, "49.5", "50").unwrap());
        assert!(!compare(BranchOperator::Lt, "50", "50").unwrap());
        assert!(compare(BranchOperator::Gt, "3", "bad").is_err());
    }

    #[test]
    fn test_in_range_is_inclusive() {
        assert!(compare(BranchOperator::InRange, "0", "0-10").unwrap());
        assert!(compare(BranchOperator::InRange, "10", "0-10").unwrap());
        assert!(compare(BranchOperator::InRange, "5.5", "0 - 10").unwrap());
        assert!(!compare(BranchOperator::InRange, "11", "0-10").unwrap());
        assert!(compare(BranchOperator::InRange, "1", "bad").is_err());
    }

    #[test]
    fn test_first_match_wins_over_default_order() {
        let transition = TaskTransition::branches(vec![
            TransitionBranch::default_to("fallback"),
            TransitionBranch::new(BranchOperator::Equals, "hit", "target"),
        ]);
        assert_eq!(evaluate_transitions(&transition, "hit").unwrap(), "target");
        assert_eq!(evaluate_transitions(&transition, "miss").unwrap(), "fallback");
    }

    #[test]
    fn test_branch_order_among_matches() {
        let transition = TaskTransition::branches(vec![
            TransitionBranch::new(BranchOperator::InRange, "0-10", "lo"),
            TransitionBranch::new(BranchOperator::InRange, "11-50", "mid"),
            TransitionBranch::default_to("hi"),
        ]);
        assert_eq!(evaluate_transitions(&transition, "42").unwrap(), "mid");
        assert_eq!(evaluate_transitions(&transition, "7").unwrap(), "lo");
        assert_eq!(evaluate_transitions(&transition, "99").unwrap(), "hi");
    }

    #[test]
    fn test_no_match_without_default_is_an_error() {
        let transition = TaskTransition::branches(vec![TransitionBranch::new(
            BranchOperator::Equals,
            "x",
            TERM_END,
        )]);
        let err = evaluate_transitions(&transition, "y").unwrap_err();
        assert!(err.to_string().contains("no matching transition"));
    }
}
