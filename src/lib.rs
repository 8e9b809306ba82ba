//! taskchain - a declarative chain execution engine.
//!
//! Chains are directed graphs of tasks whose edges are chosen at runtime
//! by comparing each task's textual output against declared transition
//! branches. Tasks prompt a language model, invoke named hooks, or apply
//! deterministic transforms; the engine handles validation, template
//! rendering, retries, timeouts, transition evaluation, and execution
//! state capture.

pub mod adapters;
pub mod domain;
pub mod recipes;
pub mod services;

pub use domain::{EngineError, EngineResult};
pub use services::{ConfigError, EngineConfig};
