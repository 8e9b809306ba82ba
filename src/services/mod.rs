//! Services layer: the engine and its collaborators.

pub mod config;
pub mod engine;
pub mod executor;
pub mod hooks;
pub mod resolver;
pub mod template;
pub mod tracker;
pub mod transition;

pub use config::{ConfigError, EngineConfig};
pub use engine::{ChainEnv, ChainRun, SimpleEnv};
pub use executor::StandardTaskExecutor;
pub use hooks::{EchoHook, HookRegistry};
pub use resolver::{ResolverPolicy, RuntimeState};
pub use tracker::{ActivityEvent, ActivityTracker, NoopTracker, RecordingTracker, TrackerBus};
