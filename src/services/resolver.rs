//! Runtime resolver policies.
//!
//! A policy picks one model runtime out of a pool of candidates. The
//! engine builds a fresh instance for every execution, so a policy's
//! state (the round-robin cursor, the random generator) never leaks
//! between runs; the state is still interior and concurrency safe, since
//! selection happens behind a shared reference.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{EngineError, EngineResult};

/// A candidate model runtime with the health and latency metadata the
/// policies select on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub id: String,
    pub model: String,
    pub healthy: bool,
    pub avg_latency_ms: u64,
}

impl RuntimeState {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            healthy: true,
            avg_latency_ms: 0,
        }
    }

    pub fn with_latency(mut self, avg_latency_ms: u64) -> Self {
        self.avg_latency_ms = avg_latency_ms;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }
}

/// Selection strategy over the runtime pool.
pub enum ResolverPolicy {
    Random(Mutex<StdRng>),
    RoundRobin(AtomicUsize),
    LowLatency,
    /// Pins a session to a stable candidate via a hash of the session id.
    Sticky(String),
}

impl std::fmt::Debug for ResolverPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Random(_) => write!(f, "Random"),
            Self::RoundRobin(cursor) => {
                write!(f, "RoundRobin({})", cursor.load(Ordering::Relaxed))
            }
            Self::LowLatency => write!(f, "LowLatency"),
            Self::Sticky(session) => write!(f, "Sticky({})", session),
        }
    }
}

impl ResolverPolicy {
    /// Unseeded random policy, the engine default.
    pub fn random() -> Self {
        Self::Random(Mutex::new(StdRng::from_entropy()))
    }

    /// Random policy with a fixed seed, for reproducible executions.
    pub fn random_seeded(seed: u64) -> Self {
        Self::Random(Mutex::new(StdRng::seed_from_u64(seed)))
    }

    pub fn round_robin() -> Self {
        Self::RoundRobin(AtomicUsize::new(0))
    }

    /// Parse a routing strategy name from a chain definition.
    ///
    /// Accepts `random`, `round_robin`, `low_latency`, and
    /// `sticky:<session_id>`. A seed, when given, applies to `random`.
    pub fn parse(name: &str, seed: Option<u64>) -> EngineResult<Self> {
        match name {
            "random" => Ok(match seed {
                Some(seed) => Self::random_seeded(seed),
                None => Self::random(),
            }),
            "round_robin" => Ok(Self::round_robin()),
            "low_latency" => Ok(Self::LowLatency),
            _ => {
                if let Some(session) = name.strip_prefix("sticky:") {
                    if session.is_empty() {
                        return Err(EngineError::Resolver(
                            "sticky policy requires a session id".to_string(),
                        ));
                    }
                    return Ok(Self::Sticky(session.to_string()));
                }
                Err(EngineError::Resolver(format!(
                    "unknown routing strategy: {}",
                    name
                )))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Random(_) => "random",
            Self::RoundRobin(_) => "round_robin",
            Self::LowLatency => "low_latency",
            Self::Sticky(_) => "sticky",
        }
    }

    /// Select one healthy candidate from the pool.
    pub fn select<'a>(&self, candidates: &'a [RuntimeState]) -> EngineResult<&'a RuntimeState> {
        let healthy: Vec<&RuntimeState> = candidates.iter().filter(|c| c.healthy).collect();
        if healthy.is_empty() {
            return Err(EngineError::Resolver(
                "no healthy runtime candidates".to_string(),
            ));
        }

        let picked = match self {
            Self::Random(rng) => {
                let index = {
                    let mut rng = rng.lock().expect("resolver rng poisoned");
                    rng.gen_range(0..healthy.len())
                };
                healthy[index]
            }
            Self::RoundRobin(cursor) => {
                let index = cursor.fetch_add(1, Ordering::Relaxed) % healthy.len();
                healthy[index]
            }
            Self::LowLatency => healthy
                .iter()
                .copied()
                .min_by_key(|c| c.avg_latency_ms)
                .expect("healthy candidates are non-empty"),
            Self::Sticky(session) => {
                let mut hasher = DefaultHasher::new();
                session.hash(&mut hasher);
                healthy[(hasher.finish() as usize) % healthy.len()]
            }
        };

        debug!(policy = self.name(), runtime = %picked.id, model = %picked.model, "runtime selected");
        Ok(picked)
    }
}
