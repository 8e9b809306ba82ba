//! Model client port.
//!
//! The engine never speaks to an LLM runtime directly. Prompt tasks resolve
//! a runtime candidate through the resolver policy and hand the prompt to
//! this boundary; the production implementation lives with the runtime
//! pool, tests use `adapters::mock_model::MockModelClient`.

use async_trait::async_trait;

use crate::domain::errors::EngineResult;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a prompt to the named model and return its raw text response.
    async fn prompt(&self, model: &str, prompt: &str) -> EngineResult<String>;
}
