//! Chain persistence port.
//!
//! Chain definitions live in an external key-value store under
//! `chain:<id>`. The engine itself never touches this interface; it exists
//! for the surrounding system and for round-trip coverage in tests.

use async_trait::async_trait;

use crate::domain::errors::EngineResult;
use crate::domain::models::chain::ChainDefinition;

#[async_trait]
pub trait ChainStore: Send + Sync {
    async fn put_chain(&self, chain: &ChainDefinition) -> EngineResult<()>;

    async fn get_chain(&self, id: &str) -> EngineResult<Option<ChainDefinition>>;

    /// All stored chains, ordered by id.
    async fn list_chains(&self) -> EngineResult<Vec<ChainDefinition>>;

    async fn delete_chain(&self, id: &str) -> EngineResult<()>;
}
