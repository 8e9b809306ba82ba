//! In-memory chain store.
//!
//! Mirrors the external key-value collaborator: definitions are stored as
//! JSON under `chain:<id>`, so everything that goes in has survived a
//! serialization round trip by the time it comes back out.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::EngineResult;
use crate::domain::models::chain::ChainDefinition;
use crate::domain::ports::chain_store::ChainStore;
use crate::recipes::chain_key;

#[derive(Default)]
pub struct MemoryChainStore {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChainStore for MemoryChainStore {
    async fn put_chain(&self, chain: &ChainDefinition) -> EngineResult<()> {
        let encoded = serde_json::to_value(chain)?;
        let mut entries = self.entries.write().await;
        entries.insert(chain_key(&chain.id), encoded);
        Ok(())
    }

    async fn get_chain(&self, id: &str) -> EngineResult<Option<ChainDefinition>> {
        let entries = self.entries.read().await;
        match entries.get(&chain_key(id)) {
            Some(encoded) => Ok(Some(serde_json::from_value(encoded.clone())?)),
            None => Ok(None),
        }
    }

    async fn list_chains(&self) -> EngineResult<Vec<ChainDefinition>> {
        let entries = self.entries.read().await;
        let mut chains = Vec::with_capacity(entries.len());
        for encoded in entries.values() {
            chains.push(serde_json::from_value(encoded.clone())?);
        }
        chains.sort_by(|a: &ChainDefinition, b: &ChainDefinition| a.id.cmp(&b.id));
        Ok(chains)
    }

    async fn delete_chain(&self, id: &str) -> EngineResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&chain_key(id));
        Ok(())
    }
}
