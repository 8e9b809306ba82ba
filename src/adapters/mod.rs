//! Adapters: in-memory and mock implementations of the domain ports.

pub mod memory_store;
pub mod mock_exec;
pub mod mock_model;

pub use memory_store::MemoryChainStore;
pub use mock_exec::MockTaskExecutor;
pub use mock_model::MockModelClient;
