//! Domain models for the taskchain engine.

pub mod chain;
pub mod state;
pub mod value;

pub use chain::{
    parse_duration, validate_chain, BranchOperator, ChainDefinition, ChainTask, HookCall,
    TaskTransition, TaskType, TransitionBranch, TERM_END,
};
pub use state::{CapturedStateUnit, ErrorResponse};
pub use value::{
    ChatHistory, ChatMessage, DataType, OpenAiChatChoice, OpenAiChatRequest, OpenAiChatResponse,
    SearchResult, Value,
};
