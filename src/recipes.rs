//! Ready-made chain definitions for the chat pipelines.
//!
//! These builders produce the standard hook-driven chat chains the
//! surrounding system seeds into its chain store on first start.

use crate::domain::models::chain::{
    BranchOperator, ChainDefinition, ChainTask, HookCall, TaskTransition, TaskType,
    TransitionBranch, TERM_END,
};

pub const CHAIN_KEY_PREFIX: &str = "chain:";
pub const STANDARD_CHAT_CHAIN_ID: &str = "chat_chain";
pub const OPENAI_CHAT_CHAIN_ID: &str = "openai_chat_chain";

/// Store key for a chain id.
pub fn chain_key(id: &str) -> String {
    format!("{}{}", CHAIN_KEY_PREFIX, id)
}

/// Parameters for the standard chat chain.
#[derive(Debug, Clone, Default)]
pub struct ChatChainParams {
    pub subject_id: String,
    pub preferred_models: Vec<String>,
    pub provider: String,
}

fn hook_task(id: &str, description: &str, hook: HookCall, goto_task: &str) -> ChainTask {
    let mut task = ChainTask::new(id, TaskType::Hook)
        .with_hook(hook)
        .with_transition(TaskTransition::branches(vec![TransitionBranch::default_to(
            goto_task,
        )]));
    task.description = description.to_string();
    task
}

/// Chat pipeline: append the user message, add system instructions, route
/// commands, run inference, and persist the conversation.
pub fn build_chat_chain(params: ChatChainParams) -> ChainDefinition {
    let mut mux = hook_task(
        "mux_input",
        "Check for commands in the incoming message",
        HookCall::new("command_router").with_arg("subject_id", &params.subject_id),
        "execute_model_on_messages",
    );
    // Commands short-circuit inference and go straight to persistence.
    mux.transition.branches.push(TransitionBranch::new(
        BranchOperator::Equals,
        "echo",
        "persist_messages",
    ));

    ChainDefinition {
        id: STANDARD_CHAT_CHAIN_ID.to_string(),
        description: "Standard chat processing pipeline with hooks".to_string(),
        routing_strategy: String::new(),
        tasks: vec![
            hook_task(
                "append_user_message",
                "Append the user message to chat history",
                HookCall::new("append_user_message").with_arg("subject_id", &params.subject_id),
                "preappend_message_to_history",
            ),
            hook_task(
                "preappend_message_to_history",
                "Add system level instructions to chat history",
                HookCall::new("preappend_message_to_history")
                    .with_arg("role", "system")
                    .with_arg("message", "You are a helpful assistant."),
                "mux_input",
            ),
            mux,
            hook_task(
                "execute_model_on_messages",
                "Run inference using the selected model",
                HookCall::new("execute_model_on_messages")
                    .with_arg("subject_id", &params.subject_id)
                    .with_arg("models", params.preferred_models.join(","))
                    .with_arg("provider", &params.provider),
                "persist_messages",
            ),
            hook_task(
                "persist_messages",
                "Persist the conversation",
                HookCall::new("persist_messages").with_arg("subject_id", &params.subject_id),
                TERM_END,
            ),
        ],
    }
}

/// OpenAI-style pipeline: convert the request into internal history, run
/// inference, and convert back.
pub fn build_openai_chat_chain(model: &str, provider: &str) -> ChainDefinition {
    ChainDefinition {
        id: OPENAI_CHAT_CHAIN_ID.to_string(),
        description: "OpenAI style chat processing pipeline with hooks".to_string(),
        routing_strategy: String::new(),
        tasks: vec![
            hook_task(
                "convert_openai_to_history",
                "Convert the OpenAI request to internal history",
                HookCall::new("convert_openai_to_history"),
                "execute_model_on_messages",
            ),
            hook_task(
                "execute_model_on_messages",
                "Run inference using the selected model",
                HookCall::new("execute_model_on_messages")
                    .with_arg("model", model)
                    .with_arg("provider", provider),
                "convert_history_to_openai",
            ),
            hook_task(
                "convert_history_to_openai",
                "Convert chat history to an OpenAI response",
                HookCall::new("convert_history_to_openai").with_arg("model", model),
                TERM_END,
            ),
        ],
    }
}

/// Single-task chain appending an instruction message to a subject's history.
pub fn build_append_instruction_chain(subject_id: &str) -> ChainDefinition {
    ChainDefinition {
        id: "append_instruction".to_string(),
        description: "Append an instruction message to chat history".to_string(),
        routing_strategy: String::new(),
        tasks: vec![hook_task(
            "append_system_message",
            "Append an instruction message to chat history",
            HookCall::new("append_system_message").with_arg("subject_id", subject_id),
            TERM_END,
        )],
    }
}
