//! Tagged values flowing between chain tasks.
//!
//! Every inter-task payload carries its own type tag. The engine never
//! reinterprets a payload silently; a task that requires a specific input
//! type rejects anything else with a type mismatch.

use serde::{Deserialize, Serialize};

/// The closed set of payload types tasks can produce or require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Any,
    String,
    Bool,
    Int,
    Float,
    SearchResults,
    Json,
    ChatHistory,
    OpenaiChat,
    OpenaiChatResponse,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::SearchResults => "search_results",
            Self::Json => "json",
            Self::ChatHistory => "chat_history",
            Self::OpenaiChat => "openai_chat",
            Self::OpenaiChatResponse => "openai_chat_response",
        };
        write!(f, "{}", name)
    }
}

/// A single message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Ordered chat history passed between hook tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub messages: Vec<ChatMessage>,
}

/// One result entry from an external search/index collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub distance: f64,
    pub content: String,
}

/// OpenAI-style chat completion request, as produced by ingress hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiChatChoice {
    pub index: u32,
    pub message: ChatMessage,
}

/// OpenAI-style chat completion response, as produced by egress hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiChatResponse {
    pub model: String,
    pub choices: Vec<OpenAiChatChoice>,
}

/// A payload together with its type tag.
///
/// `any` exists only as a declared expectation; concrete payloads always
/// carry one of the other tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    SearchResults(Vec<SearchResult>),
    Json(serde_json::Value),
    ChatHistory(ChatHistory),
    OpenaiChat(OpenAiChatRequest),
    OpenaiChatResponse(OpenAiChatResponse),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::String,
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::SearchResults(_) => DataType::SearchResults,
            Self::Json(_) => DataType::Json,
            Self::ChatHistory(_) => DataType::ChatHistory,
            Self::OpenaiChat(_) => DataType::OpenaiChat,
            Self::OpenaiChatResponse(_) => DataType::OpenaiChatResponse,
        }
    }

    /// Textual projection used by templates, prints, and tracker events.
    pub fn as_display_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::SearchResults(results) => results
                .iter()
                .map(|r| r.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Json(v) => match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            Self::ChatHistory(history) => history
                .messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::OpenaiChat(req) => {
                serde_json::to_string(req).unwrap_or_default()
            }
            Self::OpenaiChatResponse(resp) => {
                serde_json::to_string(resp).unwrap_or_default()
            }
        }
    }

    /// Truthiness used by template conditionals.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::String(s) => !s.is_empty(),
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::SearchResults(results) => !results.is_empty(),
            Self::Json(v) => match v {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::String(s) => !s.is_empty(),
                serde_json::Value::Array(a) => !a.is_empty(),
                serde_json::Value::Object(o) => !o.is_empty(),
                serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            },
            Self::ChatHistory(history) => !history.messages.is_empty(),
            Self::OpenaiChat(_) | Self::OpenaiChatResponse(_) => true,
        }
    }

    /// Items exposed to template iteration, if this value is iterable.
    pub fn iter_items(&self) -> Option<Vec<Value>> {
        match self {
            Self::Json(serde_json::Value::Array(items)) => {
                Some(items.iter().cloned().map(Value::Json).collect())
            }
            Self::SearchResults(results) => Some(
                results
                    .iter()
                    .map(|r| Value::String(r.content.clone()))
                    .collect(),
            ),
            Self::ChatHistory(history) => Some(
                history
                    .messages
                    .iter()
                    .map(|m| Value::String(format!("{}: {}", m.role, m.content)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
