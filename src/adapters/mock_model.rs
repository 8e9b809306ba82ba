//! Mock model client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::ports::model_client::ModelClient;

/// One recorded prompt call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPrompt {
    pub model: String,
    pub prompt: String,
}

/// Scriptable model client. Queued responses are served first, then the
/// default response repeats.
pub struct MockModelClient {
    default_response: String,
    queued: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
}

impl MockModelClient {
    pub fn returning(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            queued: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: impl Into<String>) {
        self.queued
            .lock()
            .expect("mock queue poisoned")
            .push_back(Ok(response.into()));
    }

    pub fn queue_error(&self, message: impl Into<String>) {
        self.queued
            .lock()
            .expect("mock queue poisoned")
            .push_back(Err(message.into()));
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts.lock().expect("mock prompts poisoned").clone()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn prompt(&self, model: &str, prompt: &str) -> EngineResult<String> {
        self.prompts
            .lock()
            .expect("mock prompts poisoned")
            .push(RecordedPrompt {
                model: model.to_string(),
                prompt: prompt.to_string(),
            });

        let next = self.queued.lock().expect("mock queue poisoned").pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(EngineError::Model(message)),
            None => Ok(self.default_response.clone()),
        }
    }
}
