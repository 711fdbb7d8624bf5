//! Test support: a scripted model provider.
//!
//! Kept as a regular module so integration tests (and downstream crates
//! exercising the engine) can script full conversations without a live
//! provider.

use ledgermind_core::error::ProviderError;
use ledgermind_core::message::{ContentBlock, TokenUsage};
use ledgermind_core::provider::{ModelProvider, ModelRequest, ModelResponse};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A provider that returns a fixed sequence of scripted responses.
///
/// Each `complete` call pops the next response. Panics when the script is
/// exhausted — more model calls than responses is a test bug. Every request
/// is captured for later inspection.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers once with plain text.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text_response(text)])
    }

    /// A provider that first requests tools, then answers with text.
    pub fn tool_then_answer(
        tool_uses: Vec<ContentBlock>,
        thought: &str,
        answer: &str,
    ) -> Self {
        Self::new(vec![tool_use_response(tool_uses, thought), text_response(answer)])
    }

    /// How many model calls have been made.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The system prompt of the most recent request.
    pub fn last_system(&self) -> Option<String> {
        self.requests.lock().unwrap().last().map(|r| r.system.clone())
    }

    /// The messages of the most recent request.
    pub fn last_messages(&self) -> Vec<ledgermind_core::message::Message> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let response = self.responses.lock().unwrap().pop_front();
        match response {
            Some(r) => Ok(r),
            None => panic!("ScriptedProvider: script exhausted"),
        }
    }
}

/// A text-only response with fixed usage (10 in / 5 out).
pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        content: vec![ContentBlock::text(text)],
        model: "scripted-model".into(),
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// A response carrying tool-use blocks, preceded by optional thought text.
pub fn tool_use_response(tool_uses: Vec<ContentBlock>, thought: &str) -> ModelResponse {
    let mut content = Vec::new();
    if !thought.is_empty() {
        content.push(ContentBlock::text(thought));
    }
    content.extend(tool_uses);
    ModelResponse {
        content,
        model: "scripted-model".into(),
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// Shorthand for a tool-use block with a derived id.
pub fn tool_use(name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::tool_use(format!("toolu_{name}"), name, input)
}
