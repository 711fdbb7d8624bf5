//! Per-run conversation state.
//!
//! A session lives for exactly one run: it accumulates messages, traces,
//! and the turn counter while the loop executes, and is reconstituted from
//! persisted history when a confirmed action resumes. Messages and traces
//! are append-only.

use chrono::{DateTime, Utc};
use ledgermind_core::message::{ContentBlock, Message};
use ledgermind_core::provider::ModelResponse;
use ledgermind_core::trace::Trace;

/// Mutable conversation state for a single agent run.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub traces: Vec<Trace>,
    pub turn_count: u32,
}

impl Session {
    pub fn new(owner_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            conversation_id: conversation_id.into(),
            created_at: Utc::now(),
            messages: Vec::new(),
            traces: Vec::new(),
            turn_count: 0,
        }
    }

    /// Replay a prior conversation log verbatim. Produces no traces.
    pub fn restore_history(&mut self, history: &[Message]) {
        self.messages.extend_from_slice(history);
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn add_assistant_text(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Record a full model response: visible text and any tool-use blocks,
    /// with the model's block ids preserved. Resumption after confirmation
    /// matches tool_results against these ids.
    pub fn add_assistant_response(&mut self, response: &ModelResponse) {
        self.messages
            .push(Message::assistant_blocks(response.content.clone()));
    }

    /// Append tool result blocks as a single tool-result message.
    pub fn add_tool_results(&mut self, results: Vec<ContentBlock>) {
        if results.is_empty() {
            return;
        }
        self.messages.push(Message::tool_results(results));
    }

    pub fn add_trace(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    pub fn increment_turn(&mut self) {
        self.turn_count += 1;
    }
}
