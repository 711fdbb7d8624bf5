//! Run inputs, outputs, limits, and errors.

use ledgermind_core::error::ProviderError;
use ledgermind_core::message::{ContentBlock, Message, TokenUsage};
use ledgermind_core::trace::{PendingAction, ToolExecution, Trace};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Callback invoked with streamed text chunks. The final invocation passes
/// an empty chunk with `done = true`.
pub type StreamCallback = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Execution limits applied to a run.
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Maximum loop turns before the run is aborted.
    pub max_turns: u32,

    /// Maximum response tokens per model call. Falls back to the engine
    /// default when unset.
    pub max_tokens: Option<u32>,

    /// Wall-clock bound for the whole run.
    pub timeout: Option<Duration>,

    /// Whether write operations may suspend for confirmation in this
    /// context. Non-interactive callers (schedulers, webhooks) set false.
    pub can_confirm: bool,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_turns: 20,
            max_tokens: None,
            timeout: None,
            can_confirm: true,
        }
    }
}

/// Identity and policy context for the principal a run belongs to.
#[derive(Debug, Clone, Default)]
pub struct OwnerContext {
    pub owner_id: String,
    pub conversation_id: String,
    pub limits: Option<ExecutionLimits>,

    /// Links this run into an audit chain of nested agent invocations.
    pub audit_parent_id: Option<String>,
}

impl OwnerContext {
    pub fn new(owner_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            conversation_id: conversation_id.into(),
            limits: None,
            audit_parent_id: None,
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// The input to an agent run.
#[derive(Clone, Default)]
pub struct RunInput {
    /// The user's message to process. May be empty on confirmed resumption.
    pub user_message: String,

    pub owner: OwnerContext,

    /// Previous messages in the conversation, replayed verbatim.
    pub history: Vec<Message>,

    /// System prompt override; the built-in default applies when unset.
    pub system_prompt: Option<String>,

    /// Model override.
    pub model: Option<String>,

    /// Max response tokens override.
    pub max_tokens: Option<u32>,

    /// Identifies the agent in audit records. Defaults to "default".
    pub agent_name: Option<String>,

    /// Allow-list filtering which registered tools the model sees.
    /// Empty means all.
    pub available_tools: Vec<String>,

    /// Optional streaming callback for incremental text.
    pub stream_callback: Option<StreamCallback>,
}

impl RunInput {
    pub fn new(user_message: impl Into<String>, owner: OwnerContext) -> Self {
        Self {
            user_message: user_message.into(),
            owner,
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for RunInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunInput")
            .field("user_message", &self.user_message)
            .field("owner", &self.owner)
            .field("history_len", &self.history.len())
            .field("model", &self.model)
            .field("available_tools", &self.available_tools)
            .field("streaming", &self.stream_callback.is_some())
            .finish()
    }
}

/// The output of a successful run.
#[derive(Debug, Clone)]
pub enum RunOutput {
    /// The agent produced a final text response.
    Complete {
        text: String,
        traces: Vec<Trace>,
        tools_used: Vec<ToolExecution>,
        response_blocks: Vec<ContentBlock>,
        tokens_used: TokenUsage,
    },

    /// A write operation suspended the run pending user approval.
    ConfirmationNeeded {
        text: String,
        pending_action: PendingAction,
        traces: Vec<Trace>,
        tools_used: Vec<ToolExecution>,
        response_blocks: Vec<ContentBlock>,
        tokens_used: TokenUsage,
    },
}

impl RunOutput {
    pub fn text(&self) -> &str {
        match self {
            RunOutput::Complete { text, .. } => text,
            RunOutput::ConfirmationNeeded { text, .. } => text,
        }
    }

    pub fn traces(&self) -> &[Trace] {
        match self {
            RunOutput::Complete { traces, .. } => traces,
            RunOutput::ConfirmationNeeded { traces, .. } => traces,
        }
    }

    pub fn tokens_used(&self) -> TokenUsage {
        match self {
            RunOutput::Complete { tokens_used, .. } => *tokens_used,
            RunOutput::ConfirmationNeeded { tokens_used, .. } => *tokens_used,
        }
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        match self {
            RunOutput::Complete { .. } => None,
            RunOutput::ConfirmationNeeded { pending_action, .. } => Some(pending_action),
        }
    }
}

/// A run-aborting error, carrying the token usage accumulated before the
/// abort. Per-tool failures never reach this type — they are surfaced to
/// the model as error tool_results and the loop continues.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct RunError {
    pub kind: RunErrorKind,
    pub tokens_used: TokenUsage,
}

impl RunError {
    pub fn new(kind: RunErrorKind, tokens_used: TokenUsage) -> Self {
        Self { kind, tokens_used }
    }
}

#[derive(Debug, Error)]
pub enum RunErrorKind {
    /// Guardrails rejected the run before any model call.
    #[error("request blocked: {0}")]
    AdmissionDenied(String),

    #[error("exceeded maximum turns ({0})")]
    TurnLimitExceeded(u32),

    #[error("timed out")]
    Deadline,

    #[error("model provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A confirmed resumption referenced a tool no longer registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_values() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.max_turns, 20);
        assert!(limits.can_confirm);
        assert!(limits.timeout.is_none());
        assert!(limits.max_tokens.is_none());
    }

    #[test]
    fn turn_limit_error_message_is_exact() {
        let err = RunError::new(RunErrorKind::TurnLimitExceeded(2), TokenUsage::default());
        assert_eq!(err.to_string(), "exceeded maximum turns (2)");
    }

    #[test]
    fn deadline_error_message_is_exact() {
        let err = RunError::new(RunErrorKind::Deadline, TokenUsage::default());
        assert_eq!(err.to_string(), "timed out");
    }

    #[test]
    fn run_error_carries_partial_usage() {
        let err = RunError::new(
            RunErrorKind::TurnLimitExceeded(2),
            TokenUsage {
                input_tokens: 20,
                output_tokens: 10,
            },
        );
        assert_eq!(err.tokens_used.input_tokens, 20);
        assert_eq!(err.tokens_used.output_tokens, 10);
    }
}
