//! Model provider trait — the abstraction over the LLM backend.
//!
//! The engine calls `complete()` (or `stream()` when the caller wants
//! incremental text) without knowing which provider is behind it. The
//! contract is content blocks in, content blocks out, plus token accounting.

use crate::error::ProviderError;
use crate::message::{ContentBlock, Message, TokenUsage};
use crate::tool::WireTool;
use async_trait::async_trait;

/// A request to the model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub max_tokens: u32,

    /// The system prompt, including any memory enrichment.
    pub system: String,

    pub messages: Vec<Message>,
    pub tools: Vec<WireTool>,
}

/// A complete response from the model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Ordered content blocks: text and tool-use requests.
    pub content: Vec<ContentBlock>,

    /// Which model actually responded.
    pub model: String,

    pub usage: TokenUsage,
}

impl ModelResponse {
    /// Concatenate the text blocks of the response.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The tool-use blocks of the response, in emitted order.
    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        self.content
            .iter()
            .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
            .collect()
    }
}

/// One event in a streamed response.
///
/// A stream is a sequence of text deltas closed by exactly one `Completed`
/// event carrying the accumulated response. Accumulation is deterministic:
/// deltas are concatenated in arrival order.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    Completed(ModelResponse),
}

/// The model provider trait.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// A human-readable provider name.
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ModelRequest,
    ) -> std::result::Result<ModelResponse, ProviderError>;

    /// Send a request and get a stream of events.
    ///
    /// Default implementation calls `complete()` and replays it as one text
    /// delta followed by the terminal event.
    async fn stream(
        &self,
        request: ModelRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamEvent, ProviderError>>,
        ProviderError,
    > {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let text = response.text();
        if !text.is_empty() {
            let _ = tx.send(Ok(StreamEvent::TextDelta(text))).await;
        }
        let _ = tx.send(Ok(StreamEvent::Completed(response))).await;
        Ok(rx)
    }
}

/// Drain a stream into the final response, forwarding text deltas.
///
/// Returns the response carried by the terminal event. The callback
/// receives each delta in order; the terminal event never produces a delta.
pub async fn collect_stream(
    mut rx: tokio::sync::mpsc::Receiver<std::result::Result<StreamEvent, ProviderError>>,
    mut on_delta: impl FnMut(&str),
) -> std::result::Result<ModelResponse, ProviderError> {
    let mut completed = None;
    while let Some(event) = rx.recv().await {
        match event? {
            StreamEvent::TextDelta(delta) => on_delta(&delta),
            StreamEvent::Completed(response) => completed = Some(response),
        }
    }
    completed.ok_or_else(|| {
        ProviderError::StreamInterrupted("stream closed without a terminal event".into())
    })
}
