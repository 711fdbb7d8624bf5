//! Message and content-block domain types.
//!
//! These are the value objects that flow between the engine and the model
//! provider: a conversation is an ordered list of messages, and each message
//! carries an ordered list of content blocks (text, tool invocations, and
//! tool results).

use serde::{Deserialize, Serialize};

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution results fed back to the model
    ToolResult,
}

/// One block of message content.
///
/// Block ordering within a message is significant: the engine processes
/// tool-use blocks in the order the model emitted them, and resumption after
/// confirmation matches on the original block id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a user message with a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with a single text block.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message from raw content blocks.
    pub fn assistant_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Create a tool-result message carrying one or more result blocks.
    pub fn tool_results(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::ToolResult,
            content,
        }
    }

    /// Concatenate all text blocks in this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Token consumption accounting, accumulated across model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Fold another usage report into this one.
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_has_single_text_block() {
        let msg = Message::user("What's my balance?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "What's my balance?");
    }

    #[test]
    fn message_text_concatenates_text_blocks_only() {
        let msg = Message::assistant_blocks(vec![
            ContentBlock::text("Checking"),
            ContentBlock::tool_use("toolu_1", "get_balance", serde_json::json!({})),
            ContentBlock::text(" now"),
        ]);
        assert_eq!(msg.text(), "Checking now");
    }

    #[test]
    fn content_block_serialization_is_tagged() {
        let block = ContentBlock::tool_use("toolu_1", "get_balance", serde_json::json!({}));
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"type\":\"tool_use\""));
        assert!(json.contains("toolu_1"));

        let back: ContentBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn token_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage.accumulate(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        });
        usage.accumulate(TokenUsage {
            input_tokens: 7,
            output_tokens: 3,
        });
        assert_eq!(usage.input_tokens, 17);
        assert_eq!(usage.output_tokens, 8);
        assert_eq!(usage.total(), 25);
    }
}
