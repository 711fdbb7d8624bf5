//! Memory records — the tagged variant set stored in the vector store.
//!
//! Each variant controls its own content structure and its own rendering
//! for prompt injection. `Trace` is the first concrete variant; the enum
//! leaves room for others (semantic facts, shortcuts, relations) without
//! touching the store or the manager.

use chrono::{DateTime, Utc};
use ledgermind_core::trace::Trace;
use std::collections::BTreeMap;

/// Context handed to a record when it formats itself for prompt injection.
#[derive(Debug, Clone)]
pub struct FormatContext {
    /// The owner the prompt is being built for.
    pub owner_id: String,

    /// The query currently being answered.
    pub query: String,

    /// Maximum characters this record's output should occupy.
    pub max_len: usize,
}

/// A stored memory record.
#[derive(Debug, Clone)]
pub enum MemoryRecord {
    Trace(TraceMemory),
}

impl MemoryRecord {
    pub fn id(&self) -> &str {
        match self {
            MemoryRecord::Trace(t) => &t.id,
        }
    }

    /// The owning principal. Empty means globally visible.
    pub fn owner_id(&self) -> &str {
        match self {
            MemoryRecord::Trace(t) => &t.owner_id,
        }
    }

    pub fn conversation_id(&self) -> &str {
        match self {
            MemoryRecord::Trace(t) => &t.conversation_id,
        }
    }

    /// Variant tag (e.g. "trace").
    pub fn type_tag(&self) -> &'static str {
        match self {
            MemoryRecord::Trace(_) => "trace",
        }
    }

    /// Variant-specific content as a JSON value.
    pub fn content(&self) -> serde_json::Value {
        match self {
            MemoryRecord::Trace(t) => serde_json::json!({
                "thought": t.thought,
                "action": t.action,
                "observation": t.observation,
                "success": t.success,
            }),
        }
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        match self {
            MemoryRecord::Trace(t) => &t.metadata,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            MemoryRecord::Trace(t) => t.created_at,
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            MemoryRecord::Trace(t) => t.embedding.as_deref(),
        }
    }

    pub fn set_embedding(&mut self, embedding: Vec<f32>) {
        match self {
            MemoryRecord::Trace(t) => t.embedding = Some(embedding),
        }
    }

    /// Format this record for prompt injection.
    pub fn format(&self, ctx: &FormatContext) -> String {
        match self {
            MemoryRecord::Trace(t) => t.format(ctx),
        }
    }

    /// Text representation used when embedding the record.
    pub fn embedding_text(&self) -> String {
        match self {
            MemoryRecord::Trace(t) => t.embedding_text(),
        }
    }
}

/// A stored ReAct trace (thought-action-observation cycle).
///
/// Trace memories let the agent learn from past actions: failed transfers
/// carry prevention hints, user searches carry resolved identities, and
/// confirmed writes carry what the user actually approved.
#[derive(Debug, Clone)]
pub struct TraceMemory {
    pub id: String,
    pub owner_id: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,

    /// Retrieval priority in [0, 1].
    pub importance: f64,

    pub metadata: BTreeMap<String, String>,

    pub thought: String,
    pub action: String,
    pub observation: String,
    pub success: bool,
}

impl TraceMemory {
    /// Build a trace memory from a completed engine trace.
    pub fn from_trace(owner_id: &str, conversation_id: &str, trace: &Trace) -> Self {
        let mut metadata = trace.metadata.clone();
        metadata.insert("action".into(), trace.action.clone());
        metadata.insert("success".into(), trace.success.to_string());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            conversation_id: conversation_id.into(),
            created_at: Utc::now(),
            embedding: None,
            importance: assess_importance(trace),
            metadata,
            thought: trace.thought.clone(),
            action: trace.action.clone(),
            observation: trace.observation.clone(),
            success: trace.success,
        }
    }

    /// Format this trace for prompt injection: status, action, truncated
    /// thought and observation, and the prevention hint on failures.
    pub fn format(&self, ctx: &FormatContext) -> String {
        let status = if self.success { "Success" } else { "Failed" };
        let mut parts = vec![format!("[{status}] {}", self.action)];

        if !self.thought.is_empty() {
            // Up to 25% of the space for the thought
            let thought = truncate(&self.thought, ctx.max_len / 4);
            parts.push(format!("  Thought: {thought:?}"));
        }

        if !self.observation.is_empty() {
            // Up to 50% for the observation
            let observation = truncate(&self.observation, ctx.max_len / 2);
            parts.push(format!("  Observation: {observation:?}"));
        }

        if !self.success {
            if let Some(prevention) = self.metadata.get("prevention") {
                parts.push(format!("  Prevention: {prevention}"));
            }
        }

        parts.join("\n")
    }

    /// Text representation for embedding.
    pub fn embedding_text(&self) -> String {
        format!(
            "Thought: {}\nAction: {}\nObservation: {}",
            self.thought, self.action, self.observation
        )
    }
}

/// Score trace importance in [0, 1]. More important traces are prioritized
/// for retrieval by durable backends that rank beyond similarity.
fn assess_importance(trace: &Trace) -> f64 {
    let mut importance: f64 = 0.5;

    // Failures are worth learning from
    if !trace.success {
        importance += 0.3;
    }

    // Confirmed writes are high-value actions
    if trace.metadata.get("confirmed").map(String::as_str) == Some("true") {
        importance += 0.2;
    }

    // Long thoughts indicate substantive reasoning
    if trace.thought.len() > 50 {
        importance += 0.1;
    }

    importance.min(1.0)
}

/// Truncate a string to `max_len` bytes on a char boundary, appending "..."
/// when shortened.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    if max_len < 3 {
        return "...".into();
    }
    let mut cut = max_len - 3;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}
