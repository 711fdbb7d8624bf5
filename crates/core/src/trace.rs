//! ReAct traces and suspended-action handles.
//!
//! A trace records one reasoning-then-acting step: the model's thought, the
//! tool it chose, and the observation the engine formed from the result.
//! A `PendingAction` is the handle a caller holds while a write operation
//! waits for human approval; it carries enough to resume the run later.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Observation recorded while a write operation awaits approval.
pub const OBSERVATION_AWAITING_CONFIRMATION: &str = "Awaiting user confirmation";

/// A single reasoning-then-acting record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    pub session_id: String,
    pub turn_number: u32,

    /// The model's stated reasoning for the action. Non-empty whenever the
    /// tool required confirmation.
    pub thought: String,

    /// The tool name.
    pub action: String,

    /// The decoded tool input.
    pub action_input: serde_json::Value,

    /// Filled exactly once: tool output, an error message, or the
    /// awaiting-confirmation sentinel.
    pub observation: String,

    /// False whenever the observation encodes an error or a pending state.
    pub success: bool,

    pub timestamp: DateTime<Utc>,

    /// Free-form annotations: error classification, prevention hints,
    /// confirmation linkage.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Trace {
    /// Start a trace in its THINK phase; observation comes later.
    pub fn begin(
        session_id: impl Into<String>,
        turn_number: u32,
        thought: impl Into<String>,
        action: impl Into<String>,
        action_input: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            turn_number,
            thought: thought.into(),
            action: action.into(),
            action_input,
            observation: String::new(),
            success: false,
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Complete the trace with its observation.
    pub fn observe(&mut self, observation: impl Into<String>, success: bool) {
        self.observation = observation.into();
        self.success = success;
    }
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "turn={} action={} success={} thought={:?} observation={:?}",
            self.turn_number, self.action, self.success, self.thought, self.observation
        )
    }
}

/// How long a pending action stays valid.
const PENDING_ACTION_TTL_MINUTES: i64 = 10;

/// A suspended write operation awaiting human approval.
///
/// The caller persists this (plus the conversation history) and resumes via
/// the engine's confirmed-run entry point. `block_id` ties resumption to the
/// original model-emitted tool-use block so the follow-up tool_result can be
/// matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,

    /// Stable digest of (owner, tool, input); equal inputs yield equal keys.
    pub idempotency_key: String,

    pub session_id: String,
    pub owner_id: String,
    pub tool: String,
    pub input: serde_json::Value,

    /// The thought captured at suspension time, replayed into the trace on
    /// confirmation.
    pub thought: String,

    /// Human-facing summary rendered from the tool's template.
    pub summary: String,

    /// The model's tool_use block id.
    pub block_id: String,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(
        session_id: impl Into<String>,
        owner_id: impl Into<String>,
        tool: impl Into<String>,
        input: serde_json::Value,
        thought: impl Into<String>,
        summary: impl Into<String>,
        block_id: impl Into<String>,
    ) -> Self {
        let owner_id = owner_id.into();
        let tool = tool.into();
        let created_at = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            idempotency_key: idempotency_key(&owner_id, &tool, &input),
            session_id: session_id.into(),
            owner_id,
            tool,
            input,
            thought: thought.into(),
            summary: summary.into(),
            block_id: block_id.into(),
            created_at,
            expires_at: created_at + Duration::minutes(PENDING_ACTION_TTL_MINUTES),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Compute the idempotency key for a pending action.
///
/// SHA-256 over owner id, tool name, and the canonical JSON form of the
/// input. `serde_json` keeps object keys sorted, so equal inputs always
/// produce equal keys regardless of construction order.
pub fn idempotency_key(owner_id: &str, tool: &str, input: &serde_json::Value) -> String {
    let canonical = input.to_string();
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(tool.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Record of one tool invocation within a run, reported back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool: String,
    pub input: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,
}
