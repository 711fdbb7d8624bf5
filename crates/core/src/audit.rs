//! Audit logging — structured records of every tool execution.
//!
//! When a sink is configured, the engine emits one record per tool call:
//! who ran what, with which input, what came back, and how long it took.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub owner_id: String,
    pub session_id: String,
    pub request_id: String,

    /// Links nested agent runs into a chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    pub agent_name: String,
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub tool_output: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,
    pub is_write_op: bool,
    pub timestamp: DateTime<Utc>,
}

/// Trait for audit record sinks.
pub trait AuditSink: Send + Sync {
    fn log(&self, record: &AuditRecord);
}

/// In-memory audit log that stores records in a vector.
/// Useful for testing and small deployments.
#[derive(Default)]
pub struct VecAuditLog {
    records: std::sync::Mutex<Vec<AuditRecord>>,
}

impl VecAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded entries.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Records for a single tool.
    pub fn records_for_tool(&self, tool_name: &str) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tool_name == tool_name)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl AuditSink for VecAuditLog {
    fn log(&self, record: &AuditRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// A sink that forwards records through `tracing::info!`.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log(&self, record: &AuditRecord) {
        tracing::info!(
            owner_id = %record.owner_id,
            session_id = %record.session_id,
            agent = %record.agent_name,
            tool = %record.tool_name,
            is_write_op = record.is_write_op,
            duration_ms = record.duration_ms,
            error = ?record.error,
            "AUDIT"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(tool: &str) -> AuditRecord {
        AuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: "user_1".into(),
            session_id: "sess_1".into(),
            request_id: "sess_1".into(),
            parent_id: None,
            agent_name: "default".into(),
            tool_name: tool.into(),
            tool_input: json!({}),
            tool_output: json!({"ok": true}),
            error: None,
            duration_ms: 12,
            is_write_op: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn vec_log_stores_and_filters() {
        let log = VecAuditLog::new();
        log.log(&record("get_balance"));
        log.log(&record("send_money"));
        log.log(&record("get_balance"));

        assert_eq!(log.count(), 3);
        assert_eq!(log.records_for_tool("get_balance").len(), 2);
        assert_eq!(log.records_for_tool("send_money").len(), 1);
    }

    #[test]
    fn record_serialization_roundtrip() {
        let rec = record("get_profile");
        let json = serde_json::to_string(&rec).unwrap();
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_name, "get_profile");
        assert_eq!(back.owner_id, "user_1");
    }
}
