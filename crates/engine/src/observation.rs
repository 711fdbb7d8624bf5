//! Observation formatting and the failure taxonomy.
//!
//! After a tool runs, the engine forms a single observation string for the
//! trace. Failures are additionally bucketed into a small taxonomy by
//! substring matching, and a prevention hint is attached so future
//! retrievals can steer the model away from repeating the mistake.

use ledgermind_core::error::ToolError;
use ledgermind_core::tool::{Tool, ToolResult};

/// Format an observation for a tool outcome.
///
/// A tool-provided formatter wins; otherwise the default ladder applies:
/// error message, empty-result placeholder, a `message`/`status` field,
/// the raw string value, or the JSON form of structured data.
pub fn format_observation(
    tool: &dyn Tool,
    result: Option<&ToolResult>,
    error: Option<&ToolError>,
) -> String {
    if let Some(custom) = tool.format_observation(result, error) {
        return custom;
    }

    if let Some(err) = error {
        return format!("Error: {err}");
    }

    let Some(result) = result else {
        return "No result returned".into();
    };

    if !result.success {
        return format!("Failed: {}", result.error.clone().unwrap_or_default());
    }

    match &result.data {
        serde_json::Value::Null => "No result returned".into(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(msg)) = map.get("message") {
                return msg.clone();
            }
            if let Some(serde_json::Value::String(status)) = map.get("status") {
                return format!("Success: {status}");
            }
            serde_json::Value::Object(map.clone()).to_string()
        }
        other => format!("Success: {other}"),
    }
}

/// Bucket an error message into the failure taxonomy.
pub fn categorize_error(message: &str) -> &'static str {
    if message.is_empty() {
        return "unknown";
    }

    let lower = message.to_lowercase();
    if lower.contains("insufficient") || lower.contains("not enough") {
        "insufficient_balance"
    } else if lower.contains("not found") || lower.contains("does not exist") {
        "not_found"
    } else if lower.contains("invalid") || lower.contains("malformed") {
        "invalid_input"
    } else if lower.contains("unauthorized") || lower.contains("forbidden") {
        "permission_denied"
    } else if lower.contains("timeout") || lower.contains("deadline") {
        "timeout"
    } else if lower.contains("rate limit") || lower.contains("too many") {
        "rate_limit"
    } else if lower.contains("network") || lower.contains("connection") {
        "network_error"
    } else {
        "unknown"
    }
}

/// Suggest how to avoid a failure next time.
///
/// Specific `action:category` pairs get targeted advice; everything else
/// falls back to per-category guidance.
pub fn prevention_hint(action: &str, category: &str) -> String {
    let specific = match (action, category) {
        ("send_money", "insufficient_balance") => {
            Some("Check balance with get_balance before attempting transfer")
        }
        ("send_money", "not_found") => {
            Some("Verify recipient exists with search_users before transfer")
        }
        ("send_money", "invalid_input") => {
            Some("Validate amount is positive and recipient ID format is correct")
        }
        ("deposit_savings", "insufficient_balance") => {
            Some("Check wallet balance before depositing to savings")
        }
        ("withdraw_savings", "insufficient_balance") => {
            Some("Check savings balance with get_savings_balance before withdrawal")
        }
        _ => None,
    };
    if let Some(hint) = specific {
        return hint.into();
    }

    match category {
        "insufficient_balance" => "Check balance before attempting operation".into(),
        "not_found" => "Verify the entity exists before referencing it".into(),
        "invalid_input" => "Validate input parameters before submission".into(),
        "rate_limit" => "Implement retry with backoff".into(),
        "timeout" => "Retry operation with timeout handling".into(),
        _ => "Review error message and adjust approach accordingly".into(),
    }
}
