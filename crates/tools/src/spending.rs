//! Spending analyzer — a composite read tool.
//!
//! Fetches transaction history through the executor and derives totals,
//! averages, and spending velocity. Also a template for building custom
//! analytical tools on top of the platform reads.

use crate::builder::build_tool;
use chrono::Utc;
use ledgermind_core::executor::{ExecuteRequest, ToolExecutor};
use ledgermind_core::properties;
use ledgermind_core::schema::{integer_property, schema_with_thought};
use ledgermind_core::tool::{Tool, ToolResult};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_PERIOD_DAYS: i64 = 30;
const HISTORY_FETCH_LIMIT: i64 = 100;

/// Build the `analyze_spending` tool against the given executor.
pub fn spending_analyzer(executor: Arc<dyn ToolExecutor>) -> Arc<dyn Tool> {
    build_tool("analyze_spending")
        .description(
            "Analyze the user's spending patterns over a specified time period. Returns \
             insights about spending velocity, categories, and trends.",
        )
        .schema(schema_with_thought(
            properties! {
                "days" => integer_property("Number of days to analyze (default: 30)"),
            },
            false,
            &[],
        ))
        .handler(move |params| {
            let executor = executor.clone();
            async move {
                let days = params.input["days"].as_i64().filter(|d| *d > 0).unwrap_or(DEFAULT_PERIOD_DAYS);

                let response = executor
                    .execute(ExecuteRequest {
                        owner_id: params.owner_id.clone(),
                        tool: "get_transactions".into(),
                        input: json!({"limit": HISTORY_FETCH_LIMIT}),
                        request_id: params.request_id.clone(),
                        confirmation_id: None,
                    })
                    .await;

                let response = match response {
                    Ok(r) => r,
                    Err(e) => {
                        return Ok(ToolResult::failure(format!(
                            "failed to fetch transactions: {e}"
                        )))
                    }
                };
                if !response.success {
                    return Ok(ToolResult::failure(format!(
                        "transaction fetch failed: {}",
                        response.error.unwrap_or_default()
                    )));
                }

                let transactions: Vec<serde_json::Value> = response.data["transactions"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default();

                let analysis = analyze_transactions(&transactions, days);

                Ok(ToolResult::ok(json!({
                    "period_days": days,
                    "total_transactions": transactions.len(),
                    "analysis": analysis,
                    "generated_at": Utc::now().to_rfc3339(),
                })))
            }
        })
        .build()
}

/// Derive spending insights from raw transaction rows.
fn analyze_transactions(transactions: &[serde_json::Value], days: i64) -> serde_json::Value {
    if transactions.is_empty() {
        return json!({"summary": "No transactions found in the specified period"});
    }

    let mut total_spent = 0.0f64;
    let mut total_received = 0.0f64;
    let mut spend_count = 0usize;
    let mut receive_count = 0usize;

    for tx in transactions {
        let amount = match &tx["amount"] {
            serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
            serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        };
        match tx["type"].as_str() {
            Some("send") => {
                total_spent += amount;
                spend_count += 1;
            }
            Some("receive") => {
                total_received += amount;
                receive_count += 1;
            }
            _ => {}
        }
    }

    let avg_daily_spend = total_spent / days as f64;

    json!({
        "total_spent": format!("{total_spent:.2}"),
        "total_received": format!("{total_received:.2}"),
        "spend_count": spend_count,
        "receive_count": receive_count,
        "avg_daily_spend": format!("{avg_daily_spend:.2}"),
        "velocity": velocity(spend_count, days),
        "insights": [
            format!("You made {spend_count} spending transactions over {days} days"),
            format!("Average daily spend: ${avg_daily_spend:.2}"),
        ],
    })
}

/// Classify spending frequency.
fn velocity(transaction_count: usize, days: i64) -> &'static str {
    let per_week = transaction_count as f64 / days as f64 * 7.0;
    if per_week < 2.0 {
        "low"
    } else if per_week < 7.0 {
        "moderate"
    } else {
        "high"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledgermind_core::error::ToolError;
    use ledgermind_core::tool::ToolParams;

    struct FixedTransactions(serde_json::Value);

    #[async_trait]
    impl ToolExecutor for FixedTransactions {
        async fn execute(&self, req: ExecuteRequest) -> Result<ToolResult, ToolError> {
            assert_eq!(req.tool, "get_transactions");
            Ok(ToolResult::ok(self.0.clone()))
        }

        async fn execute_write(&self, _req: ExecuteRequest) -> Result<ToolResult, ToolError> {
            unreachable!("analyzer never writes")
        }
    }

    fn params(input: serde_json::Value) -> ToolParams {
        ToolParams {
            owner_id: "user_1".into(),
            input,
            request_id: "req_1".into(),
            confirmation_id: None,
        }
    }

    #[tokio::test]
    async fn analyzes_sends_and_receives() {
        let executor = Arc::new(FixedTransactions(json!({
            "transactions": [
                {"type": "send", "amount": 30.0},
                {"type": "send", "amount": "20.00"},
                {"type": "receive", "amount": 100.0},
                {"type": "deposit", "amount": 5.0},
            ],
        })));
        let tool = spending_analyzer(executor);

        let result = tool.execute(params(json!({"days": 10}))).await.unwrap();
        assert!(result.success);
        let analysis = &result.data["analysis"];
        assert_eq!(analysis["total_spent"], "50.00");
        assert_eq!(analysis["total_received"], "100.00");
        assert_eq!(analysis["spend_count"], 2);
        assert_eq!(analysis["avg_daily_spend"], "5.00");
    }

    #[tokio::test]
    async fn defaults_to_thirty_days() {
        let executor = Arc::new(FixedTransactions(json!({"transactions": []})));
        let tool = spending_analyzer(executor);
        let result = tool.execute(params(json!({}))).await.unwrap();
        assert_eq!(result.data["period_days"], 30);
        assert_eq!(
            result.data["analysis"]["summary"],
            "No transactions found in the specified period"
        );
    }

    #[tokio::test]
    async fn surfaces_fetch_failures() {
        struct FailingExecutor;

        #[async_trait]
        impl ToolExecutor for FailingExecutor {
            async fn execute(&self, _req: ExecuteRequest) -> Result<ToolResult, ToolError> {
                Ok(ToolResult::failure("upstream unavailable"))
            }

            async fn execute_write(&self, _req: ExecuteRequest) -> Result<ToolResult, ToolError> {
                unreachable!()
            }
        }

        let tool = spending_analyzer(Arc::new(FailingExecutor));
        let result = tool.execute(params(json!({}))).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("upstream unavailable"));
    }

    #[test]
    fn velocity_buckets() {
        assert_eq!(velocity(1, 30), "low");
        assert_eq!(velocity(15, 30), "moderate");
        assert_eq!(velocity(60, 30), "high");
    }
}
