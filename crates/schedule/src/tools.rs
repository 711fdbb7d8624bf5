//! Scheduled-payment tools and the reserved-balance guards.
//!
//! Four tools plus one wrapper:
//! - `schedule_payment` — validate and persist a future payment
//! - `list_scheduled_payments` — pending rows
//! - `cancel_scheduled_payment` — cancel while still pending
//! - `check_balance` — live balance enriched with reservations
//! - `send_money` guard — re-checks available balance before delegating,
//!   registered over the catalog tool via `ToolRegistry::replace`

use crate::balance::{check_available, parse_balance};
use crate::store::{ActionStore, ScheduledAction};
use chrono::{DateTime, Utc};
use ledgermind_core::error::ToolError;
use ledgermind_core::executor::{ExecuteRequest, ToolExecutor};
use ledgermind_core::properties;
use ledgermind_core::schema::{schema_with_thought, string_property};
use ledgermind_core::tool::{Tool, ToolRegistry, ToolResult};
use ledgermind_tools::build_tool;
use serde_json::json;
use std::sync::Arc;

const DISPLAY_FORMAT: &str = "%a %b %-d, %Y at %-I:%M %p UTC";

/// Register the scheduling tools and install the send guard.
///
/// The guard deliberately shadows the catalog's `send_money` so every
/// transfer is validated against reserved balances first.
pub fn register_schedule_tools(
    registry: &mut ToolRegistry,
    store: Arc<ActionStore>,
    executor: Arc<dyn ToolExecutor>,
) -> Result<(), ToolError> {
    registry.register(schedule_payment_tool(store.clone(), executor.clone()))?;
    registry.register(list_scheduled_payments_tool(store.clone()))?;
    registry.register(cancel_scheduled_payment_tool(store.clone()))?;
    registry.register(check_balance_tool(store.clone(), executor.clone()))?;
    registry.replace(send_money_guard(store, executor));
    Ok(())
}

/// `schedule_payment` — validate recipient, date, and available balance,
/// then persist a pending action for the background scheduler.
pub fn schedule_payment_tool(
    store: Arc<ActionStore>,
    executor: Arc<dyn ToolExecutor>,
) -> Arc<dyn Tool> {
    build_tool("schedule_payment")
        .description(
            "Schedule a payment for a future date/time. The payment will be automatically \
             sent when the time comes. Validates that the recipient exists and sufficient \
             funds are available. When users say 'USD' or 'dollars', use 'USDC'. When users \
             say 'EUR' or 'euros', use 'EURC'. 'LIL' stays as 'LIL'.",
        )
        .schema(schema_with_thought(
            properties! {
                "recipient" => string_property("Recipient's display tag (e.g., @alice) or user ID"),
                "amount" => string_property("Amount to send (e.g., '50.00')"),
                "currency" => string_property("Currency: 'USDC' for dollars, 'EURC' for euros, 'LIL' for LIL"),
                "scheduled_at" => string_property("ISO 8601 datetime for when to send (e.g., '2026-02-16T09:00:00Z')"),
                "note" => string_property("Optional payment note"),
            },
            true,
            &["recipient", "amount", "currency", "scheduled_at"],
        ))
        .requires_confirmation()
        .summary_template("Schedule {amount} {currency} to {recipient} on {scheduled_at}")
        .handler(move |params| {
            let store = store.clone();
            let executor = executor.clone();
            async move {
                let recipient = params.input["recipient"].as_str().unwrap_or("").to_string();
                let amount_text = params.input["amount"].as_str().unwrap_or("").to_string();
                let currency = params.input["currency"].as_str().unwrap_or("").to_string();
                let note = params.input["note"].as_str().unwrap_or("").to_string();

                let amount: f64 = match amount_text.parse() {
                    Ok(a) if a > 0.0 => a,
                    _ => return Ok(ToolResult::failure("amount must be a positive number")),
                };

                let scheduled_at = match params.input["scheduled_at"]
                    .as_str()
                    .map(DateTime::parse_from_rfc3339)
                {
                    Some(Ok(dt)) => dt.with_timezone(&Utc),
                    Some(Err(e)) => {
                        return Ok(ToolResult::failure(format!(
                            "invalid date format, expected ISO 8601: {e}"
                        )))
                    }
                    None => {
                        return Ok(ToolResult::failure(
                            "invalid date format, expected ISO 8601",
                        ))
                    }
                };
                if scheduled_at <= Utc::now() {
                    return Ok(ToolResult::failure("scheduled date must be in the future"));
                }

                // Recipient must resolve before we commit funds
                let query = recipient.trim_start_matches('@');
                let search = executor
                    .execute(ExecuteRequest {
                        owner_id: params.owner_id.clone(),
                        tool: "search_users".into(),
                        input: json!({"query": query}),
                        request_id: params.request_id.clone(),
                        confirmation_id: None,
                    })
                    .await;
                match search {
                    Err(e) => {
                        return Ok(ToolResult::failure(format!(
                            "failed to validate recipient: {e}"
                        )))
                    }
                    Ok(result) if !result.success => {
                        return Ok(ToolResult::failure(format!(
                            "recipient not found: {recipient}"
                        )))
                    }
                    Ok(result) => {
                        if let Some(users) = result.data["users"].as_array() {
                            if users.is_empty() {
                                return Ok(ToolResult::failure(format!(
                                    "recipient not found: {recipient}"
                                )));
                            }
                        }
                    }
                }

                // Available balance accounts for what's already reserved
                match available_for(&executor, &store, &params.owner_id, &params.request_id, &currency).await {
                    Ok((live, reserved)) => {
                        if let Err(e) = check_available(live, &reserved, &currency, amount) {
                            return Ok(ToolResult::failure(e.to_string()));
                        }
                    }
                    Err(message) => return Ok(ToolResult::failure(message)),
                }

                let action =
                    ScheduledAction::new(recipient, amount_text, currency, note, scheduled_at);
                if let Err(e) = store.add(&action).await {
                    return Ok(ToolResult::failure(format!("failed to save payment: {e}")));
                }

                Ok(ToolResult::ok(json!({
                    "payment_id": action.id,
                    "recipient": action.recipient,
                    "amount": action.amount,
                    "currency": action.currency,
                    "scheduled_at": action.scheduled_at.to_rfc3339(),
                    "status": "pending",
                    "message": format!(
                        "Payment of {} {} to {} scheduled for {}",
                        action.amount,
                        action.currency,
                        action.recipient,
                        action.scheduled_at.format(DISPLAY_FORMAT),
                    ),
                })))
            }
        })
        .build()
}

/// `list_scheduled_payments` — pending payments with display timestamps.
pub fn list_scheduled_payments_tool(store: Arc<ActionStore>) -> Arc<dyn Tool> {
    build_tool("list_scheduled_payments")
        .description(
            "List all pending scheduled payments that haven't been sent yet. Shows payment \
             ID, recipient, amount, currency, and scheduled date.",
        )
        .schema(schema_with_thought(properties! {}, false, &[]))
        .handler(move |_params| {
            let store = store.clone();
            async move {
                let pending = match store.pending().await {
                    Ok(p) => p,
                    Err(e) => {
                        return Ok(ToolResult::failure(format!("failed to list payments: {e}")))
                    }
                };

                if pending.is_empty() {
                    return Ok(ToolResult::ok(json!({
                        "payments": [],
                        "count": 0,
                        "message": "No scheduled payments found.",
                    })));
                }

                let payments: Vec<serde_json::Value> = pending
                    .iter()
                    .map(|p| {
                        json!({
                            "id": p.id,
                            "recipient": p.recipient,
                            "amount": p.amount,
                            "currency": p.currency,
                            "note": p.note,
                            "scheduled_at": p.scheduled_at.to_rfc3339(),
                            "scheduled_display": p.scheduled_at.format(DISPLAY_FORMAT).to_string(),
                            "created_at": p.created_at.to_rfc3339(),
                        })
                    })
                    .collect();

                Ok(ToolResult::ok(json!({
                    "count": payments.len(),
                    "payments": payments,
                })))
            }
        })
        .build()
}

/// `cancel_scheduled_payment` — cancel a payment that is still pending.
pub fn cancel_scheduled_payment_tool(store: Arc<ActionStore>) -> Arc<dyn Tool> {
    build_tool("cancel_scheduled_payment")
        .description(
            "Cancel a scheduled payment that hasn't been sent yet. Requires the payment ID.",
        )
        .schema(schema_with_thought(
            properties! {
                "payment_id" => string_property(
                    "ID of the scheduled payment to cancel (from list_scheduled_payments)",
                ),
            },
            false,
            &["payment_id"],
        ))
        .handler(move |params| {
            let store = store.clone();
            async move {
                let payment_id = params.input["payment_id"].as_str().unwrap_or("").to_string();
                if payment_id.is_empty() {
                    return Ok(ToolResult::failure("payment_id is required"));
                }

                if let Err(e) = store.cancel(&payment_id).await {
                    return Ok(ToolResult::failure(format!("failed to cancel: {e}")));
                }

                Ok(ToolResult::ok(json!({
                    "payment_id": payment_id,
                    "status": "cancelled",
                    "message": "Scheduled payment has been cancelled.",
                })))
            }
        })
        .build()
}

/// `check_balance` — live balance plus reservation info.
pub fn check_balance_tool(
    store: Arc<ActionStore>,
    executor: Arc<dyn ToolExecutor>,
) -> Arc<dyn Tool> {
    build_tool("check_balance")
        .description(
            "Check wallet balance with available amounts after scheduled payments. Shows \
             total balance and available balance (total minus pending scheduled payments). \
             ALWAYS use this instead of get_balance. When users say 'USD' or 'dollars', use \
             'USDC'. When users say 'EUR' or 'euros', use 'EURC'. 'LIL' stays as 'LIL'.",
        )
        .schema(schema_with_thought(
            properties! {
                "currency" => string_property(
                    "Optional: filter by currency (e.g., 'USDC' for dollars, 'EURC' for euros, 'LIL' for LIL)",
                ),
            },
            false,
            &[],
        ))
        .handler(move |params| {
            let store = store.clone();
            let executor = executor.clone();
            async move {
                let balance = executor
                    .execute(ExecuteRequest {
                        owner_id: params.owner_id.clone(),
                        tool: "get_balance".into(),
                        input: params.input.clone(),
                        request_id: params.request_id.clone(),
                        confirmation_id: None,
                    })
                    .await;
                let balance = match balance {
                    Ok(r) if r.success => r,
                    Ok(r) => {
                        return Ok(ToolResult::failure(format!(
                            "balance fetch failed: {}",
                            r.error.unwrap_or_default()
                        )))
                    }
                    Err(e) => {
                        return Ok(ToolResult::failure(format!("failed to fetch balance: {e}")))
                    }
                };

                let totals = match store.pending_totals().await {
                    Ok(t) => t,
                    Err(e) => {
                        return Ok(ToolResult::failure(format!(
                            "failed to check pending payments: {e}"
                        )))
                    }
                };
                let pending = match store.pending().await {
                    Ok(p) => p,
                    Err(e) => {
                        return Ok(ToolResult::failure(format!(
                            "failed to list pending payments: {e}"
                        )))
                    }
                };

                let mut result = json!({
                    "balance_data": balance.data,
                    "pending_scheduled_count": pending.len(),
                });

                if !totals.is_empty() {
                    let mut available = serde_json::Map::new();
                    for (currency, reserved) in &totals {
                        let live = parse_balance(&balance.data, currency);
                        available.insert(
                            currency.clone(),
                            json!(format!("{:.2}", (live - reserved).max(0.0))),
                        );
                    }
                    result["pending_scheduled_totals"] = json!(totals);
                    result["available_after_scheduled"] =
                        serde_json::Value::Object(available);
                }

                Ok(ToolResult::ok(result))
            }
        })
        .build()
}

/// The guarded `send_money`: checks available balance (live minus
/// reservations) before delegating to the platform's write path.
pub fn send_money_guard(
    store: Arc<ActionStore>,
    executor: Arc<dyn ToolExecutor>,
) -> Arc<dyn Tool> {
    build_tool("send_money")
        .description(
            "Send money to another user. Checks available balance accounting for scheduled \
             payments. When users say 'USD' or 'dollars', use 'USDC'. When users say 'EUR' \
             or 'euros', use 'EURC'. 'LIL' stays as 'LIL'. Requires confirmation.",
        )
        .schema(schema_with_thought(
            properties! {
                "recipient" => string_property("Recipient's display tag (e.g., @alice) or user ID"),
                "amount" => string_property("Amount to send (e.g., '50.00')"),
                "currency" => string_property("Currency to send. Use 'USDC' for dollars, 'EURC' for euros, 'LIL' for LIL"),
                "note" => string_property("Optional payment note"),
            },
            true,
            &["recipient", "amount", "currency"],
        ))
        .requires_confirmation()
        .summary_template("Send {amount} {currency} to {recipient}")
        .handler(move |params| {
            let store = store.clone();
            let executor = executor.clone();
            async move {
                let amount: f64 = match params.input["amount"].as_str().unwrap_or("").parse() {
                    Ok(a) if a > 0.0 => a,
                    _ => return Ok(ToolResult::failure("amount must be a positive number")),
                };
                let currency = params.input["currency"].as_str().unwrap_or("").to_string();

                match available_for(&executor, &store, &params.owner_id, &params.request_id, &currency).await {
                    Ok((live, reserved)) => {
                        if let Err(e) = check_available(live, &reserved, &currency, amount) {
                            return Ok(ToolResult::failure(e.to_string()));
                        }
                    }
                    Err(message) => return Ok(ToolResult::failure(message)),
                }

                // Balance is fine, hand off to the platform
                let sent = executor
                    .execute_write(ExecuteRequest {
                        owner_id: params.owner_id.clone(),
                        tool: "send_money".into(),
                        input: params.input.clone(),
                        request_id: params.request_id.clone(),
                        confirmation_id: params.confirmation_id.clone(),
                    })
                    .await;

                match sent {
                    Err(e) => Ok(ToolResult::failure(format!("send failed: {e}"))),
                    Ok(result) if !result.success => Ok(ToolResult::failure(
                        result.error.unwrap_or_default(),
                    )),
                    Ok(result) => Ok(result),
                }
            }
        })
        .build()
}

/// Fetch the live balance and current reservations for a currency.
async fn available_for(
    executor: &Arc<dyn ToolExecutor>,
    store: &Arc<ActionStore>,
    owner_id: &str,
    request_id: &str,
    currency: &str,
) -> Result<(f64, std::collections::HashMap<String, f64>), String> {
    let balance = executor
        .execute(ExecuteRequest {
            owner_id: owner_id.to_string(),
            tool: "get_balance".into(),
            input: json!({"currency": currency}),
            request_id: request_id.to_string(),
            confirmation_id: None,
        })
        .await
        .map_err(|e| format!("failed to check balance: {e}"))?;
    if !balance.success {
        return Err("failed to retrieve balance".into());
    }

    let live = parse_balance(&balance.data, currency);
    let reserved = store
        .pending_totals()
        .await
        .map_err(|e| format!("failed to check pending payments: {e}"))?;
    Ok((live, reserved))
}
