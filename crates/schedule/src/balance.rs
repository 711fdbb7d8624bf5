//! Live-balance parsing and the available-balance rule.
//!
//! The platform's balance responses come in a few shapes; the parser
//! tolerates all of them. Available balance is the live balance minus the
//! reserved total of pending scheduled payments for that currency.

use ledgermind_core::error::ScheduleError;
use std::collections::HashMap;

/// Extract the balance for a currency from a `get_balance` response.
///
/// Understands:
/// - `{"balances": [{"currency": "USDC", "amount": "100"}, ...]}`
///   (also `"balance"` in place of `"amount"`)
/// - `{"balance": "100"}` / `{"balance": 100}`
/// - `{"USDC": "100"}` / `{"USDC": 100}`
///
/// Anything unrecognized parses as zero.
pub fn parse_balance(data: &serde_json::Value, currency: &str) -> f64 {
    if let Some(balances) = data["balances"].as_array() {
        for entry in balances {
            if entry["currency"].as_str() == Some(currency) {
                for field in ["amount", "balance"] {
                    if let Some(v) = number_from(&entry[field]) {
                        return v;
                    }
                }
            }
        }
    }

    if let Some(v) = number_from(&data["balance"]) {
        return v;
    }

    if let Some(v) = number_from(&data[currency]) {
        return v;
    }

    0.0
}

fn number_from(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Enforce the available-balance rule:
/// `live_balance − reserved(currency) ≥ amount`, else `InsufficientAvailable`.
pub fn check_available(
    live_balance: f64,
    reserved: &HashMap<String, f64>,
    currency: &str,
    amount: f64,
) -> Result<f64, ScheduleError> {
    let reserved_total = reserved.get(currency).copied().unwrap_or(0.0);
    let available = live_balance - reserved_total;
    if available < amount {
        return Err(ScheduleError::InsufficientAvailable {
            balance: live_balance,
            reserved: reserved_total,
            currency: currency.to_string(),
        });
    }
    Ok(available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_balances_array() {
        let data = json!({
            "balances": [
                {"currency": "EURC", "amount": "40.00"},
                {"currency": "USDC", "amount": "100.00"},
            ],
        });
        assert!((parse_balance(&data, "USDC") - 100.0).abs() < 1e-9);
        assert!((parse_balance(&data, "EURC") - 40.0).abs() < 1e-9);
        assert_eq!(parse_balance(&data, "LIL"), 0.0);
    }

    #[test]
    fn parses_balance_field_variant() {
        assert!((parse_balance(&json!({"balance": "55.5"}), "USDC") - 55.5).abs() < 1e-9);
        assert!((parse_balance(&json!({"balance": 55.5}), "USDC") - 55.5).abs() < 1e-9);
    }

    #[test]
    fn parses_currency_key_variant() {
        assert!((parse_balance(&json!({"USDC": "25"}), "USDC") - 25.0).abs() < 1e-9);
        assert!((parse_balance(&json!({"USDC": 25.0}), "USDC") - 25.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_shapes_parse_as_zero() {
        assert_eq!(parse_balance(&json!({"weird": true}), "USDC"), 0.0);
        assert_eq!(parse_balance(&json!(null), "USDC"), 0.0);
    }

    #[test]
    fn balances_array_accepts_balance_field() {
        let data = json!({"balances": [{"currency": "USDC", "balance": 12.0}]});
        assert!((parse_balance(&data, "USDC") - 12.0).abs() < 1e-9);
    }

    #[test]
    fn available_subtracts_reservation() {
        let mut reserved = HashMap::new();
        reserved.insert("USDC".to_string(), 10.0);

        // 100 live − 10 reserved = 90 available
        let available = check_available(100.0, &reserved, "USDC", 90.0).unwrap();
        assert!((available - 90.0).abs() < 1e-9);

        // 25 live − 10 reserved = 15 < 20 requested
        let err = check_available(25.0, &reserved, "USDC", 20.0).unwrap_err();
        match err {
            ScheduleError::InsufficientAvailable {
                balance,
                reserved,
                currency,
            } => {
                assert!((balance - 25.0).abs() < 1e-9);
                assert!((reserved - 10.0).abs() < 1e-9);
                assert_eq!(currency, "USDC");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_reservation_means_full_balance() {
        let reserved = HashMap::new();
        assert!(check_available(50.0, &reserved, "USDC", 50.0).is_ok());
        assert!(check_available(50.0, &reserved, "USDC", 50.01).is_err());
    }
}
