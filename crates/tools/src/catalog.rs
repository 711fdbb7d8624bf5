//! The banking tool catalog.
//!
//! These are the standard tools exposed through the custody platform:
//! six reads (thought optional) and four writes (thought and confirmation
//! required). Each pairs a static definition with the shared executor, so
//! the same catalog works against the in-process test executor or the
//! remote HTTP collaborator.

use ledgermind_core::executor::{ExecutorTool, ToolExecutor};
use ledgermind_core::properties;
use ledgermind_core::schema::{
    integer_property, schema_with_thought, string_enum_property, string_property,
};
use ledgermind_core::tool::{Tool, ToolDefinition};
use std::sync::Arc;

/// Definitions for all banking tools.
pub fn bank_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        // Read operations (thought optional)
        ToolDefinition {
            name: "get_balance".into(),
            description: "Get the user's wallet balance across all supported currencies and \
                blockchains. Returns balances for USDC (USD equivalent on Arbitrum), EURC (EUR \
                equivalent on Base), LIL (native token on Base), and any other tokens. When \
                users mention 'USD' or 'dollars', use 'USDC'. When users mention 'EUR' or \
                'euros', use 'EURC'."
                .into(),
            input_schema: schema_with_thought(
                properties! {
                    "currency" => string_property(
                        "Optional: filter by currency token (e.g., 'USDC' for USD, 'EURC' for EUR, 'LIL' for LIL)",
                    ),
                },
                false,
                &[],
            ),
            requires_confirmation: false,
            summary_template: None,
        },
        ToolDefinition {
            name: "get_savings_balance".into(),
            description: "Get the user's savings positions and current APY.".into(),
            input_schema: schema_with_thought(
                properties! {
                    "vault" => string_property("Optional: filter by vault name"),
                },
                false,
                &[],
            ),
            requires_confirmation: false,
            summary_template: None,
        },
        ToolDefinition {
            name: "get_vault_rates".into(),
            description: "Get current APY rates for available savings vaults.".into(),
            input_schema: schema_with_thought(properties! {}, false, &[]),
            requires_confirmation: false,
            summary_template: None,
        },
        ToolDefinition {
            name: "get_transactions".into(),
            description: "Get the user's recent transaction history.".into(),
            input_schema: schema_with_thought(
                properties! {
                    "limit" => integer_property("Number of transactions to return (default: 10)"),
                    "type" => string_enum_property(
                        "Filter by transaction type",
                        &["send", "receive", "deposit", "withdraw"],
                    ),
                },
                false,
                &[],
            ),
            requires_confirmation: false,
            summary_template: None,
        },
        ToolDefinition {
            name: "get_profile".into(),
            description: "Get the user's profile information.".into(),
            input_schema: schema_with_thought(properties! {}, false, &[]),
            requires_confirmation: false,
            summary_template: None,
        },
        ToolDefinition {
            name: "search_users".into(),
            description: "Search for users by display tag or name.".into(),
            input_schema: schema_with_thought(
                properties! {
                    "query" => string_property("Search query (display tag like @alice or name)"),
                },
                false,
                &["query"],
            ),
            requires_confirmation: false,
            summary_template: None,
        },
        // Write operations (thought required)
        ToolDefinition {
            name: "send_money".into(),
            description: "Send money to another user. When users say 'USD' or 'dollars', use \
                'USDC'. When users say 'EUR' or 'euros', use 'EURC'. USDC is sent on Arbitrum, \
                EURC on Base, LIL is the native token on Base. The blockchain is automatically \
                selected based on the currency. Requires confirmation."
                .into(),
            input_schema: schema_with_thought(
                properties! {
                    "recipient" => string_property("Recipient's display tag (e.g., @alice) or user ID"),
                    "amount" => string_property("Amount to send (e.g., '50.00')"),
                    "currency" => string_property(
                        "Currency token to send. Use 'USDC' for USD/dollars, 'EURC' for EUR/euros, 'LIL' for LIL",
                    ),
                    "note" => string_property("Optional payment note"),
                },
                true,
                &["recipient", "amount", "currency"],
            ),
            requires_confirmation: true,
            summary_template: Some("Send {amount} {currency} to {recipient}".into()),
        },
        ToolDefinition {
            name: "deposit_savings".into(),
            description: "Deposit funds into savings to earn yield. When users say 'USD' or \
                'dollars', use 'USDC'. When users say 'EUR' or 'euros', use 'EURC'. Funds are \
                deposited into high-yield vaults. Requires confirmation."
                .into(),
            input_schema: schema_with_thought(
                properties! {
                    "amount" => string_property("Amount to deposit"),
                    "currency" => string_property(
                        "Currency token to deposit. Use 'USDC' for USD/dollars, 'EURC' for EUR/euros",
                    ),
                },
                true,
                &["amount", "currency"],
            ),
            requires_confirmation: true,
            summary_template: Some("Deposit {amount} {currency} into savings".into()),
        },
        ToolDefinition {
            name: "withdraw_savings".into(),
            description: "Withdraw funds from savings back to your wallet. When users say 'USD' \
                or 'dollars', use 'USDC'. When users say 'EUR' or 'euros', use 'EURC'. Requires \
                confirmation."
                .into(),
            input_schema: schema_with_thought(
                properties! {
                    "amount" => string_property("Amount to withdraw"),
                    "currency" => string_property(
                        "Currency token to withdraw. Use 'USDC' for USD/dollars, 'EURC' for EUR/euros",
                    ),
                },
                true,
                &["amount", "currency"],
            ),
            requires_confirmation: true,
            summary_template: Some("Withdraw {amount} {currency} from savings".into()),
        },
        ToolDefinition {
            name: "execute_contract_call".into(),
            description: "Execute an arbitrary smart contract call on any blockchain. Requires \
                confirmation. You must provide pre-encoded calldata as hex."
                .into(),
            input_schema: schema_with_thought(
                properties! {
                    "chain_id" => integer_property("Chain ID (42161=Arbitrum, 8453=Base, 1=Ethereum)"),
                    "to" => string_property("Contract address (0x...)"),
                    "data" => string_property("Hex-encoded calldata (0x...). Must be pre-encoded."),
                    "value" => string_property("Optional: ETH value to send in wei (default: 0)"),
                    "gas_tier" => string_enum_property("Optional: gas tier", &["slow", "standard", "fast"]),
                },
                true,
                &["chain_id", "to", "data"],
            ),
            requires_confirmation: true,
            summary_template: Some("Execute contract call on chain {chain_id} to {to}".into()),
        },
    ]
}

/// Instantiate all banking tools against the given executor.
pub fn bank_tools(executor: Arc<dyn ToolExecutor>) -> Vec<Arc<dyn Tool>> {
    bank_tool_definitions()
        .into_iter()
        .map(|def| Arc::new(ExecutorTool::new(def, executor.clone())) as Arc<dyn Tool>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledgermind_core::error::ToolError;
    use ledgermind_core::executor::ExecuteRequest;
    use ledgermind_core::tool::{ToolRegistry, ToolResult};
    use serde_json::json;

    struct NullExecutor;

    #[async_trait]
    impl ToolExecutor for NullExecutor {
        async fn execute(&self, _req: ExecuteRequest) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(json!({})))
        }

        async fn execute_write(&self, _req: ExecuteRequest) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(json!({})))
        }
    }

    #[test]
    fn catalog_covers_reads_and_writes() {
        let defs = bank_tool_definitions();
        assert_eq!(defs.len(), 10);

        let reads: Vec<_> = defs.iter().filter(|d| !d.requires_confirmation).collect();
        let writes: Vec<_> = defs.iter().filter(|d| d.requires_confirmation).collect();
        assert_eq!(reads.len(), 6);
        assert_eq!(writes.len(), 4);
    }

    #[test]
    fn every_definition_carries_thought() {
        for def in bank_tool_definitions() {
            let thought = &def.input_schema["properties"]["thought"];
            assert!(thought.is_object(), "{} lacks thought property", def.name);
        }
    }

    #[test]
    fn writes_require_thought_reads_do_not() {
        for def in bank_tool_definitions() {
            let required = def.input_schema["required"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            let thought_required = required.iter().any(|v| v == "thought");
            assert_eq!(
                thought_required, def.requires_confirmation,
                "thought requirement mismatch for {}",
                def.name
            );
        }
    }

    #[test]
    fn writes_have_summary_templates() {
        for def in bank_tool_definitions() {
            if def.requires_confirmation {
                assert!(
                    def.summary_template.is_some(),
                    "{} is a write without a summary template",
                    def.name
                );
            }
        }
    }

    #[test]
    fn send_money_summary_renders() {
        let defs = bank_tool_definitions();
        let send = defs.iter().find(|d| d.name == "send_money").unwrap();
        let summary = send.summary(&json!({
            "recipient": "@alice", "amount": "50", "currency": "USDC",
        }));
        assert_eq!(summary, "Send 50 USDC to @alice");
    }

    #[test]
    fn tools_register_cleanly() {
        let mut registry = ToolRegistry::new();
        for tool in bank_tools(Arc::new(NullExecutor)) {
            registry.register(tool).unwrap();
        }
        assert_eq!(registry.len(), 10);
        assert!(registry.get("get_balance").is_some());
        assert!(registry.get("execute_contract_call").is_some());
    }
}
