//! Cross-conversation memory: what one run learns, the next run sees.

use ledgermind_core::message::Message;
use ledgermind_core::tool::{ToolRegistry, ToolResult};
use ledgermind_engine::testing::{tool_use, tool_use_response, ScriptedProvider};
use ledgermind_engine::{Engine, OwnerContext, RunInput, RunOutput};
use ledgermind_memory::{HashEmbedder, InMemoryVectorStore, MemoryConfig, SimpleManager, VectorStore};
use ledgermind_tools::build_tool;
use serde_json::json;
use std::sync::Arc;

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            build_tool("search_users")
                .description("Search users")
                .handler(|_| async {
                    Ok(ToolResult::ok(json!({
                        "users": [{"id": "user_abc", "tag": "@alice"}],
                    })))
                })
                .build(),
        )
        .unwrap();
    registry
        .register(
            build_tool("send_money")
                .description("Send money")
                .requires_confirmation()
                .summary_template("Send {amount} {currency} to {recipient}")
                .handler(|_| async { Ok(ToolResult::ok(json!({"message": "Payment sent to user_abc"}))) })
                .build(),
        )
        .unwrap();
    Arc::new(registry)
}

#[tokio::test]
async fn confirmed_action_is_recalled_in_later_conversation() {
    let store = Arc::new(InMemoryVectorStore::new());
    let memory = Arc::new(SimpleManager::new(
        store.clone(),
        Arc::new(HashEmbedder::new()),
        MemoryConfig::enabled(),
    ));
    let registry = registry();

    // ── Conversation 1: resolve @alice, then send (with confirmation) ──
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_response(
            vec![tool_use("search_users", json!({"query": "alice"}))],
            "Resolving @alice before sending",
        ),
        tool_use_response(
            vec![tool_use(
                "send_money",
                json!({
                    "recipient": "user_abc", "amount": "50", "currency": "USDC",
                    "thought": "User asked to send $50 to @alice; search resolved @alice to user_abc",
                }),
            )],
            "",
        ),
    ]));
    let engine = Engine::new(provider, registry.clone()).with_memory(memory.clone());

    let output = engine
        .run(RunInput::new(
            "Send $50 to @alice",
            OwnerContext::new("user_1", "conv_1"),
        ))
        .await
        .unwrap();
    let RunOutput::ConfirmationNeeded { pending_action, response_blocks, .. } = output else {
        panic!("expected suspension on send_money");
    };

    // User approves; the engine resumes, executes, and records the trace
    let closing = Arc::new(ScriptedProvider::single_text("Done — sent $50 to @alice."));
    let engine = Engine::new(closing, registry.clone()).with_memory(memory.clone());

    let mut resume = RunInput::new("", OwnerContext::new("user_1", "conv_1"));
    resume.history = vec![
        Message::user("Send $50 to @alice"),
        Message::assistant_blocks(response_blocks),
    ];
    engine.run_confirmed(resume, &pending_action).await.unwrap();

    // The confirmed trace was stored
    assert!(store.count("user_1").await.unwrap() >= 1);

    // ── Conversation 2: the past action enriches the prompt ──
    let provider = Arc::new(ScriptedProvider::single_text(
        "Sure — sending $100 to @alice (user_abc).",
    ));
    let engine = Engine::new(provider.clone(), registry).with_memory(memory);

    engine
        .run(RunInput::new(
            "Send $100 to @alice again",
            OwnerContext::new("user_1", "conv_2"),
        ))
        .await
        .unwrap();

    let system = provider.last_system().expect("model was called");
    assert!(system.contains("=== RELEVANT PAST ACTIONS ==="));
    assert!(system.contains("@alice"), "enrichment lacks @alice: {system}");
    assert!(system.contains("user_abc"), "enrichment lacks user_abc: {system}");
}

#[tokio::test]
async fn other_owners_see_no_enrichment() {
    let store = Arc::new(InMemoryVectorStore::new());
    let memory = Arc::new(SimpleManager::new(
        store,
        Arc::new(HashEmbedder::new()),
        MemoryConfig::enabled(),
    ));
    let registry = registry();

    // Owner A records a multi-step run
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_response(
            vec![tool_use("search_users", json!({"query": "alice"}))],
            "Looking up @alice",
        ),
        tool_use_response(
            vec![tool_use("search_users", json!({"query": "alice smith"}))],
            "Narrowing the search",
        ),
        ledgermind_engine::testing::text_response("Found @alice."),
    ]));
    let engine = Engine::new(provider, registry.clone()).with_memory(memory.clone());
    engine
        .run(RunInput::new(
            "Who is @alice?",
            OwnerContext::new("owner_a", "conv_1"),
        ))
        .await
        .unwrap();

    // Owner B asks the same thing: no leakage
    let provider = Arc::new(ScriptedProvider::single_text("I don't know yet."));
    let engine = Engine::new(provider.clone(), registry).with_memory(memory);
    engine
        .run(RunInput::new(
            "Who is @alice?",
            OwnerContext::new("owner_b", "conv_9"),
        ))
        .await
        .unwrap();

    let system = provider.last_system().unwrap();
    assert!(!system.contains("RELEVANT PAST ACTIONS"));
}
