//! End-to-end tests for the agent loop: scripted model, in-process tools.

use ledgermind_core::audit::VecAuditLog;
use ledgermind_core::guardrails::{Admission, Guardrails};
use ledgermind_core::message::{ContentBlock, Message, Role};
use ledgermind_core::tool::{ToolRegistry, ToolResult};
use ledgermind_core::trace::{idempotency_key, OBSERVATION_AWAITING_CONFIRMATION};
use ledgermind_engine::testing::{tool_use, tool_use_response, text_response, ScriptedProvider};
use ledgermind_engine::{
    Engine, ExecutionLimits, OwnerContext, RunErrorKind, RunInput, RunOutput,
    OBSERVATION_CONFIRMATION_BLOCKED,
};
use ledgermind_tools::build_tool;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn owner() -> OwnerContext {
    OwnerContext::new("user_1", "conv_1")
}

fn balance_tool() -> Arc<dyn ledgermind_core::tool::Tool> {
    build_tool("get_balance")
        .description("Get the balance")
        .handler(|_| async { Ok(ToolResult::ok(json!({"usd": "100.00"}))) })
        .build()
}

fn send_money_tool() -> Arc<dyn ledgermind_core::tool::Tool> {
    build_tool("send_money")
        .description("Send money")
        .requires_confirmation()
        .summary_template("Send {amount} {currency} to {recipient}")
        .handler(|params| async move {
            assert!(
                params.confirmation_id.is_none(),
                "confirmed execution passes no confirmation id"
            );
            Ok(ToolResult::ok(json!({"message": "Payment sent"})))
        })
        .build()
}

fn registry_with(tools: Vec<Arc<dyn ledgermind_core::tool::Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).unwrap();
    }
    Arc::new(registry)
}

// ── Scenario: read-only query ─────────────────────────────────────────────

#[tokio::test]
async fn read_only_query_completes() {
    let provider = Arc::new(ScriptedProvider::tool_then_answer(
        vec![tool_use("get_balance", json!({}))],
        "Checking the balance",
        "You have $100.00.",
    ));
    let engine = Engine::new(provider.clone(), registry_with(vec![balance_tool()]));

    let output = engine
        .run(RunInput::new("What's my balance?", owner()))
        .await
        .unwrap();

    match &output {
        RunOutput::Complete { text, traces, tools_used, tokens_used, .. } => {
            assert_eq!(text, "You have $100.00.");
            assert_eq!(traces.len(), 1);
            assert!(traces[0].success);
            assert_eq!(traces[0].action, "get_balance");
            assert_eq!(tools_used.len(), 1);
            // Two model calls at 10/5 each
            assert_eq!(tokens_used.input_tokens, 20);
            assert_eq!(tokens_used.output_tokens, 10);
        }
        other => panic!("expected Complete, got {other:?}"),
    }

    // The tool result was fed back to the model verbatim
    let messages = provider.last_messages();
    let fed_back = messages
        .iter()
        .filter(|m| m.role == Role::ToolResult)
        .flat_map(|m| &m.content)
        .any(|b| matches!(b, ContentBlock::ToolResult { content, is_error, .. }
            if content.contains("100.00") && !is_error));
    assert!(fed_back, "tool result missing from follow-up request");
}

// ── Scenario: write with confirmation ─────────────────────────────────────

#[tokio::test]
async fn write_suspends_for_confirmation() {
    let audit = Arc::new(VecAuditLog::new());
    let provider = Arc::new(ScriptedProvider::new(vec![tool_use_response(
        vec![tool_use(
            "send_money",
            json!({
                "recipient": "@alice", "amount": "50", "currency": "USDC",
                "thought": "user asked to send",
            }),
        )],
        "",
    )]));
    let engine = Engine::new(provider.clone(), registry_with(vec![send_money_tool()]))
        .with_audit(audit.clone());

    let output = engine
        .run(RunInput::new("Send $50 to @alice", owner()))
        .await
        .unwrap();

    let RunOutput::ConfirmationNeeded { pending_action, traces, .. } = &output else {
        panic!("expected ConfirmationNeeded, got {output:?}");
    };

    assert_eq!(pending_action.tool, "send_money");
    assert_eq!(pending_action.summary, "Send 50 USDC to @alice");
    assert_eq!(pending_action.block_id, "toolu_send_money");
    assert_eq!(pending_action.owner_id, "user_1");
    assert_eq!(
        pending_action.idempotency_key,
        idempotency_key("user_1", "send_money", &pending_action.input)
    );

    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].observation, OBSERVATION_AWAITING_CONFIRMATION);
    assert!(!traces[0].success);
    assert_eq!(traces[0].thought, "user asked to send");

    // Nothing executed yet, so nothing audited
    assert_eq!(audit.count(), 0);
}

// ── Scenario: missing thought ─────────────────────────────────────────────

#[tokio::test]
async fn missing_thought_instructs_model() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_response(
            vec![tool_use(
                "send_money",
                json!({"recipient": "@alice", "amount": "50", "currency": "USDC", "thought": ""}),
            )],
            "",
        ),
        tool_use_response(
            vec![tool_use(
                "send_money",
                json!({
                    "recipient": "@alice", "amount": "50", "currency": "USDC",
                    "thought": "user asked to send $50 to @alice",
                }),
            )],
            "",
        ),
    ]));
    let engine = Engine::new(provider.clone(), registry_with(vec![send_money_tool()]));

    let output = engine
        .run(RunInput::new("Send $50 to @alice", owner()))
        .await
        .unwrap();

    // First attempt was rejected with guidance, second attempt suspends
    assert_eq!(provider.call_count(), 2);
    assert!(output.pending_action().is_some());

    let messages = provider.last_messages();
    let guidance = messages
        .iter()
        .flat_map(|m| &m.content)
        .any(|b| matches!(b, ContentBlock::ToolResult { content, is_error, .. }
            if *is_error && content.contains("thought")));
    assert!(guidance, "missing-thought guidance not fed back");
}

// ── Scenario: turn-limit exhaustion ───────────────────────────────────────

#[tokio::test]
async fn turn_limit_reports_accumulated_usage() {
    let responses = (0..3)
        .map(|_| tool_use_response(vec![tool_use("get_balance", json!({}))], "Thinking..."))
        .collect();
    let provider = Arc::new(ScriptedProvider::new(responses));
    let engine = Engine::new(provider.clone(), registry_with(vec![balance_tool()]));

    let input = RunInput::new(
        "Loop forever",
        owner().with_limits(ExecutionLimits {
            max_turns: 2,
            ..ExecutionLimits::default()
        }),
    );
    let err = engine.run(input).await.unwrap_err();

    assert_eq!(err.to_string(), "exceeded maximum turns (2)");
    assert!(matches!(err.kind, RunErrorKind::TurnLimitExceeded(2)));
    assert_eq!(provider.call_count(), 2);
    assert_eq!(err.tokens_used.input_tokens, 20);
    assert_eq!(err.tokens_used.output_tokens, 10);
}

#[tokio::test]
async fn zero_turn_limit_errors_before_any_model_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let engine = Engine::new(provider.clone(), registry_with(vec![]));

    let input = RunInput::new(
        "hello",
        owner().with_limits(ExecutionLimits {
            max_turns: 0,
            ..ExecutionLimits::default()
        }),
    );
    let err = engine.run(input).await.unwrap_err();

    assert!(matches!(err.kind, RunErrorKind::TurnLimitExceeded(0)));
    assert_eq!(provider.call_count(), 0);
}

// ── Local recovery: unknown tool, invalid input ───────────────────────────

#[tokio::test]
async fn unknown_tool_recovers_in_loop() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_response(vec![tool_use("get_weather", json!({}))], ""),
        text_response("I don't have a weather tool."),
    ]));
    let engine = Engine::new(provider.clone(), registry_with(vec![balance_tool()]));

    let output = engine.run(RunInput::new("Weather?", owner())).await.unwrap();

    assert_eq!(output.text(), "I don't have a weather tool.");
    // Unknown tools never produce traces
    assert!(output.traces().is_empty());

    let messages = provider.last_messages();
    let error_fed = messages
        .iter()
        .flat_map(|m| &m.content)
        .any(|b| matches!(b, ContentBlock::ToolResult { content, is_error, .. }
            if *is_error && content == "unknown tool: get_weather"));
    assert!(error_fed);
}

#[tokio::test]
async fn non_object_input_recovers_in_loop() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_response(vec![tool_use("get_balance", json!("not-an-object"))], ""),
        text_response("Let me try that differently."),
    ]));
    let engine = Engine::new(provider.clone(), registry_with(vec![balance_tool()]));

    let output = engine.run(RunInput::new("Balance?", owner())).await.unwrap();
    assert_eq!(output.text(), "Let me try that differently.");
    assert!(output.traces().is_empty());
}

// ── Confirmation disabled ─────────────────────────────────────────────────

#[tokio::test]
async fn write_blocked_when_confirmation_disabled() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_response(
            vec![tool_use(
                "send_money",
                json!({
                    "recipient": "@alice", "amount": "50", "currency": "USDC",
                    "thought": "scheduled context, sending directly",
                }),
            )],
            "",
        ),
        text_response("I can't do that here."),
    ]));
    let engine = Engine::new(provider, registry_with(vec![send_money_tool()]));

    let input = RunInput::new(
        "Send $50 to @alice",
        owner().with_limits(ExecutionLimits {
            can_confirm: false,
            ..ExecutionLimits::default()
        }),
    );
    let output = engine.run(input).await.unwrap();

    let traces = output.traces();
    assert_eq!(traces.len(), 1);
    assert!(!traces[0].success);
    assert_eq!(traces[0].observation, OBSERVATION_CONFIRMATION_BLOCKED);
    assert_eq!(
        traces[0].metadata.get("error").map(String::as_str),
        Some("confirmation_disabled")
    );
    assert!(output.pending_action().is_none());
}

// ── Admission and deadline ────────────────────────────────────────────────

struct DenyingGuardrails;

#[async_trait::async_trait]
impl Guardrails for DenyingGuardrails {
    async fn check(&self, _owner_id: &str) -> Result<Admission, ledgermind_core::Error> {
        Ok(Admission::deny("rate limit exceeded"))
    }

    async fn record_success(&self, _owner_id: &str) {}
}

#[tokio::test]
async fn admission_denied_before_model_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let engine = Engine::new(provider.clone(), registry_with(vec![]))
        .with_guardrails(Arc::new(DenyingGuardrails));

    let err = engine.run(RunInput::new("hi", owner())).await.unwrap_err();
    assert!(matches!(err.kind, RunErrorKind::AdmissionDenied(ref w) if w == "rate limit exceeded"));
    assert_eq!(provider.call_count(), 0);
}

struct CountingGuardrails {
    successes: AtomicUsize,
}

#[async_trait::async_trait]
impl Guardrails for CountingGuardrails {
    async fn check(&self, _owner_id: &str) -> Result<Admission, ledgermind_core::Error> {
        Ok(Admission::allow())
    }

    async fn record_success(&self, _owner_id: &str) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn guardrails_notified_on_success() {
    let guardrails = Arc::new(CountingGuardrails {
        successes: AtomicUsize::new(0),
    });
    let provider = Arc::new(ScriptedProvider::single_text("Done."));
    let engine =
        Engine::new(provider, registry_with(vec![])).with_guardrails(guardrails.clone());

    engine.run(RunInput::new("hi", owner())).await.unwrap();
    assert_eq!(guardrails.successes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_deadline_aborts_run() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let engine = Engine::new(provider.clone(), registry_with(vec![]));

    let input = RunInput::new(
        "hi",
        owner().with_limits(ExecutionLimits {
            timeout: Some(Duration::ZERO),
            ..ExecutionLimits::default()
        }),
    );
    let err = engine.run(input).await.unwrap_err();
    assert!(matches!(err.kind, RunErrorKind::Deadline));
    assert_eq!(err.to_string(), "timed out");
    assert_eq!(provider.call_count(), 0);
}

// ── Audit ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn read_execution_is_audited() {
    let audit = Arc::new(VecAuditLog::new());
    let provider = Arc::new(ScriptedProvider::tool_then_answer(
        vec![tool_use("get_balance", json!({}))],
        "",
        "You have $100.00.",
    ));
    let engine = Engine::new(provider, registry_with(vec![balance_tool()]))
        .with_audit(audit.clone());

    engine
        .run(RunInput::new("Balance?", owner()))
        .await
        .unwrap();

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tool_name, "get_balance");
    assert_eq!(records[0].owner_id, "user_1");
    assert_eq!(records[0].agent_name, "default");
    assert!(!records[0].is_write_op);
    assert!(records[0].error.is_none());
}

// ── Confirmed resumption ──────────────────────────────────────────────────

#[tokio::test]
async fn run_confirmed_executes_and_closes() {
    let audit = Arc::new(VecAuditLog::new());
    let registry = registry_with(vec![send_money_tool()]);

    // First run: suspend on the write
    let provider = Arc::new(ScriptedProvider::new(vec![tool_use_response(
        vec![tool_use(
            "send_money",
            json!({
                "recipient": "@alice", "amount": "50", "currency": "USDC",
                "thought": "user asked to send $50",
            }),
        )],
        "",
    )]));
    let engine = Engine::new(provider, registry.clone()).with_audit(audit.clone());

    let output = engine
        .run(RunInput::new("Send $50 to @alice", owner()))
        .await
        .unwrap();
    let RunOutput::ConfirmationNeeded { pending_action, response_blocks, .. } = output else {
        panic!("expected suspension");
    };

    // The caller persists history = prior log + the assistant response
    let history = vec![
        Message::user("Send $50 to @alice"),
        Message::assistant_blocks(response_blocks),
    ];

    // Resume on a fresh engine (fresh provider script): one closing call
    let closing = Arc::new(ScriptedProvider::single_text("Sent $50 to @alice!"));
    let engine = Engine::new(closing.clone(), registry).with_audit(audit.clone());

    let mut input = RunInput::new("", owner());
    input.history = history;
    let resumed = engine.run_confirmed(input, &pending_action).await.unwrap();

    let RunOutput::Complete { text, traces, tools_used, .. } = resumed else {
        panic!("expected completion");
    };
    assert_eq!(text, "Sent $50 to @alice!");
    assert_eq!(closing.call_count(), 1);

    assert_eq!(traces.len(), 1);
    assert!(traces[0].success);
    assert_eq!(traces[0].metadata.get("confirmed").map(String::as_str), Some("true"));
    assert_eq!(
        traces[0].metadata.get("confirmation_id"),
        Some(&pending_action.id)
    );
    assert_eq!(traces[0].observation, "Payment sent");

    assert_eq!(tools_used.len(), 1);
    assert_eq!(tools_used[0].tool, "send_money");

    // The confirmed execution is audited as a write
    let records = audit.records_for_tool("send_money");
    assert_eq!(records.len(), 1);
    assert!(records[0].is_write_op);

    // The tool_result answered the original block id
    let messages = closing.last_messages();
    let answered = messages
        .iter()
        .flat_map(|m| &m.content)
        .any(|b| matches!(b, ContentBlock::ToolResult { tool_use_id, is_error, .. }
            if tool_use_id == &pending_action.block_id && !is_error));
    assert!(answered, "tool_result not matched to the original block");
}

#[tokio::test]
async fn run_confirmed_unknown_tool_errors() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let engine = Engine::new(provider, registry_with(vec![]));

    let pending = ledgermind_core::trace::PendingAction::new(
        "sess_1",
        "user_1",
        "vanished_tool",
        json!({}),
        "t",
        "s",
        "toolu_1",
    );
    let err = engine
        .run_confirmed(RunInput::new("", owner()), &pending)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, RunErrorKind::UnknownTool(ref name) if name == "vanished_tool"));
}

// ── Streaming ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_callback_receives_chunks_and_done() {
    let provider = Arc::new(ScriptedProvider::single_text("Hello there."));
    let engine = Engine::new(provider, registry_with(vec![]));

    let chunks: Arc<std::sync::Mutex<Vec<(String, bool)>>> =
        Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = chunks.clone();

    let mut input = RunInput::new("hi", owner());
    input.stream_callback = Some(Arc::new(move |chunk: &str, done: bool| {
        sink.lock().unwrap().push((chunk.to_string(), done));
    }));

    let output = engine.run(input).await.unwrap();
    assert_eq!(output.text(), "Hello there.");

    let chunks = chunks.lock().unwrap();
    assert!(chunks.iter().any(|(c, done)| c == "Hello there." && !done));
    assert_eq!(chunks.last().unwrap(), &(String::new(), true));
}

// ── Tool failure surfaces to the model, loop continues ────────────────────

#[tokio::test]
async fn tool_failure_classified_and_loop_continues() {
    let failing = build_tool("send_money_probe")
        .description("Always fails")
        .handler(|_| async { Ok(ToolResult::failure("insufficient balance for transfer")) })
        .build();

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_response(vec![tool_use("send_money_probe", json!({}))], ""),
        text_response("Your balance is too low."),
    ]));
    let engine = Engine::new(provider, registry_with(vec![failing]));

    let output = engine.run(RunInput::new("probe", owner())).await.unwrap();
    assert_eq!(output.text(), "Your balance is too low.");

    let traces = output.traces();
    assert_eq!(traces.len(), 1);
    assert!(!traces[0].success);
    assert_eq!(traces[0].observation, "Failed: insufficient balance for transfer");
    assert_eq!(
        traces[0].metadata.get("error_type").map(String::as_str),
        Some("insufficient_balance")
    );
    assert!(traces[0].metadata.contains_key("prevention"));
}

// ── Direct tool execution ─────────────────────────────────────────────────

#[tokio::test]
async fn execute_tool_forwards_confirmation_id() {
    let probe = build_tool("probe")
        .handler(|params| async move {
            Ok(ToolResult::ok(json!({
                "confirmation_id": params.confirmation_id,
            })))
        })
        .build();
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let engine = Engine::new(provider, registry_with(vec![probe]));

    let result = engine
        .execute_tool("user_1", "probe", json!({}), Some("conf_9".into()))
        .await
        .unwrap();
    assert_eq!(result.data["confirmation_id"], "conf_9");

    let missing = engine
        .execute_tool("user_1", "nope", json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(missing, ledgermind_core::ToolError::NotFound(_)));
}
