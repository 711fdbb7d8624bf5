//! The agent loop engine.
//!
//! Drives the Reason-Act-Observe cycle: call the model, partition the
//! response into text and tool uses, dispatch tools in emitted order, and
//! feed results back until the model produces a terminal text response.
//! Write operations suspend the loop behind a `PendingAction` and resume
//! through [`Engine::run_confirmed`] after human approval.
//!
//! Per-block failures (bad input, unknown tool, missing thought, tool
//! errors) never abort a run: they are surfaced to the model as error
//! tool_results so it can self-correct. Only admission denial, provider
//! failure, turn exhaustion, and the deadline abort.

use crate::input::{RunError, RunErrorKind, RunInput, RunOutput, StreamCallback};
use crate::observation::{categorize_error, format_observation, prevention_hint};
use crate::session::Session;
use ledgermind_core::audit::{AuditRecord, AuditSink};
use ledgermind_core::error::{ProviderError, ToolError};
use ledgermind_core::guardrails::Guardrails;
use ledgermind_core::memory::{Interaction, MemoryManager};
use ledgermind_core::message::{ContentBlock, TokenUsage};
use ledgermind_core::provider::{collect_stream, ModelProvider, ModelRequest, ModelResponse};
use ledgermind_core::tool::{Tool, ToolParams, ToolRegistry, ToolResult};
use ledgermind_core::trace::{
    PendingAction, ToolExecution, Trace, OBSERVATION_AWAITING_CONFIRMATION,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_AGENT_NAME: &str = "default";

/// Observation recorded when a write is attempted in a context that cannot
/// confirm.
pub const OBSERVATION_CONFIRMATION_BLOCKED: &str =
    "Operation blocked: confirmation not allowed in this context";

/// Sent to the model when a write tool is called without a thought.
const THOUGHT_REQUIRED_MESSAGE: &str = r#"Error: Missing or empty "thought" field. Write operations require explicit reasoning.
Please explain:
1. What you've verified (e.g., "Balance is $500, sufficient for $100 transfer")
2. Why you're taking this action (e.g., "User requested transfer to Alice")
3. What you expect to happen (e.g., "This will complete the payment")"#;

/// The agent runner: executes tools and manages model interactions.
pub struct Engine {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    guardrails: Option<Arc<dyn Guardrails>>,
    audit: Option<Arc<dyn AuditSink>>,
    memory: Option<Arc<dyn MemoryManager>>,
}

impl Engine {
    pub fn new(provider: Arc<dyn ModelProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            guardrails: None,
            audit: None,
            memory: None,
        }
    }

    /// Attach guardrails for pre-call admission control.
    pub fn with_guardrails(mut self, guardrails: Arc<dyn Guardrails>) -> Self {
        self.guardrails = Some(guardrails);
        self
    }

    /// Attach an audit sink for per-tool-call records.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Attach a memory manager for enrichment and trace recording.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryManager>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute the agent loop until completion or confirmation suspension.
    pub async fn run(&self, input: RunInput) -> Result<RunOutput, RunError> {
        let mut tokens = TokenUsage::default();

        // Phase 0: admission
        if let Some(guardrails) = &self.guardrails {
            match guardrails.check(&input.owner.owner_id).await {
                Ok(admission) => {
                    if !admission.allowed {
                        return Err(RunError::new(
                            RunErrorKind::AdmissionDenied(admission.warning),
                            tokens,
                        ));
                    }
                }
                Err(e) => {
                    return Err(RunError::new(
                        RunErrorKind::AdmissionDenied(format!("guardrails check failed: {e}")),
                        tokens,
                    ));
                }
            }
        }

        // Phase 1: enrichment (non-fatal)
        let mut system_prompt = input
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        if let Some(memory) = &self.memory {
            if !input.user_message.is_empty() {
                debug!(owner = %input.owner.owner_id, "retrieving memories for query");
                match memory
                    .retrieve(&input.owner.owner_id, &input.user_message)
                    .await
                {
                    Ok(enrichment) if !enrichment.is_empty() => {
                        debug!("memory enrichment retrieved");
                        system_prompt.push_str("\n\n");
                        system_prompt.push_str(&enrichment);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("memory retrieval failed: {e}"),
                }
            }
        }

        // Defaults and limits
        let model = input
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let limits = input.owner.limits.clone().unwrap_or_default();
        let max_tokens = input
            .max_tokens
            .or(limits.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let agent_name = input
            .agent_name
            .clone()
            .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string());
        let deadline = limits.timeout.map(|t| tokio::time::Instant::now() + t);

        // Phase 2: session bootstrap
        let mut session = Session::new(&input.owner.owner_id, &input.owner.conversation_id);
        session.restore_history(&input.history);
        if !input.user_message.is_empty() {
            session.add_user_message(&input.user_message);
        }

        let filter = (!input.available_tools.is_empty()).then_some(&input.available_tools[..]);
        let wire_tools = self.registry.to_wire_tools(filter);

        let mut tools_used: Vec<ToolExecution> = Vec::new();

        loop {
            if let Some(d) = deadline {
                if tokio::time::Instant::now() >= d {
                    return Err(RunError::new(RunErrorKind::Deadline, tokens));
                }
            }

            session.increment_turn();
            if session.turn_count > limits.max_turns {
                return Err(RunError::new(
                    RunErrorKind::TurnLimitExceeded(limits.max_turns),
                    tokens,
                ));
            }

            debug!(
                session_id = %session.id,
                turn = session.turn_count,
                "agent loop turn"
            );

            let request = ModelRequest {
                model: model.clone(),
                max_tokens,
                system: system_prompt.clone(),
                messages: session.messages.clone(),
                tools: wire_tools.clone(),
            };

            let response = self
                .call_model(request, input.stream_callback.as_ref(), deadline)
                .await
                .map_err(|kind| RunError::new(kind, tokens))?;
            tokens.accumulate(response.usage);

            let text_response = response.text();
            let mut tool_results: Vec<ContentBlock> = Vec::new();

            for block in &response.content {
                let ContentBlock::ToolUse {
                    id: block_id,
                    name,
                    input: tool_input,
                } = block
                else {
                    continue;
                };

                // Decode: tool inputs are always objects
                if !tool_input.is_object() {
                    tool_results.push(ContentBlock::tool_result(
                        block_id,
                        "invalid tool input: expected a JSON object",
                        true,
                    ));
                    continue;
                }
                let thought = match tool_input.get("thought") {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.trim().to_string(),
                    Some(_) => {
                        tool_results.push(ContentBlock::tool_result(
                            block_id,
                            "invalid tool input: thought must be a string",
                            true,
                        ));
                        continue;
                    }
                };

                let Some(tool) = self.registry.get(name) else {
                    tool_results.push(ContentBlock::tool_result(
                        block_id,
                        format!("unknown tool: {name}"),
                        true,
                    ));
                    continue;
                };
                let requires_confirmation = tool.definition().requires_confirmation;

                // Enforce thought presence for write operations
                if requires_confirmation && thought.is_empty() {
                    tool_results.push(ContentBlock::tool_result(
                        block_id,
                        THOUGHT_REQUIRED_MESSAGE,
                        true,
                    ));
                    continue;
                }

                // THINK phase captured
                let mut trace = Trace::begin(
                    &session.id,
                    session.turn_count,
                    &thought,
                    name,
                    tool_input.clone(),
                );

                if requires_confirmation {
                    if !limits.can_confirm {
                        trace.observe(OBSERVATION_CONFIRMATION_BLOCKED, false);
                        trace
                            .metadata
                            .insert("error".into(), "confirmation_disabled".into());
                        info!(trace = %trace, "react trace");
                        session.add_trace(trace);
                        tool_results.push(ContentBlock::tool_result(
                            block_id,
                            "error: this operation requires user confirmation",
                            true,
                        ));
                        continue;
                    }

                    // Suspend: hand a pending action back to the caller
                    let pending = PendingAction::new(
                        &session.id,
                        &session.owner_id,
                        name,
                        tool_input.clone(),
                        &thought,
                        tool.definition().summary(tool_input),
                        block_id,
                    );

                    trace.observe(OBSERVATION_AWAITING_CONFIRMATION, false);
                    trace
                        .metadata
                        .insert("confirmation_id".into(), pending.id.clone());
                    trace
                        .metadata
                        .insert("status".into(), "pending_confirmation".into());
                    info!(trace = %trace, "react trace");
                    session.add_trace(trace);
                    session.add_assistant_response(&response);

                    return Ok(RunOutput::ConfirmationNeeded {
                        text: text_response,
                        pending_action: pending,
                        traces: session.traces.clone(),
                        tools_used,
                        response_blocks: response.content.clone(),
                        tokens_used: tokens,
                    });
                }

                // ACT
                let started = Instant::now();
                let outcome = tool
                    .execute(ToolParams {
                        owner_id: session.owner_id.clone(),
                        input: tool_input.clone(),
                        request_id: session.id.clone(),
                        confirmation_id: None,
                    })
                    .await;
                let duration_ms = started.elapsed().as_millis() as u64;

                // OBSERVE
                complete_trace(&mut trace, tool.as_ref(), &outcome);
                info!(trace = %trace, "react trace");
                session.add_trace(trace);

                self.emit_audit(
                    &session,
                    &agent_name,
                    input.owner.audit_parent_id.clone(),
                    name,
                    tool_input,
                    &outcome,
                    duration_ms,
                    requires_confirmation,
                );

                tool_results.push(result_block(block_id, &outcome));
                tools_used.push(execution_record(name, tool_input, &outcome, duration_ms));
            }

            // No tool uses: the text is terminal
            if tool_results.is_empty() {
                session.add_assistant_text(&text_response);

                if let Some(callback) = &input.stream_callback {
                    callback("", true);
                }

                if let Some(guardrails) = &self.guardrails {
                    guardrails.record_success(&input.owner.owner_id).await;
                }

                self.record_memory(
                    &input.owner.owner_id,
                    Interaction {
                        user_text: input.user_message.clone(),
                        assistant_text: text_response.clone(),
                        traces: session.traces.clone(),
                    },
                )
                .await;

                return Ok(RunOutput::Complete {
                    text: text_response,
                    traces: session.traces.clone(),
                    tools_used,
                    response_blocks: response.content.clone(),
                    tokens_used: tokens,
                });
            }

            // Feed results back and continue
            session.add_assistant_response(&response);
            session.add_tool_results(tool_results);
        }
    }

    /// Resume the loop for a confirmed write operation.
    ///
    /// Reconstitutes the session from the supplied history (which contains
    /// the original tool_use block), executes the tool directly, then makes
    /// one closing model call so the model can respond to the result.
    pub async fn run_confirmed(
        &self,
        input: RunInput,
        pending: &PendingAction,
    ) -> Result<RunOutput, RunError> {
        let mut tokens = TokenUsage::default();

        let mut session = Session::new(&input.owner.owner_id, &input.owner.conversation_id);
        session.restore_history(&input.history);

        let Some(tool) = self.registry.get(&pending.tool) else {
            return Err(RunError::new(
                RunErrorKind::UnknownTool(pending.tool.clone()),
                tokens,
            ));
        };

        // THINK phase happened at suspension time; replay it
        let mut trace = Trace::begin(
            &session.id,
            session.turn_count,
            &pending.thought,
            &pending.tool,
            pending.input.clone(),
        );
        trace.metadata.insert("confirmed".into(), "true".into());
        trace
            .metadata
            .insert("confirmation_id".into(), pending.id.clone());

        // ACT. No confirmation id: approval was already granted here, so
        // the write path executes directly instead of re-confirming with
        // the remote collaborator.
        let started = Instant::now();
        let outcome = tool
            .execute(ToolParams {
                owner_id: pending.owner_id.clone(),
                input: pending.input.clone(),
                request_id: session.id.clone(),
                confirmation_id: None,
            })
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        // OBSERVE
        complete_trace(&mut trace, tool.as_ref(), &outcome);
        info!(trace = %trace, "react trace");
        session.add_trace(trace);

        let agent_name = input
            .agent_name
            .clone()
            .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string());
        self.emit_audit(
            &session,
            &agent_name,
            input.owner.audit_parent_id.clone(),
            &pending.tool,
            &pending.input,
            &outcome,
            duration_ms,
            true,
        );

        // The tool_use block is already in history; answer it by block id
        session.add_tool_results(vec![result_block(&pending.block_id, &outcome)]);

        // One closing model call for a contextual response
        let request = ModelRequest {
            model: input
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: input.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: input
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            messages: session.messages.clone(),
            tools: Vec::new(),
        };

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| RunError::new(RunErrorKind::Provider(e), tokens))?;
        tokens.accumulate(response.usage);

        let text = response.text();
        session.add_assistant_response(&response);

        let execution = execution_record(&pending.tool, &pending.input, &outcome, duration_ms);

        self.record_memory(
            &input.owner.owner_id,
            Interaction {
                user_text: input.user_message.clone(),
                assistant_text: text.clone(),
                traces: session.traces.clone(),
            },
        )
        .await;

        Ok(RunOutput::Complete {
            text,
            traces: session.traces.clone(),
            tools_used: vec![execution],
            response_blocks: response.content.clone(),
            tokens_used: tokens,
        })
    }

    /// Execute a single tool directly, outside the loop.
    ///
    /// Used by non-interactive callers that manage their own confirmation
    /// flow (the confirmation id is forwarded to the tool).
    pub async fn execute_tool(
        &self,
        owner_id: &str,
        tool_name: &str,
        input: serde_json::Value,
        confirmation_id: Option<String>,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        let request_id = confirmation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tool.execute(ToolParams {
            owner_id: owner_id.to_string(),
            input,
            request_id,
            confirmation_id,
        })
        .await
    }

    async fn call_model(
        &self,
        request: ModelRequest,
        stream_callback: Option<&StreamCallback>,
        deadline: Option<tokio::time::Instant>,
    ) -> Result<ModelResponse, RunErrorKind> {
        let call = async {
            match stream_callback {
                Some(callback) => {
                    let rx = self.provider.stream(request).await?;
                    collect_stream(rx, |delta| callback(delta, false)).await
                }
                None => self.provider.complete(request).await,
            }
        };

        let result: Result<ModelResponse, ProviderError> = match deadline {
            Some(d) => match tokio::time::timeout_at(d, call).await {
                Ok(r) => r,
                Err(_) => return Err(RunErrorKind::Deadline),
            },
            None => call.await,
        };

        result.map_err(RunErrorKind::Provider)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_audit(
        &self,
        session: &Session,
        agent_name: &str,
        parent_id: Option<String>,
        tool_name: &str,
        tool_input: &serde_json::Value,
        outcome: &Result<ToolResult, ToolError>,
        duration_ms: u64,
        is_write_op: bool,
    ) {
        let Some(audit) = &self.audit else {
            return;
        };

        let (tool_output, error) = match outcome {
            Ok(result) => (
                result.data.clone(),
                result.error.clone().filter(|e| !e.is_empty()),
            ),
            Err(e) => (serde_json::Value::Null, Some(e.to_string())),
        };

        audit.log(&AuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: session.owner_id.clone(),
            session_id: session.id.clone(),
            request_id: session.id.clone(),
            parent_id,
            agent_name: agent_name.to_string(),
            tool_name: tool_name.to_string(),
            tool_input: tool_input.clone(),
            tool_output,
            error,
            duration_ms,
            is_write_op,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Record the interaction with the memory manager. Completes before the
    /// run returns; failures are logged and never fail the run.
    async fn record_memory(&self, owner_id: &str, interaction: Interaction) {
        let Some(memory) = &self.memory else {
            return;
        };
        let has_conversation =
            !interaction.user_text.is_empty() && !interaction.assistant_text.is_empty();
        if interaction.traces.is_empty() && !has_conversation {
            return;
        }

        debug!(traces = interaction.traces.len(), "recording interaction");
        if let Err(e) = memory.record(owner_id, &interaction).await {
            warn!("failed to record interaction: {e}");
        }
    }
}

/// Fill in the OBSERVE phase of a trace from a tool outcome, including the
/// failure taxonomy and prevention hint.
fn complete_trace(trace: &mut Trace, tool: &dyn Tool, outcome: &Result<ToolResult, ToolError>) {
    let (result, error) = match outcome {
        Ok(r) => (Some(r), None),
        Err(e) => (None, Some(e)),
    };
    let success = matches!(outcome, Ok(r) if r.success);
    trace.observe(format_observation(tool, result, error), success);

    if !success {
        let message = match outcome {
            Err(e) => e.to_string(),
            Ok(r) => r.error.clone().unwrap_or_default(),
        };
        let category = categorize_error(&message);
        trace
            .metadata
            .insert("prevention".into(), prevention_hint(&trace.action, category));
        trace.metadata.insert("error_type".into(), category.into());
        trace.metadata.insert("error".into(), message);
    }
}

/// Build the tool_result block reported back to the model.
fn result_block(block_id: &str, outcome: &Result<ToolResult, ToolError>) -> ContentBlock {
    match outcome {
        Err(e) => ContentBlock::tool_result(block_id, e.to_string(), true),
        Ok(r) if !r.success => {
            ContentBlock::tool_result(block_id, r.error.clone().unwrap_or_default(), true)
        }
        Ok(r) => ContentBlock::tool_result(block_id, r.data.to_string(), false),
    }
}

/// Build the tools-used record for the caller.
fn execution_record(
    tool: &str,
    input: &serde_json::Value,
    outcome: &Result<ToolResult, ToolError>,
    duration_ms: u64,
) -> ToolExecution {
    let (result, error) = match outcome {
        Ok(r) if r.success => (Some(r.data.clone()), None),
        Ok(r) => (None, r.error.clone()),
        Err(e) => (None, Some(e.to_string())),
    };
    ToolExecution {
        tool: tool.to_string(),
        input: input.clone(),
        result,
        error,
        duration_ms,
    }
}

/// The default system prompt for the agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful financial assistant.

GUIDELINES:
- Be conversational and helpful
- Ask clarifying questions when needed
- Use tools when you have enough information
- All money movements require user confirmation

REASONING PATTERN:
When using tools, include a "thought" field explaining your reasoning:
1. What you've verified (e.g., "User's balance is $500, sufficient for $100 transfer")
2. Why you're taking this action (e.g., "Need to check balance before attempting transfer")
3. What you expect to happen (e.g., "This will return the current account balance")

For write operations (transfers, payments, withdrawals), the thought field is REQUIRED.

Good thought examples:
- "User requested $50 to Alice. I've confirmed the amount and will check if balance is sufficient."
- "Balance is $200, sufficient for $50 transfer. Proceeding with send_money."

Bad thought examples:
- "Sending money" (too vague, doesn't explain reasoning)
- "User asked" (doesn't verify or explain decision)

AVAILABLE ACTIONS:
- Check balances and transactions
- Send money to other users
- Manage savings deposits and withdrawals
- Look up user profiles"#;
