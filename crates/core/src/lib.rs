//! # LedgerMind Core
//!
//! Domain types, traits, and error definitions for the LedgerMind agent
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod audit;
pub mod error;
pub mod executor;
pub mod guardrails;
pub mod memory;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;
pub mod trace;

// Re-export key types at crate root for ergonomics
pub use audit::{AuditRecord, AuditSink, TracingAuditSink, VecAuditLog};
pub use error::{Error, MemoryError, ProviderError, Result, ScheduleError, ToolError};
pub use executor::{ExecuteRequest, ExecutorTool, ToolExecutor};
pub use guardrails::{Admission, Guardrails};
pub use memory::{Interaction, MemoryManager};
pub use message::{ContentBlock, Message, Role, TokenUsage};
pub use provider::{collect_stream, ModelProvider, ModelRequest, ModelResponse, StreamEvent};
pub use tool::{Tool, ToolDefinition, ToolParams, ToolRegistry, ToolResult, WireTool};
pub use trace::{
    idempotency_key, PendingAction, ToolExecution, Trace, OBSERVATION_AWAITING_CONFIRMATION,
};
