//! # LedgerMind Engine
//!
//! The agent loop: the turn-by-turn state machine that alternates between
//! model calls and tool execution, suspends write operations behind
//! human confirmation, records ReAct traces, and hooks guardrails, audit,
//! and episodic memory around each run.
//!
//! Entry points are [`Engine::run`] and [`Engine::run_confirmed`]; the
//! caller persists the [`PendingAction`](ledgermind_core::PendingAction)
//! and the history between the two.

pub mod engine;
pub mod input;
pub mod observation;
pub mod session;
pub mod testing;

pub use engine::{Engine, DEFAULT_SYSTEM_PROMPT, OBSERVATION_CONFIRMATION_BLOCKED};
pub use input::{
    ExecutionLimits, OwnerContext, RunError, RunErrorKind, RunInput, RunOutput, StreamCallback,
};
pub use session::Session;
