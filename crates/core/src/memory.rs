//! Memory manager contract — the engine-facing surface of episodic memory.
//!
//! The engine is opinionated about WHEN memory is consulted (enrichment
//! before the first model call, recording after the final response). The
//! manager is unopinionated about HOW: which records to retrieve, how to
//! format them, and which traces are worth keeping are implementation
//! decisions behind this trait.

use crate::error::MemoryError;
use crate::trace::Trace;
use async_trait::async_trait;

/// A complete user-agent interaction handed to the manager for recording:
/// the user's message, the agent's response, and the ReAct traces produced
/// along the way. Having all three in one call lets implementations resolve
/// entities across sources (e.g. matching a name in the user text to a
/// search result in an observation).
#[derive(Debug, Clone)]
pub struct Interaction {
    pub user_text: String,
    pub assistant_text: String,
    pub traces: Vec<Trace>,
}

/// Orchestrates memory retrieval and recording on behalf of the engine.
#[async_trait]
pub trait MemoryManager: Send + Sync {
    /// Find relevant memories for the owner's message and return a string
    /// ready for prompt injection. Empty means nothing relevant (or memory
    /// disabled).
    async fn retrieve(
        &self,
        owner_id: &str,
        user_text: &str,
    ) -> std::result::Result<String, MemoryError>;

    /// Store whatever the manager deems worth keeping from an interaction.
    async fn record(
        &self,
        owner_id: &str,
        interaction: &Interaction,
    ) -> std::result::Result<(), MemoryError>;
}
