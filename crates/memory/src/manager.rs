//! SimpleManager — the built-in memory manager implementation.
//!
//! Suitable for local development: vector similarity retrieval, automatic
//! embedding, trace filtering. Production deployments can implement
//! `MemoryManager` themselves for fact extraction, contradiction
//! resolution, or hierarchical tiers — the engine only sees the trait.

use crate::embedder::Embedder;
use crate::record::{FormatContext, MemoryRecord, TraceMemory};
use crate::store::VectorStore;
use async_trait::async_trait;
use ledgermind_core::error::MemoryError;
use ledgermind_core::memory::{Interaction, MemoryManager};
use ledgermind_core::trace::Trace;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Header under which retrieved memories are injected into the prompt.
const ENRICHMENT_HEADER: &str = "=== RELEVANT PAST ACTIONS ===";

/// Total character budget shared by all retrieved memories.
const ENRICHMENT_BUDGET: usize = 2000;

/// Smallest per-record budget worth rendering.
const MIN_RECORD_BUDGET: usize = 100;

/// How many candidates to pull per retrieval.
const RETRIEVAL_LIMIT: usize = 10;

/// SimpleManager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Toggles the memory system on or off. Off by default: memory is
    /// opt-in for local runs.
    pub enabled: bool,

    /// Minimum similarity for a retrieved record to be injected, in
    /// [0.0, 1.0]. Small local embedders score similar text around 0.35;
    /// production models closer to 0.7-0.85.
    pub min_similarity: f32,

    /// Cap on stored records per owner. New records are dropped at the cap.
    pub max_memories_per_owner: usize,

    /// Ebbinghaus-style decay. Not applied by SimpleManager; the knob is
    /// honored by durable backends that implement forgetting.
    pub decay_enabled: bool,

    /// Single-trace actions always worth recording. Policy, not contract:
    /// deployments tune this to the tools they register.
    pub contextual_actions: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_similarity: 0.0,
            max_memories_per_owner: 1000,
            decay_enabled: false,
            contextual_actions: vec![
                "search_users".into(),     // user relationships
                "get_profile".into(),      // preferences
                "get_transactions".into(), // spending patterns
                "analyze_spending".into(), // financial insights
            ],
        }
    }
}

impl MemoryConfig {
    /// Enabled with default thresholds.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

/// The built-in [`MemoryManager`].
pub struct SimpleManager {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: MemoryConfig,
}

impl SimpleManager {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Select the traces worth storing from an interaction.
    ///
    /// Multi-step runs are always stored. A lone trace survives when it
    /// failed, was a confirmed write, named a contextually valuable action,
    /// or carried substantive reasoning. Trivial single reads are dropped.
    fn filter_storable<'a>(&self, traces: &'a [Trace]) -> Vec<&'a Trace> {
        if traces.len() > 1 {
            return traces.iter().collect();
        }

        let Some(trace) = traces.first() else {
            return vec![];
        };

        // Failures are worth learning from
        if !trace.success {
            return vec![trace];
        }

        // Confirmed writes are important actions
        if trace.metadata.get("confirmed").map(String::as_str) == Some("true") {
            return vec![trace];
        }

        if self.config.contextual_actions.iter().any(|a| a == &trace.action) {
            return vec![trace];
        }

        // Thoughts past 30 chars indicate actual reasoning
        if trace.thought.len() > 30 {
            return vec![trace];
        }

        // Simple balance checks and other trivial reads are skipped
        vec![]
    }

    fn format_enrichment(&self, records: &[MemoryRecord], owner_id: &str, query: &str) -> String {
        if records.is_empty() {
            return String::new();
        }

        let per_record = (ENRICHMENT_BUDGET / records.len()).max(MIN_RECORD_BUDGET);

        let mut parts = vec![format!("{ENRICHMENT_HEADER}\n")];
        for (i, record) in records.iter().enumerate() {
            let formatted = record.format(&FormatContext {
                owner_id: owner_id.to_string(),
                query: query.to_string(),
                max_len: per_record,
            });
            parts.push(format!("{}. {formatted}\n", i + 1));
        }
        parts.join("\n")
    }
}

#[async_trait]
impl MemoryManager for SimpleManager {
    async fn retrieve(
        &self,
        owner_id: &str,
        user_text: &str,
    ) -> std::result::Result<String, MemoryError> {
        if !self.config.enabled {
            return Ok(String::new());
        }

        let embedding = self.embedder.embed(user_text).await?;
        let candidates = self
            .store
            .query(owner_id, &embedding, RETRIEVAL_LIMIT)
            .await?;

        let records: Vec<MemoryRecord> = candidates
            .into_iter()
            .filter(|c| c.similarity >= self.config.min_similarity)
            .map(|c| c.record)
            .collect();

        debug!(
            owner = %owner_id,
            count = records.len(),
            "retrieved memories for query"
        );
        if records.is_empty() {
            return Ok(String::new());
        }

        Ok(self.format_enrichment(&records, owner_id, user_text))
    }

    async fn record(
        &self,
        owner_id: &str,
        interaction: &Interaction,
    ) -> std::result::Result<(), MemoryError> {
        if !self.config.enabled {
            return Ok(());
        }

        let storable = self.filter_storable(&interaction.traces);
        if storable.is_empty() {
            debug!("no traces worth storing (filtered out)");
            return Ok(());
        }

        info!(
            stored = storable.len(),
            total = interaction.traces.len(),
            "recording traces"
        );

        if self.store.count(owner_id).await? >= self.config.max_memories_per_owner {
            warn!(owner = %owner_id, "memory cap reached, dropping new records");
            return Ok(());
        }

        for (i, trace) in storable.iter().enumerate() {
            let mut record = MemoryRecord::Trace(TraceMemory::from_trace(
                owner_id,
                &trace.session_id,
                trace,
            ));

            let embedding = match self.embedder.embed(&record.embedding_text()).await {
                Ok(e) => e,
                Err(e) => {
                    warn!("failed to embed trace #{}: {e}", i + 1);
                    continue;
                }
            };
            record.set_embedding(embedding);

            if let Err(e) = self.store.store(record).await {
                warn!("failed to store trace #{}: {e}", i + 1);
                continue;
            }

            debug!(action = %trace.action, "stored trace memory");
        }

        Ok(())
    }
}
