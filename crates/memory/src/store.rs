//! Vector store — per-owner collections with cosine similarity queries.
//!
//! Owner partitioning is absolute: a query for one owner never returns
//! another owner's records. The empty owner id names the global collection,
//! whose records are visible to every query. The reference implementation
//! here is in-memory and single-process; durable backends are permitted as
//! long as they preserve the partitioning.

use crate::record::MemoryRecord;
use async_trait::async_trait;
use ledgermind_core::error::MemoryError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// The collection holding globally visible records.
const GLOBAL_COLLECTION: &str = "";

/// A record returned from a similarity query, with its score attached.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub similarity: f32,
}

/// Vector storage backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Save a record. The record must already carry an embedding.
    async fn store(&self, record: MemoryRecord) -> std::result::Result<(), MemoryError>;

    /// Retrieve up to `limit` records for an owner by cosine similarity,
    /// descending. Global records are included. A collection smaller than
    /// `limit` (or empty) yields a shorter (or empty) list, never an error.
    async fn query(
        &self,
        owner_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> std::result::Result<Vec<ScoredRecord>, MemoryError>;

    /// Retrieve a specific record by owner and id.
    async fn get(
        &self,
        owner_id: &str,
        record_id: &str,
    ) -> std::result::Result<Option<MemoryRecord>, MemoryError>;

    /// Remove a record permanently. Returns whether anything was deleted.
    async fn delete(
        &self,
        owner_id: &str,
        record_id: &str,
    ) -> std::result::Result<bool, MemoryError>;

    /// Number of records in an owner's collection (globals not included).
    async fn count(&self, owner_id: &str) -> std::result::Result<usize, MemoryError>;
}

/// In-memory vector store with one collection per owner.
///
/// Multiple readers, single writer, via `tokio::sync::RwLock`.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Vec<MemoryRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn store(&self, record: MemoryRecord) -> std::result::Result<(), MemoryError> {
        if record.embedding().is_none() {
            return Err(MemoryError::MissingEmbedding(record.id().to_string()));
        }

        debug!(
            id = %record.id(),
            owner = %record.owner_id(),
            kind = record.type_tag(),
            "storing memory record"
        );

        let mut collections = self.collections.write().await;
        collections
            .entry(record.owner_id().to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn query(
        &self,
        owner_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> std::result::Result<Vec<ScoredRecord>, MemoryError> {
        let collections = self.collections.read().await;

        let mut scored: Vec<ScoredRecord> = Vec::new();
        let mut scan = |records: &Vec<MemoryRecord>| {
            for record in records {
                if let Some(emb) = record.embedding() {
                    scored.push(ScoredRecord {
                        similarity: cosine_similarity(emb, embedding),
                        record: record.clone(),
                    });
                }
            }
        };

        if let Some(records) = collections.get(owner_id) {
            scan(records);
        }
        if owner_id != GLOBAL_COLLECTION {
            if let Some(globals) = collections.get(GLOBAL_COLLECTION) {
                scan(globals);
            }
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        debug!(owner = %owner_id, results = scored.len(), "vector query");
        Ok(scored)
    }

    async fn get(
        &self,
        owner_id: &str,
        record_id: &str,
    ) -> std::result::Result<Option<MemoryRecord>, MemoryError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(owner_id)
            .and_then(|records| records.iter().find(|r| r.id() == record_id).cloned()))
    }

    async fn delete(
        &self,
        owner_id: &str,
        record_id: &str,
    ) -> std::result::Result<bool, MemoryError> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(owner_id) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.id() != record_id);
        Ok(records.len() < before)
    }

    async fn count(&self, owner_id: &str) -> std::result::Result<usize, MemoryError> {
        let collections = self.collections.read().await;
        Ok(collections.get(owner_id).map_or(0, Vec::len))
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]; 0.0 for mismatched lengths, empty, or
/// zero-magnitude inputs. For unit-normalised embeddings this is the plain
/// dot product.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}
