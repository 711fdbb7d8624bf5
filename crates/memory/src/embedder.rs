//! Embedder contract and the deterministic hash embedder.
//!
//! The embedder is an implementation detail of the memory manager; the
//! engine never sees it. Production deployments plug in a real model
//! behind the same trait — the only contract is that vectors come back
//! L2-normalised, so cosine similarity reduces to a dot product.

use async_trait::async_trait;
use ledgermind_core::error::MemoryError;

/// Converts text to embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text. The returned vector is unit-length.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, MemoryError>;

    /// Embedding vector size.
    fn dimensions(&self) -> usize;
}

/// Deterministic embedder for local development and tests.
///
/// Seeds a linear congruential generator from an FNV-1a hash of the text,
/// so identical texts always produce identical vectors. Matches the
/// 384-dimension shape of small sentence-transformer models.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dimensions: 384 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, MemoryError> {
        // FNV-1a over the text bytes
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in text.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }

        // LCG from the hash seed, mapped into [-1, 1]
        let mut seed = hash;
        let mut embedding = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            embedding.push(seed as i64 as f32 / i64::MAX as f32);
        }

        Ok(normalize(embedding))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
fn normalize(mut vec: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vec;
    }
    for v in &mut vec {
        *v /= norm;
    }
    vec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("send $50 to @alice").await.unwrap();
        let b = embedder.embed("send $50 to @alice").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_texts_differ() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("check my balance").await.unwrap();
        let b = embedder.embed("deposit to savings").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn embedding_has_declared_dimensions() {
        let embedder = HashEmbedder::new();
        assert_eq!(embedder.dimensions(), 384);
        let vec = embedder.embed("anything").await.unwrap();
        assert_eq!(vec.len(), 384);

        let small = HashEmbedder::with_dimensions(8);
        assert_eq!(small.embed("anything").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn embedding_is_unit_length() {
        let embedder = HashEmbedder::new();
        let vec = embedder.embed("unit norm check").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }
}
