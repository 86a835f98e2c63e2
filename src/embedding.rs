//! Text embeddings used for semantic matching.
//!
//! The matcher only needs fixed-length vectors whose cosine similarity means "these texts are
//! about the same thing", so the encoder is injected through [`Embedder`]. [`HashingEmbedder`]
//! is a dependency-free default that is deterministic across runs and platforms.

use crate::Result;

/// Pluggable text encoder.
pub trait Embedder {
    /// Embed a batch of texts. The output has one vector per input, in order, all of the same
    /// length.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| crate::Error::msg("embedder returned no vector"))
    }
}

/// Cosine similarity of two vectors.
///
/// Returns `0.0` when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Default vector length for [`HashingEmbedder`].
pub const DEFAULT_HASHING_DIMENSIONS: usize = 512;

/// Bag-of-words embedder using feature hashing.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) into one of `dimensions` buckets and
/// counted; the result is L2-normalized. Texts sharing vocabulary score high, unrelated texts
/// score near zero.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokens(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

impl Embedder for HashingEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn hashing_embedder_is_deterministic_and_normalized() -> anyhow::Result<()> {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("ATP synthase rotating")?;
        let b = embedder.embed("atp SYNTHASE, rotating!")?;
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASHING_DIMENSIONS);

        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn related_texts_score_higher_than_unrelated() -> anyhow::Result<()> {
        let embedder = HashingEmbedder::default();
        let vectors = embedder.embed_batch(&[
            "ATP synthase spins like a motor",
            "ATP synthase rotating",
            "plant cell structure",
        ])?;

        let related = cosine_similarity(&vectors[0], &vectors[1]);
        let unrelated = cosine_similarity(&vectors[0], &vectors[2]);
        assert!(related > unrelated);
        Ok(())
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() -> anyhow::Result<()> {
        let v = HashingEmbedder::new(8).embed("  ... ")?;
        assert!(v.iter().all(|x| *x == 0.0));
        Ok(())
    }
}
