//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that the dense index backend consumes,
//! a deterministic [`HashingEmbedder`] that needs no model or network,
//! and the [`normalize`] and [`dot`] helpers the dense backend scores with.
//!
//! Network and model-backed embedders (OpenAI, Ollama, fastembed) live in
//! the `docquery` service crate.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use regex::Regex;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word regex"));

/// Maps a batch of strings to fixed-length vectors.
///
/// Implementations must return exactly one vector per input, in input
/// order, each of length [`dims`](Embedder::dims). Output must be
/// deterministic for a fixed model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Signed feature hashing over lowercase word tokens.
///
/// Each token's SHA-256 digest picks a bucket (first eight bytes, little
/// endian, modulo `dims`) and a sign (low bit of the ninth byte). The
/// result is unit-normalized. Texts that share vocabulary land close
/// together; unrelated texts are near-orthogonal.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            name: format!("hashing-{}", dims),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in WORD.find_iter(&text.to_lowercase()) {
            let digest = Sha256::digest(token.as_str().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Scale a vector to unit length in place. Zero vectors are left as-is.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Inner product; equals cosine similarity for unit vectors.
///
/// Returns `0.0` for vectors of different lengths.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_of_unit_vectors() {
        let mut a = vec![1.0, 1.0];
        let mut b = vec![1.0, 0.0];
        normalize(&mut a);
        normalize(&mut b);
        assert!((dot(&a, &b) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(dot(&a, &[1.0]), 0.0);
    }

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_hashing_embedder_unit_vectors() {
        let e = HashingEmbedder::new(256);
        let v = e.embed_one("Grace period of thirty days for premium payment.");
        assert_eq!(v.len(), 256);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_deterministic_and_case_insensitive() {
        let e = HashingEmbedder::new(128);
        assert_eq!(e.embed_one("Premium Payment"), e.embed_one("premium payment"));
    }

    #[test]
    fn test_hashing_embedder_ranks_overlap_higher() {
        let e = HashingEmbedder::new(256);
        let q = e.embed_one("What is the grace period for premium payment?");
        let related = e.embed_one("Grace period of thirty days for premium payment.");
        let unrelated = e.embed_one("Cataract surgery has a waiting period of two years.");
        assert!(dot(&q, &related) > dot(&q, &unrelated));
    }

    #[test]
    fn test_hashing_embedder_empty_text() {
        let e = HashingEmbedder::new(64);
        assert!(e.embed_one("").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_embed_batch_order() {
        let e = HashingEmbedder::new(64);
        let texts = vec!["alpha beta".to_string(), "gamma".to_string()];
        let out = e.embed(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], e.embed_one("alpha beta"));
        assert_eq!(out[1], e.embed_one("gamma"));
        assert_eq!(e.model_name(), "hashing-64");
    }
}
