//! Dense embedding index.
//!
//! Passages and queries are embedded with the same [`Embedder`], scaled
//! to unit length, and compared by inner product (cosine similarity).
//! Search is a brute-force scan over all passage vectors.

use std::sync::Arc;

use async_trait::async_trait;

use crate::embedding::{dot, normalize, Embedder};
use crate::models::{IndexStats, Passage, RetrievalHit};

use super::{rank_top_k, BackendKind, IndexBackend, IndexError, PassageSet};

pub struct DenseIndex {
    embedder: Arc<dyn Embedder>,
    passages: PassageSet,
    vectors: Vec<Vec<f32>>,
}

impl DenseIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            passages: PassageSet::default(),
            vectors: Vec::new(),
        }
    }

    async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let mut vectors = match self.embedder.embed(&[query.to_string()]).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(model = self.embedder.model_name(), error = %e, "query embedding failed");
                return None;
            }
        };
        let mut q = vectors.pop()?;
        normalize(&mut q);
        if q.iter().all(|x| *x == 0.0) {
            return None;
        }
        Some(q)
    }
}

#[async_trait]
impl IndexBackend for DenseIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Dense
    }

    async fn build(&mut self, passages: Vec<Passage>) -> Result<(), IndexError> {
        self.passages = PassageSet::default();
        self.vectors.clear();
        if passages.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let mut vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| IndexError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != texts.len() {
            return Err(IndexError::VectorCount {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        let dims = vectors[0].len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims || v.is_empty()) {
            return Err(IndexError::Dimensions {
                expected: dims,
                got: bad.len(),
            });
        }
        for v in vectors.iter_mut() {
            normalize(v);
        }

        tracing::info!(
            passages = passages.len(),
            dims,
            model = self.embedder.model_name(),
            "built dense index"
        );
        self.passages = PassageSet::new(passages);
        self.vectors = vectors;
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Vec<RetrievalHit> {
        if self.passages.is_empty() || query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }
        let q = match self.embed_query(query).await {
            Some(q) => q,
            None => return Vec::new(),
        };
        if q.len() != self.vectors[0].len() {
            tracing::warn!(
                expected = self.vectors[0].len(),
                got = q.len(),
                "query vector dimension mismatch"
            );
            return Vec::new();
        }

        let scores = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&q, v) as f64));
        self.passages.hits(rank_top_k(scores, top_k))
    }

    fn statistics(&self) -> IndexStats {
        let mut stats = self.passages.stats();
        stats.dimensions = Some(
            self.vectors
                .first()
                .map(|v| v.len())
                .unwrap_or_else(|| self.embedder.dims()),
        );
        stats
    }
}
