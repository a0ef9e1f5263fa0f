//! Index backend abstraction.
//!
//! The [`IndexBackend`] trait is the build/search contract shared by the
//! three retrieval strategies:
//!
//! | Backend | Similarity | Score range |
//! |---------|------------|-------------|
//! | [`DenseIndex`] | inner product of unit embeddings | `[-1, 1]` |
//! | [`TfIdfIndex`] | cosine in a fitted TF-IDF space | `[0, 1]` |
//! | [`LexicalIndex`] | token overlap ratio | `[0, 1]` |
//!
//! Scores from different backends are not comparable. Every backend
//! returns an empty result, never an error, when searched before `build`
//! or after `build(vec![])`.
//!
//! Positions are the glue: index position `i` always refers to the
//! `i`-th passage handed to `build`, and every [`RetrievalHit`] carries
//! that position.

pub mod dense;
pub mod lexical;
pub mod tfidf;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::Embedder;
use crate::models::{IndexStats, Passage, RetrievalHit};
use crate::vocab::Vocabulary;

pub use dense::DenseIndex;
pub use lexical::LexicalIndex;
pub use tfidf::{TfIdfIndex, TfIdfParams};

/// Characters of each neighbouring passage included in hit context.
const NEIGHBOR_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("embedder returned {got} vectors for {expected} passages")]
    VectorCount { expected: usize, got: usize },
    #[error("embedder returned a {got}-dimensional vector, expected {expected}")]
    Dimensions { expected: usize, got: usize },
    #[error("dense backend requires an embedder")]
    MissingEmbedder,
    #[error("unknown backend '{0}': use dense, tfidf, or lexical")]
    UnknownBackend(String),
}

/// Which retrieval strategy a backend implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Dense,
    TfIdf,
    Lexical,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Dense => "dense",
            BackendKind::TfIdf => "tfidf",
            BackendKind::Lexical => "lexical",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dense" => Ok(BackendKind::Dense),
            "tfidf" | "tf-idf" => Ok(BackendKind::TfIdf),
            "lexical" => Ok(BackendKind::Lexical),
            other => Err(IndexError::UnknownBackend(other.to_string())),
        }
    }
}

/// Build/search contract for a retrieval strategy.
///
/// `build` takes `&mut self`, so a build can never overlap another build
/// or a search on the same instance. `search` takes `&self` and may run
/// concurrently once the index is built.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Replace any prior index with one over `passages`.
    ///
    /// On error the backend is left empty.
    async fn build(&mut self, passages: Vec<Passage>) -> Result<(), IndexError>;

    /// Up to `top_k` hits in descending score order, ties in passage
    /// order. Never fails: computation problems yield an empty result.
    async fn search(&self, query: &str, top_k: usize) -> Vec<RetrievalHit>;

    fn statistics(&self) -> IndexStats;
}

/// Dependencies a backend may need at construction time.
#[derive(Clone)]
pub struct BackendOptions {
    pub vocabulary: Arc<Vocabulary>,
    pub tfidf: TfIdfParams,
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl BackendOptions {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            tfidf: TfIdfParams::default(),
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

/// Construct an empty backend of the requested kind.
pub fn create_backend(
    kind: BackendKind,
    options: &BackendOptions,
) -> Result<Box<dyn IndexBackend>, IndexError> {
    Ok(match kind {
        BackendKind::Dense => {
            let embedder = options.embedder.clone().ok_or(IndexError::MissingEmbedder)?;
            Box::new(DenseIndex::new(embedder))
        }
        BackendKind::TfIdf => Box::new(TfIdfIndex::new(
            options.tfidf.clone(),
            options.vocabulary.clone(),
        )),
        BackendKind::Lexical => Box::new(LexicalIndex::new(options.vocabulary.clone())),
    })
}

/// The ordered passages behind an index, with hit and context assembly.
#[derive(Debug, Clone, Default)]
pub struct PassageSet {
    passages: Vec<Passage>,
}

impl PassageSet {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passage at `position` framed by previews of its neighbours:
    /// `[Previous] ...... [Current] ... [Next] ......`.
    pub fn context(&self, position: usize) -> String {
        let mut parts = Vec::with_capacity(3);
        if position > 0 {
            if let Some(prev) = self.passages.get(position - 1) {
                parts.push(format!("[Previous] {}...", preview(&prev.content)));
            }
        }
        if let Some(current) = self.passages.get(position) {
            parts.push(format!("[Current] {}", current.content));
        }
        if let Some(next) = self.passages.get(position + 1) {
            parts.push(format!("[Next] {}...", preview(&next.content)));
        }
        parts.join(" ")
    }

    /// Build a hit for `position`, or `None` if it is out of range.
    pub fn hit(&self, position: usize, score: f64) -> Option<RetrievalHit> {
        let passage = self.passages.get(position)?;
        Some(RetrievalHit {
            content: passage.content.clone(),
            relevance_score: score,
            source_location: passage.source_location(),
            context: self.context(position),
            position,
        })
    }

    /// Turn ranked `(position, score)` pairs into hits.
    pub fn hits(&self, ranked: Vec<(usize, f64)>) -> Vec<RetrievalHit> {
        ranked
            .into_iter()
            .filter_map(|(pos, score)| self.hit(pos, score))
            .collect()
    }

    /// Counts shared by every backend; backend-specific fields are `None`.
    pub fn stats(&self) -> IndexStats {
        let count = self.passages.len();
        let mean = if count == 0 {
            0.0
        } else {
            let total: usize = self.passages.iter().map(|p| p.content.chars().count()).sum();
            total as f64 / count as f64
        };
        let pages: HashSet<u32> = self.passages.iter().filter_map(|p| p.page_number).collect();
        IndexStats {
            passage_count: count,
            mean_passage_length: mean,
            distinct_pages: pages.len(),
            dimensions: None,
            vocabulary_size: None,
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(NEIGHBOR_PREVIEW_CHARS).collect()
}

/// Keep finite scores, sort descending (stable, so ties stay in position
/// order), and truncate to `top_k`.
pub fn rank_top_k(scores: impl IntoIterator<Item = (usize, f64)>, top_k: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = scores.into_iter().filter(|(_, s)| s.is_finite()).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn passages() -> Vec<Passage> {
        vec![
            Passage::new("a".repeat(150), Some(1), None),
            Passage::new("Middle passage.", Some(1), None),
            Passage::new("c".repeat(120), Some(2), None),
        ]
    }

    #[test]
    fn test_context_middle() {
        let set = PassageSet::new(passages());
        let ctx = set.context(1);
        assert_eq!(
            ctx,
            format!(
                "[Previous] {}... [Current] Middle passage. [Next] {}...",
                "a".repeat(100),
                "c".repeat(100)
            )
        );
    }

    #[test]
    fn test_context_edges() {
        let set = PassageSet::new(passages());
        assert!(set.context(0).starts_with("[Current] "));
        assert!(!set.context(0).contains("[Previous]"));
        assert!(set.context(2).ends_with(&"c".repeat(120)));
        assert!(!set.context(2).contains("[Next]"));
    }

    #[test]
    fn test_hit_out_of_range() {
        let set = PassageSet::new(passages());
        assert!(set.hit(3, 1.0).is_none());
        let hit = set.hit(2, 0.5).unwrap();
        assert_eq!(hit.source_location, "Page 2");
        assert_eq!(hit.position, 2);
    }

    #[test]
    fn test_stats() {
        let set = PassageSet::new(passages());
        let stats = set.stats();
        assert_eq!(stats.passage_count, 3);
        assert_eq!(stats.distinct_pages, 2);
        assert!((stats.mean_passage_length - 95.0).abs() < 1e-9);

        let empty = PassageSet::default().stats();
        assert_eq!(empty.passage_count, 0);
        assert_eq!(empty.mean_passage_length, 0.0);
    }

    #[test]
    fn test_rank_top_k_stable_ties() {
        let ranked = rank_top_k(vec![(0, 0.5), (1, 0.9), (2, 0.5), (3, f64::NAN)], 3);
        assert_eq!(ranked, vec![(1, 0.9), (0, 0.5), (2, 0.5)]);
        assert!(rank_top_k(vec![(0, 1.0)], 0).is_empty());
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("TFIDF".parse::<BackendKind>().unwrap(), BackendKind::TfIdf);
        assert_eq!("dense".parse::<BackendKind>().unwrap(), BackendKind::Dense);
        assert!(matches!(
            "faiss".parse::<BackendKind>(),
            Err(IndexError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_create_backend_kinds() {
        let opts = BackendOptions::new(Arc::new(Vocabulary::default()));
        assert!(matches!(
            create_backend(BackendKind::Dense, &opts),
            Err(IndexError::MissingEmbedder)
        ));
        let opts = opts.with_embedder(Arc::new(HashingEmbedder::new(32)));
        for kind in [BackendKind::Dense, BackendKind::TfIdf, BackendKind::Lexical] {
            let backend = create_backend(kind, &opts).unwrap();
            assert_eq!(backend.kind(), kind);
        }
    }

    #[tokio::test]
    async fn test_all_backends_empty_before_and_after_empty_build() {
        let opts = BackendOptions::new(Arc::new(Vocabulary::default()))
            .with_embedder(Arc::new(HashingEmbedder::new(32)));
        for kind in [BackendKind::Dense, BackendKind::TfIdf, BackendKind::Lexical] {
            let mut backend = create_backend(kind, &opts).unwrap();
            assert!(backend.search("premium payment", 5).await.is_empty());
            backend.build(Vec::new()).await.unwrap();
            assert!(backend.search("premium payment", 5).await.is_empty());
            assert_eq!(backend.statistics().passage_count, 0);
        }
    }
}
