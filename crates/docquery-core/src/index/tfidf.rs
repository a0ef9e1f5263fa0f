//! Sparse TF-IDF index.
//!
//! Fits a vocabulary over the indexed passages only, then scores queries
//! by cosine similarity in that fixed term space.
//!
//! # Fitting
//!
//! 1. Tokenize: lowercase, words of two or more word characters, stop
//!    words removed.
//! 2. Terms are the n-grams (`1..=ngram_max`) of the filtered tokens.
//! 3. Drop terms whose document frequency is below `min_df` or above
//!    `max_df × passages`. If that would drop every term, the frequency
//!    filter is skipped.
//! 4. Keep the `max_features` terms with the highest corpus count
//!    (ties alphabetical).
//! 5. Weight = raw count × smoothed idf `ln((1 + n) / (1 + df)) + 1`,
//!    then L2-normalize each passage vector.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use crate::models::{IndexStats, Passage, RetrievalHit};
use crate::vocab::Vocabulary;

use super::{rank_top_k, BackendKind, IndexBackend, IndexError, PassageSet};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token regex"));

/// Vectorizer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TfIdfParams {
    pub max_features: usize,
    /// Maximum document frequency as a fraction of the passage count.
    pub max_df: f64,
    /// Minimum document frequency as an absolute passage count.
    pub min_df: usize,
    /// Longest n-gram; unigrams are always included.
    pub ngram_max: usize,
}

impl Default for TfIdfParams {
    fn default() -> Self {
        Self {
            max_features: 5000,
            max_df: 0.95,
            min_df: 1,
            ngram_max: 2,
        }
    }
}

type SparseVec = Vec<(usize, f64)>;

pub struct TfIdfIndex {
    params: TfIdfParams,
    vocabulary: Arc<Vocabulary>,
    passages: PassageSet,
    terms: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVec>,
}

impl TfIdfIndex {
    pub fn new(params: TfIdfParams, vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            params,
            vocabulary,
            passages: PassageSet::default(),
            terms: HashMap::new(),
            idf: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// n-gram terms of `text`, in order, with repeats.
    fn analyze(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = TOKEN
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|t| !self.vocabulary.is_stop_word(t))
            .collect();

        let mut terms = Vec::new();
        for n in 1..=self.params.ngram_max.max(1) {
            if tokens.len() < n {
                break;
            }
            terms.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
        terms
    }

    /// Weighted, L2-normalized vector over the fitted vocabulary.
    fn vectorize(&self, terms: &[String]) -> SparseVec {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in terms {
            if let Some(&col) = self.terms.get(term) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }
        let mut v: SparseVec = counts
            .into_iter()
            .map(|(col, tf)| (col, tf * self.idf[col]))
            .collect();
        let norm = v.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in v.iter_mut() {
                *w /= norm;
            }
        }
        v.sort_by_key(|(col, _)| *col);
        v
    }

    fn clear(&mut self) {
        self.passages = PassageSet::default();
        self.terms.clear();
        self.idf.clear();
        self.vectors.clear();
    }
}

#[async_trait]
impl IndexBackend for TfIdfIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::TfIdf
    }

    async fn build(&mut self, passages: Vec<Passage>) -> Result<(), IndexError> {
        self.clear();
        if passages.is_empty() {
            return Ok(());
        }

        let analyzed: Vec<Vec<String>> = passages.iter().map(|p| self.analyze(&p.content)).collect();
        let n = analyzed.len();

        let mut df: HashMap<&str, usize> = HashMap::new();
        let mut corpus_count: HashMap<&str, usize> = HashMap::new();
        for doc in &analyzed {
            let mut seen = std::collections::HashSet::new();
            for term in doc {
                *corpus_count.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *df.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        let max_doc_count = self.params.max_df * n as f64;
        let mut kept: Vec<&str> = df
            .iter()
            .filter(|(_, &d)| d >= self.params.min_df && (d as f64) <= max_doc_count)
            .map(|(t, _)| *t)
            .collect();
        if kept.is_empty() && !df.is_empty() {
            tracing::debug!(terms = df.len(), passages = n, "document-frequency filter skipped");
            kept = df.keys().copied().collect();
        }

        kept.sort_by(|a, b| corpus_count[b].cmp(&corpus_count[a]).then_with(|| a.cmp(b)));
        kept.truncate(self.params.max_features);
        kept.sort_unstable();

        let idf: Vec<f64> = kept
            .iter()
            .map(|t| ((1.0 + n as f64) / (1.0 + df[t] as f64)).ln() + 1.0)
            .collect();
        let terms: HashMap<String, usize> = kept
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        self.terms = terms;
        self.idf = idf;
        self.vectors = analyzed.iter().map(|doc| self.vectorize(doc)).collect();
        self.passages = PassageSet::new(passages);

        tracing::info!(
            passages = n,
            vocabulary = self.terms.len(),
            "built tf-idf index"
        );
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Vec<RetrievalHit> {
        if self.passages.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let q: HashMap<usize, f64> = self.vectorize(&self.analyze(query)).into_iter().collect();
        if q.is_empty() {
            return Vec::new();
        }

        let scores = self.vectors.iter().enumerate().filter_map(|(i, v)| {
            let score: f64 = v
                .iter()
                .filter_map(|(col, w)| q.get(col).map(|qw| qw * w))
                .sum();
            (score > 0.0).then_some((i, score))
        });
        self.passages.hits(rank_top_k(scores, top_k))
    }

    fn statistics(&self) -> IndexStats {
        let mut stats = self.passages.stats();
        stats.vocabulary_size = Some(self.terms.len());
        stats
    }
}
