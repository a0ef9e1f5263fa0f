//! Model-free lexical overlap index.
//!
//! Scores a passage by the share of query tokens it contains. An exact
//! token match counts 1; a query token that only overlaps a passage token
//! as a substring (either direction) counts 0.5.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use crate::models::{IndexStats, Passage, RetrievalHit};
use crate::vocab::Vocabulary;

use super::{rank_top_k, BackendKind, IndexBackend, IndexError, PassageSet};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word regex"));

/// Tokens of this many characters or fewer are ignored.
const MIN_TOKEN_CHARS: usize = 2;

const SUBSTRING_WEIGHT: f64 = 0.5;

pub struct LexicalIndex {
    vocabulary: Arc<Vocabulary>,
    passages: PassageSet,
    tokens: Vec<HashSet<String>>,
}

impl LexicalIndex {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            passages: PassageSet::default(),
            tokens: Vec::new(),
        }
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        WORD.find_iter(&text.to_lowercase())
            .map(|m| m.as_str())
            .filter(|t| t.chars().count() > MIN_TOKEN_CHARS && !self.vocabulary.is_stop_word(t))
            .map(str::to_string)
            .collect()
    }

    fn score(query_tokens: &[String], passage_tokens: &HashSet<String>) -> f64 {
        let mut exact = 0usize;
        let mut partial = 0usize;
        for qt in query_tokens {
            if passage_tokens.contains(qt) {
                exact += 1;
            } else if passage_tokens
                .iter()
                .any(|pt| pt.contains(qt.as_str()) || qt.contains(pt.as_str()))
            {
                partial += 1;
            }
        }
        (exact as f64 + SUBSTRING_WEIGHT * partial as f64) / query_tokens.len() as f64
    }
}

#[async_trait]
impl IndexBackend for LexicalIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Lexical
    }

    async fn build(&mut self, passages: Vec<Passage>) -> Result<(), IndexError> {
        self.tokens = passages
            .iter()
            .map(|p| self.tokenize(&p.content).into_iter().collect())
            .collect();
        self.passages = PassageSet::new(passages);
        tracing::info!(passages = self.passages.len(), "built lexical index");
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Vec<RetrievalHit> {
        if self.passages.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let query_tokens: Vec<String> = self
            .tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let scores = self.tokens.iter().enumerate().filter_map(|(i, pt)| {
            let score = Self::score(&query_tokens, pt);
            (score > 0.0).then_some((i, score))
        });
        self.passages.hits(rank_top_k(scores, top_k))
    }

    fn statistics(&self) -> IndexStats {
        self.passages.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> LexicalIndex {
        LexicalIndex::new(Arc::new(Vocabulary::default()))
    }

    fn scenario() -> Vec<Passage> {
        vec![
            Passage::new("Grace period of thirty days for premium payment.", Some(1), None),
            Passage::new("Cataract surgery has a waiting period of two years.", Some(2), None),
        ]
    }

    #[test]
    fn test_tokenize_filters() {
        let idx = index();
        assert_eq!(
            idx.tokenize("What is the grace period for premium payment?"),
            vec!["grace", "period", "premium", "payment"]
        );
        assert!(idx.tokenize("it is an ox").is_empty());
    }

    #[tokio::test]
    async fn test_lexical_scenario_scores() {
        let mut idx = index();
        idx.build(scenario()).await.unwrap();
        let hits = idx.search("What is the grace period for premium payment?", 5).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].relevance_score - 1.0).abs() < 1e-9);
        assert!((hits[1].relevance_score - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_substring_overlap_counts_half() {
        let mut idx = index();
        idx.build(vec![Passage::new(
            "Hospitalization expenses are reimbursed in full.",
            Some(1),
            None,
        )])
        .await
        .unwrap();
        let hits = idx.search("hospital expenses", 5).await;
        assert_eq!(hits.len(), 1);
        assert!((hits[0].relevance_score - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_overlap_returns_empty() {
        let mut idx = index();
        idx.build(scenario()).await.unwrap();
        assert!(idx.search("zebra xylophone quartz", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_query_tokens_counted_once() {
        let mut idx = index();
        idx.build(scenario()).await.unwrap();
        let hits = idx.search("grace grace zebra", 5).await;
        assert_eq!(hits.len(), 1);
        assert!((hits[0].relevance_score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_top_k_and_positions_in_range() {
        let mut idx = index();
        idx.build(scenario()).await.unwrap();
        let hits = idx.search("period", 1).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 0);
        for h in idx.search("period", 10).await {
            assert!(h.position < 2);
        }
    }
}
