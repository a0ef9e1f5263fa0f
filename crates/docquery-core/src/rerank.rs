//! Relevance re-ranking of raw retrieval hits.
//!
//! Each hit is re-scored with a fixed linear blend of its backend score
//! and four capped heuristic bonuses derived from the question:
//!
//! ```text
//! composite = 0.40 × original
//!           + 0.25 × keyword bonus   (≤ 0.5)
//!           + 0.15 × entity bonus    (≤ 0.3)
//!           + 0.10 × domain bonus    (≤ 0.2)
//!           + 0.10 × type bonus      (≤ 0.1)
//! ```
//!
//! clamped to `[0, 1]`. Hits are then sorted by composite (ties keep
//! input order), those at or below the threshold are dropped, and at
//! most `max_results` survive. All presence checks are case-insensitive
//! substring tests against the hit content.

use std::cmp::Ordering;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::models::RetrievalHit;
use crate::vocab::{QuestionType, Vocabulary};

const ORIGINAL_WEIGHT: f64 = 0.4;
const KEYWORD_WEIGHT: f64 = 0.25;
const ENTITY_WEIGHT: f64 = 0.15;
const DOMAIN_WEIGHT: f64 = 0.1;
const TYPE_WEIGHT: f64 = 0.1;

const KEYWORD_CAP: f64 = 0.5;
const ENTITY_CAP: f64 = 0.3;
const DOMAIN_CAP: f64 = 0.2;
const TYPE_CAP: f64 = 0.1;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?%?").expect("number regex"));
static CAPITALIZED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").expect("capitalized regex")
});
static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("quoted regex"));
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w]+").expect("non-word regex"));

/// Threshold and cap applied after scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankParams {
    /// Hits must score strictly above this to survive.
    pub threshold: f64,
    pub max_results: usize,
}

impl Default for RerankParams {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            max_results: 5,
        }
    }
}

/// What the re-ranker learned about one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    pub domain: String,
    pub question_type: QuestionType,
    /// Terms of the winning domain that appear in the question.
    pub keywords: Vec<String>,
    /// Numbers, capitalized phrases, and quoted strings from the question.
    pub entities: Vec<String>,
}

pub struct Reranker {
    vocabulary: Arc<Vocabulary>,
    params: RerankParams,
}

impl Reranker {
    pub fn new(vocabulary: Arc<Vocabulary>, params: RerankParams) -> Self {
        Self { vocabulary, params }
    }

    pub fn params(&self) -> &RerankParams {
        &self.params
    }

    /// Classify the question's domain and type and pull out entities.
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let lower = query.to_lowercase();

        let mut domain = self.vocabulary.default_domain.clone();
        let mut keywords = Vec::new();
        for d in &self.vocabulary.domains {
            keywords.extend(d.terms().filter(|t| lower.contains(t)).map(str::to_string));
            if !keywords.is_empty() {
                domain = d.name.clone();
                break;
            }
        }

        QueryAnalysis {
            domain,
            question_type: self.question_type(&lower),
            keywords,
            entities: extract_entities(query),
        }
    }

    /// First question family with a cue present as a whole word or phrase.
    fn question_type(&self, lower: &str) -> QuestionType {
        let padded = format!(" {} ", NON_WORD.replace_all(lower, " ").trim());
        self.vocabulary
            .question_types
            .iter()
            .find(|family| {
                family
                    .cues
                    .iter()
                    .any(|cue| padded.contains(&format!(" {} ", cue.to_lowercase())))
            })
            .map(|family| family.kind)
            .unwrap_or(QuestionType::General)
    }

    /// Composite score for one passage, in `[0, 1]`.
    pub fn composite_score(&self, analysis: &QueryAnalysis, content: &str, original: f64) -> f64 {
        let content = content.to_lowercase();
        let score = ORIGINAL_WEIGHT * original
            + KEYWORD_WEIGHT * keyword_bonus(&analysis.keywords, &content)
            + ENTITY_WEIGHT * entity_bonus(&analysis.entities, &content)
            + DOMAIN_WEIGHT * self.domain_bonus(&analysis.domain, &content)
            + TYPE_WEIGHT * self.type_bonus(analysis.question_type, &content);
        score.clamp(0.0, 1.0)
    }

    fn domain_bonus(&self, domain: &str, content: &str) -> f64 {
        if domain == self.vocabulary.default_domain {
            return 0.0;
        }
        let Some(d) = self.vocabulary.domain(domain) else {
            return 0.0;
        };
        let matches = d.terms().filter(|t| content.contains(t)).count();
        (matches as f64 / d.term_count().max(1) as f64 * DOMAIN_CAP).min(DOMAIN_CAP)
    }

    fn type_bonus(&self, kind: QuestionType, content: &str) -> f64 {
        let indicators = self.vocabulary.indicators(kind);
        if indicators.is_empty() {
            return 0.0;
        }
        let matches = indicators
            .iter()
            .filter(|i| content.contains(i.as_str()))
            .count();
        (matches as f64 / indicators.len() as f64 * TYPE_CAP).min(TYPE_CAP)
    }

    /// Re-score, sort, threshold, and cap `hits` for `query`.
    pub fn rerank(&self, query: &str, hits: Vec<RetrievalHit>) -> Vec<RetrievalHit> {
        let analysis = self.analyze(query);
        tracing::debug!(
            domain = %analysis.domain,
            question_type = %analysis.question_type,
            keywords = analysis.keywords.len(),
            entities = analysis.entities.len(),
            candidates = hits.len(),
            "re-ranking hits"
        );

        let mut scored: Vec<RetrievalHit> = hits
            .into_iter()
            .map(|hit| {
                let score = self.composite_score(&analysis, &hit.content, hit.relevance_score);
                RetrievalHit {
                    relevance_score: score,
                    ..hit
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        });
        scored.retain(|h| h.relevance_score > self.params.threshold);
        scored.truncate(self.params.max_results);
        scored
    }
}

fn keyword_bonus(keywords: &[String], content: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let matches = keywords.iter().filter(|k| content.contains(k.as_str())).count();
    (matches as f64 / keywords.len() as f64).min(KEYWORD_CAP)
}

fn entity_bonus(entities: &[String], content: &str) -> f64 {
    if entities.is_empty() {
        return 0.0;
    }
    let matches = entities
        .iter()
        .filter(|e| content.contains(&e.to_lowercase()))
        .count();
    (matches as f64 / entities.len() as f64 * ENTITY_CAP).min(ENTITY_CAP)
}

/// Numbers and percentages, then capitalized phrases, then non-empty
/// quoted strings, each in order of appearance.
pub fn extract_entities(query: &str) -> Vec<String> {
    let mut entities: Vec<String> = NUMBER.find_iter(query).map(|m| m.as_str().to_string()).collect();
    entities.extend(CAPITALIZED.find_iter(query).map(|m| m.as_str().to_string()));
    entities.extend(
        QUOTED
            .captures_iter(query)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty()),
    );
    entities
}
