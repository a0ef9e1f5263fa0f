//! End-to-end retrieval properties across all three backends: chunk,
//! build, search, re-rank.

use std::sync::Arc;

use docquery_core::chunk::{chunk_document, ChunkerParams};
use docquery_core::embedding::HashingEmbedder;
use docquery_core::index::{create_backend, BackendKind, BackendOptions, IndexBackend};
use docquery_core::models::{DocumentText, Passage};
use docquery_core::rerank::{RerankParams, Reranker};
use docquery_core::vocab::Vocabulary;

const ALL: [BackendKind; 3] = [BackendKind::Dense, BackendKind::TfIdf, BackendKind::Lexical];
const SCENARIO_QUERY: &str = "What is the grace period for premium payment?";

fn vocabulary() -> Arc<Vocabulary> {
    Arc::new(Vocabulary::default())
}

fn backend(kind: BackendKind) -> Box<dyn IndexBackend> {
    let options = BackendOptions::new(vocabulary()).with_embedder(Arc::new(HashingEmbedder::new(256)));
    create_backend(kind, &options).unwrap()
}

fn scenario_passages() -> Vec<Passage> {
    vec![
        Passage::new("Grace period of thirty days for premium payment.", Some(1), None),
        Passage::new("Cataract surgery has a waiting period of two years.", Some(2), None),
    ]
}

fn policy_passages() -> Vec<Passage> {
    let text = "A grace period of thirty days is allowed for payment of each renewal premium.\n\n\
                Pre-existing diseases are covered after a waiting period of thirty six months.\n\n\
                Cataract surgery has a specific waiting period of two years from inception.\n\n\
                Maternity expenses are covered after twenty four months of continuous coverage.\n\n\
                Ambulance charges are reimbursed up to two thousand rupees for each claim made.\n\n\
                The policy may be cancelled by the insurer on grounds of fraud or misrepresentation.";
    chunk_document(&DocumentText::plain(text), &ChunkerParams::default())
}

#[tokio::test]
async fn scenario_top_hit_is_grace_clause_for_every_backend() {
    let reranker = Reranker::new(vocabulary(), RerankParams::default());
    for kind in ALL {
        let mut index = backend(kind);
        index.build(scenario_passages()).await.unwrap();

        let hits = index.search(SCENARIO_QUERY, 5).await;
        assert!(!hits.is_empty(), "{} returned nothing", kind);
        assert_eq!(hits[0].position, 0, "{}", kind);

        let ranked = reranker.rerank(SCENARIO_QUERY, hits);
        assert!(!ranked.is_empty() && ranked.len() <= 2, "{}: {:?}", kind, ranked);
        assert!(ranked[0].content.starts_with("Grace period"), "{}", kind);
        assert!(ranked[0].relevance_score > 0.3, "{}", kind);
        assert!(ranked
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
    }
}

#[tokio::test]
async fn positions_resolve_and_caps_hold() {
    let passages = policy_passages();
    assert_eq!(passages.len(), 6);
    let reranker = Reranker::new(vocabulary(), RerankParams::default());

    for kind in ALL {
        let mut index = backend(kind);
        index.build(passages.clone()).await.unwrap();
        assert_eq!(index.statistics().passage_count, 6);

        for top_k in [1, 3, 10] {
            let hits = index.search("waiting period for cataract surgery", top_k).await;
            assert!(hits.len() <= top_k, "{} returned {} > {}", kind, hits.len(), top_k);
            for hit in &hits {
                assert!(hit.position < passages.len());
                assert_eq!(hit.content, passages[hit.position].content);
                assert!(hit.context.contains(&hit.content));
            }
        }

        let ranked = reranker.rerank("waiting period", index.search("waiting period", 10).await);
        assert!(ranked.len() <= 5);
        for hit in &ranked {
            assert!(hit.relevance_score > 0.3 && hit.relevance_score <= 1.0);
        }
    }
}

#[tokio::test]
async fn empty_and_unbuilt_indexes_return_nothing() {
    for kind in ALL {
        let unbuilt = backend(kind);
        assert!(unbuilt.search(SCENARIO_QUERY, 5).await.is_empty());

        let mut empty = backend(kind);
        empty.build(Vec::new()).await.unwrap();
        assert!(empty.search(SCENARIO_QUERY, 5).await.is_empty());
        assert_eq!(empty.statistics().passage_count, 0);
    }
}

#[tokio::test]
async fn repeated_searches_are_identical() {
    let reranker = Reranker::new(vocabulary(), RerankParams::default());
    for kind in ALL {
        let mut a = backend(kind);
        let mut b = backend(kind);
        a.build(policy_passages()).await.unwrap();
        b.build(policy_passages()).await.unwrap();

        let query = "Are maternity expenses covered?";
        let first = reranker.rerank(query, a.search(query, 5).await);
        let second = reranker.rerank(query, b.search(query, 5).await);
        let summary = |hits: &[docquery_core::models::RetrievalHit]| {
            hits.iter()
                .map(|h| (h.position, h.relevance_score))
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&first), summary(&second), "{}", kind);
    }
}

#[tokio::test]
async fn lexical_without_overlap_is_empty() {
    let mut index = backend(BackendKind::Lexical);
    index.build(scenario_passages()).await.unwrap();
    assert!(index.search("quantum chromodynamics", 5).await.is_empty());
}

#[test]
fn long_paragraph_splits_without_breaking_words() {
    let sentence = "The insured person must notify the company within thirty days of admission. ";
    let paragraph = sentence.repeat(20);
    assert!(paragraph.trim().chars().count() >= 1500);

    let passages = chunk_document(&DocumentText::plain(paragraph), &ChunkerParams::default());
    assert!(passages.len() >= 2);
    for p in &passages {
        let len = p.content.chars().count();
        assert!((50..=800).contains(&len), "passage of {} chars", len);
        assert!(p.content.starts_with("The insured"));
        assert!(p.content.ends_with("admission."));
    }
}
