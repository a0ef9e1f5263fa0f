//! `docq ask` and `docq inspect`.
//!
//! Both run the same pipeline as the HTTP server against a URL or a local
//! path and print plain-text results to stdout.

use anyhow::Result;

use docquery_core::index::BackendKind;
use docquery_core::models::RetrievalHit;

use crate::config::Config;
use crate::pipeline::QueryService;

const EXCERPT_CHARS: usize = 160;

/// Answer `questions` about `document` and print numbered answers.
pub async fn run_ask(
    config: &Config,
    document: &str,
    questions: &[String],
    backend: Option<BackendKind>,
) -> Result<()> {
    let service = QueryService::new(config.clone())?;
    let kind = backend.unwrap_or(config.retrieval.backend);
    let answers = service.answer_with(kind, document, questions).await?;

    for (i, (question, answer)) in questions.iter().zip(&answers).enumerate() {
        println!("{}. {}", i + 1, question);
        println!("   {}", answer);
        println!();
    }
    Ok(())
}

/// Print the passages and index statistics for `document`, plus the raw
/// and re-ranked hits for `query` when given.
pub async fn run_inspect(
    config: &Config,
    document: &str,
    backend: Option<BackendKind>,
    query: Option<&str>,
) -> Result<()> {
    let service = QueryService::new(config.clone())?;
    let kind = backend.unwrap_or(config.retrieval.backend);

    let passages = service.load_passages(document).await;
    println!("--- Passages ({}) ---", passages.len());
    for (i, passage) in passages.iter().enumerate() {
        println!(
            "[{}] {} / {} ({} chars)",
            i,
            passage.source_location(),
            passage.section.as_deref().unwrap_or("-"),
            passage.content.chars().count()
        );
        println!("    {}", excerpt(&passage.content));
    }
    println!();

    let index = service.build_index(kind, passages).await?;
    println!("--- Index ({}) ---", kind);
    println!("{}", serde_json::to_string_pretty(&index.statistics())?);
    println!();

    let Some(query) = query else {
        return Ok(());
    };
    let retrieval = service.retrieve(index.as_ref(), query).await;
    print_hits("Raw hits", &retrieval.raw);
    print_hits("Re-ranked", &retrieval.ranked);
    Ok(())
}

fn print_hits(title: &str, hits: &[RetrievalHit]) {
    println!("--- {} ({}) ---", title, hits.len());
    if hits.is_empty() {
        println!("No results.");
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} (passage {})",
            i + 1,
            hit.relevance_score,
            hit.source_location,
            hit.position
        );
        println!("    excerpt: \"{}\"", excerpt(&hit.content));
    }
    println!();
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut)
}
