//! The query service: document in, answers out.
//!
//! ```text
//! documents URL ─► fetch ─► extract ─► chunk ─► IndexBackend::build
//!                                                     │
//! question ─► search(top_k) ─► Reranker ─► AnswerGenerator ─► answer
//! ```
//!
//! Every request builds and discards its own index. The only state shared
//! between requests is the readiness gate, which creates the embedder
//! (and warms it up when the dense backend is configured) exactly once.
//!
//! Document problems never fail a request: a download, extraction, or
//! empty-text failure is turned into a single placeholder passage so
//! every question still gets an answer.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::OnceCell;

use docquery_core::chunk::chunk_document;
use docquery_core::embedding::Embedder;
use docquery_core::index::{create_backend, BackendKind, BackendOptions, IndexBackend};
use docquery_core::models::{Passage, RetrievalHit};
use docquery_core::rerank::Reranker;
use docquery_core::vocab::Vocabulary;

use crate::answer::AnswerGenerator;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::fetch::DocumentFetcher;

pub const EMPTY_DOCUMENT_MESSAGE: &str = "Document processed but no readable content found.";

const SELF_TEST_PASSAGES: [&str; 2] = [
    "This is a test policy document with coverage information.",
    "The waiting period for claims is 30 days from policy inception.",
];
const SELF_TEST_QUERY: &str = "waiting period";
const PREVIEW_CHARS: usize = 100;

/// Outcome of [`QueryService::self_test`].
#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
    pub backend: BackendKind,
    pub passages: usize,
    pub results: usize,
    pub top_result: Option<String>,
}

/// Raw and re-ranked hits for one question, as shown by `docq inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub raw: Vec<RetrievalHit>,
    pub ranked: Vec<RetrievalHit>,
}

pub struct QueryService {
    config: Config,
    vocabulary: Arc<Vocabulary>,
    fetcher: DocumentFetcher,
    generator: AnswerGenerator,
    reranker: Reranker,
    embedder: OnceCell<Option<Arc<dyn Embedder>>>,
}

impl QueryService {
    pub fn new(config: Config) -> Result<Self> {
        let generator = AnswerGenerator::new(&config.answer)?;
        Self::with_generator(config, generator)
    }

    pub fn with_generator(config: Config, generator: AnswerGenerator) -> Result<Self> {
        let vocabulary = Arc::new(load_vocabulary(&config)?);
        let fetcher = DocumentFetcher::new(&config.document)?;
        let reranker = Reranker::new(vocabulary.clone(), config.retrieval.rerank_params());
        Ok(Self {
            config,
            vocabulary,
            fetcher,
            generator,
            reranker,
            embedder: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.embedder.initialized()
    }

    /// Initialize the embedder once. Concurrent callers wait for the same
    /// initialization; a failed attempt is retried by the next caller.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.embedder.get_or_try_init(|| self.init_embedder()).await?;
        Ok(())
    }

    async fn init_embedder(&self) -> Result<Option<Arc<dyn Embedder>>> {
        let embedding = &self.config.embedding;
        if !embedding.is_enabled() {
            tracing::info!("embedding disabled, dense backend unavailable");
            return Ok(None);
        }
        let embedder = create_embedder(embedding)?;
        if self.config.retrieval.backend == BackendKind::Dense {
            let started = Instant::now();
            embedder
                .embed(&["warm up".to_string()])
                .await
                .with_context(|| format!("embedding model '{}' failed to load", embedder.model_name()))?;
            tracing::info!(
                model = embedder.model_name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "embedding model ready"
            );
        }
        Ok(Some(embedder))
    }

    /// Fetch, extract, and chunk `location`. Never fails: problems yield a
    /// single placeholder passage.
    pub async fn load_passages(&self, location: &str) -> Vec<Passage> {
        let started = Instant::now();
        let text = match self.fetcher.load(location).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(location, error = %e, "document processing failed");
                return vec![Passage::placeholder(format!("Error processing document: {}", e))];
            }
        };

        let passages = chunk_document(&text, &self.config.chunking.params());
        if passages.is_empty() {
            tracing::warn!(location, chars = text.char_count(), "document produced no passages");
            return vec![Passage::placeholder(EMPTY_DOCUMENT_MESSAGE)];
        }
        tracing::info!(
            location,
            chars = text.char_count(),
            passages = passages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document chunked"
        );
        passages
    }

    /// Create a backend of `kind` and build it over `passages`. A build
    /// failure is logged and leaves the index empty.
    pub async fn build_index(&self, kind: BackendKind, passages: Vec<Passage>) -> Result<Box<dyn IndexBackend>> {
        self.ensure_ready().await?;

        let mut options = BackendOptions::new(self.vocabulary.clone());
        options.tfidf = self.config.tfidf.params();
        if let Some(Some(embedder)) = self.embedder.get() {
            options = options.with_embedder(embedder.clone());
        }
        let mut index = create_backend(kind, &options)?;

        let started = Instant::now();
        let count = passages.len();
        match index.build(passages).await {
            Ok(()) => tracing::info!(
                backend = %kind,
                passages = count,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "index built"
            ),
            Err(e) => tracing::error!(backend = %kind, error = %e, "index build failed, continuing with empty index"),
        }
        Ok(index)
    }

    /// Search then re-rank one question.
    pub async fn retrieve(&self, index: &dyn IndexBackend, question: &str) -> Retrieval {
        let raw = index.search(question, self.config.retrieval.top_k).await;
        let ranked = self.reranker.rerank(question, raw.clone());
        tracing::debug!(raw = raw.len(), ranked = ranked.len(), "retrieved clauses");
        Retrieval { raw, ranked }
    }

    async fn answer_question(&self, index: &dyn IndexBackend, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            bail!("question is empty");
        }
        let retrieval = self.retrieve(index, question).await;
        Ok(self.generator.generate(question, &retrieval.ranked).await)
    }

    /// Answer every question against `documents` with the configured backend.
    pub async fn answer(&self, documents: &str, questions: &[String]) -> Result<Vec<String>> {
        self.answer_with(self.config.retrieval.backend, documents, questions)
            .await
    }

    /// Answer with an explicit backend. Answers keep question order.
    pub async fn answer_with(
        &self,
        kind: BackendKind,
        documents: &str,
        questions: &[String],
    ) -> Result<Vec<String>> {
        let started = Instant::now();
        self.ensure_ready().await?;

        let passages = self.load_passages(documents).await;
        let index = self.build_index(kind, passages).await?;
        let index = index.as_ref();

        let answers: Vec<String> = stream::iter(questions.iter().cloned())
            .map(|question: String| async move {
                match self.answer_question(index, &question).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        tracing::warn!(question = %question, error = %e, "question failed");
                        format!("Unable to process this question: {}", e)
                    }
                }
            })
            .buffered(self.config.answer.concurrency.max(1))
            .collect()
            .await;

        tracing::info!(
            questions = questions.len(),
            backend = %kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request answered"
        );
        Ok(answers)
    }

    /// Build an index over two fixed passages and search it.
    pub async fn self_test(&self) -> Result<SelfTestReport> {
        let kind = self.config.retrieval.backend;
        let passages: Vec<Passage> = SELF_TEST_PASSAGES
            .iter()
            .map(|text| Passage::new(*text, Some(1), None))
            .collect();
        let count = passages.len();
        let index = self.build_index(kind, passages).await?;
        let hits = index.search(SELF_TEST_QUERY, 2).await;

        Ok(SelfTestReport {
            backend: kind,
            passages: count,
            results: hits.len(),
            top_result: hits
                .first()
                .map(|hit| format!("{}...", hit.content.chars().take(PREVIEW_CHARS).collect::<String>())),
        })
    }
}

fn load_vocabulary(config: &Config) -> Result<Vocabulary> {
    match &config.retrieval.vocabulary_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read vocabulary: {}", path.display()))?;
            Vocabulary::from_toml_str(&content)
                .with_context(|| format!("Invalid vocabulary: {}", path.display()))
        }
        None => Ok(Vocabulary::default()),
    }
}
