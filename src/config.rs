//! TOML configuration for the docquery service.
//!
//! Every section and field has a default, so an empty file (or no file
//! at all, see [`load_config_or_default`]) yields a working
//! configuration. Secrets come from the environment:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `DOCQUERY_API_TOKEN` | overrides `server.api_token` |
//! | `PORT` | overrides the port of `server.bind` |
//! | `GEMINI_API_KEY` | read by the Gemini answer provider |
//! | `OPENAI_API_KEY` | read by the OpenAI embedding and answer providers |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docquery_core::chunk::ChunkerParams;
use docquery_core::index::{BackendKind, TfIdfParams};
use docquery_core::rerank::RerankParams;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub tfidf: TfIdfConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required by `POST /hackrx/run`.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_token: None,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Downloads larger than this are rejected.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            target_chars: default_target_chars(),
        }
    }
}

fn default_min_chars() -> usize {
    50
}
fn default_max_chars() -> usize {
    1000
}
fn default_target_chars() -> usize {
    800
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkerParams {
        ChunkerParams {
            min_chars: self.min_chars,
            max_chars: self.max_chars,
            target_chars: self.target_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Raw hits requested from the backend per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Composite score a re-ranked hit must exceed.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Replaces the built-in vocabulary tables.
    #[serde(default)]
    pub vocabulary_path: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            top_k: default_top_k(),
            threshold: default_threshold(),
            max_results: default_max_results(),
            vocabulary_path: None,
        }
    }
}

fn default_backend() -> BackendKind {
    BackendKind::TfIdf
}
fn default_top_k() -> usize {
    5
}
fn default_threshold() -> f64 {
    0.3
}
fn default_max_results() -> usize {
    5
}

impl RetrievalConfig {
    pub fn rerank_params(&self) -> RerankParams {
        RerankParams {
            threshold: self.threshold,
            max_results: self.max_results,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TfIdfConfig {
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_max_df")]
    pub max_df: f64,
    #[serde(default = "default_min_df")]
    pub min_df: usize,
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
}

impl Default for TfIdfConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            max_df: default_max_df(),
            min_df: default_min_df(),
            ngram_max: default_ngram_max(),
        }
    }
}

fn default_max_features() -> usize {
    5000
}
fn default_max_df() -> f64 {
    0.95
}
fn default_min_df() -> usize {
    1
}
fn default_ngram_max() -> usize {
    2
}

impl TfIdfConfig {
    pub fn params(&self) -> TfIdfParams {
        TfIdfParams {
            max_features: self.max_features,
            max_df: self.max_df,
            min_df: self.min_df,
            ngram_max: self.ngram_max,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the OpenAI or Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hashing".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_provider")]
    pub provider: String,
    #[serde(default = "default_answer_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Overrides the provider's API base URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_answer_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Questions of one request answered in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: default_answer_provider(),
            model: default_answer_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            top_p: default_top_p(),
            url: None,
            max_retries: default_answer_retries(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_answer_provider() -> String {
    "gemini".to_string()
}
fn default_answer_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_output_tokens() -> u32 {
    500
}
fn default_top_p() -> f32 {
    0.9
}
fn default_answer_retries() -> u32 {
    2
}
fn default_concurrency() -> usize {
    4
}

impl Config {
    /// Apply `PORT` and `DOCQUERY_API_TOKEN` using `lookup` for values.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DOCQUERY_API_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.server.api_token = Some(token);
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got '{}'", port))?;
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host)
                .unwrap_or("0.0.0.0");
            self.server.bind = format!("{}:{}", host, port);
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|k| std::env::var(k).ok())
    }

    /// Check ranges and enumerations.
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.min_chars == 0 {
            bail!("chunking.min_chars must be > 0");
        }
        if c.min_chars >= c.target_chars || c.target_chars > c.max_chars {
            bail!(
                "chunking requires min_chars < target_chars <= max_chars (got {} / {} / {})",
                c.min_chars,
                c.target_chars,
                c.max_chars
            );
        }

        let r = &self.retrieval;
        if r.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if r.max_results == 0 {
            bail!("retrieval.max_results must be >= 1");
        }
        if !(0.0..=1.0).contains(&r.threshold) {
            bail!("retrieval.threshold must be in [0.0, 1.0]");
        }

        let t = &self.tfidf;
        if t.max_features == 0 {
            bail!("tfidf.max_features must be > 0");
        }
        if !(t.max_df > 0.0 && t.max_df <= 1.0) {
            bail!("tfidf.max_df must be in (0.0, 1.0]");
        }
        if t.ngram_max == 0 {
            bail!("tfidf.ngram_max must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "hashing" | "local" => {}
            "openai" | "ollama" => {
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, hashing, local, openai, or ollama.",
                other
            ),
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.retrieval.backend == BackendKind::Dense && !self.embedding.is_enabled() {
            bail!("retrieval.backend = \"dense\" requires an embedding provider");
        }

        let a = &self.answer;
        match a.provider.as_str() {
            "disabled" | "gemini" | "openai" => {}
            other => bail!(
                "Unknown answer provider: '{}'. Must be disabled, gemini, or openai.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&a.temperature) {
            bail!("answer.temperature must be in [0.0, 2.0]");
        }
        if !(a.top_p > 0.0 && a.top_p <= 1.0) {
            bail!("answer.top_p must be in (0.0, 1.0]");
        }
        if a.max_output_tokens == 0 {
            bail!("answer.max_output_tokens must be > 0");
        }
        if a.concurrency == 0 {
            bail!("answer.concurrency must be >= 1");
        }
        Ok(())
    }
}

/// Parse a configuration document, apply environment overrides, validate.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    tracing::warn!(path = %path.display(), "config file not found, using defaults");
    parse_config("")
}
