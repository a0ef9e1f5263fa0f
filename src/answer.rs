//! Answer generation from re-ranked clauses.
//!
//! The generator sends a fixed analyst prompt plus the numbered clauses to
//! Gemini or an OpenAI-compatible chat endpoint. When the provider is
//! disabled, has no API key, or fails after retries, it falls back to a
//! deterministic answer quoting the top clause. With no clauses at all the
//! model is never called.

use std::time::Duration;

use anyhow::{Context, Result};

use docquery_core::models::RetrievalHit;

use crate::config::AnswerConfig;
use crate::retry::{post_json_with_retry, Auth};

pub const NO_INFORMATION_ANSWER: &str =
    "I couldn't find relevant information in the document to answer your question.";

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

const SYSTEM_PROMPT: &str = "You are an expert document analyst specializing in insurance, legal, HR, and compliance documents.

Answer questions accurately and concisely using only the provided document clauses:

1. ACCURACY: Base every statement strictly on the provided clauses.
2. CLARITY: Give clear, direct answers without unnecessary jargon.
3. COMPLETENESS: Include relevant conditions, limitations, and exceptions.
4. EVIDENCE: Refer to specific clauses when making statements.

For questions about coverage, benefits, or eligibility:
- State clearly what is covered or included.
- Mention conditions or requirements.
- Note limitations, exclusions, or waiting periods.
- Include specific amounts, percentages, or time periods when mentioned.

For yes/no questions, start with a clear \"Yes\" or \"No\", then give the conditions and exceptions.";

/// Words that mark a question as yes/no for the fallback answer.
const BOOLEAN_MARKERS: &[&str] = &["does", "is", "are", "can"];
/// Clause words that make a yes/no fallback read as an affirmation.
const AFFIRMATIVE_MARKERS: &[&str] = &["cover", "include", "eligible"];

enum Provider {
    Disabled,
    Gemini { url: String, api_key: String },
    OpenAI { url: String, api_key: String },
}

pub struct AnswerGenerator {
    provider: Provider,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    max_retries: u32,
    client: reqwest::Client,
}

impl AnswerGenerator {
    /// Build from config, reading `GEMINI_API_KEY` or `OPENAI_API_KEY`.
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let key_var = match config.provider.as_str() {
            "gemini" => Some("GEMINI_API_KEY"),
            "openai" => Some("OPENAI_API_KEY"),
            _ => None,
        };
        let api_key = key_var.and_then(|var| std::env::var(var).ok());
        if let (Some(var), None) = (key_var, api_key.as_ref()) {
            tracing::warn!(
                provider = %config.provider,
                "{} not set, answers will use the fallback summary",
                var
            );
        }
        Self::with_api_key(config, api_key)
    }

    /// Build with an explicit key. A missing or blank key disables the provider.
    pub fn with_api_key(config: &AnswerConfig, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let provider = match (config.provider.as_str(), api_key) {
            ("gemini", Some(api_key)) => Provider::Gemini {
                url: config
                    .url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
                api_key,
            },
            ("openai", Some(api_key)) => Provider::OpenAI {
                url: config
                    .url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
                api_key,
            },
            _ => Provider::Disabled,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            top_p: config.top_p,
            max_retries: config.max_retries,
            client,
        })
    }

    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            Provider::Disabled => "disabled",
            Provider::Gemini { .. } => "gemini",
            Provider::OpenAI { .. } => "openai",
        }
    }

    /// Answer `question` from `clauses` (best first). Never fails.
    pub async fn generate(&self, question: &str, clauses: &[RetrievalHit]) -> String {
        if clauses.is_empty() {
            return NO_INFORMATION_ANSWER.to_string();
        }
        if matches!(self.provider, Provider::Disabled) {
            return fallback_answer(question, clauses);
        }

        let prompt = build_user_prompt(question, clauses);
        match self.call_model(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(provider = self.provider_name(), error = %e, "answer generation failed, using fallback");
                fallback_answer(question, clauses)
            }
        }
    }

    async fn call_model(&self, user_prompt: &str) -> Result<String> {
        let text = match &self.provider {
            Provider::Disabled => anyhow::bail!("answer provider is disabled"),
            Provider::Gemini { url, api_key } => {
                let endpoint = format!(
                    "{}/v1beta/models/{}:generateContent",
                    url.trim_end_matches('/'),
                    self.model
                );
                let body = serde_json::json!({
                    "contents": [{
                        "role": "user",
                        "parts": [{ "text": format!("{}\n\n{}", SYSTEM_PROMPT, user_prompt) }]
                    }],
                    "generationConfig": {
                        "temperature": self.temperature,
                        "maxOutputTokens": self.max_output_tokens,
                        "topP": self.top_p,
                    }
                });
                let json = post_json_with_retry(
                    &self.client,
                    &endpoint,
                    Auth::Header("x-goog-api-key", api_key),
                    &body,
                    self.max_retries,
                    "Gemini",
                )
                .await?;
                parse_gemini_response(&json)?
            }
            Provider::OpenAI { url, api_key } => {
                let endpoint = format!("{}/v1/chat/completions", url.trim_end_matches('/'));
                let body = serde_json::json!({
                    "model": self.model,
                    "messages": [
                        { "role": "system", "content": SYSTEM_PROMPT },
                        { "role": "user", "content": user_prompt }
                    ],
                    "temperature": self.temperature,
                    "max_tokens": self.max_output_tokens,
                    "top_p": self.top_p,
                });
                let json = post_json_with_retry(
                    &self.client,
                    &endpoint,
                    Auth::Bearer(api_key),
                    &body,
                    self.max_retries,
                    "OpenAI",
                )
                .await?;
                parse_openai_chat_response(&json)?
            }
        };

        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("model returned an empty answer");
        }
        Ok(text.to_string())
    }
}

/// The user turn: the question followed by every clause with its score and source.
pub fn build_user_prompt(question: &str, clauses: &[RetrievalHit]) -> String {
    let context = clauses
        .iter()
        .enumerate()
        .map(|(i, clause)| {
            format!(
                "Clause {} (Relevance: {:.2}):\nSource: {}\nContent: {}\n",
                i + 1,
                clause.relevance_score,
                clause.source_location,
                clause.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Based on the following document clauses, please answer this question:\n\n\
         QUESTION: {}\n\n\
         RELEVANT CLAUSES:\n{}\n\
         Answer clearly and accurately using only these clauses. If they do not contain \
         enough information to fully answer the question, state what is available and what is missing.",
        question, context
    )
}

/// Deterministic answer quoting the top clause.
pub fn fallback_answer(question: &str, clauses: &[RetrievalHit]) -> String {
    let Some(top) = clauses.first() else {
        return NO_INFORMATION_ANSWER.to_string();
    };

    let question = question.to_lowercase();
    let is_boolean = question
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| BOOLEAN_MARKERS.contains(&word));

    if is_boolean {
        let content = top.content.to_lowercase();
        let prefix = if AFFIRMATIVE_MARKERS.iter().any(|m| content.contains(m)) {
            "Based on the policy document"
        } else {
            "According to the document"
        };
        format!("{}: {}...", prefix, truncate_chars(&top.content, 200))
    } else {
        format!(
            "Based on the policy information: {}...",
            truncate_chars(&top.content, 300)
        )
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .context("Invalid Gemini response: missing candidates[0].content.parts")?;
    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

fn parse_openai_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .context("Invalid OpenAI response: missing choices[0].message.content")
}
