//! Document download and loading.
//!
//! `http://` and `https://` locations are downloaded with reqwest under a
//! timeout and a size cap. Anything else (including `file://` URLs) is
//! read from the local filesystem, which is what the CLI uses.

use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

use docquery_core::models::DocumentText;

use crate::config::DocumentConfig;
use crate::extract::{detect_kind, extract, DocumentKind, ExtractError};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("download failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error("document exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Raw document bytes with their detected kind.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
}

pub struct DocumentFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl DocumentFetcher {
    pub fn new(config: &DocumentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    pub async fn fetch(&self, location: &str) -> Result<FetchedDocument, FetchError> {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            self.download(location).await
        } else {
            self.read_local(location).await
        }
    }

    async fn download(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        let kind = detect_kind(content_type.as_deref(), url);
        tracing::info!(url, bytes = bytes.len(), kind = kind.as_str(), "downloaded document");
        Ok(FetchedDocument { bytes, kind })
    }

    async fn read_local(&self, location: &str) -> Result<FetchedDocument, FetchError> {
        let path = location.strip_prefix("file://").unwrap_or(location);
        let bytes = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
            path: path.to_string(),
            source,
        })?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(FetchedDocument {
            kind: detect_kind(None, path),
            bytes,
        })
    }

    /// Fetch and extract. Extraction runs on the blocking pool.
    pub async fn load(&self, location: &str) -> Result<DocumentText, FetchError> {
        let doc = self.fetch(location).await?;
        let text = tokio::task::spawn_blocking(move || extract(&doc.bytes, doc.kind))
            .await
            .map_err(|e| FetchError::Task(e.to_string()))??;
        Ok(text)
    }
}
