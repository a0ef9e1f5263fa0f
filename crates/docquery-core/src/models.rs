//! Data models shared by the chunker, index backends, and re-ranker.
//!
//! These types flow through one retrieval pass: extracted
//! [`DocumentText`] is split into [`Passage`]s, a backend turns a query
//! into [`RetrievalHit`]s, and [`IndexStats`] summarize what was indexed.

use serde::Serialize;
use uuid::Uuid;

/// Text extracted from one document, in reading order.
#[derive(Debug, Clone, Default)]
pub struct DocumentText {
    pub segments: Vec<TextSegment>,
    /// True when the source carries paragraph structure (DOCX) and
    /// headings can be trusted to label sections.
    pub structured: bool,
}

/// A run of extracted text, tagged with the page it came from.
#[derive(Debug, Clone)]
pub struct TextSegment {
    pub page_number: Option<u32>,
    pub text: String,
}

impl DocumentText {
    /// Wrap a single block of plain text as page 1.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            segments: vec![TextSegment {
                page_number: Some(1),
                text: text.into(),
            }],
            structured: false,
        }
    }

    /// Total number of characters across all segments.
    pub fn char_count(&self) -> usize {
        self.segments.iter().map(|s| s.text.chars().count()).sum()
    }
}

/// The atomic unit of indexed text.
///
/// Passages are created once by the chunker and never mutated. An index
/// refers to them by position; the `id` is only for tracing and display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub id: String,
    pub content: String,
    pub page_number: Option<u32>,
    pub section: Option<String>,
}

impl Passage {
    pub fn new(content: impl Into<String>, page_number: Option<u32>, section: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            page_number,
            section,
        }
    }

    /// A single stand-in passage used when a document yields no usable text.
    pub fn placeholder(message: impl Into<String>) -> Self {
        Self::new(message, Some(1), Some("Document".to_string()))
    }

    /// Human-readable location: `"Page N"` or `"Unknown"`.
    pub fn source_location(&self) -> String {
        match self.page_number {
            Some(n) => format!("Page {}", n),
            None => "Unknown".to_string(),
        }
    }
}

/// One search result.
///
/// `relevance_score` only orders hits from the same backend; dense,
/// TF-IDF and lexical scores live on different scales.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub content: String,
    pub relevance_score: f64,
    pub source_location: String,
    pub context: String,
    /// Index position of the passage this hit resolves to.
    pub position: usize,
}

/// Diagnostic summary of a built index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStats {
    pub passage_count: usize,
    pub mean_passage_length: f64,
    pub distinct_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary_size: Option<usize>,
}
