//! Paragraph-first text chunker.
//!
//! Splits extracted document text into [`Passage`]s bounded by
//! [`ChunkerParams`]. Paragraphs are the primary unit; only paragraphs
//! that exceed `max_chars` are broken down further, first by sentence and
//! then, for runaway sentences, at whitespace.
//!
//! # Algorithm
//!
//! 1. Normalize `\r\n` to `\n` and split each page on blank lines (a line
//!    holding only whitespace counts as blank).
//! 2. Drop paragraphs shorter than `min_chars`.
//! 3. Paragraphs up to `max_chars` become one passage, trimmed.
//! 4. Longer paragraphs are split into sentences (terminator kept) and
//!    greedily packed into pieces of at most `target_chars`. A sentence
//!    longer than `target_chars` is split at whitespace; only a single
//!    word longer than the target is cut mid-word.
//! 5. Pieces shorter than `min_chars` are merged into a neighbour when the
//!    result stays within `target_chars`, or dropped otherwise. The one
//!    exception is the short tail of a hard-split word, which stays glued
//!    to the fragment before it (still within `max_chars`).
//!
//! For structured sources (DOCX) headings label the passages that follow
//! them. Continuous text (PDF, plain text) is labelled `Document`.
//!
//! All lengths are counted in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use docquery_core::chunk::{chunk_text, ChunkerParams};
//!
//! let text = "Grace period of thirty days is allowed for premium payment.\n\nshort";
//! let passages = chunk_text(text, Some(1), &ChunkerParams::default());
//! assert_eq!(passages.len(), 1);
//! assert_eq!(passages[0].page_number, Some(1));
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{DocumentText, Passage};

/// Section label for passages from unstructured sources.
pub const DEFAULT_SECTION: &str = "Document";

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph regex"));

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("sentence regex"));

static HEADING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^[A-Z\s]+$", r"^\d+\.\s+[A-Z]", r"^[A-Z][a-z\s]+:$"]
        .iter()
        .map(|p| Regex::new(p).expect("heading regex"))
        .collect()
});

/// Size bounds for generated passages, in characters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkerParams {
    /// Paragraphs and pieces shorter than this are noise.
    pub min_chars: usize,
    /// Paragraphs longer than this are split by sentence.
    pub max_chars: usize,
    /// Upper bound for pieces produced by sentence packing.
    pub target_chars: usize,
}

impl Default for ChunkerParams {
    fn default() -> Self {
        Self {
            min_chars: 50,
            max_chars: 1000,
            target_chars: 800,
        }
    }
}

/// Chunk a whole extracted document, page by page.
///
/// Returns passages in reading order. May return an empty vector when
/// nothing survives the noise filter; callers substitute a placeholder.
pub fn chunk_document(doc: &DocumentText, params: &ChunkerParams) -> Vec<Passage> {
    let mut passages = Vec::new();
    let mut section = DEFAULT_SECTION.to_string();

    for segment in &doc.segments {
        let normalized = segment.text.replace("\r\n", "\n");
        for para in PARAGRAPH_BREAK.split(&normalized) {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }
            if doc.structured && is_heading(para) {
                section = para.to_string();
            }
            for piece in split_paragraph(para, params) {
                passages.push(Passage::new(piece, segment.page_number, Some(section.clone())));
            }
        }
    }

    tracing::debug!(
        passages = passages.len(),
        chars = doc.char_count(),
        structured = doc.structured,
        "chunked document"
    );
    passages
}

/// Chunk a single block of continuous text.
pub fn chunk_text(text: &str, page_number: Option<u32>, params: &ChunkerParams) -> Vec<Passage> {
    let doc = DocumentText {
        segments: vec![crate::models::TextSegment {
            page_number,
            text: text.to_string(),
        }],
        structured: false,
    };
    chunk_document(&doc, params)
}

/// Whether a paragraph looks like a section title.
pub fn is_heading(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if HEADING_PATTERNS.iter().any(|re| re.is_match(text)) {
        return true;
    }
    char_len(text) < 100 && is_all_upper(text)
}

/// At least one cased character and no lowercase ones.
fn is_all_upper(text: &str) -> bool {
    text.chars().any(|c| c.is_uppercase()) && !text.chars().any(|c| c.is_lowercase())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Turn one trimmed paragraph into zero or more bounded pieces.
fn split_paragraph(para: &str, params: &ChunkerParams) -> Vec<String> {
    let len = char_len(para);
    if len < params.min_chars {
        return Vec::new();
    }
    if len <= params.max_chars {
        return vec![para.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(para) {
        let sentence_len = char_len(sentence);
        if sentence_len > params.target_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(split_at_whitespace(sentence, params.target_chars, params.min_chars));
            continue;
        }
        if current.is_empty() {
            current.push_str(sentence);
        } else if char_len(&current) + 1 + sentence_len > params.target_chars {
            pieces.push(std::mem::replace(&mut current, sentence.to_string()));
        } else {
            current.push(' ');
            current.push_str(sentence);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    merge_short(pieces, params)
}

/// Split on `.`, `!` or `?` runs followed by whitespace. Terminators stay
/// with their sentence; a trailing fragment without one is kept as-is.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Pack whitespace-separated words into pieces of at most `limit` chars.
fn split_at_whitespace(text: &str, limit: usize, min_tail: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = char_len(word);
        if word_len > limit {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(hard_split(word, limit, min_tail));
            continue;
        }
        if current.is_empty() {
            current.push_str(word);
        } else if char_len(&current) + 1 + word_len > limit {
            pieces.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Cut on character boundaries every `limit` chars. A tail shorter than
/// `min_tail` stays attached to the fragment before it, so that fragment
/// may exceed `limit`.
fn hard_split(word: &str, limit: usize, min_tail: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut pieces: Vec<String> = chars
        .chunks(limit.max(1))
        .map(|c| c.iter().collect())
        .collect();
    if pieces.len() > 1 && pieces.last().is_some_and(|t| char_len(t) < min_tail) {
        if let Some(tail) = pieces.pop() {
            if let Some(prev) = pieces.last_mut() {
                prev.push_str(&tail);
            }
        }
    }
    pieces
}

/// Fold pieces below `min_chars` into the previous piece, or carry them
/// forward into the next one, as long as the result stays within
/// `target_chars`. A short piece with no room anywhere is dropped.
fn merge_short(pieces: Vec<String>, params: &ChunkerParams) -> Vec<String> {
    let fits = |a: &str, b: &str| char_len(a) + 1 + char_len(b) <= params.target_chars;
    let mut out: Vec<String> = Vec::new();
    let mut carry: Option<String> = None;

    for piece in pieces {
        let piece = match carry.take() {
            Some(short) if fits(&short, &piece) => format!("{} {}", short, piece),
            Some(short) => {
                tracing::debug!(chars = char_len(&short), "dropping short piece");
                piece
            }
            None => piece,
        };
        if char_len(&piece) >= params.min_chars {
            out.push(piece);
            continue;
        }
        match out.last_mut() {
            Some(last) if fits(last, &piece) => {
                last.push(' ');
                last.push_str(&piece);
            }
            _ => carry = Some(piece),
        }
    }

    if let Some(short) = carry {
        match out.last_mut() {
            Some(last) if fits(last, &short) => {
                last.push(' ');
                last.push_str(&short);
            }
            _ => tracing::debug!(chars = char_len(&short), "dropping short piece"),
        }
    }
    out
}
