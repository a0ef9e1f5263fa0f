//! Text extraction for downloaded documents (PDF, DOCX, plain text).
//!
//! The fetcher supplies bytes plus a [`DocumentKind`]; this module returns
//! [`DocumentText`] ready for the chunker. PDF text keeps its page
//! boundaries. DOCX text keeps paragraph boundaries and is marked
//! structured so headings can label sections.

use std::io::Read;

use thiserror::Error;

use docquery_core::models::{DocumentText, TextSegment};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Text => "text",
        }
    }
}

/// Decide the document kind from the response content-type, falling back
/// to the extension of `location` (query string and fragment ignored).
pub fn detect_kind(content_type: Option<&str>, location: &str) -> DocumentKind {
    let ct = content_type.unwrap_or_default().to_ascii_lowercase();
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    if ct.contains("pdf") || path.ends_with(".pdf") {
        DocumentKind::Pdf
    } else if ct.contains("word") || ct.contains("officedocument") || path.ends_with(".docx") || path.ends_with(".doc") {
        DocumentKind::Docx
    } else {
        DocumentKind::Text
    }
}

pub fn extract(bytes: &[u8], kind: DocumentKind) -> Result<DocumentText, ExtractError> {
    match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Text => Ok(DocumentText::plain(String::from_utf8_lossy(bytes).into_owned())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<DocumentText, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let segments = pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| TextSegment {
            page_number: Some(i as u32 + 1),
            text,
        })
        .collect();
    Ok(DocumentText {
        segments,
        structured: false,
    })
}

fn extract_docx(bytes: &[u8]) -> Result<DocumentText, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(format!("word/document.xml: {}", e)))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    let paragraphs = docx_paragraphs(&doc_xml)?;
    Ok(DocumentText {
        segments: vec![TextSegment {
            page_number: Some(1),
            text: paragraphs.join("\n\n"),
        }],
        structured: true,
    })
}

/// Non-empty `w:p` paragraphs, each the concatenation of its `w:t` runs.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(Event::Text(te)) = reader.read_event_into(&mut buf) {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" | b"br" => current.push(' '),
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with(body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind(Some("application/pdf"), "https://x/doc"), DocumentKind::Pdf);
        assert_eq!(
            detect_kind(None, "https://x/policy.PDF?sv=2023&sig=abc"),
            DocumentKind::Pdf
        );
        assert_eq!(
            detect_kind(
                Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
                "https://x/file"
            ),
            DocumentKind::Docx
        );
        assert_eq!(detect_kind(None, "/tmp/contract.docx"), DocumentKind::Docx);
        assert_eq!(detect_kind(Some("text/plain"), "https://x/a.txt"), DocumentKind::Text);
        assert_eq!(detect_kind(None, "https://x/a.pdf.txt"), DocumentKind::Text);
    }

    #[test]
    fn test_plain_text_lossy() {
        let doc = extract(b"caf\xff text", DocumentKind::Text).unwrap();
        assert_eq!(doc.segments.len(), 1);
        assert_eq!(doc.segments[0].page_number, Some(1));
        assert!(doc.segments[0].text.starts_with("caf"));
        assert!(!doc.structured);
    }

    #[test]
    fn test_docx_paragraphs_and_runs() {
        let bytes = docx_with(
            "<w:p><w:r><w:t>EXCLUSIONS</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Cosmetic surgery </w:t></w:r><w:r><w:t>is excluded.</w:t></w:r></w:p>\
             <w:p></w:p>\
             <w:p><w:r><w:t>Item</w:t><w:tab/><w:t>Limit &amp; cap</w:t></w:r></w:p>",
        );
        let doc = extract(&bytes, DocumentKind::Docx).unwrap();
        assert!(doc.structured);
        assert_eq!(
            doc.segments[0].text,
            "EXCLUSIONS\n\nCosmetic surgery is excluded.\n\nItem Limit & cap"
        );
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract(b"not a pdf", DocumentKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_invalid_zip_returns_error_for_docx() {
        let err = extract(b"not a zip", DocumentKind::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn test_docx_without_document_xml() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract(&buf, DocumentKind::Docx).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
