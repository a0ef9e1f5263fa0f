//! Integration tests for PDF, DOCX, and text documents through the query
//! service: extraction, chunking, placeholders, and size limits.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use docquery::config::Config;
use docquery::pipeline::{QueryService, EMPTY_DOCUMENT_MESSAGE};

const GRACE: &str = "Grace period of thirty days for premium payment is allowed.";

/// Minimal valid PDF with one page per entry of `pages`. Builds the body
/// then an xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    // objects: 1 catalog, 2 pages, 3 font, then (page, contents) pairs
    let mut offsets = Vec::new();
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    offsets.push(out.len());
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    offsets.push(out.len());
    out.extend_from_slice(b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");

    for (i, text) in pages.iter().enumerate() {
        let page_id = 4 + 2 * i;
        let content_id = page_id + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id, content_id
            )
            .as_bytes(),
        );
        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
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

fn service() -> QueryService {
    let mut config = Config::default();
    config.answer.provider = "disabled".to_string();
    QueryService::new(config).unwrap()
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> String {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn pdf_pages_become_page_numbers() {
    let tmp = TempDir::new().unwrap();
    let pdf = minimal_pdf(&[
        GRACE,
        "Cataract surgery has a waiting period of two years from inception.",
    ]);
    let location = write(tmp.path(), "policy.pdf", &pdf);

    let passages = service().load_passages(&location).await;
    assert_eq!(passages.len(), 2, "{:?}", passages);
    assert!(passages[0].content.contains("thirty days"));
    assert_eq!(passages[0].source_location(), "Page 1");
    assert_eq!(passages[1].source_location(), "Page 2");
}

#[tokio::test]
async fn docx_headings_label_sections() {
    let tmp = TempDir::new().unwrap();
    let docx = minimal_docx(&[
        "EXCLUSIONS",
        "Cosmetic surgery and dental treatment are not covered under this policy at all.",
        "BENEFITS",
        "Ambulance charges are reimbursed up to a limit of two thousand rupees per claim.",
    ]);
    let location = write(tmp.path(), "policy.docx", &docx);

    let passages = service().load_passages(&location).await;
    assert_eq!(passages.len(), 2, "{:?}", passages);
    assert_eq!(passages[0].section.as_deref(), Some("EXCLUSIONS"));
    assert_eq!(passages[1].section.as_deref(), Some("BENEFITS"));
}

#[tokio::test]
async fn corrupt_pdf_becomes_error_placeholder() {
    let tmp = TempDir::new().unwrap();
    let location = write(tmp.path(), "broken.pdf", b"%PDF-1.4 truncated");

    let passages = service().load_passages(&location).await;
    assert_eq!(passages.len(), 1);
    assert!(passages[0].content.starts_with("Error processing document: "));
}

#[tokio::test]
async fn short_text_becomes_empty_placeholder() {
    let tmp = TempDir::new().unwrap();
    let location = write(tmp.path(), "tiny.txt", b"Too short.");

    let passages = service().load_passages(&location).await;
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].content, EMPTY_DOCUMENT_MESSAGE);
}

#[tokio::test]
async fn oversized_document_becomes_placeholder() {
    let tmp = TempDir::new().unwrap();
    let location = write(tmp.path(), "big.txt", GRACE.repeat(10).as_bytes());

    let mut config = Config::default();
    config.answer.provider = "disabled".to_string();
    config.document.max_bytes = 64;
    let passages = QueryService::new(config).unwrap().load_passages(&location).await;
    assert_eq!(passages.len(), 1);
    assert!(passages[0].content.contains("64 byte limit"));
}

#[tokio::test]
async fn pdf_answers_cite_content() {
    let tmp = TempDir::new().unwrap();
    let location = write(tmp.path(), "policy.pdf", &minimal_pdf(&[GRACE]));

    let answers = service()
        .answer(&location, &["Explain the grace period for premium payment".to_string()])
        .await
        .unwrap();
    assert_eq!(answers.len(), 1);
    assert!(answers[0].starts_with("Based on the policy information:"), "{}", answers[0]);
    assert!(answers[0].contains("thirty days"));
}
