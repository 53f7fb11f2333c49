//! DOCX 텍스트 추출 모듈
//!
//! DOCX는 ZIP 아카이브이며 본문은 `word/document.xml`에 있습니다.
//! `<w:t>` 텍스트 런을 이어붙이고, 문단(`</w:p>`)과 줄바꿈(`<w:br/>`)은 개행으로 바꿉니다.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RagError, Result};

/// 본문 XML 엔트리 이름
const DOCUMENT_XML: &str = "word/document.xml";

/// DOCX에서 텍스트 추출
pub fn extract_text_from_docx(path: &Path) -> Result<String> {
    let error = |message: String| RagError::Extraction {
        path: path.to_path_buf(),
        message,
    };

    let file =
        std::fs::File::open(path).map_err(|e| error(format!("Failed to open DOCX: {}", e)))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| error(format!("Invalid DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| error(format!("Missing {}: {}", DOCUMENT_XML, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| error(format!("Failed to read {}: {}", DOCUMENT_XML, e)))?;

    let text = document_xml_to_text(&xml);
    if text.is_empty() {
        tracing::warn!("No text extracted from DOCX: {:?}", path);
    }
    Ok(text)
}

fn token_pattern() -> &'static Regex {
    static TOKENS: OnceLock<Regex> = OnceLock::new();
    TOKENS.get_or_init(|| {
        // 텍스트 런 | 줄바꿈 | 문단 끝
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:br\b[^>]*/>|</w:p>").expect("Invalid regex")
    })
}

/// `word/document.xml` 본문을 평문으로 변환
pub fn document_xml_to_text(xml: &str) -> String {
    let mut text = String::new();

    for caps in token_pattern().captures_iter(xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&unescape_xml(run.as_str())),
            None => text.push('\n'),
        }
    }

    text.trim_end().to_string()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>the mat</w:t></w:r><w:r><w:t xml:space="preserve"> was red</w:t></w:r></w:p>
<w:p><w:r><w:t>cats &amp; dogs</w:t><w:br/><w:t>second line</w:t></w:r></w:p>
<w:p/>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body>
</w:document>"#;

    fn write_docx(path: &Path, document_xml: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file(DOCUMENT_XML, options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_document_xml_to_text() {
        assert_eq!(
            document_xml_to_text(BODY),
            "the mat was red\ncats & dogs\nsecond line\ncell"
        );
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &lt;b&gt; &amp;amp;"), "a <b> &amp;");
    }

    #[test]
    fn test_extract_from_generated_docx() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.docx");
        write_docx(&path, BODY);

        let text = extract_text_from_docx(&path).unwrap();
        assert!(text.starts_with("the mat was red\n"));
        assert!(text.ends_with("cell"));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, "plain text, not a zip").unwrap();

        let err = extract_text_from_docx(&path).unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }

    #[test]
    fn test_missing_document_xml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.docx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("docProps/app.xml", options).unwrap();
        zip.write_all(b"<Properties/>").unwrap();
        zip.finish().unwrap();

        let err = extract_text_from_docx(&path).unwrap_err();
        assert!(err.to_string().contains(DOCUMENT_XML));
    }
}
