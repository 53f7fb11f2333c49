//! 콘텐츠 추출 모듈
//!
//! 업로드된 문서에서 청킹할 텍스트를 추출합니다.
//! - 텍스트/마크다운/CSV: UTF-8로 직접 읽기
//! - PDF: pdf-extract로 텍스트 추출
//! - DOCX: ZIP 안의 `word/document.xml`에서 텍스트 런 추출
//!
//! 그 외 확장자는 `RagError::UnsupportedFormat` 입니다.

pub mod docx;
pub mod pdf;

use std::path::Path;

use crate::error::{RagError, Result};

// ============================================================================
// Document Format
// ============================================================================

/// 지원하는 문서 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// 일반 텍스트
    Text,
    /// 마크다운
    Markdown,
    /// CSV (원문 그대로 텍스트로 취급)
    Csv,
    /// PDF
    Pdf,
    /// Word 문서
    Docx,
}

impl DocumentFormat {
    /// 확장자로 형식 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "text" | "log" => Some(DocumentFormat::Text),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "csv" => Some(DocumentFormat::Csv),
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    /// 파일 경로에서 형식 결정
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        Self::from_extension(ext).ok_or_else(|| RagError::UnsupportedFormat {
            extension: ext.to_string(),
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "TXT",
            DocumentFormat::Markdown => "MD",
            DocumentFormat::Csv => "CSV",
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
        }
    }
}

// ============================================================================
// Extracted Document
// ============================================================================

/// 추출된 문서
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// 추출된 텍스트 (PDF는 페이지를 이어붙인 전체 텍스트)
    pub text: String,
    /// 원본 형식
    pub format: DocumentFormat,
    /// 페이지 수 (PDF)
    pub pages: Option<usize>,
}

// ============================================================================
// Extraction
// ============================================================================

/// 파일에서 텍스트 추출
pub async fn extract(path: &Path) -> Result<ExtractedDocument> {
    let format = DocumentFormat::from_path(path)?;

    match format {
        DocumentFormat::Text | DocumentFormat::Markdown | DocumentFormat::Csv => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| RagError::Extraction {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;

            Ok(ExtractedDocument {
                text,
                format,
                pages: None,
            })
        }
        DocumentFormat::Pdf => {
            // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
            let owned = path.to_path_buf();
            let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&owned))
                .await
                .map_err(|e| RagError::Extraction {
                    path: path.to_path_buf(),
                    message: format!("PDF extraction task failed: {}", e),
                })??;

            let page_count = pages.len();
            let text = pages
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join("\n");

            Ok(ExtractedDocument {
                text,
                format,
                pages: Some(page_count),
            })
        }
        DocumentFormat::Docx => {
            let owned = path.to_path_buf();
            let text = tokio::task::spawn_blocking(move || docx::extract_text_from_docx(&owned))
                .await
                .map_err(|e| RagError::Extraction {
                    path: path.to_path_buf(),
                    message: format!("DOCX extraction task failed: {}", e),
                })??;

            Ok(ExtractedDocument {
                text,
                format,
                pages: None,
            })
        }
    }
}

/// 파일에서 텍스트만 추출 (편의 함수)
pub async fn extract_text(path: &Path) -> Result<String> {
    extract(path).await.map(|doc| doc.text)
}

// ============================================================================
// Tests
// ============================================================================
