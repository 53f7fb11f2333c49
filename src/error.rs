//! 에러 타입
//!
//! 라이브러리 레벨 에러는 `RagError`로 표현하고,
//! CLI 레이어에서는 `anyhow`로 컨텍스트를 덧붙입니다.

use std::path::PathBuf;

use thiserror::Error;

/// ragchat 공통 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 잘못된 설정 값 (chunk_size, overlap, threshold 등)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 지원하지 않는 문서 형식
    #[error("Unsupported file type: '{extension}'. Supported: txt, md, csv, pdf, docx")]
    UnsupportedFormat { extension: String },

    /// 텍스트 추출 실패
    #[error("Failed to extract text from {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// API 키 미설정
    #[error("API key for {provider} not found. Set {env_vars} environment variable")]
    MissingApiKey {
        provider: &'static str,
        env_vars: String,
    },

    /// LLM 호출 실패
    #[error("{provider} API error: {message}")]
    Llm {
        provider: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

// ============================================================================
// Tests
// ============================================================================
