//! 설정 관리
//!
//! TOML 설정 파일 + 기본값. 파일이 없으면 기본값을 사용합니다.
//! 위치: `<config dir>/ragchat/config.toml`
//!
//! API 키는 설정 파일에 두지 않고 환경변수에서만 읽습니다.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::knowledge::{
    ChunkConfig, RetrievalConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_TOP_K,
};
use crate::llm::Provider;

// ============================================================================
// Config Directory
// ============================================================================

/// 설정 디렉토리 경로
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ragchat")
}

/// 기본 설정 파일 경로
pub fn default_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

// ============================================================================
// Types
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rag: RagConfig,
    pub llm: LlmConfig,
}

/// 청킹/검색 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 관련도 임계값 (초과해야 선택)
    pub relevance_threshold: f32,
    /// 최대 선택 청크 수
    pub top_k: usize,
    /// 문단/줄/공백 경계를 우선하는 청커 사용
    pub respect_separators: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            respect_separators: false,
        }
    }
}

impl RagConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }

    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            threshold: self.relevance_threshold,
            top_k: self.top_k,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.chunk_config().validate()?;

        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            return Err(RagError::InvalidConfig(format!(
                "relevance_threshold must be within [0, 1], got {}",
                self.relevance_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// LLM 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    /// 하위 모델 (None이면 프로바이더 기본값)
    pub model: Option<String>,
    /// API 베이스 URL 재정의
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 스트리밍 출력
    pub stream: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: None,
            base_url: None,
            timeout_secs: 60,
            stream: true,
        }
    }
}

impl LlmConfig {
    /// 실제 API 모델 ID
    pub fn resolved_model(&self) -> String {
        self.model
            .as_deref()
            .map(|m| self.provider.resolve_model(m))
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

// ============================================================================
// Loading
// ============================================================================

impl AppConfig {
    /// 파일에서 로드 (없으면 기본값)
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            RagError::InvalidConfig(format!("Failed to parse {:?}: {}", path, e))
        })?;

        tracing::debug!("Loaded config from {:?}", path);
        config.validate()?;
        Ok(config)
    }

    /// 기본 위치에서 로드
    pub fn load() -> Result<Self> {
        Self::load_from(&default_config_path())
    }

    /// 파일로 저장
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RagError::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.rag.validate()?;
        if self.llm.timeout_secs == 0 {
            return Err(RagError::InvalidConfig(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.relevance_threshold, 0.1);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[rag]\ntop_k = 5\n\n[llm]\nprovider = \"deepseek\"\nmodel = \"V3\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.llm.provider, Provider::DeepSeek);
        assert_eq!(config.llm.resolved_model(), "deepseek-chat");
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rag]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(RagError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.rag.relevance_threshold = 0.25;
        config.llm.model = Some("gpt-4o".to_string());
        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_ranges() {
        let mut rag = RagConfig::default();
        rag.relevance_threshold = 1.5;
        assert!(rag.validate().is_err());

        let mut rag = RagConfig::default();
        rag.top_k = 0;
        assert!(rag.validate().is_err());

        let mut rag = RagConfig::default();
        rag.chunk_size = 0;
        assert!(rag.validate().is_err());
    }
}
