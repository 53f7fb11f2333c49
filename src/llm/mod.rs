//! LLM 모듈 - 채팅 완성 클라이언트
//!
//! 프로바이더(OpenAI, DeepSeek)별 구현을 `ChatClient` 트레이트 하나로 감쌉니다.
//! 두 프로바이더 모두 OpenAI 호환 `/chat/completions` API를 사용하므로
//! 구현체는 `OpenAiCompatibleClient` 하나이고 엔드포인트/모델/API 키만 다릅니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let client = OpenAiCompatibleClient::new(Provider::OpenAi, None)?;
//! let answer = client.complete(&[ChatMessage::user("Hello")]).await?;
//! ```

mod openai;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{RagError, Result};
use crate::prompt::ChatMessage;

pub use openai::{parse_sse_line, OpenAiCompatibleClient, SseEvent, SseLineBuffer};

/// 스트리밍 응답 채널 (델타 단위)
pub type CompletionStream = mpsc::Receiver<Result<String>>;

// ============================================================================
// ChatClient Trait
// ============================================================================

/// 채팅 완성 클라이언트 트레이트
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// 메시지 목록으로 전체 응답 생성
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// 스트리밍 응답 생성 (기본 구현: 전체 응답을 한 번에 전달)
    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        let answer = self.complete(messages).await?;
        let (tx, rx) = mpsc::channel(1);
        // 수신자가 살아있으므로 버퍼 1칸에 즉시 들어감
        let _ = tx.send(Ok(answer)).await;
        Ok(rx)
    }

    /// 프로바이더 이름
    fn name(&self) -> &str;

    /// 사용 중인 모델 ID
    fn model(&self) -> &str;
}

// ============================================================================
// Provider
// ============================================================================

/// 지원 프로바이더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[serde(alias = "open_ai")]
    OpenAi,
    DeepSeek,
}

/// (선택 이름, API 모델 ID)
type SubModel = (&'static str, &'static str);

const OPENAI_MODELS: &[SubModel] = &[
    ("gpt-3.5-turbo", "gpt-3.5-turbo"),
    ("gpt-4", "gpt-4"),
    ("gpt-4o", "gpt-4o"),
];

const DEEPSEEK_MODELS: &[SubModel] = &[("R1", "deepseek-reasoner"), ("V3", "deepseek-chat")];

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::DeepSeek];

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::DeepSeek => "deepseek",
        }
    }

    /// 표시용 이름
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::DeepSeek => "DeepSeek",
        }
    }

    /// 기본 API 베이스 URL
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    /// 선택 가능한 하위 모델 목록
    pub fn sub_models(&self) -> &'static [SubModel] {
        match self {
            Provider::OpenAi => OPENAI_MODELS,
            Provider::DeepSeek => DEEPSEEK_MODELS,
        }
    }

    /// 기본 모델 ID (목록의 첫 항목)
    pub fn default_model(&self) -> &'static str {
        self.sub_models()[0].1
    }

    /// 선택 이름 또는 모델 ID를 API 모델 ID로 변환
    ///
    /// 목록에 없는 이름은 그대로 전달합니다 (새 모델 대응).
    pub fn resolve_model(&self, choice: &str) -> String {
        self.sub_models()
            .iter()
            .find(|(alias, id)| alias.eq_ignore_ascii_case(choice) || *id == choice)
            .map(|(_, id)| (*id).to_string())
            .unwrap_or_else(|| choice.to_string())
    }

    /// API 키 환경변수 (우선순위 순)
    pub fn env_keys(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi => &["OPENAI_API_KEY"],
            Provider::DeepSeek => &["DEEPSEEK_API_KEY", "OPENAI_API_KEY"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = RagError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Provider::OpenAi),
            "deepseek" => Ok(Provider::DeepSeek),
            other => Err(RagError::InvalidConfig(format!(
                "Unknown provider '{}'. Expected: openai, deepseek",
                other
            ))),
        }
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 프로바이더의 `env_keys()` 순서대로 확인하며, 빈 값은 무시합니다.
pub fn get_api_key(provider: Provider) -> Result<String> {
    for var in provider.env_keys() {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    Err(RagError::MissingApiKey {
        provider: provider.display_name(),
        env_vars: provider.env_keys().join(" or "),
    })
}

/// API 키 존재 여부 확인
pub fn has_api_key(provider: Provider) -> bool {
    get_api_key(provider).is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("DeepSeek".parse::<Provider>().unwrap(), Provider::DeepSeek);
        assert!("anthropic".parse::<Provider>().is_err());
    }

    #[test]
    fn test_resolve_model() {
        assert_eq!(Provider::DeepSeek.resolve_model("R1"), "deepseek-reasoner");
        assert_eq!(Provider::DeepSeek.resolve_model("v3"), "deepseek-chat");
        assert_eq!(Provider::DeepSeek.resolve_model("deepseek-chat"), "deepseek-chat");
        assert_eq!(Provider::OpenAi.resolve_model("gpt-4o"), "gpt-4o");
        assert_eq!(Provider::OpenAi.resolve_model("gpt-4.1-mini"), "gpt-4.1-mini");
    }

    #[test]
    fn test_default_models() {
        assert_eq!(Provider::OpenAi.default_model(), "gpt-3.5-turbo");
        assert_eq!(Provider::DeepSeek.default_model(), "deepseek-reasoner");
    }

    #[test]
    fn test_provider_serde() {
        let p: Provider = serde_json::from_str("\"deepseek\"").unwrap();
        assert_eq!(p, Provider::DeepSeek);
        assert_eq!(serde_json::to_string(&Provider::OpenAi).unwrap(), "\"openai\"");
    }

    #[test]
    fn test_missing_api_key_message() {
        let err = RagError::MissingApiKey {
            provider: Provider::DeepSeek.display_name(),
            env_vars: Provider::DeepSeek.env_keys().join(" or "),
        };
        assert!(err.to_string().contains("DEEPSEEK_API_KEY or OPENAI_API_KEY"));
    }
}
