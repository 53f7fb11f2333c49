//! 프롬프트 조립
//!
//! 선택된 청크로 시스템 프롬프트를 만들고, LLM에 보낼 메시지 타입을 정의합니다.
//! 청크가 있으면 컨텍스트 템플릿, 없으면 일반 지식 템플릿을 사용합니다.

use serde::{Deserialize, Serialize};

use crate::knowledge::Chunk;

/// 청크 사이 구분자
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const CONTEXT_PROMPT_HEAD: &str = "You are a helpful assistant. \
Answer the user's question based on the following information:\n\nCONTEXT:\n";

const CONTEXT_PROMPT_TAIL: &str = "\n\nIf the question cannot be answered using the information provided, \
acknowledge that you don't have enough information rather than making up an answer. \
Use the context information to provide accurate and helpful responses.";

const FALLBACK_PROMPT: &str = "You are a helpful assistant. \
Answer the user's question based on your knowledge. \
If you don't know the answer, please acknowledge that.";

// ============================================================================
// Chat Messages
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 채팅 메시지 (OpenAI 호환 형식으로 직렬화)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// System Prompt
// ============================================================================

/// 선택된 청크를 순서대로 빈 줄로 이어붙인 컨텍스트 블록
pub fn join_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(Chunk::as_str)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// 시스템 프롬프트 생성
///
/// 청크 순서(관련도 순)는 그대로 유지됩니다.
pub fn build_system_prompt(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return FALLBACK_PROMPT.to_string();
    }

    let context = join_context(chunks);
    let mut prompt =
        String::with_capacity(CONTEXT_PROMPT_HEAD.len() + context.len() + CONTEXT_PROMPT_TAIL.len());
    prompt.push_str(CONTEXT_PROMPT_HEAD);
    prompt.push_str(&context);
    prompt.push_str(CONTEXT_PROMPT_TAIL);
    prompt
}

/// 컨텍스트 템플릿 사용 여부
pub fn has_context(system_prompt: &str) -> bool {
    system_prompt.starts_with(CONTEXT_PROMPT_HEAD)
}

// ============================================================================
// Tests
// ============================================================================
