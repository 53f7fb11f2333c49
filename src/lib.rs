//! ragchat - 문서 기반 키워드 검색 RAG 채팅
//!
//! 업로드한 문서를 고정 크기 청크로 나누어 세션 지식베이스에 쌓고,
//! 질의와의 키워드 겹침으로 관련 청크를 골라 LLM 시스템 프롬프트에 넣습니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod prompt;
pub mod session;

// Re-exports
pub use config::{AppConfig, LlmConfig, RagConfig};
pub use error::{RagError, Result};
pub use knowledge::{
    default_chunker, select, split_text, Chunk, ChunkConfig, Chunker, FixedWindowChunker,
    KeywordRetriever, KnowledgeBase, RetrievalConfig, Retriever, ScoredChunk, SeparatorChunker,
    SubstringRetriever,
};
pub use llm::{ChatClient, CompletionStream, OpenAiCompatibleClient, Provider};
pub use prompt::{build_system_prompt, ChatMessage, Role};
pub use session::{ChatSession, IngestReport};
