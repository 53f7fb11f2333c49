//! Knowledge 모듈 - 세션 지식베이스와 키워드 검색
//!
//! - Chunker: 고정 윈도우 + 오버랩 텍스트 분할
//! - KnowledgeBase: append-only 인메모리 청크 목록
//! - Scorer: 질의 토큰 기준 키워드 겹침 점수
//! - Retriever: 임계값 필터 + 안정 정렬 + 상위 K 선택

mod base;
mod chunker;
mod retriever;
mod scorer;

// Re-exports
pub use base::{Chunk, KnowledgeBase};
pub use chunker::{
    chunker_for, default_chunker, split_text, ChunkConfig, Chunker, FixedWindowChunker,
    SeparatorChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
pub use retriever::{
    select, KeywordRetriever, RetrievalConfig, Retriever, ScoredChunk, SubstringRetriever,
    DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_TOP_K,
};
pub use scorer::{score, tokenize, QueryTokens};
