//! 채팅 세션
//!
//! 세션 하나가 지식베이스, 대화 기록, 검색 설정을 소유합니다.
//! 전역 상태가 없으므로 여러 세션이 독립적으로 공존할 수 있습니다.
//!
//! 흐름: 문서 텍스트 → 청킹 → 지식베이스 추가 → (질의) → 관련 청크 선택 → 시스템 프롬프트 → LLM

use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::Result;
use crate::extractor;
use crate::knowledge::{
    chunker_for, Chunk, Chunker, KeywordRetriever, KnowledgeBase, Retriever, ScoredChunk,
};
use crate::llm::{ChatClient, CompletionStream};
use crate::prompt::{build_system_prompt, ChatMessage};

/// 문서 추가 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// 이번에 추가된 청크 수
    pub chunks_added: usize,
    /// 추가 후 전체 청크 수
    pub total_chunks: usize,
    /// 추출된 문자 수
    pub chars: usize,
}

/// 채팅 세션
pub struct ChatSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: RagConfig,
    chunker: Box<dyn Chunker>,
    retriever: Box<dyn Retriever>,
    knowledge_base: KnowledgeBase,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    /// 설정으로 새 세션 생성 (키워드 검색기 사용)
    pub fn new(config: RagConfig) -> Result<Self> {
        let retriever = Box::new(KeywordRetriever::new(config.retrieval_config()));
        Self::with_retriever(config, retriever)
    }

    /// 검색기 지정
    pub fn with_retriever(config: RagConfig, retriever: Box<dyn Retriever>) -> Result<Self> {
        config.validate()?;
        let chunker = chunker_for(config.chunk_config(), config.respect_separators)?;

        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            chunker,
            retriever,
            knowledge_base: KnowledgeBase::new(),
            history: Vec::new(),
        };

        tracing::debug!(
            "Session {} created (chunker={}, retriever={})",
            session.id,
            session.chunker.name(),
            session.retriever.name()
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn retriever_name(&self) -> &'static str {
        self.retriever.name()
    }

    pub fn chunker_name(&self) -> &'static str {
        self.chunker.name()
    }

    // ------------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------------

    /// 텍스트를 청킹하여 지식베이스에 추가
    pub fn ingest_text(&mut self, text: &str) -> IngestReport {
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            tracing::warn!("No chunks generated (empty document)");
        }

        let chunks_added = self.knowledge_base.extend(chunks);
        let report = IngestReport {
            chunks_added,
            total_chunks: self.knowledge_base.len(),
            chars: text.chars().count(),
        };

        tracing::info!(
            "Added document: {} chars, {} chunks (total={})",
            report.chars,
            report.chunks_added,
            report.total_chunks
        );
        report
    }

    /// 파일에서 텍스트를 추출하여 추가
    ///
    /// 지원하지 않는 형식이면 `RagError::UnsupportedFormat`을 반환하고
    /// 지식베이스는 변경되지 않습니다.
    pub async fn ingest_file(&mut self, path: &Path) -> Result<IngestReport> {
        let text = extractor::extract_text(path).await?;
        Ok(self.ingest_text(&text))
    }

    // ------------------------------------------------------------------------
    // Retrieval & Prompt
    // ------------------------------------------------------------------------

    /// 세션 검색기의 점수 포함 결과 (관련도 순)
    pub fn rank(&self, query: &str) -> Vec<ScoredChunk> {
        self.retriever.rank(query, &self.knowledge_base)
    }

    /// 질의에 관련된 청크 (관련도 순)
    pub fn retrieve(&self, query: &str) -> Vec<Chunk> {
        self.retriever.retrieve_relevant(query, &self.knowledge_base)
    }

    /// LLM 요청 메시지 구성
    ///
    /// `[시스템 프롬프트] + 대화 기록 + [사용자 질의]`
    pub fn build_messages(&self, query: &str) -> Vec<ChatMessage> {
        let context = self.retrieve(query);
        if context.is_empty() {
            tracing::debug!("No relevant context, using fallback prompt");
        }

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(build_system_prompt(&context)));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(query));
        messages
    }

    /// 질의 → 응답 (대화 기록에 추가)
    pub async fn ask(&mut self, client: &dyn ChatClient, query: &str) -> Result<String> {
        let messages = self.build_messages(query);
        let answer = client.complete(&messages).await?;
        self.record_turn(query, &answer);
        Ok(answer)
    }

    /// 스트리밍 질의
    ///
    /// 수신한 델타를 모두 모은 뒤 `record_turn`으로 기록해야 합니다.
    pub async fn ask_stream(
        &self,
        client: &dyn ChatClient,
        query: &str,
    ) -> Result<CompletionStream> {
        let messages = self.build_messages(query);
        client.complete_stream(&messages).await
    }

    /// 스트리밍 질의 → 응답 (델타마다 `on_delta` 호출, 대화 기록에 추가)
    ///
    /// 스트림이 중간에 실패하면 이미 받은 부분 응답을 기록한 뒤 에러를 반환합니다.
    pub async fn ask_streaming<F>(
        &mut self,
        client: &dyn ChatClient,
        query: &str,
        mut on_delta: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let mut rx = self.ask_stream(client, query).await?;
        let mut full = String::new();

        while let Some(delta) = rx.recv().await {
            match delta {
                Ok(text) => {
                    on_delta(&text);
                    full.push_str(&text);
                }
                Err(e) => {
                    if !full.is_empty() {
                        tracing::warn!(
                            "Stream failed after {} chars, keeping partial answer",
                            full.chars().count()
                        );
                        self.record_turn(query, &full);
                    }
                    return Err(e);
                }
            }
        }

        self.record_turn(query, &full);
        Ok(full)
    }

    /// 한 턴(질의 + 응답)을 대화 기록에 추가
    pub fn record_turn(&mut self, query: &str, answer: &str) {
        self.history.push(ChatMessage::user(query));
        self.history.push(ChatMessage::assistant(answer));
    }

    /// 세션 리셋: 대화 기록과 지식베이스 모두 비움
    pub fn reset(&mut self) {
        tracing::info!(
            "Resetting session {} ({} chunks, {} messages)",
            self.id,
            self.knowledge_base.len(),
            self.history.len()
        );
        self.knowledge_base.clear();
        self.history.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
