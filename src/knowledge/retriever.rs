//! Retriever - 질의에 관련된 청크 선택
//!
//! 지식베이스 전체를 선형 스캔하여 점수를 매기고, 임계값을 초과한 청크만
//! 점수 내림차순(동점이면 원래 순서)으로 정렬한 뒤 상위 K개를 반환합니다.
//! 호출 간 캐시나 인덱스는 없습니다.

use super::base::{Chunk, KnowledgeBase};
use super::scorer::QueryTokens;

/// 기본 관련도 임계값 (이 값을 "초과"해야 선택됨)
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.1;
/// 기본 상위 K
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Types
// ============================================================================

/// 질의 1회 동안만 존재하는 (청크, 점수) 쌍
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// 0.0 ~ 1.0
    pub score: f32,
}

/// 선택 파라미터
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub threshold: f32,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RELEVANCE_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }
}

// ============================================================================
// Retriever Trait
// ============================================================================

/// 관련 청크 검색 인터페이스
///
/// 키워드 검색기 외에 임베딩 기반 구현으로 교체해도 호출 측은 바뀌지 않습니다.
pub trait Retriever: Send + Sync {
    /// 관련도 순으로 정렬된 (청크, 점수) 목록
    fn rank(&self, query: &str, knowledge_base: &KnowledgeBase) -> Vec<ScoredChunk>;

    /// 관련도 순으로 정렬된 청크 반환 (관련 청크가 없으면 빈 벡터)
    fn retrieve_relevant(&self, query: &str, knowledge_base: &KnowledgeBase) -> Vec<Chunk> {
        self.rank(query, knowledge_base)
            .into_iter()
            .map(|scored| scored.chunk)
            .collect()
    }

    /// 검색기 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// KeywordRetriever
// ============================================================================

/// 키워드 겹침 검색기
#[derive(Debug, Clone, Default)]
pub struct KeywordRetriever {
    config: RetrievalConfig,
}

impl KeywordRetriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> RetrievalConfig {
        self.config
    }

    /// 모든 청크의 점수 (지식베이스 순서 그대로)
    pub fn score_all(&self, query: &str, knowledge_base: &KnowledgeBase) -> Vec<ScoredChunk> {
        let tokens = QueryTokens::new(query);

        knowledge_base
            .iter()
            .map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                score: tokens.score(chunk.as_str()),
            })
            .collect()
    }
}

impl Retriever for KeywordRetriever {
    /// 임계값 필터 + 안정 정렬 + 상위 K
    fn rank(&self, query: &str, knowledge_base: &KnowledgeBase) -> Vec<ScoredChunk> {
        let tokens = QueryTokens::new(query);
        if tokens.is_empty() || knowledge_base.is_empty() {
            tracing::debug!("Empty query or knowledge base, skipping scoring");
            return vec![];
        }

        let mut relevant: Vec<ScoredChunk> = knowledge_base
            .iter()
            .filter_map(|chunk| {
                let score = tokens.score(chunk.as_str());
                (score > self.config.threshold).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect();

        let candidates = relevant.len();

        // sort_by는 안정 정렬: 동점이면 지식베이스 순서 유지
        relevant.sort_by(|a, b| b.score.total_cmp(&a.score));
        relevant.truncate(self.config.top_k);

        tracing::debug!(
            "Scored {} chunks: {} above threshold {}, returning {}",
            knowledge_base.len(),
            candidates,
            self.config.threshold,
            relevant.len()
        );

        relevant
    }

    fn name(&self) -> &'static str {
        "KeywordRetriever"
    }
}

/// 기본 선택 함수
pub fn select(
    query: &str,
    knowledge_base: &KnowledgeBase,
    threshold: f32,
    top_k: usize,
) -> Vec<Chunk> {
    KeywordRetriever::new(RetrievalConfig { threshold, top_k })
        .retrieve_relevant(query, knowledge_base)
}

// ============================================================================
// SubstringRetriever
// ============================================================================

/// 부분 문자열 검색기
///
/// 질의 문자열을 그대로 포함하는 청크를 지식베이스 순서대로 반환합니다.
/// 상위 K 제한이 없습니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringRetriever;

impl Retriever for SubstringRetriever {
    /// 일치하는 청크는 모두 점수 1.0
    fn rank(&self, query: &str, knowledge_base: &KnowledgeBase) -> Vec<ScoredChunk> {
        if query.is_empty() {
            return vec![];
        }

        knowledge_base
            .iter()
            .filter(|chunk| chunk.as_str().contains(query))
            .map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                score: 1.0,
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "SubstringRetriever"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kb(texts: &[&str]) -> KnowledgeBase {
        texts.iter().copied().collect()
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(Chunk::as_str).collect()
    }

    #[test]
    fn test_select_ties_keep_original_order() {
        let kb = kb(&[
            "the cat sat on the mat",
            "dogs are loyal animals",
            "the mat was red",
        ]);
        let selected = select("mat", &kb, 0.1, 3);
        assert_eq!(texts(&selected), vec!["the cat sat on the mat", "the mat was red"]);
    }

    #[test]
    fn test_select_empty_query() {
        let kb = kb(&["anything at all", "more text"]);
        assert!(select("", &kb, 0.1, 3).is_empty());
        assert!(select("   ", &kb, 0.0, 3).is_empty());
    }

    #[test]
    fn test_select_empty_knowledge_base() {
        assert!(select("mat", &KnowledgeBase::new(), 0.1, 3).is_empty());
    }

    #[test]
    fn test_rank_sorted_descending() {
        let kb = kb(&["alpha", "alpha beta gamma", "alpha beta", "delta"]);
        let ranked = KeywordRetriever::default().rank("alpha beta gamma", &kb);

        let scores: Vec<f32> = ranked.iter().map(|s| s.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ranked[0].chunk.as_str(), "alpha beta gamma");
        assert_eq!(ranked[0].score, 1.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        // 질의 토큰 4개 중 1개 일치 = 0.25
        let kb = kb(&["one", "one two"]);
        let retriever = KeywordRetriever::new(RetrievalConfig {
            threshold: 0.25,
            top_k: 10,
        });
        let ranked = retriever.rank("one two three four", &kb);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].chunk.as_str(), "one two");
        assert!(ranked.iter().all(|s| s.score > 0.25));
    }

    #[test]
    fn test_top_k_bound() {
        let kb = kb(&["mat 1", "mat 2", "mat 3", "mat 4", "mat 5"]);
        let selected = select("mat", &kb, 0.1, 3);
        assert_eq!(texts(&selected), vec!["mat 1", "mat 2", "mat 3"]);

        assert!(select("mat", &kb, 0.1, 0).is_empty());
    }

    #[test]
    fn test_score_all_keeps_order() {
        let kb = kb(&["x", "mat", "y"]);
        let scored = KeywordRetriever::default().score_all("mat", &kb);
        let scores: Vec<f32> = scored.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_rescans_after_append() {
        let mut kb = kb(&["nothing here"]);
        let retriever = KeywordRetriever::default();
        assert!(retriever.retrieve_relevant("mat", &kb).is_empty());

        kb.push("the mat");
        assert_eq!(texts(&retriever.retrieve_relevant("mat", &kb)), vec!["the mat"]);
    }

    #[test]
    fn test_substring_retriever() {
        let kb = kb(&["the cat sat", "a category", "dog"]);
        let retriever = SubstringRetriever;
        let found = retriever.retrieve_relevant("cat", &kb);
        assert_eq!(texts(&found), vec!["the cat sat", "a category"]);
        assert!(retriever.retrieve_relevant("", &kb).is_empty());
    }

    #[test]
    fn test_retriever_trait_object() {
        let retrievers: Vec<Box<dyn Retriever>> =
            vec![Box::new(KeywordRetriever::default()), Box::new(SubstringRetriever)];
        let kb = kb(&["the mat"]);
        for r in &retrievers {
            assert_eq!(r.retrieve_relevant("mat", &kb).len(), 1, "{}", r.name());
        }
    }
}
