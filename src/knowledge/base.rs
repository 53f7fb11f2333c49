//! Knowledge Base - 세션 단위 인메모리 청크 저장소
//!
//! 추가만 가능한(append-only) 순서 있는 청크 목록입니다.
//! 기존 청크는 삭제되거나 재정렬되지 않으며, 세션 리셋 시에만 비워집니다.
//! 청크에는 출처 문서 정보가 남지 않습니다.

use std::fmt;
use std::sync::Arc;

// ============================================================================
// Chunk
// ============================================================================

/// 불변 텍스트 청크
///
/// 내부 문자열을 `Arc<str>`로 공유하므로 검색 결과로 복제해도 비용이 작습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk(Arc<str>);

impl Chunk {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 문자 수
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl AsRef<str> for Chunk {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// KnowledgeBase
// ============================================================================

/// 인메모리 지식베이스
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    chunks: Vec<Chunk>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// 청크 목록을 끝에 추가 (중복 제거 없음)
    ///
    /// 추가된 청크 수를 반환합니다.
    pub fn extend<I, C>(&mut self, chunks: I) -> usize
    where
        I: IntoIterator<Item = C>,
        C: Into<Chunk>,
    {
        let before = self.chunks.len();
        self.chunks.extend(chunks.into_iter().map(Into::into));
        let added = self.chunks.len() - before;

        tracing::debug!("Appended {} chunks (total={})", added, self.chunks.len());
        added
    }

    /// 청크 하나 추가
    pub fn push(&mut self, chunk: impl Into<Chunk>) {
        self.chunks.push(chunk.into());
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// 전체 문자 수
    pub fn total_chars(&self) -> usize {
        self.chunks.iter().map(Chunk::char_len).sum()
    }

    /// 세션 리셋 전용
    pub(crate) fn clear(&mut self) {
        self.chunks.clear();
    }
}

impl<'a> IntoIterator for &'a KnowledgeBase {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

impl<C: Into<Chunk>> FromIterator<C> for KnowledgeBase {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut kb = Self::new();
        kb.extend(iter);
        kb
    }
}

// ============================================================================
// Tests
// ============================================================================
