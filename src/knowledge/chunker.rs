//! Text Chunking Module
//!
//! 추출된 문서 텍스트를 고정 크기 윈도우로 분할합니다.
//! 연속한 청크는 정확히 `overlap` 문자만큼 겹칩니다.
//!
//! 크기와 오버랩은 모두 문자(char) 단위이며, 바이트 단위가 아닙니다.

use crate::error::{RagError, Result};

/// 기본 청크 크기 (문자 수)
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// 기본 오버랩 (문자 수)
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkConfig {
    /// 검증된 설정 생성
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// `chunk_size > 0`, `overlap < chunk_size` 확인
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// 윈도우 이동 폭
    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// FixedWindowChunker
// ============================================================================

/// 고정 윈도우 청커
///
/// 문장/문단 구조를 고려하지 않고 `chunk_size` 문자 윈도우를
/// `chunk_size - overlap` 씩 이동하며 자릅니다. 마지막 청크만 짧을 수 있습니다.
#[derive(Debug, Clone)]
pub struct FixedWindowChunker {
    config: ChunkConfig,
}

impl FixedWindowChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정으로 생성 (1000 / 200)
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }
}

impl Chunker for FixedWindowChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        window_chunks(text, self.config)
    }

    fn name(&self) -> &'static str {
        "FixedWindowChunker"
    }
}

/// 설정이 이미 검증되었다고 가정하는 윈도우 분할
fn window_chunks(text: &str, config: ChunkConfig) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }

    // 문자 경계의 바이트 오프셋 (마지막에 text.len() 포함)
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + config.chunk_size).min(char_count);
        chunks.push(text[bounds[start]..bounds[end]].to_string());

        if end >= char_count {
            break;
        }
        start += config.step();
    }

    chunks
}

/// 고정 윈도우 분할 (편의 함수)
///
/// 잘못된 설정이면 `RagError::InvalidConfig`를 반환합니다.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let config = ChunkConfig::new(chunk_size, overlap)?;
    Ok(window_chunks(text, config))
}

// ============================================================================
// SeparatorChunker
// ============================================================================

/// 구분자 우선 청커
///
/// 문단(`\n\n`) → 줄(`\n`) → 공백(` `) → 문자 순서로 구분자를 시도하여
/// 경계가 자연스러운 위치에서 자릅니다. 조각들을 `chunk_size`까지 합치고,
/// 직전 청크 끝의 조각 중 합계가 `overlap` 이하인 것들을 다음 청크 앞에 다시 붙입니다.
#[derive(Debug, Clone)]
pub struct SeparatorChunker {
    config: ChunkConfig,
    separators: Vec<&'static str>,
}

impl SeparatorChunker {
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            separators: vec!["\n\n", "\n", " ", ""],
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
            separators: vec!["\n\n", "\n", " ", ""],
        }
    }

    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        // 텍스트에 실제로 존재하는 첫 구분자 선택 ("" 는 항상 매칭)
        let (idx, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len(), ""));
        let remaining = separators.get(idx + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) <= self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending, separator));
                pending.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending, separator));
        }

        chunks
    }

    /// 조각들을 chunk_size 이하로 합치고 오버랩 조각을 이월
    fn merge_pieces(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joined_len = total + len + if window.is_empty() { 0 } else { sep_len };

            if joined_len > self.config.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                // overlap 이하가 될 때까지 앞쪽 조각 제거
                while !window.is_empty()
                    && (total > self.config.overlap
                        || total + len + sep_len > self.config.chunk_size)
                {
                    let removed = window.remove(0);
                    total -= char_len(removed) + if window.is_empty() { 0 } else { sep_len };
                }
            }

            if !window.is_empty() {
                total += sep_len;
            }
            total += len;
            window.push(piece.as_str());
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

impl Chunker for SeparatorChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }
        self.split_recursive(text, &self.separators)
    }

    fn name(&self) -> &'static str {
        "SeparatorChunker"
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &[&str], separator: &str) {
    let joined = window.join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성 (고정 윈도우, 1000 / 200)
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(FixedWindowChunker::with_defaults())
}

/// 설정으로 청커 생성
///
/// `respect_separators`가 true면 구분자 우선 청커를 사용합니다.
pub fn chunker_for(config: ChunkConfig, respect_separators: bool) -> Result<Box<dyn Chunker>> {
    if respect_separators {
        Ok(Box::new(SeparatorChunker::new(config)?))
    } else {
        Ok(Box::new(FixedWindowChunker::new(config)?))
    }
}

// ============================================================================
// Tests
// ============================================================================
