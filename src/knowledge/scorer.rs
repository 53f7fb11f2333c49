//! Relevance Scorer - 키워드 겹침 기반 점수
//!
//! 질의와 청크를 소문자화 후 공백으로 토큰화하고,
//! `|질의 ∩ 청크| / |질의|` 로 점수를 계산합니다 (0.0 ~ 1.0).
//!
//! 분모는 합집합이 아닌 질의 토큰 수입니다. 임계값(0.1)은 이 분모를 기준으로 맞춰져 있습니다.

use std::collections::HashSet;

/// 소문자화 + 공백 분리 토큰 집합 (중복 제거)
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// 질의 토큰 집합
///
/// 한 번의 선택 과정에서 모든 청크에 대해 재사용하기 위해 미리 토큰화해 둡니다.
#[derive(Debug, Clone, Default)]
pub struct QueryTokens {
    tokens: HashSet<String>,
}

impl QueryTokens {
    pub fn new(query: &str) -> Self {
        Self {
            tokens: tokenize(query),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// 청크에 대한 점수
    ///
    /// 질의 토큰이 없으면 0.0을 반환합니다.
    pub fn score(&self, chunk: &str) -> f32 {
        if self.tokens.is_empty() {
            return 0.0;
        }

        let chunk_tokens = tokenize(chunk);
        let common = self
            .tokens
            .iter()
            .filter(|t| chunk_tokens.contains(t.as_str()))
            .count();

        common as f32 / self.tokens.len() as f32
    }
}

/// 질의-청크 점수 (편의 함수)
pub fn score(query: &str, chunk: &str) -> f32 {
    QueryTokens::new(query).score(chunk)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_dedups() {
        let tokens = tokenize("The the THE cat\tsat\n");
        assert_eq!(tokens.len(), 3);
        assert!(tokens.contains("the"));
        assert!(tokens.contains("cat"));
        assert!(tokens.contains("sat"));
    }

    #[test]
    fn test_score_full_match() {
        assert_eq!(score("mat", "the cat sat on the mat"), 1.0);
        assert_eq!(score("Cat MAT", "the cat sat on the mat"), 1.0);
    }

    #[test]
    fn test_score_partial_match() {
        let s = score("red cat dog blue", "the cat was red");
        assert!((s - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_score_denominator_is_query_size() {
        // 청크가 아무리 길어도 질의 토큰이 모두 있으면 1.0
        let long_chunk = format!("{} mat", "filler ".repeat(500));
        assert_eq!(score("mat", &long_chunk), 1.0);
    }

    #[test]
    fn test_score_duplicate_query_tokens_collapse() {
        assert_eq!(score("mat mat mat", "the mat"), 1.0);
        assert!((score("mat mat dog", "the mat") - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_score_empty_query() {
        assert_eq!(score("", "anything"), 0.0);
        assert_eq!(score("   \n\t", "anything"), 0.0);
    }

    #[test]
    fn test_score_no_overlap() {
        assert_eq!(score("mat", "dogs are loyal animals"), 0.0);
    }

    #[test]
    fn test_score_punctuation_is_part_of_token() {
        // 공백 분리만 하므로 구두점이 붙은 토큰은 다른 토큰
        assert_eq!(score("mat", "the mat."), 0.0);
    }

    #[test]
    fn test_score_range() {
        let chunks = ["", "a b c", "x y z a", "completely unrelated words"];
        let queries = ["", "a", "a x q", "words unrelated", "Z"];
        for q in queries {
            for c in chunks {
                let s = score(q, c);
                assert!((0.0..=1.0).contains(&s), "score({q:?}, {c:?}) = {s}");
            }
        }
    }

    #[test]
    fn test_query_tokens_reuse() {
        let q = QueryTokens::new("alpha beta");
        assert_eq!(q.len(), 2);
        assert_eq!(q.score("alpha"), 0.5);
        assert_eq!(q.score("beta alpha"), 1.0);
        assert!(QueryTokens::new(" ").is_empty());
    }
}
