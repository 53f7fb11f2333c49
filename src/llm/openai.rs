//! OpenAI 호환 채팅 완성 클라이언트
//!
//! `POST {base_url}/chat/completions` 를 호출합니다.
//! 스트리밍 모드에서는 SSE(`data: {...}`) 라인을 파싱하여 델타를 채널로 전달합니다.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{get_api_key, ChatClient, CompletionStream, Provider};
use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use crate::prompt::ChatMessage;

/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 1000;
/// 기본 타임아웃 (연결 수립, 비스트리밍 요청 전체)
const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// 스트림 채널 버퍼
const STREAM_BUFFER: usize = 32;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// API 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// SSE Parsing
// ============================================================================

/// SSE 한 줄의 해석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// 텍스트 델타
    Delta(String),
    /// `data: [DONE]`
    Done,
    /// 빈 줄, 주석, 내용 없는 델타 등
    Skip,
}

/// SSE 라인 파싱
pub fn parse_sse_line(line: &str) -> SseEvent {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|c| !c.is_empty())
            .map(SseEvent::Delta)
            .unwrap_or(SseEvent::Skip),
        Err(e) => {
            tracing::debug!("Ignoring malformed SSE payload: {}", e);
            SseEvent::Skip
        }
    }
}

/// 바이트 스트림을 완성된 줄 단위로 나누는 버퍼
///
/// 네트워크 청크는 줄 중간이나 UTF-8 문자 중간에서 끊길 수 있으므로
/// 개행까지 받은 바이트만 디코딩합니다.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 청크를 추가하고 완성된 줄들을 반환
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// 스트림 종료 시 개행 없이 남은 마지막 줄
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}

// ============================================================================
// OpenAiCompatibleClient
// ============================================================================

/// OpenAI 호환 클라이언트 (OpenAI, DeepSeek)
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    provider: Provider,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    /// 환경변수의 API 키로 생성
    ///
    /// `model`이 None이면 프로바이더 기본 모델을 사용합니다.
    pub fn new(provider: Provider, model: Option<&str>) -> Result<Self> {
        let api_key = get_api_key(provider)?;
        Self::with_options(provider, api_key, model, None, DEFAULT_TIMEOUT_SECS)
    }

    /// 모든 옵션 지정
    pub fn with_options(
        provider: Provider,
        api_key: String,
        model: Option<&str>,
        base_url: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        // 전체 타임아웃은 요청마다 지정 (스트리밍 응답은 길어질 수 있음)
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RagError::Llm {
                provider: provider.display_name(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let model = model
            .map(|m| provider.resolve_model(m))
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = base_url
            .unwrap_or(provider.base_url())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            provider,
            api_key,
            base_url,
            model,
            timeout,
            client,
        })
    }

    /// 설정 파일의 `[llm]` 섹션으로 생성 (API 키는 환경변수)
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = get_api_key(config.provider)?;
        Self::with_options(
            config.provider,
            api_key,
            config.model.as_deref(),
            config.base_url.as_deref(),
            config.timeout_secs,
        )
    }

    /// OpenAI 클라이언트
    pub fn openai(model: Option<&str>) -> Result<Self> {
        Self::new(Provider::OpenAi, model)
    }

    /// DeepSeek 클라이언트
    pub fn deepseek(model: Option<&str>) -> Result<Self> {
        Self::new(Provider::DeepSeek, model)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn llm_error(&self, message: impl Into<String>) -> RagError {
        RagError::Llm {
            provider: self.provider.display_name(),
            message: message.into(),
        }
    }

    /// 요청 전송 (429/네트워크 에러 시 지수 백오프 재시도)
    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream,
        };

        let mut last_error: Option<RagError> = None;

        for attempt in 0..=MAX_RETRIES {
            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));

            let mut builder = self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&request);
            if !stream {
                builder = builder.timeout(self.timeout);
            }

            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(self.llm_error(format!("Failed to send request: {}", e)));
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() == 429 {
                last_error = Some(self.llm_error("Rate limit exceeded (429)"));
                if attempt < MAX_RETRIES {
                    tracing::warn!(
                        "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                break;
            }

            // 다른 에러 - 즉시 실패
            let body = response.text().await.unwrap_or_default();
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                return Err(self.llm_error(format!("({}) {}", status, error.error.message)));
            }
            return Err(self.llm_error(format!("({}) {}", status, body)));
        }

        Err(last_error
            .unwrap_or_else(|| self.llm_error(format!("Failed after {} retries", MAX_RETRIES))))
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self.send(messages, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| self.llm_error(format!("Failed to read response body: {}", e)))?;

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| self.llm_error(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| self.llm_error("Response contained no message content"))
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        let response = self.send(messages, true).await?;
        let provider = self.provider.display_name();

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let mut bytes = Box::pin(response.bytes_stream());

        tokio::spawn(async move {
            let mut lines = SseLineBuffer::new();

            while let Some(item) = bytes.next().await {
                let data = match item {
                    Ok(data) => data,
                    Err(e) => {
                        let _ = tx
                            .send(Err(RagError::Llm {
                                provider,
                                message: format!("Stream interrupted: {}", e),
                            }))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&data) {
                    match parse_sse_line(&line) {
                        SseEvent::Delta(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                return;
                            }
                        }
                        SseEvent::Done => return,
                        SseEvent::Skip => {}
                    }
                }
            }

            // 마지막 줄에 개행이 없는 경우
            if let Some(line) = lines.finish() {
                if let SseEvent::Delta(text) = parse_sse_line(&line) {
                    let _ = tx.send(Ok(text)).await;
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider, model: Option<&str>, base_url: Option<&str>) -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::with_options(provider, "fake_key".to_string(), model, base_url, 5)
            .unwrap()
    }

    #[test]
    fn test_default_endpoints() {
        let openai = client(Provider::OpenAi, None, None);
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(openai.model(), "gpt-3.5-turbo");
        assert_eq!(openai.name(), "openai");

        let deepseek = client(Provider::DeepSeek, Some("V3"), None);
        assert_eq!(deepseek.endpoint(), "https://api.deepseek.com/v1/chat/completions");
        assert_eq!(deepseek.model(), "deepseek-chat");
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let c = client(Provider::OpenAi, Some("gpt-4"), Some("http://localhost:8080/v1/"));
        assert_eq!(c.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let request = ChatCompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            stream: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_parse_sse_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line), SseEvent::Delta("Hel".to_string()));
    }

    #[test]
    fn test_parse_sse_done_and_skip() {
        assert_eq!(parse_sse_line("data: [DONE]\n"), SseEvent::Done);
        assert_eq!(parse_sse_line(""), SseEvent::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseEvent::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseEvent::Skip
        );
        assert_eq!(parse_sse_line("data: {not json"), SseEvent::Skip);
    }

    #[test]
    fn test_line_buffer_keeps_split_multibyte_char() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"한글\"}}]}\n".as_bytes();
        let cut = line.iter().position(|&b| b == 0xED).unwrap() + 1;

        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(&line[..cut]).is_empty());
        let lines = buffer.push(&line[cut..]);

        assert_eq!(lines.len(), 1);
        assert_eq!(parse_sse_line(&lines[0]), SseEvent::Delta("한글".to_string()));
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_line_buffer_multiple_lines_and_tail() {
        let mut buffer = SseLineBuffer::new();
        let lines = buffer.push(b"data: a\n\ndata: b\ndata: [DO");
        assert_eq!(lines, vec!["data: a\n", "\n", "data: b\n"]);
        assert!(buffer.push(b"NE]").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("data: [DONE]"));
    }

    // ------------------------------------------------------------------------
    // 로컬 SSE 서버
    // ------------------------------------------------------------------------

    /// 요청 하나를 받아 SSE 응답을 (지연, 바이트) 순서대로 보내는 서버
    async fn serve_sse(writes: Vec<(u64, Vec<u8>)>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // 요청 헤더 + 본문을 모두 읽음
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            for (delay_ms, bytes) in writes {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                socket.write_all(&bytes).await.unwrap();
                socket.flush().await.unwrap();
            }
        });

        format!("http://{}/v1", addr)
    }

    fn delta(text: &str) -> Vec<u8> {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n\n", text).into_bytes()
    }

    async fn collect(client: &OpenAiCompatibleClient) -> String {
        let mut rx = client
            .complete_stream(&[ChatMessage::user("hi")])
            .await
            .unwrap();

        let mut answer = String::new();
        while let Some(item) = rx.recv().await {
            match item {
                Ok(text) => answer.push_str(&text),
                Err(e) => panic!("stream failed after {:?}: {}", answer, e),
            }
        }
        answer
    }

    #[tokio::test]
    async fn test_stream_multibyte_split_across_reads() {
        let line = delta("한글");
        let cut = line.iter().position(|&b| b == 0xED).unwrap() + 1;

        let base_url = serve_sse(vec![
            (0, line[..cut].to_vec()),
            (200, line[cut..].to_vec()),
            (0, b"data: [DONE]\n\n".to_vec()),
        ])
        .await;

        let c = client(Provider::OpenAi, None, Some(&base_url));
        assert_eq!(collect(&c).await, "한글");
    }

    #[tokio::test]
    async fn test_stream_outlives_request_timeout() {
        let base_url = serve_sse(vec![
            (0, delta("a")),
            (700, delta("b")),
            (700, delta("c")),
            (0, b"data: [DONE]\n\n".to_vec()),
        ])
        .await;

        let c = OpenAiCompatibleClient::with_options(
            Provider::OpenAi,
            "fake_key".to_string(),
            None,
            Some(&base_url),
            1,
        )
        .unwrap();
        assert_eq!(collect(&c).await, "abc");
    }

    #[test]
    fn test_parse_response_body() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi there"));
    }

    #[test]
    fn test_parse_api_error() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        let parsed: ApiError = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "Invalid API key");
    }
}
