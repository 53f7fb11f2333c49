//! CLI 모듈
//!
//! ragchat CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::collector::{CollectorConfig, FileCollector};
use crate::config::{default_config_path, AppConfig};
use crate::knowledge::chunker_for;
use crate::llm::{has_api_key, ChatClient, OpenAiCompatibleClient, Provider};
use crate::prompt::{build_system_prompt, has_context};
use crate::session::ChatSession;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(version, about = "문서 기반 키워드 검색 RAG 채팅", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: <config dir>/ragchat/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서를 청크로 분할하여 출력
    Chunk {
        /// 분할할 파일
        file: PathBuf,

        #[command(flatten)]
        rag: RagArgs,
    },

    /// 관련 청크 검색 (LLM 호출 없음)
    Retrieve {
        /// 검색 질의
        query: String,

        #[command(flatten)]
        sources: SourceArgs,

        #[command(flatten)]
        rag: RagArgs,

        /// 생성될 시스템 프롬프트도 출력
        #[arg(long)]
        show_prompt: bool,
    },

    /// 문서를 업로드하고 한 번 질문
    Ask {
        /// 질문
        query: String,

        #[command(flatten)]
        sources: SourceArgs,

        #[command(flatten)]
        rag: RagArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// 대화형 채팅 (/upload, /reset, /history, /exit)
    Chat {
        #[command(flatten)]
        sources: SourceArgs,

        #[command(flatten)]
        rag: RagArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// 프로바이더 및 모델 목록
    Models,

    /// 현재 설정 출력
    Config {
        /// 기본 설정 파일 생성
        #[arg(long)]
        init: bool,
    },
}

/// 업로드할 문서
#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// 업로드할 파일 (여러 번 지정 가능)
    #[arg(short, long)]
    pub file: Vec<PathBuf>,

    /// 업로드할 폴더 (재귀)
    #[arg(short, long)]
    pub dir: Vec<PathBuf>,

    /// 폴더 업로드 시 PDF 건너뛰기
    #[arg(long)]
    pub skip_pdfs: bool,
}

/// 청킹/검색 설정 재정의
#[derive(Args, Debug, Default)]
pub struct RagArgs {
    /// 청크 크기 (문자 수)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// 청크 오버랩 (문자 수)
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// 관련도 임계값
    #[arg(long)]
    pub threshold: Option<f32>,

    /// 최대 선택 청크 수
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// 문단/줄/공백 경계 우선 청킹
    #[arg(long)]
    pub separators: bool,
}

/// LLM 설정 재정의
#[derive(Args, Debug, Default)]
pub struct LlmArgs {
    /// 프로바이더 (openai, deepseek)
    #[arg(short, long)]
    pub provider: Option<Provider>,

    /// 하위 모델 (예: gpt-4o, R1, V3)
    #[arg(short, long)]
    pub model: Option<String>,

    /// 스트리밍 끄기
    #[arg(long)]
    pub no_stream: bool,
}

impl RagArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(v) = self.chunk_size {
            config.rag.chunk_size = v;
        }
        if let Some(v) = self.chunk_overlap {
            config.rag.chunk_overlap = v;
        }
        if let Some(v) = self.threshold {
            config.rag.relevance_threshold = v;
        }
        if let Some(v) = self.top_k {
            config.rag.top_k = v;
        }
        if self.separators {
            config.rag.respect_separators = true;
        }
    }
}

impl LlmArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(provider) = self.provider {
            if provider != config.llm.provider {
                // 다른 프로바이더의 모델 이름은 의미가 없음
                config.llm.model = None;
            }
            config.llm.provider = provider;
        }
        if let Some(ref model) = self.model {
            config.llm.model = Some(model.clone());
        }
        if self.no_stream {
            config.llm.stream = false;
        }
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = AppConfig::load_from(&config_path)
        .with_context(|| format!("설정 로드 실패: {}", config_path.display()))?;

    match cli.command {
        Commands::Chunk { file, rag } => {
            rag.apply(&mut config);
            cmd_chunk(&config, &file).await
        }
        Commands::Retrieve {
            query,
            sources,
            rag,
            show_prompt,
        } => {
            rag.apply(&mut config);
            cmd_retrieve(&config, &sources, &query, show_prompt).await
        }
        Commands::Ask {
            query,
            sources,
            rag,
            llm,
        } => {
            rag.apply(&mut config);
            llm.apply(&mut config);
            cmd_ask(&config, &sources, &query).await
        }
        Commands::Chat { sources, rag, llm } => {
            rag.apply(&mut config);
            llm.apply(&mut config);
            cmd_chat(&config, &sources).await
        }
        Commands::Models => cmd_models(&config),
        Commands::Config { init } => cmd_config(&config, &config_path, init),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 청크 출력 명령어 (chunk)
async fn cmd_chunk(config: &AppConfig, file: &Path) -> Result<()> {
    config.validate().context("잘못된 설정")?;

    let text = crate::extractor::extract_text(file)
        .await
        .with_context(|| format!("텍스트 추출 실패: {}", file.display()))?;

    let chunker = chunker_for(config.rag.chunk_config(), config.rag.respect_separators)?;
    let chunks = chunker.chunk(&text);

    println!(
        "[OK] {} 문자 → {} 청크 ({}, size={}, overlap={})\n",
        text.chars().count(),
        chunks.len(),
        chunker.name(),
        config.rag.chunk_size,
        config.rag.chunk_overlap
    );

    for (i, chunk) in chunks.iter().enumerate() {
        println!("#{:<4} [{} chars] {}", i + 1, chunk.chars().count(), truncate_text(chunk, 120));
    }

    Ok(())
}

/// 검색 명령어 (retrieve)
///
/// 점수와 함께 선택된 청크를 보여줍니다.
async fn cmd_retrieve(
    config: &AppConfig,
    sources: &SourceArgs,
    query: &str,
    show_prompt: bool,
) -> Result<()> {
    let mut session = ChatSession::new(config.rag.clone()).context("세션 생성 실패")?;
    upload_sources(&mut session, sources).await?;

    println!("[*] 검색 중: \"{}\"", query);

    let ranked = session.rank(query);

    if ranked.is_empty() {
        println!("\n[!] 임계값({})을 넘는 청크가 없습니다.", config.rag.relevance_threshold);
    } else {
        println!("\n[OK] 검색 결과 ({} 건):\n", ranked.len());
        for (i, scored) in ranked.iter().enumerate() {
            println!("{}. [점수: {:.4}]", i + 1, scored.score);
            println!("   내용: {}", truncate_text(scored.chunk.as_str(), 200));
            println!();
        }
    }

    if show_prompt {
        let chunks: Vec<_> = ranked.into_iter().map(|s| s.chunk).collect();
        let prompt = build_system_prompt(&chunks);
        let template = if has_context(&prompt) { "context" } else { "fallback" };
        println!("--- system prompt ({}) ---", template);
        println!("{}", prompt);
    }

    Ok(())
}

/// 단일 질문 명령어 (ask)
async fn cmd_ask(config: &AppConfig, sources: &SourceArgs, query: &str) -> Result<()> {
    let client = build_client(config)?;
    let mut session = ChatSession::new(config.rag.clone()).context("세션 생성 실패")?;
    upload_sources(&mut session, sources).await?;

    answer(&mut session, client.as_ref(), query, config.llm.stream).await?;
    Ok(())
}

/// 대화형 채팅 명령어 (chat)
async fn cmd_chat(config: &AppConfig, sources: &SourceArgs) -> Result<()> {
    let client = build_client(config)?;
    let mut session = ChatSession::new(config.rag.clone()).context("세션 생성 실패")?;
    upload_sources(&mut session, sources).await?;

    println!(
        "[*] {} / {} (세션 {})",
        client.name(),
        client.model(),
        session.id()
    );
    println!("    명령어: /upload <경로>, /reset, /history, /exit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                println!("[OK] 대화 기록과 지식베이스를 비웠습니다.");
            }
            "/history" => {
                for msg in session.history() {
                    println!("[{:?}] {}", msg.role, truncate_text(&msg.content, 200));
                }
            }
            _ if line.starts_with("/upload ") => {
                let path = PathBuf::from(line.trim_start_matches("/upload ").trim());
                match session.ingest_file(&path).await {
                    Ok(report) => println!(
                        "[OK] {} 청크 추가 (전체 {})",
                        report.chunks_added, report.total_chunks
                    ),
                    Err(e) => println!("[!] 업로드 실패: {}", e),
                }
            }
            query => {
                if let Err(e) = answer(&mut session, client.as_ref(), query, config.llm.stream).await
                {
                    println!("\n[!] 응답 실패: {:#}", e);
                }
            }
        }
    }

    println!("[*] 종료 (대화 {} 턴)", session.history().len() / 2);
    Ok(())
}

/// 모델 목록 명령어 (models)
fn cmd_models(config: &AppConfig) -> Result<()> {
    for provider in Provider::ALL {
        let marker = if provider == config.llm.provider { "*" } else { " " };
        let key_status = if has_api_key(provider) {
            "API 키: 설정됨"
        } else {
            "API 키: 미설정"
        };

        println!(
            "{} {} ({}) [{}]",
            marker,
            provider.display_name(),
            provider.base_url(),
            key_status
        );
        for (alias, id) in provider.sub_models() {
            if alias == id {
                println!("    - {}", id);
            } else {
                println!("    - {} ({})", alias, id);
            }
        }
    }
    Ok(())
}

/// 설정 명령어 (config)
fn cmd_config(config: &AppConfig, path: &Path, init: bool) -> Result<()> {
    if init {
        if path.exists() {
            bail!("설정 파일이 이미 존재합니다: {}", path.display());
        }
        AppConfig::default()
            .save_to(path)
            .with_context(|| format!("설정 저장 실패: {}", path.display()))?;
        println!("[OK] 기본 설정 파일 생성: {}", path.display());
        return Ok(());
    }

    println!("[*] 설정 파일: {}", path.display());
    let rendered = toml::to_string_pretty(config).context("설정 직렬화 실패")?;
    println!("{}", rendered);
    println!("[*] 모델: {}", config.llm.resolved_model());
    Ok(())
}

// ============================================================================
// Shared Steps
// ============================================================================

/// 설정으로 LLM 클라이언트 생성
fn build_client(config: &AppConfig) -> Result<Box<dyn ChatClient>> {
    let provider = config.llm.provider;
    let client = OpenAiCompatibleClient::from_config(&config.llm).with_context(|| {
        format!(
            "API 키가 설정되지 않았습니다.\n\n설정 방법:\n  export {}=your-api-key",
            provider.env_keys()[0]
        )
    })?;

    Ok(Box::new(client))
}

/// 파일/폴더 업로드
async fn upload_sources(session: &mut ChatSession, sources: &SourceArgs) -> Result<()> {
    let collector = FileCollector::new(CollectorConfig {
        skip_pdfs: sources.skip_pdfs,
        ..Default::default()
    });

    let mut paths = Vec::new();
    for file in &sources.file {
        paths.push(collector.collect_file(file)?);
    }
    for dir in &sources.dir {
        paths.extend(collector.collect_directory(dir)?.into_iter().map(|f| f.path));
    }

    if paths.is_empty() {
        println!("[!] 업로드된 문서가 없습니다. 일반 지식으로 답변합니다.");
        return Ok(());
    }

    let mut success_count = 0;
    let mut error_count = 0;

    for (i, path) in paths.iter().enumerate() {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        print!("[{}/{}] {}... ", i + 1, paths.len(), file_name);

        match session.ingest_file(path).await {
            Ok(report) => {
                println!("{} 청크", report.chunks_added);
                success_count += 1;
            }
            Err(e) => {
                println!("실패: {}", e);
                error_count += 1;
            }
        }
    }

    println!(
        "[OK] 업로드 완료: 성공 {}, 실패 {} (청크 {}, {})\n",
        success_count,
        error_count,
        session.knowledge_base().len(),
        format_chars(session.knowledge_base().total_chars())
    );
    Ok(())
}

/// 질의 1회 처리 및 출력
async fn answer(
    session: &mut ChatSession,
    client: &dyn ChatClient,
    query: &str,
    stream: bool,
) -> Result<String> {
    if !stream {
        let text = session.ask(client, query).await.context("LLM 호출 실패")?;
        println!("{}", text);
        return Ok(text);
    }

    let mut received = false;
    let result = session
        .ask_streaming(client, query, |delta| {
            received = true;
            print!("{}", delta);
            std::io::stdout().flush().ok();
        })
        .await;
    println!();

    if result.is_err() && received {
        println!("[!] 응답이 중간에 끊겼습니다. 받은 부분까지 대화 기록에 남겼습니다.");
    }
    result.context("스트리밍 실패")
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 문자 수 포맷팅
fn format_chars(chars: usize) -> String {
    const K: usize = 1000;
    const M: usize = K * 1000;

    if chars >= M {
        format!("{:.2}M chars", chars as f64 / M as f64)
    } else if chars >= K {
        format!("{:.2}K chars", chars as f64 / K as f64)
    } else {
        format!("{} chars", chars)
    }
}

// ============================================================================
// Tests
// ============================================================================
