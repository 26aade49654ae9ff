//! 콘솔 작성기
//!
//! 레벨별 ANSI 색상과 선택적 도메인/메시지 정규식 필터를 지원합니다.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::entry::{Entry, Renderer};
use crate::error::{LoggingError, Result};
use crate::level::Level;
use crate::writer::{drain_remaining, BackendContext, Command, InitInfo, InitReporter};

/// 콘솔 출력 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsoleTarget {
    /// 표준 출력
    #[default]
    StdOut,
    /// 표준 에러
    StdErr,
    /// ERROR 이상은 표준 에러, 나머지는 표준 출력
    Both,
}

impl ConsoleTarget {
    fn to_stderr(&self, level: Level) -> bool {
        match self {
            ConsoleTarget::StdOut => false,
            ConsoleTarget::StdErr => true,
            ConsoleTarget::Both => level >= Level::Error,
        }
    }
}

/// 콘솔 작성기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleWriterConfig {
    pub level: Level,
    pub colors: bool,
    #[serde(default)]
    pub target: ConsoleTarget,
    #[serde(default)]
    pub domain_filter: Option<String>,
    #[serde(default)]
    pub message_filter: Option<String>,
}

impl ConsoleWriterConfig {
    pub fn new(level: Level, colors: bool) -> Self {
        Self {
            level,
            colors,
            target: ConsoleTarget::default(),
            domain_filter: None,
            message_filter: None,
        }
    }

    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    /// 도메인이 정규식과 일치하는 항목만 출력
    pub fn with_domain_filter(mut self, pattern: impl Into<String>) -> Self {
        self.domain_filter = Some(pattern.into());
        self
    }

    /// 메시지가 정규식과 일치하는 항목만 출력
    pub fn with_message_filter(mut self, pattern: impl Into<String>) -> Self {
        self.message_filter = Some(pattern.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ConsoleFilter::compile(self).map(|_| ())
    }
}

struct ConsoleFilter {
    domain: Option<Regex>,
    message: Option<Regex>,
}

impl ConsoleFilter {
    fn compile(config: &ConsoleWriterConfig) -> Result<Self> {
        let compile = |pattern: &Option<String>| -> Result<Option<Regex>> {
            pattern
                .as_deref()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        LoggingError::Config(format!("잘못된 콘솔 필터 '{}': {}", p, e))
                    })
                })
                .transpose()
        };
        Ok(Self {
            domain: compile(&config.domain_filter)?,
            message: compile(&config.message_filter)?,
        })
    }

    fn matches(&self, entry: &Entry) -> bool {
        self.domain.as_ref().map_or(true, |re| re.is_match(&entry.domain))
            && self.message.as_ref().map_or(true, |re| re.is_match(&entry.message))
    }
}

/// 콘솔 백엔드 태스크
pub(crate) async fn run(
    config: ConsoleWriterConfig,
    rx: mpsc::Receiver<Command>,
    ctx: BackendContext,
    init: InitReporter,
) {
    let filter = match ConsoleFilter::compile(&config) {
        Ok(filter) => filter,
        Err(e) => {
            let _ = init.send(Err(e));
            return;
        }
    };
    let _ = init.send(Ok(InitInfo { bound: None }));
    write_loop(&config, &filter, rx, &ctx, tokio::io::stdout(), tokio::io::stderr()).await;
    debug!(wid = ctx.shared.wid, "콘솔 작성기 태스크 종료");
}

async fn write_loop<O, E>(
    config: &ConsoleWriterConfig,
    filter: &ConsoleFilter,
    mut rx: mpsc::Receiver<Command>,
    ctx: &BackendContext,
    mut out: O,
    mut err: E,
) -> (O, E)
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let renderer = Renderer::new(config.colors);

    while let Some(command) = rx.recv().await {
        match command {
            Command::Stop => break,
            other => handle(other, config, filter, &renderer, ctx, &mut out, &mut err).await,
        }
    }
    for command in drain_remaining(&mut rx) {
        handle(command, config, filter, &renderer, ctx, &mut out, &mut err).await;
    }
    let _ = out.flush().await;
    let _ = err.flush().await;
    (out, err)
}

async fn handle<O, E>(
    command: Command,
    config: &ConsoleWriterConfig,
    filter: &ConsoleFilter,
    renderer: &Renderer,
    ctx: &BackendContext,
    out: &mut O,
    err: &mut E,
) where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    match command {
        Command::Message(entry) => {
            if ctx.shared.is_discarding() || !filter.matches(&entry) {
                return;
            }
            if let Err(e) = write_entry(&entry, config, renderer, ctx, out, err).await {
                ctx.shared.record_error(format!("콘솔 출력 실패: {}", e));
            }
        }
        Command::Sync(ack) => {
            let _ = out.flush().await;
            let _ = err.flush().await;
            ack.complete();
        }
        Command::Rotate | Command::SetKey(_) | Command::Stop => {}
    }
}

async fn write_entry<O, E>(
    entry: &Arc<Entry>,
    config: &ConsoleWriterConfig,
    renderer: &Renderer,
    ctx: &BackendContext,
    out: &mut O,
    err: &mut E,
) -> std::io::Result<()>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let policy = *ctx.policy.read();
    let mut line = renderer.render(entry, &policy.ext, policy.syms);
    line.push('\n');

    if config.target.to_stderr(entry.level) {
        err.write_all(line.as_bytes()).await?;
        err.flush().await
    } else {
        out.write_all(line.as_bytes()).await?;
        out.flush().await
    }
}
