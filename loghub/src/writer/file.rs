//! 파일 작성기
//!
//! 활성 세그먼트에 렌더링된 항목을 덧붙이고, 크기 또는 경과 시간 기준으로
//! 세그먼트를 순환합니다. 순환과 압축은 백엔드 태스크 안에서만 수행되므로
//! `log()` 호출자를 막지 않습니다.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant};
use tracing::{debug, error, info};

use crate::entry::{Entry, Renderer};
use crate::error::{LoggingError, Result};
use crate::level::Level;
use crate::writer::rotation::{rotate_segments, CompressionMethod, BACKLOG_MAX};
use crate::writer::{drain_remaining, BackendContext, Command, InitInfo, InitReporter, WriterKind};

/// 기본 플러시 주기
const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// 파일 작성기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileWriterConfig {
    pub level: Level,
    pub path: PathBuf,
    /// 세그먼트 최대 크기 (0이면 크기 순환 없음)
    pub max_size: u64,
    /// 유지할 백업 개수
    pub backlog: usize,
    /// 버퍼를 디스크에 내리는 최대 주기
    pub flush_timeout: Option<Duration>,
    /// 활성 세그먼트를 순환하는 경과 시간
    pub flush_interval: Option<Duration>,
    pub compression: CompressionMethod,
}

impl FileWriterConfig {
    /// 순환 없는 단순 파일 작성기 설정
    pub fn new(level: Level, path: impl Into<PathBuf>) -> Self {
        Self {
            level,
            path: path.into(),
            max_size: 0,
            backlog: 0,
            flush_timeout: None,
            flush_interval: None,
            compression: CompressionMethod::Store,
        }
    }

    fn rotates(&self) -> bool {
        self.max_size > 0 || self.flush_interval.is_some()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(LoggingError::Config("파일 작성기 경로가 비어 있습니다".into()));
        }
        if self.rotates() && self.backlog == 0 {
            return Err(LoggingError::Config(
                "순환하는 파일 작성기에는 backlog 값이 필요합니다".into(),
            ));
        }
        if self.backlog > BACKLOG_MAX {
            return Err(LoggingError::Config(format!(
                "backlog {} 이(가) 최대값 {} 을(를) 초과합니다",
                self.backlog, BACKLOG_MAX
            )));
        }
        if matches!(self.flush_timeout, Some(d) if d.is_zero())
            || matches!(self.flush_interval, Some(d) if d.is_zero())
        {
            return Err(LoggingError::Config("파일 작성기 주기는 0보다 커야 합니다".into()));
        }
        Ok(())
    }
}

/// 활성 세그먼트 상태
struct Segment {
    writer: Option<BufWriter<fs::File>>,
    size: u64,
    opened_at: Instant,
    dirty: bool,
}

/// 파일 작성기 백엔드 상태
struct FileBackend {
    config: FileWriterConfig,
    renderer: Renderer,
    segment: Segment,
    /// 쓰기 실패 후 복구 전까지 true
    degraded: bool,
}

impl FileBackend {
    async fn open(config: FileWriterConfig) -> AnyResult<Self> {
        let (writer, size) = open_segment(&config.path).await?;
        Ok(Self {
            config,
            renderer: Renderer::new(false),
            segment: Segment {
                writer: Some(writer),
                size,
                opened_at: Instant::now(),
                dirty: false,
            },
            degraded: false,
        })
    }

    fn rotate_deadline(&self) -> Option<Instant> {
        self.config
            .flush_interval
            .map(|interval| self.segment.opened_at + interval)
    }

    async fn handle(&mut self, command: Command, ctx: &BackendContext) {
        match command {
            Command::Message(entry) => {
                if ctx.shared.is_discarding() {
                    return;
                }
                self.write(&entry, ctx).await;
                if self.config.max_size > 0 && self.segment.size >= self.config.max_size {
                    self.rotate(ctx).await;
                }
            }
            Command::Sync(ack) => {
                if let Err(e) = self.sync().await {
                    self.fail(ctx, format!("파일 동기화 실패: {:#}", e));
                }
                ack.complete();
            }
            Command::Rotate => self.rotate(ctx).await,
            Command::SetKey(_) | Command::Stop => {}
        }
    }

    async fn write(&mut self, entry: &Entry, ctx: &BackendContext) {
        if self.segment.writer.is_none() {
            match open_segment(&self.config.path).await {
                Ok((writer, size)) => {
                    info!(wid = ctx.shared.wid, path = %self.config.path.display(), "로그 파일 복구됨");
                    self.segment.writer = Some(writer);
                    self.segment.size = size;
                    self.degraded = false;
                }
                Err(e) => {
                    ctx.shared.count_dropped();
                    if !self.degraded {
                        self.fail(ctx, format!("로그 파일 다시 열기 실패: {:#}", e));
                    }
                    return;
                }
            }
        }

        let policy = *ctx.policy.read();
        let mut line = self.renderer.render(entry, &policy.ext, policy.syms);
        line.push('\n');

        let Some(writer) = self.segment.writer.as_mut() else {
            return;
        };
        match writer.write_all(line.as_bytes()).await {
            Ok(()) => {
                self.segment.size += line.len() as u64;
                self.segment.dirty = true;
            }
            Err(e) => {
                ctx.shared.count_dropped();
                self.fail(ctx, format!("로그 데이터 작성 실패: {}", e));
            }
        }
    }

    /// 쓰기 실패 기록 후 열화 상태로 전환
    fn fail(&mut self, ctx: &BackendContext, message: String) {
        error!(wid = ctx.shared.wid, path = %self.config.path.display(), error = %message, "파일 작성기 열화");
        ctx.shared.record_error(message);
        self.segment.writer = None;
        self.degraded = true;
    }

    async fn flush(&mut self) -> AnyResult<()> {
        if let Some(writer) = self.segment.writer.as_mut() {
            if self.segment.dirty {
                writer.flush().await.context("로그 파일 플러시 실패")?;
                self.segment.dirty = false;
            }
        }
        Ok(())
    }

    async fn sync(&mut self) -> AnyResult<()> {
        self.flush().await?;
        if let Some(writer) = self.segment.writer.as_mut() {
            writer.get_ref().sync_data().await.context("로그 파일 fsync 실패")?;
        }
        Ok(())
    }

    async fn rotate(&mut self, ctx: &BackendContext) {
        if self.config.backlog == 0 {
            return;
        }
        if let Err(e) = self.flush().await {
            self.fail(ctx, format!("순환 전 플러시 실패: {:#}", e));
            return;
        }
        // 순환 중에는 파일 핸들을 닫아 둠
        self.segment.writer = None;

        let path = self.config.path.clone();
        let backlog = self.config.backlog;
        let compression = self.config.compression;
        let rotated =
            tokio::task::spawn_blocking(move || rotate_segments(&path, backlog, compression)).await;
        match rotated {
            Ok(Ok(backup)) => {
                debug!(wid = ctx.shared.wid, backup = %backup.display(), "세그먼트 순환됨");
            }
            Ok(Err(e)) => ctx.shared.record_error(format!("로그 순환 실패: {:#}", e)),
            Err(e) => ctx.shared.record_error(format!("로그 순환 태스크 실패: {}", e)),
        }

        match open_segment(&self.config.path).await {
            Ok((writer, size)) => {
                self.segment = Segment {
                    writer: Some(writer),
                    size,
                    opened_at: Instant::now(),
                    dirty: false,
                };
            }
            Err(e) => self.fail(ctx, format!("새 세그먼트 열기 실패: {:#}", e)),
        }
    }
}

/// 활성 세그먼트 열기 (디렉토리 포함)
async fn open_segment(path: &Path) -> AnyResult<(BufWriter<fs::File>, u64)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.context("로그 디렉토리 생성 실패")?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .context("로그 파일 열기 실패")?;
    let size = file.metadata().await.map(|m| m.len()).unwrap_or(0);
    Ok((BufWriter::new(file), size))
}

/// 파일 백엔드 태스크
pub(crate) async fn run(
    config: FileWriterConfig,
    mut rx: mpsc::Receiver<Command>,
    ctx: BackendContext,
    init: InitReporter,
) {
    let mut backend = match FileBackend::open(config).await {
        Ok(backend) => backend,
        Err(e) => {
            let _ = init.send(Err(LoggingError::init(WriterKind::File, format!("{:#}", e))));
            return;
        }
    };
    let _ = init.send(Ok(InitInfo { bound: None }));

    let mut flush_tick = interval(backend.config.flush_timeout.unwrap_or(DEFAULT_FLUSH_TIMEOUT));
    debug!(
        wid = ctx.shared.wid,
        path = %backend.config.path.display(),
        max_size = backend.config.max_size,
        backlog = backend.config.backlog,
        "파일 작성기 태스크 시작됨"
    );

    loop {
        let deadline = backend.rotate_deadline();
        tokio::select! {
            command = rx.recv() => {
                match command {
                    Some(Command::Stop) | None => break,
                    Some(command) => backend.handle(command, &ctx).await,
                }
            }

            // 주기적 플러시
            _ = flush_tick.tick() => {
                if let Err(e) = backend.flush().await {
                    backend.fail(&ctx, format!("주기적 플러시 실패: {:#}", e));
                }
            }

            // 경과 시간 기준 순환 (빈 세그먼트는 유지)
            _ = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                if backend.segment.size > 0 {
                    backend.rotate(&ctx).await;
                } else {
                    backend.segment.opened_at = Instant::now();
                }
            }
        }
    }

    for command in drain_remaining(&mut rx) {
        backend.handle(command, &ctx).await;
    }
    if let Err(e) = backend.sync().await {
        ctx.shared.record_error(format!("종료 시 로그 플러시 실패: {:#}", e));
    }
    debug!(wid = ctx.shared.wid, "파일 작성기 태스크 종료");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::rotation::list_backups;
    use crate::writer::SyncAck;
    use std::sync::{mpsc as std_mpsc, Arc};
    use tempfile::TempDir;

    fn entry(level: Level, message: &str) -> Command {
        Command::Message(Arc::new(Entry::new(level, "app", message)))
    }

    async fn start(config: FileWriterConfig) -> (mpsc::Sender<Command>, tokio::task::JoinHandle<()>) {
        let (ctx, _done) = BackendContext::detached(WriterKind::File, config.level);
        let (tx, rx) = mpsc::channel(64);
        let (init_tx, init_rx) = std_mpsc::sync_channel(1);
        let handle = tokio::spawn(run(config, rx, ctx, init_tx));
        let init = tokio::task::spawn_blocking(move || init_rx.recv().unwrap()).await.unwrap();
        assert!(init.is_ok());
        (tx, handle)
    }

    #[tokio::test]
    async fn test_file_writer_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("app.log");
        let (tx, handle) = start(FileWriterConfig::new(Level::Debug, &path)).await;

        for i in 0..10 {
            tx.send(entry(Level::Info, &format!("Message {}", i))).await.unwrap();
        }
        tx.send(Command::Stop).await.unwrap();
        handle.await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 10);
        assert!(content.contains("app INFO: Message 9"));
    }

    #[tokio::test]
    async fn test_size_rotation_keeps_backlog() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let config = FileWriterConfig {
            max_size: 200,
            backlog: 3,
            ..FileWriterConfig::new(Level::Debug, &path)
        };
        let (tx, handle) = start(config).await;

        for i in 0..100 {
            tx.send(entry(Level::Info, &format!("rotating line {:03}", i))).await.unwrap();
        }
        tx.send(Command::Stop).await.unwrap();
        handle.await.unwrap();

        let backups = list_backups(&path, 10);
        assert_eq!(backups.len(), 3);
        for backup in &backups {
            let size = std::fs::metadata(backup).unwrap().len();
            assert!(size >= 200 && size < 300, "segment size {}", size);
        }
        let newest = std::fs::read_to_string(&backups[0]).unwrap();
        let active = std::fs::read_to_string(&path).unwrap();
        assert!(newest.contains("rotating line") || active.contains("rotating line 099"));
    }

    #[tokio::test]
    async fn test_explicit_rotate_and_sync() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let config = FileWriterConfig {
            backlog: 2,
            compression: CompressionMethod::Deflate,
            ..FileWriterConfig::new(Level::Debug, &path)
        };
        let (tx, handle) = start(config).await;

        tx.send(entry(Level::Warning, "before rotate")).await.unwrap();
        tx.send(Command::Rotate).await.unwrap();
        tx.send(entry(Level::Warning, "after rotate")).await.unwrap();

        let (ack_tx, ack_rx) = std_mpsc::sync_channel(1);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        tx.send(Command::Sync(SyncAck { tx: ack_tx, deadline })).await.unwrap();
        tokio::task::spawn_blocking(move || ack_rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .await
            .unwrap();

        let active = std::fs::read_to_string(&path).unwrap();
        assert!(active.contains("after rotate"));
        assert!(!active.contains("before rotate"));
        assert!(dir.path().join("app.log.1.gz").exists());

        tx.send(Command::Stop).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_time_based_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let config = FileWriterConfig {
            backlog: 5,
            flush_interval: Some(Duration::from_millis(100)),
            ..FileWriterConfig::new(Level::Debug, &path)
        };
        let (tx, handle) = start(config).await;

        tx.send(entry(Level::Info, "aged line")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        tx.send(Command::Stop).await.unwrap();
        handle.await.unwrap();

        let backups = list_backups(&path, 5);
        assert_eq!(backups.len(), 1);
        assert!(std::fs::read_to_string(&backups[0]).unwrap().contains("aged line"));
    }

    #[tokio::test]
    async fn test_unwritable_path_fails_init() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let (ctx, _done) = BackendContext::detached(WriterKind::File, Level::Info);
        let (_tx, rx) = mpsc::channel(4);
        let (init_tx, init_rx) = std_mpsc::sync_channel(1);
        run(FileWriterConfig::new(Level::Info, blocker.join("app.log")), rx, ctx, init_tx).await;

        assert!(matches!(init_rx.recv().unwrap(), Err(LoggingError::WriterInit { .. })));
    }

    #[test]
    fn test_validation() {
        let rotating = FileWriterConfig {
            max_size: 1024,
            ..FileWriterConfig::new(Level::Info, "app.log")
        };
        assert!(rotating.validate().is_err());

        let too_deep = FileWriterConfig {
            max_size: 1024,
            backlog: BACKLOG_MAX + 1,
            ..FileWriterConfig::new(Level::Info, "app.log")
        };
        assert!(too_deep.validate().is_err());

        assert!(FileWriterConfig::new(Level::Info, "app.log").validate().is_ok());
    }
}
