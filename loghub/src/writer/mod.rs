//! 작성기 (출력 백엔드)
//!
//! 작성기 설정은 닫힌 합 타입 [`WriterConfig`]이며, 살아있는 작성기는
//! 자기 전용 제한 큐와 백엔드 태스크 하나를 가집니다. 백엔드 태스크는
//! [`Command`]를 FIFO 순서로 소비합니다.

pub mod callback;
pub mod console;
pub mod file;
pub mod rotation;
pub mod syslog;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::config::LoggingConfig;
use crate::entry::{Entry, ExtConfig};
use crate::error::{LoggingError, Result};
use crate::level::{Level, LevelSyms};
use crate::logging::Core;
use crate::net::{client::ClientWriterConfig, server::ServerWriterConfig};
use crate::security::key::{Key, KeyHandle, KeyMaterial};

pub use callback::{CallbackWriterConfig, LogSink};
pub use console::{ConsoleTarget, ConsoleWriterConfig};
pub use file::FileWriterConfig;
pub use rotation::CompressionMethod;
pub use syslog::{SyslogTransport, SyslogWriterConfig};

/// 레지스트리가 할당하는 작성기 ID
pub type Wid = usize;

/// 루트 작성기에 예약된 ID
pub const ROOT_WID: Wid = 0;

/// 작성기 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WriterKind {
    Console,
    File,
    Client,
    Server,
    Syslog,
    Callback,
}

impl WriterKind {
    /// 네트워크 작성기 여부
    pub fn is_network(&self) -> bool {
        matches!(self, WriterKind::Client | WriterKind::Server)
    }
}

impl fmt::Display for WriterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 작성기 생성 파라미터
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WriterConfig {
    Console(ConsoleWriterConfig),
    File(FileWriterConfig),
    Client(ClientWriterConfig),
    Server(ServerWriterConfig),
    Syslog(SyslogWriterConfig),
    Callback(CallbackWriterConfig),
}

impl WriterConfig {
    /// 작성기 종류
    pub fn kind(&self) -> WriterKind {
        match self {
            WriterConfig::Console(_) => WriterKind::Console,
            WriterConfig::File(_) => WriterKind::File,
            WriterConfig::Client(_) => WriterKind::Client,
            WriterConfig::Server(_) => WriterKind::Server,
            WriterConfig::Syslog(_) => WriterKind::Syslog,
            WriterConfig::Callback(_) => WriterKind::Callback,
        }
    }

    /// 작성기 레벨
    pub fn level(&self) -> Level {
        match self {
            WriterConfig::Console(c) => c.level,
            WriterConfig::File(c) => c.level,
            WriterConfig::Client(c) => c.level,
            WriterConfig::Server(c) => c.level,
            WriterConfig::Syslog(c) => c.level,
            WriterConfig::Callback(c) => c.level,
        }
    }

    pub(crate) fn set_level(&mut self, level: Level) {
        match self {
            WriterConfig::Console(c) => c.level = level,
            WriterConfig::File(c) => c.level = level,
            WriterConfig::Client(c) => c.level = level,
            WriterConfig::Server(c) => c.level = level,
            WriterConfig::Syslog(c) => c.level = level,
            WriterConfig::Callback(c) => c.level = level,
        }
    }

    /// Client/Server 설정의 키 핸들
    pub(crate) fn key_handle_mut(&mut self) -> Option<&mut KeyHandle> {
        match self {
            WriterConfig::Client(c) => Some(&mut c.key),
            WriterConfig::Server(c) => Some(&mut c.key),
            _ => None,
        }
    }

    /// 생성 전 설정 검증
    pub fn validate(&self) -> Result<()> {
        match self {
            WriterConfig::Console(c) => c.validate(),
            WriterConfig::File(c) => c.validate(),
            WriterConfig::Client(c) => c.validate(),
            WriterConfig::Server(c) => c.validate(),
            WriterConfig::Syslog(c) => c.validate(),
            WriterConfig::Callback(c) => c.validate(),
        }
    }
}

/// 콘솔 작성기 설정 생성
pub fn console_writer_config(level: Level, colors: bool) -> WriterConfig {
    WriterConfig::Console(ConsoleWriterConfig::new(level, colors))
}

/// 파일 작성기 설정 생성
pub fn file_writer_config(
    level: Level,
    path: impl Into<PathBuf>,
    max_size: u64,
    backlog: usize,
    flush_timeout: Option<Duration>,
    flush_interval: Option<Duration>,
    compression: CompressionMethod,
) -> WriterConfig {
    WriterConfig::File(FileWriterConfig {
        level,
        path: path.into(),
        max_size,
        backlog,
        flush_timeout,
        flush_interval,
        compression,
    })
}

/// 네트워크 클라이언트 작성기 설정 생성 (키는 이동되어 소비됨)
pub fn client_writer_config(level: Level, address: impl Into<String>, key: Option<Key>) -> WriterConfig {
    WriterConfig::Client(ClientWriterConfig::new(level, address, key))
}

/// 네트워크 서버 작성기 설정 생성 (키는 이동되어 소비됨)
pub fn server_writer_config(level: Level, address: impl Into<String>, key: Option<Key>) -> WriterConfig {
    WriterConfig::Server(ServerWriterConfig::new(level, address, key))
}

/// syslog 작성기 설정 생성
pub fn syslog_writer_config(
    level: Level,
    hostname: Option<String>,
    process_name: Option<String>,
    pid: u32,
) -> WriterConfig {
    WriterConfig::Syslog(SyslogWriterConfig::new(level, hostname, process_name, pid))
}

/// 콜백 작성기 설정 생성
pub fn callback_writer_config(level: Level, sink: Arc<dyn LogSink>) -> WriterConfig {
    WriterConfig::Callback(CallbackWriterConfig::new(level, sink))
}

/// 렌더링 정책 (인스턴스 전체 공유)
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RenderPolicy {
    pub ext: ExtConfig,
    pub syms: LevelSyms,
}

pub(crate) type SharedPolicy = Arc<RwLock<RenderPolicy>>;

/// 동기화 완료 신호
pub(crate) struct SyncAck {
    pub tx: std_mpsc::SyncSender<()>,
    pub deadline: Instant,
}

impl SyncAck {
    /// 처리 완료 통지 (대기자가 이미 포기했어도 무시)
    pub fn complete(self) {
        let _ = self.tx.try_send(());
    }
}

/// 백엔드 태스크 명령
pub(crate) enum Command {
    /// 항목 기록
    Message(Arc<Entry>),
    /// 버퍼 비우기 후 응답
    Sync(SyncAck),
    /// 강제 세그먼트 순환 (파일 작성기만 해당)
    Rotate,
    /// 키 교체 (네트워크 작성기만 해당)
    SetKey(KeyMaterial),
    /// 남은 항목 처리 후 종료
    Stop,
}

/// 레지스트리와 백엔드 태스크가 공유하는 작성기 상태
pub(crate) struct WriterShared {
    pub wid: Wid,
    pub kind: WriterKind,
    level: AtomicU8,
    enabled: AtomicBool,
    discard: AtomicBool,
    broken: AtomicBool,
    dropped: AtomicU64,
    connections: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

/// 기록해 두는 에러 최대 개수
const MAX_PENDING_ERRORS: usize = 32;

impl WriterShared {
    fn new(wid: Wid, kind: WriterKind, level: Level) -> Self {
        Self {
            wid,
            kind,
            level: AtomicU8::new(level as u8),
            enabled: AtomicBool::new(true),
            discard: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            connections: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(Level::NoLog)
    }

    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// 활성 상태이며 레벨이 항목을 허용하는지 확인
    pub fn accepts(&self, level: Level) -> bool {
        self.is_enabled() && self.level().admits(level)
    }

    /// 즉시 종료 중이면 남은 항목은 기록하지 않고 버림
    pub fn is_discarding(&self) -> bool {
        self.discard.load(Ordering::Relaxed)
    }

    pub fn start_discarding(&self) {
        self.discard.store(true, Ordering::Relaxed);
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::Relaxed);
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Relaxed)
    }

    pub fn count_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// 정상 운영 중 에러 기록 (다음 sync에서 보고)
    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(wid = self.wid, kind = %self.kind, error = %message, "작성기 에러 기록");
        let mut errors = self.errors.lock();
        if errors.len() < MAX_PENDING_ERRORS {
            errors.push(message);
        }
    }

    pub fn pending_errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock())
    }
}

/// Stop 이후 큐에 남은 명령 회수
pub(crate) fn drain_remaining(rx: &mut mpsc::Receiver<Command>) -> Vec<Command> {
    rx.close();
    let mut rest = Vec::new();
    while let Ok(command) = rx.try_recv() {
        rest.push(command);
    }
    rest
}

/// 백엔드 생성 결과 보고
pub(crate) struct InitInfo {
    pub bound: Option<SocketAddr>,
}

pub(crate) type InitReporter = std_mpsc::SyncSender<Result<InitInfo>>;

/// 백엔드 태스크 실행 컨텍스트
///
/// 태스크가 끝나면서 컨텍스트가 해제되면 `done` 채널이 닫혀 종료가 통지됩니다.
pub(crate) struct BackendContext {
    pub shared: Arc<WriterShared>,
    pub policy: SharedPolicy,
    pub settings: LoggingConfig,
    pub core: Weak<Core>,
    _done: std_mpsc::SyncSender<()>,
}

#[cfg(test)]
impl BackendContext {
    /// 레지스트리 없이 백엔드 태스크를 직접 돌리기 위한 컨텍스트
    pub(crate) fn detached(kind: WriterKind, level: Level) -> (Self, std_mpsc::Receiver<()>) {
        let (done_tx, done_rx) = std_mpsc::sync_channel(1);
        let ctx = BackendContext {
            shared: Arc::new(WriterShared::new(1, kind, level)),
            policy: SharedPolicy::default(),
            settings: LoggingConfig::default(),
            core: Weak::new(),
            _done: done_tx,
        };
        (ctx, done_rx)
    }
}

/// 작성기 상태 조회 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriterStatus {
    pub wid: Wid,
    pub kind: WriterKind,
    pub enabled: bool,
    pub level: Level,
    /// 큐 포화 또는 장애로 버려진 항목 수
    pub dropped: u64,
    /// 아직 sync로 보고되지 않은 에러
    pub errors: Vec<String>,
    /// 네트워크 연결이 끊긴 상태인지
    pub broken: bool,
    /// 서버 작성기의 현재 클라이언트 연결 수
    pub connections: usize,
}

/// 제한 시간이 너무 커서 시각 계산이 넘칠 때 쓰는 상한 (약 30년)
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// 지금부터 `timeout` 뒤의 마감 시각 (넘치면 상한으로 고정)
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// 제한 시간 동안만 대기하는 큐 삽입
fn enqueue(tx: &mpsc::Sender<Command>, command: Command, timeout: Duration) -> bool {
    let mut command = command;
    let deadline = deadline_after(timeout);
    loop {
        match tx.try_send(command) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                if Instant::now() >= deadline {
                    return false;
                }
                command = back;
                std::thread::sleep(Duration::from_micros(50));
            }
            Err(TrySendError::Closed(_)) => return false,
        }
    }
}

/// 작성기 큐와 공유 상태의 복제본
///
/// 대기가 필요한 큐 삽입은 모두 이 핸들로 레지스트리 잠금을 놓은 뒤 수행합니다.
#[derive(Clone)]
pub(crate) struct WriterHandle {
    pub shared: Arc<WriterShared>,
    tx: mpsc::Sender<Command>,
}

impl WriterHandle {
    pub fn wid(&self) -> Wid {
        self.shared.wid
    }

    pub fn enqueue(&self, command: Command, timeout: Duration) -> bool {
        enqueue(&self.tx, command, timeout)
    }

    /// 항목 전달 (실패 시 드롭 카운터 증가)
    pub fn deliver(&self, entry: &Arc<Entry>, timeout: Duration) -> bool {
        if self.enqueue(Command::Message(entry.clone()), timeout) {
            true
        } else {
            self.shared.count_dropped();
            false
        }
    }

    /// 동기화 요청을 큐에 넣고 응답 수신기를 반환
    pub fn request_sync(&self, deadline: Instant) -> Option<std_mpsc::Receiver<()>> {
        let (tx, rx) = std_mpsc::sync_channel(1);
        let timeout = deadline.saturating_duration_since(Instant::now());
        let ack = SyncAck { tx, deadline };
        self.enqueue(Command::Sync(ack), timeout).then_some(rx)
    }
}

/// 살아있는 작성기
pub(crate) struct Writer {
    pub config: WriterConfig,
    pub shared: Arc<WriterShared>,
    pub bound: Option<SocketAddr>,
    tx: mpsc::Sender<Command>,
    done: Mutex<std_mpsc::Receiver<()>>,
}

/// 제거된 작성기
#[derive(Debug)]
pub struct RemovedWriter {
    /// 작성기를 만든 설정 (키 포함, 재등록 가능)
    pub config: WriterConfig,
    /// 제거 직전 상태
    pub status: WriterStatus,
    /// 제한 시간 안에 백엔드 태스크가 종료되었는지
    pub finished: bool,
}

impl Writer {
    /// 설정으로 백엔드 태스크를 시작하고 초기화 결과를 기다림
    pub fn spawn(
        wid: Wid,
        config: WriterConfig,
        runtime: &Handle,
        policy: SharedPolicy,
        settings: &LoggingConfig,
        core: Weak<Core>,
    ) -> Result<Writer> {
        config.validate()?;
        let kind = config.kind();
        let shared = Arc::new(WriterShared::new(wid, kind, config.level()));
        let (tx, rx) = mpsc::channel(settings.queue_size);
        let (init_tx, init_rx) = std_mpsc::sync_channel(1);
        let (done_tx, done_rx) = std_mpsc::sync_channel(1);

        let ctx = BackendContext {
            shared: shared.clone(),
            policy,
            settings: settings.clone(),
            core,
            _done: done_tx,
        };

        let task = match &config {
            WriterConfig::Console(c) => runtime.spawn(console::run(c.clone(), rx, ctx, init_tx)),
            WriterConfig::File(c) => runtime.spawn(file::run(c.clone(), rx, ctx, init_tx)),
            WriterConfig::Client(c) => {
                let material = c.key.material()?;
                runtime.spawn(crate::net::client::run(c.address.clone(), material, rx, ctx, init_tx))
            }
            WriterConfig::Server(c) => {
                let material = c.key.material()?;
                runtime.spawn(crate::net::server::run(c.address.clone(), material, rx, ctx, init_tx))
            }
            WriterConfig::Syslog(c) => runtime.spawn(syslog::run(c.clone(), rx, ctx, init_tx)),
            WriterConfig::Callback(c) => runtime.spawn(callback::run(c.clone(), rx, ctx, init_tx)),
        };

        // 연결 시도 시간과 재시도 여유를 합친 만큼만 기다림
        let init_timeout = settings
            .connect_timeout
            .saturating_mul(2)
            .saturating_add(Duration::from_secs(1));
        let info = match init_rx.recv_timeout(init_timeout) {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => return Err(err),
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                task.abort();
                return Err(LoggingError::init(kind, "백엔드 초기화 시간 초과"));
            }
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                return Err(LoggingError::init(kind, "백엔드 태스크가 초기화 전에 종료됨"));
            }
        };

        debug!(wid, kind = %kind, bound = ?info.bound, "작성기 시작됨");
        Ok(Writer {
            config,
            shared,
            bound: info.bound,
            tx,
            done: Mutex::new(done_rx),
        })
    }

    pub fn wid(&self) -> Wid {
        self.shared.wid
    }

    pub fn kind(&self) -> WriterKind {
        self.shared.kind
    }

    /// 레지스트리 잠금 밖에서 큐에 접근하기 위한 핸들
    pub fn handle(&self) -> WriterHandle {
        WriterHandle {
            shared: self.shared.clone(),
            tx: self.tx.clone(),
        }
    }

    /// 현재 상태
    pub fn status(&self) -> WriterStatus {
        WriterStatus {
            wid: self.shared.wid,
            kind: self.shared.kind,
            enabled: self.shared.is_enabled(),
            level: self.shared.level(),
            dropped: self.shared.dropped(),
            errors: self.shared.pending_errors(),
            broken: self.shared.is_broken(),
            connections: self.shared.connections(),
        }
    }

    /// 서버 작성기의 키 자료
    pub fn key_material(&self) -> Option<KeyMaterial> {
        match &self.config {
            WriterConfig::Server(c) => c.key.material().ok(),
            _ => None,
        }
    }

    /// 백엔드 태스크 종료
    ///
    /// `graceful`이 false이면 큐에 남은 항목을 기록하지 않고 버립니다.
    pub fn stop(self, graceful: bool, timeout: Duration) -> RemovedWriter {
        let deadline = deadline_after(timeout);
        if !graceful {
            self.shared.start_discarding();
        }
        let status = self.status();
        let sent = enqueue(&self.tx, Command::Stop, timeout);
        let finished = if sent {
            let remaining = deadline.saturating_duration_since(Instant::now());
            matches!(
                self.done.lock().recv_timeout(remaining),
                Err(std_mpsc::RecvTimeoutError::Disconnected)
            )
        } else {
            false
        };
        if !finished {
            warn!(wid = self.wid(), kind = %self.kind(), "작성기가 제한 시간 안에 종료되지 않음");
        }
        RemovedWriter {
            config: self.config,
            status,
            finished,
        }
    }
}
