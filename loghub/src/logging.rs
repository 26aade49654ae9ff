//! 로깅 인스턴스
//!
//! [`Logging`]은 전역 레벨, 도메인, 확장 필드 정책, 작성기 레지스트리를
//! 소유하는 분배기입니다. 핸들은 복제 비용이 낮으며 모든 복제본이 같은
//! 인스턴스를 가리킵니다.
//!
//! # 분배 규칙
//!
//! - 전역 레벨이 항목을 허용하지 않으면 메시지를 만들지 않고 즉시 반환
//! - 활성 상태이며 자기 레벨이 항목을 허용하는 작성기마다 큐에 복사본 삽입
//! - 로컬 항목은 Server 작성기로 가지 않음
//! - 서버가 받은 원격 항목은 Client/Server 작성기로 가지 않음
//!
//! 백엔드 태스크는 인스턴스 전용 tokio 런타임에서 실행되므로 호출 스레드가
//! 비동기 컨텍스트인지와 관계없이 동기 API를 사용할 수 있습니다.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::config::{write_config_text, LoggingConfig, PersistedConfig};
use crate::entry::{Entry, ExtConfig, ExtFields};
use crate::error::{LoggingError, Result};
use crate::level::{Level, LevelSyms};
use crate::net::client::ClientWriterConfig;
use crate::net::server::ServerWriterConfig;
use crate::registry::WriterRegistry;
use crate::security::key::{Key, KeyHandle};
use crate::writer::{
    console_writer_config, deadline_after, Command, FileWriterConfig, RemovedWriter, RenderPolicy,
    SharedPolicy, SyslogWriterConfig, Wid, Writer, WriterConfig, WriterKind, WriterStatus, ROOT_WID,
};

/// 즉시 종료 시 모든 작성기 정지에 쓰는 시간 상한
const IMMEDIATE_STOP_BUDGET: Duration = Duration::from_millis(200);

/// 레벨별 로그 메서드 생성 (`self.log(level, message)` 위임)
macro_rules! level_methods {
    ($($name:ident => $level:expr),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($level), "` 레벨로 기록하고 수락한 작성기 수를 반환")]
            pub fn $name(&self, message: impl Into<String>) -> usize {
                self.log($level, message)
            }
        )*
    };
}
pub(crate) use level_methods;

/// 작성기 하나가 보고한 정상 운영 중 에러
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterFailure {
    pub wid: Wid,
    pub kind: WriterKind,
    pub message: String,
}

/// 동기화 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// 제한 시간 안에 비워지지 않은 작성기
    pub pending: Vec<Wid>,
    /// 지난 동기화 이후 기록된 작성기 에러
    pub failures: Vec<WriterFailure>,
}

impl SyncReport {
    pub fn is_ok(&self) -> bool {
        self.pending.is_empty() && self.failures.is_empty()
    }

    /// 미완료 작성기가 있으면 `Timeout`, 아니면 첫 번째 에러를 `Io`로 변환
    pub fn into_result(self) -> Result<()> {
        if !self.pending.is_empty() {
            return Err(LoggingError::Timeout {
                pending: self.pending,
            });
        }
        match self.failures.into_iter().next() {
            Some(failure) => Err(LoggingError::Io {
                wid: failure.wid,
                message: failure.message,
            }),
            None => Ok(()),
        }
    }
}

/// 인스턴스 내부 상태 (백엔드 태스크는 `Weak`로만 참조)
pub(crate) struct Core {
    me: Weak<Core>,
    level: AtomicU8,
    domain: RwLock<String>,
    policy: SharedPolicy,
    registry: WriterRegistry,
    settings: LoggingConfig,
    runtime: Mutex<Option<Runtime>>,
    closed: AtomicBool,
    slots: DashMap<WriterKind, Wid>,
}

impl Core {
    fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(Level::NoLog)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 로컬 항목 생성 및 분배
    pub(crate) fn emit(
        &self,
        level: Level,
        domain: Option<&str>,
        message: impl Into<String>,
        force_thread: bool,
    ) -> usize {
        if self.is_closed() || !self.level().admits(level) {
            return 0;
        }
        let ext = self.policy.read().ext;
        let domain = match domain {
            Some(domain) => domain.to_string(),
            None => self.domain.read().clone(),
        };
        let entry = Entry::new(level, domain, message).with_ext(ExtFields::collect(&ext, force_thread));
        self.registry.dispatch(&Arc::new(entry), self.settings.enqueue_timeout, |kind| {
            kind == WriterKind::Server
        })
    }

    /// 서버가 받은 원격 항목 재주입 (전역 레벨은 적용하지 않음)
    pub(crate) fn inject(&self, entry: Entry) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.registry
            .dispatch(&Arc::new(entry), self.settings.enqueue_timeout, |kind| kind.is_network())
    }

    /// 선택된 작성기 동기화
    fn sync_where(&self, timeout: Duration, select: impl Fn(WriterKind) -> bool) -> SyncReport {
        let deadline = deadline_after(timeout);
        let targets = self.registry.handles(|w| select(w.kind()));
        let requests: Vec<_> = targets
            .iter()
            .map(|handle| (handle.wid(), handle.request_sync(deadline)))
            .collect();

        let mut report = SyncReport::default();
        for (wid, ack) in requests {
            let drained = match ack {
                Some(rx) => rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    .is_ok(),
                None => false,
            };
            if !drained {
                report.pending.push(wid);
            }
        }

        report.failures = targets
            .iter()
            .flat_map(|handle| {
                let (wid, kind) = (handle.wid(), handle.shared.kind);
                handle
                    .shared
                    .take_errors()
                    .into_iter()
                    .map(move |message| WriterFailure { wid, kind, message })
            })
            .collect();

        if !report.is_ok() {
            warn!(
                pending = ?report.pending,
                failures = report.failures.len(),
                "동기화 미완료 또는 작성기 에러 있음"
            );
        }
        report
    }

    /// 네트워크 작성기를 제외한 로컬 작성기 동기화
    pub(crate) fn sync_local(&self, timeout: Duration) -> SyncReport {
        self.sync_where(timeout, |kind| !kind.is_network())
    }

    fn spawn_writer(&self, wid: Wid, config: WriterConfig) -> Result<Writer> {
        let handle = self
            .runtime
            .lock()
            .as_ref()
            .map(|rt| rt.handle().clone())
            .ok_or_else(|| LoggingError::Closed("인스턴스가 종료되었습니다".into()))?;
        Writer::spawn(wid, config, &handle, self.policy.clone(), &self.settings, self.me.clone())
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

/// 설정 문자열 직렬화용 뷰 (키 자료를 복제하지 않음)
#[derive(Serialize)]
struct ConfigView<'a> {
    level: Level,
    domain: &'a str,
    ext_config: ExtConfig,
    level_syms: LevelSyms,
    writers: Vec<&'a WriterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_writer: Option<&'a WriterConfig>,
}

/// 로깅 인스턴스 핸들
#[derive(Clone)]
pub struct Logging {
    core: Arc<Core>,
}

impl std::fmt::Debug for Logging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logging")
            .field("level", &self.level())
            .field("domain", &self.domain())
            .field("writers", &self.writer_ids())
            .field("closed", &self.is_shutdown())
            .finish()
    }
}

impl Logging {
    /// 기본 엔진 설정으로 인스턴스 생성
    ///
    /// `config_path`가 존재하는 파일이면 그 파일의 레벨/도메인/확장 설정이
    /// 인자를 대체하고, 파일의 작성기는 인자 작성기 뒤에 추가됩니다.
    pub fn new(
        level: Level,
        domain: Option<&str>,
        writers: Vec<WriterConfig>,
        ext: Option<ExtConfig>,
        config_path: Option<&Path>,
    ) -> Result<Self> {
        Self::with_settings(level, domain, writers, ext, config_path, LoggingConfig::default())
    }

    /// 엔진 설정을 지정해 인스턴스 생성
    pub fn with_settings(
        level: Level,
        domain: Option<&str>,
        writers: Vec<WriterConfig>,
        ext: Option<ExtConfig>,
        config_path: Option<&Path>,
        settings: LoggingConfig,
    ) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| LoggingError::Config(e.to_string()))?;
        let persisted = match config_path {
            Some(path) => PersistedConfig::load(path)?,
            None => None,
        };

        let runtime = Builder::new_multi_thread()
            .worker_threads(settings.worker_threads)
            .thread_name("loghub-worker")
            .enable_all()
            .build()
            .map_err(|e| LoggingError::Config(format!("백엔드 런타임 생성 실패: {}", e)))?;

        let mut policy = RenderPolicy {
            ext: ext.unwrap_or_default(),
            syms: LevelSyms::default(),
        };
        let mut level = level;
        let mut domain = domain.unwrap_or_default().to_string();
        let mut writers = writers;
        let mut root_writer = None;
        if let Some(saved) = persisted {
            level = saved.level;
            domain = saved.domain;
            policy.ext = saved.ext_config;
            policy.syms = saved.level_syms;
            writers.extend(saved.writers);
            root_writer = saved.root_writer;
        }

        let core = Arc::new_cyclic(|me| Core {
            me: me.clone(),
            level: AtomicU8::new(level as u8),
            domain: RwLock::new(domain),
            policy: Arc::new(RwLock::new(policy)),
            registry: WriterRegistry::new(),
            settings,
            runtime: Mutex::new(Some(runtime)),
            closed: AtomicBool::new(false),
            slots: DashMap::new(),
        });
        let logging = Logging { core };

        let setup = logging.add_writers(writers).and_then(|_| match root_writer {
            Some(config) => logging.set_root_writer(Some(config)).map(|_| ()),
            None => Ok(()),
        });
        if let Err(e) = setup {
            let _ = logging.shutdown(true);
            return Err(e);
        }

        info!(
            level = %logging.level(),
            domain = %logging.domain(),
            writers = logging.writer_ids().len(),
            "로깅 인스턴스 생성됨"
        );
        Ok(logging)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.core.is_closed() {
            return Err(LoggingError::Closed("인스턴스가 종료되었습니다".into()));
        }
        Ok(())
    }

    pub(crate) fn core(&self) -> &Arc<Core> {
        &self.core
    }

    // ---- 전역 상태 ----

    pub fn set_level(&self, level: Level) {
        self.core.level.store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self) -> Level {
        self.core.level()
    }

    pub fn set_domain(&self, domain: impl Into<String>) {
        *self.core.domain.write() = domain.into();
    }

    pub fn domain(&self) -> String {
        self.core.domain.read().clone()
    }

    /// 확장 필드 정책 교체 (이후 생성되는 항목부터 적용)
    pub fn set_ext_config(&self, ext: ExtConfig) {
        self.core.policy.write().ext = ext;
    }

    pub fn ext_config(&self) -> ExtConfig {
        self.core.policy.read().ext
    }

    pub fn set_level_syms(&self, syms: LevelSyms) {
        self.core.policy.write().syms = syms;
    }

    pub fn level_syms(&self) -> LevelSyms {
        self.core.policy.read().syms
    }

    // ---- 분배 ----

    /// 지정한 레벨로 기록하고 수락한 작성기 수를 반환 (0이면 아무도 받지 않음)
    pub fn log(&self, level: Level, message: impl Into<String>) -> usize {
        self.core.emit(level, None, message, false)
    }

    level_methods! {
        trace => Level::Trace,
        debug => Level::Debug,
        info => Level::Info,
        success => Level::Success,
        warning => Level::Warning,
        error => Level::Error,
        critical => Level::Critical,
        fatal => Level::Fatal,
        exception => Level::Exception,
    }

    // ---- 레지스트리 ----

    /// 작성기 추가 후 ID 반환
    pub fn add_writer(&self, config: WriterConfig) -> Result<Wid> {
        self.ensure_open()?;
        let wid = self.core.registry.allocate();
        let writer = self.core.spawn_writer(wid, config)?;
        self.core.registry.insert(writer);
        Ok(wid)
    }

    /// 작성기 여러 개 추가 (하나라도 실패하면 이미 추가한 것을 되돌림)
    pub fn add_writers(&self, configs: Vec<WriterConfig>) -> Result<Vec<Wid>> {
        let mut added = Vec::with_capacity(configs.len());
        for config in configs {
            match self.add_writer(config) {
                Ok(wid) => added.push(wid),
                Err(e) => {
                    for wid in added {
                        if let Ok(writer) = self.core.registry.take(wid) {
                            writer.stop(false, self.core.settings.enqueue_timeout);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(added)
    }

    /// 작성기 제거 후 설정 반환 (남은 항목은 기록한 뒤 종료)
    pub fn remove_writer(&self, wid: Wid) -> Result<WriterConfig> {
        self.take_writer(wid).map(|removed| removed.config)
    }

    /// 작성기 여러 개 제거 (알 수 없는 ID가 있으면 아무것도 제거하지 않음)
    pub fn remove_writers(&self, wids: &[Wid]) -> Result<Vec<WriterConfig>> {
        if let Some(missing) = wids.iter().find(|wid| !self.core.registry.contains(**wid)) {
            return Err(LoggingError::UnknownWriter(*missing));
        }
        wids.iter().map(|wid| self.remove_writer(*wid)).collect()
    }

    /// 작성기 제거 후 설정과 마지막 상태 반환
    pub fn take_writer(&self, wid: Wid) -> Result<RemovedWriter> {
        let writer = self.core.registry.take(wid)?;
        self.core.slots.retain(|_, slot| *slot != wid);
        let removed = writer.stop(true, self.core.settings.shutdown_timeout);
        debug!(wid, kind = %removed.status.kind, finished = removed.finished, "작성기 제거됨");
        Ok(removed)
    }

    /// 루트 작성기(wid 0) 교체 후 이전 설정 반환
    pub fn set_root_writer(&self, config: Option<WriterConfig>) -> Result<Option<WriterConfig>> {
        self.ensure_open()?;
        let previous = self
            .core
            .registry
            .take(ROOT_WID)
            .ok()
            .map(|writer| writer.stop(true, self.core.settings.shutdown_timeout).config);
        if let Some(config) = config {
            let writer = self.core.spawn_writer(ROOT_WID, config)?;
            self.core.registry.insert(writer);
        }
        Ok(previous)
    }

    pub fn enable(&self, wid: Wid) -> Result<()> {
        self.core.registry.with(wid, |w| w.shared.set_enabled(true))
    }

    pub fn disable(&self, wid: Wid) -> Result<()> {
        self.core.registry.with(wid, |w| w.shared.set_enabled(false))
    }

    /// 종류가 같은 모든 작성기 활성화 후 대상 수 반환
    pub fn enable_type(&self, kind: WriterKind) -> usize {
        self.core
            .registry
            .collect(|w| w.kind() == kind, |w| w.shared.set_enabled(true))
            .len()
    }

    pub fn disable_type(&self, kind: WriterKind) -> usize {
        self.core
            .registry
            .collect(|w| w.kind() == kind, |w| w.shared.set_enabled(false))
            .len()
    }

    pub fn set_writer_level(&self, wid: Wid, level: Level) -> Result<()> {
        self.core.registry.with_mut(wid, |w| {
            w.shared.set_level(level);
            w.config.set_level(level);
        })
    }

    /// Client/Server 작성기의 키 교체
    ///
    /// 서버는 이후 새 연결부터, 클라이언트는 다음 전송 시 재연결하며 새 키를 사용합니다.
    pub fn set_encryption(&self, wid: Wid, key: Key) -> Result<()> {
        let (material, target) = self.core.registry.with_mut(wid, |w| -> Result<_> {
            let handle = w.config.key_handle_mut().ok_or_else(|| {
                LoggingError::Config(format!("작성기 {}는 네트워크 작성기가 아닙니다", wid))
            })?;
            let replacement = KeyHandle::from_key(Some(key));
            let material = replacement.material()?;
            *handle = replacement;
            Ok((material, w.handle()))
        })??;
        if !target.enqueue(Command::SetKey(material), self.core.settings.enqueue_timeout) {
            return Err(LoggingError::Io {
                wid,
                message: "키 교체 명령을 전달하지 못했습니다".into(),
            });
        }
        Ok(())
    }

    /// 파일 작성기 강제 순환
    pub fn rotate(&self, wid: Wid) -> Result<()> {
        let target = self.core.registry.handle(wid)?;
        if target.shared.kind != WriterKind::File {
            return Err(LoggingError::Config(format!("작성기 {}는 파일 작성기가 아닙니다", wid)));
        }
        if !target.enqueue(Command::Rotate, self.core.settings.enqueue_timeout) {
            return Err(LoggingError::Io {
                wid,
                message: "순환 명령을 전달하지 못했습니다".into(),
            });
        }
        Ok(())
    }

    pub fn writer_ids(&self) -> Vec<Wid> {
        self.core.registry.collect(|_| true, |w| w.wid())
    }

    pub fn writer_status(&self, wid: Wid) -> Result<WriterStatus> {
        self.core.registry.with(wid, |w| w.status())
    }

    pub fn writer_statuses(&self) -> Vec<WriterStatus> {
        self.core.registry.collect(|_| true, |w| w.status())
    }

    /// 작성기 설정 사본 (키 자료는 지문만 남음)
    pub fn writer_config(&self, wid: Wid) -> Result<WriterConfig> {
        self.core.registry.with(wid, |w| w.config.clone())
    }

    // ---- 동기화 / 종료 ----

    /// 선택된 종류(None이면 전체)의 작성기가 비워질 때까지 대기
    pub fn sync(&self, kinds: Option<&[WriterKind]>, timeout: Duration) -> SyncReport {
        match kinds {
            Some(kinds) => self.core.sync_where(timeout, |kind| kinds.contains(&kind)),
            None => self.core.sync_where(timeout, |_| true),
        }
    }

    /// 루트 작성기를 포함한 모든 작성기 동기화
    pub fn sync_all(&self, timeout: Duration) -> SyncReport {
        self.sync(None, timeout)
    }

    /// 인스턴스 종료
    ///
    /// `now`가 false이면 모든 작성기를 동기화한 뒤 ID 순서로 정지하고,
    /// true이면 큐에 남은 항목을 버리고 짧은 시간 안에 반환합니다.
    /// 두 번째 호출부터는 아무 일도 하지 않고 성공합니다.
    pub fn shutdown(&self, now: bool) -> Result<()> {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut report = if now {
            SyncReport::default()
        } else {
            self.core.sync_where(self.core.settings.shutdown_timeout, |_| true)
        };

        let budget = if now {
            IMMEDIATE_STOP_BUDGET
        } else {
            self.core.settings.shutdown_timeout
        };
        let deadline = deadline_after(budget);
        for writer in self.core.registry.take_all() {
            let wid = writer.wid();
            let removed = writer.stop(!now, deadline.saturating_duration_since(Instant::now()));
            if !removed.finished && !report.pending.contains(&wid) {
                report.pending.push(wid);
            }
        }
        self.core.slots.clear();
        if let Some(runtime) = self.core.runtime.lock().take() {
            runtime.shutdown_background();
        }

        info!(now, "로깅 인스턴스 종료됨");
        if now {
            Ok(())
        } else {
            report.into_result()
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.core.is_closed()
    }

    // ---- 서버 조회 ----

    fn servers(&self) -> Vec<(Wid, ServerWriterConfig, Option<SocketAddr>)> {
        self.core
            .registry
            .collect(
                |w| w.kind() == WriterKind::Server,
                |w| match &w.config {
                    WriterConfig::Server(c) => Some((w.wid(), c.clone(), w.bound)),
                    _ => None,
                },
            )
            .into_iter()
            .flatten()
            .collect()
    }

    fn no_server() -> LoggingError {
        LoggingError::Config("서버 작성기가 없습니다".into())
    }

    /// 서버 작성기 설정 (주소는 실제 바인딩 주소, 키는 지문만)
    pub fn get_server_configs(&self) -> BTreeMap<Wid, ServerWriterConfig> {
        self.servers()
            .into_iter()
            .map(|(wid, mut config, bound)| {
                if let Some(bound) = bound {
                    config.address = bound.to_string();
                }
                (wid, config)
            })
            .collect()
    }

    /// ID가 가장 작은 서버 작성기 설정
    pub fn get_server_config(&self) -> Result<ServerWriterConfig> {
        self.get_server_configs()
            .into_values()
            .next()
            .ok_or_else(Self::no_server)
    }

    /// 서버 키와 같은 자료를 가진 새 키 (클라이언트 설정에 넘길 용도)
    pub fn get_server_auth_key(&self) -> Result<Key> {
        self.core
            .registry
            .collect(|w| w.kind() == WriterKind::Server, |w| w.key_material())
            .into_iter()
            .flatten()
            .next()
            .map(|material| Key::reissue(&material))
            .ok_or_else(Self::no_server)
    }

    fn bound_addresses(&self) -> BTreeMap<Wid, SocketAddr> {
        self.servers()
            .into_iter()
            .filter_map(|(wid, _, bound)| bound.map(|addr| (wid, addr)))
            .collect()
    }

    /// 첫 번째 서버의 `address:port`
    pub fn server_address_port(&self) -> Result<String> {
        self.bound_addresses()
            .into_values()
            .next()
            .map(|addr| addr.to_string())
            .ok_or_else(Self::no_server)
    }

    pub fn server_addresses(&self) -> BTreeMap<Wid, String> {
        self.bound_addresses()
            .into_iter()
            .map(|(wid, addr)| (wid, addr.ip().to_string()))
            .collect()
    }

    pub fn server_ports(&self) -> BTreeMap<Wid, u16> {
        self.bound_addresses()
            .into_iter()
            .map(|(wid, addr)| (wid, addr.port()))
            .collect()
    }

    pub fn server_addresses_ports(&self) -> BTreeMap<Wid, String> {
        self.bound_addresses()
            .into_iter()
            .map(|(wid, addr)| (wid, addr.to_string()))
            .collect()
    }

    // ---- 설정 영속화 ----

    /// 현재 레벨/도메인/확장 설정/작성기 설정의 JSON 표현
    pub fn get_config_string(&self) -> Result<String> {
        let policy = *self.core.policy.read();
        let domain = self.domain();
        let level = self.level();
        self.core.registry.read(|writers| {
            let view = ConfigView {
                level,
                domain: &domain,
                ext_config: policy.ext,
                level_syms: policy.syms,
                writers: writers
                    .values()
                    .filter(|w| w.wid() != ROOT_WID)
                    .map(|w| &w.config)
                    .collect(),
                root_writer: writers.get(&ROOT_WID).map(|w| &w.config),
            };
            serde_json::to_string_pretty(&view).map_err(LoggingError::from)
        })
    }

    pub fn persisted_config(&self) -> Result<PersistedConfig> {
        PersistedConfig::from_json(&self.get_config_string()?)
    }

    /// 현재 설정을 파일로 저장 (`config_path`로 다시 읽을 수 있음)
    pub fn save_config(&self, path: impl AsRef<Path>) -> Result<()> {
        write_config_text(path.as_ref(), &self.get_config_string()?)
    }

    // ---- 고정 슬롯 API ----

    fn replace_slot(&self, kind: WriterKind, config: Option<WriterConfig>) -> Result<Option<Wid>> {
        self.ensure_open()?;
        let previous = self.core.slots.remove(&kind).map(|(_, wid)| wid);
        if let Some(wid) = previous {
            // 레지스트리 API로 이미 제거되었을 수 있음
            let _ = self.take_writer(wid);
        }
        let Some(config) = config else {
            return Ok(None);
        };
        let wid = self.add_writer(config)?;
        self.core.slots.insert(kind, wid);
        Ok(Some(wid))
    }

    /// 고정 슬롯에 있는 작성기 ID
    pub fn slot_writer(&self, kind: WriterKind) -> Option<Wid> {
        self.core.slots.get(&kind).map(|slot| *slot)
    }

    /// 콘솔 슬롯 교체 (None이면 제거)
    pub fn set_console_writer(&self, level: Option<Level>) -> Result<Option<Wid>> {
        self.replace_slot(WriterKind::Console, level.map(|level| console_writer_config(level, true)))
    }

    pub fn set_file_writer(&self, config: Option<FileWriterConfig>) -> Result<Option<Wid>> {
        self.replace_slot(WriterKind::File, config.map(WriterConfig::File))
    }

    pub fn set_server(&self, config: Option<ServerWriterConfig>) -> Result<Option<Wid>> {
        self.replace_slot(WriterKind::Server, config.map(WriterConfig::Server))
    }

    pub fn set_client(&self, config: Option<ClientWriterConfig>) -> Result<Option<Wid>> {
        self.replace_slot(WriterKind::Client, config.map(WriterConfig::Client))
    }

    pub fn set_syslog_writer(&self, level: Option<Level>) -> Result<Option<Wid>> {
        let config = level.map(|level| {
            WriterConfig::Syslog(SyslogWriterConfig::new(level, None, None, std::process::id()))
        });
        self.replace_slot(WriterKind::Syslog, config)
    }
}
