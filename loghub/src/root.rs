//! 프로세스 전역 루트 인스턴스
//!
//! 명시적인 [`init`]/[`shutdown`] 수명 주기를 가진 싱글톤입니다.
//! 초기화 전이나 종료 후 호출은 `Closed` 에러를 반환하고, 로그 함수는 0을 반환합니다.
//!
//! 초기화 시 추가로 수행하는 일:
//! - 설정 경로가 없고 작업 디렉토리에 `loghub.json`이 있으면 그 파일을 사용
//! - 부모 프로세스가 포트 파일을 공개했고 그 서버에 연결되면 Client 작성기 추가
//! - 서버 작성기가 있으면 이 프로세스의 포트 파일 공개 (종료 시 삭제)

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::config::default_config_path;
use crate::entry::ExtConfig;
use crate::error::{LoggingError, Result};
use crate::level::Level;
use crate::lineage::{self, ParentServer};
use crate::logging::{Logging, SyncReport};
use crate::security::key::Key;
use crate::writer::{Wid, WriterConfig, WriterKind};

struct RootSlot {
    logging: Logging,
    parent: Option<ParentServer>,
    port_file: Option<PathBuf>,
}

static ROOT: Lazy<RwLock<Option<RootSlot>>> = Lazy::new(|| RwLock::new(None));

/// 루트 인스턴스 초기화 (이미 초기화되어 있으면 `Config` 에러)
pub fn init(
    level: Level,
    domain: Option<&str>,
    writers: Vec<WriterConfig>,
    ext: Option<ExtConfig>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut root = ROOT.write();
    if root.is_some() {
        return Err(LoggingError::Config("루트 인스턴스가 이미 초기화되었습니다".into()));
    }
    let default_path = match config_path {
        Some(_) => None,
        None => default_config_path(),
    };
    let logging = Logging::new(level, domain, writers, ext, config_path.or(default_path.as_deref()))?;

    let dir = std::env::temp_dir();
    let parent = lineage::parent_pid().and_then(|ppid| lineage::attach(&logging, &dir, ppid));
    let port_file = lineage::publish(&logging, &dir, std::process::id()).unwrap_or_else(|e| {
        warn!(error = %e, "서버 포트 파일을 공개하지 못함");
        None
    });

    *root = Some(RootSlot {
        logging,
        parent,
        port_file,
    });
    Ok(())
}

/// 루트 인스턴스 종료 (초기화되지 않았으면 아무 일도 하지 않음)
pub fn shutdown(now: bool) -> Result<()> {
    let taken = ROOT.write().take();
    match taken {
        Some(slot) => {
            if let Some(path) = &slot.port_file {
                lineage::retract(path);
            }
            slot.logging.shutdown(now)
        }
        None => Ok(()),
    }
}

pub fn is_initialized() -> bool {
    ROOT.read().is_some()
}

/// 루트 인스턴스 핸들 복제
pub fn instance() -> Option<Logging> {
    ROOT.read().as_ref().map(|slot| slot.logging.clone())
}

/// 잠금 밖에서 작업하도록 핸들을 복제한 뒤 실행
pub(crate) fn with_instance<T>(f: impl FnOnce(&Logging) -> T) -> Option<T> {
    instance().as_ref().map(f)
}

fn parent() -> Option<ParentServer> {
    ROOT.read().as_ref().and_then(|slot| slot.parent.clone())
}

/// 루트 인스턴스가 연결된 부모 프로세스 PID
pub fn get_parent_pid() -> Option<u32> {
    parent().map(|parent| parent.pid)
}

/// 부모 프로세스 로그 서버 주소
pub fn get_parent_server_address() -> Option<String> {
    parent().map(|parent| parent.address)
}

pub fn get_parent_pid_server_address() -> Option<(u32, String)> {
    parent().map(|parent| (parent.pid, parent.address))
}

fn with_root<T>(f: impl FnOnce(&Logging) -> Result<T>) -> Result<T> {
    with_instance(f).unwrap_or_else(|| {
        Err(LoggingError::Closed("루트 인스턴스가 초기화되지 않았습니다".into()))
    })
}

/// 루트 인스턴스에 지정 레벨로 기록
pub fn log(level: Level, message: impl Into<String>) -> usize {
    with_instance(|logging| logging.log(level, message)).unwrap_or(0)
}

macro_rules! root_level_fns {
    ($($name:ident => $level:expr),* $(,)?) => {
        $(
            #[doc = concat!("루트 인스턴스에 `", stringify!($level), "` 레벨로 기록")]
            pub fn $name(message: impl Into<String>) -> usize {
                log($level, message)
            }
        )*
    };
}

root_level_fns! {
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

pub fn set_level(level: Level) -> Result<()> {
    with_root(|logging| {
        logging.set_level(level);
        Ok(())
    })
}

pub fn add_writer(config: WriterConfig) -> Result<Wid> {
    with_root(|logging| logging.add_writer(config))
}

pub fn add_writers(configs: Vec<WriterConfig>) -> Result<Vec<Wid>> {
    with_root(|logging| logging.add_writers(configs))
}

pub fn remove_writer(wid: Wid) -> Result<WriterConfig> {
    with_root(|logging| logging.remove_writer(wid))
}

pub fn remove_writers(wids: &[Wid]) -> Result<Vec<WriterConfig>> {
    with_root(|logging| logging.remove_writers(wids))
}

pub fn set_root_writer(config: Option<WriterConfig>) -> Result<Option<WriterConfig>> {
    with_root(|logging| logging.set_root_writer(config))
}

pub fn enable(wid: Wid) -> Result<()> {
    with_root(|logging| logging.enable(wid))
}

pub fn disable(wid: Wid) -> Result<()> {
    with_root(|logging| logging.disable(wid))
}

pub fn enable_type(kind: WriterKind) -> Result<usize> {
    with_root(|logging| Ok(logging.enable_type(kind)))
}

pub fn disable_type(kind: WriterKind) -> Result<usize> {
    with_root(|logging| Ok(logging.disable_type(kind)))
}

pub fn sync(kinds: Option<&[WriterKind]>, timeout: Duration) -> Result<SyncReport> {
    with_root(|logging| Ok(logging.sync(kinds, timeout)))
}

pub fn sync_all(timeout: Duration) -> Result<SyncReport> {
    with_root(|logging| Ok(logging.sync_all(timeout)))
}

pub fn get_server_auth_key() -> Result<Key> {
    with_root(|logging| logging.get_server_auth_key())
}

pub fn get_root_server_address_port() -> Result<String> {
    with_root(|logging| logging.server_address_port())
}

pub fn get_root_server_addresses() -> Result<BTreeMap<Wid, String>> {
    with_root(|logging| Ok(logging.server_addresses()))
}

pub fn get_root_server_ports() -> Result<BTreeMap<Wid, u16>> {
    with_root(|logging| Ok(logging.server_ports()))
}

pub fn get_root_server_addresses_ports() -> Result<BTreeMap<Wid, String>> {
    with_root(|logging| Ok(logging.server_addresses_ports()))
}

pub fn get_config_string() -> Result<String> {
    with_root(|logging| logging.get_config_string())
}

pub fn save_config(path: impl AsRef<Path>) -> Result<()> {
    with_root(|logging| logging.save_config(path))
}
