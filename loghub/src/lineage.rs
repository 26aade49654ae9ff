//! 부모/자식 프로세스 로그 집계
//!
//! 서버 작성기를 가진 루트 인스턴스는 임시 디렉토리의 `loghub_server_port.<pid>`
//! 파일에 서버 포트와 키를 공개합니다. 자식 프로세스가 루트 인스턴스를 초기화하면
//! 부모 PID의 파일을 찾아 그 서버로 가는 Client 작성기를 추가하므로, 자식의
//! 로그가 부모 프로세스의 작성기로 모입니다.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{LoggingError, Result};
use crate::level::Level;
use crate::logging::Logging;
use crate::net::client::ClientWriterConfig;
use crate::security::key::{EncryptionMethod, KeyHandle};
use crate::writer::{Wid, WriterConfig};

const PORT_FILE_PREFIX: &str = "loghub_server_port";

/// 포트 파일 경로 (`<dir>/loghub_server_port.<pid>`)
pub fn port_file_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("{}.{}", PORT_FILE_PREFIX, pid))
}

/// 현재 프로세스의 부모 PID
pub fn parent_pid() -> Option<u32> {
    let pid = sysinfo::Pid::from_u32(std::process::id());
    let mut system = sysinfo::System::new();
    system.refresh_process(pid);
    system
        .process(pid)
        .and_then(|process| process.parent())
        .map(|parent| parent.as_u32())
}

/// 포트 파일 내용
#[derive(Serialize, Deserialize)]
struct PortRecord {
    port: u16,
    key: KeyHandle,
}

/// 연결된 부모 프로세스의 로그 서버
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentServer {
    pub pid: u32,
    /// 부모 서버 주소 (`127.0.0.1:port`)
    pub address: String,
    pub method: EncryptionMethod,
    /// 부모 서버로 보내는 Client 작성기 ID
    pub wid: Wid,
}

/// 인스턴스의 첫 번째 서버 포트와 키를 `pid`의 포트 파일로 공개
///
/// 서버 작성기가 없으면 아무것도 쓰지 않고 `None`을 반환합니다.
pub(crate) fn publish(logging: &Logging, dir: &Path, pid: u32) -> Result<Option<PathBuf>> {
    let Some(port) = logging.server_ports().into_values().next() else {
        return Ok(None);
    };
    let record = PortRecord {
        port,
        key: KeyHandle::from_key(Some(logging.get_server_auth_key()?)),
    };
    let path = port_file_path(dir, pid);
    write_private(&path, &serde_json::to_string(&record)?)?;
    debug!(path = %path.display(), port, "서버 포트 파일 공개");
    Ok(Some(path))
}

/// 키가 담기므로 유닉스에서는 소유자만 읽을 수 있게 기록
#[cfg(unix)]
fn write_private(path: &Path, text: &str) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .and_then(|mut file| std::io::Write::write_all(&mut file, text.as_bytes()))
        .map_err(|e| LoggingError::Config(format!("포트 파일 쓰기 실패: {}: {}", path.display(), e)))
}

#[cfg(not(unix))]
fn write_private(path: &Path, text: &str) -> Result<()> {
    crate::config::write_config_text(path, text)
}

/// 포트 파일을 읽어 부모 서버로 가는 Client 작성기 설정 구성
///
/// 파일이 없으면 `None`, 내용이 잘못되었으면 `Config` 에러입니다.
pub(crate) fn discover(dir: &Path, ppid: u32) -> Result<Option<ClientWriterConfig>> {
    let path = port_file_path(dir, ppid);
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)
        .map_err(|e| LoggingError::Config(format!("포트 파일 읽기 실패: {}: {}", path.display(), e)))?;
    let record: PortRecord = serde_json::from_str(&text)?;
    Ok(Some(ClientWriterConfig {
        level: Level::NotSet,
        address: format!("127.0.0.1:{}", record.port),
        key: record.key,
    }))
}

/// 부모 서버를 찾으면 인스턴스에 Client 작성기로 연결
///
/// 파일이 남아 있어도 서버에 연결할 수 없으면 부모가 없는 것으로 봅니다.
pub(crate) fn attach(logging: &Logging, dir: &Path, ppid: u32) -> Option<ParentServer> {
    let config = match discover(dir, ppid) {
        Ok(Some(config)) => config,
        Ok(None) => return None,
        Err(e) => {
            debug!(ppid, error = %e, "부모 포트 파일 무시");
            return None;
        }
    };
    let address = config.address.clone();
    let method = config.key.method();
    match logging.add_writer(WriterConfig::Client(config)) {
        Ok(wid) => {
            info!(ppid, %address, wid, "부모 프로세스 로그 서버에 연결됨");
            Some(ParentServer {
                pid: ppid,
                address,
                method,
                wid,
            })
        }
        Err(e) => {
            debug!(ppid, %address, error = %e, "부모 로그 서버에 연결할 수 없음");
            None
        }
    }
}

/// 공개했던 포트 파일 삭제
pub(crate) fn retract(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "포트 파일 삭제 실패");
    }
}
