//! syslog 작성기
//!
//! RFC 3164 형식 `<PRI>Mmm dd hh:mm:ss HOST TAG[PID]: MSG` 데이터그램을
//! 로컬 유닉스 소켓 또는 UDP로 전송합니다.

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::debug;

use crate::entry::{self, Entry};
use crate::error::{LoggingError, Result};
use crate::level::Level;
use crate::writer::{drain_remaining, BackendContext, Command, InitInfo, InitReporter, WriterKind};

/// 기본 facility (user)
pub const DEFAULT_FACILITY: u8 = 1;

/// 로컬 syslog 소켓 경로
pub const LOCAL_SOCKET: &str = "/dev/log";

/// syslog 전송 방식
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyslogTransport {
    /// 로컬 유닉스 데이터그램 소켓
    #[default]
    Local,
    /// 원격 UDP 주소
    Udp(String),
}

/// syslog 작성기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogWriterConfig {
    pub level: Level,
    pub hostname: Option<String>,
    pub pname: Option<String>,
    pub pid: u32,
    #[serde(default = "default_facility")]
    pub facility: u8,
    #[serde(default)]
    pub transport: SyslogTransport,
}

fn default_facility() -> u8 {
    DEFAULT_FACILITY
}

impl SyslogWriterConfig {
    pub fn new(level: Level, hostname: Option<String>, pname: Option<String>, pid: u32) -> Self {
        Self {
            level,
            hostname,
            pname,
            pid,
            facility: DEFAULT_FACILITY,
            transport: SyslogTransport::Local,
        }
    }

    pub fn with_transport(mut self, transport: SyslogTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_facility(mut self, facility: u8) -> Self {
        self.facility = facility;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.facility > 23 {
            return Err(LoggingError::Config(format!(
                "잘못된 syslog facility: {}",
                self.facility
            )));
        }
        #[cfg(not(unix))]
        if self.transport == SyslogTransport::Local {
            return Err(LoggingError::Config(
                "로컬 syslog 소켓은 유닉스에서만 지원됩니다".into(),
            ));
        }
        Ok(())
    }
}

/// 레벨을 가장 가까운 syslog 심각도로 변환
pub fn severity(level: Level) -> u8 {
    match level {
        Level::NotSet | Level::Trace | Level::Debug => 7,
        Level::Info => 6,
        Level::Success => 5,
        Level::Warning => 4,
        Level::Error => 3,
        Level::Critical => 2,
        Level::Fatal | Level::Exception | Level::NoLog => 1,
    }
}

/// RFC 3164 한 줄 생성
fn format_line(config: &SyslogWriterConfig, host: &str, tag: &str, entry: &Entry) -> String {
    let pri = config.facility as u16 * 8 + severity(entry.level) as u16;
    let time: DateTime<Local> = entry.time.into();
    let message = if entry.domain.is_empty() {
        entry.message.clone()
    } else {
        format!("{}: {}", entry.domain, entry.message)
    };
    format!(
        "<{}>{} {} {}[{}]: {}",
        pri,
        time.format("%b %e %H:%M:%S"),
        host,
        tag,
        config.pid,
        message
    )
}

enum SyslogSocket {
    #[cfg(unix)]
    Local(tokio::net::UnixDatagram),
    Udp(UdpSocket),
}

impl SyslogSocket {
    async fn connect(transport: &SyslogTransport) -> AnyResult<Self> {
        match transport {
            #[cfg(unix)]
            SyslogTransport::Local => {
                let socket = tokio::net::UnixDatagram::unbound().context("유닉스 소켓 생성 실패")?;
                socket.connect(LOCAL_SOCKET).context("로컬 syslog 연결 실패")?;
                Ok(SyslogSocket::Local(socket))
            }
            #[cfg(not(unix))]
            SyslogTransport::Local => Err(anyhow::anyhow!("로컬 syslog 미지원 플랫폼")),
            SyslogTransport::Udp(address) => {
                let socket = UdpSocket::bind("0.0.0.0:0").await.context("UDP 소켓 바인딩 실패")?;
                socket.connect(address).await.context("syslog 서버 주소 연결 실패")?;
                Ok(SyslogSocket::Udp(socket))
            }
        }
    }

    async fn send(&self, line: &[u8]) -> std::io::Result<usize> {
        match self {
            #[cfg(unix)]
            SyslogSocket::Local(socket) => socket.send(line).await,
            SyslogSocket::Udp(socket) => socket.send(line).await,
        }
    }
}

/// syslog 백엔드 태스크
pub(crate) async fn run(
    config: SyslogWriterConfig,
    mut rx: mpsc::Receiver<Command>,
    ctx: BackendContext,
    init: InitReporter,
) {
    let socket = match SyslogSocket::connect(&config.transport).await {
        Ok(socket) => socket,
        Err(e) => {
            let _ = init.send(Err(LoggingError::init(WriterKind::Syslog, format!("{:#}", e))));
            return;
        }
    };
    let _ = init.send(Ok(InitInfo { bound: None }));

    let host = config
        .hostname
        .clone()
        .unwrap_or_else(|| entry::hostname().to_string());
    let tag = config.pname.clone().unwrap_or_else(|| entry::pname().to_string());
    debug!(wid = ctx.shared.wid, transport = ?config.transport, "syslog 작성기 태스크 시작됨");

    while let Some(command) = rx.recv().await {
        if matches!(command, Command::Stop) {
            break;
        }
        handle(command, &config, &host, &tag, &socket, &ctx).await;
    }
    for command in drain_remaining(&mut rx) {
        handle(command, &config, &host, &tag, &socket, &ctx).await;
    }
    debug!(wid = ctx.shared.wid, "syslog 작성기 태스크 종료");
}

async fn handle(
    command: Command,
    config: &SyslogWriterConfig,
    host: &str,
    tag: &str,
    socket: &SyslogSocket,
    ctx: &BackendContext,
) {
    match command {
        Command::Message(entry) => {
            if ctx.shared.is_discarding() {
                return;
            }
            let line = format_line(config, host, tag, &entry);
            if let Err(e) = socket.send(line.as_bytes()).await {
                ctx.shared.count_dropped();
                ctx.shared.record_error(format!("syslog 전송 실패: {}", e));
            }
        }
        Command::Sync(ack) => ack.complete(),
        Command::Rotate | Command::SetKey(_) | Command::Stop => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc as std_mpsc, Arc};

    #[test]
    fn test_severity_mapping() {
        assert_eq!(severity(Level::Debug), 7);
        assert_eq!(severity(Level::Info), 6);
        assert_eq!(severity(Level::Success), 5);
        assert_eq!(severity(Level::Warning), 4);
        assert_eq!(severity(Level::Error), 3);
        assert_eq!(severity(Level::Critical), 2);
        assert_eq!(severity(Level::Exception), 1);
    }

    #[test]
    fn test_line_format() {
        let config = SyslogWriterConfig::new(Level::Debug, None, None, 4242);
        let entry = Entry::new(Level::Error, "db", "connection lost");
        let line = format_line(&config, "web01", "api", &entry);
        assert!(line.starts_with("<11>"));
        assert!(line.ends_with(" web01 api[4242]: db: connection lost"));
    }

    #[test]
    fn test_facility_validation() {
        let config = SyslogWriterConfig::new(Level::Info, None, None, 1).with_facility(24);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_udp_transport_delivers_datagram() {
        let collector = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = collector.local_addr().unwrap().to_string();

        let config = SyslogWriterConfig::new(Level::Debug, Some("host1".into()), Some("svc".into()), 7)
            .with_facility(16)
            .with_transport(SyslogTransport::Udp(address));
        let (ctx, _done) = BackendContext::detached(WriterKind::Syslog, Level::Debug);
        let (tx, rx) = mpsc::channel(8);
        let (init_tx, _init_rx) = std_mpsc::sync_channel(1);
        let handle = tokio::spawn(run(config, rx, ctx, init_tx));

        tx.send(Command::Message(Arc::new(Entry::new(Level::Warning, "", "disk almost full"))))
            .await
            .unwrap();
        tx.send(Command::Stop).await.unwrap();
        handle.await.unwrap();

        let mut buf = [0u8; 512];
        let n = collector.recv(&mut buf).await.unwrap();
        let line = String::from_utf8_lossy(&buf[..n]);
        // local0(16) * 8 + warning(4)
        assert!(line.starts_with("<132>"));
        assert!(line.ends_with("host1 svc[7]: disk almost full"));
    }
}
