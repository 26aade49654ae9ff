//! 네트워크 클라이언트 작성기
//!
//! 허용된 항목을 직렬화해 서버로 전송합니다. 전송 실패 시 지수 백오프로
//! `max_retries`번까지 재연결을 시도하고, 모두 실패하면 연결을 끊긴 상태로
//! 표시한 뒤 다음 `sync`에서 에러를 보고합니다.

use serde::{Deserialize, Serialize};
use std::io;
use std::time::{Duration, Instant};
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};

use crate::entry::Entry;
use crate::error::{LoggingError, Result};
use crate::level::Level;
use crate::net::protocol::{client_handshake, FrameCodec, NetError, WireMessage};
use crate::security::key::{Key, KeyHandle, KeyMaterial};
use crate::writer::{drain_remaining, BackendContext, Command, InitInfo, InitReporter, SyncAck, WriterKind};

/// 연결이 끊긴 뒤 다음 재연결까지 기다리는 시간
const RECONNECT_COOLDOWN: Duration = Duration::from_secs(1);

/// 백오프 상한
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// 클라이언트 작성기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientWriterConfig {
    pub level: Level,
    /// 서버 주소 (`host:port`)
    pub address: String,
    #[serde(default)]
    pub key: KeyHandle,
}

impl ClientWriterConfig {
    pub fn new(level: Level, address: impl Into<String>, key: Option<Key>) -> Self {
        Self {
            level,
            address: address.into(),
            key: KeyHandle::from_key(key),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(LoggingError::Config("클라이언트 작성기 주소가 비어 있습니다".into()));
        }
        Ok(())
    }
}

/// 인증이 끝난 서버 연결
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    codec: FrameCodec,
}

fn timed_out(message: &str) -> NetError {
    NetError::Io(io::Error::new(io::ErrorKind::TimedOut, message.to_string()))
}

impl Connection {
    /// 연결 및 핸드셰이크 (단계마다 `timeout` 적용)
    async fn open(address: &str, material: &KeyMaterial, timeout: Duration) -> std::result::Result<Self, NetError> {
        let stream = time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| timed_out("연결 시간 초과"))??;
        stream.set_nodelay(true)?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        time::timeout(timeout, client_handshake(&mut reader, &mut writer, material))
            .await
            .map_err(|_| timed_out("핸드셰이크 시간 초과"))??;

        Ok(Self {
            reader,
            writer,
            codec: FrameCodec::for_material(material)?,
        })
    }

    async fn send(&mut self, message: &WireMessage) -> std::result::Result<(), NetError> {
        self.codec.send(&mut self.writer, message).await
    }

    /// Sync 요청 후 같은 ID의 SyncAck까지 대기
    async fn round_trip(&mut self, id: u64) -> std::result::Result<(), NetError> {
        self.send(&WireMessage::Sync { id }).await?;
        loop {
            match self.codec.recv(&mut self.reader).await? {
                Some(WireMessage::SyncAck { id: acked }) if acked == id => return Ok(()),
                // 이전에 시간 초과된 동기화의 늦은 응답
                Some(WireMessage::SyncAck { .. }) => continue,
                Some(other) => {
                    return Err(NetError::Protocol(format!("예상하지 못한 메시지: {:?}", other)));
                }
                None => return Err(NetError::Protocol("서버가 연결을 닫음".into())),
            }
        }
    }
}

/// 클라이언트 백엔드 상태
struct ClientState {
    address: String,
    material: KeyMaterial,
    conn: Option<Connection>,
    retry_after: Option<Instant>,
    next_sync_id: u64,
}

impl ClientState {
    fn backoff(attempt: u32) -> Duration {
        let delay = Duration::from_millis(100).saturating_mul(1 << attempt.min(5));
        delay.min(MAX_BACKOFF)
    }

    async fn try_send(&mut self, message: &WireMessage, ctx: &BackendContext) -> std::result::Result<(), NetError> {
        if self.conn.is_none() {
            let conn = Connection::open(&self.address, &self.material, ctx.settings.connect_timeout).await?;
            self.conn = Some(conn);
        }
        let Some(conn) = self.conn.as_mut() else {
            return Err(NetError::Protocol("연결 없음".into()));
        };
        let result = conn.send(message).await;
        if result.is_err() {
            self.conn = None;
        }
        result
    }

    async fn send_entry(&mut self, entry: &Entry, ctx: &BackendContext) {
        if let Some(until) = self.retry_after {
            if Instant::now() < until {
                ctx.shared.count_dropped();
                return;
            }
        }

        let message = WireMessage::Entry(entry.clone());
        let retries = ctx.settings.max_retries;
        let mut last_error = None;
        for attempt in 0..=retries {
            match self.try_send(&message, ctx).await {
                Ok(()) => {
                    if ctx.shared.is_broken() {
                        info!(wid = ctx.shared.wid, address = %self.address, "서버 재연결 성공");
                        ctx.shared.set_broken(false);
                    }
                    self.retry_after = None;
                    return;
                }
                Err(NetError::Rejected(reason)) => {
                    last_error = Some(NetError::Rejected(reason));
                    break;
                }
                Err(e) => {
                    debug!(wid = ctx.shared.wid, attempt, error = %e, "전송 실패, 재시도");
                    last_error = Some(e);
                    if attempt < retries {
                        time::sleep(Self::backoff(attempt)).await;
                    }
                }
            }
        }

        ctx.shared.set_broken(true);
        ctx.shared.count_dropped();
        self.retry_after = Some(Instant::now() + RECONNECT_COOLDOWN);
        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        ctx.shared
            .record_error(format!("{} 전송 실패 (재시도 {}회): {}", self.address, retries, reason));
    }

    async fn sync(&mut self, ack: SyncAck, ctx: &BackendContext) {
        let Some(conn) = self.conn.as_mut() else {
            ack.complete();
            return;
        };
        self.next_sync_id += 1;
        let id = self.next_sync_id;
        let deadline = time::Instant::from_std(ack.deadline);
        let outcome = time::timeout_at(deadline, conn.round_trip(id)).await;
        match outcome {
            Ok(Ok(())) => ack.complete(),
            Ok(Err(e)) => {
                self.conn = None;
                ctx.shared.set_broken(true);
                ctx.shared.record_error(format!("{} 동기화 실패: {}", self.address, e));
                ack.complete();
            }
            Err(_) => {
                // 프레임 중간에서 끊겼을 수 있으므로 연결을 새로 맺음
                warn!(wid = ctx.shared.wid, address = %self.address, "서버 동기화 응답 시간 초과");
                self.conn = None;
            }
        }
    }

    async fn handle(&mut self, command: Command, ctx: &BackendContext) {
        match command {
            Command::Message(entry) => {
                if !ctx.shared.is_discarding() {
                    self.send_entry(&entry, ctx).await;
                }
            }
            Command::Sync(ack) => self.sync(ack, ctx).await,
            Command::SetKey(material) => {
                debug!(wid = ctx.shared.wid, fingerprint = %material.fingerprint(), "클라이언트 키 교체");
                self.material = material;
                self.conn = None;
                self.retry_after = None;
            }
            Command::Rotate | Command::Stop => {}
        }
    }
}

/// 클라이언트 백엔드 태스크
pub(crate) async fn run(
    address: String,
    material: KeyMaterial,
    mut rx: mpsc::Receiver<Command>,
    ctx: BackendContext,
    init: InitReporter,
) {
    let conn = match Connection::open(&address, &material, ctx.settings.connect_timeout).await {
        Ok(conn) => conn,
        Err(e) => {
            let _ = init.send(Err(e.into_logging_error(WriterKind::Client)));
            return;
        }
    };
    let _ = init.send(Ok(InitInfo { bound: None }));
    info!(wid = ctx.shared.wid, address = %address, "서버에 연결됨");

    let mut state = ClientState {
        address,
        material,
        conn: Some(conn),
        retry_after: None,
        next_sync_id: 0,
    };

    while let Some(command) = rx.recv().await {
        if matches!(command, Command::Stop) {
            break;
        }
        state.handle(command, &ctx).await;
    }
    for command in drain_remaining(&mut rx) {
        state.handle(command, &ctx).await;
    }

    if let Some(mut conn) = state.conn.take() {
        let _ = conn.send(&WireMessage::Bye).await;
    }
    debug!(wid = ctx.shared.wid, "클라이언트 작성기 태스크 종료");
}
