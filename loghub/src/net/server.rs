//! 네트워크 서버 작성기
//!
//! 바인딩한 주소에서 클라이언트 연결을 받아 연결마다 태스크를 띄웁니다.
//! 인증을 통과한 연결에서 읽은 항목은 서버 작성기의 레벨/활성 상태를
//! 통과하면 소유 인스턴스에 재주입되어 다른 작성기로 분배됩니다.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, info, warn};

use crate::entry::Entry;
use crate::error::{LoggingError, Result};
use crate::level::Level;
use crate::net::protocol::{server_handshake, FrameCodec, NetError, WireMessage};
use crate::security::key::{Key, KeyHandle, KeyMaterial};
use crate::writer::{drain_remaining, BackendContext, Command, InitInfo, InitReporter, WriterKind};

/// 연결 수락 실패 후 다시 시도하기까지 쉬는 시간
const ACCEPT_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

/// 서버 작성기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerWriterConfig {
    pub level: Level,
    /// 바인딩 주소 (포트 0이면 임의 포트)
    pub address: String,
    #[serde(default)]
    pub key: KeyHandle,
}

impl ServerWriterConfig {
    pub fn new(level: Level, address: impl Into<String>, key: Option<Key>) -> Self {
        Self {
            level,
            address: address.into(),
            key: KeyHandle::from_key(key),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(LoggingError::Config("서버 작성기 바인딩 주소가 비어 있습니다".into()));
        }
        Ok(())
    }
}

type SharedKey = Arc<RwLock<KeyMaterial>>;

/// 서버 백엔드 태스크
pub(crate) async fn run(
    address: String,
    material: KeyMaterial,
    mut rx: mpsc::Receiver<Command>,
    ctx: BackendContext,
    init: InitReporter,
) {
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = init.send(Err(LoggingError::init(
                WriterKind::Server,
                format!("{} 바인딩 실패: {}", address, e),
            )));
            return;
        }
    };
    let bound = listener.local_addr().ok();
    let _ = init.send(Ok(InitInfo { bound }));
    info!(wid = ctx.shared.wid, bound = ?bound, method = ?material.method, "로그 서버 시작됨");

    let key: SharedKey = Arc::new(RwLock::new(material));
    let (stop_tx, stop_rx) = watch::channel(false);
    let ctx = Arc::new(ctx);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(serve_connection(stream, peer, key.clone(), ctx.clone(), stop_rx.clone()));
                }
                Err(e) => accept_failed(&ctx, e).await,
            },
            command = rx.recv() => match command {
                Some(Command::Stop) | None => break,
                Some(command) => handle(command, &key, &ctx),
            },
        }
    }
    for command in drain_remaining(&mut rx) {
        handle(command, &key, &ctx);
    }

    let _ = stop_tx.send(true);
    debug!(wid = ctx.shared.wid, "서버 작성기 태스크 종료");
}

/// 수락 실패 기록 후 `ACCEPT_BACKOFF`만큼 대기
async fn accept_failed(ctx: &BackendContext, err: std::io::Error) {
    ctx.shared.record_error(format!("연결 수락 실패: {}", err));
    time::sleep(ACCEPT_BACKOFF).await;
}

fn handle(command: Command, key: &SharedKey, ctx: &BackendContext) {
    match command {
        Command::Sync(ack) => ack.complete(),
        Command::SetKey(material) => {
            debug!(wid = ctx.shared.wid, fingerprint = %material.fingerprint(), "서버 키 교체");
            *key.write() = material;
        }
        // 로컬 항목은 서버 작성기로 분배되지 않음
        Command::Message(_) | Command::Rotate | Command::Stop => {}
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    key: SharedKey,
    ctx: Arc<BackendContext>,
    stop: watch::Receiver<bool>,
) {
    ctx.shared.connection_opened();
    debug!(wid = ctx.shared.wid, %peer, "클라이언트 연결됨");

    match session(stream, &key, &ctx, stop).await {
        Ok(()) => debug!(wid = ctx.shared.wid, %peer, "클라이언트 연결 종료"),
        Err(NetError::Rejected(reason)) => {
            warn!(wid = ctx.shared.wid, %peer, reason = %reason, "클라이언트 인증 거부");
        }
        Err(e) => warn!(wid = ctx.shared.wid, %peer, error = %e, "클라이언트 세션 에러"),
    }
    ctx.shared.connection_closed();
}

async fn session(
    stream: TcpStream,
    key: &SharedKey,
    ctx: &BackendContext,
    mut stop: watch::Receiver<bool>,
) -> std::result::Result<(), NetError> {
    stream.set_nodelay(true)?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // 핸드셰이크 시점의 키로 연결 전체를 처리
    let material = key.read().clone();
    time::timeout(
        ctx.settings.connect_timeout,
        server_handshake(&mut reader, &mut writer, &material),
    )
    .await
    .map_err(|_| NetError::Protocol("핸드셰이크 시간 초과".into()))??;
    let codec = FrameCodec::for_material(&material)?;

    loop {
        let message = tokio::select! {
            message = codec.recv(&mut reader) => message?,
            _ = stop.changed() => return Ok(()),
        };
        match message {
            None | Some(WireMessage::Bye) => return Ok(()),
            Some(WireMessage::Entry(entry)) => reinject(entry, ctx),
            Some(WireMessage::Sync { id }) => {
                sync_local(ctx).await;
                codec.send(&mut writer, &WireMessage::SyncAck { id }).await?;
            }
            Some(other) => {
                return Err(NetError::Protocol(format!("예상하지 못한 메시지: {:?}", other)));
            }
        }
    }
}

/// 받은 항목을 소유 인스턴스로 재주입
fn reinject(entry: Entry, ctx: &BackendContext) {
    if ctx.shared.is_discarding() || !ctx.shared.accepts(entry.level) {
        return;
    }
    if let Some(core) = ctx.core.upgrade() {
        core.inject(entry);
    }
}

/// 네트워크 작성기를 제외한 로컬 작성기 동기화
async fn sync_local(ctx: &BackendContext) {
    let Some(core) = ctx.core.upgrade() else {
        return;
    };
    let timeout = ctx.settings.shutdown_timeout;
    let outcome = tokio::task::spawn_blocking(move || core.sync_local(timeout)).await;
    if let Ok(report) = outcome {
        if !report.is_ok() {
            debug!(wid = ctx.shared.wid, pending = ?report.pending, "원격 동기화 중 로컬 작성기 미완료");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::client_handshake;
    use crate::security::key::EncryptionMethod;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    async fn start(key: KeyMaterial) -> (mpsc::Sender<Command>, SocketAddr, Arc<crate::writer::WriterShared>) {
        let (ctx, _done) = BackendContext::detached(WriterKind::Server, Level::Debug);
        let shared = ctx.shared.clone();
        let (tx, rx) = mpsc::channel(16);
        let (init_tx, init_rx) = std_mpsc::sync_channel(1);
        tokio::spawn(run("127.0.0.1:0".into(), key, rx, ctx, init_tx));
        let info = tokio::task::spawn_blocking(move || init_rx.recv().unwrap())
            .await
            .unwrap()
            .unwrap();
        (tx, info.bound.unwrap(), shared)
    }

    async fn handshake(addr: SocketAddr, key: &KeyMaterial) -> std::result::Result<TcpStream, NetError> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        client_handshake(&mut reader, &mut writer, key).await?;
        reader
            .into_inner()
            .reunite(writer)
            .map_err(|e| NetError::Protocol(e.to_string()))
    }

    fn material(method: EncryptionMethod, secret: &[u8]) -> KeyMaterial {
        KeyMaterial {
            method,
            secret: secret.to_vec(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bind_reports_ephemeral_port() {
        let (_tx, addr, _shared) = start(KeyMaterial::none()).await;
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bind_conflict_is_init_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = taken.local_addr().unwrap().to_string();

        let (ctx, _done) = BackendContext::detached(WriterKind::Server, Level::Debug);
        let (_tx, rx) = mpsc::channel(4);
        let (init_tx, init_rx) = std_mpsc::sync_channel(1);
        run(address, KeyMaterial::none(), rx, ctx, init_tx).await;

        assert!(matches!(
            init_rx.recv().unwrap(),
            Err(LoggingError::WriterInit { kind: WriterKind::Server, .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sync_ack_and_connection_count() {
        let key = material(EncryptionMethod::Aes, b"server-key");
        let (_tx, addr, shared) = start(key.clone()).await;

        let mut stream = handshake(addr, &key).await.unwrap();
        let codec = FrameCodec::for_material(&key).unwrap();
        let (mut reader, mut writer) = stream.split();
        codec.send(&mut writer, &WireMessage::Sync { id: 9 }).await.unwrap();
        let reply = codec.recv(&mut reader).await.unwrap();
        assert_eq!(reply, Some(WireMessage::SyncAck { id: 9 }));
        assert_eq!(shared.connections(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_set_key_applies_to_new_connections() {
        let old = material(EncryptionMethod::AuthKey, b"old");
        let (tx, addr, _shared) = start(old.clone()).await;

        tx.send(Command::SetKey(material(EncryptionMethod::AuthKey, b"new")))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(handshake(addr, &old).await, Err(NetError::Rejected(_))));
        assert!(handshake(addr, &material(EncryptionMethod::AuthKey, b"new")).await.is_ok());
    }

    #[tokio::test]
    async fn test_accept_failure_is_recorded_and_paced() {
        let (ctx, _done) = BackendContext::detached(WriterKind::Server, Level::Debug);
        let started = std::time::Instant::now();
        for _ in 0..2 {
            let err = std::io::Error::new(std::io::ErrorKind::Other, "too many open files");
            accept_failed(&ctx, err).await;
        }
        assert!(started.elapsed() >= ACCEPT_BACKOFF * 2);

        let errors = ctx.shared.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("too many open files"));
    }
}
