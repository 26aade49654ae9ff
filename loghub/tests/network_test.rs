//! 클라이언트/서버 작성기 통합 테스트
//!
//! 두 인스턴스를 같은 프로세스에 띄워 루프백 주소로 주고받습니다.

mod common;

use anyhow::Result;
use common::{collector, messages};
use loghub::{
    client_writer_config, create_key, create_random_key, server_writer_config, EncryptionMethod,
    Level, Logging, LoggingError, WriterKind,
};
use std::time::Duration;

const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// 임의 포트에 서버 작성기와 수집용 콜백 작성기를 가진 인스턴스
fn start_server(method: EncryptionMethod) -> Result<(Logging, common::Received)> {
    let (sink, received) = collector(Level::NotSet);
    let key = match method {
        EncryptionMethod::None => None,
        other => Some(create_random_key(other)),
    };
    let server = Logging::new(
        Level::Info,
        Some("relay"),
        vec![server_writer_config(Level::NotSet, "127.0.0.1:0", key), sink],
        None,
        None,
    )?;
    Ok((server, received))
}

/// AES 서버와 클라이언트 사이 전송 후 sync로 도착 보장
#[test]
fn test_aes_client_delivers_to_server() -> Result<()> {
    let (server, received) = start_server(EncryptionMethod::Aes)?;
    let address = server.server_address_port()?;
    let key = server.get_server_auth_key()?;

    let client = Logging::new(
        Level::Trace,
        Some("edge"),
        vec![client_writer_config(Level::NotSet, address, Some(key))],
        None,
        None,
    )?;

    assert_eq!(client.trace("remote trace"), 1);
    assert_eq!(client.debug("remote debug"), 1);
    assert_eq!(client.info("remote info"), 1);
    assert_eq!(client.success("remote success"), 1);
    assert_eq!(client.warning("remote warning"), 1);
    assert_eq!(client.error("remote error"), 1);
    assert_eq!(client.critical("remote critical"), 1);
    assert_eq!(client.fatal("remote fatal"), 1);
    client.sync_all(SYNC_TIMEOUT).into_result()?;

    let got = received.lock().clone();
    // 서버 인스턴스 레벨(INFO)은 원격 항목에 적용되지 않으며 레벨은 그대로 전달됨
    let levels: Vec<Level> = got.iter().map(|(level, _, _)| *level).collect();
    assert_eq!(
        levels,
        vec![
            Level::Trace,
            Level::Debug,
            Level::Info,
            Level::Success,
            Level::Warning,
            Level::Error,
            Level::Critical,
            Level::Fatal,
        ]
    );
    assert!(got.iter().all(|(_, domain, _)| domain == "edge"));
    assert_eq!(got[7].2, "remote fatal");

    let status = server.writer_status(server.writer_ids()[0])?;
    assert_eq!(status.kind, WriterKind::Server);
    assert_eq!(status.connections, 1);

    client.shutdown(false)?;
    server.shutdown(false)?;
    Ok(())
}

/// 인증만 하는 평문 전송
#[test]
fn test_auth_key_plaintext_transport() -> Result<()> {
    let (server, received) = start_server(EncryptionMethod::AuthKey)?;
    let address = server.server_address_port()?;
    let key = server.get_server_auth_key()?;
    assert_eq!(key.method(), EncryptionMethod::AuthKey);

    let client = Logging::new(
        Level::Info,
        None,
        vec![client_writer_config(Level::Warning, address, Some(key))],
        None,
        None,
    )?;

    assert_eq!(client.info("filtered by client writer"), 0);
    assert_eq!(client.error("sent"), 1);
    client.sync_all(SYNC_TIMEOUT).into_result()?;
    assert_eq!(messages(&received), vec!["sent".to_string()]);

    client.shutdown(false)?;
    server.shutdown(false)?;
    Ok(())
}

/// 키가 다르면 생성 시점에 인증 에러, 서버에는 아무것도 도착하지 않음
#[test]
fn test_wrong_key_is_rejected() -> Result<()> {
    let (server, received) = start_server(EncryptionMethod::Aes)?;
    let address = server.server_address_port()?;

    let result = Logging::new(
        Level::Trace,
        None,
        vec![client_writer_config(
            Level::NotSet,
            address,
            Some(create_random_key(EncryptionMethod::Aes)),
        )],
        None,
        None,
    );
    assert!(matches!(result, Err(LoggingError::Auth(_))), "{:?}", result.err());

    server.sync_all(SYNC_TIMEOUT).into_result()?;
    assert!(received.lock().is_empty());

    server.shutdown(false)?;
    Ok(())
}

/// 연결할 수 없는 주소는 생성 에러
#[test]
fn test_unreachable_server_fails_creation() -> Result<()> {
    let (server, _) = start_server(EncryptionMethod::None)?;
    let address = server.server_address_port()?;
    server.shutdown(false)?;

    let result = Logging::new(
        Level::Trace,
        None,
        vec![client_writer_config(Level::NotSet, address, None)],
        None,
        None,
    );
    assert!(matches!(
        result,
        Err(LoggingError::WriterInit { kind: WriterKind::Client, .. })
    ));
    Ok(())
}

/// 서버가 받은 원격 항목은 다른 네트워크 작성기로 다시 나가지 않음
#[test]
fn test_remote_entries_are_not_forwarded() -> Result<()> {
    let (upstream, upstream_received) = start_server(EncryptionMethod::None)?;
    let upstream_address = upstream.server_address_port()?;

    // 서버 작성기와 상위 서버로 가는 클라이언트 작성기를 함께 가진 중계 인스턴스
    let (relay_sink, relay_received) = collector(Level::NotSet);
    let relay = Logging::new(
        Level::Trace,
        Some("middle"),
        vec![
            server_writer_config(Level::NotSet, "127.0.0.1:0", None),
            client_writer_config(Level::NotSet, upstream_address, None),
            relay_sink,
        ],
        None,
        None,
    )?;
    let relay_address = relay.server_address_port()?;

    let edge = Logging::new(
        Level::Trace,
        Some("edge"),
        vec![client_writer_config(Level::NotSet, relay_address, None)],
        None,
        None,
    )?;

    edge.info("from edge");
    edge.sync_all(SYNC_TIMEOUT).into_result()?;
    // 로컬 항목은 클라이언트 작성기와 콜백으로, 서버 작성기로는 가지 않음
    assert_eq!(relay.info("from middle"), 2);
    relay.sync_all(SYNC_TIMEOUT).into_result()?;

    assert_eq!(
        messages(&relay_received),
        vec!["from edge".to_string(), "from middle".to_string()]
    );
    assert_eq!(messages(&upstream_received), vec!["from middle".to_string()]);

    edge.shutdown(false)?;
    relay.shutdown(false)?;
    upstream.shutdown(false)?;
    Ok(())
}

/// 서버 키 교체 후에는 새 키로만 접속 가능
#[test]
fn test_server_key_rotation() -> Result<()> {
    let (server, received) = start_server(EncryptionMethod::Aes)?;
    let address = server.server_address_port()?;
    let server_wid = server.writer_ids()[0];

    let secret = [7u8; 32];
    server.set_encryption(server_wid, create_key(EncryptionMethod::Aes, &secret)?)?;
    // 키 교체 명령은 큐 순서대로 처리되므로 sync 이후에는 반영되어 있음
    server
        .sync(Some(&[WriterKind::Server]), SYNC_TIMEOUT)
        .into_result()?;
    let stale = Logging::new(
        Level::Trace,
        None,
        vec![client_writer_config(
            Level::NotSet,
            address.clone(),
            Some(create_random_key(EncryptionMethod::Aes)),
        )],
        None,
        None,
    );
    assert!(matches!(stale, Err(LoggingError::Auth(_))));

    let client = Logging::new(
        Level::Trace,
        None,
        vec![client_writer_config(
            Level::NotSet,
            address,
            Some(create_key(EncryptionMethod::Aes, &secret)?),
        )],
        None,
        None,
    )?;
    client.warning("with new key");
    client.sync_all(SYNC_TIMEOUT).into_result()?;
    assert_eq!(messages(&received), vec!["with new key".to_string()]);

    client.shutdown(false)?;
    server.shutdown(false)?;
    Ok(())
}
