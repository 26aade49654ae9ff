//! 로그 전송 프로토콜
//!
//! 클라이언트와 서버 간 메시지는 길이 접두 프레임으로 전송됩니다.
//!
//! # 프레임 구조
//!
//! ```text
//! [4바이트 빅엔디언 길이][본문]
//! ```
//!
//! 본문은 [`WireMessage`]의 JSON 직렬화입니다. AES 방식에서는 핸드셰이크 이후
//! 본문 전체가 `nonce(12) || AES-256-GCM(JSON)`으로 암호화됩니다.
//!
//! # 핸드셰이크
//!
//! 1. 서버 → `ServerHello { version, method, nonce }`
//! 2. 클라이언트 → `ClientHello { method, token = HMAC-SHA256(key, nonce) }`
//! 3. 서버 → `HandshakeResult { accepted, reason }`

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::entry::Entry;
use crate::error::LoggingError;
use crate::security::cipher::{auth_token, handshake_nonce, verify_token, FrameCipher};
use crate::security::key::{EncryptionMethod, KeyMaterial};

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u16 = 1;

/// 프레임 본문 최대 크기 (16MB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// 네트워크 계층 에러
#[derive(Error, Debug)]
pub enum NetError {
    #[error("연결 I/O 실패: {0}")]
    Io(#[from] std::io::Error),

    #[error("프로토콜 위반: {0}")]
    Protocol(String),

    #[error("핸드셰이크 거부: {0}")]
    Rejected(String),
}

impl NetError {
    /// 작성기 생성 시점 에러로 변환
    pub(crate) fn into_logging_error(self, kind: crate::writer::WriterKind) -> LoggingError {
        match self {
            NetError::Rejected(reason) => LoggingError::Auth(reason),
            NetError::Protocol(reason) => LoggingError::Protocol(reason),
            NetError::Io(e) => LoggingError::init(kind, e),
        }
    }
}

/// 전송 메시지
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// 서버 인사 (서버 → 클라이언트)
    ServerHello {
        version: u16,
        method: EncryptionMethod,
        nonce: Vec<u8>,
    },
    /// 클라이언트 인증 (클라이언트 → 서버)
    ClientHello {
        method: EncryptionMethod,
        token: Vec<u8>,
    },
    /// 핸드셰이크 결과 (서버 → 클라이언트)
    HandshakeResult {
        accepted: bool,
        reason: Option<String>,
    },
    /// 로그 항목
    Entry(Entry),
    /// 동기화 요청
    Sync { id: u64 },
    /// 동기화 완료
    SyncAck { id: u64 },
    /// 정상 종료 알림
    Bye,
}

impl WireMessage {
    /// JSON 본문으로 직렬화
    pub fn to_bytes(&self) -> Result<Vec<u8>, NetError> {
        serde_json::to_vec(self).map_err(|e| NetError::Protocol(format!("직렬화 실패: {}", e)))
    }

    /// JSON 본문에서 역직렬화
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NetError> {
        serde_json::from_slice(bytes).map_err(|e| NetError::Protocol(format!("역직렬화 실패: {}", e)))
    }
}

/// 길이 접두 프레임 쓰기
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<(), NetError> {
    if body.len() > MAX_FRAME_LEN {
        return Err(NetError::Protocol(format!("프레임이 너무 큽니다: {} 바이트", body.len())));
    }
    let mut frame = BytesMut::with_capacity(4 + body.len());
    frame.put_u32(body.len() as u32);
    frame.put_slice(body);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// 길이 접두 프레임 읽기 (프레임 경계에서 연결이 닫히면 None)
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, NetError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(NetError::Protocol(format!("프레임이 너무 큽니다: {} 바이트", len)));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// 핸드셰이크 이후 메시지 송수신기
pub(crate) struct FrameCodec {
    cipher: Option<FrameCipher>,
}

impl FrameCodec {
    /// 키 자료에 맞는 코덱 (AES일 때만 암호화)
    pub fn for_material(material: &KeyMaterial) -> Result<Self, NetError> {
        let cipher = match material.method {
            EncryptionMethod::Aes => Some(
                FrameCipher::new(material).map_err(|e| NetError::Protocol(format!("{:#}", e)))?,
            ),
            EncryptionMethod::None | EncryptionMethod::AuthKey => None,
        };
        Ok(Self { cipher })
    }

    pub async fn send<W: AsyncWrite + Unpin>(&self, writer: &mut W, message: &WireMessage) -> Result<(), NetError> {
        let body = message.to_bytes()?;
        match &self.cipher {
            Some(cipher) => {
                let sealed = cipher.seal(&body).map_err(|e| NetError::Protocol(format!("{:#}", e)))?;
                write_frame(writer, &sealed).await
            }
            None => write_frame(writer, &body).await,
        }
    }

    pub async fn recv<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<Option<WireMessage>, NetError> {
        let Some(body) = read_frame(reader).await? else {
            return Ok(None);
        };
        let plain = match &self.cipher {
            Some(cipher) => cipher.open(&body).map_err(|e| NetError::Protocol(format!("{:#}", e)))?,
            None => body,
        };
        WireMessage::from_bytes(&plain).map(Some)
    }
}

/// 평문 핸드셰이크 메시지 읽기
async fn recv_plain<R: AsyncRead + Unpin>(reader: &mut R) -> Result<WireMessage, NetError> {
    match read_frame(reader).await? {
        Some(body) => WireMessage::from_bytes(&body),
        None => Err(NetError::Protocol("핸드셰이크 중 연결이 닫힘".into())),
    }
}

async fn send_plain<W: AsyncWrite + Unpin>(writer: &mut W, message: &WireMessage) -> Result<(), NetError> {
    write_frame(writer, &message.to_bytes()?).await
}

/// 서버 측 핸드셰이크
pub(crate) async fn server_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    material: &KeyMaterial,
) -> Result<(), NetError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let nonce = handshake_nonce();
    let hello = WireMessage::ServerHello {
        version: PROTOCOL_VERSION,
        method: material.method,
        nonce: nonce.clone(),
    };
    send_plain(writer, &hello).await?;

    let rejection = match recv_plain(reader).await? {
        WireMessage::ClientHello { method, token } => {
            if method != material.method {
                Some(format!(
                    "암호화 방식 불일치: 서버 {:?}, 클라이언트 {:?}",
                    material.method, method
                ))
            } else if material.method != EncryptionMethod::None
                && !verify_token(material, &nonce, &token)
            {
                Some("인증 토큰 불일치".to_string())
            } else {
                None
            }
        }
        other => Some(format!("예상하지 못한 메시지: {:?}", other)),
    };

    let result = WireMessage::HandshakeResult {
        accepted: rejection.is_none(),
        reason: rejection.clone(),
    };
    send_plain(writer, &result).await?;
    match rejection {
        Some(reason) => Err(NetError::Rejected(reason)),
        None => Ok(()),
    }
}

/// 클라이언트 측 핸드셰이크
pub(crate) async fn client_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    material: &KeyMaterial,
) -> Result<(), NetError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let nonce = match recv_plain(reader).await? {
        WireMessage::ServerHello { version, nonce, .. } if version == PROTOCOL_VERSION => nonce,
        WireMessage::ServerHello { version, .. } => {
            return Err(NetError::Protocol(format!("지원하지 않는 프로토콜 버전: {}", version)));
        }
        other => return Err(NetError::Protocol(format!("예상하지 못한 메시지: {:?}", other))),
    };

    let token = match material.method {
        EncryptionMethod::None => Vec::new(),
        EncryptionMethod::AuthKey | EncryptionMethod::Aes => auth_token(material, &nonce),
    };
    let hello = WireMessage::ClientHello {
        method: material.method,
        token,
    };
    send_plain(writer, &hello).await?;

    match recv_plain(reader).await? {
        WireMessage::HandshakeResult { accepted: true, .. } => Ok(()),
        WireMessage::HandshakeResult { reason, .. } => Err(NetError::Rejected(
            reason.unwrap_or_else(|| "서버가 연결을 거부함".to_string()),
        )),
        other => Err(NetError::Protocol(format!("예상하지 못한 메시지: {:?}", other))),
    }
}
