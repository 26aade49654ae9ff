//! 다중 백엔드 로깅 엔진
//!
//! 레벨 필터링을 거친 로그 항목을 여러 작성기(콘솔, 순환/압축 파일,
//! 인증 및 암호화 네트워크 클라이언트/서버, syslog, 콜백)로 분배합니다.
//!
//! # 주요 기능
//! - **작성기 레지스트리**: ID 기반 추가/제거/활성화/레벨 변경
//! - **비동기 전달**: 작성기마다 제한 큐와 백엔드 태스크 하나
//! - **파일 순환**: 크기/시간 기준 순환, gzip/zstd/xz 압축, 백업 개수 제한
//! - **네트워크 전송**: HMAC 핸드셰이크 인증, 선택적 AES-256-GCM 프레임 암호화
//! - **동기화 보장**: 제한 시간 있는 `sync`, 정상/즉시 `shutdown`
//! - **프로세스 간 집계**: 자식 프로세스의 루트 로그를 부모 프로세스 서버로 전달
//!
//! # 사용 예시
//! ```no_run
//! use loghub::{console_writer_config, file_writer_config, CompressionMethod, Level, Logging};
//! use std::time::Duration;
//!
//! fn main() -> loghub::Result<()> {
//!     let logging = Logging::new(
//!         Level::Debug,
//!         Some("app"),
//!         vec![
//!             console_writer_config(Level::Debug, true),
//!             file_writer_config(Level::Warning, "./logs/app.log", 10 * 1024 * 1024, 5, None, None, CompressionMethod::Deflate),
//!         ],
//!         None,
//!         None,
//!     )?;
//!
//!     logging.info("서버 시작");
//!     logging.error("연결 실패");
//!
//!     logging.sync_all(Duration::from_secs(5)).into_result()?;
//!     logging.shutdown(false)
//! }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod level;
pub mod lineage;
pub mod logger;
pub mod logging;
pub mod net;
mod registry;
pub mod root;
pub mod security;
pub mod writer;

pub use config::{LoggingConfig, PersistedConfig};
pub use entry::{Entry, ExtConfig, ExtFields, MessageStruct};
pub use error::{LoggingError, Result};
pub use level::{Level, LevelSyms};
pub use lineage::ParentServer;
pub use logger::Logger;
pub use logging::{Logging, SyncReport, WriterFailure};
pub use net::{ClientWriterConfig, ServerWriterConfig};
pub use security::{create_key, create_random_key, EncryptionMethod, Key};
pub use writer::{
    callback_writer_config, client_writer_config, console_writer_config, file_writer_config,
    server_writer_config, syslog_writer_config, CallbackWriterConfig, CompressionMethod,
    ConsoleTarget, ConsoleWriterConfig, FileWriterConfig, LogSink, RemovedWriter,
    SyslogTransport, SyslogWriterConfig, Wid, WriterConfig, WriterKind, WriterStatus, ROOT_WID,
};
