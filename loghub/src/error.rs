//! 로깅 엔진 에러 정의
//!
//! 생성 시점 에러는 호출자에게 즉시 반환되고, 백엔드 태스크에서 발생한
//! 정상 운영 중 에러는 작성기에 기록되었다가 다음 `sync` 또는 상태 조회 시
//! 드러납니다. 어떤 에러도 프로세스를 종료시키지 않습니다.

use thiserror::Error;

use crate::writer::{WriterKind, Wid};

/// 로깅 엔진 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// 잘못된 설정 또는 도달할 수 없는 백엔드 대상
    #[error("설정 오류: {0}")]
    Config(String),

    /// 백엔드 생성 실패 (파일 열기, 주소 바인딩, 연결 등)
    #[error("{kind} 작성기 생성 실패: {message}")]
    WriterInit { kind: WriterKind, message: String },

    /// 존재하지 않는 작성기 ID
    #[error("알 수 없는 작성기: {0}")]
    UnknownWriter(Wid),

    /// 네트워크 핸드셰이크 인증 실패
    #[error("인증 실패: {0}")]
    Auth(String),

    /// 정상 운영 중 파일/소켓 에러
    #[error("작성기 {wid} I/O 에러: {message}")]
    Io { wid: Wid, message: String },

    /// 제한 시간 내에 비워지지 않은 작성기 목록
    #[error("타임아웃: 작성기 {pending:?} 동기화 미완료")]
    Timeout { pending: Vec<Wid> },

    /// 이미 소비된 키 재사용 시도
    #[error("키 재사용: 키 {0} 는 이미 다른 설정에 사용됨")]
    KeyReuse(String),

    /// 잘못된 프레임 또는 핸드셰이크 메시지
    #[error("프로토콜 오류: {0}")]
    Protocol(String),

    /// 종료되었거나 초기화되지 않은 인스턴스
    #[error("로깅 인스턴스 사용 불가: {0}")]
    Closed(String),
}

impl LoggingError {
    /// 작성기 생성 에러 헬퍼
    pub(crate) fn init(kind: WriterKind, err: impl std::fmt::Display) -> Self {
        LoggingError::WriterInit {
            kind,
            message: err.to_string(),
        }
    }

    /// 호출자가 다시 시도해 볼 수 있는 에러인지 확인
    pub fn is_transient(&self) -> bool {
        matches!(self, LoggingError::Io { .. } | LoggingError::Timeout { .. })
    }
}

/// 로깅 엔진 결과 타입
pub type Result<T> = std::result::Result<T, LoggingError>;

impl From<std::io::Error> for LoggingError {
    fn from(err: std::io::Error) -> Self {
        LoggingError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LoggingError {
    fn from(err: serde_json::Error) -> Self {
        LoggingError::Config(format!("JSON 처리 실패: {}", err))
    }
}
