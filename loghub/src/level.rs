//! 로그 레벨 정의
//!
//! 레벨은 정수 심각도로 정렬되며 `NotSet`은 모두 통과, `NoLog`는 모두 차단합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 로그 레벨 열거형
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Level {
    /// 레벨 미지정 (모든 항목 통과)
    NotSet = 0,
    /// 상세한 추적 정보
    Trace = 5,
    /// 디버깅 정보
    Debug = 10,
    /// 일반 정보
    Info = 20,
    /// 작업 성공
    Success = 25,
    /// 경고 상황 (복구 가능한 오류)
    Warning = 30,
    /// 오류 상황
    Error = 40,
    /// 심각한 오류
    Critical = 50,
    /// 시스템 중단 수준 오류
    Fatal = 55,
    /// 예외 발생
    Exception = 60,
    /// 로깅 비활성화
    NoLog = 70,
}

impl Level {
    /// 실제 로그 호출에 사용 가능한 레벨 목록 (오름차순)
    pub const ALL: [Level; 9] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Success,
        Level::Warning,
        Level::Error,
        Level::Critical,
        Level::Fatal,
        Level::Exception,
    ];

    /// 레벨을 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::NotSet => "NOTSET",
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Fatal => "FATAL",
            Level::Exception => "EXCEPTION",
            Level::NoLog => "NOLOG",
        }
    }

    /// 한 글자 기호
    pub fn as_sym(&self) -> &'static str {
        match self {
            Level::NotSet => "N",
            Level::Trace => "T",
            Level::Debug => "D",
            Level::Info => "I",
            Level::Success => "S",
            Level::Warning => "W",
            Level::Error => "E",
            Level::Critical => "C",
            Level::Fatal => "F",
            Level::Exception => "X",
            Level::NoLog => "-",
        }
    }

    /// 세 글자 약어
    pub fn as_short(&self) -> &'static str {
        match self {
            Level::NotSet => "NOT",
            Level::Trace => "TRC",
            Level::Debug => "DBG",
            Level::Info => "INF",
            Level::Success => "SCS",
            Level::Warning => "WRN",
            Level::Error => "ERR",
            Level::Critical => "CRT",
            Level::Fatal => "FTL",
            Level::Exception => "EXC",
            Level::NoLog => "NOL",
        }
    }

    /// ANSI 색상 코드 반환
    pub fn color_code(&self) -> &'static str {
        match self {
            Level::Trace | Level::NotSet | Level::NoLog => "\x1b[37m", // 흰색
            Level::Debug => "\x1b[34m",                                 // 파란색
            Level::Info => "\x1b[32m",                                  // 녹색
            Level::Success => "\x1b[36m",                               // 청록색
            Level::Warning => "\x1b[33m",                               // 노란색
            Level::Error => "\x1b[35m",                                 // 자홍색
            Level::Critical | Level::Fatal | Level::Exception => "\x1b[31m", // 빨간색
        }
    }

    /// 정수 값에서 레벨 변환 (정의되지 않은 값은 None)
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Level::NotSet),
            5 => Some(Level::Trace),
            10 => Some(Level::Debug),
            20 => Some(Level::Info),
            25 => Some(Level::Success),
            30 => Some(Level::Warning),
            40 => Some(Level::Error),
            50 => Some(Level::Critical),
            55 => Some(Level::Fatal),
            60 => Some(Level::Exception),
            70 => Some(Level::NoLog),
            _ => None,
        }
    }

    /// 이 레벨을 임계값으로 가진 대상이 `entry` 레벨 항목을 받는지 확인
    pub fn admits(&self, entry: Level) -> bool {
        *self != Level::NoLog && entry != Level::NoLog && entry >= *self
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NOTSET" => Ok(Level::NotSet),
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "SUCCESS" => Ok(Level::Success),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            "FATAL" => Ok(Level::Fatal),
            "EXCEPTION" => Ok(Level::Exception),
            "NOLOG" => Ok(Level::NoLog),
            other => Err(format!("알 수 없는 로그 레벨: {}", other)),
        }
    }
}

/// 렌더링 시 사용할 레벨 표기 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LevelSyms {
    /// 한 글자 (`D`)
    Sym,
    /// 세 글자 (`DBG`)
    Short,
    /// 전체 이름 (`DEBUG`)
    #[default]
    Str,
}

impl LevelSyms {
    /// 선택된 표기 방식으로 레벨 라벨 반환
    pub fn label(&self, level: Level) -> &'static str {
        match self {
            LevelSyms::Sym => level.as_sym(),
            LevelSyms::Short => level.as_short(),
            LevelSyms::Str => level.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        for pair in Level::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
        }
        assert!(Level::NotSet < Level::Trace);
        assert!(Level::Exception < Level::NoLog);
    }

    #[test]
    fn test_level_from_u8_roundtrip() {
        for level in Level::ALL {
            assert_eq!(Level::from_u8(level as u8), Some(level));
        }
        assert_eq!(Level::from_u8(11), None);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("warn".parse::<Level>(), Ok(Level::Warning));
        assert_eq!("Critical".parse::<Level>(), Ok(Level::Critical));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_admission() {
        assert!(Level::Warning.admits(Level::Error));
        assert!(Level::Warning.admits(Level::Warning));
        assert!(!Level::Warning.admits(Level::Info));
        assert!(!Level::NoLog.admits(Level::Exception));
        assert!(Level::NotSet.admits(Level::Trace));
    }

    #[test]
    fn test_level_syms() {
        assert_eq!(LevelSyms::Sym.label(Level::Debug), "D");
        assert_eq!(LevelSyms::Short.label(Level::Debug), "DBG");
        assert_eq!(LevelSyms::Str.label(Level::Debug), "DEBUG");
    }
}
