//! 로깅 엔진 설정 관리
//!
//! - [`LoggingConfig`]: 큐 크기와 각종 제한 시간 등 엔진 튜닝 파라미터
//! - [`PersistedConfig`]: `save_config`/`config_path`로 저장하고 읽는 인스턴스 설정

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::entry::ExtConfig;
use crate::error::{LoggingError, Result};
use crate::level::{Level, LevelSyms};
use crate::writer::WriterConfig;

/// 로깅 엔진 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 작성기별 큐 크기 (기본값: 10000)
    pub queue_size: usize,

    /// 큐가 가득 찼을 때 enqueue 대기 시간 (기본값: 10ms)
    pub enqueue_timeout: Duration,

    /// 정상 종료 시 동기화 제한 시간 (기본값: 5초)
    pub shutdown_timeout: Duration,

    /// 네트워크 연결 및 핸드셰이크 제한 시간 (기본값: 5초)
    pub connect_timeout: Duration,

    /// 클라이언트 전송 재시도 횟수 (기본값: 3)
    pub max_retries: u32,

    /// 백엔드 런타임 워커 스레드 수 (기본값: 2)
    pub worker_threads: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            queue_size: 10_000,
            enqueue_timeout: Duration::from_millis(10),
            shutdown_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            max_retries: 3,
            worker_threads: 2,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.trim().parse().ok())
}

impl LoggingConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_parse("LOGHUB_QUEUE_SIZE") {
            config.queue_size = size;
        }

        if let Some(ms) = env_parse::<u64>("LOGHUB_ENQUEUE_TIMEOUT_MS") {
            config.enqueue_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = env_parse::<u64>("LOGHUB_SHUTDOWN_TIMEOUT_MS") {
            config.shutdown_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = env_parse::<u64>("LOGHUB_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = Duration::from_millis(ms);
        }

        if let Some(retries) = env_parse("LOGHUB_MAX_RETRIES") {
            config.max_retries = retries;
        }

        if let Some(threads) = env_parse("LOGHUB_WORKER_THREADS") {
            config.worker_threads = threads;
        }

        config
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> AnyResult<()> {
        if self.queue_size == 0 {
            return Err(anyhow::anyhow!("queue_size must be greater than 0"));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(anyhow::anyhow!("shutdown_timeout must be greater than 0"));
        }

        if self.connect_timeout.is_zero() {
            return Err(anyhow::anyhow!("connect_timeout must be greater than 0"));
        }

        if self.worker_threads == 0 {
            return Err(anyhow::anyhow!("worker_threads must be greater than 0"));
        }

        Ok(())
    }
}

/// 루트 인스턴스가 설정 경로 없이 초기화될 때 찾는 파일 이름
pub const DEFAULT_CONFIG_FILE: &str = "loghub.json";

/// 읽어들일 설정 파일 크기 상한
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// `dir`에 기본 설정 파일이 있으면 그 경로
pub fn default_config_path_in(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(DEFAULT_CONFIG_FILE);
    path.is_file().then_some(path)
}

/// 작업 디렉토리의 기본 설정 파일
pub fn default_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .and_then(|dir| default_config_path_in(&dir))
}

/// 저장되는 인스턴스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub level: Level,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub ext_config: ExtConfig,
    #[serde(default)]
    pub level_syms: LevelSyms,
    #[serde(default)]
    pub writers: Vec<WriterConfig>,
    /// 루트 작성기 (wid 0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_writer: Option<WriterConfig>,
}

impl PersistedConfig {
    /// 보기 좋은 JSON 문자열
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// 파일로 저장
    pub fn save(&self, path: &Path) -> Result<()> {
        write_config_text(path, &self.to_json()?)
    }

    /// 파일에서 읽기 (파일이 없으면 None)
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let size = fs::metadata(path)
            .with_context(|| format!("설정 파일 정보 조회 실패: {}", path.display()))
            .map_err(|e| LoggingError::Config(format!("{:#}", e)))?
            .len();
        if size > MAX_CONFIG_FILE_SIZE {
            return Err(LoggingError::Config(format!(
                "설정 파일이 너무 큽니다: {} ({} 바이트)",
                path.display(),
                size
            )));
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("설정 파일 읽기 실패: {}", path.display()))
            .map_err(|e| LoggingError::Config(format!("{:#}", e)))?;
        Self::from_json(&text).map(Some)
    }
}

/// 직렬화된 설정 문자열을 파일로 기록
pub(crate) fn write_config_text(path: &Path, text: &str) -> Result<()> {
    write_file(path, text).map_err(|e| LoggingError::Config(format!("{:#}", e)))
}

fn write_file(path: &Path, text: &str) -> AnyResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("설정 디렉토리 생성 실패")?;
        }
    }
    fs::write(path, text).with_context(|| format!("설정 파일 쓰기 실패: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::console_writer_config;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.queue_size, 10_000);
        assert_eq!(config.enqueue_timeout, Duration::from_millis(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoggingConfig::default();
        config.queue_size = 0;
        assert!(config.validate().is_err());

        config.queue_size = 16;
        config.worker_threads = 0;
        assert!(config.validate().is_err());

        config.worker_threads = 1;
        config.connect_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("LOGHUB_QUEUE_SIZE", "64");
        std::env::set_var("LOGHUB_CONNECT_TIMEOUT_MS", "250");
        let config = LoggingConfig::from_env();
        std::env::remove_var("LOGHUB_QUEUE_SIZE");
        std::env::remove_var("LOGHUB_CONNECT_TIMEOUT_MS");

        assert_eq!(config.queue_size, 64);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_persisted_config_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("logging.json");

        assert!(PersistedConfig::load(&path).unwrap().is_none());

        let config = PersistedConfig {
            level: Level::Warning,
            domain: "billing".into(),
            ext_config: ExtConfig::default(),
            level_syms: LevelSyms::Short,
            writers: vec![console_writer_config(Level::Debug, false)],
            root_writer: None,
        };
        config.save(&path).unwrap();

        let loaded = PersistedConfig::load(&path).unwrap().unwrap();
        assert_eq!(loaded.level, Level::Warning);
        assert_eq!(loaded.domain, "billing");
        assert_eq!(loaded.level_syms, LevelSyms::Short);
        assert_eq!(loaded.writers.len(), 1);
    }

    #[test]
    fn test_default_config_file_lookup() {
        let dir = TempDir::new().unwrap();
        assert!(default_config_path_in(dir.path()).is_none());

        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), r#"{"level":"Info"}"#).unwrap();
        let found = default_config_path_in(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("loghub.json"));

        let loaded = PersistedConfig::load(&found).unwrap().unwrap();
        assert_eq!(loaded.level, Level::Info);
        assert!(loaded.writers.is_empty());
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.json");
        fs::write(&path, vec![b' '; (MAX_CONFIG_FILE_SIZE + 1) as usize]).unwrap();
        assert!(matches!(PersistedConfig::load(&path), Err(LoggingError::Config(_))));
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PersistedConfig::load(&path), Err(LoggingError::Config(_))));
    }
}
