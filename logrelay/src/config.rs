//! 로그 수집 데몬 환경 설정 모듈
//!
//! .env 파일과 시스템 환경변수에서 설정을 로드합니다.

use anyhow::{Context, Result};
use loghub::{
    create_key, create_random_key, file_writer_config, server_writer_config, console_writer_config,
    CompressionMethod, EncryptionMethod, Key, Level, LoggingConfig, WriterConfig,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 데몬 설정 구조체
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 수신 호스트 주소
    pub host: String,
    /// 수신 포트 번호 (0이면 임의 포트)
    pub port: u16,
    /// 인증/암호화 방식
    pub method: EncryptionMethod,
    /// hex 인코딩된 키 (없으면 무작위 생성)
    pub key_hex: Option<String>,
    /// 인스턴스 전역 레벨
    pub level: Level,
    /// 콘솔 출력 여부
    pub console: bool,
    /// 수집 로그 파일 경로
    pub log_file: Option<PathBuf>,
    /// 세그먼트 최대 크기
    pub max_size: u64,
    /// 백업 개수
    pub backlog: usize,
    /// 백업 압축 방식
    pub compression: CompressionMethod,
    /// 설정 저장 경로
    pub config_path: Option<PathBuf>,
    /// 엔진 튜닝 파라미터
    pub engine: LoggingConfig,
}

fn parse_method(value: &str) -> Result<EncryptionMethod> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Ok(EncryptionMethod::None),
        "auth" | "authkey" => Ok(EncryptionMethod::AuthKey),
        "aes" => Ok(EncryptionMethod::Aes),
        other => anyhow::bail!("알 수 없는 암호화 방식: {}", other),
    }
}

fn parse_compression(value: &str) -> Result<CompressionMethod> {
    match value.to_ascii_lowercase().as_str() {
        "store" | "none" => Ok(CompressionMethod::Store),
        "deflate" | "gzip" => Ok(CompressionMethod::Deflate),
        "zstd" => Ok(CompressionMethod::Zstd),
        "lzma" | "xz" => Ok(CompressionMethod::Lzma),
        other => anyhow::bail!("알 수 없는 압축 방식: {}", other),
    }
}

impl RelayConfig {
    /// 환경변수에서 설정을 로드합니다.
    ///
    /// 로드 순서:
    /// 1. 상위 디렉토리의 .env 파일
    /// 2. 현재 디렉토리의 .env 파일
    /// 3. 시스템 환경변수
    /// 4. 기본값
    pub fn from_env() -> Result<Self> {
        Self::load_env_file();

        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let config = Self {
            host: var("relay_host").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("relay_port")
                .map(|v| v.parse().context("relay_port 파싱 실패"))
                .transpose()?
                .unwrap_or(7400),
            method: var("relay_method")
                .map(|v| parse_method(&v))
                .transpose()?
                .unwrap_or(EncryptionMethod::Aes),
            key_hex: var("relay_key"),
            level: var("relay_level")
                .map(|v| v.parse::<Level>().map_err(|e| anyhow::anyhow!(e)))
                .transpose()?
                .unwrap_or(Level::Info),
            console: var("relay_console").map(|v| v.to_lowercase() == "true").unwrap_or(true),
            log_file: var("relay_log_file").map(PathBuf::from),
            max_size: var("relay_max_size")
                .map(|v| v.parse().context("relay_max_size 파싱 실패"))
                .transpose()?
                .unwrap_or(100 * 1024 * 1024),
            backlog: var("relay_backlog")
                .map(|v| v.parse().context("relay_backlog 파싱 실패"))
                .transpose()?
                .unwrap_or(7),
            compression: var("relay_compression")
                .map(|v| parse_compression(&v))
                .transpose()?
                .unwrap_or(CompressionMethod::Deflate),
            config_path: var("relay_config_path").map(PathBuf::from),
            engine: LoggingConfig::from_env(),
        };

        info!(
            bind = %config.bind_address(),
            method = ?config.method,
            level = %config.level,
            "로그 수집 데몬 설정 로드 완료"
        );
        Ok(config)
    }

    /// 바인딩 주소를 반환합니다.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 서버 키 준비 (설정된 키가 없으면 무작위 생성, 생성 여부 함께 반환)
    pub fn server_key(&self) -> Result<(Option<Key>, bool)> {
        if self.method == EncryptionMethod::None {
            return Ok((None, false));
        }
        match &self.key_hex {
            Some(hex_key) => {
                let bytes = hex::decode(hex_key.trim()).context("relay_key hex 디코딩 실패")?;
                let key = create_key(self.method, &bytes).context("relay_key 키 생성 실패")?;
                Ok((Some(key), false))
            }
            None => Ok((Some(create_random_key(self.method)), true)),
        }
    }

    /// 데몬 인스턴스에 등록할 작성기 설정
    pub fn writer_configs(&self, key: Option<Key>) -> Vec<WriterConfig> {
        let mut writers = vec![server_writer_config(Level::NotSet, self.bind_address(), key)];
        if self.console {
            writers.push(console_writer_config(Level::NotSet, true));
        }
        if let Some(path) = &self.log_file {
            writers.push(file_writer_config(
                Level::NotSet,
                path.clone(),
                self.max_size,
                self.backlog,
                None,
                None,
                self.compression,
            ));
        }
        writers
    }

    /// .env 파일을 로드합니다.
    fn load_env_file() {
        let env_paths = ["../.env", ".env"];

        let mut loaded = false;
        for path in env_paths {
            if Path::new(path).exists() && dotenv::from_filename(path).is_ok() {
                info!(".env 파일 로드 성공: {}", path);
                loaded = true;
                break;
            }
        }

        if !loaded {
            warn!(".env 파일을 찾을 수 없습니다. 기본값과 시스템 환경변수를 사용합니다.");
        }
    }
}

/// 설정 검증 유틸리티
pub fn validate_config(config: &RelayConfig) -> Result<()> {
    if config.host.is_empty() {
        anyhow::bail!("수신 호스트 주소가 비어있습니다");
    }

    if config.log_file.is_some() && !(1..=1000).contains(&config.backlog) {
        anyhow::bail!("유효하지 않은 백업 개수: {}", config.backlog);
    }

    config
        .engine
        .validate()
        .context("엔진 설정 검증 실패")?;

    Ok(())
}
