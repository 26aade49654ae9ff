//! 로그 수집 데몬
//!
//! 원격 클라이언트 작성기가 보낸 로그를 받아 콘솔과 순환 파일로 기록합니다.
//!
//! 환경변수:
//! - relay_host / relay_port: 수신 주소 (기본값: 127.0.0.1:7400)
//! - relay_method: none | auth | aes (기본값: aes)
//! - relay_key: hex 키 (없으면 무작위 생성)
//! - relay_level: 전역 레벨 (기본값: INFO)
//! - relay_console: 콘솔 출력 여부 (기본값: true)
//! - relay_log_file / relay_max_size / relay_backlog / relay_compression: 파일 기록
//! - relay_config_path: 시작 후 현재 설정을 저장할 경로
//! - LOGHUB_*: 엔진 튜닝 파라미터

use anyhow::{Context, Result};
use loghub::Logging;
use std::time::Duration;
use tracing::{error, info, warn};

mod config;

use config::{validate_config, RelayConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // 환경 설정 로드
    let config = RelayConfig::from_env()?;

    // 설정 검증
    validate_config(&config)?;

    let (key, generated) = config.server_key()?;
    let fingerprint = key.as_ref().map(|k| k.fingerprint());
    let writers = config.writer_configs(key);

    // 인스턴스 생성은 백엔드 초기화를 기다리므로 블로킹 스레드에서 수행
    let setup = config.clone();
    let logging = tokio::task::spawn_blocking(move || {
        Logging::with_settings(setup.level, Some("logrelay"), writers, None, None, setup.engine)
    })
    .await
    .context("인스턴스 생성 태스크 실패")?
    .context("로깅 인스턴스 생성 실패")?;

    let bound = logging
        .server_address_port()
        .context("서버 바인딩 주소 조회 실패")?;

    info!("=== 로그 수집 데몬 ===");
    info!("수신 주소: {}", bound);
    info!("암호화 방식: {:?}", config.method);
    if let Some(fingerprint) = &fingerprint {
        info!("키 지문: {}", fingerprint);
    }
    info!("======================");

    if let Some(path) = &config.config_path {
        match logging.save_config(path) {
            Ok(()) => info!(path = %path.display(), "현재 설정 저장 완료"),
            Err(e) => error!(path = %path.display(), error = %e, "설정 저장 실패"),
        }
    } else if generated {
        warn!("무작위 키가 생성되었지만 relay_config_path가 없어 클라이언트에 키를 전달할 수 없습니다");
    }

    // 종료 시그널 대기
    tokio::signal::ctrl_c().await?;
    info!("종료 시그널 수신, 데몬을 중지합니다...");

    let shutdown = logging.clone();
    let result = tokio::task::spawn_blocking(move || shutdown.shutdown(false))
        .await
        .context("종료 태스크 실패")?;

    match result {
        Ok(()) => info!("✅ 로그 수집 데몬이 정상 종료되었습니다"),
        Err(e) => {
            warn!(error = %e, "일부 작성기가 제한 시간 안에 비워지지 않았습니다");
            let statuses = logging.writer_statuses();
            if !statuses.is_empty() {
                warn!(remaining = statuses.len(), "남은 작성기");
            }
        }
    }

    // 런타임 종료 전 잠시 대기하여 로그 출력 마무리
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
