//! 루트 인스턴스 수명 주기 테스트
//!
//! 프로세스 전역 상태를 다루므로 하나의 테스트 함수에서 순서대로 검사합니다.

mod common;

use anyhow::Result;
use common::{collector, messages, slow_sink};
use loghub::{root, server_writer_config, Level, Logger, LoggingError};
use std::time::{Duration, Instant};

#[test]
fn test_root_lifecycle() -> Result<()> {
    // 초기화 전
    assert!(!root::is_initialized());
    assert_eq!(root::info("dropped"), 0);
    assert!(matches!(root::set_level(Level::Debug), Err(LoggingError::Closed(_))));
    assert!(matches!(root::get_config_string(), Err(LoggingError::Closed(_))));
    assert!(root::shutdown(false).is_ok());
    assert!(root::get_parent_pid().is_none());

    let (sink, received) = collector(Level::NotSet);
    root::init(Level::Info, Some("root"), vec![sink], None, None)?;
    assert!(root::is_initialized());

    // 두 번째 초기화는 거부
    let (second, _) = collector(Level::NotSet);
    assert!(matches!(
        root::init(Level::Info, None, vec![second], None, None),
        Err(LoggingError::Config(_))
    ));

    assert_eq!(root::debug("below level"), 0);
    assert_eq!(root::warning("root warning"), 1);
    root::set_level(Level::Trace)?;
    assert_eq!(root::trace("now admitted"), 1);

    // 대상 없는 로거는 기록 시점의 루트로 전달
    let logger = Logger::new(Level::Info, "worker");
    assert_eq!(logger.info("from logger"), 1);

    root::sync_all(Duration::from_secs(5))?.into_result()?;
    {
        let got = received.lock();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].1, "root");
        assert_eq!(got[2].1, "worker");
    }

    let wid = root::add_writer(loghub::console_writer_config(Level::Critical, false))?;
    assert_eq!(root::disable_type(loghub::WriterKind::Console)?, 1);
    root::remove_writer(wid)?;

    root::shutdown(false)?;
    assert!(!root::is_initialized());
    assert_eq!(root::info("after shutdown"), 0);
    assert_eq!(logger.error("after shutdown"), 0);
    assert_eq!(
        messages(&received),
        vec![
            "root warning".to_string(),
            "now admitted".to_string(),
            "from logger".to_string()
        ]
    );

    // 오래 걸리는 루트 호출이 진행 중이어도 종료는 기다리지 않음
    root::init(
        Level::Trace,
        None,
        vec![slow_sink(Level::NotSet, Duration::from_millis(200))],
        None,
        None,
    )?;
    for i in 0..20 {
        root::info(format!("slow {}", i));
    }
    let syncer = std::thread::spawn(|| root::sync_all(Duration::from_secs(10)));
    std::thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    root::shutdown(true)?;
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "root shutdown waited {:?}",
        started.elapsed()
    );
    let _ = syncer.join().expect("sync thread panicked");
    assert!(!root::is_initialized());

    // 종료 후 다시 초기화 가능, 서버 작성기가 있으면 포트 파일 공개
    let port_file = loghub::lineage::port_file_path(&std::env::temp_dir(), std::process::id());
    let (again, _) = collector(Level::NotSet);
    root::init(
        Level::Info,
        None,
        vec![again, server_writer_config(Level::NotSet, "127.0.0.1:0", None)],
        None,
        None,
    )?;
    assert!(port_file.exists());
    // 테스트 러너는 로그 서버를 공개하지 않으므로 부모 연결 없음
    assert!(root::get_parent_server_address().is_none());
    assert!(root::get_parent_pid_server_address().is_none());

    root::shutdown(true)?;
    assert!(!port_file.exists());
    Ok(())
}
