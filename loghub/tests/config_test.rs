//! 설정 저장/복원 통합 테스트

use anyhow::Result;
use loghub::{
    console_writer_config, create_key, file_writer_config, server_writer_config,
    CompressionMethod, EncryptionMethod, ExtConfig, Level, LevelSyms, Logging, MessageStruct,
    WriterConfig, WriterKind,
};
use std::time::Duration;
use tempfile::TempDir;

/// 저장한 설정 파일로 새 인스턴스를 만들면 같은 구성이 복원됨
#[test]
fn test_save_and_reload_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let log_path = temp_dir.path().join("logs").join("svc.log");
    let config_path = temp_dir.path().join("conf").join("logging.json");

    let original = Logging::new(
        Level::Warning,
        Some("svc"),
        vec![
            console_writer_config(Level::Error, false),
            file_writer_config(
                Level::Warning,
                &log_path,
                1024 * 1024,
                4,
                Some(Duration::from_secs(1)),
                None,
                CompressionMethod::Zstd,
            ),
        ],
        Some(ExtConfig {
            structured: MessageStruct::Json,
            ..ExtConfig::default()
        }),
        None,
    )?;
    original.set_level_syms(LevelSyms::Short);
    original.save_config(&config_path)?;
    original.shutdown(false)?;
    assert!(config_path.exists());

    // 인자로 준 레벨/도메인은 파일 내용으로 대체됨
    let restored = Logging::new(Level::Trace, Some("ignored"), Vec::new(), None, Some(&config_path))?;
    assert_eq!(restored.level(), Level::Warning);
    assert_eq!(restored.domain(), "svc");
    assert_eq!(restored.level_syms(), LevelSyms::Short);
    assert_eq!(restored.ext_config().structured, MessageStruct::Json);

    let kinds: Vec<_> = restored
        .writer_ids()
        .into_iter()
        .map(|wid| restored.writer_config(wid).map(|c| c.kind()))
        .collect::<Result<_, _>>()?;
    assert_eq!(kinds, vec![WriterKind::Console, WriterKind::File]);

    let file_wid = restored.writer_ids()[1];
    match restored.writer_config(file_wid)? {
        WriterConfig::File(file) => {
            assert_eq!(file.path, log_path);
            assert_eq!(file.backlog, 4);
            assert_eq!(file.compression, CompressionMethod::Zstd);
        }
        other => panic!("unexpected writer config: {:?}", other.kind()),
    }

    assert_eq!(restored.error("restored"), 2);
    restored.shutdown(false)?;
    Ok(())
}

/// 존재하지 않는 설정 경로는 인자를 그대로 사용
#[test]
fn test_missing_config_path_uses_arguments() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("absent.json");

    let logging = Logging::new(Level::Debug, Some("args"), Vec::new(), None, Some(&config_path))?;
    assert_eq!(logging.level(), Level::Debug);
    assert_eq!(logging.domain(), "args");
    assert!(logging.writer_ids().is_empty());
    logging.shutdown(false)?;
    Ok(())
}

/// 서버 키는 설정 파일에 보존되어 재시작 후에도 같은 키 사용
#[test]
fn test_server_key_survives_reload() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("server.json");
    let secret = [42u8; 32];

    let original = Logging::new(
        Level::Info,
        None,
        vec![server_writer_config(
            Level::NotSet,
            "127.0.0.1:0",
            Some(create_key(EncryptionMethod::Aes, &secret)?),
        )],
        None,
        None,
    )?;
    let fingerprint = original.get_server_auth_key()?.fingerprint();
    original.save_config(&config_path)?;
    original.shutdown(false)?;

    let restored = Logging::new(Level::Info, None, Vec::new(), None, Some(&config_path))?;
    assert_eq!(restored.get_server_auth_key()?.fingerprint(), fingerprint);
    restored.shutdown(false)?;
    Ok(())
}

/// 손상된 설정 파일은 설정 에러
#[test]
fn test_corrupt_config_file_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("broken.json");
    std::fs::write(&config_path, "{ not json")?;

    let result = Logging::new(Level::Info, None, Vec::new(), None, Some(&config_path));
    assert!(result.is_err());
    Ok(())
}
