//! 도메인별 로거
//!
//! 고정 도메인과 자체 레벨을 가진 가벼운 핸들입니다. 대상 인스턴스를
//! 지정하지 않으면 기록 시점의 루트 인스턴스로 보냅니다.

use crate::level::Level;
use crate::logging::{level_methods, Logging};
use crate::root;

#[derive(Debug, Clone)]
pub struct Logger {
    level: Level,
    domain: String,
    target: Option<Logging>,
    thread_info: bool,
}

impl Logger {
    /// 루트 인스턴스로 기록하는 로거
    pub fn new(level: Level, domain: impl Into<String>) -> Self {
        Self {
            level,
            domain: domain.into(),
            target: None,
            thread_info: false,
        }
    }

    /// 특정 인스턴스로 기록하는 로거
    pub fn for_instance(logging: &Logging, level: Level, domain: impl Into<String>) -> Self {
        Self {
            target: Some(logging.clone()),
            ..Self::new(level, domain)
        }
    }

    /// 확장 설정과 관계없이 스레드 이름/ID 첨부
    pub fn with_thread_info(mut self, enabled: bool) -> Self {
        self.thread_info = enabled;
        self
    }

    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// 로거 레벨과 인스턴스 레벨을 모두 통과하면 기록
    pub fn log(&self, level: Level, message: impl Into<String>) -> usize {
        if !self.level.admits(level) {
            return 0;
        }
        match &self.target {
            Some(logging) => logging
                .core()
                .emit(level, Some(&self.domain), message, self.thread_info),
            None => root::with_instance(|logging| {
                logging
                    .core()
                    .emit(level, Some(&self.domain), message, self.thread_info)
            })
            .unwrap_or(0),
        }
    }

    level_methods! {
        trace => Level::Trace,
        debug => Level::Debug,
        info => Level::Info,
        success => Level::Success,
        warning => Level::Warning,
        error => Level::Error,
        critical => Level::Critical,
        fatal => Level::Fatal,
        exception => Level::Exception,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{callback_writer_config, LogSink};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_logger_applies_both_levels_and_domain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: Arc<dyn LogSink> = Arc::new(move |level: Level, domain: &str, message: &str| -> anyhow::Result<()> {
            sink_seen.lock().push((level, domain.to_string(), message.to_string()));
            Ok(())
        });
        let logging = Logging::new(
            Level::Info,
            Some("default"),
            vec![callback_writer_config(Level::NotSet, sink)],
            None,
            None,
        )
        .unwrap();

        let mut logger = Logger::for_instance(&logging, Level::Warning, "payments");
        assert_eq!(logger.info("below logger level"), 0);
        assert_eq!(logger.error("charged twice"), 1);

        logger.set_level(Level::Trace);
        // 인스턴스 레벨(INFO)이 여전히 적용됨
        assert_eq!(logger.debug("below instance level"), 0);
        assert_eq!(logger.success("refund done"), 1);

        logging.sync_all(Duration::from_secs(5)).into_result().unwrap();
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, domain, _)| domain == "payments"));
        drop(seen);
        logging.shutdown(false).unwrap();
    }

    #[test]
    fn test_root_logger_without_root_is_silent() {
        // 이 테스트 바이너리의 다른 테스트는 루트를 초기화하지 않음
        let logger = Logger::new(Level::Trace, "orphan");
        assert_eq!(logger.critical("nobody listens"), 0);
    }
}
