//! 통합 테스트 공용 도우미

#![allow(dead_code)]

use loghub::{callback_writer_config, Level, LogSink, WriterConfig};
use parking_lot::Mutex;
use std::sync::Arc;

/// 콜백 작성기가 받은 항목 (레벨, 도메인, 메시지)
pub type Received = Arc<Mutex<Vec<(Level, String, String)>>>;

/// 받은 항목을 모으는 콜백 작성기 설정
pub fn collector(level: Level) -> (WriterConfig, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink_received = received.clone();
    let sink: Arc<dyn LogSink> = Arc::new(
        move |level: Level, domain: &str, message: &str| -> anyhow::Result<()> {
            sink_received
                .lock()
                .push((level, domain.to_string(), message.to_string()));
            Ok(())
        },
    );
    (callback_writer_config(level, sink), received)
}

/// 항목마다 지정 시간만큼 멈추는 콜백 작성기 설정
pub fn slow_sink(level: Level, delay: std::time::Duration) -> WriterConfig {
    let sink: Arc<dyn LogSink> = Arc::new(
        move |_: Level, _: &str, _: &str| -> anyhow::Result<()> {
            std::thread::sleep(delay);
            Ok(())
        },
    );
    callback_writer_config(level, sink)
}

pub fn messages(received: &Received) -> Vec<String> {
    received.lock().iter().map(|(_, _, m)| m.clone()).collect()
}
