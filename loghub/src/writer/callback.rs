//! 콜백 작성기
//!
//! 허용된 항목마다 외부 [`LogSink`]를 블로킹 스레드 풀에서 호출합니다.
//! 백엔드 태스크는 호출이 끝날 때까지 기다리므로 항목 순서는 유지됩니다.
//! 싱크가 에러를 반환하거나 패닉하면 작성기 에러로 기록되고 전파되지 않습니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task;
use tracing::debug;

use crate::entry::Entry;
use crate::error::{LoggingError, Result};
use crate::level::Level;
use crate::writer::{drain_remaining, BackendContext, Command, InitInfo, InitReporter};

/// 외부 로그 싱크
pub trait LogSink: Send + Sync {
    /// 항목 하나 전달
    fn emit(&self, level: Level, domain: &str, message: &str) -> anyhow::Result<()>;
}

impl<F> LogSink for F
where
    F: Fn(Level, &str, &str) -> anyhow::Result<()> + Send + Sync,
{
    fn emit(&self, level: Level, domain: &str, message: &str) -> anyhow::Result<()> {
        self(level, domain, message)
    }
}

/// 콜백 작성기 설정
///
/// 싱크는 영속화되지 않으므로 설정 파일에서 읽은 콜백 설정은 싱크를 다시
/// 지정해야 등록할 수 있습니다.
#[derive(Clone, Serialize, Deserialize)]
pub struct CallbackWriterConfig {
    pub level: Level,
    #[serde(skip)]
    pub sink: Option<Arc<dyn LogSink>>,
}

impl CallbackWriterConfig {
    pub fn new(level: Level, sink: Arc<dyn LogSink>) -> Self {
        Self {
            level,
            sink: Some(sink),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.sink.is_none() {
            return Err(LoggingError::Config("콜백 작성기에 싱크가 지정되지 않았습니다".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for CallbackWriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackWriterConfig")
            .field("level", &self.level)
            .field("sink", &self.sink.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

/// 콜백 백엔드 태스크
pub(crate) async fn run(
    config: CallbackWriterConfig,
    mut rx: mpsc::Receiver<Command>,
    ctx: BackendContext,
    init: InitReporter,
) {
    let Some(sink) = config.sink else {
        let _ = init.send(Err(LoggingError::Config("콜백 싱크 없음".into())));
        return;
    };
    let _ = init.send(Ok(InitInfo { bound: None }));

    while let Some(command) = rx.recv().await {
        if matches!(command, Command::Stop) {
            break;
        }
        handle(command, &sink, &ctx).await;
    }
    for command in drain_remaining(&mut rx) {
        handle(command, &sink, &ctx).await;
    }
    debug!(wid = ctx.shared.wid, "콜백 작성기 태스크 종료");
}

async fn handle(command: Command, sink: &Arc<dyn LogSink>, ctx: &BackendContext) {
    match command {
        Command::Message(entry) => {
            if ctx.shared.is_discarding() {
                return;
            }
            let sink = sink.clone();
            let outcome = task::spawn_blocking(move || invoke(sink.as_ref(), &entry)).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(message)) => ctx.shared.record_error(message),
                Err(e) => ctx.shared.record_error(format!("콜백 실행 실패: {}", e)),
            }
        }
        Command::Sync(ack) => ack.complete(),
        Command::Rotate | Command::SetKey(_) | Command::Stop => {}
    }
}

fn invoke(sink: &dyn LogSink, entry: &Entry) -> std::result::Result<(), String> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        sink.emit(entry.level, &entry.domain, &entry.message)
    }));
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("콜백 실패: {:#}", e)),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "알 수 없는 패닉".to_string());
            Err(format!("콜백 패닉: {}", reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{WriterKind, WriterShared};
    use parking_lot::Mutex;
    use std::sync::mpsc as std_mpsc;

    async fn feed(sink: Arc<dyn LogSink>, entries: Vec<Entry>) -> Arc<WriterShared> {
        let (ctx, _done) = BackendContext::detached(WriterKind::Callback, Level::Debug);
        let shared = ctx.shared.clone();
        let (tx, rx) = mpsc::channel(16);
        let (init_tx, _init_rx) = std_mpsc::sync_channel(1);
        for entry in entries {
            tx.send(Command::Message(Arc::new(entry))).await.unwrap();
        }
        tx.send(Command::Stop).await.unwrap();
        run(CallbackWriterConfig::new(Level::Debug, sink), rx, ctx, init_tx).await;
        shared
    }

    #[tokio::test]
    async fn test_sink_receives_level_domain_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: Arc<dyn LogSink> = Arc::new(move |level: Level, domain: &str, message: &str| -> anyhow::Result<()> {
            sink_seen.lock().push((level, domain.to_string(), message.to_string()));
            Ok(())
        });

        feed(sink, vec![Entry::new(Level::Info, "app", "hello"), Entry::new(Level::Error, "db", "down")]).await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], (Level::Error, "db".to_string(), "down".to_string()));
    }

    #[tokio::test]
    async fn test_failures_and_panics_become_writer_errors() {
        let sink: Arc<dyn LogSink> = Arc::new(|_: Level, _: &str, message: &str| -> anyhow::Result<()> {
            if message == "boom" {
                panic!("sink exploded");
            }
            Err(anyhow::anyhow!("rejected {}", message))
        });

        let shared = feed(sink, vec![Entry::new(Level::Info, "app", "boom"), Entry::new(Level::Info, "app", "x")]).await;

        let errors = shared.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("sink exploded"));
        assert!(errors[1].contains("rejected x"));
    }

    #[tokio::test]
    async fn test_slow_sink_runs_off_the_runtime_thread() {
        let sink: Arc<dyn LogSink> = Arc::new(|_: Level, _: &str, _: &str| -> anyhow::Result<()> {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok(())
        });
        let (ctx, _done) = BackendContext::detached(WriterKind::Callback, Level::Debug);
        let (tx, rx) = mpsc::channel(4);
        let (init_tx, _init_rx) = std_mpsc::sync_channel(1);
        tx.send(Command::Message(Arc::new(Entry::new(Level::Info, "app", "slow"))))
            .await
            .unwrap();
        tx.send(Command::Stop).await.unwrap();
        let backend = tokio::spawn(run(CallbackWriterConfig::new(Level::Debug, sink), rx, ctx, init_tx));

        // 단일 스레드 런타임에서도 싱크가 도는 동안 다른 태스크가 진행됨
        let started = std::time::Instant::now();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(started.elapsed() < std::time::Duration::from_millis(250));

        backend.await.unwrap();
    }

    #[test]
    fn test_config_without_sink_is_invalid() {
        let json = r#"{"level":"Info"}"#;
        let config: CallbackWriterConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }
}
