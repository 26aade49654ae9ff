//! 작성기 레지스트리
//!
//! `wid -> Writer` 매핑을 단일 잠금으로 보호합니다. 잠금은 ID 할당, 조회,
//! 삽입/제거 동안에만 잡히며 백엔드 종료 대기나 동기화 대기 중에는
//! 잡히지 않습니다.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::entry::Entry;
use crate::error::{LoggingError, Result};
use crate::writer::{Wid, Writer, WriterHandle, WriterKind, ROOT_WID};

pub(crate) struct WriterRegistry {
    writers: RwLock<BTreeMap<Wid, Writer>>,
    next_wid: AtomicUsize,
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self {
            writers: RwLock::new(BTreeMap::new()),
            next_wid: AtomicUsize::new(ROOT_WID + 1),
        }
    }

    /// 단조 증가하는 새 ID 할당
    pub fn allocate(&self) -> Wid {
        self.next_wid.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, writer: Writer) -> Option<Writer> {
        self.writers.write().insert(writer.wid(), writer)
    }

    /// 작성기를 레지스트리에서 분리
    pub fn take(&self, wid: Wid) -> Result<Writer> {
        self.writers
            .write()
            .remove(&wid)
            .ok_or(LoggingError::UnknownWriter(wid))
    }

    /// 모든 작성기를 ID 순서로 분리
    pub fn take_all(&self) -> Vec<Writer> {
        std::mem::take(&mut *self.writers.write()).into_values().collect()
    }

    pub fn contains(&self, wid: Wid) -> bool {
        self.writers.read().contains_key(&wid)
    }

    /// 작성기 하나에 대해 읽기 작업 수행
    pub fn with<T>(&self, wid: Wid, f: impl FnOnce(&Writer) -> T) -> Result<T> {
        self.writers
            .read()
            .get(&wid)
            .map(f)
            .ok_or(LoggingError::UnknownWriter(wid))
    }

    /// 작성기 하나에 대해 수정 작업 수행
    pub fn with_mut<T>(&self, wid: Wid, f: impl FnOnce(&mut Writer) -> T) -> Result<T> {
        self.writers
            .write()
            .get_mut(&wid)
            .map(f)
            .ok_or(LoggingError::UnknownWriter(wid))
    }

    /// 읽기 잠금 아래에서 전체 매핑 조회
    pub fn read<T>(&self, f: impl FnOnce(&BTreeMap<Wid, Writer>) -> T) -> T {
        f(&self.writers.read())
    }

    /// 조건에 맞는 작성기마다 `f` 결과 수집 (ID 순서)
    pub fn collect<T>(&self, select: impl Fn(&Writer) -> bool, f: impl FnMut(&Writer) -> T) -> Vec<T> {
        self.writers.read().values().filter(|w| select(w)).map(f).collect()
    }

    /// 작성기 하나의 큐 핸들
    pub fn handle(&self, wid: Wid) -> Result<WriterHandle> {
        self.with(wid, Writer::handle)
    }

    /// 조건에 맞는 작성기의 큐 핸들 (ID 순서)
    pub fn handles(&self, select: impl Fn(&Writer) -> bool) -> Vec<WriterHandle> {
        self.collect(select, Writer::handle)
    }

    /// 항목을 허용하는 작성기에 분배하고 수락한 작성기 수 반환
    ///
    /// `skip`이 참인 종류의 작성기는 건너뜁니다. 잠금은 대상 핸들을 고르는
    /// 동안에만 잡고 큐 삽입 대기는 잠금 밖에서 합니다.
    pub fn dispatch(&self, entry: &Arc<Entry>, timeout: Duration, skip: impl Fn(WriterKind) -> bool) -> usize {
        let targets = self.handles(|w| !skip(w.kind()) && w.shared.accepts(entry.level));
        targets
            .iter()
            .filter(|handle| handle.deliver(entry, timeout))
            .count()
    }
}
