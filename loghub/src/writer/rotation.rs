//! 로그 세그먼트 순환 및 압축
//!
//! 활성 세그먼트 `app.log`가 순환되면 `app.log.1`(가장 최신)부터
//! `app.log.<backlog>`까지 백업이 유지됩니다. 압축된 백업에는
//! 방식별 접미사(`.gz`, `.zst`, `.xz`)가 붙습니다.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 백업 개수 상한
pub const BACKLOG_MAX: usize = 1000;

/// 순환된 세그먼트 압축 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// 압축 없음
    #[default]
    Store,
    /// gzip (deflate)
    Deflate,
    /// zstd
    Zstd,
    /// xz (lzma)
    Lzma,
}

impl CompressionMethod {
    const ALL: [CompressionMethod; 4] = [
        CompressionMethod::Store,
        CompressionMethod::Deflate,
        CompressionMethod::Zstd,
        CompressionMethod::Lzma,
    ];

    /// 백업 파일 접미사
    pub fn suffix(&self) -> &'static str {
        match self {
            CompressionMethod::Store => "",
            CompressionMethod::Deflate => ".gz",
            CompressionMethod::Zstd => ".zst",
            CompressionMethod::Lzma => ".xz",
        }
    }
}

/// `n`번째 백업 경로
pub fn backup_path(path: &Path, index: usize, compression: CompressionMethod) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}{}", index, compression.suffix()));
    PathBuf::from(name)
}

/// 존재하는 `n`번째 백업 찾기 (압축 방식이 바뀌었어도 인식)
fn existing_backup(path: &Path, index: usize) -> Option<(PathBuf, CompressionMethod)> {
    CompressionMethod::ALL
        .iter()
        .map(|m| (backup_path(path, index, *m), *m))
        .find(|(p, _)| p.exists())
}

/// 유지 중인 백업 목록 (최신순)
pub fn list_backups(path: &Path, backlog: usize) -> Vec<PathBuf> {
    (1..=backlog)
        .filter_map(|i| existing_backup(path, i).map(|(p, _)| p))
        .collect()
}

/// 활성 세그먼트를 백업으로 순환
///
/// 기존 백업을 한 칸씩 밀고 `backlog`를 넘는 가장 오래된 백업을 삭제한 뒤,
/// 활성 세그먼트를 압축해 `.1`로 만듭니다. 활성 파일은 비워진 상태로 남습니다.
pub fn rotate_segments(path: &Path, backlog: usize, compression: CompressionMethod) -> Result<PathBuf> {
    let backlog = backlog.clamp(1, BACKLOG_MAX);

    if let Some((oldest, _)) = existing_backup(path, backlog) {
        fs::remove_file(&oldest).context("오래된 백업 삭제 실패")?;
        debug!(path = %oldest.display(), "백업 한도 초과로 삭제됨");
    }
    for index in (1..backlog).rev() {
        if let Some((from, method)) = existing_backup(path, index) {
            let to = backup_path(path, index + 1, method);
            fs::rename(&from, &to).context("백업 이름 변경 실패")?;
        }
    }

    let target = backup_path(path, 1, compression);
    if compression == CompressionMethod::Store {
        fs::rename(path, &target).context("활성 세그먼트 이동 실패")?;
    } else {
        compress_file(path, &target, compression)?;
    }
    File::create(path).context("새 활성 세그먼트 생성 실패")?;

    debug!(
        path = %path.display(),
        backup = %target.display(),
        ?compression,
        "로그 세그먼트 순환 완료"
    );
    Ok(target)
}

/// `source`를 압축해 `target`에 기록
pub fn compress_file(source: &Path, target: &Path, compression: CompressionMethod) -> Result<()> {
    let mut input = BufReader::new(File::open(source).context("압축 원본 열기 실패")?);
    let output = BufWriter::new(File::create(target).context("압축 대상 생성 실패")?);

    match compression {
        CompressionMethod::Store => {
            let mut output = output;
            io::copy(&mut input, &mut output)?;
            output.flush()?;
        }
        CompressionMethod::Deflate => {
            let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
            io::copy(&mut input, &mut encoder).context("gzip 압축 실패")?;
            encoder.finish()?.flush()?;
        }
        CompressionMethod::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(output, 0)?;
            io::copy(&mut input, &mut encoder).context("zstd 압축 실패")?;
            encoder.finish()?.flush()?;
        }
        CompressionMethod::Lzma => {
            let mut encoder = xz2::write::XzEncoder::new(output, 6);
            io::copy(&mut input, &mut encoder).context("xz 압축 실패")?;
            encoder.finish()?.flush()?;
        }
    }
    Ok(())
}
