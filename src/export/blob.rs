//! 临时下载对象（blob）
//!
//! # 设计思路
//!
//! 下载分三步：创建临时对象 → 保存为文件 → 显式释放。导出器只通过 `BlobSink`
//! 调用这三步，不直接接触平台 API；测试与无界面场景可以替换实现。
//!
//! # 实现思路
//!
//! - `DirectoryBlobSink` 把待保存内容暂存在内存表中，`save` 写入下载目录。
//! - 目录不存在时自动 `create_dir_all`。
//! - 文件以 `create_new` 打开：同名文件已存在时追加 `_1`、`_2` 后缀，绝不覆盖。
//! - `release` 之后句柄失效，再次 `save` 返回错误。

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::AppError;

/// 同名文件最多尝试的后缀数。
const MAX_NAME_SUFFIX: u32 = 1000;

/// 临时对象句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobHandle(u64);

/// 下载对象的创建 / 保存 / 释放能力。
pub trait BlobSink: Send + Sync {
    fn create(&self, bytes: Bytes, mime: &'static str) -> Result<BlobHandle, AppError>;

    /// 保存为文件，返回最终路径（可能带去重后缀）。
    fn save(&self, handle: BlobHandle, file_name: &str) -> Result<PathBuf, AppError>;

    fn release(&self, handle: BlobHandle);
}

struct PendingBlob {
    bytes: Bytes,
    mime: &'static str,
}

/// 写入本地目录的 `BlobSink`。
pub struct DirectoryBlobSink {
    dir: PathBuf,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingBlob>>,
}

impl DirectoryBlobSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 尚未释放的临时对象数量。
    pub fn outstanding(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    fn ensure_dir(&self) -> Result<(), AppError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                AppError::Download(format!("创建下载目录 '{}' 失败: {}", self.dir.display(), e))
            })?;
        }
        Ok(())
    }
}

impl BlobSink for DirectoryBlobSink {
    fn create(&self, bytes: Bytes, mime: &'static str) -> Result<BlobHandle, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| AppError::Download("下载队列锁已中毒".to_string()))?;
        pending.insert(id, PendingBlob { bytes, mime });
        Ok(BlobHandle(id))
    }

    fn save(&self, handle: BlobHandle, file_name: &str) -> Result<PathBuf, AppError> {
        let (bytes, mime) = {
            let pending = self
                .pending
                .lock()
                .map_err(|_| AppError::Download("下载队列锁已中毒".to_string()))?;
            let blob = pending
                .get(&handle.0)
                .ok_or_else(|| AppError::Download(format!("下载对象 #{} 已释放", handle.0)))?;
            (blob.bytes.clone(), blob.mime)
        };

        self.ensure_dir()?;

        let mut suffix = 0;
        loop {
            let path = self.dir.join(candidate_name(file_name, suffix));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    write_or_discard(file, &path, &bytes)?;
                    log::info!("💾 已保存 {} ({} bytes, {})", path.display(), bytes.len(), mime);
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && suffix < MAX_NAME_SUFFIX => {
                    suffix += 1;
                }
                Err(e) => {
                    return Err(AppError::Download(format!("写入 '{}' 失败: {}", path.display(), e)));
                }
            }
        }
    }

    fn release(&self, handle: BlobHandle) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&handle.0);
        }
    }
}

/// 写入失败时删除已创建的文件，避免留下残缺文件占用文件名。
fn write_or_discard<W: Write>(mut out: W, path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let written = out.write_all(bytes).and_then(|()| out.flush());
    drop(out);
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(path) {
            log::warn!("⚠️ 清理残缺文件 '{}' 失败: {}", path.display(), cleanup);
        }
        return Err(AppError::Download(format!("写入 '{}' 失败: {}", path.display(), e)));
    }
    Ok(())
}

/// `name.ext` → `name_{suffix}.ext`；`suffix == 0` 时原样返回。
fn candidate_name(file_name: &str, suffix: u32) -> String {
    if suffix == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", file_name, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_name_inserts_suffix_before_extension() {
        assert_eq!(candidate_name("a.svg", 0), "a.svg");
        assert_eq!(candidate_name("a.svg", 2), "a_2.svg");
        assert_eq!(candidate_name("README", 1), "README_1");
    }

    #[test]
    fn save_creates_directory_and_never_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sink = DirectoryBlobSink::new(temp.path().join("nested/downloads"));

        let first = sink.create(Bytes::from_static(b"first"), "image/svg+xml").expect("create");
        let first_path = sink.save(first, "poster.svg").expect("save first");
        let second = sink.create(Bytes::from_static(b"second"), "image/svg+xml").expect("create");
        let second_path = sink.save(second, "poster.svg").expect("save second");

        assert_ne!(first_path, second_path);
        assert_eq!(fs::read(&first_path).expect("read"), b"first");
        assert_eq!(fs::read(&second_path).expect("read"), b"second");
        assert!(second_path.ends_with("poster_1.svg"));
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::StorageFull, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_removes_partial_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("poster.svg");
        fs::write(&path, b"").expect("placeholder file");

        let result = write_or_discard(BrokenWriter, &path, b"<svg/>");

        assert!(matches!(result, Err(AppError::Download(_))));
        assert!(!path.exists());
    }

    #[test]
    fn released_handle_cannot_be_saved() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sink = DirectoryBlobSink::new(temp.path());

        let handle = sink.create(Bytes::from_static(b"x"), "image/png").expect("create");
        assert_eq!(sink.outstanding(), 1);
        sink.release(handle);

        assert_eq!(sink.outstanding(), 0);
        assert!(matches!(sink.save(handle, "x.png"), Err(AppError::Download(_))));
    }
}
