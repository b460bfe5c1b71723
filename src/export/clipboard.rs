//! 剪贴板写入
//!
//! # 设计思路
//!
//! 系统剪贴板可能被其他程序短暂占用，写入需要有限重试；
//! arboard 是同步 API，放在阻塞线程执行，避免阻塞 async 运行时。
//!
//! # 实现思路
//!
//! - 失败分为 `Busy` / `Transient` / `Fatal`：前两者按指数退避重试，
//!   `Fatal`（平台不支持剪贴板）立即终止。
//! - 退避间隔 `base * 2^(attempt-1)`，封顶 `MAX_RETRY_DELAY_MS`。

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::error::AppError;

const MAX_RETRY_DELAY_MS: u64 = 1_000;

/// 剪贴板写入能力。
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn write_text(&self, text: String) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClipboardFailureKind {
    Busy,
    Transient,
    Fatal,
}

#[derive(Debug, Clone)]
struct ClipboardWriteFailure {
    kind: ClipboardFailureKind,
    message: String,
}

impl ClipboardWriteFailure {
    fn is_retryable(&self) -> bool {
        matches!(self.kind, ClipboardFailureKind::Busy | ClipboardFailureKind::Transient)
    }
}

impl From<arboard::Error> for ClipboardWriteFailure {
    fn from(err: arboard::Error) -> Self {
        let kind = match err {
            arboard::Error::ClipboardOccupied => ClipboardFailureKind::Busy,
            arboard::Error::ClipboardNotSupported => ClipboardFailureKind::Fatal,
            _ => ClipboardFailureKind::Transient,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

fn compute_backoff_delay(base_delay_ms: u64, attempt: u32) -> u64 {
    base_delay_ms
        .saturating_mul(1_u64 << attempt.saturating_sub(1).min(8))
        .min(MAX_RETRY_DELAY_MS.max(base_delay_ms))
}

/// 基于 arboard 的系统剪贴板。
#[derive(Debug, Clone, Copy)]
pub struct SystemClipboard {
    retries: u32,
    retry_delay_ms: u64,
}

impl SystemClipboard {
    pub fn new(retries: u32, retry_delay_ms: u64) -> Self {
        Self {
            retries: retries.max(1),
            retry_delay_ms,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.clipboard_retries, config.clipboard_retry_delay_ms)
    }

    fn try_write(text: &str) -> Result<(), ClipboardWriteFailure> {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_text(text)?;
        Ok(())
    }

    /// 在阻塞线程中执行写入 + 重试。
    fn write_with_retry(text: &str, retries: u32, retry_delay_ms: u64) -> Result<(), AppError> {
        let mut last_error = None;
        for attempt in 1..=retries {
            if attempt > 1 {
                let wait_ms = compute_backoff_delay(retry_delay_ms.max(1), attempt - 1);
                log::debug!("🔄 重试 {}/{}，等待 {}ms", attempt, retries, wait_ms);
                std::thread::sleep(Duration::from_millis(wait_ms));
            }

            match Self::try_write(text) {
                Ok(()) => {
                    log::info!("✅ 已写入剪贴板 ({} 字符, 尝试 {})", text.chars().count(), attempt);
                    return Ok(());
                }
                Err(failure) => {
                    log::warn!("❌ 尝试 {} 失败: {}（kind={:?}）", attempt, failure.message, failure.kind);
                    let retryable = failure.is_retryable();
                    last_error = Some(failure.message);
                    if !retryable {
                        log::warn!("🛑 非可重试错误，提前终止重试");
                        break;
                    }
                }
            }
        }

        Err(AppError::ClipboardError(
            last_error.unwrap_or_else(|| "剪贴板不可用".to_string()),
        ))
    }
}

#[async_trait]
impl ClipboardSink for SystemClipboard {
    async fn write_text(&self, text: String) -> Result<(), AppError> {
        let retries = self.retries;
        let retry_delay_ms = self.retry_delay_ms;
        tokio::task::spawn_blocking(move || Self::write_with_retry(&text, retries, retry_delay_ms))
            .await
            .map_err(|e| AppError::ClipboardError(format!("线程执行失败：{}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_then_caps() {
        assert_eq!(compute_backoff_delay(100, 1), 100);
        assert_eq!(compute_backoff_delay(100, 2), 200);
        assert_eq!(compute_backoff_delay(100, 3), 400);
        assert_eq!(compute_backoff_delay(100, 8), MAX_RETRY_DELAY_MS);
    }

    #[test]
    fn occupied_clipboard_is_retryable_but_unsupported_is_not() {
        assert!(ClipboardWriteFailure::from(arboard::Error::ClipboardOccupied).is_retryable());
        assert!(!ClipboardWriteFailure::from(arboard::Error::ClipboardNotSupported).is_retryable());
    }

    #[test]
    fn retries_are_at_least_one() {
        let clipboard = SystemClipboard::new(0, 50);
        assert_eq!(clipboard.retries, 1);
    }
}
