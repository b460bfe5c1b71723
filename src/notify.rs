//! 用户提示模块
//!
//! # 设计思路
//!
//! 每个用户操作（生成、复制、下载、收藏）都产生一条短暂提示。
//! 提示的展示方式属于表现层，这里只定义数据与投递接口。
//!
//! # 实现思路
//!
//! - `Notice` 可序列化，前端桥接层可直接转发。
//! - `Notifier` 为同步 trait，投递不得阻塞调用方。
//! - 默认实现 `LogNotifier` 仅写日志，供 CLI 与无界面场景使用。

use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// 一条短暂提示。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// 是否提供“重试”入口（仅用户主动生成失败时为真）。
    pub retryable: bool,
    /// 错误码（仅错误提示）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            retryable: false,
            code: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            retryable: false,
            code: None,
        }
    }

    pub fn error(error: &AppError) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: error.to_string(),
            retryable: false,
            code: Some(error.code()),
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

/// 提示投递接口。
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// 只写日志的提示实现。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => log::info!("✅ {}", notice.message),
            NoticeLevel::Info => log::info!("ℹ️ {}", notice.message),
            NoticeLevel::Error if notice.retryable => log::error!("❌ {}（可重试）", notice.message),
            NoticeLevel::Error => log::error!("❌ {}", notice.message),
        }
    }
}
