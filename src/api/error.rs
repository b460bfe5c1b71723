//! # 传输层错误模型
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载后端调用的所有失败来源，避免字符串拼接式错误处理。
//! 业务层不按状态码分支，只把它当作诊断信息带到日志与提示中。

/// 后端调用错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP 状态异常：{status}")]
    Http { status: u16 },

    #[error("网络错误：{0}")]
    Network(String),

    #[error("响应解析失败：{0}")]
    Decode(String),

    #[error("请求构造失败：{0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::Http { status: status.as_u16() };
        }
        if error.is_decode() {
            return Self::Decode(error.to_string());
        }
        Self::Network(error.to_string())
    }
}
