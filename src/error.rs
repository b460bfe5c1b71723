//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，覆盖生成、导出、收藏、历史记录等所有失败类型，
//! 替代各模块中分散的字符串错误。上层（UI 桥接 / CLI）只需匹配一个枚举。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 所有分支只携带字符串与状态码，因此可以 `Clone`，能直接存放在
//!   `GenerationState::Failed` 中。
//! - 传输层错误 `ApiError` 不做 `From` 自动转换：同一个传输错误在不同调用点
//!   代表不同的业务含义（生成失败 / 收藏失败 / 历史写入失败），由调用点显式映射。

use crate::api::ApiError;

/// 应用级统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// 参数未填写完整（当前自动生成前不强制校验，仅供调用方使用）
    #[error("参数未填写完整: {0}")]
    ValidationIncomplete(String),

    /// 编辑了模板未声明的占位符
    #[error("模板未声明占位符: {0}")]
    UnknownPlaceholder(String),

    /// 生成服务返回失败或网络错误
    #[error("生成失败: {0}")]
    GenerationFailed(String),

    /// 位图（PNG / JPEG）生成失败
    #[error("位图生成失败: {0}")]
    RasterGenerationFailed(String),

    /// 生成请求超过配置的时限
    #[error("生成超时: {0}ms")]
    Timeout(u64),

    /// 剪贴板不可用或写入被拒绝
    #[error("剪贴板操作失败: {0}")]
    ClipboardError(String),

    /// 未登录时执行收藏操作
    #[error("该操作需要登录")]
    AuthRequired,

    /// 收藏相关的远程操作失败
    #[error("收藏操作失败: {0}")]
    FavoriteOperationFailed(String),

    /// 历史记录写入失败（仅记录日志，不向上传播）
    #[error("历史记录写入失败: {0}")]
    HistoryWriteFailed(String),

    /// 下载文件创建或保存失败
    #[error("下载失败: {0}")]
    Download(String),

    /// 配置文件无效
    #[error("配置错误: {0}")]
    Config(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(String),
}

impl AppError {
    /// 稳定的错误码，便于日志检索与前端分支。
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationIncomplete(_) => "E_VALIDATION_INCOMPLETE",
            Self::UnknownPlaceholder(_) => "E_UNKNOWN_PLACEHOLDER",
            Self::GenerationFailed(_) => "E_GENERATION_FAILED",
            Self::RasterGenerationFailed(_) => "E_RASTER_GENERATION_FAILED",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::ClipboardError(_) => "E_CLIPBOARD",
            Self::AuthRequired => "E_AUTH_REQUIRED",
            Self::FavoriteOperationFailed(_) => "E_FAVORITE_OPERATION_FAILED",
            Self::HistoryWriteFailed(_) => "E_HISTORY_WRITE_FAILED",
            Self::Download(_) => "E_DOWNLOAD",
            Self::Config(_) => "E_CONFIG",
            Self::Io(_) => "E_IO",
        }
    }

    pub(crate) fn generation(error: ApiError) -> Self {
        Self::GenerationFailed(error.to_string())
    }

    pub(crate) fn raster(error: ApiError) -> Self {
        Self::RasterGenerationFailed(error.to_string())
    }

    pub(crate) fn favorite(error: ApiError) -> Self {
        Self::FavoriteOperationFailed(error.to_string())
    }

    pub(crate) fn history(error: ApiError) -> Self {
        Self::HistoryWriteFailed(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_uniform_kinds_regardless_of_status() {
        let not_found = AppError::generation(ApiError::Http { status: 404 });
        let server = AppError::generation(ApiError::Http { status: 500 });

        assert_eq!(not_found.code(), "E_GENERATION_FAILED");
        assert_eq!(server.code(), "E_GENERATION_FAILED");
        assert!(not_found.to_string().contains("404"));
    }

    #[test]
    fn io_error_converts_into_io_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(ref msg) if msg.contains("denied")));
    }

    #[test]
    fn auth_required_has_stable_code() {
        assert_eq!(AppError::AuthRequired.code(), "E_AUTH_REQUIRED");
    }
}
