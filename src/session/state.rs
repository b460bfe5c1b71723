//! 生成状态机的数据类型

use serde::Serialize;

use crate::artifact::Artifact;
use crate::error::AppError;

/// 生成状态。
///
/// `Idle → Generating → {Succeeded | Failed} → Generating …`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating,
    Succeeded(Artifact),
    Failed(AppError),
}

impl GenerationState {
    pub fn is_generating(&self) -> bool {
        matches!(self, Self::Generating)
    }

    /// 状态名，供日志与前端桥接使用。
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// 生成请求的发起方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// 用户点击“生成”：成功 / 失败都提示，失败附带重试入口。
    Explicit,
    /// 挂载、切换模板、填满占位符触发：失败只记日志，保留上一次预览。
    Background,
}

/// 单次 `generate` 调用的结局。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// 结果已写入产物槽位。
    Committed(Artifact),
    /// 失败已写入状态（上一次成功的产物仍保留）。
    Failed(AppError),
    /// 响应过期（模板已切换、参数已变化或更新的请求已完成），未生效。
    Discarded,
}

impl GenerationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}
