//! 用户身份上下文
//!
//! 身份以显式值注入编排器、收藏协调器与导出器，而不是在运行时全局查找，
//! 测试中可以确定性地构造“已登录 / 未登录”两种状态。

/// 当前会话的用户身份。`None` 表示未登录，收藏功能随之失效。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    user_id: Option<String>,
}

impl UserContext {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Self::anonymous();
        }
        Self { user_id: Some(user_id) }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}
