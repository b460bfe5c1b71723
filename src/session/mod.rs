//! # 生成会话模块（session）
//!
//! ## 设计思路
//!
//! 模板会话的状态机：挂载时按默认参数自动生成，用户编辑填满占位符时自动重新生成，
//! 用户也可显式生成或重置。多个请求在途时按“最后一次写入胜出”展示，
//! 过期响应由纪元 / 修订号 / 序号三重检查丢弃。
//!
//! ## 子模块
//!
//! - `state`：`GenerationState` / `Trigger` / `GenerationOutcome`
//! - `orchestrator`：`GenerationSession`，状态与参数表的唯一所有者

mod orchestrator;
mod state;

pub use orchestrator::GenerationSession;
pub use state::{GenerationOutcome, GenerationState, Trigger};
