//! # 收藏与历史记录模块（records）
//!
//! 观察生成会话的副作用协调：
//!
//! - `favorites`：当前模板的收藏标志，与远端事实来源对账
//! - `history`：生成 / 下载成功后的历史记录（发射后不管，失败隔离）

mod favorites;
mod history;

pub use favorites::FavoriteCoordinator;
pub use history::HistoryRecorder;
