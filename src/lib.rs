//! # 模板图片生成客户端 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            表现层 (UI 桥接 / CLI: src/main.rs)            │
//! │   表单编辑 ── 预览 / 弹窗 ── 复制 / 下载 ── 收藏按钮       │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError> + Notice
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心 (Rust)                           │
//! │                                                          │
//! │  ┌─ template ──── 占位符声明 + 默认参数                   │
//! │  ├─ session ───── 生成状态机 + 过期保护                   │
//! │  │                    │                                  │
//! │  │                    ├─► scaling   预览 / 弹窗尺寸       │
//! │  │                    └─► records   历史记录（旁路）      │
//! │  ├─ export ────── 复制 / 下载 / PNG / JPEG                │
//! │  ├─ records ───── 收藏标志 + 历史写入                     │
//! │  └─ api ───────── 后端接口 trait + reqwest 实现           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`config`] | `ClientConfig`：后端地址、超时、预览预算、导出策略 |
//! | [`template`] | 模板描述、占位符声明、`build_defaults` |
//! | [`scaling`] | 保持宽高比的缩放计算 |
//! | [`api`] | 生成 / 收藏 / 历史服务接口与 HTTP 实现 |
//! | [`artifact`] | 矢量 / 位图产物的和类型 |
//! | [`context`] | 显式注入的用户身份 |
//! | [`notify`] | 用户提示与投递接口 |
//! | [`session`] | 生成会话编排（状态机、自动生成、过期响应丢弃） |
//! | [`export`] | 剪贴板、下载、服务端栅格化导出 |
//! | [`records`] | 收藏状态协调、历史记录写入 |

pub mod api;
pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod notify;
pub mod records;
pub mod scaling;
pub mod session;
pub mod template;
