//! # 产物导出模块（export）
//!
//! ## 设计思路
//!
//! 复制、下载、位图导出都是用户显式动作，结果逐个提示，不回写生成状态。
//! 平台相关能力抽象为两个接口，核心逻辑不直接触碰平台 API：
//!
//! - `BlobSink`：临时下载对象的创建 / 保存 / 释放
//! - `ClipboardSink`：文本写入剪贴板
//!
//! ## 子模块
//!
//! - `blob`：`DirectoryBlobSink`，写入本地下载目录
//! - `clipboard`：`SystemClipboard`，arboard + 有限重试
//! - `exporter`：`ArtifactExporter` 与文件命名

mod blob;
mod clipboard;
mod exporter;

pub use blob::{BlobHandle, BlobSink, DirectoryBlobSink};
pub use clipboard::{ClipboardSink, SystemClipboard};
pub use exporter::{ArtifactExporter, export_file_name};
