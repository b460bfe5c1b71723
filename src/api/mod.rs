//! # 后端接口模块（api）
//!
//! ## 设计思路
//!
//! 生成服务、收藏服务、历史记录服务都是外部协作方。本模块只定义“消费哪些操作”，
//! 具体传输由实现方决定：
//!
//! - `TemplateBackend`：模板列表、矢量生成、位图生成
//! - `FavoritesBackend`：收藏查询 / 新增 / 列表 / 删除
//! - `HistoryBackend`：历史记录写入（只写）
//!
//! ## 实现思路
//!
//! 三个 trait 均为 `async_trait`，上层以 `Arc<dyn …>` 持有，测试中可注入内存替身。
//! `HttpApiClient` 以一个复用的 `reqwest::Client` 同时实现三者。
//!
//! ```text
//! GenerationSession ──┐
//! ArtifactExporter ───┼──► TemplateBackend ─┐
//! FavoriteCoordinator ┼──► FavoritesBackend ├──► HttpApiClient (reqwest)
//! HistoryRecorder ────┴──► HistoryBackend ──┘
//! ```

mod error;
mod http;
mod types;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::ApiError;
pub use http::HttpApiClient;
pub(crate) use types::IsFavoriteResponse;
pub use types::{FavoriteRecord, HistoryEntry, NewFavorite, RasterFormat, RasterOptions};

use crate::template::{ParameterMap, TemplateDescriptor, TemplateIdentity};

/// 模板生成服务。
#[async_trait]
pub trait TemplateBackend: Send + Sync {
    /// 获取模板目录。
    async fn fetch_template_list(&self) -> Result<Vec<TemplateDescriptor>, ApiError>;

    /// 生成矢量标记。参数为空时返回模板默认渲染。
    async fn generate(&self, template: &TemplateIdentity, parameters: &ParameterMap) -> Result<String, ApiError>;

    /// 服务端栅格化，返回 PNG / JPEG 字节。
    async fn generate_raster(
        &self,
        template: &TemplateIdentity,
        parameters: &ParameterMap,
        format: RasterFormat,
        options: RasterOptions,
    ) -> Result<Bytes, ApiError>;
}

/// 收藏服务。
#[async_trait]
pub trait FavoritesBackend: Send + Sync {
    async fn is_favorite(&self, user_id: &str, template_name: &str) -> Result<bool, ApiError>;

    async fn add_favorite(&self, user_id: &str, favorite: &NewFavorite) -> Result<FavoriteRecord, ApiError>;

    async fn list_favorites(&self, user_id: &str) -> Result<Vec<FavoriteRecord>, ApiError>;

    async fn remove_favorite(&self, user_id: &str, favorite_id: &str) -> Result<(), ApiError>;
}

/// 历史记录服务。
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    async fn record_history(&self, entry: &HistoryEntry) -> Result<(), ApiError>;
}
