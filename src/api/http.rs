//! # HTTP 后端实现
//!
//! ## 设计思路
//!
//! 以一个复用的 `reqwest::Client` 实现全部后端 trait，减少每次请求的初始化开销。
//! 所有非 2xx 响应统一映射为 `ApiError::Http { status }`，上层不再区分状态码。
//!
//! ## 实现思路
//!
//! - URL 基于 `api_base_url`，路径段通过 `path_segments_mut` 追加，自动完成转义。
//! - 查询参数通过 `query_pairs_mut` 拼接，不依赖 reqwest 的 query 特性。
//! - 矢量生成：参数为空走 `GET`（默认渲染），否则 `POST` JSON。
//! - 目录中违反“占位符键唯一”的模板会被跳过并记录警告。

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, Url};

use super::{
    ApiError, FavoriteRecord, FavoritesBackend, HistoryBackend, HistoryEntry, IsFavoriteResponse, NewFavorite,
    RasterFormat, RasterOptions, TemplateBackend,
};
use crate::config::ClientConfig;
use crate::template::{ParameterMap, TemplateDescriptor, TemplateIdentity};

/// 基于 reqwest 的后端客户端。
#[derive(Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: Url,
}

impl HttpApiClient {
    /// 根据配置构建客户端。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use template_studio::api::HttpApiClient;
    /// use template_studio::config::ClientConfig;
    ///
    /// let client = HttpApiClient::new(&ClientConfig::default())?;
    /// # Ok::<(), template_studio::api::ApiError>(())
    /// ```
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("API 地址格式错误：{}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "API 地址不能作为基础路径：{}",
                config.api_base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("HTTP 客户端构建失败：{}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest("API 地址不能追加路径".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn ensure_success(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            log::debug!("📡 后端返回非成功状态：{} {}", status.as_u16(), response.url());
            return Err(ApiError::Http { status: status.as_u16() });
        }
        Ok(response)
    }
}

/// 位图接口的查询参数。
fn raster_query(url: &mut Url, format: RasterFormat, options: RasterOptions) {
    let mut pairs: Vec<(&str, String)> = Vec::with_capacity(3);
    if let Some(width) = options.width {
        pairs.push(("width", width.to_string()));
    }
    if let Some(height) = options.height {
        pairs.push(("height", height.to_string()));
    }
    if format == RasterFormat::Jpeg {
        if let Some(quality) = options.quality {
            pairs.push(("quality", quality.to_string()));
        }
    }

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
}

#[async_trait]
impl TemplateBackend for HttpApiClient {
    async fn fetch_template_list(&self) -> Result<Vec<TemplateDescriptor>, ApiError> {
        let url = self.endpoint(&["templates", "list"])?;
        let response = Self::ensure_success(self.client.get(url).send().await?).await?;
        let templates: Vec<TemplateDescriptor> = response.json().await?;

        let total = templates.len();
        let valid: Vec<TemplateDescriptor> = templates
            .into_iter()
            .filter(|template| match template.validate() {
                Ok(()) => true,
                Err(key) => {
                    log::warn!("⚠️ 跳过模板 {}：占位符键重复 '{}'", template.identity(), key);
                    false
                }
            })
            .collect();

        log::info!("📚 模板目录加载完成 - 共 {} 个，有效 {} 个", total, valid.len());
        Ok(valid)
    }

    async fn generate(&self, template: &TemplateIdentity, parameters: &ParameterMap) -> Result<String, ApiError> {
        let url = self.endpoint(&["templates", &template.category, &template.name])?;
        let request = if parameters.is_empty() {
            self.client.get(url)
        } else {
            self.client.post(url).json(parameters)
        };

        let response = Self::ensure_success(request.send().await?).await?;
        Ok(response.text().await?)
    }

    async fn generate_raster(
        &self,
        template: &TemplateIdentity,
        parameters: &ParameterMap,
        format: RasterFormat,
        options: RasterOptions,
    ) -> Result<Bytes, ApiError> {
        let mut url = self.endpoint(&["templates", &template.category, &template.name, format.as_str()])?;
        raster_query(&mut url, format, options);

        let response = Self::ensure_success(self.client.post(url).json(parameters).send().await?).await?;
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl FavoritesBackend for HttpApiClient {
    async fn is_favorite(&self, user_id: &str, template_name: &str) -> Result<bool, ApiError> {
        let url = self.endpoint(&["favorite-templates", "user", user_id, "is-favorite", template_name])?;
        let response = Self::ensure_success(self.client.get(url).send().await?).await?;
        let body: IsFavoriteResponse = response.json().await?;
        Ok(body.is_favorite)
    }

    async fn add_favorite(&self, user_id: &str, favorite: &NewFavorite) -> Result<FavoriteRecord, ApiError> {
        let url = self.endpoint(&["templates", "user", user_id, "favorites"])?;
        let response = Self::ensure_success(self.client.post(url).json(favorite).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn list_favorites(&self, user_id: &str) -> Result<Vec<FavoriteRecord>, ApiError> {
        let url = self.endpoint(&["templates", "user", user_id, "favorites"])?;
        let response = Self::ensure_success(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn remove_favorite(&self, user_id: &str, favorite_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["templates", "user", user_id, "favorites", favorite_id])?;
        Self::ensure_success(self.client.delete(url).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryBackend for HttpApiClient {
    async fn record_history(&self, entry: &HistoryEntry) -> Result<(), ApiError> {
        let url = self.endpoint(&["download-history"])?;
        Self::ensure_success(self.client.post(url).json(entry).send().await?).await?;
        Ok(())
    }
}
