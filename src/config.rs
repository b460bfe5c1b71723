//! # 客户端配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ClientConfig`：后端地址、网络超时、预览预算、
//! JPEG 默认质量、下载目录与剪贴板重试。`Default` 提供开箱可用的配置。
//!
//! ## 实现思路
//!
//! - 配置以 JSON 文件持久化；文件缺失或损坏时回退默认值，不阻断启动。
//! - 环境变量 `TEMPLATE_STUDIO_API_URL` 可覆盖后端地址。
//! - `validate` 统一做取值范围校验，调用方在加载或修改后调用。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::scaling::PreviewBudget;

pub const API_URL_ENV: &str = "TEMPLATE_STUDIO_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// 客户端配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 后端 API 根地址。
    pub api_base_url: String,
    /// 建立连接超时时间（秒）。
    pub connect_timeout_secs: u64,
    /// 单次请求总超时时间（秒）。
    pub request_timeout_secs: u64,
    /// 生成请求的业务超时（毫秒）。`None` 表示不限，挂起的请求会一直停留在生成中。
    pub generation_timeout_ms: Option<u64>,
    /// 行内预览预算。
    pub preview_budget: PreviewBudget,
    /// 放大弹窗预算。
    pub modal_budget: PreviewBudget,
    /// JPEG 导出默认质量。
    pub jpeg_quality: u8,
    /// 生成成功后是否写历史记录（仍要求已登录）。
    pub record_history: bool,
    /// 下载目录；为空时使用系统临时目录下的 `template-studio`。
    pub download_dir: Option<String>,
    /// 剪贴板写入失败时最大尝试次数。
    pub clipboard_retries: u32,
    /// 剪贴板重试基础间隔（毫秒）。
    pub clipboard_retry_delay_ms: u64,
    /// 位图导出缓存条目数。
    pub raster_cache_entries: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            connect_timeout_secs: 8,
            request_timeout_secs: 30,
            generation_timeout_ms: None,
            preview_budget: PreviewBudget::INLINE,
            modal_budget: PreviewBudget::MODAL,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            record_history: true,
            download_dir: None,
            clipboard_retries: 3,
            clipboard_retry_delay_ms: 100,
            raster_cache_entries: 16,
        }
    }
}

impl ClientConfig {
    /// 从 JSON 文件加载；文件不存在或解析失败时回退默认值。
    pub fn load_from_path(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("⚠️ 解析配置文件失败，使用默认配置: {}", e),
                },
                Err(e) => log::warn!("⚠️ 读取配置文件失败，使用默认配置: {}", e),
            }
        }
        Self::default()
    }

    /// 保存为格式化 JSON。
    pub fn save_to_path(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("序列化配置失败: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 用环境变量覆盖后端地址。
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        self
    }

    /// 下载目录：优先使用配置值，否则回退到临时目录。
    pub fn resolved_download_dir(&self) -> PathBuf {
        match self.download_dir.as_deref() {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir().join("template-studio"),
        }
    }

    /// 校验取值范围。
    pub fn validate(&self) -> Result<(), AppError> {
        if self.api_base_url.trim().is_empty() {
            return Err(AppError::Config("api_base_url 不能为空".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout_secs) {
            return Err(AppError::Config("connect_timeout_secs 必须在 1~120 秒之间".to_string()));
        }
        if !(1..=120).contains(&self.request_timeout_secs) {
            return Err(AppError::Config("request_timeout_secs 必须在 1~120 秒之间".to_string()));
        }
        if self.generation_timeout_ms == Some(0) {
            return Err(AppError::Config("generation_timeout_ms 不能为 0".to_string()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(AppError::Config("jpeg_quality 必须在 1~100 之间".to_string()));
        }
        validate_budget("preview_budget", &self.preview_budget)?;
        validate_budget("modal_budget", &self.modal_budget)?;
        if self.clipboard_retries == 0 {
            return Err(AppError::Config("clipboard_retries 至少为 1".to_string()));
        }
        if self.raster_cache_entries == 0 {
            return Err(AppError::Config("raster_cache_entries 至少为 1".to_string()));
        }
        Ok(())
    }
}

fn validate_budget(name: &str, budget: &PreviewBudget) -> Result<(), AppError> {
    if budget.max_width == 0 || budget.max_height == 0 {
        return Err(AppError::Config(format!("{} 的最大尺寸必须大于 0", name)));
    }
    if budget.min_width > budget.max_width || budget.min_height > budget.max_height {
        return Err(AppError::Config(format!("{} 的最小尺寸不能大于最大尺寸", name)));
    }
    Ok(())
}
