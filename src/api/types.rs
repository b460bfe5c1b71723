//! # 请求 / 响应数据模型
//!
//! 收藏、历史记录与位图请求的线上格式。字段名与服务端 JSON 一致（camelCase）。

use serde::{Deserialize, Serialize};

use crate::template::{ParameterMap, TemplateIdentity};

/// 位图输出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    /// 接口路径段 / 历史记录中的格式名。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

/// 位图生成请求的可选参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterOptions {
    /// 仅 JPEG 生效。
    pub quality: Option<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// 收藏记录。客户端只关心“是否存在”，删除时需要 `id`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub template_name: String,
    #[serde(default)]
    pub template_category: String,
    #[serde(default)]
    pub default_parameters: Option<ParameterMap>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 新增收藏请求体。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFavorite {
    pub template_name: String,
    pub template_category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_parameters: Option<ParameterMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewFavorite {
    pub fn new(template: &TemplateIdentity, parameters: Option<ParameterMap>, notes: Option<String>) -> Self {
        Self {
            template_name: template.name.clone(),
            template_category: template.category.clone(),
            default_parameters: parameters,
            notes,
        }
    }
}

/// 历史记录（只写）。创建时间由服务端决定。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub template_name: String,
    pub template_category: String,
    pub parameters: ParameterMap,
    pub user_id: String,
    pub format: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IsFavoriteResponse {
    pub(crate) is_favorite: bool,
}
