//! 模板元数据与占位符默认值模块
//!
//! # 设计思路
//!
//! 模板描述（`TemplateDescriptor`）由目录服务提供，对本 crate 只读。
//! 用户输入保存在 `ParameterMap` 中，键只能是模板声明过的占位符。
//!
//! # 实现思路
//!
//! - 字段命名与服务端 JSON 保持一致（camelCase），直接 `serde` 反序列化。
//! - `ParameterMap` 使用 `BTreeMap`，保证序列化顺序稳定，便于缓存键与日志比对。
//! - `build_defaults` 只收录声明了非空默认值的占位符：
//!   未填写的必填项以“键不存在”表达，而不是空字符串。

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// 占位符键 → 用户填写的值。
pub type ParameterMap = BTreeMap<String, String>;

/// 模板像素尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// 单个占位符声明。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderSpec {
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl PlaceholderSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
            example: None,
            default_value: None,
            required: false,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// 模板身份：分类 + 名称，即生成接口路径中的两段。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateIdentity {
    pub category: String,
    pub name: String,
}

impl std::fmt::Display for TemplateIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

/// 模板描述。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub placeholders: Vec<PlaceholderSpec>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TemplateDescriptor {
    pub fn identity(&self) -> TemplateIdentity {
        TemplateIdentity {
            category: self.category.clone(),
            name: self.name.clone(),
        }
    }

    pub fn declares(&self, key: &str) -> bool {
        self.placeholders.iter().any(|p| p.key == key)
    }

    /// 校验占位符键在模板内唯一。
    ///
    /// 返回第一个重复的键。
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.placeholders.len());
        for placeholder in &self.placeholders {
            if !seen.insert(placeholder.key.as_str()) {
                return Err(placeholder.key.clone());
            }
        }
        Ok(())
    }

    /// 所有占位符都已有值（空字符串也算）。
    ///
    /// 这是自动重新生成的完整性信号，不检查 `required`。
    pub fn is_complete(&self, params: &ParameterMap) -> bool {
        params.len() == self.placeholders.len()
    }
}

/// 根据占位符声明构建初始参数表。
pub fn build_defaults(placeholders: &[PlaceholderSpec]) -> ParameterMap {
    placeholders
        .iter()
        .filter_map(|p| match p.default_value.as_deref() {
            Some(value) if !value.is_empty() => Some((p.key.clone(), value.to_string())),
            _ => None,
        })
        .collect()
}
