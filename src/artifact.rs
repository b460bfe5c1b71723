//! # 渲染产物模块
//!
//! ## 设计思路
//!
//! 生成结果是一个带格式标识的和类型：矢量标记（文本）或位图字节。
//! 导出器对两种情况做穷尽匹配，不再传递无类型的 blob。
//!
//! ## 实现思路
//!
//! - 位图字节使用 `bytes::Bytes`，克隆只增加引用计数。
//! - `Artifact::raster` 在“尽可能早”的阶段校验服务端返回：
//!   `infer` 嗅探的 MIME 必须与请求格式一致，`image` 读取的头部尺寸必须非零。
//! - `to_data_url` 用于把产物嵌入预览（base64）。

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;

use crate::api::RasterFormat;
use crate::error::AppError;

/// 产物格式标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    Svg,
    Png,
    Jpeg,
}

impl ArtifactFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// 历史记录中使用的格式名。
    pub fn history_name(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

impl From<RasterFormat> for ArtifactFormat {
    fn from(format: RasterFormat) -> Self {
        match format {
            RasterFormat::Png => Self::Png,
            RasterFormat::Jpeg => Self::Jpeg,
        }
    }
}

/// 一次生成的完整产物。每次成功生成整体替换，不做增量修补。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Vector { markup: String },
    Raster { format: RasterFormat, bytes: Bytes },
}

impl Artifact {
    pub fn vector(markup: impl Into<String>) -> Self {
        Self::Vector { markup: markup.into() }
    }

    /// 校验并包装服务端返回的位图字节。
    pub fn raster(format: RasterFormat, bytes: Bytes) -> Result<Self, AppError> {
        if bytes.is_empty() {
            return Err(AppError::RasterGenerationFailed("服务端返回空内容".to_string()));
        }

        let expected = ArtifactFormat::from(format).mime();
        let sniffed = infer::get(&bytes).map(|kind| kind.mime_type());
        if sniffed != Some(expected) {
            return Err(AppError::RasterGenerationFailed(format!(
                "内容类型不符：期望 {}，实际 {}",
                expected,
                sniffed.unwrap_or("未知")
            )));
        }

        let (width, height) = read_raster_dimensions(&bytes)?;
        if width == 0 || height == 0 {
            return Err(AppError::RasterGenerationFailed(format!(
                "位图尺寸无效：{}x{}",
                width, height
            )));
        }

        Ok(Self::Raster { format, bytes })
    }

    pub fn format(&self) -> ArtifactFormat {
        match self {
            Self::Vector { .. } => ArtifactFormat::Svg,
            Self::Raster { format, .. } => (*format).into(),
        }
    }

    pub fn mime(&self) -> &'static str {
        self.format().mime()
    }

    /// 产物字节（矢量为 UTF-8 文本）。
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Vector { markup } => Bytes::copy_from_slice(markup.as_bytes()),
            Self::Raster { bytes, .. } => bytes.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Vector { markup } => markup.len(),
            Self::Raster { bytes, .. } => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 位图返回头部尺寸；矢量返回 `None`（尺寸以模板元数据为准）。
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Vector { .. } => None,
            Self::Raster { bytes, .. } => read_raster_dimensions(bytes).ok(),
        }
    }

    /// `data:` URL，用于嵌入预览。
    pub fn to_data_url(&self) -> String {
        let encoded = match self {
            Self::Vector { markup } => general_purpose::STANDARD.encode(markup.as_bytes()),
            Self::Raster { bytes, .. } => general_purpose::STANDARD.encode(bytes),
        };
        format!("data:{};base64,{}", self.mime(), encoded)
    }
}

fn read_raster_dimensions(bytes: &[u8]) -> Result<(u32, u32), AppError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AppError::RasterGenerationFailed(format!("无法识别图片格式：{}", e)))?
        .into_dimensions()
        .map_err(|e| AppError::RasterGenerationFailed(format!("无法读取图片尺寸：{}", e)))
}
