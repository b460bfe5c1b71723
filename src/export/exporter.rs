//! 产物导出
//!
//! # 设计思路
//!
//! 导出是用户显式动作，每个动作独立成败、独立提示，不影响生成状态：
//!
//! - 复制：只支持矢量产物（标记文本写入剪贴板）
//! - 下载：任意产物，经 `BlobSink` 创建 → 保存 → 释放
//! - PNG / JPEG：位图不能从已有矢量推导，需要单独请求服务端栅格化
//!
//! # 实现思路
//!
//! - 文件名 `{stem}_generated_{YYYYMMDDHHMMSSmmm}.{ext}`，stem 去掉 `.svg` 并替换非法字符。
//! - 临时对象无论保存成败都会释放。
//! - 位图结果按（模板、参数、格式、选项）缓存在 LRU 中，重复下载不再请求服务端。
//! - 位图下载成功后“发射后不管”地写历史记录（格式 png / jpeg）。

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Local};
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{BlobSink, ClipboardSink};
use crate::api::{RasterFormat, RasterOptions, TemplateBackend};
use crate::artifact::{Artifact, ArtifactFormat};
use crate::config::ClientConfig;
use crate::error::AppError;
use crate::notify::{Notice, Notifier};
use crate::records::HistoryRecorder;
use crate::template::{ParameterMap, TemplateIdentity};

/// 文件名中不安全的字符（路径分隔符、保留符号、空白与控制字符）。
static UNSAFE_FILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\s\x00-\x1f]+"#).unwrap());

const FALLBACK_STEM: &str = "template";

/// 构造下载文件名。
///
/// ```
/// use chrono::{Local, TimeZone};
/// use template_studio::artifact::ArtifactFormat;
/// use template_studio::export::export_file_name;
///
/// let at = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).single().expect("valid time");
/// let name = export_file_name("post/hello world.svg", ArtifactFormat::Png, at);
/// assert_eq!(name, "post_hello_world_generated_20240506070809000.png");
/// ```
pub fn export_file_name(suggested: &str, format: ArtifactFormat, at: DateTime<Local>) -> String {
    let trimmed = suggested.trim();
    let stem = match trimmed.len().checked_sub(4) {
        Some(cut) if trimmed.is_char_boundary(cut) && trimmed[cut..].eq_ignore_ascii_case(".svg") => &trimmed[..cut],
        _ => trimmed,
    };
    let sanitized = UNSAFE_FILE_CHARS.replace_all(stem, "_");
    let sanitized = sanitized.trim_matches(|c| c == '_' || c == '.');
    let stem = if sanitized.is_empty() { FALLBACK_STEM } else { sanitized };

    format!(
        "{}_generated_{}.{}",
        stem,
        at.format("%Y%m%d%H%M%S%3f"),
        format.extension()
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RasterCacheKey {
    template: TemplateIdentity,
    parameters: ParameterMap,
    format: RasterFormat,
    options: RasterOptions,
}

/// 产物导出器。
pub struct ArtifactExporter {
    backend: Arc<dyn TemplateBackend>,
    blobs: Arc<dyn BlobSink>,
    clipboard: Arc<dyn ClipboardSink>,
    notifier: Arc<dyn Notifier>,
    history: Option<Arc<HistoryRecorder>>,
    jpeg_quality: u8,
    record_history: bool,
    raster_cache: Mutex<LruCache<RasterCacheKey, Artifact>>,
}

impl ArtifactExporter {
    pub fn new(
        config: &ClientConfig,
        backend: Arc<dyn TemplateBackend>,
        blobs: Arc<dyn BlobSink>,
        clipboard: Arc<dyn ClipboardSink>,
        notifier: Arc<dyn Notifier>,
        history: Option<Arc<HistoryRecorder>>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.raster_cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            blobs,
            clipboard,
            notifier,
            history,
            jpeg_quality: config.jpeg_quality,
            record_history: config.record_history,
            raster_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// 复制矢量标记到剪贴板。位图产物返回 `ClipboardError`。
    pub async fn copy_to_clipboard(&self, artifact: &Artifact) -> Result<(), AppError> {
        let result = match artifact {
            Artifact::Vector { markup } => self.clipboard.write_text(markup.clone()).await,
            Artifact::Raster { format, .. } => Err(AppError::ClipboardError(format!(
                "仅支持复制矢量产物，当前为 {}",
                format.as_str()
            ))),
        };
        self.report(&result, || "已复制到剪贴板".to_string());
        result
    }

    /// 保存产物为文件，返回最终路径。
    pub fn download(&self, artifact: &Artifact, suggested_name: &str) -> Result<PathBuf, AppError> {
        let result = self.save_artifact(artifact, suggested_name);
        self.report(&result, || match &result {
            Ok(path) => format!("已保存到 {}", path.display()),
            Err(_) => String::new(),
        });
        result
    }

    /// 请求服务端栅格化为 PNG 并保存。
    pub async fn download_png(
        &self,
        template: &TemplateIdentity,
        parameters: &ParameterMap,
        size: Option<(u32, u32)>,
    ) -> Result<PathBuf, AppError> {
        let options = RasterOptions {
            quality: None,
            width: size.map(|(w, _)| w),
            height: size.map(|(_, h)| h),
        };
        self.download_raster(template, parameters, RasterFormat::Png, options).await
    }

    /// 请求服务端栅格化为 JPEG 并保存；`quality` 缺省时使用配置值（默认 90）。
    pub async fn download_jpeg(
        &self,
        template: &TemplateIdentity,
        parameters: &ParameterMap,
        quality: Option<u8>,
    ) -> Result<PathBuf, AppError> {
        let options = RasterOptions {
            quality,
            ..RasterOptions::default()
        };
        self.download_raster(template, parameters, RasterFormat::Jpeg, options).await
    }

    /// 位图下载的通用入口。
    pub async fn download_raster(
        &self,
        template: &TemplateIdentity,
        parameters: &ParameterMap,
        format: RasterFormat,
        options: RasterOptions,
    ) -> Result<PathBuf, AppError> {
        let result = self.download_raster_inner(template, parameters, format, options).await;
        self.report(&result, || match &result {
            Ok(path) => format!("{} 已保存到 {}", format.as_str().to_uppercase(), path.display()),
            Err(_) => String::new(),
        });
        result
    }

    async fn download_raster_inner(
        &self,
        template: &TemplateIdentity,
        parameters: &ParameterMap,
        format: RasterFormat,
        options: RasterOptions,
    ) -> Result<PathBuf, AppError> {
        let options = self.resolve_options(format, options)?;
        let artifact = self.fetch_raster(template, parameters, format, options).await?;
        let path = self.save_artifact(&artifact, &template.name)?;

        if self.record_history {
            if let Some(history) = &self.history {
                history.record_detached(template.clone(), parameters.clone(), format.into());
            }
        }
        Ok(path)
    }

    /// 质量只对 JPEG 生效，范围 1..=100。
    fn resolve_options(&self, format: RasterFormat, options: RasterOptions) -> Result<RasterOptions, AppError> {
        if options.width == Some(0) || options.height == Some(0) {
            return Err(AppError::RasterGenerationFailed("输出尺寸必须大于 0".to_string()));
        }
        let quality = match format {
            RasterFormat::Png => None,
            RasterFormat::Jpeg => {
                let quality = options.quality.unwrap_or(self.jpeg_quality);
                if !(1..=100).contains(&quality) {
                    return Err(AppError::RasterGenerationFailed(format!(
                        "JPEG 质量必须在 1~100 之间，当前为 {}",
                        quality
                    )));
                }
                Some(quality)
            }
        };
        Ok(RasterOptions { quality, ..options })
    }

    async fn fetch_raster(
        &self,
        template: &TemplateIdentity,
        parameters: &ParameterMap,
        format: RasterFormat,
        options: RasterOptions,
    ) -> Result<Artifact, AppError> {
        let key = RasterCacheKey {
            template: template.clone(),
            parameters: parameters.clone(),
            format,
            options,
        };

        if let Ok(mut cache) = self.raster_cache.lock() {
            if let Some(artifact) = cache.get(&key) {
                log::debug!("🧠 命中位图缓存 - {} ({})", template, format.as_str());
                return Ok(artifact.clone());
            }
        }

        let started = Instant::now();
        let bytes = self
            .backend
            .generate_raster(template, parameters, format, options)
            .await
            .map_err(AppError::raster)?;
        let artifact = Artifact::raster(format, bytes)?;
        log::info!(
            "🖼️ 位图生成完成 - {} ({}, {} bytes, {}ms)",
            template,
            format.as_str(),
            artifact.len(),
            started.elapsed().as_millis()
        );

        if let Ok(mut cache) = self.raster_cache.lock() {
            cache.put(key, artifact.clone());
        }
        Ok(artifact)
    }

    fn save_artifact(&self, artifact: &Artifact, suggested_name: &str) -> Result<PathBuf, AppError> {
        let file_name = export_file_name(suggested_name, artifact.format(), Local::now());
        let handle = self.blobs.create(artifact.to_bytes(), artifact.mime())?;
        let saved = self.blobs.save(handle, &file_name);
        self.blobs.release(handle);
        saved
    }

    fn report<T>(&self, result: &Result<T, AppError>, success: impl FnOnce() -> String) {
        match result {
            Ok(_) => self.notifier.notify(Notice::success(success())),
            Err(err) => self.notifier.notify(Notice::error(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, HistoryBackend, HistoryEntry};
    use crate::artifact::tests::encode_test_image;
    use crate::context::UserContext;
    use crate::export::DirectoryBlobSink;
    use crate::notify::NoticeLevel;
    use crate::notify::tests::RecordingNotifier;
    use crate::template::TemplateDescriptor;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::TimeZone;
    use image::ImageFormat;

    #[derive(Default)]
    struct RasterBackend {
        requests: Mutex<Vec<(RasterFormat, RasterOptions)>>,
        garbage: bool,
    }

    impl RasterBackend {
        fn request_count(&self) -> usize {
            self.requests.lock().expect("requests lock").len()
        }
    }

    #[async_trait]
    impl TemplateBackend for RasterBackend {
        async fn fetch_template_list(&self) -> Result<Vec<TemplateDescriptor>, ApiError> {
            Ok(vec![])
        }

        async fn generate(&self, _template: &TemplateIdentity, _parameters: &ParameterMap) -> Result<String, ApiError> {
            Ok("<svg/>".to_string())
        }

        async fn generate_raster(
            &self,
            _template: &TemplateIdentity,
            _parameters: &ParameterMap,
            format: RasterFormat,
            options: RasterOptions,
        ) -> Result<Bytes, ApiError> {
            self.requests.lock().expect("requests lock").push((format, options));
            if self.garbage {
                return Ok(Bytes::from_static(b"{\"error\":\"boom\"}"));
            }
            let image_format = match format {
                RasterFormat::Png => ImageFormat::Png,
                RasterFormat::Jpeg => ImageFormat::Jpeg,
            };
            Ok(encode_test_image(12, 24, image_format))
        }
    }

    #[derive(Default)]
    struct FakeClipboard {
        written: Mutex<Vec<String>>,
        denied: bool,
    }

    #[async_trait]
    impl ClipboardSink for FakeClipboard {
        async fn write_text(&self, text: String) -> Result<(), AppError> {
            if self.denied {
                return Err(AppError::ClipboardError("permission denied".to_string()));
            }
            self.written.lock().expect("written lock").push(text);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingHistory {
        entries: Mutex<Vec<HistoryEntry>>,
    }

    #[async_trait]
    impl HistoryBackend for CollectingHistory {
        async fn record_history(&self, entry: &HistoryEntry) -> Result<(), ApiError> {
            self.entries.lock().expect("entries lock").push(entry.clone());
            Ok(())
        }
    }

    struct Fixture {
        exporter: ArtifactExporter,
        backend: Arc<RasterBackend>,
        blobs: Arc<DirectoryBlobSink>,
        clipboard: Arc<FakeClipboard>,
        notifier: Arc<RecordingNotifier>,
        _dir: tempfile::TempDir,
    }

    fn fixture(backend: RasterBackend, clipboard: FakeClipboard, history: Option<Arc<HistoryRecorder>>) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = Arc::new(backend);
        let blobs = Arc::new(DirectoryBlobSink::new(dir.path()));
        let clipboard = Arc::new(clipboard);
        let notifier = Arc::new(RecordingNotifier::default());
        let exporter = ArtifactExporter::new(
            &ClientConfig::default(),
            backend.clone(),
            blobs.clone(),
            clipboard.clone(),
            notifier.clone(),
            history,
        );
        Fixture {
            exporter,
            backend,
            blobs,
            clipboard,
            notifier,
            _dir: dir,
        }
    }

    fn identity() -> TemplateIdentity {
        TemplateIdentity {
            category: "post".to_string(),
            name: "announcement.svg".to_string(),
        }
    }

    #[test]
    fn file_name_strips_svg_suffix_and_uses_millisecond_timestamp() {
        let at = Local
            .with_ymd_and_hms(2024, 12, 31, 23, 59, 58)
            .single()
            .expect("valid time")
            + chrono::Duration::milliseconds(42);

        assert_eq!(
            export_file_name("announcement.svg", ArtifactFormat::Svg, at),
            "announcement_generated_20241231235958042.svg"
        );
        assert_eq!(
            export_file_name("Banner.SVG", ArtifactFormat::Jpeg, at),
            "Banner_generated_20241231235958042.jpg"
        );
        assert_eq!(
            export_file_name("  ../  ", ArtifactFormat::Png, at),
            "template_generated_20241231235958042.png"
        );
    }

    #[tokio::test]
    async fn copy_accepts_vector_and_rejects_raster() {
        let f = fixture(RasterBackend::default(), FakeClipboard::default(), None);

        f.exporter
            .copy_to_clipboard(&Artifact::vector("<svg>hi</svg>"))
            .await
            .expect("vector copy");
        assert_eq!(*f.clipboard.written.lock().expect("written lock"), vec!["<svg>hi</svg>".to_string()]);

        let raster = Artifact::raster(RasterFormat::Png, encode_test_image(4, 4, ImageFormat::Png)).expect("png");
        let result = f.exporter.copy_to_clipboard(&raster).await;
        assert!(matches!(result, Err(AppError::ClipboardError(_))));

        let levels: Vec<_> = f.notifier.snapshot().iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![NoticeLevel::Success, NoticeLevel::Error]);
    }

    #[tokio::test]
    async fn denied_clipboard_reports_clipboard_error() {
        let clipboard = FakeClipboard {
            denied: true,
            ..FakeClipboard::default()
        };
        let f = fixture(RasterBackend::default(), clipboard, None);

        let result = f.exporter.copy_to_clipboard(&Artifact::vector("<svg/>")).await;

        assert!(matches!(result, Err(AppError::ClipboardError(_))));
        assert_eq!(f.notifier.snapshot()[0].code, Some("E_CLIPBOARD"));
    }

    #[test]
    fn download_writes_file_and_releases_blob() {
        let f = fixture(RasterBackend::default(), FakeClipboard::default(), None);

        let path = f
            .exporter
            .download(&Artifact::vector("<svg>x</svg>"), "announcement.svg")
            .expect("download");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), "<svg>x</svg>");
        let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
        assert!(name.starts_with("announcement_generated_"));
        assert!(name.ends_with(".svg"));
        assert_eq!(f.blobs.outstanding(), 0);
    }

    #[tokio::test]
    async fn jpeg_download_defaults_quality_and_is_cached() {
        let f = fixture(RasterBackend::default(), FakeClipboard::default(), None);
        let params = ParameterMap::new();

        let first = f.exporter.download_jpeg(&identity(), &params, None).await.expect("jpeg");
        let second = f.exporter.download_jpeg(&identity(), &params, None).await.expect("jpeg");

        assert_ne!(first, second);
        assert!(first.to_string_lossy().ends_with(".jpg"));
        assert_eq!(f.backend.request_count(), 1);
        let requests = f.backend.requests.lock().expect("requests lock");
        assert_eq!(requests[0].0, RasterFormat::Jpeg);
        assert_eq!(requests[0].1.quality, Some(90));
    }

    #[tokio::test]
    async fn png_request_never_sends_quality() {
        let f = fixture(RasterBackend::default(), FakeClipboard::default(), None);

        f.exporter
            .download_png(&identity(), &ParameterMap::new(), Some((1080, 1920)))
            .await
            .expect("png");

        let requests = f.backend.requests.lock().expect("requests lock");
        assert_eq!(requests[0].1.quality, None);
        assert_eq!(requests[0].1.width, Some(1080));
        assert_eq!(requests[0].1.height, Some(1920));
    }

    #[tokio::test]
    async fn invalid_quality_is_rejected_before_request() {
        let f = fixture(RasterBackend::default(), FakeClipboard::default(), None);

        let result = f.exporter.download_jpeg(&identity(), &ParameterMap::new(), Some(0)).await;

        assert!(matches!(result, Err(AppError::RasterGenerationFailed(_))));
        assert_eq!(f.backend.request_count(), 0);
    }

    #[tokio::test]
    async fn garbage_raster_payload_fails_without_writing() {
        let backend = RasterBackend {
            garbage: true,
            ..RasterBackend::default()
        };
        let f = fixture(backend, FakeClipboard::default(), None);

        let result = f.exporter.download_png(&identity(), &ParameterMap::new(), None).await;

        assert!(matches!(result, Err(AppError::RasterGenerationFailed(_))));
        assert_eq!(std::fs::read_dir(f.blobs.dir()).map(|d| d.count()).unwrap_or(0), 0);
        assert_eq!(f.notifier.snapshot()[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn raster_download_records_history_with_format() {
        let history_backend = Arc::new(CollectingHistory::default());
        let recorder = Arc::new(HistoryRecorder::new(history_backend.clone(), UserContext::signed_in("u-1")));
        let f = fixture(RasterBackend::default(), FakeClipboard::default(), Some(recorder));

        f.exporter
            .download_png(&identity(), &ParameterMap::new(), None)
            .await
            .expect("png");
        for _ in 0..1000 {
            if !history_backend.entries.lock().expect("entries lock").is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let entries = history_backend.entries.lock().expect("entries lock");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].format, "png");
    }
}
