//! 历史记录写入
//!
//! # 设计思路
//!
//! 历史记录与生成结果处于隔离的失败域：写入失败只记录日志，
//! 绝不能让一次已经成功的生成或下载被报告为失败。
//!
//! # 实现思路
//!
//! - `record` 返回 `Result`，便于单独测试与诊断。
//! - `record_detached` 在当前 tokio 运行时上“发射后不管”，错误在任务内吞掉并记录。
//! - 未登录时直接跳过（历史记录需要用户身份）。
//! - 后台任务句柄保留到 `flush`，短生命周期宿主（CLI）退出前可等待写入完成。

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::api::{HistoryBackend, HistoryEntry};
use crate::artifact::ArtifactFormat;
use crate::context::UserContext;
use crate::error::AppError;
use crate::template::{ParameterMap, TemplateIdentity};

pub struct HistoryRecorder {
    backend: Arc<dyn HistoryBackend>,
    user: UserContext,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl HistoryRecorder {
    pub fn new(backend: Arc<dyn HistoryBackend>, user: UserContext) -> Self {
        Self {
            backend,
            user,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// 写入一条历史记录。
    ///
    /// 返回 `Ok(false)` 表示未登录而跳过。
    pub async fn record(
        &self,
        template: &TemplateIdentity,
        parameters: &ParameterMap,
        format: ArtifactFormat,
    ) -> Result<bool, AppError> {
        let Some(user_id) = self.user.user_id() else {
            log::debug!("⏭️ 未登录，跳过历史记录");
            return Ok(false);
        };

        let entry = HistoryEntry {
            template_name: template.name.clone(),
            template_category: template.category.clone(),
            parameters: parameters.clone(),
            user_id: user_id.to_string(),
            format: format.history_name().to_string(),
        };

        self.backend.record_history(&entry).await.map_err(AppError::history)?;
        log::debug!("📝 已写入历史记录 - {} ({})", template, entry.format);
        Ok(true)
    }

    /// 后台写入，失败只记录日志。
    pub fn record_detached(
        self: &Arc<Self>,
        template: TemplateIdentity,
        parameters: ParameterMap,
        format: ArtifactFormat,
    ) {
        if !self.user.is_signed_in() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("⚠️ 当前无异步运行时，跳过历史记录 - {}", template);
            return;
        };

        let recorder = Arc::clone(self);
        let handle = runtime.spawn(async move {
            if let Err(err) = recorder.record(&template, &parameters, format).await {
                log::warn!("⚠️ {} - {}（不影响生成结果）", err, template);
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|task| !task.is_finished());
            pending.push(handle);
        }
    }

    /// 等待所有后台写入结束。
    pub async fn flush(&self) {
        let tasks = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("⚠️ 历史记录任务异常结束: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use async_trait::async_trait;

    #[derive(Default)]
    struct FakeHistory {
        fail: bool,
        entries: Mutex<Vec<HistoryEntry>>,
    }

    #[async_trait]
    impl HistoryBackend for FakeHistory {
        async fn record_history(&self, entry: &HistoryEntry) -> Result<(), ApiError> {
            self.entries.lock().expect("entries lock").push(entry.clone());
            if self.fail {
                return Err(ApiError::Http { status: 503 });
            }
            Ok(())
        }
    }

    fn identity() -> TemplateIdentity {
        TemplateIdentity {
            category: "post".to_string(),
            name: "announcement.svg".to_string(),
        }
    }

    #[tokio::test]
    async fn records_entry_for_signed_in_user() {
        let backend = Arc::new(FakeHistory::default());
        let recorder = HistoryRecorder::new(backend.clone(), UserContext::signed_in("u-1"));
        let mut params = ParameterMap::new();
        params.insert("title".to_string(), "Hi".to_string());

        let recorded = recorder
            .record(&identity(), &params, ArtifactFormat::Jpeg)
            .await
            .expect("record should succeed");

        assert!(recorded);
        let entries = backend.entries.lock().expect("entries lock");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, "u-1");
        assert_eq!(entries[0].format, "jpeg");
        assert_eq!(entries[0].parameters, params);
    }

    #[tokio::test]
    async fn skips_when_anonymous() {
        let backend = Arc::new(FakeHistory::default());
        let recorder = HistoryRecorder::new(backend.clone(), UserContext::anonymous());

        let recorded = recorder
            .record(&identity(), &ParameterMap::new(), ArtifactFormat::Svg)
            .await
            .expect("skip is not an error");

        assert!(!recorded);
        assert!(backend.entries.lock().expect("entries lock").is_empty());
    }

    #[tokio::test]
    async fn backend_failure_maps_to_history_write_failed() {
        let backend = Arc::new(FakeHistory {
            fail: true,
            ..FakeHistory::default()
        });
        let recorder = HistoryRecorder::new(backend, UserContext::signed_in("u-1"));

        let result = recorder.record(&identity(), &ParameterMap::new(), ArtifactFormat::Svg).await;
        assert!(matches!(result, Err(AppError::HistoryWriteFailed(_))));
    }

    #[tokio::test]
    async fn flush_waits_for_detached_writes() {
        let backend = Arc::new(FakeHistory {
            fail: true,
            ..FakeHistory::default()
        });
        let recorder = Arc::new(HistoryRecorder::new(backend.clone(), UserContext::signed_in("u-1")));

        recorder.record_detached(identity(), ParameterMap::new(), ArtifactFormat::Png);
        recorder.flush().await;

        let entries = backend.entries.lock().expect("entries lock");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].format, "png");
    }

    #[test]
    fn detached_without_runtime_does_not_panic() {
        let backend = Arc::new(FakeHistory::default());
        let recorder = Arc::new(HistoryRecorder::new(backend.clone(), UserContext::signed_in("u-1")));

        recorder.record_detached(identity(), ParameterMap::new(), ArtifactFormat::Svg);
        assert!(backend.entries.lock().expect("entries lock").is_empty());
    }
}
