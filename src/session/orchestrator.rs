//! 生成会话编排
//!
//! # 设计思路
//!
//! 一个 `GenerationSession` 对应一个模板会话，独占该会话的 `ParameterMap` 与
//! `GenerationState`。生成请求可以在途重叠（传输层不取消），结果是否生效由
//! 过期保护决定：
//!
//! - `template_epoch`：每次切换模板递增
//! - `params_revision`：每次编辑 / 重置参数递增
//! - `seq`：每次发起请求递增，只有比“最近已落定”更新的请求才允许落定
//!
//! 响应到达时三者都匹配才写入产物槽位，否则丢弃。
//!
//! # 实现思路
//!
//! - 请求发起时在锁内拍下“票据”（序号、纪元、修订号、参数快照），
//!   锁不跨越 `await`，等待期间的编辑与切换都能立即生效。
//! - 被丢弃的响应若恰好是最后一次发起的请求，状态回落到上一次成功或 `Idle`，
//!   不会永久停留在 `Generating`。
//! - 后台生成失败只记日志并保留上一次预览；用户主动生成失败给出可重试提示。
//! - 成功后按配置“发射后不管”地写历史记录，写入失败不影响生成结果。
//! - 记录 `request/total` 阶段耗时，便于诊断慢请求。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{GenerationOutcome, GenerationState, Trigger};
use crate::api::TemplateBackend;
use crate::artifact::{Artifact, ArtifactFormat};
use crate::config::ClientConfig;
use crate::context::UserContext;
use crate::error::AppError;
use crate::notify::{Notice, Notifier};
use crate::records::HistoryRecorder;
use crate::scaling::{PreviewBudget, ScaledBox};
use crate::template::{ParameterMap, TemplateDescriptor, TemplateIdentity, build_defaults};

/// 会话级策略，构造时从 `ClientConfig` 拍下快照。
#[derive(Debug, Clone, Copy)]
struct SessionOptions {
    timeout_ms: Option<u64>,
    record_history: bool,
    preview_budget: PreviewBudget,
    modal_budget: PreviewBudget,
}

impl From<&ClientConfig> for SessionOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            timeout_ms: config.generation_timeout_ms,
            record_history: config.record_history,
            preview_budget: config.preview_budget,
            modal_budget: config.modal_budget,
        }
    }
}

struct SessionInner {
    template: TemplateDescriptor,
    parameters: ParameterMap,
    state: GenerationState,
    last_artifact: Option<Artifact>,
    template_epoch: u64,
    params_revision: u64,
    next_request_seq: u64,
    latest_issued_seq: u64,
    latest_committed_seq: u64,
}

/// 发起请求时拍下的快照。
struct Ticket {
    seq: u64,
    epoch: u64,
    revision: u64,
    identity: TemplateIdentity,
    parameters: ParameterMap,
}

/// 单模板生成会话。
pub struct GenerationSession {
    backend: Arc<dyn TemplateBackend>,
    user: UserContext,
    notifier: Arc<dyn Notifier>,
    history: Option<Arc<HistoryRecorder>>,
    options: SessionOptions,
    inner: Mutex<SessionInner>,
}

impl GenerationSession {
    /// 创建会话，初始状态为 `Idle`，参数为占位符默认值。
    ///
    /// 创建后调用 [`GenerationSession::mount`] 触发首次自动生成。
    pub fn new(
        template: TemplateDescriptor,
        backend: Arc<dyn TemplateBackend>,
        user: UserContext,
        config: &ClientConfig,
        notifier: Arc<dyn Notifier>,
        history: Option<Arc<HistoryRecorder>>,
    ) -> Self {
        let parameters = build_defaults(&template.placeholders);
        Self {
            backend,
            user,
            notifier,
            history,
            options: SessionOptions::from(config),
            inner: Mutex::new(SessionInner {
                template,
                parameters,
                state: GenerationState::Idle,
                last_artifact: None,
                template_epoch: 0,
                params_revision: 0,
                next_request_seq: 0,
                latest_issued_seq: 0,
                latest_committed_seq: 0,
            }),
        }
    }

    // 锁内不会 panic；即便中毒也沿用内部数据。
    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> GenerationState {
        self.inner().state.clone()
    }

    /// 当前应展示的产物：最近一次成功落定的结果，失败不会清空它。
    pub fn displayed_artifact(&self) -> Option<Artifact> {
        self.inner().last_artifact.clone()
    }

    pub fn parameters(&self) -> ParameterMap {
        self.inner().parameters.clone()
    }

    pub fn template(&self) -> TemplateDescriptor {
        self.inner().template.clone()
    }

    pub fn identity(&self) -> TemplateIdentity {
        self.inner().template.identity()
    }

    /// 行内预览尺寸。
    pub fn preview_box(&self) -> ScaledBox {
        self.options.preview_budget.fit(self.inner().template.dimensions)
    }

    /// 放大弹窗尺寸。
    pub fn modal_box(&self) -> ScaledBox {
        self.options.modal_budget.fit(self.inner().template.dimensions)
    }

    /// 挂载：默认参数非空时自动生成一次。
    pub async fn mount(&self) -> Option<GenerationOutcome> {
        let has_defaults = !self.inner().parameters.is_empty();
        if !has_defaults {
            log::debug!("⏸️ 模板无默认参数，等待用户填写 - {}", self.identity());
            return None;
        }
        Some(self.generate(Trigger::Background).await)
    }

    /// 切换模板：重置参数、丢弃旧产物，在途的旧请求随纪元递增而失效。
    pub async fn on_template_change(&self, template: TemplateDescriptor) -> Option<GenerationOutcome> {
        let has_defaults = {
            let mut inner = self.inner();
            log::info!("🔀 切换模板 {} → {}", inner.template.identity(), template.identity());
            inner.parameters = build_defaults(&template.placeholders);
            inner.template = template;
            inner.template_epoch += 1;
            inner.params_revision += 1;
            inner.last_artifact = None;
            inner.state = GenerationState::Idle;
            !inner.parameters.is_empty()
        };

        if has_defaults {
            Some(self.generate(Trigger::Background).await)
        } else {
            None
        }
    }

    /// 编辑一个占位符的值。
    ///
    /// 所有占位符都有值（空字符串也算）时自动重新生成；不做 `required` 校验。
    pub async fn on_field_change(
        &self,
        key: &str,
        value: impl Into<String>,
    ) -> Result<Option<GenerationOutcome>, AppError> {
        let complete = {
            let mut inner = self.inner();
            if !inner.template.declares(key) {
                return Err(AppError::UnknownPlaceholder(key.to_string()));
            }
            inner.parameters.insert(key.to_string(), value.into());
            inner.params_revision += 1;
            inner.template.is_complete(&inner.parameters)
        };

        if !complete {
            return Ok(None);
        }
        Ok(Some(self.generate(Trigger::Background).await))
    }

    /// 恢复默认参数并重新生成。
    pub async fn reset(&self) -> GenerationOutcome {
        {
            let mut inner = self.inner();
            inner.parameters = build_defaults(&inner.template.placeholders);
            inner.params_revision += 1;
        }
        self.notifier.notify(Notice::info("已恢复默认参数"));
        self.generate(Trigger::Explicit).await
    }

    /// 以当前参数发起一次生成。
    pub async fn generate(&self, trigger: Trigger) -> GenerationOutcome {
        let ticket = self.begin();
        log::info!(
            "📡 开始生成 #{} - {}（{} 个参数，{:?}）",
            ticket.seq,
            ticket.identity,
            ticket.parameters.len(),
            trigger
        );

        let started = Instant::now();
        let result = self.request(&ticket).await;
        let request_ms = started.elapsed().as_millis();

        let outcome = self.settle(&ticket, result);
        match &outcome {
            GenerationOutcome::Committed(artifact) => {
                log::info!(
                    "✅ 生成完成 #{} - {} ({} bytes, request={}ms, total={}ms)",
                    ticket.seq,
                    ticket.identity,
                    artifact.len(),
                    request_ms,
                    started.elapsed().as_millis()
                );
                if trigger == Trigger::Explicit {
                    self.notifier.notify(Notice::success("生成成功"));
                }
                self.record_history(&ticket);
            }
            GenerationOutcome::Failed(err) => match trigger {
                Trigger::Explicit => {
                    log::error!("❌ 生成失败 #{} - {}: {}", ticket.seq, ticket.identity, err);
                    self.notifier.notify(Notice::error(err).retryable());
                }
                Trigger::Background => {
                    log::warn!("⚠️ 后台生成失败 #{} - {}: {}（保留上一次预览）", ticket.seq, ticket.identity, err);
                }
            },
            GenerationOutcome::Discarded => {
                log::debug!("⏭️ 丢弃过期响应 #{} - {} (request={}ms)", ticket.seq, ticket.identity, request_ms);
            }
        }
        outcome
    }

    fn begin(&self) -> Ticket {
        let mut inner = self.inner();
        inner.next_request_seq += 1;
        let seq = inner.next_request_seq;
        inner.latest_issued_seq = seq;
        inner.state = GenerationState::Generating;
        Ticket {
            seq,
            epoch: inner.template_epoch,
            revision: inner.params_revision,
            identity: inner.template.identity(),
            parameters: inner.parameters.clone(),
        }
    }

    async fn request(&self, ticket: &Ticket) -> Result<Artifact, AppError> {
        let call = self.backend.generate(&ticket.identity, &ticket.parameters);
        let response = match self.options.timeout_ms {
            Some(limit_ms) => tokio::time::timeout(Duration::from_millis(limit_ms), call)
                .await
                .map_err(|_| AppError::Timeout(limit_ms))?,
            None => call.await,
        };

        let markup = response.map_err(AppError::generation)?;
        if markup.trim().is_empty() {
            return Err(AppError::GenerationFailed("生成服务返回了空内容".to_string()));
        }
        Ok(Artifact::vector(markup))
    }

    /// 过期检查并落定结果。
    fn settle(&self, ticket: &Ticket, result: Result<Artifact, AppError>) -> GenerationOutcome {
        let mut inner = self.inner();

        let stale = ticket.epoch != inner.template_epoch
            || ticket.revision != inner.params_revision
            || ticket.seq <= inner.latest_committed_seq;
        if stale {
            if ticket.seq == inner.latest_issued_seq && inner.state.is_generating() {
                inner.state = match inner.last_artifact.clone() {
                    Some(artifact) => GenerationState::Succeeded(artifact),
                    None => GenerationState::Idle,
                };
            }
            return GenerationOutcome::Discarded;
        }

        inner.latest_committed_seq = ticket.seq;
        // 更新的请求仍在途时保持 Generating。
        let newest = ticket.seq == inner.latest_issued_seq;
        match result {
            Ok(artifact) => {
                inner.last_artifact = Some(artifact.clone());
                if newest {
                    inner.state = GenerationState::Succeeded(artifact.clone());
                }
                GenerationOutcome::Committed(artifact)
            }
            Err(err) => {
                if newest {
                    inner.state = GenerationState::Failed(err.clone());
                }
                GenerationOutcome::Failed(err)
            }
        }
    }

    fn record_history(&self, ticket: &Ticket) {
        if !self.options.record_history || !self.user.is_signed_in() {
            return;
        }
        if let Some(history) = &self.history {
            history.record_detached(ticket.identity.clone(), ticket.parameters.clone(), ArtifactFormat::Svg);
        }
    }
}
