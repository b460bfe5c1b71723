//! 收藏状态协调
//!
//! # 设计思路
//!
//! 收藏的唯一事实来源在服务端，本地只维护一个“当前模板是否已收藏”的布尔标志，
//! 并由协调器独占修改。
//!
//! # 实现思路
//!
//! - 选中模板时（已登录）异步查询收藏状态；查询期间若又切换了模板，
//!   迟到的结果按选择序号丢弃，不覆盖新模板的标志。
//! - 取消收藏没有“按模板名删除”的接口：先列出收藏，按模板名找到记录 id 再删除；
//!   找不到记录视为失败，而不是静默成功。
//! - 未登录时收藏功能失效：查询不发出，增删返回 `AuthRequired`。

use std::sync::{Arc, Mutex};

use crate::api::{FavoriteRecord, FavoritesBackend, NewFavorite};
use crate::context::UserContext;
use crate::error::AppError;
use crate::notify::{Notice, Notifier};
use crate::template::{ParameterMap, TemplateIdentity};

#[derive(Debug, Default)]
struct FavoriteState {
    selection: Option<TemplateIdentity>,
    selection_epoch: u64,
    is_favorite: bool,
}

pub struct FavoriteCoordinator {
    backend: Arc<dyn FavoritesBackend>,
    user: UserContext,
    notifier: Arc<dyn Notifier>,
    state: Mutex<FavoriteState>,
}

impl FavoriteCoordinator {
    pub fn new(backend: Arc<dyn FavoritesBackend>, user: UserContext, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            user,
            notifier,
            state: Mutex::new(FavoriteState::default()),
        }
    }

    /// 收藏按钮是否可用（表现层据此隐藏或禁用）。
    pub fn is_enabled(&self) -> bool {
        self.user.is_signed_in()
    }

    /// 当前选中模板是否已收藏。
    pub fn is_favorite(&self) -> bool {
        self.lock_state().map(|state| state.is_favorite).unwrap_or(false)
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, FavoriteState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::FavoriteOperationFailed("收藏状态锁已中毒".to_string()))
    }

    /// 选中模板：重置标志，已登录时查询远端状态。
    pub async fn on_template_selected(&self, template: &TemplateIdentity) -> Result<bool, AppError> {
        let epoch = {
            let mut state = self.lock_state()?;
            state.selection = Some(template.clone());
            state.selection_epoch += 1;
            state.is_favorite = false;
            state.selection_epoch
        };

        let Some(user_id) = self.user.user_id() else {
            return Ok(false);
        };

        let is_favorite = match self.backend.is_favorite(user_id, &template.name).await {
            Ok(value) => value,
            Err(err) => {
                log::warn!("⚠️ 查询收藏状态失败 - {}: {}", template, err);
                return Err(AppError::favorite(err));
            }
        };

        let mut state = self.lock_state()?;
        if state.selection_epoch != epoch {
            log::debug!("⏭️ 丢弃过期的收藏状态 - {}", template);
            return Ok(state.is_favorite);
        }
        state.is_favorite = is_favorite;
        Ok(is_favorite)
    }

    /// 添加收藏。
    pub async fn add_favorite(
        &self,
        template: &TemplateIdentity,
        parameters: Option<ParameterMap>,
        notes: Option<String>,
    ) -> Result<FavoriteRecord, AppError> {
        let result = self.add_favorite_inner(template, parameters, notes).await;
        match &result {
            Ok(_) => self.notifier.notify(Notice::success("已添加到收藏")),
            Err(err) => self.notifier.notify(Notice::error(err)),
        }
        result
    }

    async fn add_favorite_inner(
        &self,
        template: &TemplateIdentity,
        parameters: Option<ParameterMap>,
        notes: Option<String>,
    ) -> Result<FavoriteRecord, AppError> {
        let user_id = self.user.user_id().ok_or(AppError::AuthRequired)?;
        let request = NewFavorite::new(template, parameters, notes);

        let record = self
            .backend
            .add_favorite(user_id, &request)
            .await
            .map_err(AppError::favorite)?;

        self.set_flag_if_current(template, true)?;
        log::info!("⭐ 已收藏模板 - {}", template);
        Ok(record)
    }

    /// 取消收藏：列出 → 按模板名查找 → 按 id 删除。
    pub async fn remove_favorite(&self, template: &TemplateIdentity) -> Result<(), AppError> {
        let result = self.remove_favorite_inner(template).await;
        match &result {
            Ok(()) => self.notifier.notify(Notice::success("已从收藏中移除")),
            Err(err) => self.notifier.notify(Notice::error(err)),
        }
        result
    }

    async fn remove_favorite_inner(&self, template: &TemplateIdentity) -> Result<(), AppError> {
        let user_id = self.user.user_id().ok_or(AppError::AuthRequired)?;

        let favorites = self.backend.list_favorites(user_id).await.map_err(AppError::favorite)?;
        let record = favorites
            .iter()
            .find(|record| record.template_name == template.name)
            .ok_or_else(|| AppError::FavoriteOperationFailed(format!("未找到模板 {} 的收藏记录", template.name)))?;

        self.backend
            .remove_favorite(user_id, &record.id)
            .await
            .map_err(AppError::favorite)?;

        self.set_flag_if_current(template, false)?;
        log::info!("🗑️ 已取消收藏 - {} (id={})", template, record.id);
        Ok(())
    }

    /// 收藏按钮：已收藏则取消，否则添加。返回操作后的状态。
    pub async fn toggle_favorite(
        &self,
        template: &TemplateIdentity,
        parameters: Option<ParameterMap>,
    ) -> Result<bool, AppError> {
        if self.is_favorite() {
            self.remove_favorite(template).await?;
            Ok(false)
        } else {
            self.add_favorite(template, parameters, None).await?;
            Ok(true)
        }
    }

    fn set_flag_if_current(&self, template: &TemplateIdentity, value: bool) -> Result<(), AppError> {
        let mut state = self.lock_state()?;
        if state.selection.as_ref() == Some(template) {
            state.is_favorite = value;
        }
        Ok(())
    }
}
