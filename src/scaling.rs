//! 预览缩放计算模块
//!
//! 根据模板原始像素尺寸与视口预算，计算保持宽高比的显示尺寸。
//! 同一函数服务两个调用点：行内预览（较小预算、较低下限）与放大弹窗（较大预算、较高下限）。
//!
//! # 设计思路
//!
//! - 纯函数：输入为源尺寸、预算、下限，输出唯一的 `ScaledBox`，无副作用，便于测试。
//! - 先按比例缩放，再做下限收敛；两步分开，逻辑清晰。
//! - 下限对宽、高**独立**生效，可能破坏宽高比。这是有意的取舍：
//!   保证极端比例的模板仍有可用的最小显示尺寸。
//! - 异常输入（零尺寸）给出安全回退，避免上层崩溃。

use serde::{Deserialize, Serialize};

use crate::template::Dimensions;

/// 抵消 `a / b * b` 的浮点舍入误差，避免整数结果被向下取整成少 1 像素。
const FLOOR_EPSILON: f64 = 1e-9;

/// 缩放结果。每次渲染时重新计算，不持久化。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaledBox {
    pub width: u32,
    pub height: u32,
    pub ratio: f64,
}

/// 视口预算：最大可用尺寸 + 最小显示尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewBudget {
    pub max_width: u32,
    pub max_height: u32,
    #[serde(default)]
    pub min_width: u32,
    #[serde(default)]
    pub min_height: u32,
}

impl PreviewBudget {
    /// 行内预览预算（卡片内 350×350）。
    pub const INLINE: PreviewBudget = PreviewBudget {
        max_width: 350,
        max_height: 350,
        min_width: 100,
        min_height: 100,
    };

    /// 放大弹窗预算（800×600）。
    pub const MODAL: PreviewBudget = PreviewBudget {
        max_width: 800,
        max_height: 600,
        min_width: 300,
        min_height: 300,
    };

    pub fn fit(&self, source: Dimensions) -> ScaledBox {
        compute_scaled_box(
            source.width,
            source.height,
            self.max_width,
            self.max_height,
            self.min_width,
            self.min_height,
        )
    }
}

/// 计算保持宽高比的缩放尺寸。
///
/// # 算法
/// 1. `ratio = min(max_width / source_width, max_height / source_height)`
/// 2. `width = floor(source_width * ratio)`，`height` 同理
/// 3. 宽、高分别向上收敛到 `min_width` / `min_height`
///
/// # 后置条件
/// - `width >= min_width`，`height >= min_height`（总是成立）
/// - 下限为 0 时：`width <= max_width`，`height <= max_height`
/// - 未触发下限时：宽高比与源尺寸一致（向下取整误差内）
///
/// # 异常输入
/// 源尺寸或预算任一维度为 0 时无法计算比例，返回下限尺寸且 `ratio = 0.0`。
///
/// # 示例
/// ```
/// use template_studio::scaling::compute_scaled_box;
///
/// let scaled = compute_scaled_box(1080, 1920, 350, 350, 0, 0);
/// assert_eq!((scaled.width, scaled.height), (196, 350));
/// ```
pub fn compute_scaled_box(
    source_width: u32,
    source_height: u32,
    max_width: u32,
    max_height: u32,
    min_width: u32,
    min_height: u32,
) -> ScaledBox {
    if source_width == 0 || source_height == 0 || max_width == 0 || max_height == 0 {
        log::warn!(
            "Zero-sized source ({}x{}) or budget ({}x{}). Falling back to minimum size.",
            source_width,
            source_height,
            max_width,
            max_height
        );
        return ScaledBox {
            width: min_width,
            height: min_height,
            ratio: 0.0,
        };
    }

    let ratio = (max_width as f64 / source_width as f64).min(max_height as f64 / source_height as f64);

    let width = (source_width as f64 * ratio + FLOOR_EPSILON).floor() as u32;
    let height = (source_height as f64 * ratio + FLOOR_EPSILON).floor() as u32;

    ScaledBox {
        width: width.max(min_width),
        height: height.max(min_height),
        ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn square_template_fills_square_budget() {
        let result = compute_scaled_box(1080, 1080, 350, 350, 0, 0);
        assert_eq!(result.width, 350);
        assert_eq!(result.height, 350);
    }

    #[test]
    fn story_template_is_height_bound() {
        // 1080x1920 → ratio = 350/1920
        let result = compute_scaled_box(1080, 1920, 350, 350, 0, 0);
        assert_eq!(result.height, 350);
        assert_eq!(result.width, 196);
        assert!((result.ratio - 350.0 / 1920.0).abs() < 1e-12);
    }

    #[test]
    fn modal_budget_is_width_or_height_bound() {
        let post = compute_scaled_box(1080, 1080, 800, 600, 0, 0);
        assert_eq!((post.width, post.height), (600, 600));

        let banner = compute_scaled_box(1600, 400, 800, 600, 0, 0);
        assert_eq!((banner.width, banner.height), (800, 200));
    }

    #[test]
    fn small_source_is_upscaled_to_budget() {
        let result = compute_scaled_box(100, 50, 800, 600, 0, 0);
        assert_eq!((result.width, result.height), (800, 400));
        assert!((result.ratio - 8.0).abs() < 1e-12);
    }

    #[test]
    fn minimum_clamp_breaks_ratio_for_extreme_aspect() {
        // 极窄长条：按比例高度只有 3px，下限把它拉到 100px
        let result = compute_scaled_box(3000, 30, 350, 350, 100, 100);
        assert_eq!(result.width, 350);
        assert_eq!(result.height, 100);
    }

    #[test]
    fn zero_source_falls_back_to_minimum() {
        let result = compute_scaled_box(0, 1080, 350, 350, 100, 120);
        assert_eq!((result.width, result.height), (100, 120));
        assert_eq!(result.ratio, 0.0);
    }

    #[test]
    fn budgets_produce_distinct_sizes_for_same_template() {
        let dims = Dimensions { width: 1080, height: 1920 };
        let inline = PreviewBudget::INLINE.fit(dims);
        let modal = PreviewBudget::MODAL.fit(dims);

        assert_eq!((inline.width, inline.height), (196, 350));
        assert_eq!((modal.width, modal.height), (337, 600));
    }

    #[test]
    fn deterministic() {
        let a = compute_scaled_box(1234, 567, 800, 600, 10, 10);
        let b = compute_scaled_box(1234, 567, 800, 600, 10, 10);
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn preserves_aspect_ratio_without_clamp(
            sw in 1u32..10_000,
            sh in 1u32..10_000,
            mw in 1u32..4_000,
            mh in 1u32..4_000,
        ) {
            let result = compute_scaled_box(sw, sh, mw, mh, 0, 0);
            let aspect = sw as f64 / sh as f64;
            let drift = (result.width as f64 - result.height as f64 * aspect).abs();
            prop_assert!(drift <= aspect.max(1.0) + 1e-6, "drift {} for aspect {}", drift, aspect);
        }

        #[test]
        fn never_exceeds_budget_without_minimum(
            sw in 1u32..10_000,
            sh in 1u32..10_000,
            mw in 1u32..4_000,
            mh in 1u32..4_000,
        ) {
            let result = compute_scaled_box(sw, sh, mw, mh, 0, 0);
            prop_assert!(result.width <= mw);
            prop_assert!(result.height <= mh);
        }

        #[test]
        fn always_respects_minimum(
            sw in 1u32..10_000,
            sh in 1u32..10_000,
            mw in 1u32..4_000,
            mh in 1u32..4_000,
            min_w in 0u32..1_000,
            min_h in 0u32..1_000,
        ) {
            let result = compute_scaled_box(sw, sh, mw, mh, min_w, min_h);
            prop_assert!(result.width >= min_w);
            prop_assert!(result.height >= min_h);
        }
    }
}
