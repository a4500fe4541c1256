//! 测地线活动轮廓 (Geodesic Active Contour) 的窄带水平集演化.
//!
//! 水平集 `u` 内负外正, 零水平集即为轮廓. 每次迭代在窄带内求解
//!
//! ```text
//! u_t = -β g |∇u| + γ g κ |∇u| + α ∇g · ∇u
//! ```
//!
//! 其中 `g` 为边缘势场, `β`, `γ`, `α` 分别为传播, 曲率与平流权重.
//! 正的传播权重使轮廓外扩; 曲率项使轮廓变得光滑; 平流项把轮廓拉向 `g` 的谷底.

mod band;
mod engine;
mod terms;

pub use band::NarrowBand;
pub use engine::Evolution;

use crate::consts::defaults;
use crate::{SegError, SegResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 演化参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvolutionConfig {
    propagation_scaling: f64,
    curvature_scaling: f64,
    advection_scaling: f64,
    maximum_iterations: u32,
    maximum_rms_error: f64,
    band_half_width: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            propagation_scaling: defaults::PROPAGATION_SCALING,
            curvature_scaling: defaults::CURVATURE_SCALING,
            advection_scaling: defaults::ADVECTION_SCALING,
            maximum_iterations: defaults::MAXIMUM_ITERATIONS,
            maximum_rms_error: defaults::MAXIMUM_RMS_ERROR,
            band_half_width: defaults::BAND_HALF_WIDTH,
        }
    }
}

impl EvolutionConfig {
    /// 构建演化参数. 窄带半宽取默认值.
    ///
    /// 三个权重必须为有限数, 传播与曲率权重非负, 迭代上限为正,
    /// 均方根阈值为正有限数, 否则返回 `InvalidConfiguration`.
    pub fn new(
        propagation_scaling: f64,
        curvature_scaling: f64,
        advection_scaling: f64,
        maximum_iterations: u32,
        maximum_rms_error: f64,
    ) -> SegResult<Self> {
        let cfg = Self {
            propagation_scaling,
            curvature_scaling,
            advection_scaling,
            maximum_iterations,
            maximum_rms_error,
            band_half_width: defaults::BAND_HALF_WIDTH,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// 设置窄带半宽 (世界坐标单位), 必须为正有限数.
    pub fn with_band_half_width(mut self, half_width: f64) -> SegResult<Self> {
        self.band_half_width = half_width;
        self.validate()?;
        Ok(self)
    }

    /// 检查参数是否合法. 反序列化得到的参数在使用前也会经过该检查.
    pub fn validate(&self) -> SegResult<()> {
        let weights = [
            self.propagation_scaling,
            self.curvature_scaling,
            self.advection_scaling,
        ];
        if !weights.iter().all(|w| w.is_finite()) {
            return Err(SegError::InvalidConfiguration("演化权重必须为有限数"));
        }
        if self.propagation_scaling < 0.0 || self.curvature_scaling < 0.0 {
            return Err(SegError::InvalidConfiguration("传播与曲率权重不能为负"));
        }
        if self.maximum_iterations == 0 {
            return Err(SegError::InvalidConfiguration("迭代上限必须为正"));
        }
        if !(self.maximum_rms_error.is_finite() && self.maximum_rms_error > 0.0) {
            return Err(SegError::InvalidConfiguration("均方根阈值必须为正有限数"));
        }
        if !(self.band_half_width.is_finite() && self.band_half_width > 0.0) {
            return Err(SegError::InvalidConfiguration("窄带半宽必须为正有限数"));
        }
        Ok(())
    }

    /// 传播权重 β.
    #[inline]
    pub fn propagation_scaling(&self) -> f64 {
        self.propagation_scaling
    }

    /// 曲率权重 γ.
    #[inline]
    pub fn curvature_scaling(&self) -> f64 {
        self.curvature_scaling
    }

    /// 平流权重 α.
    #[inline]
    pub fn advection_scaling(&self) -> f64 {
        self.advection_scaling
    }

    /// 迭代上限.
    #[inline]
    pub fn maximum_iterations(&self) -> u32 {
        self.maximum_iterations
    }

    /// 均方根变化阈值.
    #[inline]
    pub fn maximum_rms_error(&self) -> f64 {
        self.maximum_rms_error
    }

    /// 窄带半宽.
    #[inline]
    pub fn band_half_width(&self) -> f64 {
        self.band_half_width
    }
}

/// 演化状态.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Status {
    /// 仍在演化, 或被观察者中途取消.
    Running,

    /// 窄带内均方根变化低于阈值.
    ConvergedByRms,

    /// 达到迭代上限.
    StoppedByIterationCap,

    /// 数值失效. 水平集保留最后一次合法的值.
    Failed,
}

impl Status {
    /// 是否为终止状态.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Running)
    }

    /// 是否正常结束 (收敛或达到迭代上限).
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, Status::ConvergedByRms | Status::StoppedByIterationCap)
    }
}

/// 演化报告, 也作为每次迭代后传给观察者的快照.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvolutionReport {
    /// 当前状态.
    pub status: Status,

    /// 已完成的迭代次数.
    pub elapsed_iterations: u32,

    /// 最近一次迭代窄带内的均方根变化. 尚未迭代时为 `+inf`.
    pub rms_change: f64,

    /// 最近一次迭代的时间步长.
    pub time_step: f64,

    /// 重新距离化次数, 包括开始时的一次.
    pub redistances: u32,

    /// 窄带内的点数.
    pub band_len: usize,

    /// 失效原因.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub breakdown: Option<SegError>,
}
