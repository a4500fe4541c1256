//! 带种子的 Eikonal 距离图求解 (快速行进, Fast Marching).
//!
//! 给定一组种子 `(索引, 初始值)` 与传播速度 `F`, 求解 `|∇T| = 1 / F`,
//! 使得种子处 `T` 恰为初始值, 且 `T` 沿波前推进顺序单调不减.
//!
//! 当种子初始值为 `-r` 且速度为常数 1 时, 结果的零交叉近似为半径 `r`
//! 的球面, 这正是演化引擎所需的初始水平集 (内负外正).

mod imp;

pub(crate) use imp::{Buffers, FastMarching};

use crate::consts::defaults::SPEED_CONSTANT;
use crate::grid::{Field, Geometry};
use crate::threshold::BinaryMask;
use crate::{Idx2d, SegError, SegResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 种子点: N 维索引及其初始 (带符号) 值.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Seed {
    /// N 维索引.
    pub index: Vec<usize>,

    /// 初始值. 通常为期望初始轮廓距离的相反数.
    pub value: f64,
}

impl Seed {
    /// 构建种子.
    #[inline]
    pub fn new<I: Into<Vec<usize>>>(index: I, value: f64) -> Self {
        Self {
            index: index.into(),
            value,
        }
    }
}

impl From<(Idx2d, f64)> for Seed {
    #[inline]
    fn from(((h, w), value): (Idx2d, f64)) -> Self {
        Self::new(vec![h, w], value)
    }
}

/// 波前传播速度.
#[derive(Clone, Debug)]
pub enum Speed {
    /// 处处相同的正速度. 速度为 1 时结果即为普通距离.
    Constant(f64),

    /// 逐点速度. 速度为 0 的点永远不会被到达, 保持 `+inf`.
    Map(Field),
}

impl Speed {
    /// 线性索引 `p` 处的速度.
    #[inline]
    pub(crate) fn at(&self, p: usize) -> f64 {
        match self {
            Speed::Constant(c) => *c,
            Speed::Map(m) => m.at(p),
        }
    }
}

/// 距离图求解配置.
#[derive(Clone, Debug)]
pub struct DistanceConfig {
    geometry: Geometry,
    speed: Speed,
    stopping_value: Option<f64>,
    target: Option<Vec<bool>>,
}

impl DistanceConfig {
    /// 以输出网格几何构建. 默认速度为常数 1, 不设停止值.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            speed: Speed::Constant(SPEED_CONSTANT),
            stopping_value: None,
            target: None,
        }
    }

    /// 设置常数速度. `speed` 必须为正有限数.
    pub fn with_speed_constant(mut self, speed: f64) -> SegResult<Self> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(SegError::InvalidConfiguration("常数速度必须为正有限数"));
        }
        self.speed = Speed::Constant(speed);
        Ok(self)
    }

    /// 设置逐点速度图. 速度图必须与输出网格几何一致, 且取值为非负有限数.
    pub fn with_speed_map(mut self, map: Field) -> SegResult<Self> {
        if map.geometry() != &self.geometry {
            return Err(SegError::GridMismatch);
        }
        if !map.as_slice().iter().all(|&v| v.is_finite() && v >= 0.0) {
            return Err(SegError::InvalidConfiguration("速度图取值必须为非负有限数"));
        }
        self.speed = Speed::Map(map);
        Ok(self)
    }

    /// 设置停止值: 一旦最小的试探值超过它, 推进即停止, 其余点保持 `+inf`.
    pub fn with_stopping_value(mut self, value: f64) -> SegResult<Self> {
        if value.is_nan() {
            return Err(SegError::InvalidConfiguration("停止值不能为 NaN"));
        }
        self.stopping_value = Some(value);
        Ok(self)
    }

    /// 设置目标区域: 掩膜前景点全部被确定后推进即停止, 其余点保持 `+inf`.
    ///
    /// 掩膜的网格几何必须与输出网格一致, 否则返回 `GridMismatch`.
    pub fn with_target_region(mut self, region: &BinaryMask) -> SegResult<Self> {
        if region.geometry() != &self.geometry {
            return Err(SegError::GridMismatch);
        }
        let fg = region.foreground();
        self.target = Some(region.view().iter().map(|&v| v == fg).collect());
        Ok(self)
    }

    /// 输出网格几何.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// 传播速度.
    #[inline]
    pub fn speed(&self) -> &Speed {
        &self.speed
    }

    /// 停止值.
    #[inline]
    pub fn stopping_value(&self) -> Option<f64> {
        self.stopping_value
    }

    /// 目标区域, 与网格点一一对应 (行优先).
    #[inline]
    pub fn target_region(&self) -> Option<&[bool]> {
        self.target.as_deref()
    }
}

/// 从 `seeds` 出发求解距离图.
///
/// 所有种子在推进开始前被检查: 维度不符, 越界或初始值非有限数的种子返回
/// `InvalidSeed`. 重复种子取较小的初始值. 无法到达的点 (零速度区域,
/// 超出停止值, 或目标区域覆盖之后) 保持 `+inf`, 这不是错误.
pub fn distance_map(seeds: &[Seed], config: &DistanceConfig) -> SegResult<Field> {
    let geometry = config.geometry();
    let mut linear = Vec::with_capacity(seeds.len());
    for (i, seed) in seeds.iter().enumerate() {
        match geometry.linear(&seed.index) {
            Some(p) if seed.value.is_finite() => linear.push((p, seed.value)),
            _ => return Err(SegError::InvalidSeed(i)),
        }
    }

    let mut marching = FastMarching::new(
        geometry,
        config.speed(),
        config.stopping_value().unwrap_or(f64::INFINITY),
        |_| true,
    );
    if let Some(target) = config.target_region() {
        marching = marching.with_target(target);
    }
    let marched = marching.run(linear);
    log::debug!(
        "fast marching: {} seeds, {} of {} points accepted",
        seeds.len(),
        marched.accepted.len(),
        geometry.len()
    );
    marched.into_field(geometry)
}
