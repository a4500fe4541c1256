//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色. 掩码中轮廓外部的默认像素值.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色. 掩码中轮廓内部的默认像素值.
    pub const WHITE: u8 = 0b_1111_1111;
}

/// 演化参数的默认值. 取自经典的测地线活动轮廓分割示例.
pub mod defaults {
    /// 传播 (膨胀) 项系数.
    pub const PROPAGATION_SCALING: f64 = 1.0;

    /// 曲率 (平滑) 项系数.
    pub const CURVATURE_SCALING: f64 = 1.0;

    /// 平流 (吸附到边缘) 项系数.
    pub const ADVECTION_SCALING: f64 = 1.0;

    /// 最大迭代次数.
    pub const MAXIMUM_ITERATIONS: u32 = 800;

    /// 收敛判定的 RMS 变化门限.
    pub const MAXIMUM_RMS_ERROR: f64 = 0.02;

    /// 窄带半宽 (世界坐标单位).
    pub const BAND_HALF_WIDTH: f64 = 4.0;

    /// 快速行进的默认常数速度 (即普通距离).
    pub const SPEED_CONSTANT: f64 = 1.0;

    /// 阈值提取的下限 (闭区间).
    pub const THRESHOLD_LOWER: f64 = -1000.0;

    /// 阈值提取的上限 (闭区间).
    pub const THRESHOLD_UPPER: f64 = 0.0;
}

/// 快速行进中尚未到达的点的取值.
pub const FAR_SENTINEL: f64 = f64::INFINITY;

/// 梯度模平方低于此值时, 视为法向无定义.
pub const DEGENERATE_GRADIENT: f64 = 1e-12;

/// 网格点相对于轮廓的位置.
///
/// 全 crate 统一使用 "内负外正" 的符号约定: 值不大于 0 的点 (包括恰为 0
/// 的点) 在轮廓内部, 其余在轮廓外部. 默认阈值 `[-1000, 0]` 与之一致.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
    /// 水平集取值不大于 0.
    Inside,

    /// 水平集取值为正.
    Outside,
}

impl Side {
    /// 根据水平集取值判定位置.
    #[inline]
    pub fn of(value: f64) -> Self {
        if value <= 0.0 {
            Self::Inside
        } else {
            Self::Outside
        }
    }

    /// 是否在轮廓内部.
    #[inline]
    pub fn is_inside(&self) -> bool {
        matches!(self, Self::Inside)
    }

    /// 是否在轮廓外部.
    #[inline]
    pub fn is_outside(&self) -> bool {
        !self.is_inside()
    }

    /// 内部为 `-1.0`, 外部为 `1.0`.
    #[inline]
    pub fn signum(&self) -> f64 {
        match self {
            Self::Inside => -1.0,
            Self::Outside => 1.0,
        }
    }
}
