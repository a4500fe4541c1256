//! 边缘势场: 演化引擎只读的特征输入.
//!
//! 势场 `g` 取值于 `[0, 1]`, 在强边缘附近接近 0 (传播速度低),
//! 在均匀区域接近 1. 平流项还需要它的梯度 `∇g`.
//! 平滑, 梯度模与 sigmoid 映射等前处理由外部流水线负责.

use crate::grid::{Field, Geometry};
use crate::{SegError, SegResult};

/// 边缘势场及其梯度. 构建后只读.
#[derive(Clone, Debug)]
pub struct EdgePotential {
    potential: Field,
    gradient: Vec<Field>,
}

impl EdgePotential {
    /// 以势场构建, 梯度由中心差分导出.
    ///
    /// 势场存在非有限值或超出 `[0, 1]` 时返回 `InvalidConfiguration`.
    pub fn from_potential(potential: Field) -> SegResult<Self> {
        check_potential(&potential)?;
        let gradient = potential.gradient();
        Ok(Self {
            potential,
            gradient,
        })
    }

    /// 以势场和外部给出的梯度 (每轴一个场) 构建.
    ///
    /// 梯度分量个数或任一分量的网格几何与势场不一致时返回 `GridMismatch`.
    pub fn with_gradient(potential: Field, gradient: Vec<Field>) -> SegResult<Self> {
        check_potential(&potential)?;
        if gradient.len() != potential.geometry().ndim() {
            return Err(SegError::GridMismatch);
        }
        for component in gradient.iter() {
            potential.check_geometry(component)?;
            if !component.as_slice().iter().all(|v| v.is_finite()) {
                return Err(SegError::InvalidConfiguration("势场梯度存在非有限值"));
            }
        }
        Ok(Self {
            potential,
            gradient,
        })
    }

    /// 势场.
    #[inline]
    pub fn potential(&self) -> &Field {
        &self.potential
    }

    /// 势场梯度, 每轴一个场.
    #[inline]
    pub fn gradient(&self) -> &[Field] {
        &self.gradient
    }

    /// 网格几何.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        self.potential.geometry()
    }

    /// 在连续索引 `cidx` 处采样势场值, 并把梯度写入 `grad`.
    #[inline]
    pub(crate) fn sample(&self, cidx: &[f64], grad: &mut [f64]) -> f64 {
        for (g, component) in grad.iter_mut().zip(&self.gradient) {
            *g = component.interpolate(cidx);
        }
        self.potential.interpolate(cidx)
    }
}

fn check_potential(potential: &Field) -> SegResult<()> {
    if potential
        .as_slice()
        .iter()
        .all(|v| (0.0..=1.0).contains(v))
    {
        Ok(())
    } else {
        Err(SegError::InvalidConfiguration("势场取值必须位于 [0, 1]"))
    }
}

/// 外部边缘势场流水线: 从原始图像生成势场.
///
/// 实现方负责平滑, 梯度模与 sigmoid 映射; 分割核心只读取其结果.
pub trait EdgePotentialPipeline {
    /// 由原始图像 `image` 生成与之同网格的边缘势场.
    fn edge_potential(&self, image: &Field) -> SegResult<EdgePotential>;
}

impl<F> EdgePotentialPipeline for F
where
    F: Fn(&Field) -> SegResult<EdgePotential>,
{
    #[inline]
    fn edge_potential(&self, image: &Field) -> SegResult<EdgePotential> {
        self(image)
    }
}
