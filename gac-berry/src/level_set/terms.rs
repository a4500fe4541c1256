//! 窄带内单点的有限差分项.

use super::band::is_isolated;
use super::EvolutionConfig;
use crate::consts::DEGENERATE_GRADIENT;
use crate::feature::EdgePotential;
use crate::grid::Geometry;
use crate::{SegError, SegResult};
use itertools::izip;

/// 单点的更新速率, 以及用于确定时间步长的局部特征速度.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Rate {
    /// `∂u/∂t`.
    pub rate: f64,

    /// `β g + Σ |W_i| + γ g / h_min`.
    pub coefficient: f64,
}

/// 冻结水平集上的差分模板. 同一次迭代内所有点共享同一份只读数据.
pub(crate) struct Stencil<'a> {
    geometry: &'a Geometry,
    values: &'a [f64],
    potential: &'a EdgePotential,
    propagation: f64,
    curvature: f64,
    advection: f64,
}

/// 一个点各轴上的差分.
struct Differences {
    /// 后向差分 `D-`.
    minus: Vec<f64>,

    /// 前向差分 `D+`.
    plus: Vec<f64>,

    /// 中心差分 `D0`.
    central: Vec<f64>,

    /// 二阶中心差分 `D2`.
    second: Vec<f64>,
}

impl<'a> Stencil<'a> {
    pub fn new(
        geometry: &'a Geometry,
        values: &'a [f64],
        potential: &'a EdgePotential,
        config: &EvolutionConfig,
    ) -> Self {
        Self {
            geometry,
            values,
            potential,
            propagation: config.propagation_scaling(),
            curvature: config.curvature_scaling(),
            advection: config.advection_scaling(),
        }
    }

    #[inline]
    fn value(&self, p: usize, axis: usize, delta: isize) -> f64 {
        self.values[self.geometry.step_clamped(p, axis, delta)]
    }

    fn differences(&self, p: usize) -> Differences {
        let n = self.geometry.ndim();
        let u0 = self.values[p];
        let mut d = Differences {
            minus: Vec::with_capacity(n),
            plus: Vec::with_capacity(n),
            central: Vec::with_capacity(n),
            second: Vec::with_capacity(n),
        };
        for (axis, &h) in self.geometry.spacing().iter().enumerate() {
            let um = self.value(p, axis, -1);
            let up = self.value(p, axis, 1);
            d.minus.push((u0 - um) / h);
            d.plus.push((up - u0) / h);
            d.central.push((up - um) / (2.0 * h));
            d.second.push((up - 2.0 * u0 + um) / (h * h));
        }
        d
    }

    /// 最近零水平集位置 `x - u ∇u / |∇u|^2` 的连续索引.
    /// 梯度退化或结果非有限时取自身位置.
    fn surface_location(&self, p: usize, central: &[f64], grad_sq: f64) -> Vec<f64> {
        let geo = self.geometry;
        let own: Vec<f64> = (0..geo.ndim()).map(|a| geo.coord(p, a) as f64).collect();
        if grad_sq < DEGENERATE_GRADIENT {
            return own;
        }
        let u0 = self.values[p];
        let shifted: Vec<f64> = izip!(&own, central, geo.spacing())
            .map(|(c, d, h)| c - u0 * d / grad_sq / h)
            .collect();
        if shifted.iter().all(|x| x.is_finite()) {
            shifted
        } else {
            own
        }
    }

    /// 混合二阶中心差分 `u_ij`.
    fn mixed(&self, p: usize, i: usize, j: usize) -> f64 {
        let geo = self.geometry;
        let at = |di: isize, dj: isize| self.values[geo.step_clamped(geo.step_clamped(p, i, di), j, dj)];
        let (hi, hj) = (geo.spacing()[i], geo.spacing()[j]);
        (at(1, 1) - at(1, -1) - at(-1, 1) + at(-1, -1)) / (4.0 * hi * hj)
    }

    /// `κ |∇u| = (|∇u|^2 Δu - Σ u_i u_j u_ij) / |∇u|^2`.
    fn curvature_norm(&self, p: usize, d: &Differences, grad_sq: f64) -> f64 {
        let n = self.geometry.ndim();
        let laplacian: f64 = d.second.iter().sum();
        let mut hessian = 0.0;
        for i in 0..n {
            hessian += d.central[i] * d.central[i] * d.second[i];
            for j in (i + 1)..n {
                hessian += 2.0 * d.central[i] * d.central[j] * self.mixed(p, i, j);
            }
        }
        (grad_sq * laplacian - hessian) / grad_sq
    }

    /// 计算线性索引 `p` 处的更新速率.
    ///
    /// 曲率权重非零, 梯度退化, 且 `p` 是孤立点 (所有面邻居都在另一侧)
    /// 时返回 `NumericalBreakdown`;
    /// 速率非有限时同样返回 `NumericalBreakdown`.
    pub fn rate(&self, p: usize) -> SegResult<Rate> {
        let d = self.differences(p);
        let grad_sq: f64 = d.central.iter().map(|x| x * x).sum();

        let cidx = self.surface_location(p, &d.central, grad_sq);
        let mut grad_g = vec![0.0; self.geometry.ndim()];
        let g = self.potential.sample(&cidx, &mut grad_g);

        // 传播
        let speed = self.propagation * g;
        let propagation = if speed > 0.0 {
            -speed * upwind_norm(&d.minus, &d.plus, true)
        } else if speed < 0.0 {
            -speed * upwind_norm(&d.minus, &d.plus, false)
        } else {
            0.0
        };
        let mut coefficient = speed.abs();

        // 平流, 输运速度 W = -α ∇g.
        let mut advection = 0.0;
        for (axis, &dg) in grad_g.iter().enumerate() {
            let w = -self.advection * dg;
            let du = if w > 0.0 { d.minus[axis] } else { d.plus[axis] };
            advection -= w * du;
            coefficient += w.abs();
        }

        // 曲率
        let weight = self.curvature * g;
        let mut curvature = 0.0;
        if weight != 0.0 {
            coefficient += weight / self.geometry.min_spacing();
            if grad_sq >= DEGENERATE_GRADIENT {
                curvature = weight * self.curvature_norm(p, &d, grad_sq);
            } else if is_isolated(self.geometry, self.values, p) {
                return Err(SegError::NumericalBreakdown(p));
            }
            // 其余退化点 (两段轮廓合并处的鞍点, 平坦区域) 曲率项为 0.
        }

        let rate = propagation + advection + curvature;
        if rate.is_finite() && coefficient.is_finite() {
            Ok(Rate { rate, coefficient })
        } else {
            Err(SegError::NumericalBreakdown(p))
        }
    }
}

/// Osher-Sethian 迎风梯度模. `outward` 对应正的传播速度.
fn upwind_norm(minus: &[f64], plus: &[f64], outward: bool) -> f64 {
    minus
        .iter()
        .zip(plus)
        .map(|(&dm, &dp)| {
            let (a, b) = if outward {
                (dm.max(0.0), dp.min(0.0))
            } else {
                (dm.min(0.0), dp.max(0.0))
            };
            a * a + b * b
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::{upwind_norm, Stencil};
    use crate::feature::EdgePotential;
    use crate::grid::{Field, Geometry};
    use crate::level_set::EvolutionConfig;
    use crate::SegError;

    fn f64_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn config(beta: f64, gamma: f64, alpha: f64) -> EvolutionConfig {
        EvolutionConfig::new(beta, gamma, alpha, 10, 0.02).unwrap()
    }

    #[test]
    fn test_upwind_norm() {
        // 外扩时只取指向外侧的差分.
        assert!(f64_eq(upwind_norm(&[1.0, -1.0], &[1.0, -1.0], true), 2f64.sqrt(), 1e-12));
        assert!(f64_eq(upwind_norm(&[-1.0], &[1.0], true), 0.0, 1e-12));
        assert!(f64_eq(upwind_norm(&[-1.0], &[1.0], false), 2f64.sqrt(), 1e-12));
    }

    /// 平面距离函数在常数势场下以单位速度外扩.
    #[test]
    fn test_propagation_plane() {
        let g = Geometry::unit(&[5, 20]).unwrap();
        let u = Field::from_fn(g.clone(), |i| i[1] as f64 - 9.5);
        let pot = EdgePotential::from_potential(Field::filled(g.clone(), 1.0)).unwrap();
        let cfg = config(1.0, 0.0, 0.0);
        let st = Stencil::new(&g, u.as_slice(), &pot, &cfg);
        for w in 1..19 {
            let r = st.rate(g.linear(&[2, w]).unwrap()).unwrap();
            assert!(f64_eq(r.rate, -1.0, 1e-12));
            assert!(f64_eq(r.coefficient, 1.0, 1e-12));
        }
    }

    /// 特征在最近零水平集处采样.
    #[test]
    fn test_surface_location_sampling() {
        let g = Geometry::unit(&[5, 20]).unwrap();
        let u = Field::from_fn(g.clone(), |i| i[1] as f64 - 10.0);
        let pot = EdgePotential::from_potential(Field::from_fn(g.clone(), |i| 0.05 * i[1] as f64)).unwrap();
        let cfg = config(1.0, 0.0, 0.0);
        let st = Stencil::new(&g, u.as_slice(), &pot, &cfg);
        for w in [8, 10, 12, 13] {
            let r = st.rate(g.linear(&[2, w]).unwrap()).unwrap();
            assert!(f64_eq(r.rate, -0.5, 1e-9), "{w}: {}", r.rate);
        }
    }

    /// 平流项把轮廓推向势场较低的一侧.
    #[test]
    fn test_advection_direction() {
        let g = Geometry::unit(&[5, 20]).unwrap();
        let u = Field::from_fn(g.clone(), |i| i[1] as f64 - 10.0);
        let pot = EdgePotential::from_potential(Field::from_fn(g.clone(), |i| 0.05 * i[1] as f64)).unwrap();
        let cfg = config(0.0, 0.0, 1.0);
        let st = Stencil::new(&g, u.as_slice(), &pot, &cfg);
        let r = st.rate(g.linear(&[2, 10]).unwrap()).unwrap();
        // u 增大, 零交叉向 w 减小的方向 (势场更低) 移动.
        assert!(f64_eq(r.rate, 0.05, 1e-12));
        assert!(f64_eq(r.coefficient, 0.05, 1e-12));
    }

    /// 圆的距离函数: κ |∇u| 约为 1 / r.
    #[test]
    fn test_curvature_circle() {
        let g = Geometry::unit(&[41, 41]).unwrap();
        let u = Field::from_fn(g.clone(), |i| {
            ((i[0] as f64 - 20.0).powi(2) + (i[1] as f64 - 20.0).powi(2)).sqrt() - 10.0
        });
        let pot = EdgePotential::from_potential(Field::filled(g.clone(), 1.0)).unwrap();
        let cfg = config(0.0, 1.0, 0.0);
        let st = Stencil::new(&g, u.as_slice(), &pot, &cfg);
        for idx in [[20, 30], [10, 20], [27, 27]] {
            let r = st.rate(g.linear(&idx).unwrap()).unwrap();
            let want = 1.0 / ((idx[0] as f64 - 20.0).powi(2) + (idx[1] as f64 - 20.0).powi(2)).sqrt();
            assert!(f64_eq(r.rate, want, 0.01), "{idx:?}: {} vs {want}", r.rate);
            assert!(f64_eq(r.coefficient, 1.0, 1e-12));
        }
    }

    /// 单像素轮廓的中心点梯度为 0 且与零交叉相邻, 曲率无法定义.
    #[test]
    fn test_degenerate_curvature() {
        let g = Geometry::unit(&[7, 7]).unwrap();
        let u = Field::from_fn(g.clone(), |i| if i == [3, 3] { -1.0 } else { 1.0 });
        let pot = EdgePotential::from_potential(Field::filled(g.clone(), 1.0)).unwrap();
        let centre = g.linear(&[3, 3]).unwrap();

        let st = Stencil::new(&g, u.as_slice(), &pot, &config(0.0, 1.0, 0.0));
        assert_eq!(st.rate(centre).unwrap_err(), SegError::NumericalBreakdown(centre));

        // 没有曲率项时不会失效.
        let cfg = config(1.0, 0.0, 0.0);
        let st = Stencil::new(&g, u.as_slice(), &pot, &cfg);
        assert!(st.rate(centre).is_ok());

        // 远离零交叉的平坦区域中曲率项为 0.
        let st = Stencil::new(&g, u.as_slice(), &pot, &config(0.0, 1.0, 0.0));
        let r = st.rate(g.linear(&[0, 0]).unwrap()).unwrap();
        assert_eq!(r.rate, 0.0);
    }

    /// 两段轮廓即将合并: 鞍点处梯度为 0 但并非孤立点, 曲率项取 0.
    #[test]
    fn test_saddle_is_not_breakdown() {
        let g = Geometry::unit(&[7, 7]).unwrap();
        let u = Field::from_fn(g.clone(), |i| {
            let (dh, dw) = (i[0] as f64 - 3.0, i[1] as f64 - 3.0);
            dw * dw - dh * dh - 0.5
        });
        let pot = EdgePotential::from_potential(Field::filled(g.clone(), 1.0)).unwrap();
        let centre = g.linear(&[3, 3]).unwrap();

        let st = Stencil::new(&g, u.as_slice(), &pot, &config(0.0, 1.0, 0.0));
        let r = st.rate(centre).unwrap();
        assert_eq!(r.rate, 0.0);
        assert!(f64_eq(r.coefficient, 1.0, 1e-12));
    }
}
