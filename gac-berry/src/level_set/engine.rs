use super::band::NarrowBand;
use super::terms::{Rate, Stencil};
use super::{EvolutionConfig, EvolutionReport, Status};
use crate::feature::EdgePotential;
use crate::grid::Field;
use crate::{SegError, SegResult};
use itertools::izip;
use std::ops::ControlFlow;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

        /// 并行地计算窄带内每点的速率.
        fn compute_rates(stencil: &Stencil, indices: &[usize]) -> SegResult<Vec<Rate>> {
            indices.par_iter().map(|&p| stencil.rate(p)).collect()
        }

        /// 并行地生成新值. 不修改 `old`.
        fn apply_rates(old: &[f64], indices: &[usize], rates: &[Rate], dt: f64) -> Vec<f64> {
            indices
                .par_iter()
                .zip(rates.par_iter())
                .map(|(&p, r)| old[p] + dt * r.rate)
                .collect()
        }
    } else {
        fn compute_rates(stencil: &Stencil, indices: &[usize]) -> SegResult<Vec<Rate>> {
            indices.iter().map(|&p| stencil.rate(p)).collect()
        }

        fn apply_rates(old: &[f64], indices: &[usize], rates: &[Rate], dt: f64) -> Vec<f64> {
            izip!(indices, rates).map(|(&p, r)| old[p] + dt * r.rate).collect()
        }
    }
}

/// 一次水平集演化.
///
/// 演化期间独占水平集 (`&mut Field`), 势场只读. 每次迭代:
/// 1. 以冻结的水平集计算窄带内每点的速率;
/// 2. 由最大特征速度确定时间步长, 生成新值并检查其有限性;
/// 3. 一次性提交, 计算均方根变化, 并视情况重新距离化.
///
/// 数值失效时不会提交失效那一次迭代的任何值.
pub struct Evolution<'a> {
    level_set: &'a mut Field,
    potential: &'a EdgePotential,
    config: EvolutionConfig,
    band: NarrowBand,
    status: Status,
    elapsed: u32,
    rms_change: f64,
    time_step: f64,
    breakdown: Option<SegError>,
}

impl<'a> Evolution<'a> {
    /// 准备演化: 检查参数与网格, 并对初始水平集做一次重新距离化.
    ///
    /// 水平集与势场网格不一致时返回 `GridMismatch`;
    /// 初始水平集含有 NaN 时返回 `NumericalBreakdown`.
    pub fn new(
        level_set: &'a mut Field,
        potential: &'a EdgePotential,
        config: &EvolutionConfig,
    ) -> SegResult<Self> {
        config.validate()?;
        if level_set.geometry() != potential.geometry() {
            return Err(SegError::GridMismatch);
        }
        if let Some(p) = level_set.first_nan() {
            return Err(SegError::NumericalBreakdown(p));
        }

        let mut band = NarrowBand::new(config.band_half_width(), level_set.geometry());
        band.rebuild(level_set);
        log::info!(
            "level set evolution: grid {:?}, band size {}, config {:?}",
            level_set.geometry().shape(),
            band.len(),
            config
        );
        Ok(Self {
            level_set,
            potential,
            config: config.clone(),
            band,
            status: Status::Running,
            elapsed: 0,
            rms_change: f64::INFINITY,
            time_step: 0.0,
            breakdown: None,
        })
    }

    /// 当前状态.
    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    /// 已完成的迭代次数.
    #[inline]
    pub fn elapsed_iterations(&self) -> u32 {
        self.elapsed
    }

    /// 最近一次迭代的均方根变化.
    #[inline]
    pub fn rms_change(&self) -> f64 {
        self.rms_change
    }

    /// 当前窄带.
    #[inline]
    pub fn band(&self) -> &NarrowBand {
        &self.band
    }

    /// 当前水平集.
    #[inline]
    pub fn level_set(&self) -> &Field {
        &*self.level_set
    }

    /// 当前快照.
    pub fn report(&self) -> EvolutionReport {
        EvolutionReport {
            status: self.status,
            elapsed_iterations: self.elapsed,
            rms_change: self.rms_change,
            time_step: self.time_step,
            redistances: self.band.rebuilds(),
            band_len: self.band.len(),
            breakdown: self.breakdown.clone(),
        }
    }

    /// 迭代直到终止.
    pub fn run(self) -> EvolutionReport {
        self.run_with(|_| ControlFlow::Continue(()))
    }

    /// 迭代直到终止, 每次迭代完成后调用 `observer`.
    /// 观察者返回 `Break` 时立即停止, 状态保持 `Running`.
    pub fn run_with<F>(mut self, mut observer: F) -> EvolutionReport
    where
        F: FnMut(&EvolutionReport) -> ControlFlow<()>,
    {
        while !self.status.is_terminal() {
            self.step();
            if self.status == Status::Failed {
                break;
            }
            if observer(&self.report()).is_break() {
                log::info!("evolution cancelled after {} iterations", self.elapsed);
                return self.report();
            }
        }
        log::info!(
            "evolution finished: {:?} after {} iterations, rms {:.5}, {} redistances",
            self.status,
            self.elapsed,
            self.rms_change,
            self.band.rebuilds()
        );
        self.report()
    }

    /// 执行一次迭代, 返回迭代后的状态. 已终止时什么也不做.
    pub fn step(&mut self) -> Status {
        if self.status.is_terminal() {
            return self.status;
        }
        match self.advance() {
            Ok(()) => {}
            Err(e) => {
                log::warn!("evolution failed at iteration {}: {}", self.elapsed + 1, e);
                self.status = Status::Failed;
                self.breakdown = Some(e);
            }
        }
        self.status
    }

    fn advance(&mut self) -> SegResult<()> {
        let geometry = self.level_set.geometry();
        let old = self.level_set.as_slice();
        let indices = self.band.indices();

        let stencil = Stencil::new(geometry, old, self.potential, &self.config);
        let rates = compute_rates(&stencil, indices)?;

        let max_coefficient = rates.iter().map(|r| r.coefficient).fold(0.0, f64::max);
        let h_min = geometry.min_spacing();
        let dt = h_min / (2.0 * geometry.ndim() as f64) / max_coefficient.max(1.0);

        let updated = apply_rates(old, indices, &rates, dt);
        if let Some(i) = updated.iter().position(|v| !v.is_finite()) {
            return Err(SegError::NumericalBreakdown(indices[i]));
        }

        let rms_change = if indices.is_empty() {
            0.0
        } else {
            let sum: f64 = izip!(indices, &updated)
                .map(|(&p, &v)| (v - old[p]).powi(2))
                .sum();
            (sum / indices.len() as f64).sqrt()
        };
        let refresh = self.band.needs_rebuild(old, &updated);

        let values = self.level_set.as_slice_mut();
        for (&p, &v) in izip!(self.band.indices(), &updated) {
            values[p] = v;
        }
        self.elapsed += 1;
        self.rms_change = rms_change;
        self.time_step = dt;
        log::debug!(
            "iteration {}: dt {:.4}, rms {:.5}, band size {}",
            self.elapsed,
            dt,
            rms_change,
            self.band.len()
        );

        if rms_change < self.config.maximum_rms_error() {
            self.status = Status::ConvergedByRms;
        } else if self.elapsed >= self.config.maximum_iterations() {
            self.status = Status::StoppedByIterationCap;
        } else if refresh {
            self.band.rebuild(self.level_set);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Evolution;
    use crate::consts::Side;
    use crate::fast_march::{distance_map, DistanceConfig, Seed};
    use crate::feature::EdgePotential;
    use crate::grid::{Field, Geometry};
    use crate::level_set::{EvolutionConfig, Status};
    use crate::phantom;
    use crate::SegError;
    use std::ops::ControlFlow;

    fn init_logger() {
        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Info)
            .init()
            .ok();
    }

    fn flat_potential(g: &Geometry, value: f64) -> EdgePotential {
        EdgePotential::from_potential(Field::filled(g.clone(), value)).unwrap()
    }

    /// 从 `centre` 沿 `dir` 方向找到的第一个零交叉与 `centre` 的距离.
    fn crossing_radius(u: &Field, centre: [f64; 2], dir: [f64; 2]) -> f64 {
        let norm = (dir[0] * dir[0] + dir[1] * dir[1]).sqrt();
        let mut t = 0.0;
        while t < 64.0 {
            let x = [centre[0] + t * dir[0] / norm, centre[1] + t * dir[1] / norm];
            if Side::of(u.interpolate(&x)).is_outside() {
                return t;
            }
            t += 0.01;
        }
        f64::INFINITY
    }

    /// 所有相邻且异号的网格点之间零交叉的位置 (连续索引).
    fn zero_crossings(u: &Field) -> Vec<[f64; 2]> {
        let g = u.geometry();
        let mut out = Vec::new();
        for p in 0..g.len() {
            let a = u.at(p);
            for axis in 0..2 {
                if let (_, Some(q)) = g.axis_neighbours(p, axis) {
                    let b = u.at(q);
                    if Side::of(a) != Side::of(b) {
                        let s = a / (a - b);
                        let mut pos = [g.coord(p, 0) as f64, g.coord(p, 1) as f64];
                        pos[axis] += s;
                        out.push(pos);
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_grid_mismatch() {
        let mut u = Field::filled(Geometry::unit(&[10, 10]).unwrap(), 1.0);
        let pot = flat_potential(&Geometry::unit(&[10, 11]).unwrap(), 1.0);
        let err = Evolution::new(&mut u, &pot, &EvolutionConfig::default()).err();
        assert_eq!(err, Some(SegError::GridMismatch));
    }

    #[test]
    fn test_nan_level_set_rejected() {
        let g = Geometry::unit(&[6, 6]).unwrap();
        let mut u = Field::from_fn(g.clone(), |i| if i == [2, 3] { f64::NAN } else { 1.0 });
        let pot = flat_potential(&g, 1.0);
        let err = Evolution::new(&mut u, &pot, &EvolutionConfig::default()).err();
        assert_eq!(err, Some(SegError::NumericalBreakdown(15)));
    }

    /// 势场处处为 0 时各项均为 0: 水平集停滞, 不会失效.
    #[test]
    fn test_zero_potential_stagnates() {
        let g = Geometry::unit(&[32, 32]).unwrap();
        let mut u = phantom::disc(&g, &[16.0, 16.0], 6.0).unwrap();
        let signs: Vec<Side> = u.as_slice().iter().map(|&v| Side::of(v)).collect();
        let pot = flat_potential(&g, 0.0);

        let report = Evolution::new(&mut u, &pot, &EvolutionConfig::default())
            .unwrap()
            .run();
        assert_eq!(report.status, Status::ConvergedByRms);
        assert_eq!(report.elapsed_iterations, 1);
        assert_eq!(report.rms_change, 0.0);
        assert!(report.breakdown.is_none());
        assert!(u.as_slice().iter().all(|v| v.is_finite()));
        let after: Vec<Side> = u.as_slice().iter().map(|&v| Side::of(v)).collect();
        assert_eq!(signs, after);
    }

    /// 轮廓消失时窄带为空, 第一次迭代即收敛.
    #[test]
    fn test_empty_band() {
        let g = Geometry::unit(&[8, 8]).unwrap();
        let mut u = Field::filled(g.clone(), 3.0);
        let pot = flat_potential(&g, 1.0);
        let evo = Evolution::new(&mut u, &pot, &EvolutionConfig::default()).unwrap();
        assert!(evo.band().is_empty());
        let report = evo.run();
        assert_eq!(report.status, Status::ConvergedByRms);
        assert_eq!(report.band_len, 0);
    }

    /// 单像素轮廓: 曲率无法定义, 演化失效并保留最后一次合法的水平集.
    #[test]
    fn test_single_pixel_fails() {
        let g = Geometry::unit(&[7, 7]).unwrap();
        let centre = g.linear(&[3, 3]).unwrap();
        let mut u = Field::from_fn(g.clone(), |i| if i == [3, 3] { -1.0 } else { 1.0 });
        let pot = flat_potential(&g, 1.0);

        let mut evo = Evolution::new(&mut u, &pot, &EvolutionConfig::default()).unwrap();
        let before = evo.level_set().clone();
        assert_eq!(evo.step(), Status::Failed);
        // 终止之后不再迭代.
        assert_eq!(evo.step(), Status::Failed);
        let report = evo.report();
        assert_eq!(report.elapsed_iterations, 0);
        assert_eq!(report.breakdown, Some(SegError::NumericalBreakdown(centre)));

        assert_eq!(u.as_slice(), before.as_slice());
        assert!(u.as_slice().iter().all(|v| v.is_finite()));
        assert!(u.at(centre) < 0.0);
    }

    /// 纯曲率流把方块变圆, 且不会失效.
    #[test]
    fn test_curvature_rounds_square() {
        let g = Geometry::unit(&[48, 48]).unwrap();
        let centre = [24.0, 24.0];
        let mut u = phantom::square(&g, &centre, 10.0).unwrap();
        let pot = flat_potential(&g, 1.0);
        let ratio = |u: &Field| crossing_radius(u, centre, [1.0, 1.0]) / crossing_radius(u, centre, [0.0, 1.0]);
        assert!((ratio(&u) - 2f64.sqrt()).abs() < 0.05);

        let cfg = EvolutionConfig::new(0.0, 1.0, 0.0, 60, 1e-6).unwrap();
        let report = Evolution::new(&mut u, &pot, &cfg).unwrap().run();
        assert_eq!(report.status, Status::StoppedByIterationCap);
        assert_eq!(report.elapsed_iterations, 60);
        assert!(report.time_step > 0.0);
        assert!(u.as_slice().iter().all(|v| v.is_finite()));
        let after = ratio(&u);
        assert!(after < 1.3, "ratio after evolution: {after}");
    }

    /// 64x64 网格, 圆环势场, 中心种子 -5: 轮廓外扩并停在圆环上.
    #[test]
    fn test_ring_scenario() {
        init_logger();
        let g = Geometry::unit(&[64, 64]).unwrap();
        let (centre, radius) = ([32.0, 32.0], 20.0);
        let pot = phantom::ring_potential(&g, &centre, radius, 1.5).unwrap();

        let seeds = [Seed::new(vec![32, 32], -5.0)];
        let mut u = distance_map(&seeds, &DistanceConfig::new(g.clone())).unwrap();

        let cfg = EvolutionConfig::new(1.0, 1.0, 1.0, 800, 0.02).unwrap();
        let report = Evolution::new(&mut u, &pot, &cfg).unwrap().run();
        assert_eq!(report.status, Status::ConvergedByRms);
        assert!(report.elapsed_iterations < 800);
        assert!(report.redistances > 1);

        let crossings = zero_crossings(&u);
        assert!(crossings.len() > 100);
        for pos in crossings {
            let r = ((pos[0] - centre[0]).powi(2) + (pos[1] - centre[1]).powi(2)).sqrt();
            assert!((r - radius).abs() <= 1.0, "crossing at {pos:?}, radius {r}");
        }
    }

    /// 两个对称种子的轮廓相遇合并, 合并处的鞍点不会导致失效.
    #[test]
    fn test_symmetric_fronts_merge() {
        let g = Geometry::unit(&[40, 40]).unwrap();
        let seeds = [Seed::new(vec![20, 12], -3.0), Seed::new(vec![20, 28], -3.0)];
        let mut u = distance_map(&seeds, &DistanceConfig::new(g.clone())).unwrap();
        let midpoint = g.linear(&[20, 20]).unwrap();
        assert!(Side::of(u.at(midpoint)).is_outside());
        let pot = flat_potential(&g, 1.0);

        let cfg = EvolutionConfig::new(1.0, 1.0, 0.0, 150, 0.02).unwrap();
        let report = Evolution::new(&mut u, &pot, &cfg).unwrap().run();
        assert!(report.status.is_finished(), "{:?}", report);
        assert!(report.breakdown.is_none());
        assert!(u.as_slice().iter().all(|v| v.is_finite()));
        assert!(Side::of(u.at(midpoint)).is_inside());
    }

    /// 观察者中途取消: 状态保持 `Running`, 水平集合法.
    #[test]
    fn test_cancel_by_observer() {
        let g = Geometry::unit(&[32, 32]).unwrap();
        let mut u = phantom::disc(&g, &[16.0, 16.0], 5.0).unwrap();
        let pot = flat_potential(&g, 1.0);

        let mut seen = Vec::new();
        let report = Evolution::new(&mut u, &pot, &EvolutionConfig::default())
            .unwrap()
            .run_with(|r| {
                seen.push(r.elapsed_iterations);
                if r.elapsed_iterations == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            });
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(report.status, Status::Running);
        assert_eq!(report.elapsed_iterations, 3);
        assert!(u.as_slice().iter().all(|v| v.is_finite()));
    }
}
