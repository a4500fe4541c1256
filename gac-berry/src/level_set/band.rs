use crate::consts::Side;
use crate::fast_march::{Buffers, FastMarching, Speed};
use crate::grid::{Field, Geometry};

/// 窄带: 距离零水平集不超过半宽 `B` 的网格点.
///
/// 重建时水平集被重新距离化为带符号距离, 距离超过 `S` 的点被截断为 `±S`,
/// 其中 `S = B + 2 * max(spacing)`. 除第一次以外, 重建只访问上一次重建时
/// 取得真实距离 (`|u| <= S`) 的点及其推进所及的范围, 与网格大小无关.
#[derive(Clone, Debug)]
pub struct NarrowBand {
    half_width: f64,
    sentinel: f64,
    indices: Vec<usize>,

    /// 上一次重建时取得真实距离的点, 升序. 尚未重建时为 `None`.
    support: Option<Vec<usize>>,
    buffers: Buffers,
    rebuilds: u32,
}

impl NarrowBand {
    /// 为网格 `geometry` 构建空窄带. 需要调用 [`NarrowBand::rebuild`] 才能使用.
    pub fn new(half_width: f64, geometry: &Geometry) -> Self {
        Self {
            half_width,
            sentinel: half_width + 2.0 * geometry.max_spacing(),
            indices: Vec::new(),
            support: None,
            buffers: Buffers::new(geometry.len()),
            rebuilds: 0,
        }
    }

    /// 半宽 `B`.
    #[inline]
    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    /// 窄带外的截断值 `S`.
    #[inline]
    pub fn sentinel(&self) -> f64 {
        self.sentinel
    }

    /// 窄带内的线性索引, 升序.
    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// 窄带内的点数.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// 窄带是否为空 (轮廓已消失).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// 已重建的次数.
    #[inline]
    pub fn rebuilds(&self) -> u32 {
        self.rebuilds
    }

    /// 遗忘上一次重建的结果. 下一次重建将访问整个网格,
    /// 用于水平集在窄带之外也被修改过的情形.
    #[inline]
    pub fn reset(&mut self) {
        self.support = None;
    }

    /// 从当前零交叉重新距离化水平集, 并重新确定窄带成员.
    ///
    /// 内部与外部分别以快速行进求距离, 互不越过零交叉.
    /// 轮廓消失 (没有零交叉) 时所有点被截断为 `±S`, 窄带为空.
    ///
    /// 两次重建之间, 只允许窄带内的值发生变化.
    pub fn rebuild(&mut self, field: &mut Field) {
        let geometry = field.geometry().clone();
        if self.buffers.len() != geometry.len() {
            self.buffers = Buffers::new(geometry.len());
            self.support = None;
        }
        let previous = self.support.take();

        let values = field.as_slice();
        let (inside_seeds, outside_seeds) = match previous.as_deref() {
            Some(support) => front_seeds(&geometry, values, support.iter().copied()),
            None => front_seeds(&geometry, values, 0..values.len()),
        };
        let seed_count = inside_seeds.len() + outside_seeds.len();

        let speed = Speed::Constant(1.0);
        let buffers = std::mem::take(&mut self.buffers);
        let (inside, buffers) = FastMarching::with_buffers(
            &geometry,
            &speed,
            self.sentinel,
            |p| Side::of(values[p]).is_inside(),
            buffers,
        )
        .run_sparse(inside_seeds);
        let (outside, buffers) = FastMarching::with_buffers(
            &geometry,
            &speed,
            self.sentinel,
            |p| Side::of(values[p]).is_outside(),
            buffers,
        )
        .run_sparse(outside_seeds);
        self.buffers = buffers;

        let sentinel = self.sentinel;
        let values = field.as_slice_mut();
        let clamp = |v: &mut f64| *v = Side::of(*v).signum() * sentinel;
        match previous {
            Some(support) => support.into_iter().for_each(|p| clamp(&mut values[p])),
            None => values.iter_mut().for_each(clamp),
        }

        let mut support = Vec::with_capacity(inside.len() + outside.len());
        for (p, d) in inside {
            values[p] = -d;
            support.push(p);
        }
        for (p, d) in outside {
            // 下溢为 0 时仍须留在外侧.
            values[p] = if d > 0.0 { d } else { f64::MIN_POSITIVE };
            support.push(p);
        }
        support.sort_unstable();

        self.indices = support
            .iter()
            .copied()
            .filter(|&p| values[p].abs() <= self.half_width)
            .collect();
        self.support = Some(support);
        self.rebuilds += 1;

        log::debug!(
            "redistance #{}: {} front points, band size {}",
            self.rebuilds,
            seed_count,
            self.indices.len()
        );
    }

    /// 一次迭代之后是否需要重建.
    ///
    /// `old` 为迭代前的整个水平集, `updated` 为与 [`NarrowBand::indices`]
    /// 一一对应的新值. 有窄带点的值超出半宽, 或改变了符号 (波前越过了网格点)
    /// 时返回 `true`.
    pub fn needs_rebuild(&self, old: &[f64], updated: &[f64]) -> bool {
        self.indices
            .iter()
            .zip(updated)
            .any(|(&p, &v)| v.abs() > self.half_width || Side::of(old[p]) != Side::of(v))
    }
}

/// 线性索引 `p` 是否为孤立点, 即至少有一个面邻居, 且所有面邻居都在另一侧.
#[inline]
pub(crate) fn is_isolated(geometry: &Geometry, values: &[f64], p: usize) -> bool {
    let side = Side::of(values[p]);
    let mut neighbours = geometry.neighbours(p).peekable();
    neighbours.peek().is_some() && neighbours.all(|(_, q)| Side::of(values[q]) != side)
}

/// 在 `candidates` 中找出与零交叉相邻的点并估计其到零交叉的距离,
/// 按 (内部, 外部) 分组.
///
/// 每轴上取两侧线性插值距离的较小者 `d_i`, 合成为 `1 / sqrt(Σ 1 / d_i^2)`.
fn front_seeds<I>(geometry: &Geometry, values: &[f64], candidates: I) -> (Vec<(usize, f64)>, Vec<(usize, f64)>)
where
    I: Iterator<Item = usize>,
{
    let mut inside = Vec::new();
    let mut outside = Vec::new();

    for p in candidates {
        let u = values[p];
        let side = Side::of(u);
        let mut inv_sq = 0.0;
        let mut on_front = false;
        let mut touching = false;

        for axis in 0..geometry.ndim() {
            let h = geometry.spacing()[axis];
            let (lo, hi) = geometry.axis_neighbours(p, axis);
            let d = lo
                .into_iter()
                .chain(hi)
                .filter(|&q| Side::of(values[q]) != side)
                .map(|q| crossing_distance(u, values[q], h))
                .fold(f64::INFINITY, f64::min);
            if d.is_infinite() {
                continue;
            }
            on_front = true;
            if d == 0.0 {
                touching = true;
            } else {
                inv_sq += 1.0 / (d * d);
            }
        }

        if on_front {
            let d = if touching { 0.0 } else { 1.0 / inv_sq.sqrt() };
            match side {
                Side::Inside => inside.push((p, d)),
                Side::Outside => outside.push((p, d)),
            }
        }
    }
    (inside, outside)
}

/// 沿一个轴线性插值, `u` 到符号相反的邻居 `v` 之间零点的距离.
#[inline]
fn crossing_distance(u: f64, v: f64, h: f64) -> f64 {
    if u.is_finite() && v.is_finite() {
        h * u.abs() / (u.abs() + v.abs())
    } else {
        u.abs().min(h)
    }
}
