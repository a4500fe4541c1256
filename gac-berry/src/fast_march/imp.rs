use binary_heap_plus::{BinaryHeap, MinComparator};
use ordered_float::NotNan;

use super::Speed;
use crate::consts::FAR_SENTINEL;
use crate::grid::{Field, Geometry};
use crate::SegResult;
use ndarray::{ArrayD, IxDyn};

/// 快速行进中网格点的状态.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Status {
    /// 尚未被波前触及.
    Far,

    /// 已有试探值, 位于堆中.
    Trial,

    /// 值已确定.
    Alive,
}

/// 堆元素: (试探值, 线性索引). 试探值相同时线性索引小者优先.
type Candidate = (NotNan<f64>, usize);

/// 一次推进的结果.
pub(crate) struct Marched {
    /// 每个网格点的值, 未到达的点为 `+inf`.
    pub values: Vec<f64>,

    /// 按确定 (Alive) 先后排列的线性索引, 包括种子.
    pub accepted: Vec<usize>,
}

impl Marched {
    /// 包装为 `Field`.
    pub fn into_field(self, geometry: &Geometry) -> SegResult<Field> {
        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data = ArrayD::from_shape_vec(IxDyn(geometry.shape()), self.values).unwrap();
        Field::new(geometry.clone(), data)
    }
}

/// 可重复使用的推进缓冲区.
///
/// 每次稀疏推进之后, 只有被触及的点会被复位, 因此重复使用时
/// 单次推进的开销只与被触及的点数有关, 与网格大小无关.
#[derive(Clone, Debug, Default)]
pub(crate) struct Buffers {
    values: Vec<f64>,
    status: Vec<Status>,
}

impl Buffers {
    /// 为 `len` 个网格点分配缓冲区.
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![FAR_SENTINEL; len],
            status: vec![Status::Far; len],
        }
    }

    /// 网格点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// 快速行进的实现细节.
///
/// `region` 限定了允许被访问的点, 种子也必须位于其中.
pub(crate) struct FastMarching<'a, R> {
    geometry: &'a Geometry,
    speed: &'a Speed,
    stopping: f64,
    region: R,
    target: Option<&'a [bool]>,
    values: Vec<f64>,
    status: Vec<Status>,
    touched: Vec<usize>,
    heap: BinaryHeap<Candidate, MinComparator>,
}

impl<'a, R> FastMarching<'a, R>
where
    R: Fn(usize) -> bool,
{
    pub fn new(geometry: &'a Geometry, speed: &'a Speed, stopping: f64, region: R) -> Self {
        Self::with_buffers(geometry, speed, stopping, region, Buffers::new(geometry.len()))
    }

    /// 使用已有的 (全部为 Far 的) 缓冲区.
    pub fn with_buffers(
        geometry: &'a Geometry,
        speed: &'a Speed,
        stopping: f64,
        region: R,
        buffers: Buffers,
    ) -> Self {
        debug_assert_eq!(buffers.values.len(), geometry.len());
        Self {
            geometry,
            speed,
            stopping,
            region,
            target: None,
            values: buffers.values,
            status: buffers.status,
            touched: Vec::new(),
            heap: BinaryHeap::new_min(),
        }
    }

    /// 目标区域内的点全部确定后即停止. `target` 与网格点一一对应.
    pub fn with_target(mut self, target: &'a [bool]) -> Self {
        debug_assert_eq!(target.len(), self.geometry.len());
        self.target = Some(target);
        self
    }

    /// 从 `seeds` (线性索引, 初始值) 开始推进, 直到没有试探点,
    /// 或最小试探值超过停止值, 或目标区域已被覆盖.
    pub fn run<I>(mut self, seeds: I) -> Marched
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let accepted = self.march(seeds);

        // 停止时残留的试探点视为未到达.
        for &p in self.touched.iter() {
            if self.status[p] != Status::Alive {
                self.values[p] = FAR_SENTINEL;
            }
        }
        Marched {
            values: self.values,
            accepted,
        }
    }

    /// 与 `run` 相同, 但只返回被确定的 `(线性索引, 值)`, 并交还复位后的缓冲区.
    pub fn run_sparse<I>(mut self, seeds: I) -> (Vec<(usize, f64)>, Buffers)
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let accepted = self.march(seeds);
        let out = accepted.iter().map(|&p| (p, self.values[p])).collect();
        for &p in self.touched.iter() {
            self.values[p] = FAR_SENTINEL;
            self.status[p] = Status::Far;
        }
        let buffers = Buffers {
            values: self.values,
            status: self.status,
        };
        (out, buffers)
    }

    fn march<I>(&mut self, seeds: I) -> Vec<usize>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut accepted = Vec::with_capacity(64);
        let mut remaining = self
            .target
            .map_or(usize::MAX, |t| t.iter().filter(|&&x| x).count());

        // 种子直接确定. 重复种子取较小值.
        for (p, v) in seeds {
            if !(self.region)(p) {
                continue;
            }
            if self.status[p] != Status::Alive {
                accepted.push(p);
                self.touched.push(p);
                if self.in_target(p) {
                    remaining -= 1;
                }
            }
            self.status[p] = Status::Alive;
            self.values[p] = self.values[p].min(v);
        }
        if remaining == 0 {
            return accepted;
        }
        for i in 0..accepted.len() {
            self.update_neighbours(accepted[i]);
        }

        while let Some((key, p)) = self.heap.pop() {
            // 同一点可能在堆中留有过时的较大值.
            if self.status[p] == Status::Alive {
                continue;
            }
            if key.into_inner() > self.stopping {
                break;
            }
            self.status[p] = Status::Alive;
            accepted.push(p);
            if self.in_target(p) {
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
            self.update_neighbours(p);
        }
        accepted
    }

    #[inline]
    fn in_target(&self, p: usize) -> bool {
        self.target.map_or(false, |t| t[p])
    }

    /// 重新计算 `p` 所有非 Alive 邻居的试探值.
    fn update_neighbours(&mut self, p: usize) {
        let geometry = self.geometry;
        for (_, q) in geometry.neighbours(p) {
            self.update(q);
        }
    }

    fn update(&mut self, q: usize) {
        if self.status[q] == Status::Alive || !(self.region)(q) {
            return;
        }
        let speed = self.speed.at(q);
        if speed <= 0.0 {
            return;
        }
        let t = self.solve(q, speed);
        if t < self.values[q] {
            if let Ok(key) = NotNan::new(t) {
                if self.status[q] == Status::Far {
                    self.touched.push(q);
                }
                self.values[q] = t;
                self.status[q] = Status::Trial;
                self.heap.push((key, q));
            }
        }
    }

    /// 以 `q` 每轴上较小的 Alive 邻居值构建离散 Eikonal 方程并求解.
    fn solve(&self, q: usize, speed: f64) -> f64 {
        let geo = self.geometry;
        let mut upwind = Vec::with_capacity(geo.ndim());
        for axis in 0..geo.ndim() {
            let (lo, hi) = geo.axis_neighbours(q, axis);
            let a = lo
                .into_iter()
                .chain(hi)
                .filter(|&n| self.status[n] == Status::Alive)
                .map(|n| self.values[n])
                .fold(f64::INFINITY, f64::min);
            if a.is_finite() {
                upwind.push((a, geo.spacing()[axis]));
            }
        }
        upwind.sort_by(|x, y| x.0.total_cmp(&y.0));
        solve_eikonal(&upwind, speed)
    }
}

/// 求解 `Σ ((T - a_i) / h_i)^2 = 1 / F^2` 中可接受的根.
///
/// `upwind` 为按 `a_i` 升序排列的 `(a_i, h_i)`. 逐轴累加二次方程,
/// 当当前解不再大于下一个邻居值时停止. 若舍入导致判别式为负,
/// 保留上一轴的解 (第一轴的单侧解总是合法的).
/// `upwind` 为空时返回 `+inf`.
pub(crate) fn solve_eikonal(upwind: &[(f64, f64)], speed: f64) -> f64 {
    let (mut aa, mut bb, mut cc) = (0.0, 0.0, -1.0 / (speed * speed));
    let mut solution = f64::INFINITY;
    for &(a, h) in upwind {
        if solution <= a {
            break;
        }
        let w = 1.0 / (h * h);
        aa += w;
        bb += a * w;
        cc += a * a * w;
        let disc = bb * bb - aa * cc;
        if disc < 0.0 {
            break;
        }
        solution = (bb + disc.sqrt()) / aa;
    }
    solution
}
