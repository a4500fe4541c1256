//! N 维网格几何与标量场.
//!
//! 所有场均以行优先 (标准布局) 保存, 因此网格点既可以用 N 维索引
//! `&[usize]` 访问, 也可以用线性索引 `usize` 访问. 算法内部一律使用线性索引.

mod iter;
mod save;

pub use iter::IndexIter;
pub use save::ReadFieldError;

use crate::{SegError, SegResult};
use ndarray::{ArrayD, ArrayViewD, Dimension, IxDyn};
use num::ToPrimitive;
use std::ops::Index;

/// N 维网格几何: 形状, 每轴间距与原点.
///
/// 索引与世界坐标的关系为 `world = origin + index * spacing`.
/// 该对象构建后不可变.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    shape: Vec<usize>,
    spacing: Vec<f64>,
    origin: Vec<f64>,

    /// 行优先步长, 由 `shape` 导出.
    strides: Vec<usize>,
}

impl Geometry {
    /// 构建网格几何.
    ///
    /// 三个参数长度必须一致且不为空, 每轴长度为正, 间距为正有限数,
    /// 原点为有限数, 否则返回 `InvalidConfiguration`.
    pub fn new(shape: &[usize], spacing: &[f64], origin: &[f64]) -> SegResult<Self> {
        if shape.is_empty() {
            return Err(SegError::InvalidConfiguration("网格维度为 0"));
        }
        if spacing.len() != shape.len() || origin.len() != shape.len() {
            return Err(SegError::InvalidConfiguration("形状, 间距与原点维度不一致"));
        }
        if shape.iter().any(|&n| n == 0) {
            return Err(SegError::InvalidConfiguration("网格某轴长度为 0"));
        }
        if !spacing.iter().all(|&h| h.is_finite() && h > 0.0) {
            return Err(SegError::InvalidConfiguration("网格间距必须为正有限数"));
        }
        if !origin.iter().all(|o| o.is_finite()) {
            return Err(SegError::InvalidConfiguration("网格原点必须为有限数"));
        }

        let mut strides = vec![1usize; shape.len()];
        for axis in (0..shape.len() - 1).rev() {
            strides[axis] = strides[axis + 1] * shape[axis + 1];
        }
        Ok(Self {
            shape: shape.to_vec(),
            spacing: spacing.to_vec(),
            origin: origin.to_vec(),
            strides,
        })
    }

    /// 单位间距, 零原点的网格.
    pub fn unit(shape: &[usize]) -> SegResult<Self> {
        let n = shape.len();
        Self::new(shape, &vec![1.0; n], &vec![0.0; n])
    }

    /// 维度.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// 每轴长度.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// 每轴间距.
    #[inline]
    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    /// 每轴原点.
    #[inline]
    pub fn origin(&self) -> &[f64] {
        &self.origin
    }

    /// 行优先步长.
    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// 网格点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// 网格是否为空. 合法构建的网格总是非空的.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 最小间距.
    #[inline]
    pub fn min_spacing(&self) -> f64 {
        self.spacing.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// 最大间距.
    #[inline]
    pub fn max_spacing(&self) -> f64 {
        self.spacing.iter().copied().fold(0.0, f64::max)
    }

    /// 检查索引是否合法 (维度一致且未越界).
    #[inline]
    pub fn check(&self, index: &[usize]) -> bool {
        index.len() == self.ndim() && index.iter().zip(&self.shape).all(|(i, n)| i < n)
    }

    /// N 维索引 -> 线性索引. 越界时返回 `None`.
    pub fn linear(&self, index: &[usize]) -> Option<usize> {
        self.check(index)
            .then(|| index.iter().zip(&self.strides).map(|(i, s)| i * s).sum())
    }

    /// 线性索引 -> N 维索引.
    pub fn unravel(&self, p: usize) -> Vec<usize> {
        self.strides
            .iter()
            .zip(&self.shape)
            .map(|(s, n)| (p / s) % n)
            .collect()
    }

    /// 线性索引 `p` 在 `axis` 轴上的坐标.
    #[inline]
    pub fn coord(&self, p: usize, axis: usize) -> usize {
        (p / self.strides[axis]) % self.shape[axis]
    }

    /// (连续) 索引 -> 世界坐标.
    pub fn index_to_world(&self, index: &[f64]) -> Vec<f64> {
        index
            .iter()
            .zip(self.origin.iter().zip(&self.spacing))
            .map(|(i, (o, h))| o + i * h)
            .collect()
    }

    /// 世界坐标 -> (连续) 索引.
    pub fn world_to_index(&self, world: &[f64]) -> Vec<f64> {
        world
            .iter()
            .zip(self.origin.iter().zip(&self.spacing))
            .map(|(x, (o, h))| (x - o) / h)
            .collect()
    }

    /// 获得线性索引 `p` 在 `axis` 轴上的 (低侧, 高侧) 邻居. 越界的一侧为 `None`.
    #[inline]
    pub fn axis_neighbours(&self, p: usize, axis: usize) -> (Option<usize>, Option<usize>) {
        let s = self.strides[axis];
        let c = self.coord(p, axis);
        (
            (c > 0).then(|| p - s),
            (c + 1 < self.shape[axis]).then(|| p + s),
        )
    }

    /// 获得线性索引 `p` 的所有面邻居 (2N-邻域), 以 `(axis, q)` 形式给出.
    /// 只产生不越界的邻居.
    pub fn neighbours(&self, p: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.ndim()).flat_map(move |axis| {
            let (lower, upper) = self.axis_neighbours(p, axis);
            lower
                .into_iter()
                .chain(upper)
                .map(move |q| (axis, q))
        })
    }

    /// 沿 `axis` 轴移动 `delta` 步, 在边界处截断 (零通量边界).
    #[inline]
    pub fn step_clamped(&self, p: usize, axis: usize, delta: isize) -> usize {
        let c = self.coord(p, axis) as isize;
        let last = self.shape[axis] as isize - 1;
        let moved = (c + delta).clamp(0, last);
        (p as isize + (moved - c) * self.strides[axis] as isize) as usize
    }
}

/// 定义在 [`Geometry`] 上的 N 维标量场.
///
/// 底层数据总是标准布局 (行优先, 连续).
#[derive(Clone, Debug)]
pub struct Field {
    geometry: Geometry,
    data: ArrayD<f64>,
}

impl Index<&[usize]> for Field {
    type Output = f64;

    #[inline]
    fn index(&self, index: &[usize]) -> &Self::Output {
        &self.data[index]
    }
}

impl Field {
    /// 以现成数组构建. 数组形状必须与 `geometry` 一致, 否则返回 `GridMismatch`.
    pub fn new(geometry: Geometry, data: ArrayD<f64>) -> SegResult<Self> {
        if data.shape() != geometry.shape() {
            return Err(SegError::GridMismatch);
        }
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Ok(Self { geometry, data })
    }

    /// 以常数填充.
    pub fn filled(geometry: Geometry, value: f64) -> Self {
        let data = ArrayD::from_elem(IxDyn(geometry.shape()), value);
        Self { geometry, data }
    }

    /// 以 N 维索引的函数填充.
    pub fn from_fn<F>(geometry: Geometry, mut f: F) -> Self
    where
        F: FnMut(&[usize]) -> f64,
    {
        let data = ArrayD::from_shape_fn(IxDyn(geometry.shape()), |idx| f(idx.slice()));
        Self { geometry, data }
    }

    /// 从任意数值像素数组构建, 例如 `u8` 灰度图或 `f32` 扫描.
    ///
    /// 形状不一致时返回 `GridMismatch`; 存在无法表示为 `f64` 的像素时返回
    /// `InvalidConfiguration`.
    pub fn from_pixels<T>(geometry: Geometry, pixels: ArrayViewD<T>) -> SegResult<Self>
    where
        T: ToPrimitive,
    {
        if pixels.shape() != geometry.shape() {
            return Err(SegError::GridMismatch);
        }
        let mut out = Vec::with_capacity(geometry.len());
        for pix in pixels.iter() {
            match pix.to_f64() {
                Some(v) => out.push(v),
                None => return Err(SegError::InvalidConfiguration("像素无法转换为 f64")),
            }
        }
        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data = ArrayD::from_shape_vec(IxDyn(geometry.shape()), out).unwrap();
        Ok(Self { geometry, data })
    }

    /// 网格几何.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// 底层数据的不可变视图.
    #[inline]
    pub fn view(&self) -> ArrayViewD<f64> {
        self.data.view()
    }

    /// 消费自我, 获得底层数组.
    #[inline]
    pub fn into_array(self) -> ArrayD<f64> {
        self.data
    }

    /// 行优先的连续数据.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        // 构建时保证了标准布局.
        self.data.as_slice().unwrap()
    }

    /// 行优先的连续可变数据.
    #[inline]
    pub(crate) fn as_slice_mut(&mut self) -> &mut [f64] {
        self.data.as_slice_mut().unwrap()
    }

    /// 线性索引处的值. 越界时 panic.
    #[inline]
    pub fn at(&self, p: usize) -> f64 {
        self.as_slice()[p]
    }

    /// N 维索引处的值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.geometry.linear(index).map(|p| self.at(p))
    }

    /// 两个场的网格几何是否一致.
    #[inline]
    pub fn same_geometry(&self, other: &Field) -> bool {
        self.geometry == other.geometry
    }

    /// 网格几何不一致时返回 `GridMismatch`.
    #[inline]
    pub fn check_geometry(&self, other: &Field) -> SegResult<()> {
        if self.same_geometry(other) {
            Ok(())
        } else {
            Err(SegError::GridMismatch)
        }
    }

    /// 第一个 NaN 值的线性索引.
    pub fn first_nan(&self) -> Option<usize> {
        self.as_slice().iter().position(|v| v.is_nan())
    }

    /// 在连续索引 `cidx` 处做多线性插值. 超出网格的部分截断到边界.
    pub fn interpolate(&self, cidx: &[f64]) -> f64 {
        let geo = &self.geometry;
        let n = geo.ndim();
        debug_assert_eq!(cidx.len(), n);

        // 每轴的 (下标, 权重), 权重为靠近上侧的比例.
        let mut cell = Vec::with_capacity(n);
        for (axis, &x) in cidx.iter().enumerate() {
            let last = geo.shape()[axis] - 1;
            let x = x.clamp(0.0, last as f64);
            let i0 = (x.floor() as usize).min(last);
            let t = if i0 == last { 0.0 } else { x - i0 as f64 };
            cell.push((i0, t));
        }

        let data = self.as_slice();
        let mut acc = 0.0;
        for corner in 0..(1usize << n) {
            let mut w = 1.0;
            let mut p = 0usize;
            for (axis, &(i0, t)) in cell.iter().enumerate() {
                if (corner >> axis) & 1 == 1 {
                    if t == 0.0 {
                        w = 0.0;
                        break;
                    }
                    w *= t;
                    p += (i0 + 1) * geo.strides()[axis];
                } else {
                    w *= 1.0 - t;
                    p += i0 * geo.strides()[axis];
                }
            }
            if w != 0.0 {
                acc += w * data[p];
            }
        }
        acc
    }

    /// 以中心差分计算梯度 (世界坐标单位), 每轴一个场.
    ///
    /// 边界处退化为单侧差分; 长度为 1 的轴上导数为 0.
    pub fn gradient(&self) -> Vec<Field> {
        let geo = &self.geometry;
        let data = self.as_slice();
        (0..geo.ndim())
            .map(|axis| {
                let h = geo.spacing()[axis];
                let mut out = Vec::with_capacity(geo.len());
                for p in 0..geo.len() {
                    let d = match geo.axis_neighbours(p, axis) {
                        (Some(lo), Some(hi)) => (data[hi] - data[lo]) / (2.0 * h),
                        (Some(lo), None) => (data[p] - data[lo]) / h,
                        (None, Some(hi)) => (data[hi] - data[p]) / h,
                        (None, None) => 0.0,
                    };
                    out.push(d);
                }
                let arr = ArrayD::from_shape_vec(IxDyn(geo.shape()), out).unwrap();
                Field {
                    geometry: geo.clone(),
                    data: arr,
                }
            })
            .collect()
    }
}
