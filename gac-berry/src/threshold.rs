//! 把最终水平集转换为二值掩膜.

use crate::consts::defaults::{THRESHOLD_LOWER, THRESHOLD_UPPER};
use crate::consts::gray::{BLACK, WHITE};
use crate::grid::{Field, Geometry, IndexIter};
use crate::{SegError, SegResult};
use image::error::{ImageError, ParameterError, ParameterErrorKind};
use image::ImageResult;
use ndarray::{ArrayD, ArrayViewD};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 二值阈值: 取值位于闭区间 `[lower, upper]` 内的点标记为 `inside`, 其余为 `outside`.
///
/// 该对象是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinaryThreshold {
    lower: f64,
    upper: f64,
    inside: u8,
    outside: u8,
}

impl Default for BinaryThreshold {
    /// `[-1000, 0]` 内为白色 (轮廓内部), 其余为黑色.
    fn default() -> Self {
        Self {
            lower: THRESHOLD_LOWER,
            upper: THRESHOLD_UPPER,
            inside: WHITE,
            outside: BLACK,
        }
    }
}

impl BinaryThreshold {
    /// 构建阈值. 上下限不能为 NaN, 且 `lower <= upper`, 否则返回 `InvalidConfiguration`.
    pub fn new(lower: f64, upper: f64, inside: u8, outside: u8) -> SegResult<Self> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(SegError::InvalidConfiguration("阈值区间不合法"));
        }
        Ok(Self {
            lower,
            upper,
            inside,
            outside,
        })
    }

    /// 下限.
    #[inline]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// 上限.
    #[inline]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// 区间内的标签.
    #[inline]
    pub fn inside(&self) -> u8 {
        self.inside
    }

    /// 区间外的标签.
    #[inline]
    pub fn outside(&self) -> u8 {
        self.outside
    }

    /// 单个值的标签. NaN 视为区间外.
    #[inline]
    pub fn eval(&self, value: f64) -> u8 {
        if self.lower <= value && value <= self.upper {
            self.inside
        } else {
            self.outside
        }
    }

    /// 逐点应用阈值. 这是纯函数: 对同一个场总是得到逐位相同的掩膜.
    pub fn extract(&self, field: &Field) -> BinaryMask {
        BinaryMask {
            geometry: field.geometry().clone(),
            data: field.view().mapv(|v| self.eval(v)),
            foreground: self.inside,
        }
    }
}

/// 二值掩膜, 与来源场共享网格几何.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryMask {
    geometry: Geometry,
    data: ArrayD<u8>,
    foreground: u8,
}

impl BinaryMask {
    /// 网格几何.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// 掩膜数据的不可变视图.
    #[inline]
    pub fn view(&self) -> ArrayViewD<u8> {
        self.data.view()
    }

    /// 前景标签.
    #[inline]
    pub fn foreground(&self) -> u8 {
        self.foreground
    }

    /// 前景点个数.
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == self.foreground).count()
    }

    /// 所有前景点的 N 维索引, 行优先.
    pub fn foreground_indices(&self) -> Vec<Vec<usize>> {
        IndexIter::new(self.geometry.shape())
            .filter(|idx| self.data[idx.as_slice()] == self.foreground)
            .collect()
    }

    /// 以灰度图形式按原样将 2D 掩膜保存到 `path` 路径, 格式由扩展名决定.
    ///
    /// 非 2D 掩膜返回 `DimensionMismatch` 参数错误.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        if self.geometry.ndim() != 2 {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }
        let (height, width) = (self.geometry.shape()[0], self.geometry.shape()[1]);
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for (idx, &pix) in self.data.indexed_iter() {
            buf.put_pixel(idx[1] as u32, idx[0] as u32, image::Luma([pix]));
        }
        buf.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::BinaryThreshold;
    use crate::consts::gray::WHITE;
    use crate::consts::Side;
    use crate::grid::{Field, Geometry};
    use crate::level_set::NarrowBand;

    #[test]
    fn test_threshold_init_err() {
        assert!(BinaryThreshold::new(1.0, 0.0, 255, 0).is_err());
        assert!(BinaryThreshold::new(f64::NAN, 0.0, 255, 0).is_err());
        assert!(BinaryThreshold::new(f64::NEG_INFINITY, 0.0, 1, 0).is_ok());
    }

    #[test]
    fn test_threshold_default() {
        let t = BinaryThreshold::default();
        assert_eq!(t.eval(-1000.0), 255);
        assert_eq!(t.eval(0.0), 255);
        assert_eq!(t.eval(-3.5), 255);
        assert_eq!(t.eval(1e-9), 0);
        assert_eq!(t.eval(-1000.5), 0);
        assert_eq!(t.eval(f64::NAN), 0);
    }

    #[test]
    fn test_extract_idempotent() {
        let g = Geometry::unit(&[9, 11]).unwrap();
        let u = Field::from_fn(g, |i| (i[0] as f64 - 4.0).hypot(i[1] as f64 - 5.0) - 3.2);
        let t = BinaryThreshold::default();
        let a = t.extract(&u);
        let b = t.extract(&u);
        assert_eq!(a, b);
        assert_eq!(a.view().as_slice(), b.view().as_slice());

        let fg = a.foreground_indices();
        assert_eq!(fg.len(), a.foreground_count());
        assert!(fg.contains(&vec![4, 5]));
        assert!(!fg.contains(&vec![0, 0]));
        assert!(fg.iter().all(|idx| u[idx.as_slice()] <= 0.0));
    }

    /// 默认阈值的前景与水平集的内侧完全一致, 包括取值恰为 0 的点.
    #[test]
    fn test_default_mask_matches_side() {
        let g = Geometry::unit(&[3, 20]).unwrap();
        let mut u = Field::from_fn(g.clone(), |i| 2.0 * (i[1] as f64 - 10.0));
        NarrowBand::new(4.0, &g).rebuild(&mut u);
        let mask = BinaryThreshold::default().extract(&u);

        for (v, &m) in u.as_slice().iter().zip(mask.view().iter()) {
            assert_eq!(Side::of(*v).is_inside(), m == WHITE, "{v}");
        }
        assert_eq!(u[&[1, 10][..]], 0.0);
        assert!(Side::of(u[&[1, 10][..]]).is_inside());
        assert_eq!(mask.view()[&[1, 10][..]], WHITE);
        assert_eq!(mask.foreground_count(), 3 * 11);
    }

    #[test]
    fn test_save_png() {
        let g = Geometry::unit(&[6, 9]).unwrap();
        let u = Field::from_fn(g, |i| if i[1] < 4 { -1.0 } else { 1.0 });
        let mask = BinaryThreshold::default().extract(&u);

        let path = std::env::temp_dir().join(format!("gac_berry_mask_{}.png", std::process::id()));
        mask.save(&path).unwrap();
        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(back.dimensions(), (9, 6));
        assert_eq!(back.get_pixel(3, 5).0, [255]);
        assert_eq!(back.get_pixel(4, 0).0, [0]);
        std::fs::remove_file(&path).unwrap();

        let cube = BinaryThreshold::default().extract(&Field::filled(Geometry::unit(&[2, 2, 2]).unwrap(), 0.0));
        assert!(cube.save(std::env::temp_dir().join("gac_berry_cube.png")).is_err());
    }
}
