//! 标量场的持久化存储.

use super::{Field, Geometry};
use crate::SegError;
use image::error::{ImageError, ParameterError, ParameterErrorKind};
use image::ImageResult;
use ndarray::ArrayD;
use ndarray_npy::{ReadNpyError, WriteNpyError};
use std::path::Path;

/// 读取 npy 标量场错误.
#[derive(Debug)]
pub enum ReadFieldError {
    /// 读取 npy 文件错误.
    ReadNpyError(ReadNpyError),

    /// 文件内容与给定的间距/原点不匹配.
    Geometry(SegError),
}

impl From<ReadNpyError> for ReadFieldError {
    fn from(e: ReadNpyError) -> Self {
        Self::ReadNpyError(e)
    }
}

impl From<SegError> for ReadFieldError {
    fn from(e: SegError) -> Self {
        Self::Geometry(e)
    }
}

impl Field {
    /// 以 npy 格式将场的数值按原样保存到 `path` 路径. 不保存间距与原点.
    pub fn write_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError> {
        ndarray_npy::write_npy(path, &self.view())
    }

    /// 打开 npy 格式的场, 并附加间距 `spacing` 与原点 `origin`.
    pub fn read_npy<P: AsRef<Path>>(
        path: P,
        spacing: &[f64],
        origin: &[f64],
    ) -> Result<Self, ReadFieldError> {
        let data: ArrayD<f64> = ndarray_npy::read_npy(path)?;
        let geometry = Geometry::new(data.shape(), spacing, origin)?;
        Ok(Field::new(geometry, data)?)
    }

    /// 将 2D 场的有限值线性拉伸到 `[0, 255]` 后以灰度图保存到 `path` 路径,
    /// 格式由扩展名决定.
    ///
    /// `+inf` 记为 255, `-inf` 与 NaN 记为 0. 常值场全部记为 0.
    /// 非 2D 场返回 `DimensionMismatch` 参数错误.
    pub fn save_rescaled<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let geometry = self.geometry();
        if geometry.ndim() != 2 {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }
        let (min, max) = self
            .as_slice()
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        let gray = |v: f64| -> u8 {
            if v == f64::INFINITY {
                u8::MAX
            } else if !v.is_finite() || range <= 0.0 {
                0
            } else {
                ((v - min) / range * 255.0).round() as u8
            }
        };

        let (height, width) = (geometry.shape()[0], geometry.shape()[1]);
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for (idx, &v) in self.view().indexed_iter() {
            buf.put_pixel(idx[1] as u32, idx[0] as u32, image::Luma([gray(v)]));
        }
        buf.save(path)
    }
}
