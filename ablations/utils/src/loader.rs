//! 对 `gac-berry::phantom` 的更一层封装. 提供消融实验的合成输入与输出目录.

use gac_berry::prelude::*;
use gac_berry::phantom;
use std::env;
use std::path::PathBuf;

/// 合成圆环图像的边长.
pub const RING_SIDE: usize = 64;

/// 合成圆环的宽度.
pub const RING_SIGMA: f64 = 1.5;

/// 一个合成圆环分割任务.
#[derive(Clone, Debug)]
pub struct RingCase {
    /// 圆环半径.
    pub radius: f64,

    /// 灰度图像.
    pub image: Field,

    /// 位于圆心的单个种子.
    pub seeds: Vec<Seed>,
}

/// 在 `RING_SIDE x RING_SIDE` 的单位网格中央生成半径为 `radius` 的圆环任务.
///
/// 种子位于圆心, 初始距离为 `-5`.
pub fn ring_case(radius: f64) -> SegResult<RingCase> {
    let geometry = Geometry::unit(&[RING_SIDE, RING_SIDE])?;
    let c = (RING_SIDE / 2) as f64;
    let pixels = phantom::ring_image(&geometry, &[c, c], radius, RING_SIGMA)?;
    let image = Field::from_pixels(geometry, pixels.view())?;
    Ok(RingCase {
        radius,
        image,
        seeds: vec![Seed::new(vec![RING_SIDE / 2, RING_SIDE / 2], -5.0)],
    })
}

/// 亮边缘 -> 低势场: `g = 1 - v / 255`.
pub fn inverted_potential(image: &Field) -> SegResult<EdgePotential> {
    let g = Field::from_fn(image.geometry().clone(), |i| {
        (1.0 - image[i] / 255.0).clamp(0.0, 1.0)
    });
    EdgePotential::from_potential(g)
}

/// 获取掩膜输出目录.
///
/// 1. 若环境变量 `$GAC_ABLATION_OUT` 非空, 则返回其值;
/// 2. 否则, 返回系统临时目录下的 `gac-berry-ablation`.
pub fn output_dir_from_env_or_temp() -> PathBuf {
    match env::var("GAC_ABLATION_OUT") {
        Ok(d) if !d.is_empty() => PathBuf::from(d),
        _ => env::temp_dir().join("gac-berry-ablation"),
    }
}
