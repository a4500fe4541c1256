//! 合成输入: 圆环边缘, 圆盘与方块水平集.
//!
//! 所有坐标均为世界坐标. 水平集遵循内负外正的约定.

use crate::feature::EdgePotential;
use crate::grid::{Field, Geometry};
use crate::{SegError, SegResult};
use ndarray::{ArrayD, Dimension, IxDyn};

/// 网格点 `index` 到 `centre` 的欧氏距离.
fn distance(geometry: &Geometry, index: &[usize], centre: &[f64]) -> f64 {
    index
        .iter()
        .zip(centre)
        .enumerate()
        .map(|(axis, (&i, c))| {
            let x = geometry.origin()[axis] + i as f64 * geometry.spacing()[axis];
            (x - c).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

fn check_centre(geometry: &Geometry, centre: &[f64]) -> SegResult<()> {
    if centre.len() == geometry.ndim() && centre.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(SegError::InvalidConfiguration("中心维度与网格不符或非有限"))
    }
}

/// 以 `centre` 为圆心, 半径 `radius` 的圆盘 (球) 的带符号距离.
pub fn disc(geometry: &Geometry, centre: &[f64], radius: f64) -> SegResult<Field> {
    check_centre(geometry, centre)?;
    Ok(Field::from_fn(geometry.clone(), |i| {
        distance(geometry, i, centre) - radius
    }))
}

/// 以 `centre` 为中心, 半边长 `half_side` 的轴对齐方块 (立方体).
///
/// 取值为切比雪夫距离减去半边长, 零水平集即为方块边界.
pub fn square(geometry: &Geometry, centre: &[f64], half_side: f64) -> SegResult<Field> {
    check_centre(geometry, centre)?;
    Ok(Field::from_fn(geometry.clone(), |i| {
        i.iter()
            .zip(centre)
            .enumerate()
            .map(|(axis, (&k, c))| {
                let x = geometry.origin()[axis] + k as f64 * geometry.spacing()[axis];
                (x - c).abs()
            })
            .fold(0.0, f64::max)
            - half_side
    }))
}

/// 圆环的亮度: 在环上为 1, 随离环距离按高斯衰减, 宽度为 `sigma`.
fn ring_response(geometry: &Geometry, index: &[usize], centre: &[f64], radius: f64, sigma: f64) -> f64 {
    let d = distance(geometry, index, centre) - radius;
    (-d * d / (2.0 * sigma * sigma)).exp()
}

/// 合成的圆环图像: 暗背景上一条亮环, 灰度 `[0, 255]`.
pub fn ring_image(
    geometry: &Geometry,
    centre: &[f64],
    radius: f64,
    sigma: f64,
) -> SegResult<ArrayD<u8>> {
    check_centre(geometry, centre)?;
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(SegError::InvalidConfiguration("圆环宽度必须为正有限数"));
    }
    Ok(ArrayD::from_shape_fn(IxDyn(geometry.shape()), |idx| {
        let v = ring_response(geometry, idx.slice(), centre, radius, sigma);
        (255.0 * v).round() as u8
    }))
}

/// 圆环的边缘势场 `g = 1 - exp(-d^2 / 2σ^2)`, 其中 `d` 为到环的距离.
///
/// 势场在环上为 0, 远离环处趋于 1.
pub fn ring_potential(
    geometry: &Geometry,
    centre: &[f64],
    radius: f64,
    sigma: f64,
) -> SegResult<EdgePotential> {
    check_centre(geometry, centre)?;
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(SegError::InvalidConfiguration("圆环宽度必须为正有限数"));
    }
    let g = Field::from_fn(geometry.clone(), |i| {
        1.0 - ring_response(geometry, i, centre, radius, sigma)
    });
    EdgePotential::from_potential(g)
}

#[cfg(test)]
mod tests {
    use super::{disc, ring_image, ring_potential, square};
    use crate::grid::Geometry;

    #[test]
    fn test_disc_and_square() {
        let g = Geometry::new(&[21, 21], &[0.5, 0.5], &[-5.0, -5.0]).unwrap();
        let d = disc(&g, &[0.0, 0.0], 2.0).unwrap();
        assert_eq!(d[&[10, 10][..]], -2.0);
        assert_eq!(d[&[10, 14][..]], 0.0);
        assert_eq!(d[&[10, 20][..]], 3.0);

        let s = square(&g, &[0.0, 0.0], 2.0).unwrap();
        assert_eq!(s[&[14, 14][..]], 0.0);
        assert_eq!(s[&[12, 6][..]], 0.0);
        assert_eq!(s[&[10, 10][..]], -2.0);

        assert!(disc(&g, &[0.0], 1.0).is_err());
    }

    #[test]
    fn test_ring_potential() {
        let g = Geometry::unit(&[32, 32]).unwrap();
        let pot = ring_potential(&g, &[16.0, 16.0], 10.0, 1.5).unwrap();
        let p = pot.potential();
        assert!(p[&[16, 26][..]].abs() < 1e-12);
        assert!(p[&[16, 16][..]] > 0.99);
        assert!(p.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(ring_potential(&g, &[16.0, 16.0], 10.0, 0.0).is_err());
    }

    #[test]
    fn test_ring_image() {
        let g = Geometry::unit(&[32, 32]).unwrap();
        let img = ring_image(&g, &[16.0, 16.0], 10.0, 1.5).unwrap();
        assert_eq!(img[&[6, 16][..]], 255);
        assert_eq!(img[&[16, 16][..]], 0);
    }
}
