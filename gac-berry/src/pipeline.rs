//! 分割流水线: 种子 -> 距离图 -> 水平集演化 -> 阈值.
//!
//! 每个阶段都是以类型化输入/输出连接的纯函数, 中间不共享任何可变状态;
//! 演化阶段以独占的 `&mut Field` 修改水平集.

use crate::fast_march::{distance_map, DistanceConfig, Seed};
use crate::feature::{EdgePotential, EdgePotentialPipeline};
use crate::grid::Field;
use crate::level_set::{Evolution, EvolutionConfig, EvolutionReport};
use crate::threshold::{BinaryMask, BinaryThreshold};
use crate::{SegError, SegResult};

/// 种子来源.
pub trait SeedProvider {
    /// 提供全部种子.
    fn seeds(&self) -> SegResult<Vec<Seed>>;
}

impl SeedProvider for [Seed] {
    #[inline]
    fn seeds(&self) -> SegResult<Vec<Seed>> {
        Ok(self.to_vec())
    }
}

impl SeedProvider for Vec<Seed> {
    #[inline]
    fn seeds(&self) -> SegResult<Vec<Seed>> {
        self.as_slice().seeds()
    }
}

/// 一次成功分割的全部产出.
#[derive(Clone, Debug)]
pub struct Segmentation {
    /// 冻结的最终水平集.
    pub level_set: Field,

    /// 阈值化得到的二值掩膜.
    pub mask: BinaryMask,

    /// 演化报告. 状态为收敛, 达到迭代上限, 或 (观察者取消时的) 运行中.
    pub report: EvolutionReport,
}

/// 以现成的边缘势场完成一次分割.
///
/// 所有参数与网格在任何计算之前被检查. 演化失效时返回其
/// `NumericalBreakdown`, 不产生掩膜.
pub fn segment<S>(
    seeds: &S,
    potential: &EdgePotential,
    distance: &DistanceConfig,
    evolution: &EvolutionConfig,
    threshold: &BinaryThreshold,
) -> SegResult<Segmentation>
where
    S: SeedProvider + ?Sized,
{
    evolution.validate()?;
    if distance.geometry() != potential.geometry() {
        return Err(SegError::GridMismatch);
    }
    let seeds = seeds.seeds()?;
    let mut level_set = distance_map(&seeds, distance)?;

    let report = Evolution::new(&mut level_set, potential, evolution)?.run();
    if let Some(e) = report.breakdown.clone() {
        return Err(e);
    }

    let mask = threshold.extract(&level_set);
    log::info!(
        "segmentation done: {:?}, {} foreground points",
        report.status,
        mask.foreground_count()
    );
    Ok(Segmentation {
        level_set,
        mask,
        report,
    })
}

/// 从原始图像开始完成一次分割: 由 `pipeline` 生成边缘势场,
/// 距离图使用常数速度 1 且不设停止值.
pub fn segment_image<P, S>(
    image: &Field,
    pipeline: &P,
    seeds: &S,
    evolution: &EvolutionConfig,
    threshold: &BinaryThreshold,
) -> SegResult<Segmentation>
where
    P: EdgePotentialPipeline + ?Sized,
    S: SeedProvider + ?Sized,
{
    let potential = pipeline.edge_potential(image)?;
    image.check_geometry(potential.potential())?;
    let distance = DistanceConfig::new(image.geometry().clone());
    segment(seeds, &potential, &distance, evolution, threshold)
}
