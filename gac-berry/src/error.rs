//! 运行时错误.

use std::fmt;

/// 分割核心的运行时错误.
///
/// 配置类错误 (`InvalidSeed`, `InvalidConfiguration`, `GridMismatch`)
/// 总是在任何迭代开始前返回; `NumericalBreakdown` 只会在准备演化或演化过程中出现.
#[derive(Debug, Clone, PartialEq)]
pub enum SegError {
    /// 种子点越界, 维度与网格不一致, 或初始值不是有限数.
    ///
    /// 参数为出错种子在输入序列中的位置.
    InvalidSeed(usize),

    /// 非法配置. 参数描述了具体违反的约束.
    InvalidConfiguration(&'static str),

    /// 两个场的网格几何 (形状, 间距, 原点) 不一致.
    GridMismatch,

    /// 初始水平集含有 NaN, 演化过程中出现非有限值, 或在零交叉处出现退化的曲率分母.
    ///
    /// 参数为出错点的线性索引.
    NumericalBreakdown(usize),
}

impl fmt::Display for SegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegError::InvalidSeed(i) => write!(f, "invalid seed #{i}"),
            SegError::InvalidConfiguration(why) => write!(f, "invalid configuration: {why}"),
            SegError::GridMismatch => f.write_str("grid geometry mismatch"),
            SegError::NumericalBreakdown(p) => {
                write!(f, "numerical breakdown at linear index {p}")
            }
        }
    }
}

impl std::error::Error for SegError {}

/// 分割核心的运行结果.
pub type SegResult<T> = Result<T, SegError>;
