#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供基于种子点的测地线活动轮廓 (Geodesic Active Contour) 分割.
//!
//! 数据流: 种子 -> 快速行进距离图 (初始水平集) -> 窄带水平集演化
//! (读取外部给出的边缘势场) -> 收敛的水平集 -> 阈值化二值掩膜.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 全 crate 统一使用 "内负外正" 的符号约定, 见 [`consts::Side`].
//! 2. 平滑, 梯度模与 sigmoid 等边缘势场的前处理不在本 crate 范围内,
//!   由调用方通过 [`feature::EdgePotentialPipeline`] 提供.
//! 3. 配置和输入错误总是在任何计算开始之前以 [`SegError`] 返回,
//!   而不会 panic.
//!
//! # 开发计划
//!
//! ### N 维网格与标量场 ✅
//!
//! 行优先线性索引, 世界坐标映射, 多线性插值, 中心差分梯度, npy 持久化.
//!
//! 实现位于 `gac-berry/src/grid`.
//!
//! ### 带种子的快速行进距离图 ✅
//!
//! 1. 最小堆 + 惰性跳过过时条目. ✅
//! 2. 常数速度 / 逐点速度图, 停止值. ✅
//! 3. 区域限制 (重新距离化时分别推进轮廓内外). ✅
//!
//! 实现位于 `gac-berry/src/fast_march`.
//!
//! ### 窄带水平集演化 ✅
//!
//! 1. 传播项迎风格式, 平流项逐轴迎风, 曲率项中心差分. ✅
//! 2. 特征在最近零水平集处插值采样. ✅
//! 3. 窄带越界或波前越过网格点时重新距离化. ✅
//! 4. `rayon` 并行计算速率 (feature `rayon`). ✅
//! 5. 观察者取消. ✅
//!
//! 实现位于 `gac-berry/src/level_set`.
//!
//! ### 阈值化与流水线 ✅
//!
//! 实现位于 `gac-berry/src/threshold.rs`, `gac-berry/src/pipeline.rs`.
//!
//! ### 三维各向异性网格上的演化 benchmark ⌛️
//!
//! 目前的消融实验只覆盖 2D 合成圆环.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

mod error;

pub use error::{SegError, SegResult};

pub mod consts;

pub mod grid;

pub mod fast_march;

pub mod feature;

pub mod level_set;

pub mod threshold;

pub mod pipeline;

pub mod phantom;

pub mod prelude;
