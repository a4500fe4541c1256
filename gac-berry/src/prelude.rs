//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, SegError, SegResult};

pub use crate::consts::Side;
pub use crate::consts::gray::{BLACK, WHITE};

pub use crate::grid::{Field, Geometry};

pub use crate::fast_march::{distance_map, DistanceConfig, Seed, Speed};

pub use crate::feature::{EdgePotential, EdgePotentialPipeline};

pub use crate::level_set::{Evolution, EvolutionConfig, EvolutionReport, NarrowBand, Status};

pub use crate::threshold::{BinaryMask, BinaryThreshold};

pub use crate::pipeline::{segment, segment_image, SeedProvider, Segmentation};
