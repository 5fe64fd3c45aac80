//! # 影像处理模块
//!
//! 提供影像解码、区域采样、质量门限和参考图像匹配功能。
//! 所有统计量都是对只读像素数据的纯函数，可以在多个区域上并行计算。

pub mod decoder;
pub mod quality;
pub mod raster;
pub mod reference;
pub mod sampler;

pub use decoder::{ImageDecoder, StandardDecoder};
pub use quality::{QualityGate, QualityMetrics, QualityRejection, QualityVerdict, RejectionReason};
pub use raster::{PixelRect, RasterImage};
pub use reference::{
    default_reference_dir, DirectoryReferenceSource, ReferenceEntry, ReferenceMatch,
    ReferenceMatcher, ReferenceSource,
};
pub use sampler::{RegionSampler, Statistic};
