//! 影像质量门限
//!
//! 在分类之前拒绝不可用的影像（过暗、过曝、对比度不足）。
//! 拒绝是独立的结果，要求重新上传，绝不会被当作正常发现。

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};
use xray_core::config::{QualityConfig, RegionSpec, SamplerConfig};

use crate::raster::RasterImage;
use crate::sampler::{RegionSampler, Statistic};

/// 拒绝原因
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum RejectionReason {
    TooDark,
    WashedOut,
    LowContrast,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::TooDark => write!(f, "Too Dark"),
            RejectionReason::WashedOut => write!(f, "Washed Out"),
            RejectionReason::LowContrast => write!(f, "Low Contrast"),
        }
    }
}

/// 整幅图像的质量指标
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct QualityMetrics {
    pub density: f32,
    pub edge_complexity: f32,
}

/// 质量拒绝结果
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QualityRejection {
    pub reason: RejectionReason,
    pub metrics: QualityMetrics,
    pub instruction: String,
}

/// 质量门限判定
#[derive(Debug, Clone, PartialEq)]
pub enum QualityVerdict {
    Pass(QualityMetrics),
    Reject(QualityRejection),
}

impl QualityVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, QualityVerdict::Pass(_))
    }
}

type QualityRule = (RejectionReason, fn(&QualityMetrics, &QualityConfig) -> bool);

/// 按顺序检查，第一条命中的规则生效
fn quality_rules() -> [QualityRule; 3] {
    [
        (RejectionReason::TooDark, |m, c| m.density < c.dark_floor),
        (RejectionReason::WashedOut, |m, c| m.density > c.washed_out_ceiling),
        (RejectionReason::LowContrast, |m, c| m.edge_complexity < c.flatness_floor),
    ]
}

/// 质量门限
#[derive(Debug, Clone, Copy)]
pub struct QualityGate<'a> {
    sampler: RegionSampler<'a>,
    config: &'a QualityConfig,
}

impl<'a> QualityGate<'a> {
    pub fn new(sampler_config: &'a SamplerConfig, config: &'a QualityConfig) -> Self {
        Self {
            sampler: RegionSampler::new(sampler_config),
            config,
        }
    }

    /// 计算整幅图像的质量指标
    pub fn measure(&self, image: &RasterImage) -> QualityMetrics {
        let whole = RegionSpec::full();
        let values = self.sampler.sample_many(
            image,
            &[(Statistic::Density, whole), (Statistic::EdgeComplexity, whole)],
        );

        QualityMetrics {
            density: values[0],
            edge_complexity: values[1],
        }
    }

    /// 评估影像质量
    pub fn evaluate(&self, image: &RasterImage) -> QualityVerdict {
        let metrics = self.measure(image);

        let rejected = quality_rules()
            .iter()
            .find(|(_, rule)| rule(&metrics, self.config))
            .map(|(reason, _)| *reason);

        match rejected {
            Some(reason) => {
                warn!(
                    "影像质量不合格: {} (密度 {:.3}, 边缘复杂度 {:.3})",
                    reason, metrics.density, metrics.edge_complexity
                );
                QualityVerdict::Reject(QualityRejection {
                    reason,
                    metrics,
                    instruction: format!(
                        "RE-UPLOAD SCAN: Image rejected by quality check ({}). Please acquire a new exposure.",
                        reason
                    ),
                })
            }
            None => {
                info!(
                    "影像质量检查通过 (密度 {:.3}, 边缘复杂度 {:.3})",
                    metrics.density, metrics.edge_complexity
                );
                QualityVerdict::Pass(metrics)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate(image: &RasterImage) -> QualityVerdict {
        let sampler = SamplerConfig::default();
        let quality = QualityConfig::default();
        QualityGate::new(&sampler, &quality).evaluate(image)
    }

    fn reason(verdict: &QualityVerdict) -> Option<RejectionReason> {
        match verdict {
            QualityVerdict::Reject(rejection) => Some(rejection.reason),
            QualityVerdict::Pass(_) => None,
        }
    }

    #[test]
    fn test_uniform_mid_gray_is_low_contrast() {
        let img = RasterImage::from_gray_fn(100, 100, |_, _| 128).unwrap();
        let verdict = evaluate(&img);
        assert_eq!(reason(&verdict), Some(RejectionReason::LowContrast));
    }

    #[test]
    fn test_dark_and_washed_out_take_precedence() {
        // 暗图上也没有边缘，但过暗规则先命中
        let dark = RasterImage::from_gray_fn(100, 100, |_, _| 5).unwrap();
        assert_eq!(reason(&evaluate(&dark)), Some(RejectionReason::TooDark));

        let bright = RasterImage::from_gray_fn(100, 100, |_, _| 250).unwrap();
        assert_eq!(reason(&evaluate(&bright)), Some(RejectionReason::WashedOut));
    }

    #[test]
    fn test_textured_image_passes() {
        let img = RasterImage::from_gray_fn(120, 120, |x, _| if (x / 4) % 2 == 0 { 200 } else { 100 }).unwrap();
        let verdict = evaluate(&img);
        assert!(verdict.is_pass());
    }

    #[test]
    fn test_gate_is_idempotent() {
        let img = RasterImage::from_gray_fn(90, 60, |x, y| ((x * 7 + y * 3) % 256) as u8).unwrap();
        assert_eq!(evaluate(&img), evaluate(&img));
    }

    #[test]
    fn test_rejection_display_labels() {
        assert_eq!(RejectionReason::TooDark.to_string(), "Too Dark");
        assert_eq!(RejectionReason::WashedOut.to_string(), "Washed Out");
        assert_eq!(RejectionReason::LowContrast.to_string(), "Low Contrast");
    }
}
