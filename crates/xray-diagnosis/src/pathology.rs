//! 病理评分
//!
//! 胸部按肺野密度分级，手/腿按肢体区域边缘复杂度乘以部位灵敏度分级。
//! 输出从不为空：没有阈值触发时给出一条健康发现。

use tracing::{debug, info};
use xray_core::config::{PathologyConfig, ProbabilityBand, RegionLayout};
use xray_core::{Anatomy, Finding, Severity};
use xray_imaging::{RasterImage, RegionSampler};

pub const PULMONARY_OPACITY: &str = "Pulmonary Opacity";
pub const MILD_HAZINESS: &str = "Mild Haziness";
pub const BIG_FRACTURE: &str = "Big Fracture Detected";
pub const MINOR_CRACK: &str = "Minor Bone Crack";
pub const HEALTHY: &str = "Healthy (No Issues)";
pub const UNRECOGNIZED_ANATOMY: &str = "Unrecognized Anatomy (Re-upload Required)";
pub const INTERPRETATION_ERROR: &str = "Image Interpretation Error";

/// 病理评分器
#[derive(Debug, Clone, Copy)]
pub struct PathologyScorer<'a> {
    sampler: RegionSampler<'a>,
    regions: &'a RegionLayout,
    config: &'a PathologyConfig,
}

impl<'a> PathologyScorer<'a> {
    pub fn new(sampler: RegionSampler<'a>, regions: &'a RegionLayout, config: &'a PathologyConfig) -> Self {
        Self {
            sampler,
            regions,
            config,
        }
    }

    /// 对已识别部位的影像评分，结果按严重程度、概率降序排列
    pub fn score(&self, image: &RasterImage, anatomy: Anatomy) -> Vec<Finding> {
        let mut findings = match anatomy {
            Anatomy::Chest => self.score_chest(image),
            Anatomy::Hand => self.score_limb(image, Anatomy::Hand, self.config.hand_sensitivity),
            Anatomy::Leg => self.score_limb(image, Anatomy::Leg, self.config.leg_sensitivity),
            Anatomy::Unknown => vec![self.unrecognized()],
        };

        if findings.is_empty() {
            findings.push(Finding::new(
                HEALTHY,
                self.config.healthy_probability,
                Severity::Normal,
                anatomy,
            ));
        }

        rank(&mut findings);
        info!(
            "{} pathology scoring produced {} finding(s), top: {}",
            anatomy,
            findings.len(),
            findings[0].label
        );
        findings
    }

    fn score_chest(&self, image: &RasterImage) -> Vec<Finding> {
        let density = self.sampler.density(image, &self.regions.lung_field);
        debug!("lung field density = {:.3}", density);

        graded(
            density,
            (self.config.chest_critical, PULMONARY_OPACITY, &self.config.opacity_band),
            (self.config.chest_moderate, MILD_HAZINESS, &self.config.haziness_band),
            Anatomy::Chest,
        )
    }

    fn score_limb(&self, image: &RasterImage, anatomy: Anatomy, sensitivity: f32) -> Vec<Finding> {
        let edges = self.sampler.edge_complexity(image, &self.regions.limb_field);
        let score = edges * sensitivity;
        debug!("{} limb field edges = {:.3}, weighted score = {:.3}", anatomy, edges, score);

        graded(
            score,
            (self.config.limb_critical, BIG_FRACTURE, &self.config.fracture_band),
            (self.config.limb_moderate, MINOR_CRACK, &self.config.crack_band),
            anatomy,
        )
    }

    fn unrecognized(&self) -> Finding {
        Finding::new(
            UNRECOGNIZED_ANATOMY,
            self.config.unknown_probability,
            Severity::Moderate,
            Anatomy::Unknown,
        )
    }

    /// 影像无法解码时的占位发现
    pub fn interpretation_error(config: &PathologyConfig) -> Finding {
        Finding::new(
            INTERPRETATION_ERROR,
            config.interpretation_error_probability,
            Severity::Moderate,
            Anatomy::Unknown,
        )
    }
}

/// 分级阈值：(阈值, 标签, 概率区间)
type Grade<'g> = (f32, &'static str, &'g ProbabilityBand);

/// 先检查危重阈值，再检查异常阈值，分数须严格超过阈值；都未触发返回空列表
fn graded(score: f32, critical: Grade<'_>, moderate: Grade<'_>, anatomy: Anatomy) -> Vec<Finding> {
    let (critical_at, critical_label, critical_band) = critical;
    let (moderate_at, moderate_label, moderate_band) = moderate;

    if score > critical_at {
        vec![Finding::new(critical_label, critical_band.apply(score), Severity::Critical, anatomy)]
    } else if score > moderate_at {
        vec![Finding::new(moderate_label, moderate_band.apply(score), Severity::Moderate, anatomy)]
    } else {
        Vec::new()
    }
}

fn rank(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.probability.total_cmp(&a.probability))
    });
}
