//! 解剖部位分类
//!
//! 从固定命名区域抽取特征，再按有序规则表判断部位：胸部 → 手部 → 腿部，
//! 第一个条件成立且置信度达到下限的分支生效，否则判为 Unknown。

use serde::Serialize;
use tracing::{debug, info};
use xray_core::config::{ClassifierConfig, RegionLayout};
use xray_core::{Anatomy, AnatomyEstimate};
use xray_imaging::{RasterImage, RegionSampler, Statistic};

/// 分类使用的特征向量，每幅影像重新计算
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct AnatomyFeatures {
    /// 宽高比
    pub aspect_ratio: f32,
    /// 两个上角的平均密度
    pub corner_density: f32,
    /// 两个上角的平均局部熵
    pub peripheral_entropy: f32,
    /// 中心区域密度
    pub center_density: f32,
    /// 竖直条带密度
    pub vertical_mass: f32,
    /// 扫描线上的亮段数
    pub segment_count: usize,
}

impl AnatomyFeatures {
    /// 在固定区域上并行采样，抽取特征
    pub fn extract(image: &RasterImage, regions: &RegionLayout, sampler: &RegionSampler<'_>) -> Self {
        let requests = [
            (Statistic::Density, regions.upper_left),
            (Statistic::Density, regions.upper_right),
            (Statistic::Entropy, regions.upper_left),
            (Statistic::Entropy, regions.upper_right),
            (Statistic::Density, regions.center),
            (Statistic::Density, regions.vertical_strip),
        ];
        let v = sampler.sample_many(image, &requests);

        let features = Self {
            aspect_ratio: image.aspect_ratio(),
            corner_density: (v[0] + v[1]) / 2.0,
            peripheral_entropy: (v[2] + v[3]) / 2.0,
            center_density: v[4],
            vertical_mass: v[5],
            segment_count: sampler.segment_count(image, regions.scan_line_y),
        };
        debug!("Extracted anatomy features: {:?}", features);
        features
    }
}

/// 分类规则：条件成立时返回该分支的置信度
type AnatomyRule = (Anatomy, fn(&AnatomyFeatures, &ClassifierConfig) -> Option<f32>);

/// 分支优先级：胸部 → 手部 → 腿部
fn anatomy_rules() -> [AnatomyRule; 3] {
    [
        (Anatomy::Chest, chest_confidence),
        (Anatomy::Hand, hand_confidence),
        (Anatomy::Leg, leg_confidence),
    ]
}

/// 横向 + 上角组织致密 + 周边平滑
fn chest_confidence(f: &AnatomyFeatures, c: &ClassifierConfig) -> Option<f32> {
    let matched = f.aspect_ratio > c.landscape_ratio
        && f.corner_density > c.chest_corner_density
        && f.peripheral_entropy < c.chest_entropy_ceiling;
    if !matched {
        return None;
    }

    Some(
        c.base_confidence
            + (f.corner_density - c.chest_corner_density)
            + 0.5 * (c.chest_entropy_ceiling - f.peripheral_entropy)
            + 0.5 * (f.aspect_ratio - c.landscape_ratio).min(0.3),
    )
}

/// 多个指骨段，或中等段数加上较高的周边熵（张开的手指）
fn hand_confidence(f: &AnatomyFeatures, c: &ClassifierConfig) -> Option<f32> {
    let many_segments = f.segment_count >= c.hand_segments_high;
    let splayed = f.segment_count >= c.hand_segments_moderate
        && f.peripheral_entropy >= c.hand_entropy_elevated;
    if !many_segments && !splayed {
        return None;
    }

    let extra_segments = f.segment_count.saturating_sub(c.hand_segments_moderate) as f32;
    let mut confidence = c.base_confidence
        + 0.05 * extra_segments
        + 0.5 * (f.peripheral_entropy - c.hand_entropy_elevated).max(0.0);
    if many_segments {
        confidence += 0.1;
    }
    Some(confidence)
}

/// 单根致密长骨：段数少、竖直条带密度高、周边平滑
fn leg_confidence(f: &AnatomyFeatures, c: &ClassifierConfig) -> Option<f32> {
    let matched = f.segment_count <= c.leg_max_segments
        && f.vertical_mass >= c.leg_vmass_floor
        && f.peripheral_entropy <= c.leg_entropy_ceiling;
    if !matched {
        return None;
    }

    let missing_segments = c.leg_max_segments.saturating_sub(f.segment_count) as f32;
    Some(
        c.base_confidence
            + (f.vertical_mass - c.leg_vmass_floor)
            + 0.5 * (c.leg_entropy_ceiling - f.peripheral_entropy)
            + 0.05 * missing_segments,
    )
}

/// 解剖部位分类器，纯函数，相同输入总是得到相同结果
#[derive(Debug, Clone, Copy)]
pub struct AnatomyClassifier<'a> {
    config: &'a ClassifierConfig,
}

impl<'a> AnatomyClassifier<'a> {
    pub fn new(config: &'a ClassifierConfig) -> Self {
        Self { config }
    }

    /// 根据特征判断部位
    pub fn classify(&self, features: &AnatomyFeatures) -> AnatomyEstimate {
        let mut best_rejected: f32 = 0.0;

        for (anatomy, rule) in anatomy_rules() {
            let Some(confidence) = rule(features, self.config) else {
                continue;
            };
            let confidence = confidence.clamp(0.0, self.config.confidence_cap);

            if confidence >= self.config.confidence_floor {
                info!("Anatomy classified as {} (confidence {:.2})", anatomy, confidence);
                return AnatomyEstimate::new(anatomy, confidence);
            }

            debug!(
                "{} branch matched below confidence floor ({:.2} < {:.2})",
                anatomy, confidence, self.config.confidence_floor
            );
            best_rejected = best_rejected.max(confidence);
        }

        info!("Anatomy could not be determined (best confidence {:.2})", best_rejected);
        AnatomyEstimate::unknown(best_rejected)
    }
}
