//! 分析配置管理
//!
//! 所有采样步长、阈值和置信度常量都集中在不可变的 [`AnalysisConfig`] 中，
//! 由调用方显式传入各个组件。支持从TOML文件和环境变量加载，并在加载后验证。

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::{Result, XrayError};

/// 图像上的相对矩形区域，坐标与尺寸均为宽高的比例
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RegionSpec {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl RegionSpec {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// 整幅图像
    pub const fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// 区域是否完全位于单位正方形内
    pub fn is_within_unit_square(&self) -> bool {
        let in_range = |v: f32| (0.0..=1.0).contains(&v);
        in_range(self.x)
            && in_range(self.y)
            && self.w >= 0.0
            && self.h >= 0.0
            && self.x + self.w <= 1.0 + f32::EPSILON
            && self.y + self.h <= 1.0 + f32::EPSILON
    }
}

/// 完整分析配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 区域采样配置
    pub sampler: SamplerConfig,
    /// 质量门限
    pub quality: QualityConfig,
    /// 命名采样区域
    pub regions: RegionLayout,
    /// 解剖部位分类阈值
    pub classifier: ClassifierConfig,
    /// 病理评分阈值
    pub pathology: PathologyConfig,
    /// 诊断规则常量
    pub rules: RuleConfig,
    /// 参考图像快捷匹配
    pub reference: ReferenceConfig,
}

/// 区域采样配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplerConfig {
    /// 密度采样步长（像素）
    pub density_stride: usize,
    /// 边缘复杂度采样步长
    pub edge_stride: usize,
    /// 比较点的右/下偏移
    pub edge_offset: usize,
    /// 亮度差噪声阈值 (0-255)
    pub edge_noise_threshold: u8,
    /// 边缘复杂度归一化系数
    pub edge_scale: f32,
    /// 熵采样步长
    pub entropy_stride: usize,
    /// 熵的邻点偏移
    pub entropy_offset: usize,
    /// 熵的亮度差阈值 (0-255)
    pub entropy_threshold: u8,
    /// 扫描线上"亮"像素的亮度阈值 (0-255)
    pub segment_threshold: u8,
    /// 最小有效段宽，占图像宽度的比例
    pub segment_min_width_ratio: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            density_stride: 20,
            edge_stride: 12,
            edge_offset: 4,
            edge_noise_threshold: 20,
            edge_scale: 100.0,
            entropy_stride: 8,
            entropy_offset: 4,
            entropy_threshold: 20,
            segment_threshold: 140,
            segment_min_width_ratio: 0.02,
        }
    }
}

/// 质量门限
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// 低于该整体密度判定为过暗
    pub dark_floor: f32,
    /// 高于该整体密度判定为过曝
    pub washed_out_ceiling: f32,
    /// 低于该边缘复杂度判定为对比度不足
    pub flatness_floor: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            dark_floor: 0.08,
            washed_out_ceiling: 0.92,
            flatness_floor: 0.02,
        }
    }
}

/// 各阶段使用的固定命名区域
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegionLayout {
    pub upper_left: RegionSpec,
    pub upper_right: RegionSpec,
    pub center: RegionSpec,
    pub vertical_strip: RegionSpec,
    /// 胸片下中部肺野
    pub lung_field: RegionSpec,
    /// 四肢骨骼区域
    pub limb_field: RegionSpec,
    /// 段计数扫描线的相对高度
    pub scan_line_y: f32,
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self {
            upper_left: RegionSpec::new(0.05, 0.05, 0.15, 0.15),
            upper_right: RegionSpec::new(0.80, 0.05, 0.15, 0.15),
            center: RegionSpec::new(0.30, 0.30, 0.40, 0.40),
            vertical_strip: RegionSpec::new(0.40, 0.0, 0.20, 1.0),
            lung_field: RegionSpec::new(0.25, 0.35, 0.50, 0.50),
            limb_field: RegionSpec::new(0.20, 0.10, 0.60, 0.80),
            scan_line_y: 0.30,
        }
    }
}

/// 解剖部位分类阈值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 宽高比高于此值视为横向
    pub landscape_ratio: f32,
    /// 胸片上角组织密度下限
    pub chest_corner_density: f32,
    /// 胸片周边熵上限
    pub chest_entropy_ceiling: f32,
    /// 手部：段数高阈值
    pub hand_segments_high: usize,
    /// 手部：段数中阈值（需配合较高的周边熵）
    pub hand_segments_moderate: usize,
    /// 手部：周边熵升高阈值
    pub hand_entropy_elevated: f32,
    /// 腿部：最大段数
    pub leg_max_segments: usize,
    /// 腿部：竖直条带密度下限
    pub leg_vmass_floor: f32,
    /// 腿部：周边熵上限
    pub leg_entropy_ceiling: f32,
    /// 分支基础置信度
    pub base_confidence: f32,
    /// 低于该置信度一律判为 Unknown
    pub confidence_floor: f32,
    /// 置信度上限
    pub confidence_cap: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            landscape_ratio: 1.05,
            chest_corner_density: 0.55,
            chest_entropy_ceiling: 0.35,
            hand_segments_high: 4,
            hand_segments_moderate: 3,
            hand_entropy_elevated: 0.25,
            leg_max_segments: 2,
            leg_vmass_floor: 0.45,
            leg_entropy_ceiling: 0.25,
            base_confidence: 0.40,
            confidence_floor: 0.50,
            confidence_cap: 0.95,
        }
    }
}

/// 原始评分到概率的线性映射：`min(score + offset, ceiling)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbabilityBand {
    pub offset: f32,
    pub ceiling: f32,
}

impl ProbabilityBand {
    pub const fn new(offset: f32, ceiling: f32) -> Self {
        Self { offset, ceiling }
    }

    pub fn apply(&self, score: f32) -> f32 {
        (score + self.offset).min(self.ceiling).clamp(0.0, 1.0)
    }
}

impl Default for ProbabilityBand {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// 病理评分阈值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathologyConfig {
    pub chest_moderate: f32,
    pub chest_critical: f32,
    pub limb_moderate: f32,
    pub limb_critical: f32,
    /// 手部边缘敏感系数
    pub hand_sensitivity: f32,
    /// 腿部边缘敏感系数（皮质骨更致密）
    pub leg_sensitivity: f32,
    pub opacity_band: ProbabilityBand,
    pub haziness_band: ProbabilityBand,
    pub fracture_band: ProbabilityBand,
    pub crack_band: ProbabilityBand,
    pub healthy_probability: f32,
    pub unknown_probability: f32,
    pub interpretation_error_probability: f32,
}

impl Default for PathologyConfig {
    fn default() -> Self {
        Self {
            chest_moderate: 0.60,
            chest_critical: 0.75,
            limb_moderate: 0.08,
            limb_critical: 0.25,
            hand_sensitivity: 1.0,
            leg_sensitivity: 1.25,
            opacity_band: ProbabilityBand::new(0.0, 0.99),
            haziness_band: ProbabilityBand::new(0.0, 0.90),
            fracture_band: ProbabilityBand::new(0.60, 0.99),
            crack_band: ProbabilityBand::new(0.65, 0.88),
            healthy_probability: 0.99,
            unknown_probability: 0.30,
            interpretation_error_probability: 0.50,
        }
    }
}

/// 诊断规则常量
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleConfig {
    /// 异常时报告的置信度（百分比）
    pub abnormal_confidence: u8,
    /// 正常时报告的置信度（百分比）
    pub normal_confidence: u8,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            abnormal_confidence: 92,
            normal_confidence: 98,
        }
    }
}

/// 参考图像快捷匹配配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReferenceConfig {
    pub enabled: bool,
    /// 参考图像目录；未设置时使用 `<影像目录>/../reference_images`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// 文件大小允许的误差（字节）
    pub size_tolerance_bytes: u64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            size_tolerance_bytes: 500,
        }
    }
}

impl AnalysisConfig {
    /// 加载配置：可选的TOML文件，再叠加 `XRAY_` 前缀的环境变量
    ///
    /// 环境变量使用 `__` 分隔层级，例如 `XRAY_RULES__ABNORMAL_CONFIDENCE=90`。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // 默认值作为最底层来源，文件和环境变量只覆盖给出的键
        let defaults = Config::try_from(&AnalysisConfig::default())
            .map_err(|e| XrayError::Config(format!("无法生成默认配置: {}", e)))?;
        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("XRAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| XrayError::Config(format!("无法读取配置: {}", e)))?;

        let config: AnalysisConfig = settings
            .try_deserialize()
            .map_err(|e| XrayError::Config(format!("配置格式无效: {}", e)))?;

        ConfigValidator::new().validate(&config)?;

        match path {
            Some(path) => info!("Analysis configuration loaded from {}", path.display()),
            None => info!("Analysis configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 以TOML格式输出配置
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| XrayError::Config(format!("配置序列化失败: {}", e)))
    }
}

/// 配置验证规则
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&AnalysisConfig) -> bool,
    error_message: &'static str,
}

/// 配置验证器
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "sampler",
                validator: |c| {
                    c.sampler.density_stride > 0
                        && c.sampler.edge_stride > 0
                        && c.sampler.entropy_stride > 0
                        && c.sampler.edge_offset > 0
                        && c.sampler.entropy_offset > 0
                },
                error_message: "采样步长和偏移必须大于0",
            },
            ValidationRule {
                field_path: "sampler.edge_scale",
                validator: |c| c.sampler.edge_scale > 0.0,
                error_message: "边缘归一化系数必须为正数",
            },
            ValidationRule {
                field_path: "quality",
                validator: |c| c.quality.dark_floor < c.quality.washed_out_ceiling,
                error_message: "过暗阈值必须小于过曝阈值",
            },
            ValidationRule {
                field_path: "regions",
                validator: |c| {
                    let r = &c.regions;
                    [
                        r.upper_left,
                        r.upper_right,
                        r.center,
                        r.vertical_strip,
                        r.lung_field,
                        r.limb_field,
                    ]
                    .iter()
                    .all(RegionSpec::is_within_unit_square)
                        && (0.0..=1.0).contains(&r.scan_line_y)
                },
                error_message: "采样区域必须位于图像范围内",
            },
            ValidationRule {
                field_path: "classifier.confidence_floor",
                validator: |c| {
                    (0.0..=1.0).contains(&c.classifier.confidence_floor)
                        && c.classifier.confidence_floor <= c.classifier.confidence_cap
                        && c.classifier.confidence_cap <= 1.0
                },
                error_message: "置信度下限必须在[0,1]内且不高于上限",
            },
            ValidationRule {
                field_path: "classifier.hand_segments_moderate",
                validator: |c| c.classifier.hand_segments_moderate <= c.classifier.hand_segments_high,
                error_message: "手部中段数阈值不能高于高阈值",
            },
            ValidationRule {
                field_path: "pathology",
                validator: |c| {
                    c.pathology.chest_moderate < c.pathology.chest_critical
                        && c.pathology.limb_moderate < c.pathology.limb_critical
                },
                error_message: "病理阈值必须满足 moderate < critical",
            },
            ValidationRule {
                field_path: "rules",
                validator: |c| c.rules.abnormal_confidence <= 100 && c.rules.normal_confidence <= 100,
                error_message: "诊断置信度不能超过100",
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &AnalysisConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if !(rule.validator)(config) {
                error!("Configuration validation failed for {}", rule.field_path);
                return Err(XrayError::Config(format!(
                    "{}: {}",
                    rule.field_path, rule.error_message
                )));
            }
        }

        Ok(())
    }
}
