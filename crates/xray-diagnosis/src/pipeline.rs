//! 诊断流水线
//!
//! 质量门限 → 区域采样 → 部位分类 → 病理评分 → 部位一致性检查 → 规则引擎。
//! 每次调用只处理一幅影像，不持有可变状态。

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;
use xray_core::{AnalysisConfig, Anatomy, AnatomyEstimate, BodyPart, DiagnosisRecord, Finding};
use xray_imaging::{
    ImageDecoder, QualityGate, QualityRejection, QualityVerdict, RasterImage, ReferenceMatcher,
    ReferenceSource, RegionSampler,
};

use crate::classifier::{AnatomyClassifier, AnatomyFeatures};
use crate::mismatch::{MismatchGate, MismatchVerdict};
use crate::pathology::PathologyScorer;
use crate::rules::RuleEngine;

/// 部位识别结果的来源
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// 启发式分析
    Heuristic,
    /// 参考图像库命中，结果可信
    Reference,
    /// 影像无法解码
    DecodeFailure,
}

/// 部位识别与发现列表
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Detection {
    pub anatomy: Anatomy,
    pub findings: Vec<Finding>,
    pub source: DetectionSource,
}

impl Detection {
    pub fn is_trusted(&self) -> bool {
        self.source == DetectionSource::Reference
    }
}

/// 通过质量门限后的分类结果
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Classification {
    pub features: AnatomyFeatures,
    pub anatomy: AnatomyEstimate,
    pub findings: Vec<Finding>,
}

/// 单幅影像的评估结果
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    Rejected(QualityRejection),
    Classified(Classification),
}

/// 部位冲突时的结果：不生成报告，要求重新上传
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MismatchOutcome {
    pub verdict: MismatchVerdict,
    /// 识别结果来源；`DecodeFailure` 表示影像无法读取而非部位不符
    pub source: DetectionSource,
    pub findings: Vec<Finding>,
    pub instruction: String,
    pub safety_note: String,
}

/// 一次诊断请求的最终结果
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DiagnosisOutcome {
    Diagnosed {
        record: DiagnosisRecord,
        findings: Vec<Finding>,
    },
    Mismatch(MismatchOutcome),
    Rejected(QualityRejection),
}

impl DiagnosisOutcome {
    pub fn record(&self) -> Option<&DiagnosisRecord> {
        match self {
            DiagnosisOutcome::Diagnosed { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn is_diagnosed(&self) -> bool {
        self.record().is_some()
    }
}

/// 诊断流水线
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn sampler(&self) -> RegionSampler<'_> {
        RegionSampler::new(&self.config.sampler)
    }

    /// 质量门限 + 部位分类 + 病理评分
    pub fn assess(&self, image: &RasterImage) -> Assessment {
        let gate = QualityGate::new(&self.config.sampler, &self.config.quality);
        if let QualityVerdict::Reject(rejection) = gate.evaluate(image) {
            return Assessment::Rejected(rejection);
        }

        let sampler = self.sampler();
        let features = AnatomyFeatures::extract(image, &self.config.regions, &sampler);
        let anatomy = AnatomyClassifier::new(&self.config.classifier).classify(&features);
        let findings = PathologyScorer::new(sampler, &self.config.regions, &self.config.pathology)
            .score(image, anatomy.label);

        Assessment::Classified(Classification {
            features,
            anatomy,
            findings,
        })
    }

    /// 返回排序后的发现列表；通过质量门限的影像结果从不为空
    pub fn classify(&self, image: &RasterImage) -> std::result::Result<Vec<Finding>, QualityRejection> {
        match self.assess(image) {
            Assessment::Rejected(rejection) => Err(rejection),
            Assessment::Classified(classification) => Ok(classification.findings),
        }
    }

    /// 对已解码影像执行完整诊断
    pub fn diagnose(&self, image: &RasterImage, declared: BodyPart, scan_id: Uuid) -> DiagnosisOutcome {
        match self.assess(image) {
            Assessment::Rejected(rejection) => {
                info!("Scan {} rejected by quality gate: {}", scan_id, rejection.reason);
                DiagnosisOutcome::Rejected(rejection)
            }
            Assessment::Classified(classification) => {
                let detection = Detection {
                    anatomy: classification.anatomy.label,
                    findings: classification.findings,
                    source: DetectionSource::Heuristic,
                };
                self.conclude(detection, declared, scan_id)
            }
        }
    }

    /// 从影像文件诊断：解码失败转为占位发现，参考图像命中时跳过启发式分析
    pub fn diagnose_file(
        &self,
        path: &Path,
        declared: BodyPart,
        scan_id: Uuid,
        decoder: &dyn ImageDecoder,
        references: &dyn ReferenceSource,
    ) -> DiagnosisOutcome {
        let image = match decoder.decode_file(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Scan {} could not be decoded: {}", scan_id, e);
                let detection = Detection {
                    anatomy: Anatomy::Unknown,
                    findings: vec![PathologyScorer::interpretation_error(&self.config.pathology)],
                    source: DetectionSource::DecodeFailure,
                };
                return self.conclude(detection, declared, scan_id);
            }
        };

        if let Some(detection) = self.reference_detection(path, &image, references) {
            return self.conclude(detection, declared, scan_id);
        }

        self.diagnose(&image, declared, scan_id)
    }

    fn reference_detection(
        &self,
        path: &Path,
        image: &RasterImage,
        references: &dyn ReferenceSource,
    ) -> Option<Detection> {
        let input_size = fs::metadata(path).ok()?.len();
        let matched = ReferenceMatcher::new(&self.config.reference).find_match(
            input_size,
            (image.width(), image.height()),
            references,
        )?;

        info!("Reference image {} used for {:?}", matched.file_name, path);
        Some(Detection {
            anatomy: matched.anatomy,
            findings: matched.findings,
            source: DetectionSource::Reference,
        })
    }

    /// 部位一致性检查后交给规则引擎
    fn conclude(&self, detection: Detection, declared: BodyPart, scan_id: Uuid) -> DiagnosisOutcome {
        let verdict = MismatchGate::new().check(declared, detection.anatomy, detection.is_trusted());

        if verdict.is_mismatch {
            let (instruction, safety_note) = match detection.source {
                DetectionSource::DecodeFailure => (
                    "RE-UPLOAD SCAN: The uploaded file could not be interpreted as an image. Please upload a valid radiograph.".to_string(),
                    format!(
                        "SAFETY ALERT: Unreadable image. Refused to apply {} rules without pixel data.",
                        verdict.declared
                    ),
                ),
                DetectionSource::Heuristic | DetectionSource::Reference => (
                    format!(
                        "RE-UPLOAD SCAN: The uploaded image visual profile (likely {}) does not match the selected focus ({}). Analysis halted for safety.",
                        verdict.detected, verdict.declared
                    ),
                    format!(
                        "SAFETY ALERT: Visual profile mismatch. Refused to apply {} rules to a scan appearing as {}.",
                        verdict.declared, verdict.detected
                    ),
                ),
            };

            return DiagnosisOutcome::Mismatch(MismatchOutcome {
                verdict,
                source: detection.source,
                findings: detection.findings,
                instruction,
                safety_note,
            });
        }

        let record = RuleEngine::new(&self.config.rules).evaluate(
            scan_id,
            declared,
            detection.anatomy,
            &detection.findings,
        );
        DiagnosisOutcome::Diagnosed {
            record,
            findings: detection.findings,
        }
    }
}
