//! 诊断规则引擎
//!
//! (检查部位是否为四肢, 是否异常) 决定报告的结论、严重程度、置信度和模板文本。

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use xray_core::config::RuleConfig;
use xray_core::{Anatomy, BodyPart, DiagnosisRecord, Finding, Severity};

use crate::pathology::HEALTHY;

const POTENTIAL_FRACTURE: &str = "Potential Fracture";
const PULMONARY_INFECTION: &str = "Pulmonary Infection";
const NORMAL: &str = "Normal";

const ORTHOPEDIC_REVIEW: &str =
    "IMMEDIATE ORTHOPEDIC REVIEW: Suspected cortical interruption. Immobilize joint and consult surgeon.";
const RADIOLOGY_VERIFICATION: &str =
    "IMMEDIATE RADIOLOGY VERIFICATION: Findings suggest extensive pulmonary consolidation. Possible pneumonia.";
const ROUTINE_FOLLOW_UP: &str = "Routine follow-up prescribed.";

/// 诊断规则引擎
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    config: &'a RuleConfig,
}

impl<'a> RuleEngine<'a> {
    pub fn new(config: &'a RuleConfig) -> Self {
        Self { config }
    }

    /// 任一发现为 Moderate 或 Critical 即视为异常
    pub fn is_abnormal(findings: &[Finding]) -> bool {
        findings.iter().any(|f| f.severity.is_abnormal())
    }

    /// 生成诊断报告，`findings` 已按严重程度降序排列
    pub fn evaluate(
        &self,
        scan_id: Uuid,
        declared: BodyPart,
        detected: Anatomy,
        findings: &[Finding],
    ) -> DiagnosisRecord {
        let abnormal = Self::is_abnormal(findings);
        let top = findings.first();

        let (result_label, severity, recommendation, detail) = match (declared.is_extremity(), abnormal) {
            (true, true) => {
                let label = top
                    .filter(|f| f.severity.is_abnormal())
                    .map(|f| f.label.clone())
                    .unwrap_or_else(|| POTENTIAL_FRACTURE.to_string());
                let detail = format!(
                    "Findings suggest acute skeletal structural instability in the {} ({}).",
                    declared, label
                );
                (label, Severity::Critical, ORTHOPEDIC_REVIEW, detail)
            }
            (true, false) => {
                let label = top
                    .filter(|f| f.severity == Severity::Normal)
                    .map(|f| f.label.clone())
                    .unwrap_or_else(|| HEALTHY.to_string());
                let detail = format!(
                    "No visible fracture or joint displacement detected in the {}.",
                    declared
                );
                (label, Severity::Normal, ROUTINE_FOLLOW_UP, detail)
            }
            (false, true) => (
                PULMONARY_INFECTION.to_string(),
                Severity::Critical,
                RADIOLOGY_VERIFICATION,
                "Increased lung opacity suggests high-density fluid accumulation.".to_string(),
            ),
            (false, false) => (
                NORMAL.to_string(),
                Severity::Normal,
                ROUTINE_FOLLOW_UP,
                "Chest cavity appears clear with no significant focal opacities.".to_string(),
            ),
        };

        let confidence_percent = if abnormal {
            self.config.abnormal_confidence
        } else {
            self.config.normal_confidence
        };

        info!(
            "Diagnosis for scan {}: {} ({}, {}%)",
            scan_id, result_label, severity, confidence_percent
        );

        DiagnosisRecord {
            scan_id,
            result_label,
            severity,
            recommendation: recommendation.to_string(),
            doctor_comments: format!(
                "Visual Verification: {}. Clinical Context: {} focus. {}",
                detected, declared, detail
            ),
            confidence_percent,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathology::{BIG_FRACTURE, MILD_HAZINESS, PULMONARY_OPACITY};

    fn evaluate(declared: BodyPart, detected: Anatomy, findings: &[Finding]) -> DiagnosisRecord {
        let config = RuleConfig::default();
        RuleEngine::new(&config).evaluate(Uuid::new_v4(), declared, detected, findings)
    }

    #[test]
    fn test_abnormal_chest_is_pulmonary_infection() {
        let findings = [Finding::new(PULMONARY_OPACITY, 0.9, Severity::Critical, Anatomy::Chest)];
        let record = evaluate(BodyPart::Chest, Anatomy::Chest, &findings);

        assert_eq!(record.result_label, "Pulmonary Infection");
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(record.confidence_percent, 92);
        assert!(record.recommendation.starts_with("IMMEDIATE RADIOLOGY VERIFICATION"));
    }

    #[test]
    fn test_moderate_finding_counts_as_abnormal() {
        let findings = [Finding::new(MILD_HAZINESS, 0.65, Severity::Moderate, Anatomy::Chest)];
        let record = evaluate(BodyPart::Chest, Anatomy::Chest, &findings);
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(record.confidence_percent, 92);
    }

    #[test]
    fn test_normal_chest() {
        let findings = [Finding::new(HEALTHY, 0.99, Severity::Normal, Anatomy::Chest)];
        let record = evaluate(BodyPart::Chest, Anatomy::Chest, &findings);

        assert_eq!(record.result_label, "Normal");
        assert_eq!(record.severity, Severity::Normal);
        assert_eq!(record.confidence_percent, 98);
        assert_eq!(record.recommendation, "Routine follow-up prescribed.");
    }

    #[test]
    fn test_abnormal_limb_uses_top_finding() {
        let findings = [Finding::new(BIG_FRACTURE, 0.99, Severity::Critical, Anatomy::Hand)];
        let record = evaluate(BodyPart::Hand, Anatomy::Hand, &findings);

        assert_eq!(record.result_label, BIG_FRACTURE);
        assert_eq!(record.severity, Severity::Critical);
        assert_eq!(record.confidence_percent, 92);
        assert!(record.doctor_comments.starts_with("Visual Verification: Hand. Clinical Context: Hand focus."));
        assert!(record.doctor_comments.contains("(Big Fracture Detected)"));
    }

    #[test]
    fn test_limb_fallback_labels() {
        let record = evaluate(BodyPart::Leg, Anatomy::Leg, &[]);
        assert_eq!(record.result_label, HEALTHY);
        assert_eq!(record.confidence_percent, 98);

        let findings = [Finding::new("Image Interpretation Error", 0.5, Severity::Moderate, Anatomy::Unknown)];
        let record = evaluate(BodyPart::Leg, Anatomy::Unknown, &findings);
        assert_eq!(record.result_label, "Image Interpretation Error");
        assert_eq!(record.severity, Severity::Critical);
    }

    #[test]
    fn test_confidence_comes_from_config() {
        let config = RuleConfig {
            abnormal_confidence: 80,
            normal_confidence: 90,
        };
        let engine = RuleEngine::new(&config);
        let healthy = [Finding::new(HEALTHY, 0.99, Severity::Normal, Anatomy::Leg)];
        let record = engine.evaluate(Uuid::new_v4(), BodyPart::Leg, Anatomy::Leg, &healthy);
        assert_eq!(record.confidence_percent, 90);
    }
}
