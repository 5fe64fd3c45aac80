//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::XrayError;

/// 影像识别出的解剖部位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Anatomy {
    Chest,   // 胸部
    Hand,    // 手部
    Leg,     // 腿部
    Unknown, // 无法识别
}

impl Anatomy {
    /// 是否为四肢部位
    pub fn is_extremity(&self) -> bool {
        matches!(self, Anatomy::Hand | Anatomy::Leg)
    }
}

impl fmt::Display for Anatomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anatomy::Chest => write!(f, "Chest"),
            Anatomy::Hand => write!(f, "Hand"),
            Anatomy::Leg => write!(f, "Leg"),
            Anatomy::Unknown => write!(f, "Unknown"),
        }
    }
}

/// 医生上传时选择的检查部位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Chest,
    Hand,
    Leg,
}

impl BodyPart {
    pub fn is_extremity(&self) -> bool {
        matches!(self, BodyPart::Hand | BodyPart::Leg)
    }
}

impl From<BodyPart> for Anatomy {
    fn from(part: BodyPart) -> Self {
        match part {
            BodyPart::Chest => Anatomy::Chest,
            BodyPart::Hand => Anatomy::Hand,
            BodyPart::Leg => Anatomy::Leg,
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Anatomy::from(*self).fmt(f)
    }
}

impl FromStr for BodyPart {
    type Err = XrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chest" => Ok(BodyPart::Chest),
            "hand" => Ok(BodyPart::Hand),
            "leg" => Ok(BodyPart::Leg),
            other => Err(XrayError::Validation(format!(
                "未知检查部位: {}，应为 Chest/Hand/Leg",
                other
            ))),
        }
    }
}

/// 严重程度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Normal,   // 正常
    Moderate, // 异常
    Critical, // 危重
}

impl Severity {
    /// Moderate 和 Critical 都视为异常
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Severity::Normal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Normal => write!(f, "Normal"),
            Severity::Moderate => write!(f, "Moderate"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

/// 解剖部位估计
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnatomyEstimate {
    pub label: Anatomy,
    pub confidence: f32, // [0, 1]
}

impl AnatomyEstimate {
    pub fn new(label: Anatomy, confidence: f32) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn unknown(confidence: f32) -> Self {
        Self::new(Anatomy::Unknown, confidence)
    }
}

/// 单条影像发现
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub label: String,
    pub probability: f32, // [0, 1]
    pub severity: Severity,
    pub anatomy: Anatomy,
}

impl Finding {
    pub fn new(label: impl Into<String>, probability: f32, severity: Severity, anatomy: Anatomy) -> Self {
        Self {
            label: label.into(),
            probability: probability.clamp(0.0, 1.0),
            severity,
            anatomy,
        }
    }
}

/// 诊断报告记录，写入后不可修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisRecord {
    pub scan_id: Uuid,
    pub result_label: String,
    pub severity: Severity,
    pub recommendation: String,
    pub doctor_comments: String,
    pub confidence_percent: u8,
    pub generated_at: DateTime<Utc>,
}

/// 扫描状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScanStatus {
    Pending,          // 待分析
    Completed,        // 已完成
    ReuploadRequired, // 需要重新上传
}

/// 一次分析请求：已上传的影像及医生选择的部位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub scan_id: Uuid,
    pub image_path: PathBuf,
    pub declared_body_part: BodyPart,
    pub uploaded_at: DateTime<Utc>,
}

impl ScanRequest {
    pub fn new(image_path: impl Into<PathBuf>, declared_body_part: BodyPart) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            image_path: image_path.into(),
            declared_body_part,
            uploaded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_part_parsing() {
        assert_eq!("Chest".parse::<BodyPart>().unwrap(), BodyPart::Chest);
        assert_eq!(" hand ".parse::<BodyPart>().unwrap(), BodyPart::Hand);
        assert_eq!("LEG".parse::<BodyPart>().unwrap(), BodyPart::Leg);
        assert!("skull".parse::<BodyPart>().is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Normal);
        assert!(Severity::Moderate.is_abnormal());
        assert!(!Severity::Normal.is_abnormal());
    }

    #[test]
    fn test_finding_probability_is_clamped() {
        let finding = Finding::new("Test", 1.4, Severity::Normal, Anatomy::Hand);
        assert_eq!(finding.probability, 1.0);

        let estimate = AnatomyEstimate::new(Anatomy::Leg, -0.2);
        assert_eq!(estimate.confidence, 0.0);
    }
}
