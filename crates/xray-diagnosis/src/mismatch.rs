//! 部位一致性检查
//!
//! 医生选择的检查部位与影像识别部位冲突时停止诊断，不生成报告。

use serde::Serialize;
use tracing::{info, warn};
use xray_core::{Anatomy, BodyPart};

/// 一致性判定结果，每次请求计算一次，不持久化
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MismatchVerdict {
    pub is_mismatch: bool,
    pub declared: BodyPart,
    pub detected: Anatomy,
}

/// 部位一致性门限
///
/// 策略严格：手/腿影像识别为胸部时同样判定冲突，不做竖幅豁免。
#[derive(Debug, Clone, Copy, Default)]
pub struct MismatchGate;

impl MismatchGate {
    pub fn new() -> Self {
        Self
    }

    /// `trusted` 表示识别结果来自参考图像库
    pub fn check(&self, declared: BodyPart, detected: Anatomy, trusted: bool) -> MismatchVerdict {
        let is_mismatch = match (declared, detected) {
            (_, Anatomy::Unknown) => !trusted,
            (BodyPart::Chest, Anatomy::Hand | Anatomy::Leg) => true,
            (BodyPart::Hand | BodyPart::Leg, Anatomy::Chest) => true,
            (BodyPart::Hand, Anatomy::Leg) | (BodyPart::Leg, Anatomy::Hand) => true,
            _ => false,
        };

        if is_mismatch {
            warn!("部位不一致: 选择 {}，影像识别为 {}", declared, detected);
        } else {
            info!("部位一致性检查通过: {} / {}", declared, detected);
        }

        MismatchVerdict {
            is_mismatch,
            declared,
            detected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(declared: BodyPart, detected: Anatomy) -> bool {
        MismatchGate::new().check(declared, detected, false).is_mismatch
    }

    #[test]
    fn test_matching_parts_pass() {
        assert!(!check(BodyPart::Chest, Anatomy::Chest));
        assert!(!check(BodyPart::Hand, Anatomy::Hand));
        assert!(!check(BodyPart::Leg, Anatomy::Leg));
    }

    #[test]
    fn test_chest_versus_extremity_mismatch() {
        assert!(check(BodyPart::Chest, Anatomy::Hand));
        assert!(check(BodyPart::Chest, Anatomy::Leg));
        assert!(check(BodyPart::Hand, Anatomy::Chest));
        assert!(check(BodyPart::Leg, Anatomy::Chest));
    }

    #[test]
    fn test_hand_leg_cross_declaration_mismatch() {
        assert!(check(BodyPart::Hand, Anatomy::Leg));
        assert!(check(BodyPart::Leg, Anatomy::Hand));
    }

    #[test]
    fn test_unknown_only_passes_when_trusted() {
        let gate = MismatchGate::new();
        for declared in [BodyPart::Chest, BodyPart::Hand, BodyPart::Leg] {
            assert!(gate.check(declared, Anatomy::Unknown, false).is_mismatch);
            assert!(!gate.check(declared, Anatomy::Unknown, true).is_mismatch);
        }
    }

    #[test]
    fn test_verdict_carries_both_labels() {
        let verdict = MismatchGate::new().check(BodyPart::Leg, Anatomy::Hand, false);
        assert_eq!(verdict.declared, BodyPart::Leg);
        assert_eq!(verdict.detected, Anatomy::Hand);
    }
}
