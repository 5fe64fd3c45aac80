//! # 诊断流水线模块
//!
//! 提供从影像到诊断报告的完整确定性流程：
//! - 解剖部位分类：根据区域统计量判断胸部/手部/腿部
//! - 病理评分：按部位计算异常分数并给出排序的发现列表
//! - 部位一致性检查：医生选择的部位与影像识别结果冲突时停止诊断
//! - 诊断规则引擎：按规则表生成诊断报告
//! - 扫描状态机与诊断服务：持久化报告并更新扫描状态

pub mod classifier;
pub mod mismatch;
pub mod pathology;
pub mod pipeline;
pub mod rules;
pub mod service;
pub mod state_machine;

#[cfg(test)]
mod fixtures;

// 重新导出主要类型
pub use classifier::{AnatomyClassifier, AnatomyFeatures};
pub use mismatch::{MismatchGate, MismatchVerdict};
pub use pathology::PathologyScorer;
pub use pipeline::{
    Analyzer, Assessment, Classification, Detection, DetectionSource, DiagnosisOutcome,
    MismatchOutcome,
};
pub use rules::RuleEngine;
pub use service::DiagnosisService;
pub use state_machine::{ScanEvent, ScanStateMachine};
