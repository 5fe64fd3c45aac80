//! # XRay Diagnostic
//!
//! 确定性X光影像诊断流水线的统一入口，重新导出各子模块。

pub use xray_core;
pub use xray_diagnosis;
pub use xray_imaging;
pub use xray_storage;

pub use xray_core::{
    AnalysisConfig, BodyPart, DiagnosisRecord, Finding, Result, ScanRequest, ScanStatus, XrayError,
};
pub use xray_diagnosis::{Analyzer, DiagnosisOutcome, DiagnosisService};
