//! 扫描状态机
//!
//! 管理上传扫描从待分析到完成/重新上传的状态转换

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use xray_core::{Result, ScanStatus, XrayError};

use crate::pipeline::DiagnosisOutcome;

/// 扫描状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScanEvent {
    DiagnosisRecorded, // 报告已保存
    ReuploadRequested, // 质量不合格或部位冲突
    ImageReplaced,     // 已重新上传影像
}

impl ScanEvent {
    /// 流水线结果对应的事件
    pub fn for_outcome(outcome: &DiagnosisOutcome) -> Self {
        if outcome.is_diagnosed() {
            ScanEvent::DiagnosisRecorded
        } else {
            ScanEvent::ReuploadRequested
        }
    }
}

/// 扫描状态机
#[derive(Debug)]
pub struct ScanStateMachine {
    transitions: HashMap<(ScanStatus, ScanEvent), ScanStatus>,
}

impl ScanStateMachine {
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((ScanStatus::Pending, ScanEvent::DiagnosisRecorded), ScanStatus::Completed);
        transitions.insert((ScanStatus::Pending, ScanEvent::ReuploadRequested), ScanStatus::ReuploadRequired);
        transitions.insert((ScanStatus::ReuploadRequired, ScanEvent::ImageReplaced), ScanStatus::Pending);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: &ScanStatus, event: ScanEvent) -> bool {
        self.transitions.contains_key(&(from.clone(), event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: &ScanStatus, event: ScanEvent) -> Result<ScanStatus> {
        match self.transitions.get(&(from.clone(), event)) {
            Some(to) => Ok(to.clone()),
            None => Err(XrayError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current: &ScanStatus) -> Vec<ScanEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| state == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for ScanStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
