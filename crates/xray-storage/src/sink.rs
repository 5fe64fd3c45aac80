//! 报告持久化接口

use async_trait::async_trait;
use uuid::Uuid;
use xray_core::{DiagnosisRecord, Result, ScanStatus};

/// 诊断报告存储
///
/// 报告一经写入不可修改：同一扫描重复保存报告必须返回错误。
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// 保存诊断报告
    async fn save_report(&self, record: &DiagnosisRecord) -> Result<()>;

    /// 更新扫描状态
    async fn update_scan_status(&self, scan_id: Uuid, status: ScanStatus) -> Result<()>;

    /// 获取扫描对应的报告
    async fn get_report(&self, scan_id: Uuid) -> Result<Option<DiagnosisRecord>>;

    /// 获取扫描状态
    async fn get_scan_status(&self, scan_id: Uuid) -> Result<Option<ScanStatus>>;
}
