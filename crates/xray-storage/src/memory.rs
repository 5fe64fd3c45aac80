//! 内存报告存储

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use xray_core::{DiagnosisRecord, Result, ScanStatus, XrayError};

use crate::sink::ReportSink;

/// 基于内存的报告存储，主要用于测试和演示
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<Uuid, DiagnosisRecord>>,
    statuses: RwLock<HashMap<Uuid, ScanStatus>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的报告数量
    pub async fn report_count(&self) -> usize {
        self.reports.read().await.len()
    }
}

#[async_trait]
impl ReportSink for InMemoryReportStore {
    async fn save_report(&self, record: &DiagnosisRecord) -> Result<()> {
        let mut reports = self.reports.write().await;
        if reports.contains_key(&record.scan_id) {
            return Err(XrayError::Storage(format!(
                "扫描 {} 的报告已存在，报告不可覆盖",
                record.scan_id
            )));
        }

        reports.insert(record.scan_id, record.clone());
        tracing::info!("Report stored for scan {}", record.scan_id);
        Ok(())
    }

    async fn update_scan_status(&self, scan_id: Uuid, status: ScanStatus) -> Result<()> {
        tracing::info!("Scan {} status set to {:?}", scan_id, status);
        self.statuses.write().await.insert(scan_id, status);
        Ok(())
    }

    async fn get_report(&self, scan_id: Uuid) -> Result<Option<DiagnosisRecord>> {
        Ok(self.reports.read().await.get(&scan_id).cloned())
    }

    async fn get_scan_status(&self, scan_id: Uuid) -> Result<Option<ScanStatus>> {
        Ok(self.statuses.read().await.get(&scan_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xray_core::Severity;

    fn record(scan_id: Uuid) -> DiagnosisRecord {
        DiagnosisRecord {
            scan_id,
            result_label: "Normal".to_string(),
            severity: Severity::Normal,
            recommendation: "Routine follow-up prescribed.".to_string(),
            doctor_comments: String::new(),
            confidence_percent: 98,
            generated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_fetch_report() {
        let store = InMemoryReportStore::new();
        let scan_id = Uuid::new_v4();

        store.save_report(&record(scan_id)).await.unwrap();
        store.update_scan_status(scan_id, ScanStatus::Completed).await.unwrap();

        let saved = store.get_report(scan_id).await.unwrap().unwrap();
        assert_eq!(saved.confidence_percent, 98);
        assert_eq!(store.get_scan_status(scan_id).await.unwrap(), Some(ScanStatus::Completed));
        assert_eq!(store.report_count().await, 1);
    }

    #[tokio::test]
    async fn test_reports_are_immutable() {
        let store = InMemoryReportStore::new();
        let scan_id = Uuid::new_v4();

        store.save_report(&record(scan_id)).await.unwrap();
        let err = store.save_report(&record(scan_id)).await.unwrap_err();
        assert!(matches!(err, XrayError::Storage(_)));
    }
}
