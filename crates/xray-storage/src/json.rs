//! JSON文件报告存储
//!
//! 每个扫描对应一个报告文件 `<scan_id>.report.json` 和一个状态文件 `<scan_id>.status.json`。

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use xray_core::{DiagnosisRecord, Result, ScanStatus, XrayError};

use crate::sink::ReportSink;

/// JSON文件报告存储
pub struct JsonReportStore {
    base_path: PathBuf,
}

impl JsonReportStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn report_path(&self, scan_id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.report.json", scan_id))
    }

    fn status_path(&self, scan_id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.status.json", scan_id))
    }

    async fn read_json<T>(path: &Path) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        if !tokio::fs::try_exists(path).await? {
            return Ok(None);
        }
        let data = tokio::fs::read(path).await?;
        Ok(Some(serde_json::from_slice(&data)?))
    }
}

#[async_trait]
impl ReportSink for JsonReportStore {
    async fn save_report(&self, record: &DiagnosisRecord) -> Result<()> {
        let path = self.report_path(record.scan_id);
        tokio::fs::create_dir_all(&self.base_path).await?;
        let data = serde_json::to_vec_pretty(record)?;

        // create_new 保证检查与创建是原子操作
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(XrayError::Storage(format!(
                    "扫描 {} 的报告已存在，报告不可覆盖",
                    record.scan_id
                )));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::info!("Report for scan {} written to {}", record.scan_id, path.display());
        Ok(())
    }

    async fn update_scan_status(&self, scan_id: Uuid, status: ScanStatus) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        let data = serde_json::to_vec(&status)?;
        tokio::fs::write(self.status_path(scan_id), data).await?;

        tracing::info!("Scan {} status set to {:?}", scan_id, status);
        Ok(())
    }

    async fn get_report(&self, scan_id: Uuid) -> Result<Option<DiagnosisRecord>> {
        Self::read_json(&self.report_path(scan_id)).await
    }

    async fn get_scan_status(&self, scan_id: Uuid) -> Result<Option<ScanStatus>> {
        Self::read_json(&self.status_path(scan_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xray_core::Severity;

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonReportStore::new(dir.path().join("reports"));
        let scan_id = Uuid::new_v4();

        let record = DiagnosisRecord {
            scan_id,
            result_label: "Pulmonary Infection".to_string(),
            severity: Severity::Critical,
            recommendation: "IMMEDIATE RADIOLOGY VERIFICATION".to_string(),
            doctor_comments: "Visual Verification: Chest.".to_string(),
            confidence_percent: 92,
            generated_at: chrono::Utc::now(),
        };

        assert!(store.get_report(scan_id).await.unwrap().is_none());
        store.save_report(&record).await.unwrap();
        store.update_scan_status(scan_id, ScanStatus::Completed).await.unwrap();

        assert_eq!(store.get_report(scan_id).await.unwrap(), Some(record.clone()));
        assert_eq!(store.get_scan_status(scan_id).await.unwrap(), Some(ScanStatus::Completed));
        assert!(store.save_report(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_saves_keep_first_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonReportStore::new(dir.path()));
        let scan_id = Uuid::new_v4();

        let make = |label: &str| DiagnosisRecord {
            scan_id,
            result_label: label.to_string(),
            severity: Severity::Normal,
            recommendation: "Routine follow-up prescribed.".to_string(),
            doctor_comments: String::new(),
            confidence_percent: 98,
            generated_at: chrono::Utc::now(),
        };

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let record = make(&format!("writer-{}", i));
                tokio::spawn(async move { store.save_report(&record).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(e) => assert!(matches!(e, XrayError::Storage(_))),
            }
        }
        assert_eq!(succeeded, 1);
        assert!(store.get_report(scan_id).await.unwrap().is_some());
    }
}
