//! 诊断服务
//!
//! 协调流水线、状态机和报告存储：影像解码与分析在阻塞线程池执行，
//! 诊断成功时保存报告并标记扫描完成，否则标记需要重新上传。

use std::sync::Arc;
use tracing::{info, warn};
use xray_core::{Result, ScanRequest, ScanStatus, XrayError};
use xray_imaging::{default_reference_dir, DirectoryReferenceSource, ImageDecoder, StandardDecoder};
use xray_storage::ReportSink;

use crate::pipeline::{Analyzer, DiagnosisOutcome};
use crate::state_machine::{ScanEvent, ScanStateMachine};

/// 诊断服务
pub struct DiagnosisService<S: ReportSink> {
    analyzer: Arc<Analyzer>,
    decoder: Arc<dyn ImageDecoder>,
    sink: S,
    state_machine: ScanStateMachine,
}

impl<S: ReportSink> DiagnosisService<S> {
    /// 使用默认解码器创建服务
    pub fn new(analyzer: Analyzer, sink: S) -> Self {
        Self::with_decoder(analyzer, Arc::new(StandardDecoder::new()), sink)
    }

    pub fn with_decoder(analyzer: Analyzer, decoder: Arc<dyn ImageDecoder>, sink: S) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            decoder,
            sink,
            state_machine: ScanStateMachine::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 分析一次上传的扫描
    pub async fn analyze_scan(&self, request: &ScanRequest) -> Result<DiagnosisOutcome> {
        info!(
            "开始分析扫描 {} ({:?}, 选择部位 {})",
            request.scan_id, request.image_path, request.declared_body_part
        );

        let status = self.current_status(request).await?;
        if !self.state_machine.can_transition(&status, ScanEvent::DiagnosisRecorded) {
            return Err(XrayError::InvalidStateTransition {
                from: format!("{:?}", status),
                event: format!("{:?}", ScanEvent::DiagnosisRecorded),
            });
        }

        let reference_dir = self
            .analyzer
            .config()
            .reference
            .directory
            .clone()
            .unwrap_or_else(|| default_reference_dir(&request.image_path));

        let analyzer = Arc::clone(&self.analyzer);
        let decoder = Arc::clone(&self.decoder);
        let path = request.image_path.clone();
        let declared = request.declared_body_part;
        let scan_id = request.scan_id;

        let outcome = tokio::task::spawn_blocking(move || {
            let references = DirectoryReferenceSource::new(reference_dir);
            analyzer.diagnose_file(&path, declared, scan_id, decoder.as_ref(), &references)
        })
        .await
        .map_err(|e| XrayError::Internal(format!("分析任务异常终止: {}", e)))?;

        let event = ScanEvent::for_outcome(&outcome);
        let next = self.state_machine.transition(&status, event)?;

        if let Some(record) = outcome.record() {
            self.sink.save_report(record).await?;
        } else {
            warn!("扫描 {} 未生成报告，需要重新上传", request.scan_id);
        }
        self.sink.update_scan_status(request.scan_id, next.clone()).await?;

        info!("扫描 {} 分析结束，状态 {:?}", request.scan_id, next);
        Ok(outcome)
    }

    /// 当前状态；重新上传的扫描先回到待分析
    async fn current_status(&self, request: &ScanRequest) -> Result<ScanStatus> {
        match self.sink.get_scan_status(request.scan_id).await? {
            None => Ok(ScanStatus::Pending),
            Some(ScanStatus::ReuploadRequired) => {
                let status = self
                    .state_machine
                    .transition(&ScanStatus::ReuploadRequired, ScanEvent::ImageReplaced)?;
                self.sink.update_scan_status(request.scan_id, status.clone()).await?;
                Ok(status)
            }
            Some(status) => Ok(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use xray_core::{AnalysisConfig, BodyPart, Severity};
    use xray_storage::{InMemoryReportStore, JsonReportStore};

    fn service() -> DiagnosisService<InMemoryReportStore> {
        DiagnosisService::new(Analyzer::new(AnalysisConfig::default()), InMemoryReportStore::new())
    }

    #[tokio::test]
    async fn test_diagnosed_scan_is_completed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chest.png");
        fixtures::opaque_chest().write_png(&path);

        let service = service();
        let request = ScanRequest::new(&path, BodyPart::Chest);
        let outcome = service.analyze_scan(&request).await.unwrap();

        let record = outcome.record().unwrap();
        assert_eq!(record.severity, Severity::Critical);

        let stored = service.sink().get_report(request.scan_id).await.unwrap().unwrap();
        assert_eq!(&stored, record);
        assert_eq!(
            service.sink().get_scan_status(request.scan_id).await.unwrap(),
            Some(ScanStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_mismatch_requires_reupload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hand.png");
        fixtures::healthy_hand().write_png(&path);

        let service = service();
        let request = ScanRequest::new(&path, BodyPart::Leg);
        let outcome = service.analyze_scan(&request).await.unwrap();

        assert!(matches!(outcome, DiagnosisOutcome::Mismatch(_)));
        assert_eq!(service.sink().report_count().await, 0);
        assert_eq!(
            service.sink().get_scan_status(request.scan_id).await.unwrap(),
            Some(ScanStatus::ReuploadRequired)
        );
    }

    #[tokio::test]
    async fn test_reupload_then_diagnose() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        fixtures::flat_gray().write_png(&path);

        let service = service();
        let mut request = ScanRequest::new(&path, BodyPart::Leg);
        let outcome = service.analyze_scan(&request).await.unwrap();
        assert!(matches!(outcome, DiagnosisOutcome::Rejected(_)));

        let replacement = dir.path().join("scan_retake.png");
        fixtures::healthy_leg().write_png(&replacement);
        request.image_path = replacement;

        let outcome = service.analyze_scan(&request).await.unwrap();
        assert_eq!(outcome.record().unwrap().severity, Severity::Normal);
        assert_eq!(
            service.sink().get_scan_status(request.scan_id).await.unwrap(),
            Some(ScanStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_completed_scan_is_not_reanalyzed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leg.png");
        fixtures::fractured_leg().write_png(&path);

        let service = DiagnosisService::new(
            Analyzer::default(),
            JsonReportStore::new(dir.path().join("reports")),
        );
        let request = ScanRequest::new(&path, BodyPart::Leg);
        service.analyze_scan(&request).await.unwrap();

        let err = service.analyze_scan(&request).await.unwrap_err();
        assert!(matches!(err, XrayError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_interpretation_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = service();
        let request = ScanRequest::new(dir.path().join("missing.png"), BodyPart::Hand);

        let outcome = service.analyze_scan(&request).await.unwrap();
        let DiagnosisOutcome::Mismatch(mismatch) = outcome else {
            panic!("expected a mismatch");
        };
        assert_eq!(mismatch.findings[0].label, crate::pathology::INTERPRETATION_ERROR);
    }
}
