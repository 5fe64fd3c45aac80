//! 诊断流水线演示程序
//!
//! 用合成影像展示质量门限、部位识别、部位一致性检查和诊断报告生成

use anyhow::Context;
use tracing::info;
use uuid::Uuid;
use xray_diagnostic::xray_diagnosis::{ScanEvent, ScanStateMachine};
use xray_diagnostic::xray_imaging::RasterImage;
use xray_diagnostic::xray_storage::{InMemoryReportStore, ReportSink};
use xray_diagnostic::{AnalysisConfig, Analyzer, BodyPart, DiagnosisOutcome, ScanStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let analyzer = Analyzer::new(AnalysisConfig::default());
    let store = InMemoryReportStore::new();
    let state_machine = ScanStateMachine::new();

    println!("🩻 X光诊断流水线演示\n");

    let scans = [
        ("均匀灰图", flat_gray()?, BodyPart::Chest),
        ("胸片", chest()?, BodyPart::Chest),
        ("腿部长骨", leg()?, BodyPart::Leg),
        ("腿部长骨（选择手部）", leg()?, BodyPart::Hand),
    ];

    for (name, image, declared) in scans {
        let scan_id = Uuid::new_v4();
        println!("📋 {} ({}x{}, 选择部位: {})", name, image.width(), image.height(), declared);

        let outcome = analyzer.diagnose(&image, declared, scan_id);
        info!("Scan {} analysed", scan_id);
        match &outcome {
            DiagnosisOutcome::Diagnosed { record, findings } => {
                println!("   ✅ 结论: {} ({}, {}%)", record.result_label, record.severity, record.confidence_percent);
                println!("   建议: {}", record.recommendation);
                for finding in findings {
                    println!("   - {} {:.2} ({})", finding.label, finding.probability, finding.severity);
                }
                store
                    .save_report(record)
                    .await
                    .with_context(|| format!("无法保存扫描 {} 的报告", scan_id))?;
            }
            DiagnosisOutcome::Mismatch(mismatch) => {
                println!("   ⚠️  {}", mismatch.instruction);
            }
            DiagnosisOutcome::Rejected(rejection) => {
                println!("   ❌ 质量不合格: {}", rejection.reason);
            }
        }

        let status = state_machine.transition(&ScanStatus::Pending, ScanEvent::for_outcome(&outcome))?;
        store.update_scan_status(scan_id, status.clone()).await?;
        println!("   状态: {:?}", status);
        println!("{}\n", serde_json::to_string_pretty(&outcome)?);
    }

    println!("📊 已保存报告: {}", store.report_count().await);
    println!("\n🎉 诊断流水线演示完成!");
    Ok(())
}

/// 对比度不足的均匀灰图
fn flat_gray() -> xray_diagnostic::Result<RasterImage> {
    RasterImage::from_gray_fn(100, 100, |_, _| 128)
}

/// 横幅胸片，肺野有条纹状致密影
fn chest() -> xray_diagnostic::Result<RasterImage> {
    RasterImage::from_gray_fn(260, 200, |x, y| {
        if (60..200).contains(&x) && (60..180).contains(&y) {
            if (x / 4) % 2 == 0 {
                240
            } else {
                180
            }
        } else {
            200
        }
    })
}

/// 竖幅单根长骨
fn leg() -> xray_diagnostic::Result<RasterImage> {
    RasterImage::from_gray_fn(130, 300, |x, _| if (49..86).contains(&x) { 210 } else { 25 })
}
