//! X光诊断命令行工具

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;
use xray_core::{AnalysisConfig, BodyPart, ScanRequest};
use xray_diagnosis::{Analyzer, DiagnosisOutcome, DiagnosisService};
use xray_storage::{InMemoryReportStore, JsonReportStore, ReportSink};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "xray-cli")]
#[command(about = "确定性X光影像诊断工具")]
struct Args {
    /// 日志级别
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 分析一幅影像并输出JSON结果
    Analyze {
        /// 影像文件路径
        #[arg(short, long)]
        image: PathBuf,

        /// 医生选择的检查部位 (Chest/Hand/Leg)
        #[arg(short, long)]
        body_part: BodyPart,

        /// 扫描ID，默认随机生成
        #[arg(long)]
        scan_id: Option<Uuid>,

        /// 参考图像目录，默认为 <影像目录>/../reference_images
        #[arg(long)]
        reference_dir: Option<PathBuf>,

        /// 报告输出目录，不指定时报告只保存在内存中
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// 配置文件路径 (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 输出默认配置 (TOML)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志，输出到 stderr 以免干扰 JSON 结果
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Config => {
            let rendered = AnalysisConfig::default()
                .to_toml()
                .context("无法生成默认配置")?;
            println!("{}", rendered);
        }
        Command::Analyze {
            image,
            body_part,
            scan_id,
            reference_dir,
            report_dir,
            config,
        } => {
            let mut analysis_config =
                AnalysisConfig::load(config.as_deref()).context("无法加载分析配置")?;
            if reference_dir.is_some() {
                analysis_config.reference.directory = reference_dir;
            }

            let mut request = ScanRequest::new(image, body_part);
            if let Some(scan_id) = scan_id {
                request.scan_id = scan_id;
            }

            let analyzer = Analyzer::new(analysis_config);
            let outcome = match report_dir {
                Some(dir) => {
                    info!("报告目录: {}", dir.display());
                    run(analyzer, JsonReportStore::new(dir), &request).await?
                }
                None => run(analyzer, InMemoryReportStore::new(), &request).await?,
            };

            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

async fn run<S: ReportSink>(
    analyzer: Analyzer,
    sink: S,
    request: &ScanRequest,
) -> Result<DiagnosisOutcome> {
    let service = DiagnosisService::new(analyzer, sink);
    let outcome = service
        .analyze_scan(request)
        .await
        .with_context(|| format!("扫描 {} 分析失败", request.scan_id))?;
    Ok(outcome)
}
