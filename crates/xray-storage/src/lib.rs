//! # 报告存储模块
//!
//! 诊断报告与扫描状态的持久化接口及其实现。

pub mod json;
pub mod memory;
pub mod sink;

pub use json::JsonReportStore;
pub use memory::InMemoryReportStore;
pub use sink::ReportSink;
