//! # XRay Core
//!
//! 诊断系统的核心模块，提供基础数据结构、错误定义和分析配置。

pub mod config;
pub mod error;
pub mod models;

pub use config::{AnalysisConfig, ConfigValidator};
pub use error::{Result, XrayError};
pub use models::*;
