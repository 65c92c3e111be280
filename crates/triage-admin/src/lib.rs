//! # 分诊管理模块
//!
//! 提供配置管理、日志初始化和运行指标等运维功能

pub mod config;
pub mod logging;
pub mod monitoring;

pub use config::{
    ClassifierConfig, ClassifierProvider, ConfigManager, ConfigValidator, LogFormat,
    LoggingConfig, ServerConfig, TriageConfig,
};
pub use logging::init_logging;
pub use monitoring::TriageMetrics;
