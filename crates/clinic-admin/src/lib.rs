//! # Clinic 管理模块
//!
//! 配置加载与验证、日志初始化。

pub mod config;
pub mod logging;

pub use config::{
    AuthConfig, ClinicConfig, ConfigManager, ConfigOverrides, ConfigValidator, DatabaseConfig,
    LoggingConfig, ServerConfig, WebConfig,
};
pub use logging::{init_logging, LogFormat};
