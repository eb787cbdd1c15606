//! 错误定义模块

use thiserror::Error;

/// 诊所系统统一错误类型
///
/// `Validation`、`Conflict`、`NotFound`、`InvalidStateTransition` 携带的字符串
/// 会直接返回给客户端；其余变体只写入日志。
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("数据冲突: {0}")]
    Conflict(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("未认证: {0}")]
    Unauthorized(String),

    #[error("权限错误: {0}")]
    Permission(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("网络错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for ClinicError {
    fn from(err: sqlx::Error) -> Self {
        ClinicError::Database(err.to_string())
    }
}

/// 诊所系统统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;
