//! 消息引擎错误类型定义
//!
//! 错误分为四类：参数校验错误（写入前拒绝）、配置错误（致命，不得吞掉）、
//! 资源不存在、以及其余内部错误。尽力而为的旁路失败不会出现在这里，
//! 它们在领域服务内部记录日志后被跳过。

use thiserror::Error;

/// 消息引擎统一错误类型
#[derive(Debug, Error)]
pub enum MessagingError {
    /// 参数校验失败
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// 配置错误（如系统中不存在可接收询盘的管理员）
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 资源不存在
    #[error("Not found: {0}")]
    NotFound(String),

    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MessagingError {
    pub fn invalid(message: impl Into<String>) -> Self {
        MessagingError::InvalidParameter(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        MessagingError::Configuration(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        MessagingError::NotFound(message.into())
    }
}

/// 消息引擎结果类型
pub type Result<T> = std::result::Result<T, MessagingError>;
