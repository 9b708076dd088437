//! TradeLink 消息核心公共库
//!
//! 提供统一的配置加载、错误类型、日志初始化与基础工具函数

pub mod config;
pub mod error;
pub mod tracing;
pub mod utils;

pub use config::{
    LoggingConfig, MessagingServiceConfig, MongoInstanceConfig, TradelinkAppConfig, app_config,
    load_config,
};
pub use error::{MessagingError, Result};
pub use utils::*;
