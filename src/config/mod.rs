//! 配置加载模块
//!
//! 配置来源优先级：显式路径参数 > `TRADELINK_CONFIG` 环境变量 >
//! `config/tradelink.toml`。文件缺失或格式错误时退回默认配置并记录警告，
//! 单项配置可被 `TRADELINK_*` 环境变量覆盖（见 tradelink-messaging 的
//! `MessagingConfig::from_sources`）。

use std::env;
use std::fs;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;

static APP_CONFIG: OnceCell<TradelinkAppConfig> = OnceCell::new();

const DEFAULT_CONFIG_PATH: &str = "config/tradelink.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradelinkAppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub mongo: Option<MongoInstanceConfig>,
    #[serde(default)]
    pub messaging: MessagingServiceConfig,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
    #[serde(default)]
    pub with_file: bool,
    #[serde(default)]
    pub with_line_number: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: false,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

/// MongoDB 实例配置
#[derive(Debug, Clone, Deserialize)]
pub struct MongoInstanceConfig {
    pub url: String,
    #[serde(default = "default_mongo_database")]
    pub database: String,
}

fn default_mongo_database() -> String {
    "tradelink".to_string()
}

/// 消息服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingServiceConfig {
    /// 存储后端：`memory` 或 `mongo`
    #[serde(default = "default_backend")]
    pub backend: String,
    /// 变更总线缓冲容量
    #[serde(default = "default_bus_capacity")]
    pub change_bus_capacity: usize,
    #[serde(default = "default_conversation_collection")]
    pub conversation_collection: String,
    #[serde(default = "default_message_collection")]
    pub message_collection: String,
    #[serde(default = "default_notification_collection")]
    pub notification_collection: String,
    #[serde(default = "default_user_collection")]
    pub user_collection: String,
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_conversation_collection() -> String {
    "conversations".to_string()
}

fn default_message_collection() -> String {
    "messages".to_string()
}

fn default_notification_collection() -> String {
    "notifications".to_string()
}

fn default_user_collection() -> String {
    "users".to_string()
}

impl Default for MessagingServiceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            change_bus_capacity: default_bus_capacity(),
            conversation_collection: default_conversation_collection(),
            message_collection: default_message_collection(),
            notification_collection: default_notification_collection(),
            user_collection: default_user_collection(),
        }
    }
}

/// 从指定路径加载配置文件
pub fn load_config_from_path(path: &str) -> Result<TradelinkAppConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("cannot read config file: {}", path))?;
    toml::from_str(&raw).with_context(|| format!("invalid config format: {}", path))
}

/// 加载全局配置（只加载一次，后续调用返回缓存实例）
///
/// 文件缺失或解析失败时退回默认配置，不中断启动。
pub fn load_config(path: Option<&str>) -> &'static TradelinkAppConfig {
    APP_CONFIG.get_or_init(|| {
        let path = path
            .map(str::to_string)
            .or_else(|| env::var("TRADELINK_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        match load_config_from_path(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    config_path = %path,
                    error = %err,
                    "Failed to load configuration, falling back to defaults"
                );
                TradelinkAppConfig::default()
            }
        }
    })
}

/// 获取全局配置（未显式加载时使用默认路径）
pub fn app_config() -> &'static TradelinkAppConfig {
    load_config(None)
}
