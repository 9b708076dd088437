//! 日志初始化模块
//!
//! 为引擎的嵌入方提供统一的 tracing 初始化入口。

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// 从配置初始化日志系统
///
/// 优先使用环境变量 `RUST_LOG`，未设置时退回配置文件中的日志级别。
/// 重复初始化（例如测试中）静默忽略。
pub fn init_tracing_from_config(logging_config: Option<&LoggingConfig>) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = logging_config.map(|c| c.level.as_str()).unwrap_or("info");
            EnvFilter::new(level)
        }
    };

    let default_config = LoggingConfig::default();
    let config = logging_config.unwrap_or(&default_config);

    let _ = fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number)
        .with_env_filter(env_filter)
        .try_init();
}
