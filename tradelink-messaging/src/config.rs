//! 消息引擎运行配置
//!
//! 配置来源优先级：环境变量 > 应用配置文件 > 内置默认值。

use std::env;

use tradelink_core::config::TradelinkAppConfig;

/// 消息引擎配置
#[derive(Clone, Debug)]
pub struct MessagingConfig {
    /// 存储后端：`memory` 或 `mongo`
    pub backend: String,
    pub mongo_url: Option<String>,
    pub mongo_database: String,
    pub conversation_collection: String,
    pub message_collection: String,
    pub notification_collection: String,
    pub user_collection: String,
    pub change_bus_capacity: usize,
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary).ok().or_else(|| env::var(fallback).ok())
}

impl MessagingConfig {
    pub fn from_sources(app: Option<&TradelinkAppConfig>) -> Self {
        let service = app.map(|cfg| cfg.messaging.clone()).unwrap_or_default();

        let backend = env_or_fallback("TRADELINK_MESSAGING_BACKEND", "TRADELINK_STORAGE_BACKEND")
            .unwrap_or(service.backend);

        let mongo_url = env_or_fallback("TRADELINK_MESSAGING_MONGO_URL", "TRADELINK_MONGO_URL")
            .or_else(|| app.and_then(|cfg| cfg.mongo.as_ref().map(|m| m.url.clone())));

        let mongo_database = env_or_fallback(
            "TRADELINK_MESSAGING_MONGO_DATABASE",
            "TRADELINK_MONGO_DATABASE",
        )
        .or_else(|| app.and_then(|cfg| cfg.mongo.as_ref().map(|m| m.database.clone())))
        .unwrap_or_else(|| "tradelink".to_string());

        let change_bus_capacity = env::var("TRADELINK_MESSAGING_BUS_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(service.change_bus_capacity);

        Self {
            backend,
            mongo_url,
            mongo_database,
            conversation_collection: service.conversation_collection,
            message_collection: service.message_collection,
            notification_collection: service.notification_collection,
            user_collection: service.user_collection,
            change_bus_capacity,
        }
    }

    pub fn is_mongo(&self) -> bool {
        self.backend.eq_ignore_ascii_case("mongo")
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self::from_sources(None)
    }
}
