//! Wire 风格的依赖注入模块
//!
//! 按依赖顺序构建变更总线、存储仓储、参与者目录与各领域服务，
//! 根据配置在内存后端与 MongoDB 后端之间选择。

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::handlers::{MessagingCommandHandler, MessagingQueryHandler};
use crate::config::MessagingConfig;
use crate::domain::event::ChangeBus;
use crate::domain::repository::{
    ConversationRepository, MessageRepository, NotificationRepository, ParticipantDirectory,
};
use crate::domain::service::{
    ContactInquiryRouter, ConversationOrchestrator, QuoteLifecycleNotifier, SubscriptionService,
};
use crate::infrastructure::external::{MongoParticipantDirectory, StaticParticipantDirectory};
use crate::infrastructure::persistence::memory::{
    InMemoryConversationRepository, InMemoryMessageRepository, InMemoryNotificationRepository,
};
use crate::infrastructure::persistence::mongo::{
    MongoConversationStore, MongoMessageStore, MongoNotificationStore,
};

/// 应用上下文 - 包含所有已初始化的服务
pub struct ApplicationContext {
    pub commands: Arc<MessagingCommandHandler>,
    pub queries: Arc<MessagingQueryHandler>,
    pub subscriptions: Arc<SubscriptionService>,
}

/// 构建应用上下文
///
/// mongo 后端时参与者目录读用户集合；内存后端时给一个空的静态目录，
/// 嵌入方（或测试）需要时可改用 [`initialize_with_directory`] 注入。
pub async fn initialize(config: &MessagingConfig) -> Result<ApplicationContext> {
    if config.is_mongo() {
        let database = connect(config).await?;
        let directory: Arc<dyn ParticipantDirectory> = Arc::new(MongoParticipantDirectory::new(
            &database,
            &config.user_collection,
        ));
        initialize_with_directory(config, directory).await
    } else {
        let directory: Arc<dyn ParticipantDirectory> = Arc::new(StaticParticipantDirectory::new());
        initialize_with_directory(config, directory).await
    }
}

/// 用外部提供的参与者目录构建应用上下文
pub async fn initialize_with_directory(
    config: &MessagingConfig,
    directory: Arc<dyn ParticipantDirectory>,
) -> Result<ApplicationContext> {
    // 1. 变更总线
    let bus = Arc::new(ChangeBus::new(config.change_bus_capacity));

    // 2. 存储仓储
    let (conversations, messages, notifications): (
        Arc<dyn ConversationRepository>,
        Arc<dyn MessageRepository>,
        Arc<dyn NotificationRepository>,
    ) = if config.is_mongo() {
        let database = connect(config).await?;
        (
            Arc::new(
                MongoConversationStore::new(
                    &database,
                    &config.conversation_collection,
                    bus.clone(),
                )
                .await?,
            ),
            Arc::new(
                MongoMessageStore::new(&database, &config.message_collection, bus.clone()).await?,
            ),
            Arc::new(
                MongoNotificationStore::new(
                    &database,
                    &config.notification_collection,
                    bus.clone(),
                )
                .await?,
            ),
        )
    } else {
        (
            Arc::new(InMemoryConversationRepository::new(bus.clone())),
            Arc::new(InMemoryMessageRepository::new(bus.clone())),
            Arc::new(InMemoryNotificationRepository::new(bus.clone())),
        )
    };

    // 3. 领域服务
    let orchestrator = Arc::new(ConversationOrchestrator::new(
        conversations.clone(),
        messages.clone(),
        notifications.clone(),
        directory.clone(),
    ));
    let router = Arc::new(ContactInquiryRouter::new(
        conversations.clone(),
        messages.clone(),
        notifications.clone(),
        directory.clone(),
    ));
    let quote_notifier = Arc::new(QuoteLifecycleNotifier::new(notifications.clone()));
    let subscriptions = Arc::new(SubscriptionService::new(
        bus.clone(),
        conversations.clone(),
        messages.clone(),
        notifications.clone(),
    ));

    // 4. 编排层处理器
    let commands = Arc::new(MessagingCommandHandler::new(
        orchestrator,
        router,
        quote_notifier,
        notifications.clone(),
    ));
    let queries = Arc::new(MessagingQueryHandler::new(
        conversations,
        messages,
        notifications,
    ));

    Ok(ApplicationContext {
        commands,
        queries,
        subscriptions,
    })
}

async fn connect(config: &MessagingConfig) -> Result<mongodb::Database> {
    let url = config
        .mongo_url
        .as_deref()
        .context("mongo backend requires a MongoDB connection url")?;
    let options = mongodb::options::ClientOptions::parse(url)
        .await
        .context("invalid MongoDB connection url")?;
    let client = mongodb::Client::with_options(options)?;
    Ok(client.database(&config.mongo_database))
}
