//! 快照订阅服务
//!
//! 把变更总线上的事件转换成面向调用方的快照推送：订阅时先推一次当前
//! 快照，之后每个相关事件触发一次重新查询。订阅者落后（Lagged）时
//! 不丢增量，直接重新同步。取消由调用方驱动：`unsubscribe()` 或
//! 丢弃句柄即停止转发任务；服务端不设超时。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use tradelink_storage_model::{ConversationDocument, MessageDocument, NotificationDocument};

use crate::domain::event::{ChangeBus, ChangeEvent};
use crate::domain::repository::{
    ConversationRepository, MessageRepository, NotificationRepository,
};

/// 订阅句柄；`unsubscribe()` 或丢弃即取消
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.handle.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 快照订阅服务
pub struct SubscriptionService {
    bus: Arc<ChangeBus>,
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl SubscriptionService {
    pub fn new(
        bus: Arc<ChangeBus>,
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            bus,
            conversations,
            messages,
            notifications,
        }
    }

    /// 订阅某用户的会话列表（按 `updated_at` 降序的实时快照）
    pub fn subscribe_conversations<C, E>(
        &self,
        user_id: &str,
        on_change: C,
        on_error: E,
    ) -> Subscription
    where
        C: Fn(Vec<ConversationDocument>) + Send + Sync + 'static,
        E: Fn(anyhow::Error) + Send + Sync + 'static,
    {
        let rx = self.bus.subscribe();
        let repo = Arc::clone(&self.conversations);
        let user = user_id.to_string();
        let handle = tokio::spawn(async move {
            match repo.list_by_participant(&user).await {
                Ok(snapshot) => on_change(snapshot),
                Err(err) => on_error(err),
            }
            let mut stream = BroadcastStream::new(rx);
            while let Some(item) = stream.next().await {
                let relevant = match item {
                    Ok(ChangeEvent::Conversation { participants, .. }) => {
                        participants.iter().any(|p| p == &user)
                    }
                    Ok(_) => false,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(user_id = %user, skipped, "Conversation subscriber lagged, resyncing");
                        true
                    }
                };
                if !relevant {
                    continue;
                }
                match repo.list_by_participant(&user).await {
                    Ok(snapshot) => on_change(snapshot),
                    Err(err) => on_error(err),
                }
            }
        });
        Subscription { handle }
    }

    /// 订阅单个会话的消息流（升序全量快照）
    pub fn subscribe_messages<C, E>(
        &self,
        conversation_id: &str,
        on_change: C,
        on_error: E,
    ) -> Subscription
    where
        C: Fn(Vec<MessageDocument>) + Send + Sync + 'static,
        E: Fn(anyhow::Error) + Send + Sync + 'static,
    {
        let rx = self.bus.subscribe();
        let repo = Arc::clone(&self.messages);
        let conversation = conversation_id.to_string();
        let handle = tokio::spawn(async move {
            match repo.list(&conversation).await {
                Ok(snapshot) => on_change(snapshot),
                Err(err) => on_error(err),
            }
            let mut stream = BroadcastStream::new(rx);
            while let Some(item) = stream.next().await {
                let relevant = match item {
                    Ok(ChangeEvent::Message { conversation_id }) => {
                        conversation_id == conversation
                    }
                    Ok(_) => false,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(
                            conversation_id = %conversation,
                            skipped,
                            "Message subscriber lagged, resyncing"
                        );
                        true
                    }
                };
                if !relevant {
                    continue;
                }
                match repo.list(&conversation).await {
                    Ok(snapshot) => on_change(snapshot),
                    Err(err) => on_error(err),
                }
            }
        });
        Subscription { handle }
    }

    /// 订阅某用户的通知列表
    pub fn subscribe_notifications<C, E>(
        &self,
        user_id: &str,
        on_change: C,
        on_error: E,
    ) -> Subscription
    where
        C: Fn(Vec<NotificationDocument>) + Send + Sync + 'static,
        E: Fn(anyhow::Error) + Send + Sync + 'static,
    {
        let rx = self.bus.subscribe();
        let repo = Arc::clone(&self.notifications);
        let user = user_id.to_string();
        let handle = tokio::spawn(async move {
            match repo.list_by_owner(&user).await {
                Ok(snapshot) => on_change(snapshot),
                Err(err) => on_error(err),
            }
            let mut stream = BroadcastStream::new(rx);
            while let Some(item) = stream.next().await {
                let relevant = match item {
                    Ok(ChangeEvent::Notification { user_id }) => user_id == user,
                    Ok(_) => false,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(user_id = %user, skipped, "Notification subscriber lagged, resyncing");
                        true
                    }
                };
                if !relevant {
                    continue;
                }
                match repo.list_by_owner(&user).await {
                    Ok(snapshot) => on_change(snapshot),
                    Err(err) => on_error(err),
                }
            }
        });
        Subscription { handle }
    }

    /// 订阅某用户的未读通知数（由未读列表派生，不单独存储计数）
    pub fn subscribe_unread_notifications<C, E>(
        &self,
        user_id: &str,
        on_count: C,
        on_error: E,
    ) -> Subscription
    where
        C: Fn(usize) + Send + Sync + 'static,
        E: Fn(anyhow::Error) + Send + Sync + 'static,
    {
        let rx = self.bus.subscribe();
        let repo = Arc::clone(&self.notifications);
        let user = user_id.to_string();
        let handle = tokio::spawn(async move {
            match repo.list_unread_by_owner(&user).await {
                Ok(unread) => on_count(unread.len()),
                Err(err) => on_error(err),
            }
            let mut stream = BroadcastStream::new(rx);
            while let Some(item) = stream.next().await {
                let relevant = match item {
                    Ok(ChangeEvent::Notification { user_id }) => user_id == user,
                    Ok(_) => false,
                    Err(BroadcastStreamRecvError::Lagged(_)) => true,
                };
                if !relevant {
                    continue;
                }
                match repo.list_unread_by_owner(&user).await {
                    Ok(unread) => on_count(unread.len()),
                    Err(err) => on_error(err),
                }
            }
        });
        Subscription { handle }
    }
}
