//! 查询处理器（编排层）

use std::sync::Arc;

use tracing::instrument;

use tradelink_core::error::Result;
use tradelink_storage_model::{
    ConversationDocument, ConversationType, MessageDocument, NotificationDocument,
};

use crate::domain::repository::{
    ConversationRepository, MessageRepository, NotificationRepository,
};

/// 消息查询处理器
pub struct MessagingQueryHandler {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl MessagingQueryHandler {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            conversations,
            messages,
            notifications,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationDocument>> {
        Ok(self.conversations.get(conversation_id).await?)
    }

    /// 用户会话列表，按 `updated_at` 降序
    #[instrument(skip(self))]
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationDocument>> {
        Ok(self.conversations.list_by_participant(user_id).await?)
    }

    /// 管理后台按类型列出会话
    #[instrument(skip(self))]
    pub async fn list_conversations_by_type(
        &self,
        conversation_type: ConversationType,
    ) -> Result<Vec<ConversationDocument>> {
        Ok(self.conversations.list_by_type(conversation_type).await?)
    }

    /// 会话全量消息，升序
    #[instrument(skip(self))]
    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageDocument>> {
        Ok(self.messages.list(conversation_id).await?)
    }

    /// 会话最近 N 条消息，降序
    #[instrument(skip(self))]
    pub async fn list_recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageDocument>> {
        Ok(self.messages.list_recent(conversation_id, limit).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_notifications(&self, user_id: &str) -> Result<Vec<NotificationDocument>> {
        Ok(self.notifications.list_by_owner(user_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_unread_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<NotificationDocument>> {
        Ok(self.notifications.list_unread_by_owner(user_id).await?)
    }
}
