//! 仓储接口定义
//!
//! 三个存储契约加一个外部参与者目录。未读计数只通过
//! `increment_unread`/`reset_unread` 原子原语修改，任何调用方都不得
//! 跨调用做读-改-写。

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tradelink_storage_model::{
    ConversationDocument, ConversationMetadata, ConversationType, LastMessagePreview,
    MessageDocument, NotificationDocument, ParticipantDetails,
};

use crate::domain::model::ParticipantProfile;

/// 会话仓储接口
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create(&self, conversation: &ConversationDocument) -> Result<()>;

    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationDocument>>;

    /// 某用户参与的全部会话，按 `updated_at` 降序
    async fn list_by_participant(&self, user_id: &str) -> Result<Vec<ConversationDocument>>;

    /// 按会话类型列出（管理后台视图）
    async fn list_by_type(
        &self,
        conversation_type: ConversationType,
    ) -> Result<Vec<ConversationDocument>>;

    /// 去重查询：包含指定参与者的全部 direct 会话
    async fn find_direct_by_participant(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationDocument>>;

    async fn update_metadata(
        &self,
        conversation_id: &str,
        metadata: &ConversationMetadata,
    ) -> Result<()>;

    async fn update_last_message(
        &self,
        conversation_id: &str,
        preview: &LastMessagePreview,
    ) -> Result<()>;

    /// 原子地将参与者未读计数加一
    async fn increment_unread(&self, conversation_id: &str, user_id: &str) -> Result<()>;

    /// 将参与者未读计数清零（不触碰 `updated_at`）
    async fn reset_unread(&self, conversation_id: &str, user_id: &str) -> Result<()>;

    async fn add_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
        details: Option<ParticipantDetails>,
    ) -> Result<()>;
}

/// 消息仓储接口
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: &MessageDocument) -> Result<()>;

    async fn get(&self, message_id: &str) -> Result<Option<MessageDocument>>;

    /// 会话全量消息，按 `created_at` 升序，同刻按插入顺序
    async fn list(&self, conversation_id: &str) -> Result<Vec<MessageDocument>>;

    /// 最近 N 条，按 `created_at` 降序
    async fn list_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageDocument>>;

    /// 指定用户尚未读的消息（含该用户自己发送的；批量已读由调用方排除）
    async fn list_unread(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Vec<MessageDocument>>;

    /// 追加已读回执；已读时为无操作并返回 false
    async fn mark_read(
        &self,
        message_id: &str,
        user_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn delete(&self, message_id: &str) -> Result<()>;
}

/// 通知仓储接口
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NotificationDocument) -> Result<()>;

    /// 批量创建：每个接收者独立写入，单条失败只记录并跳过，返回成功数
    async fn create_many(&self, notifications: &[NotificationDocument]) -> Result<usize>;

    /// 按创建时间降序
    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<NotificationDocument>>;

    async fn list_unread_by_owner(&self, user_id: &str) -> Result<Vec<NotificationDocument>>;

    async fn mark_read(&self, notification_id: &str) -> Result<()>;

    async fn mark_all_read(&self, user_id: &str) -> Result<u64>;

    async fn delete(&self, notification_id: &str) -> Result<()>;

    async fn delete_all(&self, user_id: &str) -> Result<u64>;
}

/// 参与者目录（外部用户存储，只读）
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn get_by_id(&self, user_id: &str) -> Result<Option<ParticipantProfile>>;

    /// 全部可用管理员（排除停用与删除账号）
    async fn list_administrators(&self) -> Result<Vec<ParticipantProfile>>;
}
