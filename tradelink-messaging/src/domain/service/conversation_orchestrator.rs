//! 会话编排领域服务
//!
//! 负责会话创建与去重、消息投递、批量已读。写入顺序固定为：
//! 校验 → 去重 → 身份快照 → 会话落库 → 消息落库 → 预览更新 →
//! 逐接收者未读累加与通知投递。会话落库之后的旁路失败（单条通知、
//! 单个计数）只记录日志，不回滚主操作。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::ensure;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use tradelink_core::error::{MessagingError, Result};
use tradelink_core::utils::{new_conversation_id, new_message_id, new_notification_id, truncate_chars};
use tradelink_storage_model::{
    ConversationDocument, ConversationType, LastMessagePreview, MessageDocument, MessageType,
    NotificationData, NotificationDocument, NotificationKind, PREVIEW_MAX_CHARS,
    ParticipantDetails, Sender,
};

use crate::domain::model::{CreateConversationRequest, OutgoingMessage};
use crate::domain::repository::{
    ConversationRepository, MessageRepository, NotificationRepository, ParticipantDirectory,
};

/// 会话编排服务
pub struct ConversationOrchestrator {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationRepository>,
    directory: Arc<dyn ParticipantDirectory>,
}

impl ConversationOrchestrator {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
        directory: Arc<dyn ParticipantDirectory>,
    ) -> Self {
        Self {
            conversations,
            messages,
            notifications,
            directory,
        }
    }

    /// 创建会话（direct 类型先走去重，命中即原样返回）
    #[instrument(skip(self, request), fields(
        conversation_type = request.conversation_type.as_str(),
        creator_id = %request.creator_id,
        participant_count = request.participant_ids.len(),
    ))]
    pub async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> Result<ConversationDocument> {
        Self::validate_create(&request)
            .map_err(|err| MessagingError::InvalidParameter(err.to_string()))?;

        if request.conversation_type == ConversationType::Direct {
            if let Some(existing) = self.find_existing_direct(&request).await? {
                debug!(
                    conversation_id = %existing.id,
                    "Reusing existing direct conversation"
                );
                // 会话本身不重建；携带的首条消息仍投递进既有会话
                let initial = request
                    .initial_message
                    .as_deref()
                    .filter(|content| !content.trim().is_empty());
                if let Some(content) = initial {
                    let message =
                        self.build_outgoing(&existing, &request.creator_id, content.to_string());
                    self.deliver(&existing, message, NotificationKind::NewMessage)
                        .await?;
                }
                return Ok(self
                    .conversations
                    .get(&existing.id)
                    .await?
                    .unwrap_or(existing));
            }
        }

        let details = self.snapshot_details(&request.participant_ids).await;
        let mut conversation = ConversationDocument::new(
            new_conversation_id(),
            request.conversation_type,
            request.participant_ids.clone(),
            request.metadata.clone(),
        );
        conversation.participant_details = details;
        self.conversations.create(&conversation).await?;
        info!(
            conversation_id = %conversation.id,
            participant_count = conversation.participants.len(),
            "Conversation created"
        );

        let initial = request
            .initial_message
            .as_deref()
            .filter(|content| !content.trim().is_empty());
        if let Some(content) = initial {
            let message =
                self.build_outgoing(&conversation, &request.creator_id, content.to_string());
            self.deliver(&conversation, message, NotificationKind::ConversationCreated)
                .await?;
        }

        // 返回存储中的最新状态（包含预览与未读计数）
        Ok(self
            .conversations
            .get(&conversation.id)
            .await?
            .unwrap_or(conversation))
    }

    /// 向既有会话发送消息
    #[instrument(skip(self, outgoing), fields(
        conversation_id = %outgoing.conversation_id,
        sender_id = %outgoing.sender_id,
    ))]
    pub async fn send_message(&self, outgoing: OutgoingMessage) -> Result<MessageDocument> {
        Self::validate_send(&outgoing)
            .map_err(|err| MessagingError::InvalidParameter(err.to_string()))?;

        let conversation = self
            .conversations
            .get(&outgoing.conversation_id)
            .await?
            .ok_or_else(|| {
                MessagingError::not_found(format!(
                    "conversation {} does not exist",
                    outgoing.conversation_id
                ))
            })?;
        if !conversation.is_participant(&outgoing.sender_id) {
            return Err(MessagingError::invalid(format!(
                "sender {} is not a participant of conversation {}",
                outgoing.sender_id, conversation.id
            )));
        }

        let mut message = self.build_outgoing(&conversation, &outgoing.sender_id, outgoing.content);
        message.attachments = outgoing.attachments;

        self.deliver(&conversation, message, NotificationKind::NewMessage)
            .await
    }

    /// 标记整个会话已读：清零未读计数并批量补已读回执
    ///
    /// 会话不存在或用户不是参与者时为无操作。
    #[instrument(skip(self))]
    pub async fn mark_conversation_read(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        let Some(conversation) = self.conversations.get(conversation_id).await? else {
            debug!(conversation_id, "Conversation missing, mark-read is a no-op");
            return Ok(());
        };
        if !conversation.is_participant(user_id) {
            debug!(conversation_id, user_id, "Not a participant, mark-read is a no-op");
            return Ok(());
        }

        self.conversations.reset_unread(conversation_id, user_id).await?;

        let unread = self.messages.list_unread(conversation_id, user_id).await?;
        let read_at = Utc::now();
        let mut marked = 0u32;
        for message in unread {
            // 发送者不是自己消息的未读接收者
            if message.sender_id.user_id() == Some(user_id) {
                continue;
            }
            match self.messages.mark_read(&message.id, user_id, read_at).await {
                Ok(true) => marked += 1,
                Ok(false) => {}
                Err(err) => warn!(
                    conversation_id,
                    message_id = %message.id,
                    error = %err,
                    "Failed to mark message read, skipping"
                ),
            }
        }
        debug!(conversation_id, user_id, marked, "Conversation marked read");
        Ok(())
    }

    /// 追加参与者并冻结其身份快照
    pub async fn add_participant(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(MessagingError::invalid("participant id cannot be empty"));
        }
        let details = match self.directory.get_by_id(user_id).await {
            Ok(Some(profile)) => Some(profile.into_details()),
            Ok(None) => None,
            Err(err) => {
                warn!(
                    user_id,
                    error = %err,
                    "Participant directory lookup failed, adding without detail snapshot"
                );
                None
            }
        };
        self.conversations
            .add_participant(conversation_id, user_id, details)
            .await?;
        Ok(())
    }

    fn validate_create(request: &CreateConversationRequest) -> anyhow::Result<()> {
        ensure!(
            !request.creator_id.trim().is_empty(),
            "creator id cannot be empty"
        );
        ensure!(
            !request.participant_ids.is_empty(),
            "participants cannot be empty"
        );
        // 首条消息的发送者是 creator，必须满足成员资格不变式
        if request.initial_message.is_some() {
            ensure!(
                request
                    .participant_ids
                    .iter()
                    .any(|id| id == &request.creator_id),
                "creator must be a participant to post the initial message"
            );
        }
        if request.conversation_type == ConversationType::Direct {
            ensure!(
                request.participant_ids.len() == 2,
                "direct conversations require exactly 2 participants"
            );
            ensure!(
                request.participant_ids[0] != request.participant_ids[1],
                "direct conversations require 2 distinct participants"
            );
        }
        Ok(())
    }

    fn validate_send(outgoing: &OutgoingMessage) -> anyhow::Result<()> {
        ensure!(
            !outgoing.sender_id.trim().is_empty(),
            "sender id cannot be empty"
        );
        ensure!(
            !outgoing.content.trim().is_empty(),
            "message content cannot be empty"
        );
        Ok(())
    }

    /// 构造发往既有会话的文本消息，`read_by` 预置发送者
    fn build_outgoing(
        &self,
        conversation: &ConversationDocument,
        sender_id: &str,
        content: String,
    ) -> MessageDocument {
        let sender_name = conversation
            .participant_details
            .get(sender_id)
            .map(|d| d.display_name.clone())
            .unwrap_or_else(|| sender_id.to_string());
        let mut message = MessageDocument::new(
            new_message_id(),
            conversation.id.clone(),
            Sender::user(sender_id),
            sender_name,
            content,
            MessageType::Text,
        );
        message.mark_read(sender_id, message.created_at);
        message
    }

    async fn find_existing_direct(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<Option<ConversationDocument>> {
        let first = &request.participant_ids[0];
        let second = &request.participant_ids[1];
        let candidates = self.conversations.find_direct_by_participant(first).await?;
        Ok(candidates.into_iter().find(|conversation| {
            conversation.is_participant(second)
                && conversation.metadata.scope_matches(&request.metadata)
        }))
    }

    /// 为每个参与者冻结身份快照；单个目录查询失败只跳过，不中断创建
    async fn snapshot_details(
        &self,
        participant_ids: &[String],
    ) -> HashMap<String, ParticipantDetails> {
        let mut details = HashMap::new();
        for user_id in participant_ids {
            match self.directory.get_by_id(user_id).await {
                Ok(Some(profile)) => {
                    details.insert(user_id.clone(), profile.into_details());
                }
                Ok(None) => debug!(user_id = %user_id, "Participant profile not found"),
                Err(err) => warn!(
                    user_id = %user_id,
                    error = %err,
                    "Participant directory lookup failed, skipping detail snapshot"
                ),
            }
        }
        details
    }

    /// 写入消息、更新预览，并对发送者之外的每个参与者独立地
    /// 累加未读计数、投递通知
    async fn deliver(
        &self,
        conversation: &ConversationDocument,
        message: MessageDocument,
        kind: NotificationKind,
    ) -> Result<MessageDocument> {
        self.messages.create(&message).await?;

        let preview = LastMessagePreview::from_message(&message);
        self.conversations
            .update_last_message(&conversation.id, &preview)
            .await?;

        for recipient in &conversation.participants {
            if message.sender_id.user_id() == Some(recipient.as_str()) {
                continue;
            }
            if let Err(err) = self
                .conversations
                .increment_unread(&conversation.id, recipient)
                .await
            {
                warn!(
                    conversation_id = %conversation.id,
                    user_id = %recipient,
                    error = %err,
                    "Failed to increment unread counter, skipping"
                );
            }
            let notification = self.build_message_notification(conversation, &message, recipient, kind);
            if let Err(err) = self.notifications.create(&notification).await {
                warn!(
                    conversation_id = %conversation.id,
                    user_id = %recipient,
                    error = %err,
                    "Failed to create notification, skipping"
                );
            }
        }

        Ok(message)
    }

    fn build_message_notification(
        &self,
        conversation: &ConversationDocument,
        message: &MessageDocument,
        recipient: &str,
        kind: NotificationKind,
    ) -> NotificationDocument {
        let preview = truncate_chars(&message.content, PREVIEW_MAX_CHARS);
        let (title, body) = match kind {
            NotificationKind::ConversationCreated => (
                "New conversation".to_string(),
                format!("{} started a conversation: {}", message.sender_name, preview),
            ),
            _ => (
                "New message".to_string(),
                format!("{}: {}", message.sender_name, preview),
            ),
        };
        let data = NotificationData {
            conversation_id: Some(conversation.id.clone()),
            message_id: Some(message.id.clone()),
            sender_id: Some(message.sender_id.as_str().to_string()),
            product_id: conversation.metadata.product_id.clone(),
            request_id: conversation.metadata.request_id.clone(),
            ..NotificationData::default()
        };
        NotificationDocument::new(new_notification_id(), recipient, kind, title, body, data)
    }
}
