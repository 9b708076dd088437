//! 联系表单询盘路由
//!
//! 将一条（可能匿名的）站内询盘扇出给全体可用管理员：所有管理员进入
//! 同一个 contact 会话，每个管理员独立获得未读累加和一条通知——
//! 有意的全员扇出，没有"认领"或单人受理语义。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::ensure;
use tracing::{info, instrument, warn};

use tradelink_core::error::{MessagingError, Result};
use tradelink_core::utils::{
    is_valid_email, new_conversation_id, new_message_id, new_notification_id, truncate_chars,
};
use tradelink_storage_model::{
    ConversationDocument, ConversationMetadata, ConversationType, LastMessagePreview,
    MessageDocument, MessageType, NotificationData, NotificationDocument, NotificationKind,
    PREVIEW_MAX_CHARS, Sender,
};

use crate::domain::model::{
    ContactInquiry, DEFAULT_CONTACT_TAG, MAX_CONTACT_MESSAGE_CHARS, ParticipantProfile,
};
use crate::domain::repository::{
    ConversationRepository, MessageRepository, NotificationRepository, ParticipantDirectory,
};

/// 联系表单路由服务
pub struct ContactInquiryRouter {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<dyn NotificationRepository>,
    directory: Arc<dyn ParticipantDirectory>,
}

impl ContactInquiryRouter {
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

    /// 投递联系表单询盘
    ///
    /// 管理员集合为空是配置错误（无人能收到询盘），直接失败；
    /// 单个管理员的计数或通知写入失败只记录并跳过。
    #[instrument(skip(self, inquiry), fields(
        contact_email = %inquiry.email,
        authenticated = inquiry.user_id.is_some(),
    ))]
    pub async fn send_contact_message(
        &self,
        inquiry: ContactInquiry,
    ) -> Result<ConversationDocument> {
        Self::validate(&inquiry).map_err(|err| MessagingError::InvalidParameter(err.to_string()))?;

        let admins = self.directory.list_administrators().await?;
        if admins.is_empty() {
            return Err(MessagingError::configuration(
                "no active administrator to receive contact messages",
            ));
        }

        let mut participants: Vec<String> =
            admins.iter().map(|admin| admin.user_id.clone()).collect();
        if let Some(user_id) = &inquiry.user_id {
            if !participants.contains(user_id) {
                participants.push(user_id.clone());
            }
        }

        let tag = inquiry
            .tag
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTACT_TAG.to_string());
        let metadata = ConversationMetadata {
            source: Some("contact_form".to_string()),
            subject: inquiry.subject.clone(),
            contact_name: Some(inquiry.name.clone()),
            contact_email: Some(inquiry.email.clone()),
            tag: Some(tag),
            ..ConversationMetadata::default()
        };

        let mut conversation = ConversationDocument::new(
            new_conversation_id(),
            ConversationType::Contact,
            participants,
            metadata,
        );
        conversation.participant_details = self.snapshot_details(&conversation.participants).await;
        self.conversations.create(&conversation).await?;

        let sender = match &inquiry.user_id {
            Some(user_id) => Sender::user(user_id.as_str()),
            None => Sender::Anonymous,
        };
        let mut message = MessageDocument::new(
            new_message_id(),
            conversation.id.clone(),
            sender,
            inquiry.name.clone(),
            inquiry.message.clone(),
            MessageType::ContactInquiry,
        );
        if let Some(subject) = &inquiry.subject {
            message.metadata.insert("subject".to_string(), subject.clone());
        }
        message
            .metadata
            .insert("contact_name".to_string(), inquiry.name.clone());
        message
            .metadata
            .insert("contact_email".to_string(), inquiry.email.clone());
        if let Some(user_id) = &inquiry.user_id {
            message.mark_read(user_id, message.created_at);
        }
        self.messages.create(&message).await?;

        let preview = LastMessagePreview::from_message(&message);
        self.conversations
            .update_last_message(&conversation.id, &preview)
            .await?;

        for admin in &admins {
            if let Err(err) = self
                .conversations
                .increment_unread(&conversation.id, &admin.user_id)
                .await
            {
                warn!(
                    conversation_id = %conversation.id,
                    user_id = %admin.user_id,
                    error = %err,
                    "Failed to increment admin unread counter, skipping"
                );
            }
            let notification = self.build_inquiry_notification(&conversation, &message, &inquiry, admin);
            if let Err(err) = self.notifications.create(&notification).await {
                warn!(
                    conversation_id = %conversation.id,
                    user_id = %admin.user_id,
                    error = %err,
                    "Failed to create admin notification, skipping"
                );
            }
        }

        info!(
            conversation_id = %conversation.id,
            admin_count = admins.len(),
            "Contact inquiry routed to administrators"
        );

        Ok(self
            .conversations
            .get(&conversation.id)
            .await?
            .unwrap_or(conversation))
    }

    /// 新用户注册后通知全体可用管理员进行审批
    #[instrument(skip(self))]
    pub async fn notify_new_user_approval(
        &self,
        user_id: &str,
        display_name: &str,
        company_name: Option<&str>,
    ) -> Result<usize> {
        if user_id.trim().is_empty() {
            return Err(MessagingError::invalid("user id cannot be empty"));
        }

        let admins = self.directory.list_administrators().await?;
        if admins.is_empty() {
            return Err(MessagingError::configuration(
                "no active administrator to approve new users",
            ));
        }

        let body = match company_name {
            Some(company) => format!("{} from {} is awaiting approval", display_name, company),
            None => format!("{} is awaiting approval", display_name),
        };
        let batch: Vec<NotificationDocument> = admins
            .iter()
            .map(|admin| {
                let data = NotificationData {
                    sender_id: Some(user_id.to_string()),
                    ..NotificationData::default()
                };
                NotificationDocument::new(
                    new_notification_id(),
                    admin.user_id.clone(),
                    NotificationKind::NewUserApproval,
                    "New user awaiting approval",
                    body.clone(),
                    data,
                )
            })
            .collect();

        let created = self.notifications.create_many(&batch).await?;
        info!(user_id, admin_count = admins.len(), created, "New-user approval fan-out");
        Ok(created)
    }

    fn validate(inquiry: &ContactInquiry) -> anyhow::Result<()> {
        ensure!(!inquiry.name.trim().is_empty(), "contact name is required");
        ensure!(
            !inquiry.message.trim().is_empty(),
            "contact message is required"
        );
        ensure!(
            inquiry.message.chars().count() <= MAX_CONTACT_MESSAGE_CHARS,
            "contact message exceeds maximum length of {} characters",
            MAX_CONTACT_MESSAGE_CHARS
        );
        ensure!(
            is_valid_email(&inquiry.email),
            "contact email address is malformed"
        );
        Ok(())
    }

    /// 冻结参与者身份快照；单个目录查询失败只跳过
    async fn snapshot_details(
        &self,
        participant_ids: &[String],
    ) -> HashMap<String, tradelink_storage_model::ParticipantDetails> {
        let mut details = HashMap::new();
        for user_id in participant_ids {
            match self.directory.get_by_id(user_id).await {
                Ok(Some(profile)) => {
                    details.insert(user_id.clone(), profile.into_details());
                }
                Ok(None) => {}
                Err(err) => warn!(
                    user_id = %user_id,
                    error = %err,
                    "Participant directory lookup failed, skipping detail snapshot"
                ),
            }
        }
        details
    }

    fn build_inquiry_notification(
        &self,
        conversation: &ConversationDocument,
        message: &MessageDocument,
        inquiry: &ContactInquiry,
        admin: &ParticipantProfile,
    ) -> NotificationDocument {
        let mut data = NotificationData {
            conversation_id: Some(conversation.id.clone()),
            message_id: Some(message.id.clone()),
            sender_id: Some(message.sender_id.as_str().to_string()),
            ..NotificationData::default()
        };
        data.extra
            .insert("contact_email".to_string(), inquiry.email.clone());
        NotificationDocument::new(
            new_notification_id(),
            admin.user_id.clone(),
            NotificationKind::ConversationCreated,
            "New contact inquiry",
            format!(
                "{}: {}",
                inquiry.name,
                truncate_chars(&inquiry.message, PREVIEW_MAX_CHARS)
            ),
            data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inquiry() -> ContactInquiry {
        ContactInquiry {
            name: "Wang Wei".to_string(),
            email: "wang.wei@example.com".to_string(),
            subject: Some("Bulk order".to_string()),
            message: "Interested in your catalog".to_string(),
            tag: None,
            user_id: None,
        }
    }

    #[test]
    fn valid_inquiry_passes() {
        assert!(ContactInquiryRouter::validate(&inquiry()).is_ok());
    }

    #[test]
    fn missing_name_is_rejected() {
        let mut bad = inquiry();
        bad.name = "  ".to_string();
        assert!(ContactInquiryRouter::validate(&bad).is_err());
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut bad = inquiry();
        bad.email = "not-an-email".to_string();
        let err = ContactInquiryRouter::validate(&bad).expect_err("must reject");
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let mut bad = inquiry();
        bad.message = "x".repeat(MAX_CONTACT_MESSAGE_CHARS + 1);
        assert!(ContactInquiryRouter::validate(&bad).is_err());
    }

    #[test]
    fn message_at_limit_is_accepted() {
        let mut edge = inquiry();
        edge.message = "x".repeat(MAX_CONTACT_MESSAGE_CHARS);
        assert!(ContactInquiryRouter::validate(&edge).is_ok());
    }
}
