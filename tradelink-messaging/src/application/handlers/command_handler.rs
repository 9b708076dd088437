//! 命令处理器（编排层）- 轻量级，只负责转发领域服务并记录日志

use std::sync::Arc;

use tracing::instrument;

use tradelink_core::error::Result;
use tradelink_storage_model::{ConversationDocument, MessageDocument, NotificationDocument};

use crate::application::commands::{
    AddParticipantCommand, CreateConversationCommand, DeleteAllNotificationsCommand,
    DeleteNotificationCommand, MarkAllNotificationsReadCommand, MarkConversationReadCommand,
    MarkNotificationReadCommand, NotifyNewUserApprovalCommand, NotifyQuoteEventCommand,
    SendContactMessageCommand, SendMessageCommand,
};
use crate::domain::repository::NotificationRepository;
use crate::domain::service::{
    ContactInquiryRouter, ConversationOrchestrator, QuoteLifecycleNotifier,
};

/// 消息命令处理器
pub struct MessagingCommandHandler {
    orchestrator: Arc<ConversationOrchestrator>,
    router: Arc<ContactInquiryRouter>,
    quote_notifier: Arc<QuoteLifecycleNotifier>,
    notifications: Arc<dyn NotificationRepository>,
}

impl MessagingCommandHandler {
    pub fn new(
        orchestrator: Arc<ConversationOrchestrator>,
        router: Arc<ContactInquiryRouter>,
        quote_notifier: Arc<QuoteLifecycleNotifier>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            orchestrator,
            router,
            quote_notifier,
            notifications,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn handle_create_conversation(
        &self,
        command: CreateConversationCommand,
    ) -> Result<ConversationDocument> {
        self.orchestrator.create_conversation(command.request).await
    }

    #[instrument(skip(self, command))]
    pub async fn handle_send_message(
        &self,
        command: SendMessageCommand,
    ) -> Result<MessageDocument> {
        self.orchestrator.send_message(command.message).await
    }

    #[instrument(skip(self, command))]
    pub async fn handle_send_contact_message(
        &self,
        command: SendContactMessageCommand,
    ) -> Result<ConversationDocument> {
        self.router.send_contact_message(command.inquiry).await
    }

    #[instrument(skip(self, command), fields(conversation_id = %command.conversation_id))]
    pub async fn handle_mark_conversation_read(
        &self,
        command: MarkConversationReadCommand,
    ) -> Result<()> {
        self.orchestrator
            .mark_conversation_read(&command.conversation_id, &command.user_id)
            .await
    }

    #[instrument(skip(self, command), fields(conversation_id = %command.conversation_id))]
    pub async fn handle_add_participant(&self, command: AddParticipantCommand) -> Result<()> {
        self.orchestrator
            .add_participant(&command.conversation_id, &command.user_id)
            .await
    }

    #[instrument(skip(self, command))]
    pub async fn handle_notify_quote_event(
        &self,
        command: NotifyQuoteEventCommand,
    ) -> Result<Option<NotificationDocument>> {
        self.quote_notifier.notify(command.event).await
    }

    #[instrument(skip(self, command))]
    pub async fn handle_notify_new_user_approval(
        &self,
        command: NotifyNewUserApprovalCommand,
    ) -> Result<usize> {
        self.router
            .notify_new_user_approval(
                &command.user_id,
                &command.display_name,
                command.company_name.as_deref(),
            )
            .await
    }

    #[instrument(skip(self, command), fields(notification_id = %command.notification_id))]
    pub async fn handle_mark_notification_read(
        &self,
        command: MarkNotificationReadCommand,
    ) -> Result<()> {
        self.notifications.mark_read(&command.notification_id).await?;
        Ok(())
    }

    #[instrument(skip(self, command), fields(user_id = %command.user_id))]
    pub async fn handle_mark_all_notifications_read(
        &self,
        command: MarkAllNotificationsReadCommand,
    ) -> Result<u64> {
        Ok(self.notifications.mark_all_read(&command.user_id).await?)
    }

    #[instrument(skip(self, command), fields(notification_id = %command.notification_id))]
    pub async fn handle_delete_notification(
        &self,
        command: DeleteNotificationCommand,
    ) -> Result<()> {
        self.notifications.delete(&command.notification_id).await?;
        Ok(())
    }

    #[instrument(skip(self, command), fields(user_id = %command.user_id))]
    pub async fn handle_delete_all_notifications(
        &self,
        command: DeleteAllNotificationsCommand,
    ) -> Result<u64> {
        Ok(self.notifications.delete_all(&command.user_id).await?)
    }
}
