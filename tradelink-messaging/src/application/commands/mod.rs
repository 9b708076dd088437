//! 命令对象
//!
//! 展示层/API 层构造这些命令并交给 `MessagingCommandHandler`。

use crate::domain::model::{
    ContactInquiry, CreateConversationRequest, OutgoingMessage, QuoteEvent,
};

/// 创建会话
pub struct CreateConversationCommand {
    pub request: CreateConversationRequest,
}

/// 发送消息
pub struct SendMessageCommand {
    pub message: OutgoingMessage,
}

/// 投递联系表单询盘
pub struct SendContactMessageCommand {
    pub inquiry: ContactInquiry,
}

/// 标记会话已读
pub struct MarkConversationReadCommand {
    pub conversation_id: String,
    pub user_id: String,
}

/// 追加会话参与者
pub struct AddParticipantCommand {
    pub conversation_id: String,
    pub user_id: String,
}

/// 投递报价生命周期通知
pub struct NotifyQuoteEventCommand {
    pub event: QuoteEvent,
}

/// 新用户审批扇出
pub struct NotifyNewUserApprovalCommand {
    pub user_id: String,
    pub display_name: String,
    pub company_name: Option<String>,
}

/// 标记单条通知已读
pub struct MarkNotificationReadCommand {
    pub notification_id: String,
}

/// 标记用户全部通知已读
pub struct MarkAllNotificationsReadCommand {
    pub user_id: String,
}

/// 删除单条通知
pub struct DeleteNotificationCommand {
    pub notification_id: String,
}

/// 删除用户全部通知
pub struct DeleteAllNotificationsCommand {
    pub user_id: String,
}
