//! 通知文档模型

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    ConversationCreated,
    QuoteReceived,
    QuoteAccepted,
    QuoteRejected,
    NewUserApproval,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewMessage => "new_message",
            NotificationKind::ConversationCreated => "conversation_created",
            NotificationKind::QuoteReceived => "quote_received",
            NotificationKind::QuoteAccepted => "quote_accepted",
            NotificationKind::QuoteRejected => "quote_rejected",
            NotificationKind::NewUserApproval => "new_user_approval",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "new_message" => Some(NotificationKind::NewMessage),
            "conversation_created" => Some(NotificationKind::ConversationCreated),
            "quote_received" => Some(NotificationKind::QuoteReceived),
            "quote_accepted" => Some(NotificationKind::QuoteAccepted),
            "quote_rejected" => Some(NotificationKind::QuoteRejected),
            "new_user_approval" => Some(NotificationKind::NewUserApproval),
            _ => None,
        }
    }
}

/// 通知结构化负载
///
/// 客户端依赖这些字段深链到会话或询价单，字段按通知类型选填。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

/// 通知文档（归属于唯一一个接收者）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDocument {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: NotificationData,
    /// 只从 false 翻转到 true
    #[serde(default)]
    pub is_read: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl NotificationDocument {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        data: NotificationData,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind,
            title: title.into(),
            body: body.into(),
            data,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_to_snake_case() {
        let json = serde_json::to_string(&NotificationKind::QuoteRejected).expect("serialize");
        assert_eq!(json, "\"quote_rejected\"");
        assert_eq!(
            NotificationKind::from_str("new_user_approval"),
            Some(NotificationKind::NewUserApproval)
        );
    }

    #[test]
    fn new_notification_starts_unread() {
        let notification = NotificationDocument::new(
            "ntf_1",
            "u1",
            NotificationKind::NewMessage,
            "New message",
            "Alice: hello",
            NotificationData::default(),
        );
        assert!(!notification.is_read);
    }

    #[test]
    fn empty_data_fields_are_omitted_from_json() {
        let data = NotificationData {
            conversation_id: Some("conv_1".to_string()),
            ..NotificationData::default()
        };
        let json = serde_json::to_value(&data).expect("serialize");
        assert_eq!(json["conversation_id"], "conv_1");
        assert!(json.get("quote_id").is_none());
        assert!(json.get("extra").is_none());
    }
}
