//! 消息文档模型

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 匿名投递人的持久化哨兵值
pub const ANONYMOUS_SENDER: &str = "anonymous";

/// 消息发送者：已登录用户或匿名投递人
///
/// 匿名发送者仅在联系表单（contact 类型会话）中合法，
/// 持久化时写作字面量 `anonymous`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sender {
    User(String),
    Anonymous,
}

impl Sender {
    pub fn user(id: impl Into<String>) -> Self {
        Sender::User(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Sender::User(id) => id,
            Sender::Anonymous => ANONYMOUS_SENDER,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Sender::Anonymous)
    }

    /// 已登录用户的 id；匿名发送者返回 None
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Sender::User(id) => Some(id),
            Sender::Anonymous => None,
        }
    }
}

impl From<String> for Sender {
    fn from(raw: String) -> Self {
        if raw == ANONYMOUS_SENDER {
            Sender::Anonymous
        } else {
            Sender::User(raw)
        }
    }
}

impl From<Sender> for String {
    fn from(sender: Sender) -> Self {
        sender.as_str().to_string()
    }
}

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    ContactInquiry,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::ContactInquiry => "contact_inquiry",
            MessageType::System => "system",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageType::Text),
            "contact_inquiry" => Some(MessageType::ContactInquiry),
            "system" => Some(MessageType::System),
            _ => None,
        }
    }
}

/// 消息附件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub content_type: String,
    pub size: i64,
}

/// 已读回执记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRecord {
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub read_at: DateTime<Utc>,
}

/// 消息文档（归属于唯一一个会话）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDocument {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: Sender,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// 已读回执集合，只增不减
    #[serde(default)]
    pub read_by: Vec<ReadRecord>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl MessageDocument {
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        sender_id: Sender,
        sender_name: impl Into<String>,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            message_type,
            metadata: HashMap::new(),
            attachments: Vec::new(),
            read_by: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.iter().any(|record| record.user_id == user_id)
    }

    /// 追加已读回执；已读则保持不变并返回 false
    pub fn mark_read(&mut self, user_id: &str, read_at: DateTime<Utc>) -> bool {
        if self.is_read_by(user_id) {
            return false;
        }
        self.read_by.push(ReadRecord {
            user_id: user_id.to_string(),
            read_at,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_sender_roundtrips_as_literal() {
        let json = serde_json::to_string(&Sender::Anonymous).expect("serialize");
        assert_eq!(json, "\"anonymous\"");
        let back: Sender = serde_json::from_str(&json).expect("deserialize");
        assert!(back.is_anonymous());
    }

    #[test]
    fn user_sender_roundtrips_as_plain_id() {
        let json = serde_json::to_string(&Sender::user("u42")).expect("serialize");
        assert_eq!(json, "\"u42\"");
        let back: Sender = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.user_id(), Some("u42"));
    }

    #[test]
    fn mark_read_is_idempotent() {
        let mut message = MessageDocument::new(
            "msg_1",
            "conv_1",
            Sender::user("u1"),
            "Alice",
            "hello",
            MessageType::Text,
        );
        assert!(message.mark_read("u2", Utc::now()));
        assert!(!message.mark_read("u2", Utc::now()));
        assert_eq!(message.read_by.len(), 1);
    }

    #[test]
    fn message_type_string_conversions() {
        assert_eq!(MessageType::ContactInquiry.as_str(), "contact_inquiry");
        assert_eq!(MessageType::from_str("text"), Some(MessageType::Text));
        assert_eq!(MessageType::from_str("unknown"), None);
    }
}
