//! 会话文档模型

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradelink_core::utils::truncate_chars;

use crate::message::{MessageDocument, MessageType, Sender};

/// 会话预览内容的最大字符数
pub const PREVIEW_MAX_CHARS: usize = 100;

/// 会话类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    /// 双人会话（按参与者对 + 商品/询价单范围去重）
    Direct,
    /// 联系表单询盘（路由给全体管理员）
    Contact,
    /// 系统会话
    System,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Direct => "direct",
            ConversationType::Contact => "contact",
            ConversationType::System => "system",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "direct" => Some(ConversationType::Direct),
            "contact" => Some(ConversationType::Contact),
            "system" => Some(ConversationType::System),
            _ => None,
        }
    }
}

/// 参与者身份快照
///
/// 在会话创建时从参与者目录取一次，之后不随身份变更同步，
/// 允许逐渐过期（展示层按产品要求接受这一点）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantDetails {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

/// 最后一条消息预览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessagePreview {
    pub content: String,
    pub sender_id: Sender,
    pub sender_name: String,
    pub message_type: MessageType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl LastMessagePreview {
    pub fn from_message(message: &MessageDocument) -> Self {
        Self {
            content: truncate_chars(&message.content, PREVIEW_MAX_CHARS),
            sender_id: message.sender_id.clone(),
            sender_name: message.sender_name.clone(),
            message_type: message.message_type,
            created_at: message.created_at,
        }
    }
}

/// 会话元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    /// 联系表单子类别（如 `advertising`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// 商品范围，参与 direct 会话去重
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// 询价单范围，参与 direct 会话去重
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl ConversationMetadata {
    /// 去重范围比较：product/request 必须完全一致，缺失只与缺失匹配
    pub fn scope_matches(&self, other: &ConversationMetadata) -> bool {
        self.product_id == other.product_id && self.request_id == other.request_id
    }
}

/// 会话文档
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDocument {
    pub id: String,
    pub conversation_type: ConversationType,
    /// 参与者 id 集合（去重，顺序仅用于展示）
    pub participants: Vec<String>,
    #[serde(default)]
    pub participant_details: HashMap<String, ParticipantDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessagePreview>,
    /// 每参与者未读计数，键必须是 participants 的成员
    #[serde(default)]
    pub unread_count: HashMap<String, i64>,
    #[serde(default)]
    pub metadata: ConversationMetadata,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl ConversationDocument {
    /// 构造新会话：参与者去重、未读计数全部置 0
    pub fn new(
        id: impl Into<String>,
        conversation_type: ConversationType,
        participants: Vec<String>,
        metadata: ConversationMetadata,
    ) -> Self {
        let mut unique = Vec::with_capacity(participants.len());
        for participant in participants {
            if !unique.contains(&participant) {
                unique.push(participant);
            }
        }
        let unread_count = unique.iter().map(|id| (id.clone(), 0)).collect();
        let now = Utc::now();
        Self {
            id: id.into(),
            conversation_type,
            participants: unique,
            participant_details: HashMap::new(),
            last_message: None,
            unread_count,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|id| id == user_id)
    }

    pub fn unread_for(&self, user_id: &str) -> i64 {
        self.unread_count.get(user_id).copied().unwrap_or(0)
    }
}
