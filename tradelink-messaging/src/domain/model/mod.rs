//! 编排层领域模型
//!
//! 用例入参与参与者目录返回的档案类型。

use serde::{Deserialize, Serialize};
use tradelink_storage_model::{Attachment, ConversationMetadata, ConversationType, ParticipantDetails};

/// 联系表单消息的最大字符数
pub const MAX_CONTACT_MESSAGE_CHARS: usize = 5000;

/// 联系表单默认路由类别
pub const DEFAULT_CONTACT_TAG: &str = "contact";

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Buyer,
    Seller,
    Administrator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Buyer => "buyer",
            UserRole::Seller => "seller",
            UserRole::Administrator => "administrator",
        }
    }
}

/// 账号状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Deleted => "deleted",
        }
    }
}

/// 参与者档案（来自外部用户存储，只读）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub user_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: UserRole,
    pub status: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl ParticipantProfile {
    pub fn is_active(&self) -> bool {
        matches!(self.status, AccountStatus::Active)
    }

    pub fn is_active_administrator(&self) -> bool {
        self.role == UserRole::Administrator && self.is_active()
    }

    /// 冻结为会话内的身份快照
    pub fn into_details(self) -> ParticipantDetails {
        ParticipantDetails {
            display_name: self.display_name,
            photo_url: self.photo_url,
            email: self.email,
            role: Some(self.role.as_str().to_string()),
            company_id: self.company_id,
            company_name: self.company_name,
        }
    }
}

/// 创建会话请求
#[derive(Debug, Clone)]
pub struct CreateConversationRequest {
    pub conversation_type: ConversationType,
    pub participant_ids: Vec<String>,
    pub creator_id: String,
    /// 可选的首条消息内容
    pub initial_message: Option<String>,
    pub metadata: ConversationMetadata,
}

/// 发送消息请求
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// 联系表单询盘
#[derive(Debug, Clone)]
pub struct ContactInquiry {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    /// 路由类别，缺省为 `contact`
    pub tag: Option<String>,
    /// 已登录投递人的用户 id；None 表示匿名
    pub user_id: Option<String>,
}

/// 报价生命周期事件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteEventKind {
    Submitted,
    Accepted,
    Rejected,
}

impl QuoteEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteEventKind::Submitted => "submitted",
            QuoteEventKind::Accepted => "accepted",
            QuoteEventKind::Rejected => "rejected",
        }
    }
}

/// 报价生命周期事件
#[derive(Debug, Clone)]
pub struct QuoteEvent {
    pub kind: QuoteEventKind,
    pub request_id: String,
    pub quote_id: String,
    /// 询价单属主
    pub owner_id: String,
    /// 报价提交方
    pub submitter_id: String,
    pub product_name: Option<String>,
    pub unit_price: Option<f64>,
    pub currency: Option<String>,
    /// 拒绝原因（仅 Rejected 有意义），原文嵌入通知正文
    pub reason: Option<String>,
}
