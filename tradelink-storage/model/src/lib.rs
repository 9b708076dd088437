//! TradeLink 存储文档模型
//!
//! 会话、消息与通知三类持久化文档的统一定义，供内存与 MongoDB
//! 两种存储后端共享。时间戳一律以 UTC 毫秒序列化。

mod conversation;
mod message;
mod notification;

pub use conversation::{
    ConversationDocument, ConversationMetadata, ConversationType, LastMessagePreview,
    PREVIEW_MAX_CHARS, ParticipantDetails,
};
pub use message::{ANONYMOUS_SENDER, Attachment, MessageDocument, MessageType, ReadRecord, Sender};
pub use notification::{NotificationData, NotificationDocument, NotificationKind};
