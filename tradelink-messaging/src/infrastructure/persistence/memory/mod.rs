//! 内存存储后端（测试与单机部署）

mod conversation_repository;
mod message_repository;
mod notification_repository;

pub use conversation_repository::InMemoryConversationRepository;
pub use message_repository::InMemoryMessageRepository;
pub use notification_repository::InMemoryNotificationRepository;
