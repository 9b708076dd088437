//! 消息仓储内存实现
//!
//! 每个会话一个插入序列表；`created_at` 相同的消息按插入顺序排序。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use tradelink_storage_model::MessageDocument;

use crate::domain::event::{ChangeBus, ChangeEvent};
use crate::domain::repository::MessageRepository;

#[derive(Default)]
struct MessageStoreState {
    by_conversation: HashMap<String, Vec<MessageDocument>>,
    conversation_of: HashMap<String, String>,
}

pub struct InMemoryMessageRepository {
    state: Arc<RwLock<MessageStoreState>>,
    bus: Arc<ChangeBus>,
}

impl InMemoryMessageRepository {
    pub fn new(bus: Arc<ChangeBus>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MessageStoreState::default())),
            bus,
        }
    }

    fn publish(&self, conversation_id: &str) {
        self.bus.publish(ChangeEvent::Message {
            conversation_id: conversation_id.to_string(),
        });
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: &MessageDocument) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .conversation_of
            .insert(message.id.clone(), message.conversation_id.clone());
        state
            .by_conversation
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        drop(state);
        self.publish(&message.conversation_id);
        Ok(())
    }

    async fn get(&self, message_id: &str) -> Result<Option<MessageDocument>> {
        let state = self.state.read().await;
        let Some(conversation_id) = state.conversation_of.get(message_id) else {
            return Ok(None);
        };
        Ok(state
            .by_conversation
            .get(conversation_id)
            .and_then(|thread| thread.iter().find(|m| m.id == message_id))
            .cloned())
    }

    async fn list(&self, conversation_id: &str) -> Result<Vec<MessageDocument>> {
        let state = self.state.read().await;
        let mut thread = state
            .by_conversation
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        // 稳定排序：同一毫秒内保持插入顺序
        thread.sort_by_key(|m| m.created_at);
        Ok(thread)
    }

    async fn list_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageDocument>> {
        let ascending = self.list(conversation_id).await?;
        Ok(ascending.into_iter().rev().take(limit).collect())
    }

    async fn list_unread(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Vec<MessageDocument>> {
        let ascending = self.list(conversation_id).await?;
        Ok(ascending
            .into_iter()
            .filter(|m| !m.is_read_by(user_id))
            .collect())
    }

    async fn mark_read(
        &self,
        message_id: &str,
        user_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(conversation_id) = state.conversation_of.get(message_id).cloned() else {
            debug!(message_id, "Message missing, mark-read is a no-op");
            return Ok(false);
        };
        let changed = state
            .by_conversation
            .get_mut(&conversation_id)
            .and_then(|thread| thread.iter_mut().find(|m| m.id == message_id))
            .map(|message| message.mark_read(user_id, read_at))
            .unwrap_or(false);
        drop(state);
        if changed {
            self.publish(&conversation_id);
        }
        Ok(changed)
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(conversation_id) = state.conversation_of.remove(message_id) else {
            debug!(message_id, "Message missing, delete is a no-op");
            return Ok(());
        };
        if let Some(thread) = state.by_conversation.get_mut(&conversation_id) {
            thread.retain(|m| m.id != message_id);
        }
        drop(state);
        self.publish(&conversation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradelink_storage_model::{MessageType, Sender};

    fn repo() -> InMemoryMessageRepository {
        InMemoryMessageRepository::new(Arc::new(ChangeBus::default()))
    }

    fn message(id: &str, sender: &str, content: &str) -> MessageDocument {
        MessageDocument::new(
            id,
            "conv_1",
            Sender::user(sender),
            sender,
            content,
            MessageType::Text,
        )
    }

    #[tokio::test]
    async fn list_preserves_insertion_order_for_ties() {
        let repo = repo();
        let now = Utc::now();
        for index in 0..5 {
            let mut msg = message(&format!("msg_{}", index), "u1", "tick");
            // 同一时间戳，靠插入顺序决胜
            msg.created_at = now;
            repo.create(&msg).await.expect("create");
        }
        let listed = repo.list("conv_1").await.expect("list");
        let ids: Vec<&str> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["msg_0", "msg_1", "msg_2", "msg_3", "msg_4"]);
    }

    #[tokio::test]
    async fn mark_read_is_idempotent_and_monotonic() {
        let repo = repo();
        repo.create(&message("msg_1", "u1", "hello")).await.expect("create");

        assert!(repo.mark_read("msg_1", "u2", Utc::now()).await.expect("first"));
        assert!(!repo.mark_read("msg_1", "u2", Utc::now()).await.expect("second"));

        let stored = repo.get("msg_1").await.expect("get").expect("exists");
        assert_eq!(stored.read_by.len(), 1);
        assert!(stored.is_read_by("u2"));
    }

    #[tokio::test]
    async fn mark_read_on_missing_message_is_a_noop() {
        let repo = repo();
        assert!(!repo.mark_read("msg_missing", "u1", Utc::now()).await.expect("no-op"));
    }

    #[tokio::test]
    async fn list_recent_returns_newest_first() {
        let repo = repo();
        for index in 0..4 {
            let mut msg = message(&format!("msg_{}", index), "u1", "tick");
            msg.created_at = Utc::now() + chrono::Duration::milliseconds(index);
            repo.create(&msg).await.expect("create");
        }
        let recent = repo.list_recent("conv_1", 2).await.expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "msg_3");
        assert_eq!(recent[1].id, "msg_2");
    }

    #[tokio::test]
    async fn delete_removes_the_message() {
        let repo = repo();
        repo.create(&message("msg_1", "u1", "hello")).await.expect("create");
        repo.delete("msg_1").await.expect("delete");
        assert!(repo.get("msg_1").await.expect("get").is_none());
        assert!(repo.list("conv_1").await.expect("list").is_empty());
    }
}
