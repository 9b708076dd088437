//! 会话仓储内存实现
//!
//! 所有计数变更都在同一把写锁内完成（单写者），满足未读计数的
//! 原子性要求；每次写入后在变更总线上发布会话事件。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use tradelink_storage_model::{
    ConversationDocument, ConversationMetadata, ConversationType, LastMessagePreview,
    ParticipantDetails,
};

use crate::domain::event::{ChangeBus, ChangeEvent};
use crate::domain::repository::ConversationRepository;

pub struct InMemoryConversationRepository {
    conversations: Arc<RwLock<HashMap<String, ConversationDocument>>>,
    bus: Arc<ChangeBus>,
}

impl InMemoryConversationRepository {
    pub fn new(bus: Arc<ChangeBus>) -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
            bus,
        }
    }

    fn publish(&self, conversation: &ConversationDocument) {
        self.bus.publish(ChangeEvent::Conversation {
            conversation_id: conversation.id.clone(),
            participants: conversation.participants.clone(),
        });
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn create(&self, conversation: &ConversationDocument) -> Result<()> {
        let mut map = self.conversations.write().await;
        map.insert(conversation.id.clone(), conversation.clone());
        drop(map);
        self.publish(conversation);
        Ok(())
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationDocument>> {
        let map = self.conversations.read().await;
        Ok(map.get(conversation_id).cloned())
    }

    async fn list_by_participant(&self, user_id: &str) -> Result<Vec<ConversationDocument>> {
        let map = self.conversations.read().await;
        let mut result: Vec<ConversationDocument> = map
            .values()
            .filter(|c| c.is_participant(user_id))
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(result)
    }

    async fn list_by_type(
        &self,
        conversation_type: ConversationType,
    ) -> Result<Vec<ConversationDocument>> {
        let map = self.conversations.read().await;
        let mut result: Vec<ConversationDocument> = map
            .values()
            .filter(|c| c.conversation_type == conversation_type)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(result)
    }

    async fn find_direct_by_participant(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationDocument>> {
        let map = self.conversations.read().await;
        Ok(map
            .values()
            .filter(|c| {
                c.conversation_type == ConversationType::Direct && c.is_participant(user_id)
            })
            .cloned()
            .collect())
    }

    async fn update_metadata(
        &self,
        conversation_id: &str,
        metadata: &ConversationMetadata,
    ) -> Result<()> {
        let mut map = self.conversations.write().await;
        let Some(conversation) = map.get_mut(conversation_id) else {
            debug!(conversation_id, "Conversation missing, metadata update is a no-op");
            return Ok(());
        };
        conversation.metadata = metadata.clone();
        conversation.updated_at = Utc::now();
        let snapshot = conversation.clone();
        drop(map);
        self.publish(&snapshot);
        Ok(())
    }

    async fn update_last_message(
        &self,
        conversation_id: &str,
        preview: &LastMessagePreview,
    ) -> Result<()> {
        let mut map = self.conversations.write().await;
        let Some(conversation) = map.get_mut(conversation_id) else {
            debug!(conversation_id, "Conversation missing, preview update is a no-op");
            return Ok(());
        };
        conversation.last_message = Some(preview.clone());
        conversation.updated_at = Utc::now();
        let snapshot = conversation.clone();
        drop(map);
        self.publish(&snapshot);
        Ok(())
    }

    async fn increment_unread(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        let mut map = self.conversations.write().await;
        let Some(conversation) = map.get_mut(conversation_id) else {
            debug!(conversation_id, "Conversation missing, unread increment is a no-op");
            return Ok(());
        };
        // unread_count 的键必须是参与者
        if !conversation.is_participant(user_id) {
            debug!(conversation_id, user_id, "Not a participant, unread increment skipped");
            return Ok(());
        }
        *conversation
            .unread_count
            .entry(user_id.to_string())
            .or_insert(0) += 1;
        let snapshot = conversation.clone();
        drop(map);
        self.publish(&snapshot);
        Ok(())
    }

    async fn reset_unread(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        let mut map = self.conversations.write().await;
        let Some(conversation) = map.get_mut(conversation_id) else {
            debug!(conversation_id, "Conversation missing, unread reset is a no-op");
            return Ok(());
        };
        if !conversation.is_participant(user_id) {
            return Ok(());
        }
        conversation.unread_count.insert(user_id.to_string(), 0);
        let snapshot = conversation.clone();
        drop(map);
        self.publish(&snapshot);
        Ok(())
    }

    async fn add_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
        details: Option<ParticipantDetails>,
    ) -> Result<()> {
        let mut map = self.conversations.write().await;
        let Some(conversation) = map.get_mut(conversation_id) else {
            debug!(conversation_id, "Conversation missing, add-participant is a no-op");
            return Ok(());
        };
        if !conversation.is_participant(user_id) {
            conversation.participants.push(user_id.to_string());
            conversation.unread_count.insert(user_id.to_string(), 0);
        }
        if let Some(details) = details {
            conversation
                .participant_details
                .insert(user_id.to_string(), details);
        }
        conversation.updated_at = Utc::now();
        let snapshot = conversation.clone();
        drop(map);
        self.publish(&snapshot);
        Ok(())
    }
}
