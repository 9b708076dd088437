//! 通知仓储内存实现

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use tradelink_storage_model::NotificationDocument;

use crate::domain::event::{ChangeBus, ChangeEvent};
use crate::domain::repository::NotificationRepository;

#[derive(Default)]
struct NotificationStoreState {
    by_owner: HashMap<String, Vec<NotificationDocument>>,
    owner_of: HashMap<String, String>,
}

pub struct InMemoryNotificationRepository {
    state: Arc<RwLock<NotificationStoreState>>,
    bus: Arc<ChangeBus>,
}

impl InMemoryNotificationRepository {
    pub fn new(bus: Arc<ChangeBus>) -> Self {
        Self {
            state: Arc::new(RwLock::new(NotificationStoreState::default())),
            bus,
        }
    }

    fn publish(&self, user_id: &str) {
        self.bus.publish(ChangeEvent::Notification {
            user_id: user_id.to_string(),
        });
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, notification: &NotificationDocument) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .owner_of
            .insert(notification.id.clone(), notification.user_id.clone());
        state
            .by_owner
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.clone());
        drop(state);
        self.publish(&notification.user_id);
        Ok(())
    }

    async fn create_many(&self, notifications: &[NotificationDocument]) -> Result<usize> {
        // 每条独立写入：单条失败只记录并跳过，不影响其余接收者
        let mut created = 0;
        for notification in notifications {
            match self.create(notification).await {
                Ok(()) => created += 1,
                Err(err) => warn!(
                    notification_id = %notification.id,
                    user_id = %notification.user_id,
                    error = %err,
                    "Failed to create notification in batch, skipping"
                ),
            }
        }
        Ok(created)
    }

    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<NotificationDocument>> {
        let state = self.state.read().await;
        let mut result = state.by_owner.get(user_id).cloned().unwrap_or_default();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn list_unread_by_owner(&self, user_id: &str) -> Result<Vec<NotificationDocument>> {
        let all = self.list_by_owner(user_id).await?;
        Ok(all.into_iter().filter(|n| !n.is_read).collect())
    }

    async fn mark_read(&self, notification_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(user_id) = state.owner_of.get(notification_id).cloned() else {
            debug!(notification_id, "Notification missing, mark-read is a no-op");
            return Ok(());
        };
        let changed = state
            .by_owner
            .get_mut(&user_id)
            .and_then(|list| list.iter_mut().find(|n| n.id == notification_id))
            .map(|notification| {
                let was_unread = !notification.is_read;
                notification.is_read = true;
                was_unread
            })
            .unwrap_or(false);
        drop(state);
        if changed {
            self.publish(&user_id);
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut flipped = 0u64;
        if let Some(list) = state.by_owner.get_mut(user_id) {
            for notification in list.iter_mut().filter(|n| !n.is_read) {
                notification.is_read = true;
                flipped += 1;
            }
        }
        drop(state);
        if flipped > 0 {
            self.publish(user_id);
        }
        Ok(flipped)
    }

    async fn delete(&self, notification_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(user_id) = state.owner_of.remove(notification_id) else {
            debug!(notification_id, "Notification missing, delete is a no-op");
            return Ok(());
        };
        if let Some(list) = state.by_owner.get_mut(&user_id) {
            list.retain(|n| n.id != notification_id);
        }
        drop(state);
        self.publish(&user_id);
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        let removed = state.by_owner.remove(user_id).unwrap_or_default();
        for notification in &removed {
            state.owner_of.remove(&notification.id);
        }
        drop(state);
        if !removed.is_empty() {
            self.publish(user_id);
        }
        Ok(removed.len() as u64)
    }
}
