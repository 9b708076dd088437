//! 通知仓储 MongoDB 实现

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};
use tracing::warn;

use tradelink_storage_model::NotificationDocument;

use crate::domain::event::{ChangeBus, ChangeEvent};
use crate::domain::repository::NotificationRepository;

pub struct MongoNotificationStore {
    collection: Collection<Document>,
    bus: Arc<ChangeBus>,
}

impl MongoNotificationStore {
    pub async fn new(database: &Database, collection_name: &str, bus: Arc<ChangeBus>) -> Result<Self> {
        let collection = database.collection::<Document>(collection_name);
        ensure_indexes(&collection).await?;
        Ok(Self { collection, bus })
    }

    fn decode(document: Document) -> Result<NotificationDocument> {
        Ok(bson::from_document(document)?)
    }

    async fn find_all(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<NotificationDocument>> {
        let cursor = self.collection.find(filter, options).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        documents.into_iter().map(Self::decode).collect()
    }

    fn publish(&self, user_id: &str) {
        self.bus.publish(ChangeEvent::Notification {
            user_id: user_id.to_string(),
        });
    }
}

async fn ensure_indexes(collection: &Collection<Document>) -> Result<()> {
    let id_index = IndexModel::builder()
        .keys(doc! {"id": 1})
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(Some("uid_notification".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(id_index, None::<mongodb::options::CreateIndexOptions>)
        .await?;

    let owner_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "created_at": -1})
        .options(
            IndexOptions::builder()
                .name(Some("idx_owner_created".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(owner_index, None::<mongodb::options::CreateIndexOptions>)
        .await?;

    Ok(())
}

#[async_trait]
impl NotificationRepository for MongoNotificationStore {
    async fn create(&self, notification: &NotificationDocument) -> Result<()> {
        let document = bson::to_document(notification)?;
        let filter = doc! {"id": &notification.id};
        let update = doc! {"$set": document};
        let options = UpdateOptions::builder().upsert(true).build();
        self.collection.update_one(filter, update, options).await?;
        self.publish(&notification.user_id);
        Ok(())
    }

    async fn create_many(&self, notifications: &[NotificationDocument]) -> Result<usize> {
        // 每条独立写入：单条失败只记录并跳过，不回滚其余接收者
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
        let options = FindOptions::builder()
            .sort(doc! {"created_at": -1})
            .build();
        self.find_all(doc! {"user_id": user_id}, Some(options)).await
    }

    async fn list_unread_by_owner(&self, user_id: &str) -> Result<Vec<NotificationDocument>> {
        let options = FindOptions::builder()
            .sort(doc! {"created_at": -1})
            .build();
        self.find_all(doc! {"user_id": user_id, "is_read": false}, Some(options))
            .await
    }

    async fn mark_read(&self, notification_id: &str) -> Result<()> {
        let filter = doc! {"id": notification_id, "is_read": false};
        let update = doc! {"$set": {"is_read": true}};
        let result = self.collection.update_one(filter, update, None).await?;
        if result.modified_count > 0 {
            if let Ok(Some(document)) = self
                .collection
                .find_one(doc! {"id": notification_id}, None)
                .await
            {
                if let Ok(notification) = Self::decode(document) {
                    self.publish(&notification.user_id);
                }
            }
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let filter = doc! {"user_id": user_id, "is_read": false};
        let update = doc! {"$set": {"is_read": true}};
        let result = self.collection.update_many(filter, update, None).await?;
        if result.modified_count > 0 {
            self.publish(user_id);
        }
        Ok(result.modified_count)
    }

    async fn delete(&self, notification_id: &str) -> Result<()> {
        let Some(document) = self
            .collection
            .find_one(doc! {"id": notification_id}, None)
            .await?
        else {
            return Ok(());
        };
        let notification = Self::decode(document)?;
        self.collection
            .delete_one(doc! {"id": notification_id}, None)
            .await?;
        self.publish(&notification.user_id);
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<u64> {
        let result = self.collection.delete_many(doc! {"user_id": user_id}, None).await?;
        if result.deleted_count > 0 {
            self.publish(user_id);
        }
        Ok(result.deleted_count)
    }
}
