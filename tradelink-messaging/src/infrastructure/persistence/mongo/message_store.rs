//! 消息仓储 MongoDB 实现
//!
//! 已读回执用带条件的 `$push` 追加：过滤条件排除已含该用户的回执，
//! 天然幂等且只增不减。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};

use tradelink_storage_model::MessageDocument;

use crate::domain::event::{ChangeBus, ChangeEvent};
use crate::domain::repository::MessageRepository;

pub struct MongoMessageStore {
    collection: Collection<Document>,
    bus: Arc<ChangeBus>,
}

impl MongoMessageStore {
    pub async fn new(database: &Database, collection_name: &str, bus: Arc<ChangeBus>) -> Result<Self> {
        let collection = database.collection::<Document>(collection_name);
        ensure_indexes(&collection).await?;
        Ok(Self { collection, bus })
    }

    fn decode(document: Document) -> Result<MessageDocument> {
        Ok(bson::from_document(document)?)
    }

    async fn find_all(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<MessageDocument>> {
        let cursor = self.collection.find(filter, options).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        documents.into_iter().map(Self::decode).collect()
    }

    fn publish(&self, conversation_id: &str) {
        self.bus.publish(ChangeEvent::Message {
            conversation_id: conversation_id.to_string(),
        });
    }
}

async fn ensure_indexes(collection: &Collection<Document>) -> Result<()> {
    let id_index = IndexModel::builder()
        .keys(doc! {"id": 1})
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(Some("uid_message".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(id_index, None::<mongodb::options::CreateIndexOptions>)
        .await?;

    let thread_index = IndexModel::builder()
        .keys(doc! {"conversation_id": 1, "created_at": 1, "id": 1})
        .options(
            IndexOptions::builder()
                .name(Some("idx_conversation_created".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(thread_index, None::<mongodb::options::CreateIndexOptions>)
        .await?;

    Ok(())
}

#[async_trait]
impl MessageRepository for MongoMessageStore {
    async fn create(&self, message: &MessageDocument) -> Result<()> {
        let document = bson::to_document(message)?;
        let filter = doc! {"id": &message.id};
        let update = doc! {"$set": document};
        let options = UpdateOptions::builder().upsert(true).build();
        self.collection.update_one(filter, update, options).await?;
        self.publish(&message.conversation_id);
        Ok(())
    }

    async fn get(&self, message_id: &str) -> Result<Option<MessageDocument>> {
        let document = self.collection.find_one(doc! {"id": message_id}, None).await?;
        document.map(Self::decode).transpose()
    }

    async fn list(&self, conversation_id: &str) -> Result<Vec<MessageDocument>> {
        // id 为 ULID，作为同一毫秒内的插入顺序决胜键
        let options = FindOptions::builder()
            .sort(doc! {"created_at": 1, "id": 1})
            .build();
        self.find_all(doc! {"conversation_id": conversation_id}, Some(options))
            .await
    }

    async fn list_recent(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageDocument>> {
        let options = FindOptions::builder()
            .sort(doc! {"created_at": -1, "id": -1})
            .limit(limit as i64)
            .build();
        self.find_all(doc! {"conversation_id": conversation_id}, Some(options))
            .await
    }

    async fn list_unread(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Vec<MessageDocument>> {
        let options = FindOptions::builder()
            .sort(doc! {"created_at": 1, "id": 1})
            .build();
        self.find_all(
            doc! {
                "conversation_id": conversation_id,
                "read_by.user_id": {"$ne": user_id},
            },
            Some(options),
        )
        .await
    }

    async fn mark_read(
        &self,
        message_id: &str,
        user_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<bool> {
        let filter = doc! {"id": message_id, "read_by.user_id": {"$ne": user_id}};
        let update = doc! {"$push": {"read_by": {
            "user_id": user_id,
            "read_at": read_at.timestamp_millis(),
        }}};
        let result = self.collection.update_one(filter, update, None).await?;
        let changed = result.modified_count > 0;
        if changed {
            if let Ok(Some(message)) = self.get(message_id).await {
                self.publish(&message.conversation_id);
            }
        }
        Ok(changed)
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        let Some(message) = self.get(message_id).await? else {
            return Ok(());
        };
        self.collection.delete_one(doc! {"id": message_id}, None).await?;
        self.publish(&message.conversation_id);
        Ok(())
    }
}
