//! 会话仓储 MongoDB 实现
//!
//! 未读计数通过 `$inc` 原子累加，过滤条件同时约束参与者成员资格，
//! 保证 unread_count 的键只会是参与者。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};
use tracing::warn;

use tradelink_core::utils::current_millis;
use tradelink_storage_model::{
    ConversationDocument, ConversationMetadata, ConversationType, LastMessagePreview,
    ParticipantDetails,
};

use crate::domain::event::{ChangeBus, ChangeEvent};
use crate::domain::repository::ConversationRepository;

pub struct MongoConversationStore {
    collection: Collection<Document>,
    bus: Arc<ChangeBus>,
}

impl MongoConversationStore {
    pub async fn new(database: &Database, collection_name: &str, bus: Arc<ChangeBus>) -> Result<Self> {
        let collection = database.collection::<Document>(collection_name);
        ensure_indexes(&collection).await?;
        Ok(Self { collection, bus })
    }

    fn decode(document: Document) -> Result<ConversationDocument> {
        Ok(bson::from_document(document)?)
    }

    async fn find_all(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<ConversationDocument>> {
        let cursor = self.collection.find(filter, options).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        documents.into_iter().map(Self::decode).collect()
    }

    /// 变更后重新读取并发布事件；读取失败只记录，不影响写入结果
    async fn publish_change(&self, conversation_id: &str) {
        match self.collection.find_one(doc! {"id": conversation_id}, None).await {
            Ok(Some(document)) => match Self::decode(document) {
                Ok(conversation) => self.bus.publish(ChangeEvent::Conversation {
                    conversation_id: conversation.id,
                    participants: conversation.participants,
                }),
                Err(err) => warn!(
                    conversation_id,
                    error = %err,
                    "Failed to decode conversation for change event"
                ),
            },
            Ok(None) => {}
            Err(err) => warn!(
                conversation_id,
                error = %err,
                "Failed to load conversation for change event"
            ),
        }
    }
}

async fn ensure_indexes(collection: &Collection<Document>) -> Result<()> {
    let id_index = IndexModel::builder()
        .keys(doc! {"id": 1})
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(Some("uid_conversation".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(id_index, None::<mongodb::options::CreateIndexOptions>)
        .await?;

    let participant_index = IndexModel::builder()
        .keys(doc! {"participants": 1, "updated_at": -1})
        .options(
            IndexOptions::builder()
                .name(Some("idx_participant_updated".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(participant_index, None::<mongodb::options::CreateIndexOptions>)
        .await?;

    let type_index = IndexModel::builder()
        .keys(doc! {"conversation_type": 1, "updated_at": -1})
        .options(
            IndexOptions::builder()
                .name(Some("idx_type_updated".to_string()))
                .build(),
        )
        .build();
    collection
        .create_index(type_index, None::<mongodb::options::CreateIndexOptions>)
        .await?;

    Ok(())
}

#[async_trait]
impl ConversationRepository for MongoConversationStore {
    async fn create(&self, conversation: &ConversationDocument) -> Result<()> {
        let document = bson::to_document(conversation)?;
        let filter = doc! {"id": &conversation.id};
        let update = doc! {"$set": document};
        let options = UpdateOptions::builder().upsert(true).build();
        self.collection.update_one(filter, update, options).await?;
        self.bus.publish(ChangeEvent::Conversation {
            conversation_id: conversation.id.clone(),
            participants: conversation.participants.clone(),
        });
        Ok(())
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationDocument>> {
        let document = self
            .collection
            .find_one(doc! {"id": conversation_id}, None)
            .await?;
        document.map(Self::decode).transpose()
    }

    async fn list_by_participant(&self, user_id: &str) -> Result<Vec<ConversationDocument>> {
        let options = FindOptions::builder()
            .sort(doc! {"updated_at": -1, "id": -1})
            .build();
        self.find_all(doc! {"participants": user_id}, Some(options))
            .await
    }

    async fn list_by_type(
        &self,
        conversation_type: ConversationType,
    ) -> Result<Vec<ConversationDocument>> {
        let options = FindOptions::builder()
            .sort(doc! {"updated_at": -1, "id": -1})
            .build();
        self.find_all(
            doc! {"conversation_type": conversation_type.as_str()},
            Some(options),
        )
        .await
    }

    async fn find_direct_by_participant(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationDocument>> {
        self.find_all(
            doc! {"conversation_type": ConversationType::Direct.as_str(), "participants": user_id},
            None,
        )
        .await
    }

    async fn update_metadata(
        &self,
        conversation_id: &str,
        metadata: &ConversationMetadata,
    ) -> Result<()> {
        let update = doc! {"$set": {
            "metadata": bson::to_bson(metadata)?,
            "updated_at": current_millis(),
        }};
        self.collection
            .update_one(doc! {"id": conversation_id}, update, None)
            .await?;
        self.publish_change(conversation_id).await;
        Ok(())
    }

    async fn update_last_message(
        &self,
        conversation_id: &str,
        preview: &LastMessagePreview,
    ) -> Result<()> {
        let update = doc! {"$set": {
            "last_message": bson::to_bson(preview)?,
            "updated_at": current_millis(),
        }};
        self.collection
            .update_one(doc! {"id": conversation_id}, update, None)
            .await?;
        self.publish_change(conversation_id).await;
        Ok(())
    }

    async fn increment_unread(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        // 原子 $inc；participants 过滤保证只给参与者计数
        let filter = doc! {"id": conversation_id, "participants": user_id};
        let update = doc! {"$inc": {format!("unread_count.{}", user_id): 1}};
        self.collection.update_one(filter, update, None).await?;
        self.publish_change(conversation_id).await;
        Ok(())
    }

    async fn reset_unread(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        let filter = doc! {"id": conversation_id, "participants": user_id};
        let update = doc! {"$set": {format!("unread_count.{}", user_id): 0}};
        self.collection.update_one(filter, update, None).await?;
        self.publish_change(conversation_id).await;
        Ok(())
    }

    async fn add_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
        details: Option<ParticipantDetails>,
    ) -> Result<()> {
        let update = doc! {
            "$addToSet": {"participants": user_id},
            "$set": {"updated_at": current_millis()},
        };
        self.collection
            .update_one(doc! {"id": conversation_id}, update, None)
            .await?;

        // 只为新参与者播种计数，重复加入不得清零既有未读
        let seed_filter = doc! {
            "id": conversation_id,
            format!("unread_count.{}", user_id): {"$exists": false},
        };
        let seed_update = doc! {"$set": {format!("unread_count.{}", user_id): 0}};
        self.collection
            .update_one(seed_filter, seed_update, None)
            .await?;

        if let Some(details) = details {
            let detail_update = doc! {"$set": {
                format!("participant_details.{}", user_id): bson::to_bson(&details)?,
            }};
            self.collection
                .update_one(doc! {"id": conversation_id}, detail_update, None)
                .await?;
        }

        self.publish_change(conversation_id).await;
        Ok(())
    }
}
