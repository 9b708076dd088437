//! 参与者目录客户端
//!
//! 用户身份存储是外部协作方，这里只做只读访问：MongoDB 用户集合
//! 实现用于生产部署，静态目录用于测试与内存后端。

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Document, doc, from_document};
use mongodb::{Collection, Database};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::model::{AccountStatus, ParticipantProfile, UserRole};
use crate::domain::repository::ParticipantDirectory;

/// 用户集合里的原始记录（字段名随用户服务的存储格式）
#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    company_logo: Option<String>,
    #[serde(default)]
    email: Option<String>,
    role: UserRole,
    #[serde(default = "default_status")]
    status: AccountStatus,
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
}

fn default_status() -> AccountStatus {
    AccountStatus::Active
}

impl UserRecord {
    fn into_profile(self) -> ParticipantProfile {
        let display_name = self.display_name.unwrap_or_else(|| self.id.clone());
        ParticipantProfile {
            user_id: self.id,
            display_name,
            // 个人头像缺失时回落到公司 logo
            photo_url: self.photo_url.or(self.company_logo),
            email: self.email,
            role: self.role,
            status: self.status,
            company_id: self.company_id,
            company_name: self.company_name,
        }
    }
}

/// MongoDB 用户集合目录实现
pub struct MongoParticipantDirectory {
    collection: Collection<Document>,
}

impl MongoParticipantDirectory {
    pub fn new(database: &Database, collection_name: &str) -> Self {
        Self {
            collection: database.collection::<Document>(collection_name),
        }
    }
}

#[async_trait]
impl ParticipantDirectory for MongoParticipantDirectory {
    async fn get_by_id(&self, user_id: &str) -> Result<Option<ParticipantProfile>> {
        let document = self.collection.find_one(doc! {"id": user_id}, None).await?;
        document
            .map(|d| Ok(from_document::<UserRecord>(d)?.into_profile()))
            .transpose()
    }

    async fn list_administrators(&self) -> Result<Vec<ParticipantProfile>> {
        let filter = doc! {
            "role": UserRole::Administrator.as_str(),
            "status": {"$nin": [AccountStatus::Suspended.as_str(), AccountStatus::Deleted.as_str()]},
        };
        let cursor = self.collection.find(filter, None).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        documents
            .into_iter()
            .map(|d| Ok(from_document::<UserRecord>(d)?.into_profile()))
            .collect()
    }
}

/// 静态目录实现（测试与内存后端）
#[derive(Default)]
pub struct StaticParticipantDirectory {
    profiles: RwLock<HashMap<String, ParticipantProfile>>,
}

impl StaticParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: ParticipantProfile) {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ParticipantDirectory for StaticParticipantDirectory {
    async fn get_by_id(&self, user_id: &str) -> Result<Option<ParticipantProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(user_id).cloned())
    }

    async fn list_administrators(&self) -> Result<Vec<ParticipantProfile>> {
        let profiles = self.profiles.read().await;
        let mut admins: Vec<ParticipantProfile> = profiles
            .values()
            .filter(|profile| profile.is_active_administrator())
            .cloned()
            .collect();
        admins.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(admins)
    }
}
