use crate::core::promotion::{Promotion, PromotionBan, PromotionError, PromotionStore};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PromotionFile {
    next_id: u64,
    promotions: Vec<Promotion>,
    #[serde(default)]
    bans: Vec<PromotionBan>,
}

pub struct JsonPromotionStore {
    file: JsonFile<PromotionFile>,
}

impl JsonPromotionStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

fn storage(e: JsonFileError) -> PromotionError {
    PromotionError::StorageError(e.to_string())
}

#[async_trait]
impl PromotionStore for JsonPromotionStore {
    async fn insert(&self, mut promotion: Promotion) -> Result<Promotion, PromotionError> {
        self.file
            .update(move |f| {
                f.next_id += 1;
                promotion.id = f.next_id;
                f.promotions.push(promotion.clone());
                promotion
            })
            .await
            .map_err(storage)
    }

    async fn update(&self, promotion: Promotion) -> Result<(), PromotionError> {
        self.file
            .update(move |f| {
                if let Some(existing) = f.promotions.iter_mut().find(|p| p.id == promotion.id) {
                    *existing = promotion;
                }
            })
            .await
            .map_err(storage)
    }

    async fn all(&self) -> Result<Vec<Promotion>, PromotionError> {
        Ok(self.file.read(|f| f.promotions.clone()).await)
    }

    async fn get_ban(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<PromotionBan>, PromotionError> {
        Ok(self
            .file
            .read(|f| {
                f.bans
                    .iter()
                    .find(|b| b.guild_id == guild_id && b.user_id == user_id)
                    .cloned()
            })
            .await)
    }

    async fn save_ban(&self, ban: PromotionBan) -> Result<(), PromotionError> {
        self.file
            .update(move |f| {
                f.bans
                    .retain(|b| !(b.guild_id == ban.guild_id && b.user_id == ban.user_id));
                f.bans.push(ban);
            })
            .await
            .map_err(storage)
    }

    async fn remove_ban(&self, guild_id: u64, user_id: u64) -> Result<bool, PromotionError> {
        self.file
            .update(move |f| {
                let before = f.bans.len();
                f.bans
                    .retain(|b| !(b.guild_id == guild_id && b.user_id == user_id));
                f.bans.len() != before
            })
            .await
            .map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::promotion::PromotionStatus;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn promotions_and_bans_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("promotions.json");
        let store = JsonPromotionStore::new(&path).unwrap();
        let now = Utc::now();

        store
            .insert(Promotion {
                id: 0,
                guild_id: 1,
                user_id: 10,
                role_id: 500,
                replaced_role_id: None,
                promoted_by: 9,
                reason: "earned it".into(),
                created_at: now,
                expires_at: None,
                status: PromotionStatus::Active,
            })
            .await
            .unwrap();
        store
            .save_ban(PromotionBan {
                guild_id: 1,
                user_id: 11,
                reason: "spam".into(),
                banned_by: 9,
                created_at: now,
                expires_at: None,
            })
            .await
            .unwrap();

        let reopened = JsonPromotionStore::new(&path).unwrap();
        assert_eq!(reopened.all().await.unwrap()[0].id, 1);
        assert!(reopened.get_ban(1, 11).await.unwrap().is_some());
        assert!(reopened.remove_ban(1, 11).await.unwrap());
        assert!(!reopened.remove_ban(1, 11).await.unwrap());
    }
}
