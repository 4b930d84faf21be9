use crate::core::down::{DownError, DownRecord, DownStore};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DownFile {
    next_id: u64,
    downs: Vec<DownRecord>,
}

pub struct JsonDownStore {
    file: JsonFile<DownFile>,
}

impl JsonDownStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

fn storage(e: JsonFileError) -> DownError {
    DownError::StorageError(e.to_string())
}

#[async_trait]
impl DownStore for JsonDownStore {
    async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<DownRecord>, DownError> {
        Ok(self
            .file
            .read(|f| {
                f.downs
                    .iter()
                    .find(|d| d.guild_id == guild_id && d.user_id == user_id)
                    .cloned()
            })
            .await)
    }

    async fn all(&self) -> Result<Vec<DownRecord>, DownError> {
        Ok(self.file.read(|f| f.downs.clone()).await)
    }

    async fn insert(&self, mut record: DownRecord) -> Result<DownRecord, DownError> {
        self.file
            .update(move |f| {
                f.next_id += 1;
                record.id = f.next_id;
                f.downs.push(record.clone());
                record
            })
            .await
            .map_err(storage)
    }

    async fn update(&self, record: DownRecord) -> Result<(), DownError> {
        self.file
            .update(move |f| {
                if let Some(existing) = f.downs.iter_mut().find(|d| d.id == record.id) {
                    *existing = record;
                }
            })
            .await
            .map_err(storage)
    }

    async fn remove(&self, guild_id: u64, user_id: u64) -> Result<Option<DownRecord>, DownError> {
        self.file
            .update(move |f| {
                let index = f
                    .downs
                    .iter()
                    .position(|d| d.guild_id == guild_id && d.user_id == user_id)?;
                Some(f.downs.remove(index))
            })
            .await
            .map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(user_id: u64) -> DownRecord {
        DownRecord {
            id: 0,
            guild_id: 1,
            user_id,
            removed_role_ids: vec![100],
            reason: "break".into(),
            moderator_id: 9,
            started_at: Utc::now(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn ids_keep_counting_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("downs.json");

        let store = JsonDownStore::new(&path).unwrap();
        assert_eq!(store.insert(record(10)).await.unwrap().id, 1);
        assert_eq!(store.insert(record(11)).await.unwrap().id, 2);
        store.remove(1, 11).await.unwrap();

        let reopened = JsonDownStore::new(&path).unwrap();
        assert_eq!(reopened.insert(record(12)).await.unwrap().id, 3);
        assert_eq!(reopened.get(1, 10).await.unwrap().unwrap().removed_role_ids, vec![100]);
        assert!(reopened.get(1, 11).await.unwrap().is_none());
        assert_eq!(reopened.all().await.unwrap().len(), 2);
    }
}
