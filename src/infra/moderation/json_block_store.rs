use crate::core::moderation::{BlockEntry, BlockStore, ModerationError};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct JsonBlockStore {
    file: JsonFile<Vec<BlockEntry>>,
}

impl JsonBlockStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

fn storage(e: JsonFileError) -> ModerationError {
    ModerationError::StorageError(e.to_string())
}

#[async_trait]
impl BlockStore for JsonBlockStore {
    async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<BlockEntry>, ModerationError> {
        Ok(self
            .file
            .read(|list| {
                list.iter()
                    .find(|e| e.guild_id == guild_id && e.user_id == user_id)
                    .cloned()
            })
            .await)
    }

    async fn insert(&self, entry: BlockEntry) -> Result<(), ModerationError> {
        self.file
            .update(move |list| list.push(entry))
            .await
            .map_err(storage)
    }

    async fn remove(&self, guild_id: u64, user_id: u64) -> Result<bool, ModerationError> {
        self.file
            .update(move |list| {
                let before = list.len();
                list.retain(|e| !(e.guild_id == guild_id && e.user_id == user_id));
                list.len() != before
            })
            .await
            .map_err(storage)
    }

    async fn list(&self, guild_id: u64) -> Result<Vec<BlockEntry>, ModerationError> {
        Ok(self
            .file
            .read(|list| {
                list.iter()
                    .filter(|e| e.guild_id == guild_id)
                    .cloned()
                    .collect()
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn blocks_are_scoped_per_guild() {
        let dir = tempdir().unwrap();
        let store = JsonBlockStore::new(dir.path().join("blocks.json")).unwrap();
        for guild_id in [1, 2] {
            store
                .insert(BlockEntry {
                    guild_id,
                    user_id: 10,
                    reason: String::new(),
                    blocked_by: 9,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        assert!(store.remove(1, 10).await.unwrap());
        assert!(store.get(1, 10).await.unwrap().is_none());
        assert_eq!(store.list(2).await.unwrap().len(), 1);
    }
}
