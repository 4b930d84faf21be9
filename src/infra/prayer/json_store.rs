use crate::core::prayer::{PrayerConfig, PrayerConfigStore, PrayerError};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct JsonPrayerConfigStore {
    file: JsonFile<HashMap<u64, PrayerConfig>>,
}

impl JsonPrayerConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

fn storage(e: JsonFileError) -> PrayerError {
    PrayerError::StorageError(e.to_string())
}

#[async_trait]
impl PrayerConfigStore for JsonPrayerConfigStore {
    async fn get(&self, guild_id: u64) -> Result<Option<PrayerConfig>, PrayerError> {
        Ok(self.file.read(|m| m.get(&guild_id).cloned()).await)
    }

    async fn save(&self, config: PrayerConfig) -> Result<(), PrayerError> {
        self.file
            .update(move |m| {
                m.insert(config.guild_id, config);
            })
            .await
            .map_err(storage)
    }

    async fn remove(&self, guild_id: u64) -> Result<bool, PrayerError> {
        self.file
            .update(move |m| m.remove(&guild_id).is_some())
            .await
            .map_err(storage)
    }

    async fn all(&self) -> Result<Vec<PrayerConfig>, PrayerError> {
        Ok(self.file.read(|m| m.values().cloned().collect()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn older_files_get_default_method() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prayer.json");
        std::fs::write(
            &path,
            r#"{"5":{"guild_id":5,"channel_id":6,"city":"Riyadh","country":"SA","mention_role_id":null,"enabled":true}}"#,
        )
        .unwrap();

        let store = JsonPrayerConfigStore::new(&path).unwrap();
        let config = store.get(5).await.unwrap().unwrap();
        assert_eq!(config.method, crate::core::prayer::DEFAULT_METHOD);
        assert_eq!(config.lead_minutes, 0);

        assert!(store.remove(5).await.unwrap());
        assert!(store.all().await.unwrap().is_empty());
    }
}
