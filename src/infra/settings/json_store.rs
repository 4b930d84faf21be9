use crate::core::settings::{GuildSettings, SettingsError, SettingsStore};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct JsonSettingsStore {
    file: JsonFile<HashMap<u64, GuildSettings>>,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

fn storage(e: JsonFileError) -> SettingsError {
    SettingsError::StorageError(e.to_string())
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn get(&self, guild_id: u64) -> Result<Option<GuildSettings>, SettingsError> {
        Ok(self.file.read(|m| m.get(&guild_id).cloned()).await)
    }

    async fn save(&self, settings: GuildSettings) -> Result<(), SettingsError> {
        self.file
            .update(move |m| {
                m.insert(settings.guild_id, settings);
            })
            .await
            .map_err(storage)
    }

    async fn all(&self) -> Result<Vec<GuildSettings>, SettingsError> {
        Ok(self.file.read(|m| m.values().cloned().collect()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn settings_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = JsonSettingsStore::new(&path).unwrap();
        let mut settings = GuildSettings::defaults(42);
        settings.admin_role_ids = vec![7, 8];
        settings.timezone = "Europe/Berlin".into();
        store.save(settings.clone()).await.unwrap();

        let reopened = JsonSettingsStore::new(&path).unwrap();
        assert_eq!(reopened.get(42).await.unwrap(), Some(settings));
        assert_eq!(reopened.get(43).await.unwrap(), None);
        assert_eq!(reopened.all().await.unwrap().len(), 1);
    }
}
