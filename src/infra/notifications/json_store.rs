use crate::core::notifications::{NotificationError, NotificationPrefs, NotificationStore};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct JsonNotificationStore {
    file: JsonFile<HashMap<u64, NotificationPrefs>>,
}

impl JsonNotificationStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

#[async_trait]
impl NotificationStore for JsonNotificationStore {
    async fn get(&self, user_id: u64) -> Result<Option<NotificationPrefs>, NotificationError> {
        Ok(self.file.read(|m| m.get(&user_id).copied()).await)
    }

    async fn save(&self, user_id: u64, prefs: NotificationPrefs) -> Result<(), NotificationError> {
        self.file
            .update(move |m| {
                m.insert(user_id, prefs);
            })
            .await
            .map_err(|e| NotificationError::StorageError(e.to_string()))
    }
}
