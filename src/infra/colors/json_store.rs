use crate::core::colors::{ColorError, ColorRole, ColorStore};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct JsonColorStore {
    file: JsonFile<HashMap<u64, Vec<ColorRole>>>,
}

impl JsonColorStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

#[async_trait]
impl ColorStore for JsonColorStore {
    async fn roles(&self, guild_id: u64) -> Result<Vec<ColorRole>, ColorError> {
        Ok(self
            .file
            .read(|m| m.get(&guild_id).cloned().unwrap_or_default())
            .await)
    }

    async fn set_roles(&self, guild_id: u64, roles: Vec<ColorRole>) -> Result<(), ColorError> {
        self.file
            .update(move |m| {
                if roles.is_empty() {
                    m.remove(&guild_id);
                } else {
                    m.insert(guild_id, roles);
                }
            })
            .await
            .map_err(|e| ColorError::StorageError(e.to_string()))
    }
}
