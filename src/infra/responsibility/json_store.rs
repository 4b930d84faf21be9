use crate::core::responsibility::{Responsibility, ResponsibilityError, ResponsibilityStore};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Responsibilities keyed by guild.
pub struct JsonResponsibilityStore {
    file: JsonFile<HashMap<u64, Vec<Responsibility>>>,
}

impl JsonResponsibilityStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

fn storage(e: JsonFileError) -> ResponsibilityError {
    ResponsibilityError::StorageError(e.to_string())
}

#[async_trait]
impl ResponsibilityStore for JsonResponsibilityStore {
    async fn list(&self, guild_id: u64) -> Result<Vec<Responsibility>, ResponsibilityError> {
        Ok(self
            .file
            .read(|m| m.get(&guild_id).cloned().unwrap_or_default())
            .await)
    }

    async fn save(
        &self,
        guild_id: u64,
        responsibility: Responsibility,
    ) -> Result<(), ResponsibilityError> {
        self.file
            .update(move |m| {
                let list = m.entry(guild_id).or_default();
                let key = responsibility.key();
                match list.iter_mut().find(|r| r.key() == key) {
                    Some(existing) => *existing = responsibility,
                    None => list.push(responsibility),
                }
            })
            .await
            .map_err(storage)
    }

    async fn delete(&self, guild_id: u64, name: &str) -> Result<bool, ResponsibilityError> {
        let key = name.trim().to_lowercase();
        self.file
            .update(move |m| {
                let Some(list) = m.get_mut(&guild_id) else {
                    return false;
                };
                let before = list.len();
                list.retain(|r| r.key() != key);
                list.len() != before
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

    fn responsibility(name: &str) -> Responsibility {
        Responsibility {
            name: name.into(),
            description: None,
            role_ids: vec![5],
            member_ids: vec![10],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_replaces_by_name_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("responsibilities.json");
        let store = JsonResponsibilityStore::new(&path).unwrap();

        store.save(1, responsibility("Support")).await.unwrap();
        let mut updated = responsibility("support");
        updated.member_ids = vec![10, 11];
        store.save(1, updated).await.unwrap();

        let reopened = JsonResponsibilityStore::new(&path).unwrap();
        let list = reopened.list(1).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].member_ids, vec![10, 11]);

        assert!(reopened.delete(1, " SUPPORT ").await.unwrap());
        assert!(!reopened.delete(1, "support").await.unwrap());
        assert!(!reopened.delete(2, "support").await.unwrap());
    }
}
