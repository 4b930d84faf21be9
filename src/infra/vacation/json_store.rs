use crate::core::vacation::{Vacation, VacationError, VacationStore};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VacationFile {
    next_id: u64,
    vacations: Vec<Vacation>,
}

pub struct JsonVacationStore {
    file: JsonFile<VacationFile>,
}

impl JsonVacationStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

fn storage(e: JsonFileError) -> VacationError {
    VacationError::StorageError(e.to_string())
}

#[async_trait]
impl VacationStore for JsonVacationStore {
    async fn insert(&self, mut vacation: Vacation) -> Result<Vacation, VacationError> {
        self.file
            .update(move |f| {
                f.next_id += 1;
                vacation.id = f.next_id;
                f.vacations.push(vacation.clone());
                vacation
            })
            .await
            .map_err(storage)
    }

    async fn get(&self, id: u64) -> Result<Option<Vacation>, VacationError> {
        Ok(self
            .file
            .read(|f| f.vacations.iter().find(|v| v.id == id).cloned())
            .await)
    }

    async fn update(&self, vacation: Vacation) -> Result<(), VacationError> {
        self.file
            .update(move |f| {
                if let Some(existing) = f.vacations.iter_mut().find(|v| v.id == vacation.id) {
                    *existing = vacation;
                }
            })
            .await
            .map_err(storage)
    }

    async fn all(&self) -> Result<Vec<Vacation>, VacationError> {
        Ok(self.file.read(|f| f.vacations.clone()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vacation::VacationStatus;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn vacations_persist_with_status() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vacations.json");
        let store = JsonVacationStore::new(&path).unwrap();

        let mut vacation = store
            .insert(Vacation {
                id: 0,
                guild_id: 1,
                user_id: 10,
                reason: "travel".into(),
                days: 4,
                requested_at: Utc::now(),
                starts_at: None,
                ends_at: None,
                status: VacationStatus::Pending,
                decided_by: None,
                decision_note: None,
                held_role_ids: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(vacation.id, 1);

        vacation.status = VacationStatus::Active;
        vacation.held_role_ids = vec![100];
        store.update(vacation).await.unwrap();

        let reopened = JsonVacationStore::new(&path).unwrap();
        let loaded = reopened.get(1).await.unwrap().unwrap();
        assert_eq!(loaded.status, VacationStatus::Active);
        assert_eq!(loaded.held_role_ids, vec![100]);
    }
}
