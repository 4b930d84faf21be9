use crate::core::rooms::{RoomError, RoomStore, TempRoom};
use crate::infra::json_file::{JsonFile, JsonFileError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Rooms keyed by voice channel id.
pub struct JsonRoomStore {
    file: JsonFile<HashMap<u64, TempRoom>>,
}

impl JsonRoomStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, JsonFileError> {
        Ok(Self {
            file: JsonFile::open(path)?,
        })
    }
}

fn storage(e: JsonFileError) -> RoomError {
    RoomError::StorageError(e.to_string())
}

#[async_trait]
impl RoomStore for JsonRoomStore {
    async fn get(&self, channel_id: u64) -> Result<Option<TempRoom>, RoomError> {
        Ok(self.file.read(|m| m.get(&channel_id).cloned()).await)
    }

    async fn save(&self, room: TempRoom) -> Result<(), RoomError> {
        self.file
            .update(move |m| {
                m.insert(room.channel_id, room);
            })
            .await
            .map_err(storage)
    }

    async fn remove(&self, channel_id: u64) -> Result<Option<TempRoom>, RoomError> {
        self.file
            .update(move |m| m.remove(&channel_id))
            .await
            .map_err(storage)
    }

    async fn all(&self) -> Result<Vec<TempRoom>, RoomError> {
        Ok(self.file.read(|m| m.values().cloned().collect()).await)
    }
}
