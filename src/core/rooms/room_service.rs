// Temporary voice rooms. Each member may own one room per guild; rooms are
// deleted once empty (immediately on leave, or by the sweeper after a
// grace period for rooms nobody joined).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_USER_LIMIT: u32 = 99;
const MAX_NAME_LEN: usize = 100;

/// How long an empty room survives before the sweeper removes it.
pub fn empty_grace() -> Duration {
    Duration::minutes(2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempRoom {
    pub guild_id: u64,
    pub channel_id: u64,
    pub owner_id: u64,
    pub name: String,
    /// 0 = unlimited.
    pub user_limit: u32,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

impl TempRoom {
    pub fn is_stale(&self, occupants: usize, now: DateTime<Utc>, grace: Duration) -> bool {
        occupants == 0 && now - self.created_at >= grace
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RoomError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("You already own a room: <#{0}>")]
    AlreadyOwnsRoom(u64),

    #[error("You don't own a room")]
    NoRoom,

    #[error("Room names must be 1-100 characters")]
    InvalidName,

    #[error("User limit must be between 0 and 99")]
    InvalidLimit,
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn get(&self, channel_id: u64) -> Result<Option<TempRoom>, RoomError>;

    async fn save(&self, room: TempRoom) -> Result<(), RoomError>;

    async fn remove(&self, channel_id: u64) -> Result<Option<TempRoom>, RoomError>;

    async fn all(&self) -> Result<Vec<TempRoom>, RoomError>;
}

pub fn validate_name(name: &str) -> Result<String, RoomError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(RoomError::InvalidName);
    }
    Ok(name.to_string())
}

pub struct RoomService<S: RoomStore> {
    store: S,
}

impl<S: RoomStore> RoomService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn owned_by(&self, guild_id: u64, owner_id: u64) -> Result<Option<TempRoom>, RoomError> {
        Ok(self
            .store
            .all()
            .await?
            .into_iter()
            .find(|r| r.guild_id == guild_id && r.owner_id == owner_id))
    }

    /// Fails if the member already owns a room. Call before creating the
    /// channel on Discord.
    pub async fn ensure_can_create(&self, guild_id: u64, owner_id: u64) -> Result<(), RoomError> {
        match self.owned_by(guild_id, owner_id).await? {
            Some(room) => Err(RoomError::AlreadyOwnsRoom(room.channel_id)),
            None => Ok(()),
        }
    }

    pub async fn register(&self, room: TempRoom) -> Result<TempRoom, RoomError> {
        self.ensure_can_create(room.guild_id, room.owner_id).await?;
        if room.user_limit > MAX_USER_LIMIT {
            return Err(RoomError::InvalidLimit);
        }
        let room = TempRoom {
            name: validate_name(&room.name)?,
            ..room
        };
        self.store.save(room.clone()).await?;
        Ok(room)
    }

    pub async fn get(&self, channel_id: u64) -> Result<Option<TempRoom>, RoomError> {
        self.store.get(channel_id).await
    }

    pub async fn all(&self) -> Result<Vec<TempRoom>, RoomError> {
        self.store.all().await
    }

    /// Close the member's room. The caller deletes the channel.
    pub async fn close(&self, guild_id: u64, owner_id: u64) -> Result<TempRoom, RoomError> {
        let room = self
            .owned_by(guild_id, owner_id)
            .await?
            .ok_or(RoomError::NoRoom)?;
        self.store.remove(room.channel_id).await?;
        Ok(room)
    }

    /// Drop a room whose channel is gone or empty.
    pub async fn forget(&self, channel_id: u64) -> Result<Option<TempRoom>, RoomError> {
        self.store.remove(channel_id).await
    }

    async fn update<F>(&self, guild_id: u64, owner_id: u64, edit: F) -> Result<TempRoom, RoomError>
    where
        F: FnOnce(&mut TempRoom) + Send,
    {
        let mut room = self
            .owned_by(guild_id, owner_id)
            .await?
            .ok_or(RoomError::NoRoom)?;
        edit(&mut room);
        self.store.save(room.clone()).await?;
        Ok(room)
    }

    pub async fn rename(&self, guild_id: u64, owner_id: u64, name: &str) -> Result<TempRoom, RoomError> {
        let name = validate_name(name)?;
        self.update(guild_id, owner_id, move |room| room.name = name)
            .await
    }

    pub async fn set_limit(&self, guild_id: u64, owner_id: u64, limit: u32) -> Result<TempRoom, RoomError> {
        if limit > MAX_USER_LIMIT {
            return Err(RoomError::InvalidLimit);
        }
        self.update(guild_id, owner_id, move |room| room.user_limit = limit)
            .await
    }

    pub async fn set_locked(&self, guild_id: u64, owner_id: u64, locked: bool) -> Result<TempRoom, RoomError> {
        self.update(guild_id, owner_id, move |room| room.locked = locked)
            .await
    }
}
