// "Down" = temporarily (or permanently) stripping a member's administrative
// roles. The record remembers exactly which roles were removed so they can
// be restored when the down ends or expires.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownRecord {
    pub id: u64,
    pub guild_id: u64,
    pub user_id: u64,
    pub removed_role_ids: Vec<u64>,
    pub reason: String,
    pub moderator_id: u64,
    pub started_at: DateTime<Utc>,
    /// None means the down is permanent until ended manually.
    pub expires_at: Option<DateTime<Utc>>,
}

impl DownRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Everything needed to put a member down.
#[derive(Debug, Clone)]
pub struct DownRequest<'a> {
    pub guild_id: u64,
    pub user_id: u64,
    pub moderator_id: u64,
    /// Roles the member currently holds.
    pub held_role_ids: &'a [u64],
    /// The guild's administrative roles.
    pub admin_role_ids: &'a [u64],
    /// Remove only this role instead of every admin role.
    pub target_role_id: Option<u64>,
    pub reason: &'a str,
    pub expires_at: Option<DateTime<Utc>>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum DownError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("This member is already down")]
    AlreadyDown,

    #[error("This member is not down")]
    NotDown,

    #[error("The member does not hold that role")]
    RoleNotHeld,

    #[error("The member holds no administrative roles")]
    NothingToRemove,

    #[error("You can't down yourself")]
    SelfTarget,

    #[error("Expiry must be in the future")]
    InvalidExpiry,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait DownStore: Send + Sync {
    async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<DownRecord>, DownError>;

    /// Every active down across all guilds.
    async fn all(&self) -> Result<Vec<DownRecord>, DownError>;

    /// Assigns an id, stores, and returns the record.
    async fn insert(&self, record: DownRecord) -> Result<DownRecord, DownError>;

    async fn update(&self, record: DownRecord) -> Result<(), DownError>;

    async fn remove(&self, guild_id: u64, user_id: u64) -> Result<Option<DownRecord>, DownError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct DownService<S: DownStore> {
    store: S,
    /// Serializes check-then-write cycles.
    write_lock: Mutex<()>,
}

impl<S: DownStore> DownService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Record a down. The caller removes `removed_role_ids` on Discord and
    /// calls [`DownService::end`] to roll back if that fails.
    pub async fn apply(
        &self,
        request: DownRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<DownRecord, DownError> {
        if request.user_id == request.moderator_id {
            return Err(DownError::SelfTarget);
        }
        if let Some(at) = request.expires_at {
            if at <= now {
                return Err(DownError::InvalidExpiry);
            }
        }

        let _guard = self.write_lock.lock().await;
        if self
            .store
            .get(request.guild_id, request.user_id)
            .await?
            .is_some()
        {
            return Err(DownError::AlreadyDown);
        }

        let removed_role_ids = match request.target_role_id {
            Some(role) if request.held_role_ids.contains(&role) => vec![role],
            Some(_) => return Err(DownError::RoleNotHeld),
            None => {
                let roles: Vec<u64> = request
                    .held_role_ids
                    .iter()
                    .copied()
                    .filter(|r| request.admin_role_ids.contains(r))
                    .collect();
                if roles.is_empty() {
                    return Err(DownError::NothingToRemove);
                }
                roles
            }
        };

        self.store
            .insert(DownRecord {
                id: 0,
                guild_id: request.guild_id,
                user_id: request.user_id,
                removed_role_ids,
                reason: request.reason.trim().to_string(),
                moderator_id: request.moderator_id,
                started_at: now,
                expires_at: request.expires_at,
            })
            .await
    }

    /// End a down early. Returns the record so roles can be restored.
    pub async fn end(&self, guild_id: u64, user_id: u64) -> Result<DownRecord, DownError> {
        self.store
            .remove(guild_id, user_id)
            .await?
            .ok_or(DownError::NotDown)
    }

    /// Change the expiry of an active down (None = permanent).
    pub async fn extend(
        &self,
        guild_id: u64,
        user_id: u64,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<DownRecord, DownError> {
        if let Some(at) = expires_at {
            if at <= now {
                return Err(DownError::InvalidExpiry);
            }
        }
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .store
            .get(guild_id, user_id)
            .await?
            .ok_or(DownError::NotDown)?;
        record.expires_at = expires_at;
        self.store.update(record.clone()).await?;
        Ok(record)
    }

    pub async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<DownRecord>, DownError> {
        self.store.get(guild_id, user_id).await
    }

    pub async fn list(&self, guild_id: u64) -> Result<Vec<DownRecord>, DownError> {
        let mut records: Vec<DownRecord> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|r| r.guild_id == guild_id)
            .collect();
        records.sort_by_key(|r| r.started_at);
        Ok(records)
    }

    /// Downs whose expiry has passed. They stay stored until
    /// [`DownService::complete`] is called after roles are restored.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<DownRecord>, DownError> {
        Ok(self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|r| r.is_expired(now))
            .collect())
    }

    pub async fn complete(&self, guild_id: u64, user_id: u64) -> Result<(), DownError> {
        self.store.remove(guild_id, user_id).await?;
        Ok(())
    }

    /// Roles the member must not hold while down.
    pub async fn blocked_roles(&self, guild_id: u64, user_id: u64) -> Result<Vec<u64>, DownError> {
        Ok(self
            .store
            .get(guild_id, user_id)
            .await?
            .map(|r| r.removed_role_ids)
            .unwrap_or_default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
