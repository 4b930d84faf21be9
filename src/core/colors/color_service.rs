// Color roles: a per-guild registry of cosmetic roles. A member wears at
// most one color role at a time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discord caps select menus and choices at 25 entries.
pub const MAX_COLOR_ROLES: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRole {
    pub role_id: u64,
    pub label: String,
}

/// Role edits needed to switch a member's color.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorChange {
    pub remove: Vec<u64>,
    pub add: Option<u64>,
}

impl ColorChange {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_none()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ColorError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("That role is already a color role")]
    AlreadyRegistered,

    #[error("That role is not a color role")]
    NotRegistered,

    #[error("Label must be 1-32 characters")]
    InvalidLabel,

    #[error("A server can have at most 25 color roles")]
    TooMany,
}

#[async_trait]
pub trait ColorStore: Send + Sync {
    async fn roles(&self, guild_id: u64) -> Result<Vec<ColorRole>, ColorError>;

    async fn set_roles(&self, guild_id: u64, roles: Vec<ColorRole>) -> Result<(), ColorError>;
}

pub struct ColorService<S: ColorStore> {
    store: S,
}

impl<S: ColorStore> ColorService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn list(&self, guild_id: u64) -> Result<Vec<ColorRole>, ColorError> {
        self.store.roles(guild_id).await
    }

    pub async fn add_role(
        &self,
        guild_id: u64,
        role_id: u64,
        label: &str,
    ) -> Result<ColorRole, ColorError> {
        let label = label.trim();
        if label.is_empty() || label.chars().count() > 32 {
            return Err(ColorError::InvalidLabel);
        }
        let mut roles = self.store.roles(guild_id).await?;
        if roles.iter().any(|r| r.role_id == role_id) {
            return Err(ColorError::AlreadyRegistered);
        }
        if roles.len() >= MAX_COLOR_ROLES {
            return Err(ColorError::TooMany);
        }

        let role = ColorRole {
            role_id,
            label: label.to_string(),
        };
        roles.push(role.clone());
        self.store.set_roles(guild_id, roles).await?;
        Ok(role)
    }

    pub async fn remove_role(&self, guild_id: u64, role_id: u64) -> Result<ColorRole, ColorError> {
        let mut roles = self.store.roles(guild_id).await?;
        let index = roles
            .iter()
            .position(|r| r.role_id == role_id)
            .ok_or(ColorError::NotRegistered)?;
        let removed = roles.remove(index);
        self.store.set_roles(guild_id, roles).await?;
        Ok(removed)
    }

    /// Work out the role edits for a member switching to `chosen`
    /// (or clearing their color when `None`).
    pub async fn plan_change(
        &self,
        guild_id: u64,
        member_role_ids: &[u64],
        chosen: Option<u64>,
    ) -> Result<ColorChange, ColorError> {
        let roles = self.store.roles(guild_id).await?;
        if let Some(chosen) = chosen {
            if !roles.iter().any(|r| r.role_id == chosen) {
                return Err(ColorError::NotRegistered);
            }
        }

        let remove = member_role_ids
            .iter()
            .copied()
            .filter(|id| Some(*id) != chosen)
            .filter(|id| roles.iter().any(|r| r.role_id == *id))
            .collect();
        let add = chosen.filter(|id| !member_role_ids.contains(id));

        Ok(ColorChange { remove, add })
    }
}
