// Moderation domain models - block list entries and warnings.
//
// These are pure domain types with no Discord dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A member barred from using the bot's commands and features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub guild_id: u64,
    pub user_id: u64,
    pub reason: String,
    pub blocked_by: u64,
    pub created_at: DateTime<Utc>,
}

/// A formal warning issued by a moderator.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    /// Database id, used to remove a single warning.
    pub id: i64,
    pub guild_id: u64,
    pub user_id: u64,
    pub moderator_id: u64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Result of issuing a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct WarnOutcome {
    pub warning: Warning,
    /// Warnings the member now has in this guild.
    pub total: u32,
    /// True when `total` reached the guild's alert threshold.
    pub threshold_reached: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ModerationError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("This member is already blocked")]
    AlreadyBlocked,

    #[error("This member is not blocked")]
    NotBlocked,

    #[error("You can't do that to yourself")]
    SelfTarget,

    #[error("A reason is required")]
    EmptyReason,

    #[error("Warning #{0} not found")]
    WarningNotFound(i64),
}
