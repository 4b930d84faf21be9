use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Streak lengths that get a celebration message.
pub const MILESTONES: &[u32] = &[3, 7, 14, 30, 50, 100, 200, 365];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreakStatus {
    Active,
    Expired,
    PendingRestore,
}

impl StreakStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StreakStatus::Active => "active",
            StreakStatus::Expired => "expired",
            StreakStatus::PendingRestore => "pending_restore",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(StreakStatus::Active),
            "expired" => Some(StreakStatus::Expired),
            "pending_restore" => Some(StreakStatus::PendingRestore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub guild_id: u64,
    pub user_id: u64,
    pub current: u32,
    pub longest: u32,
    /// `longest` as it was before the last counted post, put back if that
    /// post is voided.
    pub longest_before_post: u32,
    /// Local date of the last counted post.
    pub last_post_date: Option<NaiveDate>,
    pub status: StreakStatus,
    /// Streak lost at the last expiry, restorable while in the window.
    pub lost_streak: u32,
    pub expired_on: Option<NaiveDate>,
    pub total_posts: u64,
    pub restores_used: u32,
    /// "YYYY-MM" that `restores_used` applies to.
    pub last_restore_month: Option<String>,
}

impl StreakRecord {
    pub fn new(guild_id: u64, user_id: u64) -> Self {
        Self {
            guild_id,
            user_id,
            current: 0,
            longest: 0,
            longest_before_post: 0,
            last_post_date: None,
            status: StreakStatus::Active,
            lost_streak: 0,
            expired_on: None,
            total_posts: 0,
            restores_used: 0,
            last_restore_month: None,
        }
    }

    /// Restores used in the month containing `today`.
    pub fn restores_in_month(&self, today: NaiveDate) -> u32 {
        if self.last_restore_month.as_deref() == Some(month_key(today).as_str()) {
            self.restores_used
        } else {
            0
        }
    }
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// First post after a gap (or ever).
    Started { current: u32 },
    /// Post on the day after the previous one.
    Extended { current: u32, milestone: Option<u32> },
    /// Already posted today.
    AlreadyCounted,
}

/// Per-guild limits on restore requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestorePolicy {
    pub window_days: u32,
    pub max_per_month: u32,
}

#[derive(Debug, Error, PartialEq)]
pub enum StreakError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("No streak found")]
    NoStreak,

    #[error("No post was counted today")]
    NotCountedToday,

    #[error("There is no lost streak to restore")]
    NothingToRestore,

    #[error("Restores must be requested within {0} days of losing the streak")]
    WindowClosed(u32),

    #[error("You have used all {0} restores for this month")]
    MonthlyLimit(u32),

    #[error("A restore request is already pending")]
    AlreadyPending,

    #[error("No restore request is pending")]
    NotPending,

    #[error("You can't decide your own restore request")]
    SelfDecision,
}
