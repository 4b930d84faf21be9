// Streak module - daily posting streaks with restore approvals

mod streak_models;
mod streak_service;

pub use streak_models::{
    month_key, PostOutcome, RestorePolicy, StreakError, StreakRecord, StreakStatus, MILESTONES,
};
pub use streak_service::{duration_until_next_midnight, local_today, StreakService, StreakStore};
