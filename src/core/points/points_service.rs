// Points are the community's reward currency: claiming responsibility
// calls and staff awards add points, staff deductions remove them.
// Totals never go negative; every change is kept as an event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

/// Upper bound on rows scanned when computing a single user's rank.
const RANK_SCAN_LIMIT: usize = 100_000;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PointsEntry {
    pub user_id: u64,
    pub guild_id: u64,
    pub points: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single change to a user's points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointEvent {
    pub user_id: u64,
    pub guild_id: u64,
    pub delta: i64,
    pub reason: String,
    /// Staff member responsible for the change, if any.
    pub actor_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Result of an award or deduction.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsChange {
    /// Amount actually applied (deductions are clamped at zero).
    pub applied: i64,
    pub total: i64,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PointsError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Invalid user or guild ID")]
    InvalidId,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait PointsStore: Send + Sync {
    /// Current total, 0 if the user never had points.
    async fn get_points(&self, user_id: u64, guild_id: u64) -> Result<i64, PointsError>;

    /// Add `change.delta` to the total, clamping at zero, and record the
    /// amount actually applied as an event. Read, write and event insert
    /// happen as one atomic step so concurrent changes never overwrite
    /// each other.
    async fn apply_change(&self, change: PointEvent) -> Result<PointsChange, PointsError>;

    /// Top users by points, highest first. Ties broken by user id.
    async fn leaderboard(&self, guild_id: u64, limit: usize)
        -> Result<Vec<PointsEntry>, PointsError>;

    /// Newest first.
    async fn recent_events(
        &self,
        user_id: u64,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<PointEvent>, PointsError>;

    /// Delete every total and event in a guild. Returns affected users.
    async fn reset_guild(&self, guild_id: u64) -> Result<u64, PointsError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct PointsService<S: PointsStore> {
    store: S,
    /// One change at a time, so SQLite connections never contend.
    write_lock: Mutex<()>,
}

impl<S: PointsStore> PointsService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn validate_ids(user_id: u64, guild_id: u64) -> Result<(), PointsError> {
        if user_id == 0 || guild_id == 0 {
            Err(PointsError::InvalidId)
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, user_id: u64, guild_id: u64) -> Result<i64, PointsError> {
        Self::validate_ids(user_id, guild_id)?;
        self.store.get_points(user_id, guild_id).await
    }

    pub async fn award(
        &self,
        user_id: u64,
        guild_id: u64,
        amount: i64,
        reason: &str,
        actor_id: Option<u64>,
    ) -> Result<PointsChange, PointsError> {
        Self::validate_ids(user_id, guild_id)?;
        if amount <= 0 {
            return Err(PointsError::InvalidAmount);
        }
        self.apply(user_id, guild_id, amount, reason, actor_id).await
    }

    /// Remove points. The total is clamped at zero and the event records
    /// what was actually removed.
    pub async fn deduct(
        &self,
        user_id: u64,
        guild_id: u64,
        amount: i64,
        reason: &str,
        actor_id: Option<u64>,
    ) -> Result<PointsChange, PointsError> {
        Self::validate_ids(user_id, guild_id)?;
        if amount <= 0 {
            return Err(PointsError::InvalidAmount);
        }
        self.apply(user_id, guild_id, -amount, reason, actor_id)
            .await
    }

    async fn apply(
        &self,
        user_id: u64,
        guild_id: u64,
        delta: i64,
        reason: &str,
        actor_id: Option<u64>,
    ) -> Result<PointsChange, PointsError> {
        let _guard = self.write_lock.lock().await;
        self.store
            .apply_change(PointEvent {
                user_id,
                guild_id,
                delta,
                reason: reason.to_string(),
                actor_id,
                created_at: Utc::now(),
            })
            .await
    }

    pub async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<PointsEntry>, PointsError> {
        if guild_id == 0 {
            return Err(PointsError::InvalidId);
        }
        let entries = self.store.leaderboard(guild_id, limit).await?;
        Ok(entries.into_iter().filter(|e| e.points > 0).collect())
    }

    /// 1-based rank among users with points, or None if unranked.
    pub async fn rank(&self, user_id: u64, guild_id: u64) -> Result<Option<usize>, PointsError> {
        let board = self.leaderboard(guild_id, RANK_SCAN_LIMIT).await?;
        Ok(board
            .iter()
            .position(|e| e.user_id == user_id)
            .map(|i| i + 1))
    }

    pub async fn history(
        &self,
        user_id: u64,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<PointEvent>, PointsError> {
        Self::validate_ids(user_id, guild_id)?;
        self.store.recent_events(user_id, guild_id, limit).await
    }

    pub async fn reset_guild(&self, guild_id: u64) -> Result<u64, PointsError> {
        if guild_id == 0 {
            return Err(PointsError::InvalidId);
        }
        self.store.reset_guild(guild_id).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Mutex;

    struct MockPointsStore {
        totals: DashMap<(u64, u64), i64>,
        events: Mutex<Vec<PointEvent>>,
    }

    impl MockPointsStore {
        fn new() -> Self {
            Self {
                totals: DashMap::new(),
                events: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PointsStore for MockPointsStore {
        async fn get_points(&self, user_id: u64, guild_id: u64) -> Result<i64, PointsError> {
            Ok(self
                .totals
                .get(&(user_id, guild_id))
                .map(|v| *v)
                .unwrap_or(0))
        }

        async fn apply_change(&self, change: PointEvent) -> Result<PointsChange, PointsError> {
            // The entry guard holds the shard lock for the whole update
            let mut total = self
                .totals
                .entry((change.user_id, change.guild_id))
                .or_insert(0);
            let current = *total;
            *total = current.saturating_add(change.delta).max(0);
            let applied = *total - current;
            if applied != 0 {
                self.events.lock().unwrap().push(PointEvent {
                    delta: applied,
                    ..change
                });
            }
            Ok(PointsChange {
                applied,
                total: *total,
            })
        }

        async fn leaderboard(
            &self,
            guild_id: u64,
            limit: usize,
        ) -> Result<Vec<PointsEntry>, PointsError> {
            let mut entries: Vec<PointsEntry> = self
                .totals
                .iter()
                .filter(|e| e.key().1 == guild_id)
                .map(|e| PointsEntry {
                    user_id: e.key().0,
                    guild_id,
                    points: *e.value(),
                    updated_at: None,
                })
                .collect();
            entries.sort_by(|a, b| b.points.cmp(&a.points).then(a.user_id.cmp(&b.user_id)));
            entries.truncate(limit);
            Ok(entries)
        }

        async fn recent_events(
            &self,
            user_id: u64,
            guild_id: u64,
            limit: usize,
        ) -> Result<Vec<PointEvent>, PointsError> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|e| e.user_id == user_id && e.guild_id == guild_id)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn reset_guild(&self, guild_id: u64) -> Result<u64, PointsError> {
            let before = self.totals.len();
            self.totals.retain(|k, _| k.1 != guild_id);
            Ok((before - self.totals.len()) as u64)
        }
    }

    #[tokio::test]
    async fn award_and_deduct_track_totals() {
        let service = PointsService::new(MockPointsStore::new());

        let change = service.award(1, 9, 5, "claim", None).await.unwrap();
        assert_eq!(change, PointsChange { applied: 5, total: 5 });

        let change = service.deduct(1, 9, 2, "oops", Some(7)).await.unwrap();
        assert_eq!(change, PointsChange { applied: -2, total: 3 });

        let history = service.history(1, 9, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].delta, -2);
        assert_eq!(history[0].actor_id, Some(7));
    }

    #[tokio::test]
    async fn deduction_clamps_at_zero() {
        let service = PointsService::new(MockPointsStore::new());
        service.award(1, 9, 3, "claim", None).await.unwrap();

        let change = service.deduct(1, 9, 10, "penalty", None).await.unwrap();
        assert_eq!(change, PointsChange { applied: -3, total: 0 });

        // Nothing left to remove: no event is recorded
        let change = service.deduct(1, 9, 10, "penalty", None).await.unwrap();
        assert_eq!(change.applied, 0);
        assert_eq!(service.history(1, 9, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts_and_bad_ids() {
        let service = PointsService::new(MockPointsStore::new());
        assert!(matches!(
            service.award(1, 9, 0, "x", None).await,
            Err(PointsError::InvalidAmount)
        ));
        assert!(matches!(
            service.deduct(1, 9, -4, "x", None).await,
            Err(PointsError::InvalidAmount)
        ));
        assert!(matches!(
            service.award(0, 9, 1, "x", None).await,
            Err(PointsError::InvalidId)
        ));
    }

    #[tokio::test]
    async fn concurrent_awards_are_all_counted() {
        let service = std::sync::Arc::new(PointsService::new(MockPointsStore::new()));
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.award(1, 9, 1, "claim", None).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(service.get(1, 9).await.unwrap(), 50);
        assert_eq!(service.history(1, 9, 100).await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn leaderboard_and_rank_skip_zero_totals() {
        let service = PointsService::new(MockPointsStore::new());
        service.award(1, 9, 5, "a", None).await.unwrap();
        service.award(2, 9, 8, "a", None).await.unwrap();
        service.award(3, 9, 1, "a", None).await.unwrap();
        service.deduct(3, 9, 1, "a", None).await.unwrap();

        let board = service.leaderboard(9, 10).await.unwrap();
        let ids: Vec<u64> = board.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![2, 1]);

        assert_eq!(service.rank(1, 9).await.unwrap(), Some(2));
        assert_eq!(service.rank(3, 9).await.unwrap(), None);
    }
}
