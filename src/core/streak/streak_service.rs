// Daily posting streaks. All dates are local to the guild's timezone; the
// Discord layer converts message timestamps before calling in.
//
// A streak survives as long as the member posts at least once per local
// day. At local midnight, streaks whose last post is older than yesterday
// expire; the lost count can be restored once a moderator approves.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;

use super::streak_models::{
    month_key, PostOutcome, RestorePolicy, StreakError, StreakRecord, StreakStatus, MILESTONES,
};

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait StreakStore: Send + Sync {
    async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<StreakRecord>, StreakError>;

    async fn save(&self, record: &StreakRecord) -> Result<(), StreakError>;

    async fn list_guild(&self, guild_id: u64) -> Result<Vec<StreakRecord>, StreakError>;

    async fn delete(&self, guild_id: u64, user_id: u64) -> Result<bool, StreakError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct StreakService<S: StreakStore> {
    store: S,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl<S: StreakStore> StreakService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self, guild_id: u64, user_id: u64) -> Result<StreakRecord, StreakError> {
        Ok(self
            .store
            .get(guild_id, user_id)
            .await?
            .unwrap_or_else(|| StreakRecord::new(guild_id, user_id)))
    }

    pub async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<StreakRecord>, StreakError> {
        self.store.get(guild_id, user_id).await
    }

    /// Count a post made on local date `today`.
    pub async fn record_post(
        &self,
        guild_id: u64,
        user_id: u64,
        today: NaiveDate,
    ) -> Result<PostOutcome, StreakError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.load(guild_id, user_id).await?;

        if record.last_post_date == Some(today) {
            return Ok(PostOutcome::AlreadyCounted);
        }

        let continues = record.current > 0 && record.last_post_date == today.pred_opt();
        let outcome = if continues {
            record.current += 1;
            PostOutcome::Extended {
                current: record.current,
                milestone: MILESTONES.contains(&record.current).then_some(record.current),
            }
        } else {
            record.current = 1;
            PostOutcome::Started { current: 1 }
        };

        record.last_post_date = Some(today);
        record.longest_before_post = record.longest;
        record.longest = record.longest.max(record.current);
        record.total_posts += 1;
        if record.status == StreakStatus::Expired {
            record.status = StreakStatus::Active;
        }

        self.store.save(&record).await?;
        Ok(outcome)
    }

    /// Void today's counted post (moderator ❌).
    pub async fn revoke_post(
        &self,
        guild_id: u64,
        user_id: u64,
        today: NaiveDate,
    ) -> Result<StreakRecord, StreakError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .store
            .get(guild_id, user_id)
            .await?
            .ok_or(StreakError::NoStreak)?;
        if record.last_post_date != Some(today) {
            return Err(StreakError::NotCountedToday);
        }

        record.current = record.current.saturating_sub(1);
        record.longest = record.longest_before_post.max(record.current);
        record.total_posts = record.total_posts.saturating_sub(1);
        record.last_post_date = if record.current > 0 {
            today.pred_opt()
        } else {
            None
        };

        self.store.save(&record).await?;
        Ok(record)
    }

    /// Expire streaks in a guild whose last post is before yesterday.
    /// Returns the records that expired.
    pub async fn expire_missed(
        &self,
        guild_id: u64,
        today: NaiveDate,
    ) -> Result<Vec<StreakRecord>, StreakError> {
        let _guard = self.write_lock.lock().await;
        let yesterday = today.pred_opt();
        let mut expired = Vec::new();

        for mut record in self.store.list_guild(guild_id).await? {
            if record.current == 0 {
                continue;
            }
            let missed = match (record.last_post_date, yesterday) {
                (Some(last), Some(y)) => last < y,
                _ => true,
            };
            if !missed {
                continue;
            }

            // A pending restore keeps the streak under review.
            if record.status != StreakStatus::PendingRestore {
                record.lost_streak = record.current;
                record.status = StreakStatus::Expired;
                record.expired_on = Some(today);
            }
            record.current = 0;

            self.store.save(&record).await?;
            expired.push(record);
        }

        Ok(expired)
    }

    pub async fn request_restore(
        &self,
        guild_id: u64,
        user_id: u64,
        today: NaiveDate,
        policy: RestorePolicy,
    ) -> Result<StreakRecord, StreakError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .store
            .get(guild_id, user_id)
            .await?
            .ok_or(StreakError::NothingToRestore)?;

        if record.status == StreakStatus::PendingRestore {
            return Err(StreakError::AlreadyPending);
        }
        let expired_on = match record.expired_on {
            Some(date) if record.lost_streak > 0 => date,
            _ => return Err(StreakError::NothingToRestore),
        };
        if (today - expired_on).num_days() > i64::from(policy.window_days) {
            return Err(StreakError::WindowClosed(policy.window_days));
        }
        if record.restores_in_month(today) >= policy.max_per_month {
            return Err(StreakError::MonthlyLimit(policy.max_per_month));
        }

        record.status = StreakStatus::PendingRestore;
        self.store.save(&record).await?;
        Ok(record)
    }

    pub async fn approve_restore(
        &self,
        guild_id: u64,
        user_id: u64,
        moderator_id: u64,
        today: NaiveDate,
    ) -> Result<StreakRecord, StreakError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.pending_for(guild_id, user_id, moderator_id).await?;

        record.current += record.lost_streak;
        record.longest = record.longest.max(record.current);
        if record.last_post_date != Some(today) {
            record.last_post_date = today.pred_opt();
        }
        record.lost_streak = 0;
        record.expired_on = None;
        record.status = StreakStatus::Active;

        let month = month_key(today);
        record.restores_used = record.restores_in_month(today) + 1;
        record.last_restore_month = Some(month);

        self.store.save(&record).await?;
        Ok(record)
    }

    pub async fn reject_restore(
        &self,
        guild_id: u64,
        user_id: u64,
        moderator_id: u64,
    ) -> Result<StreakRecord, StreakError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.pending_for(guild_id, user_id, moderator_id).await?;

        record.lost_streak = 0;
        record.expired_on = None;
        record.status = if record.current > 0 {
            StreakStatus::Active
        } else {
            StreakStatus::Expired
        };

        self.store.save(&record).await?;
        Ok(record)
    }

    /// Drop a pending request without deciding it. The lost streak stays
    /// restorable.
    pub async fn withdraw_restore(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<StreakRecord, StreakError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.pending(guild_id, user_id).await?;
        record.status = if record.current > 0 {
            StreakStatus::Active
        } else {
            StreakStatus::Expired
        };
        self.store.save(&record).await?;
        Ok(record)
    }

    async fn pending(&self, guild_id: u64, user_id: u64) -> Result<StreakRecord, StreakError> {
        self.store
            .get(guild_id, user_id)
            .await?
            .filter(|r| r.status == StreakStatus::PendingRestore)
            .ok_or(StreakError::NotPending)
    }

    /// A pending request that `moderator_id` may decide.
    async fn pending_for(
        &self,
        guild_id: u64,
        user_id: u64,
        moderator_id: u64,
    ) -> Result<StreakRecord, StreakError> {
        let record = self.pending(guild_id, user_id).await?;
        if moderator_id == user_id {
            return Err(StreakError::SelfDecision);
        }
        Ok(record)
    }

    /// Members who posted yesterday but not yet today.
    pub async fn at_risk(
        &self,
        guild_id: u64,
        today: NaiveDate,
    ) -> Result<Vec<StreakRecord>, StreakError> {
        let yesterday = today.pred_opt();
        Ok(self
            .store
            .list_guild(guild_id)
            .await?
            .into_iter()
            .filter(|r| r.current > 0 && r.last_post_date == yesterday)
            .collect())
    }

    /// Highest current streaks, ties broken by longest streak.
    pub async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<StreakRecord>, StreakError> {
        let mut records: Vec<StreakRecord> = self
            .store
            .list_guild(guild_id)
            .await?
            .into_iter()
            .filter(|r| r.current > 0)
            .collect();
        records.sort_by(|a, b| {
            b.current
                .cmp(&a.current)
                .then(b.longest.cmp(&a.longest))
                .then(a.user_id.cmp(&b.user_id))
        });
        records.truncate(limit);
        Ok(records)
    }

    pub async fn reset(&self, guild_id: u64, user_id: u64) -> Result<bool, StreakError> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(guild_id, user_id).await
    }
}

// ============================================================================
// TIME HELPERS
// ============================================================================

pub fn local_today(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Time from `now` until the next local midnight in `tz`. When midnight
/// does not exist (DST gap) the first valid local time after it is used.
pub fn duration_until_next_midnight(now: DateTime<Utc>, tz: Tz) -> std::time::Duration {
    let tomorrow = local_today(now, tz)
        .succ_opt()
        .unwrap_or_else(|| local_today(now, tz));

    let next = (0..=3)
        .filter_map(|hour| tomorrow.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| now + Duration::hours(24));

    (next - now)
        .to_std()
        .unwrap_or_else(|_| std::time::Duration::from_secs(60))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    struct MockStreakStore {
        records: DashMap<(u64, u64), StreakRecord>,
    }

    impl MockStreakStore {
        fn new() -> Self {
            Self {
                records: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl StreakStore for MockStreakStore {
        async fn get(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Option<StreakRecord>, StreakError> {
            Ok(self.records.get(&(guild_id, user_id)).map(|r| r.clone()))
        }

        async fn save(&self, record: &StreakRecord) -> Result<(), StreakError> {
            self.records
                .insert((record.guild_id, record.user_id), record.clone());
            Ok(())
        }

        async fn list_guild(&self, guild_id: u64) -> Result<Vec<StreakRecord>, StreakError> {
            Ok(self
                .records
                .iter()
                .filter(|r| r.key().0 == guild_id)
                .map(|r| r.value().clone())
                .collect())
        }

        async fn delete(&self, guild_id: u64, user_id: u64) -> Result<bool, StreakError> {
            Ok(self.records.remove(&(guild_id, user_id)).is_some())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    const POLICY: RestorePolicy = RestorePolicy {
        window_days: 3,
        max_per_month: 2,
    };

    async fn build_streak(service: &StreakService<MockStreakStore>, days: std::ops::RangeInclusive<u32>) {
        for d in days {
            service.record_post(1, 10, day(d)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn consecutive_days_extend_and_hit_milestones() {
        let service = StreakService::new(MockStreakStore::new());

        assert_eq!(
            service.record_post(1, 10, day(1)).await.unwrap(),
            PostOutcome::Started { current: 1 }
        );
        assert_eq!(
            service.record_post(1, 10, day(1)).await.unwrap(),
            PostOutcome::AlreadyCounted
        );
        assert_eq!(
            service.record_post(1, 10, day(2)).await.unwrap(),
            PostOutcome::Extended {
                current: 2,
                milestone: None
            }
        );
        assert_eq!(
            service.record_post(1, 10, day(3)).await.unwrap(),
            PostOutcome::Extended {
                current: 3,
                milestone: Some(3)
            }
        );

        let record = service.get(1, 10).await.unwrap().unwrap();
        assert_eq!(record.longest, 3);
        assert_eq!(record.total_posts, 3);
    }

    #[tokio::test]
    async fn gap_restarts_the_streak() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=4).await;

        assert_eq!(
            service.record_post(1, 10, day(6)).await.unwrap(),
            PostOutcome::Started { current: 1 }
        );
        let record = service.get(1, 10).await.unwrap().unwrap();
        assert_eq!(record.longest, 4);
    }

    #[tokio::test]
    async fn midnight_expiry_only_hits_missed_days() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=5).await;
        service.record_post(1, 11, day(6)).await.unwrap();

        // Day 7 starts: user 10 last posted on day 5, user 11 on day 6
        let expired = service.expire_missed(1, day(7)).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, 10);
        assert_eq!(expired[0].lost_streak, 5);
        assert_eq!(expired[0].current, 0);
        assert_eq!(expired[0].status, StreakStatus::Expired);
        assert_eq!(expired[0].expired_on, Some(day(7)));

        // Running again is a no-op
        assert!(service.expire_missed(1, day(7)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn approved_restore_adds_lost_streak_back() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=5).await;
        service.expire_missed(1, day(7)).await.unwrap();

        let pending = service.request_restore(1, 10, day(7), POLICY).await.unwrap();
        assert_eq!(pending.status, StreakStatus::PendingRestore);
        assert_eq!(
            service.request_restore(1, 10, day(7), POLICY).await,
            Err(StreakError::AlreadyPending)
        );

        // Posting while pending counts but keeps the request open
        service.record_post(1, 10, day(8)).await.unwrap();
        assert_eq!(
            service.get(1, 10).await.unwrap().unwrap().status,
            StreakStatus::PendingRestore
        );

        let restored = service.approve_restore(1, 10, 99, day(8)).await.unwrap();
        assert_eq!(restored.current, 6);
        assert_eq!(restored.status, StreakStatus::Active);
        assert_eq!(restored.last_post_date, Some(day(8)));
        assert_eq!(restored.restores_used, 1);
        assert_eq!(restored.lost_streak, 0);

        assert_eq!(
            service.record_post(1, 10, day(9)).await.unwrap(),
            PostOutcome::Extended {
                current: 7,
                milestone: Some(7)
            }
        );
    }

    #[tokio::test]
    async fn approval_without_new_post_resumes_from_yesterday() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=3).await;
        service.expire_missed(1, day(6)).await.unwrap();
        service.request_restore(1, 10, day(6), POLICY).await.unwrap();

        let restored = service.approve_restore(1, 10, 99, day(6)).await.unwrap();
        assert_eq!(restored.current, 3);
        assert_eq!(restored.last_post_date, Some(day(5)));
        assert_eq!(
            service.record_post(1, 10, day(6)).await.unwrap(),
            PostOutcome::Extended {
                current: 4,
                milestone: None
            }
        );
    }

    #[tokio::test]
    async fn pending_restore_survives_another_midnight() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=4).await;
        service.expire_missed(1, day(6)).await.unwrap();
        service.request_restore(1, 10, day(6), POLICY).await.unwrap();
        service.record_post(1, 10, day(6)).await.unwrap();

        service.expire_missed(1, day(8)).await.unwrap();
        let record = service.get(1, 10).await.unwrap().unwrap();
        assert_eq!(record.status, StreakStatus::PendingRestore);
        assert_eq!(record.lost_streak, 4);
        assert_eq!(record.current, 0);
    }

    #[tokio::test]
    async fn rejected_restore_clears_lost_streak() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=5).await;
        service.expire_missed(1, day(7)).await.unwrap();
        service.request_restore(1, 10, day(7), POLICY).await.unwrap();

        let record = service.reject_restore(1, 10, 99).await.unwrap();
        assert_eq!(record.status, StreakStatus::Expired);
        assert_eq!(record.lost_streak, 0);
        assert_eq!(
            service.request_restore(1, 10, day(7), POLICY).await,
            Err(StreakError::NothingToRestore)
        );
        assert_eq!(
            service.reject_restore(1, 10, 99).await,
            Err(StreakError::NotPending)
        );
    }

    #[tokio::test]
    async fn members_cannot_decide_their_own_restore() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=5).await;
        service.expire_missed(1, day(7)).await.unwrap();
        service.request_restore(1, 10, day(7), POLICY).await.unwrap();

        assert_eq!(
            service.approve_restore(1, 10, 10, day(7)).await,
            Err(StreakError::SelfDecision)
        );
        assert_eq!(
            service.reject_restore(1, 10, 10).await,
            Err(StreakError::SelfDecision)
        );
        let record = service.get(1, 10).await.unwrap().unwrap();
        assert_eq!(record.status, StreakStatus::PendingRestore);
        assert_eq!(record.current, 0);

        let restored = service.approve_restore(1, 10, 99, day(7)).await.unwrap();
        assert_eq!(restored.current, 5);
    }

    #[tokio::test]
    async fn withdrawn_restore_can_be_requested_again() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=5).await;
        service.expire_missed(1, day(7)).await.unwrap();
        service.request_restore(1, 10, day(7), POLICY).await.unwrap();

        let record = service.withdraw_restore(1, 10).await.unwrap();
        assert_eq!(record.status, StreakStatus::Expired);
        assert_eq!(record.lost_streak, 5);
        assert!(service.request_restore(1, 10, day(7), POLICY).await.is_ok());
    }

    #[tokio::test]
    async fn restore_window_and_monthly_limit() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=2).await;
        service.expire_missed(1, day(4)).await.unwrap();
        assert_eq!(
            service.request_restore(1, 10, day(8), POLICY).await,
            Err(StreakError::WindowClosed(3))
        );

        let one_per_month = RestorePolicy {
            window_days: 3,
            max_per_month: 1,
        };
        service.request_restore(1, 10, day(5), one_per_month).await.unwrap();
        service.approve_restore(1, 10, 99, day(5)).await.unwrap();

        service.expire_missed(1, day(10)).await.unwrap();
        assert_eq!(
            service.request_restore(1, 10, day(10), one_per_month).await,
            Err(StreakError::MonthlyLimit(1))
        );

        // A new month resets the count
        let april = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let mut record = service.get(1, 10).await.unwrap().unwrap();
        record.expired_on = Some(april);
        service.store.save(&record).await.unwrap();
        assert!(service
            .request_restore(1, 10, april, one_per_month)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn revoke_voids_todays_post() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=3).await;
        assert_eq!(service.get(1, 10).await.unwrap().unwrap().longest, 3);

        let record = service.revoke_post(1, 10, day(3)).await.unwrap();
        assert_eq!(record.current, 2);
        assert_eq!(record.longest, 2);
        assert_eq!(record.last_post_date, Some(day(2)));
        assert_eq!(
            service.revoke_post(1, 10, day(3)).await,
            Err(StreakError::NotCountedToday)
        );

        // The member can post again the same day
        assert_eq!(
            service.record_post(1, 10, day(3)).await.unwrap(),
            PostOutcome::Extended {
                current: 3,
                milestone: Some(3)
            }
        );
    }

    #[tokio::test]
    async fn revoke_keeps_an_older_best() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=5).await;
        service.expire_missed(1, day(10)).await.unwrap();
        build_streak(&service, 10..=11).await;

        let record = service.revoke_post(1, 10, day(11)).await.unwrap();
        assert_eq!(record.current, 1);
        assert_eq!(record.longest, 5);
    }

    #[tokio::test]
    async fn at_risk_and_leaderboard() {
        let service = StreakService::new(MockStreakStore::new());
        build_streak(&service, 1..=4).await;
        service.record_post(1, 11, day(4)).await.unwrap();
        service.record_post(1, 11, day(5)).await.unwrap();

        let at_risk = service.at_risk(1, day(5)).await.unwrap();
        assert_eq!(at_risk.len(), 1);
        assert_eq!(at_risk[0].user_id, 10);

        let top = service.leaderboard(1, 10).await.unwrap();
        let ids: Vec<u64> = top.iter().map(|r| r.user_id).collect();
        assert_eq!(ids, vec![10, 11]);

        assert!(service.reset(1, 10).await.unwrap());
        assert_eq!(service.leaderboard(1, 10).await.unwrap().len(), 1);
    }

    #[test]
    fn midnight_in_riyadh() {
        // 2024-03-01 20:30 UTC is 23:30 in Riyadh (UTC+3)
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 20, 30, 0).unwrap();
        let wait = duration_until_next_midnight(now, chrono_tz::Asia::Riyadh);
        assert_eq!(wait.as_secs(), 30 * 60);
        assert_eq!(local_today(now, chrono_tz::Asia::Riyadh), day(1));
    }

    #[test]
    fn midnight_across_dst_change() {
        // New York springs forward on 2024-03-10; that day has 23 hours
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap(); // 00:00 EST
        let wait = duration_until_next_midnight(now, chrono_tz::America::New_York);
        assert_eq!(wait.as_secs(), 23 * 3600);
    }
}
