// Vacations suspend a member's administrative roles for an approved number
// of days. Lifecycle:
//
//   Pending -> Active -> Ended
//   Pending -> Rejected
//   Pending -> Cancelled

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_REASON_LEN: usize = 500;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VacationStatus {
    Pending,
    Active,
    Ended,
    Rejected,
    Cancelled,
}

impl VacationStatus {
    pub fn is_open(self) -> bool {
        matches!(self, VacationStatus::Pending | VacationStatus::Active)
    }

    pub fn label(self) -> &'static str {
        match self {
            VacationStatus::Pending => "Pending",
            VacationStatus::Active => "Active",
            VacationStatus::Ended => "Ended",
            VacationStatus::Rejected => "Rejected",
            VacationStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vacation {
    pub id: u64,
    pub guild_id: u64,
    pub user_id: u64,
    pub reason: String,
    pub days: u32,
    pub requested_at: DateTime<Utc>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: VacationStatus,
    pub decided_by: Option<u64>,
    pub decision_note: Option<String>,
    /// Admin roles removed when the vacation started.
    #[serde(default)]
    pub held_role_ids: Vec<u64>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum VacationError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Vacation length must be between 1 and {0} days")]
    InvalidDays(u32),

    #[error("Please give a reason (up to 500 characters)")]
    InvalidReason,

    #[error("You already have an open vacation request")]
    AlreadyOpen,

    #[error("Vacation #{0} not found")]
    NotFound(u64),

    #[error("No open vacation found")]
    NoneOpen,

    #[error("This request has already been decided")]
    NotPending,

    #[error("This vacation is not active")]
    NotActive,

    #[error("Vacation end date is out of range")]
    EndOutOfRange,

    #[error("You can't decide your own vacation request")]
    SelfDecision,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait VacationStore: Send + Sync {
    /// Assigns the next id and stores the vacation.
    async fn insert(&self, vacation: Vacation) -> Result<Vacation, VacationError>;

    async fn get(&self, id: u64) -> Result<Option<Vacation>, VacationError>;

    async fn update(&self, vacation: Vacation) -> Result<(), VacationError>;

    async fn all(&self) -> Result<Vec<Vacation>, VacationError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct VacationService<S: VacationStore> {
    store: S,
}

impl<S: VacationStore> VacationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn request(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        days: u32,
        max_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vacation, VacationError> {
        if days == 0 || days > max_days {
            return Err(VacationError::InvalidDays(max_days));
        }
        let reason = reason.trim();
        if reason.is_empty() || reason.chars().count() > MAX_REASON_LEN {
            return Err(VacationError::InvalidReason);
        }
        if self.current(guild_id, user_id).await?.is_some() {
            return Err(VacationError::AlreadyOpen);
        }

        self.store
            .insert(Vacation {
                id: 0,
                guild_id,
                user_id,
                reason: reason.to_string(),
                days,
                requested_at: now,
                starts_at: None,
                ends_at: None,
                status: VacationStatus::Pending,
                decided_by: None,
                decision_note: None,
                held_role_ids: Vec::new(),
            })
            .await
    }

    async fn pending(&self, id: u64, approver_id: u64) -> Result<Vacation, VacationError> {
        let vacation = self
            .store
            .get(id)
            .await?
            .ok_or(VacationError::NotFound(id))?;
        if vacation.status != VacationStatus::Pending {
            return Err(VacationError::NotPending);
        }
        if vacation.user_id == approver_id {
            return Err(VacationError::SelfDecision);
        }
        Ok(vacation)
    }

    /// Start the vacation. `held_admin_role_ids` are the admin roles the
    /// member holds right now; the caller removes them on Discord.
    pub async fn approve(
        &self,
        id: u64,
        approver_id: u64,
        held_admin_role_ids: Vec<u64>,
        now: DateTime<Utc>,
    ) -> Result<Vacation, VacationError> {
        let mut vacation = self.pending(id, approver_id).await?;
        let ends_at = Duration::try_days(i64::from(vacation.days))
            .and_then(|length| now.checked_add_signed(length))
            .ok_or(VacationError::EndOutOfRange)?;
        vacation.status = VacationStatus::Active;
        vacation.starts_at = Some(now);
        vacation.ends_at = Some(ends_at);
        vacation.decided_by = Some(approver_id);
        vacation.held_role_ids = held_admin_role_ids;
        self.store.update(vacation.clone()).await?;
        Ok(vacation)
    }

    pub async fn reject(
        &self,
        id: u64,
        approver_id: u64,
        note: Option<String>,
    ) -> Result<Vacation, VacationError> {
        let mut vacation = self.pending(id, approver_id).await?;
        vacation.status = VacationStatus::Rejected;
        vacation.decided_by = Some(approver_id);
        vacation.decision_note = note.filter(|n| !n.trim().is_empty());
        self.store.update(vacation.clone()).await?;
        Ok(vacation)
    }

    /// Withdraw a pending request.
    pub async fn cancel(&self, guild_id: u64, user_id: u64) -> Result<Vacation, VacationError> {
        let mut vacation = self
            .current(guild_id, user_id)
            .await?
            .ok_or(VacationError::NoneOpen)?;
        if vacation.status != VacationStatus::Pending {
            return Err(VacationError::NotPending);
        }
        vacation.status = VacationStatus::Cancelled;
        self.store.update(vacation.clone()).await?;
        Ok(vacation)
    }

    /// Come back before the approved end date.
    pub async fn end_early(
        &self,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Vacation, VacationError> {
        let vacation = self
            .current(guild_id, user_id)
            .await?
            .ok_or(VacationError::NoneOpen)?;
        if vacation.status != VacationStatus::Active {
            return Err(VacationError::NotActive);
        }
        self.finish(vacation, now).await
    }

    /// Active vacations whose end date has passed.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Vacation>, VacationError> {
        Ok(self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|v| v.status == VacationStatus::Active)
            .filter(|v| v.ends_at.map(|at| at <= now).unwrap_or(false))
            .collect())
    }

    /// Mark a due vacation as ended once roles are restored.
    pub async fn complete(&self, id: u64, now: DateTime<Utc>) -> Result<Vacation, VacationError> {
        let vacation = self
            .store
            .get(id)
            .await?
            .ok_or(VacationError::NotFound(id))?;
        if vacation.status != VacationStatus::Active {
            return Err(VacationError::NotActive);
        }
        self.finish(vacation, now).await
    }

    async fn finish(
        &self,
        mut vacation: Vacation,
        now: DateTime<Utc>,
    ) -> Result<Vacation, VacationError> {
        vacation.status = VacationStatus::Ended;
        if vacation.ends_at.map(|at| at > now).unwrap_or(true) {
            vacation.ends_at = Some(now);
        }
        self.store.update(vacation.clone()).await?;
        Ok(vacation)
    }

    pub async fn get(&self, id: u64) -> Result<Option<Vacation>, VacationError> {
        self.store.get(id).await
    }

    /// The member's pending or active vacation, if any.
    pub async fn current(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<Vacation>, VacationError> {
        Ok(self
            .store
            .all()
            .await?
            .into_iter()
            .find(|v| v.guild_id == guild_id && v.user_id == user_id && v.status.is_open()))
    }

    /// All of a member's vacations, newest first.
    pub async fn history(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<Vacation>, VacationError> {
        let mut list: Vec<Vacation> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|v| v.guild_id == guild_id && v.user_id == user_id)
            .collect();
        list.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(list)
    }

    /// Open vacations in a guild, oldest first.
    pub async fn list_open(&self, guild_id: u64) -> Result<Vec<Vacation>, VacationError> {
        let mut list: Vec<Vacation> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|v| v.guild_id == guild_id && v.status.is_open())
            .collect();
        list.sort_by_key(|v| v.id);
        Ok(list)
    }

    /// Roles that must stay removed while the member is on vacation.
    pub async fn held_roles(&self, guild_id: u64, user_id: u64) -> Result<Vec<u64>, VacationError> {
        Ok(self
            .current(guild_id, user_id)
            .await?
            .filter(|v| v.status == VacationStatus::Active)
            .map(|v| v.held_role_ids)
            .unwrap_or_default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct MockVacationStore {
        vacations: DashMap<u64, Vacation>,
        next_id: AtomicU64,
    }

    impl MockVacationStore {
        fn new() -> Self {
            Self {
                vacations: DashMap::new(),
                next_id: AtomicU64::new(1),
            }
        }
    }

    #[async_trait]
    impl VacationStore for MockVacationStore {
        async fn insert(&self, mut vacation: Vacation) -> Result<Vacation, VacationError> {
            vacation.id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.vacations.insert(vacation.id, vacation.clone());
            Ok(vacation)
        }

        async fn get(&self, id: u64) -> Result<Option<Vacation>, VacationError> {
            Ok(self.vacations.get(&id).map(|v| v.clone()))
        }

        async fn update(&self, vacation: Vacation) -> Result<(), VacationError> {
            self.vacations.insert(vacation.id, vacation);
            Ok(())
        }

        async fn all(&self) -> Result<Vec<Vacation>, VacationError> {
            Ok(self.vacations.iter().map(|v| v.value().clone()).collect())
        }
    }

    fn service() -> VacationService<MockVacationStore> {
        VacationService::new(MockVacationStore::new())
    }

    #[tokio::test]
    async fn request_validates_days_reason_and_duplicates() {
        let service = service();
        let now = Utc::now();

        assert_eq!(
            service.request(1, 10, "trip", 0, 30, now).await,
            Err(VacationError::InvalidDays(30))
        );
        assert_eq!(
            service.request(1, 10, "trip", 31, 30, now).await,
            Err(VacationError::InvalidDays(30))
        );
        assert_eq!(
            service.request(1, 10, "   ", 3, 30, now).await,
            Err(VacationError::InvalidReason)
        );

        let vacation = service.request(1, 10, "trip", 3, 30, now).await.unwrap();
        assert_eq!(vacation.status, VacationStatus::Pending);
        assert_eq!(
            service.request(1, 10, "again", 3, 30, now).await,
            Err(VacationError::AlreadyOpen)
        );
        // Other guilds are independent
        assert!(service.request(2, 10, "trip", 3, 30, now).await.is_ok());
    }

    #[tokio::test]
    async fn approve_starts_clock_and_holds_roles() {
        let service = service();
        let now = Utc::now();
        let v = service.request(1, 10, "exams", 5, 30, now).await.unwrap();

        assert_eq!(
            service.approve(v.id, 10, vec![100], now).await,
            Err(VacationError::SelfDecision)
        );

        let active = service.approve(v.id, 99, vec![100, 101], now).await.unwrap();
        assert_eq!(active.status, VacationStatus::Active);
        assert_eq!(active.ends_at, Some(now + Duration::days(5)));
        assert_eq!(service.held_roles(1, 10).await.unwrap(), vec![100, 101]);

        assert_eq!(
            service.approve(v.id, 99, vec![], now).await,
            Err(VacationError::NotPending)
        );
        assert_eq!(service.cancel(1, 10).await, Err(VacationError::NotPending));
    }

    #[tokio::test]
    async fn approve_rejects_end_date_past_calendar_limit() {
        let service = service();
        let now = Utc::now();
        let v = service
            .request(1, 10, "forever", u32::MAX, u32::MAX, now)
            .await
            .unwrap();

        assert_eq!(
            service.approve(v.id, 99, vec![100], now).await,
            Err(VacationError::EndOutOfRange)
        );
        let still = service.current(1, 10).await.unwrap().unwrap();
        assert_eq!(still.status, VacationStatus::Pending);
        assert!(still.held_role_ids.is_empty());
    }

    #[tokio::test]
    async fn reject_and_cancel_close_the_request() {
        let service = service();
        let now = Utc::now();

        let v = service.request(1, 10, "trip", 2, 30, now).await.unwrap();
        let rejected = service
            .reject(v.id, 99, Some("busy week".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, VacationStatus::Rejected);
        assert_eq!(rejected.decision_note.as_deref(), Some("busy week"));
        assert!(service.current(1, 10).await.unwrap().is_none());

        service.request(1, 10, "trip", 2, 30, now).await.unwrap();
        let cancelled = service.cancel(1, 10).await.unwrap();
        assert_eq!(cancelled.status, VacationStatus::Cancelled);
        assert_eq!(service.cancel(1, 10).await, Err(VacationError::NoneOpen));

        assert_eq!(service.history(1, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn due_vacations_complete_and_end_early() {
        let service = service();
        let now = Utc::now();

        let a = service.request(1, 10, "a", 1, 30, now).await.unwrap();
        service.approve(a.id, 99, vec![100], now).await.unwrap();
        let b = service.request(1, 11, "b", 7, 30, now).await.unwrap();
        service.approve(b.id, 99, vec![100], now).await.unwrap();

        let later = now + Duration::days(2);
        let due = service.due(later).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].user_id, 10);

        let ended = service.complete(a.id, later).await.unwrap();
        assert_eq!(ended.status, VacationStatus::Ended);
        assert_eq!(ended.ends_at, Some(now + Duration::days(1)));
        assert!(service.due(later).await.unwrap().is_empty());

        let early = service.end_early(1, 11, later).await.unwrap();
        assert_eq!(early.status, VacationStatus::Ended);
        assert_eq!(early.ends_at, Some(later));
        assert!(service.held_roles(1, 11).await.unwrap().is_empty());
        assert!(service.list_open(1).await.unwrap().is_empty());
    }
}
