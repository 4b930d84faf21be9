// Promotions grant a role (optionally replacing a lower one), either
// permanently or until an expiry. Members can be banned from promotion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionStatus {
    Active,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: u64,
    pub guild_id: u64,
    pub user_id: u64,
    pub role_id: u64,
    /// Role taken away when the promotion was granted, restored on expiry.
    pub replaced_role_id: Option<u64>,
    pub promoted_by: u64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: PromotionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionBan {
    pub guild_id: u64,
    pub user_id: u64,
    pub reason: String,
    pub banned_by: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PromotionBan {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
pub struct PromotionRequest<'a> {
    pub guild_id: u64,
    pub user_id: u64,
    pub role_id: u64,
    pub replaced_role_id: Option<u64>,
    /// Roles the member currently holds.
    pub held_role_ids: &'a [u64],
    pub promoted_by: u64,
    pub reason: &'a str,
    pub expires_at: Option<DateTime<Utc>>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum PromotionError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("You can't promote yourself")]
    SelfPromotion,

    #[error("This member is banned from promotions")]
    Banned(Option<DateTime<Utc>>),

    #[error("The member already holds that role")]
    AlreadyHasRole,

    #[error("The member does not hold the role being replaced")]
    ReplacedRoleNotHeld,

    #[error("No active promotion found")]
    NotFound,

    #[error("This member is already banned from promotions")]
    AlreadyBanned,

    #[error("This member is not banned from promotions")]
    NotBanned,

    #[error("You can't ban yourself")]
    SelfBan,

    #[error("Expiry must be in the future")]
    InvalidExpiry,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Assigns the next id and stores the promotion.
    async fn insert(&self, promotion: Promotion) -> Result<Promotion, PromotionError>;

    async fn update(&self, promotion: Promotion) -> Result<(), PromotionError>;

    async fn all(&self) -> Result<Vec<Promotion>, PromotionError>;

    async fn get_ban(&self, guild_id: u64, user_id: u64)
        -> Result<Option<PromotionBan>, PromotionError>;

    async fn save_ban(&self, ban: PromotionBan) -> Result<(), PromotionError>;

    async fn remove_ban(&self, guild_id: u64, user_id: u64) -> Result<bool, PromotionError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct PromotionService<S: PromotionStore> {
    store: S,
}

impl<S: PromotionStore> PromotionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a promotion. The caller applies the role changes on Discord.
    pub async fn promote(
        &self,
        request: PromotionRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<Promotion, PromotionError> {
        if request.user_id == request.promoted_by {
            return Err(PromotionError::SelfPromotion);
        }
        if let Some(at) = request.expires_at {
            if at <= now {
                return Err(PromotionError::InvalidExpiry);
            }
        }
        if let Some(ban) = self
            .active_ban(request.guild_id, request.user_id, now)
            .await?
        {
            return Err(PromotionError::Banned(ban.expires_at));
        }
        if request.held_role_ids.contains(&request.role_id) {
            return Err(PromotionError::AlreadyHasRole);
        }
        if let Some(replaced) = request.replaced_role_id {
            if !request.held_role_ids.contains(&replaced) {
                return Err(PromotionError::ReplacedRoleNotHeld);
            }
        }

        self.store
            .insert(Promotion {
                id: 0,
                guild_id: request.guild_id,
                user_id: request.user_id,
                role_id: request.role_id,
                replaced_role_id: request.replaced_role_id,
                promoted_by: request.promoted_by,
                reason: request.reason.trim().to_string(),
                created_at: now,
                expires_at: request.expires_at,
                status: PromotionStatus::Active,
            })
            .await
    }

    /// Revoke the member's active promotion to `role_id`.
    pub async fn revoke(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<Promotion, PromotionError> {
        let mut promotion = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|p| p.status == PromotionStatus::Active)
            .find(|p| p.guild_id == guild_id && p.user_id == user_id && p.role_id == role_id)
            .ok_or(PromotionError::NotFound)?;
        promotion.status = PromotionStatus::Revoked;
        self.store.update(promotion.clone()).await?;
        Ok(promotion)
    }

    /// Active promotions past their expiry.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Promotion>, PromotionError> {
        Ok(self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|p| p.status == PromotionStatus::Active)
            .filter(|p| p.expires_at.map(|at| at <= now).unwrap_or(false))
            .collect())
    }

    pub async fn expire(&self, id: u64) -> Result<Promotion, PromotionError> {
        let mut promotion = self
            .store
            .all()
            .await?
            .into_iter()
            .find(|p| p.id == id && p.status == PromotionStatus::Active)
            .ok_or(PromotionError::NotFound)?;
        promotion.status = PromotionStatus::Expired;
        self.store.update(promotion.clone()).await?;
        Ok(promotion)
    }

    /// Newest first.
    pub async fn history(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<Promotion>, PromotionError> {
        let mut list: Vec<Promotion> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|p| p.guild_id == guild_id && p.user_id == user_id)
            .collect();
        list.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(list)
    }

    pub async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
        banned_by: u64,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<PromotionBan, PromotionError> {
        if user_id == banned_by {
            return Err(PromotionError::SelfBan);
        }
        if let Some(at) = expires_at {
            if at <= now {
                return Err(PromotionError::InvalidExpiry);
            }
        }
        if self.active_ban(guild_id, user_id, now).await?.is_some() {
            return Err(PromotionError::AlreadyBanned);
        }
        let ban = PromotionBan {
            guild_id,
            user_id,
            reason: reason.trim().to_string(),
            banned_by,
            created_at: now,
            expires_at,
        };
        self.store.save_ban(ban.clone()).await?;
        Ok(ban)
    }

    pub async fn unban(&self, guild_id: u64, user_id: u64) -> Result<(), PromotionError> {
        if self.store.remove_ban(guild_id, user_id).await? {
            Ok(())
        } else {
            Err(PromotionError::NotBanned)
        }
    }

    /// The member's ban, if one is in force. Lapsed bans are removed.
    pub async fn active_ban(
        &self,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<PromotionBan>, PromotionError> {
        match self.store.get_ban(guild_id, user_id).await? {
            Some(ban) if ban.is_active(now) => Ok(Some(ban)),
            Some(_) => {
                self.store.remove_ban(guild_id, user_id).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct MockPromotionStore {
        promotions: DashMap<u64, Promotion>,
        bans: DashMap<(u64, u64), PromotionBan>,
        next_id: AtomicU64,
    }

    impl MockPromotionStore {
        fn new() -> Self {
            Self {
                promotions: DashMap::new(),
                bans: DashMap::new(),
                next_id: AtomicU64::new(1),
            }
        }
    }

    #[async_trait]
    impl PromotionStore for MockPromotionStore {
        async fn insert(&self, mut promotion: Promotion) -> Result<Promotion, PromotionError> {
            promotion.id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.promotions.insert(promotion.id, promotion.clone());
            Ok(promotion)
        }

        async fn update(&self, promotion: Promotion) -> Result<(), PromotionError> {
            self.promotions.insert(promotion.id, promotion);
            Ok(())
        }

        async fn all(&self) -> Result<Vec<Promotion>, PromotionError> {
            Ok(self.promotions.iter().map(|p| p.value().clone()).collect())
        }

        async fn get_ban(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Option<PromotionBan>, PromotionError> {
            Ok(self.bans.get(&(guild_id, user_id)).map(|b| b.clone()))
        }

        async fn save_ban(&self, ban: PromotionBan) -> Result<(), PromotionError> {
            self.bans.insert((ban.guild_id, ban.user_id), ban);
            Ok(())
        }

        async fn remove_ban(&self, guild_id: u64, user_id: u64) -> Result<bool, PromotionError> {
            Ok(self.bans.remove(&(guild_id, user_id)).is_some())
        }
    }

    fn request<'a>(held: &'a [u64]) -> PromotionRequest<'a> {
        PromotionRequest {
            guild_id: 1,
            user_id: 10,
            role_id: 500,
            replaced_role_id: Some(400),
            held_role_ids: held,
            promoted_by: 99,
            reason: "great work",
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn promote_checks_roles_and_self() {
        let service = PromotionService::new(MockPromotionStore::new());
        let now = Utc::now();

        assert_eq!(
            service.promote(request(&[]), now).await,
            Err(PromotionError::ReplacedRoleNotHeld)
        );
        assert_eq!(
            service.promote(request(&[400, 500]), now).await,
            Err(PromotionError::AlreadyHasRole)
        );
        let mut own = request(&[400]);
        own.promoted_by = own.user_id;
        assert_eq!(
            service.promote(own, now).await,
            Err(PromotionError::SelfPromotion)
        );

        let promotion = service.promote(request(&[400]), now).await.unwrap();
        assert_eq!(promotion.status, PromotionStatus::Active);
        assert_eq!(promotion.replaced_role_id, Some(400));
    }

    #[tokio::test]
    async fn temporary_promotions_become_due_and_expire() {
        let service = PromotionService::new(MockPromotionStore::new());
        let now = Utc::now();
        let mut req = request(&[400]);
        req.expires_at = Some(now + Duration::hours(1));
        let promotion = service.promote(req, now).await.unwrap();

        assert!(service.due(now).await.unwrap().is_empty());
        let due = service.due(now + Duration::hours(2)).await.unwrap();
        assert_eq!(due.len(), 1);

        let expired = service.expire(promotion.id).await.unwrap();
        assert_eq!(expired.status, PromotionStatus::Expired);
        assert!(service.due(now + Duration::hours(2)).await.unwrap().is_empty());
        assert_eq!(service.expire(promotion.id).await, Err(PromotionError::NotFound));
    }

    #[tokio::test]
    async fn revoke_marks_history() {
        let service = PromotionService::new(MockPromotionStore::new());
        let now = Utc::now();
        service.promote(request(&[400]), now).await.unwrap();

        let revoked = service.revoke(1, 10, 500).await.unwrap();
        assert_eq!(revoked.status, PromotionStatus::Revoked);
        assert_eq!(service.revoke(1, 10, 500).await, Err(PromotionError::NotFound));

        let history = service.history(1, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, PromotionStatus::Revoked);
    }

    #[tokio::test]
    async fn bans_block_promotion_until_lapsed() {
        let service = PromotionService::new(MockPromotionStore::new());
        let now = Utc::now();
        let until = now + Duration::days(1);

        service
            .ban(1, 10, "spam", 99, Some(until), now)
            .await
            .unwrap();
        assert_eq!(
            service.ban(1, 10, "again", 99, None, now).await,
            Err(PromotionError::AlreadyBanned)
        );
        assert_eq!(
            service.promote(request(&[400]), now).await,
            Err(PromotionError::Banned(Some(until)))
        );

        let later = now + Duration::days(2);
        assert!(service.active_ban(1, 10, later).await.unwrap().is_none());
        assert_eq!(service.unban(1, 10).await, Err(PromotionError::NotBanned));
        assert!(service.promote(request(&[400]), later).await.is_ok());
    }

    #[tokio::test]
    async fn unban_lifts_permanent_ban() {
        let service = PromotionService::new(MockPromotionStore::new());
        let now = Utc::now();
        service.ban(1, 10, "", 99, None, now).await.unwrap();
        assert!(service.active_ban(1, 10, now).await.unwrap().is_some());
        service.unban(1, 10).await.unwrap();
        assert!(service.active_ban(1, 10, now).await.unwrap().is_none());
        assert_eq!(
            service.ban(1, 99, "", 99, None, now).await,
            Err(PromotionError::SelfBan)
        );
    }
}
