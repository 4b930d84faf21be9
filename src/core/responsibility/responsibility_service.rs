// Responsibilities are named groups of members (plus the Discord roles
// that come with membership). Members can be "called" for a task: the
// first responsible member to claim the call wins it and earns points.
//
// No Discord types here - the discord layer turns returned role ids into
// role edits and calls into DMs with a claim button.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 50;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responsibility {
    /// Display name. Lookups are case-insensitive.
    pub name: String,
    pub description: Option<String>,
    /// Roles granted to every member of this responsibility.
    pub role_ids: Vec<u64>,
    pub member_ids: Vec<u64>,
    pub created_at: DateTime<Utc>,
}

impl Responsibility {
    pub fn key(&self) -> String {
        normalize(&self.name)
    }

    pub fn has_member(&self, user_id: u64) -> bool {
        self.member_ids.contains(&user_id)
    }
}

/// A request for help routed to the members of a responsibility.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsibilityCall {
    pub id: u64,
    pub guild_id: u64,
    pub responsibility: String,
    pub requester_id: u64,
    pub reason: String,
    /// Members the call was routed to (requester excluded).
    pub recipients: Vec<u64>,
    pub created_at: DateTime<Utc>,
    pub claimed_by: Option<u64>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum ResponsibilityError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Responsibility name must be 1-50 characters")]
    InvalidName,

    #[error("A responsibility named '{0}' already exists")]
    AlreadyExists(String),

    #[error("No responsibility named '{0}'")]
    NotFound(String),

    #[error("User is already a member of this responsibility")]
    AlreadyMember,

    #[error("User is not a member of this responsibility")]
    NotMember,

    #[error("Role is already attached to this responsibility")]
    RoleAlreadyAttached,

    #[error("Role is not attached to this responsibility")]
    RoleNotAttached,

    #[error("Nobody else is assigned to this responsibility")]
    NoMembers,

    #[error("Please give a reason for the call")]
    EmptyReason,

    #[error("You called this responsibility recently. Try again in {0} seconds")]
    OnCooldown(i64),

    #[error("That call no longer exists")]
    CallNotFound,

    #[error("Already claimed by <@{0}>")]
    AlreadyClaimed(u64),

    #[error("Only members of the responsibility can claim this call")]
    NotResponsible,

    #[error("You can't claim your own call")]
    OwnCall,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait ResponsibilityStore: Send + Sync {
    async fn list(&self, guild_id: u64) -> Result<Vec<Responsibility>, ResponsibilityError>;

    /// Insert or replace by normalized name.
    async fn save(
        &self,
        guild_id: u64,
        responsibility: Responsibility,
    ) -> Result<(), ResponsibilityError>;

    /// Returns true if something was deleted.
    async fn delete(&self, guild_id: u64, name: &str) -> Result<bool, ResponsibilityError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ResponsibilityService<S: ResponsibilityStore> {
    store: S,
    calls: DashMap<u64, ResponsibilityCall>,
    next_call_id: AtomicU64,
    /// (guild, requester, responsibility key) -> last call time
    cooldowns: DashMap<(u64, u64, String), DateTime<Utc>>,
}

/// Call ids start from the wall clock so buttons posted before a restart
/// never match calls opened after it.
pub fn call_id_seed(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp_millis())
        .unwrap_or(0)
        .saturating_mul(1_000)
        .max(1)
}

impl<S: ResponsibilityStore> ResponsibilityService<S> {
    pub fn new(store: S) -> Self {
        Self::with_call_id_seed(store, call_id_seed(Utc::now()))
    }

    pub fn with_call_id_seed(store: S, first_call_id: u64) -> Self {
        Self {
            store,
            calls: DashMap::new(),
            next_call_id: AtomicU64::new(first_call_id),
            cooldowns: DashMap::new(),
        }
    }

    pub async fn list(&self, guild_id: u64) -> Result<Vec<Responsibility>, ResponsibilityError> {
        let mut all = self.store.list(guild_id).await?;
        all.sort_by_key(|r| r.key());
        Ok(all)
    }

    pub async fn get(
        &self,
        guild_id: u64,
        name: &str,
    ) -> Result<Responsibility, ResponsibilityError> {
        let key = normalize(name);
        self.store
            .list(guild_id)
            .await?
            .into_iter()
            .find(|r| r.key() == key)
            .ok_or_else(|| ResponsibilityError::NotFound(name.trim().to_string()))
    }

    pub async fn create(
        &self,
        guild_id: u64,
        name: &str,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Responsibility, ResponsibilityError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LEN {
            return Err(ResponsibilityError::InvalidName);
        }

        if self.get(guild_id, trimmed).await.is_ok() {
            return Err(ResponsibilityError::AlreadyExists(trimmed.to_string()));
        }

        let responsibility = Responsibility {
            name: trimmed.to_string(),
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            role_ids: Vec::new(),
            member_ids: Vec::new(),
            created_at: now,
        };
        self.store.save(guild_id, responsibility.clone()).await?;
        Ok(responsibility)
    }

    /// Delete a responsibility. Returns it so the caller can revoke roles.
    pub async fn delete(
        &self,
        guild_id: u64,
        name: &str,
    ) -> Result<Responsibility, ResponsibilityError> {
        let existing = self.get(guild_id, name).await?;
        self.store.delete(guild_id, &existing.key()).await?;
        Ok(existing)
    }

    /// Add a member. Returns the role ids the member should receive.
    pub async fn add_member(
        &self,
        guild_id: u64,
        name: &str,
        user_id: u64,
    ) -> Result<Vec<u64>, ResponsibilityError> {
        let mut responsibility = self.get(guild_id, name).await?;
        if responsibility.has_member(user_id) {
            return Err(ResponsibilityError::AlreadyMember);
        }
        responsibility.member_ids.push(user_id);
        let roles = responsibility.role_ids.clone();
        self.store.save(guild_id, responsibility).await?;
        Ok(roles)
    }

    /// Remove a member. Returns the role ids the member should lose, minus
    /// any role still granted by another responsibility they belong to.
    pub async fn remove_member(
        &self,
        guild_id: u64,
        name: &str,
        user_id: u64,
    ) -> Result<Vec<u64>, ResponsibilityError> {
        let mut responsibility = self.get(guild_id, name).await?;
        if !responsibility.has_member(user_id) {
            return Err(ResponsibilityError::NotMember);
        }
        responsibility.member_ids.retain(|id| *id != user_id);
        let key = responsibility.key();
        let candidate_roles = responsibility.role_ids.clone();
        self.store.save(guild_id, responsibility).await?;

        let still_granted: Vec<u64> = self
            .store
            .list(guild_id)
            .await?
            .into_iter()
            .filter(|r| r.key() != key && r.has_member(user_id))
            .flat_map(|r| r.role_ids)
            .collect();

        Ok(candidate_roles
            .into_iter()
            .filter(|role| !still_granted.contains(role))
            .collect())
    }

    /// Attach a role. Returns current members so the caller can grant it.
    pub async fn add_role(
        &self,
        guild_id: u64,
        name: &str,
        role_id: u64,
    ) -> Result<Vec<u64>, ResponsibilityError> {
        let mut responsibility = self.get(guild_id, name).await?;
        if responsibility.role_ids.contains(&role_id) {
            return Err(ResponsibilityError::RoleAlreadyAttached);
        }
        responsibility.role_ids.push(role_id);
        let members = responsibility.member_ids.clone();
        self.store.save(guild_id, responsibility).await?;
        Ok(members)
    }

    /// Detach a role. Returns current members so the caller can revoke it.
    pub async fn remove_role(
        &self,
        guild_id: u64,
        name: &str,
        role_id: u64,
    ) -> Result<Vec<u64>, ResponsibilityError> {
        let mut responsibility = self.get(guild_id, name).await?;
        if !responsibility.role_ids.contains(&role_id) {
            return Err(ResponsibilityError::RoleNotAttached);
        }
        responsibility.role_ids.retain(|r| *r != role_id);
        let members = responsibility.member_ids.clone();
        self.store.save(guild_id, responsibility).await?;
        Ok(members)
    }

    /// Names of every responsibility the user belongs to.
    pub async fn responsibilities_of(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<String>, ResponsibilityError> {
        Ok(self
            .list(guild_id)
            .await?
            .into_iter()
            .filter(|r| r.has_member(user_id))
            .map(|r| r.name)
            .collect())
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    pub async fn open_call(
        &self,
        guild_id: u64,
        name: &str,
        requester_id: u64,
        reason: &str,
        cooldown_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<ResponsibilityCall, ResponsibilityError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ResponsibilityError::EmptyReason);
        }

        let responsibility = self.get(guild_id, name).await?;
        let cooldown_key = (guild_id, requester_id, responsibility.key());

        if let Some(last) = self.cooldowns.get(&cooldown_key) {
            let cooldown_secs = i64::try_from(cooldown_secs).unwrap_or(i64::MAX);
            let ready_at = Duration::try_seconds(cooldown_secs)
                .and_then(|cooldown| last.checked_add_signed(cooldown));
            match ready_at {
                Some(ready_at) if now >= ready_at => {}
                Some(ready_at) => {
                    return Err(ResponsibilityError::OnCooldown(
                        (ready_at - now).num_seconds().max(1),
                    ));
                }
                // Past the calendar limit, so the cooldown never lapses
                None => return Err(ResponsibilityError::OnCooldown(cooldown_secs)),
            }
        }

        let recipients: Vec<u64> = responsibility
            .member_ids
            .iter()
            .copied()
            .filter(|id| *id != requester_id)
            .collect();
        if recipients.is_empty() {
            return Err(ResponsibilityError::NoMembers);
        }

        let call = ResponsibilityCall {
            id: self.next_call_id.fetch_add(1, Ordering::Relaxed),
            guild_id,
            responsibility: responsibility.name,
            requester_id,
            reason: reason.to_string(),
            recipients,
            created_at: now,
            claimed_by: None,
        };

        self.cooldowns.insert(cooldown_key, now);
        self.calls.insert(call.id, call.clone());
        Ok(call)
    }

    pub fn get_call(&self, call_id: u64) -> Option<ResponsibilityCall> {
        self.calls.get(&call_id).map(|c| c.clone())
    }

    /// Claim a call. The first recipient to claim wins.
    pub fn claim_call(
        &self,
        call_id: u64,
        claimer_id: u64,
    ) -> Result<ResponsibilityCall, ResponsibilityError> {
        // Holding the entry guard makes check-and-set atomic per call.
        let mut call = self
            .calls
            .get_mut(&call_id)
            .ok_or(ResponsibilityError::CallNotFound)?;

        if let Some(winner) = call.claimed_by {
            return Err(ResponsibilityError::AlreadyClaimed(winner));
        }
        if claimer_id == call.requester_id {
            return Err(ResponsibilityError::OwnCall);
        }
        if !call.recipients.contains(&claimer_id) {
            return Err(ResponsibilityError::NotResponsible);
        }

        call.claimed_by = Some(claimer_id);
        Ok(call.clone())
    }

    /// Drop calls older than `older_than` and stale cooldown entries.
    pub fn prune_calls(&self, older_than: DateTime<Utc>) -> usize {
        let before = self.calls.len();
        self.calls.retain(|_, call| call.created_at >= older_than);
        self.cooldowns.retain(|_, at| *at >= older_than);
        before - self.calls.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
