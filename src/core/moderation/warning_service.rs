// Warnings are stored permanently until a moderator removes or clears them.
// Reaching the guild's threshold triggers an alert in the log channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::moderation_models::{ModerationError, WarnOutcome, Warning};

const MAX_REASON_LEN: usize = 500;

#[async_trait]
pub trait WarningStore: Send + Sync {
    /// Store a new warning; the returned warning carries its id.
    async fn insert(&self, warning: Warning) -> Result<Warning, ModerationError>;

    /// Newest first.
    async fn list(&self, guild_id: u64, user_id: u64) -> Result<Vec<Warning>, ModerationError>;

    async fn count(&self, guild_id: u64, user_id: u64) -> Result<u32, ModerationError>;

    async fn delete(&self, guild_id: u64, id: i64) -> Result<bool, ModerationError>;

    async fn clear(&self, guild_id: u64, user_id: u64) -> Result<u64, ModerationError>;
}

pub struct WarningService<S: WarningStore> {
    store: S,
}

impl<S: WarningStore> WarningService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn warn(
        &self,
        guild_id: u64,
        user_id: u64,
        moderator_id: u64,
        reason: &str,
        alert_threshold: u32,
        now: DateTime<Utc>,
    ) -> Result<WarnOutcome, ModerationError> {
        if user_id == moderator_id {
            return Err(ModerationError::SelfTarget);
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ModerationError::EmptyReason);
        }

        let warning = self
            .store
            .insert(Warning {
                id: 0,
                guild_id,
                user_id,
                moderator_id,
                reason: reason.chars().take(MAX_REASON_LEN).collect(),
                created_at: now,
            })
            .await?;
        let total = self.store.count(guild_id, user_id).await?;

        tracing::info!(guild_id, user_id, moderator_id, total, "Warning issued");

        Ok(WarnOutcome {
            warning,
            total,
            threshold_reached: alert_threshold > 0 && total >= alert_threshold,
        })
    }

    pub async fn list(&self, guild_id: u64, user_id: u64) -> Result<Vec<Warning>, ModerationError> {
        self.store.list(guild_id, user_id).await
    }

    pub async fn count(&self, guild_id: u64, user_id: u64) -> Result<u32, ModerationError> {
        self.store.count(guild_id, user_id).await
    }

    pub async fn remove(&self, guild_id: u64, id: i64) -> Result<(), ModerationError> {
        if self.store.delete(guild_id, id).await? {
            Ok(())
        } else {
            Err(ModerationError::WarningNotFound(id))
        }
    }

    /// Returns how many warnings were removed.
    pub async fn clear(&self, guild_id: u64, user_id: u64) -> Result<u64, ModerationError> {
        self.store.clear(guild_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockWarningStore {
        warnings: Mutex<Vec<Warning>>,
    }

    #[async_trait]
    impl WarningStore for MockWarningStore {
        async fn insert(&self, mut warning: Warning) -> Result<Warning, ModerationError> {
            let mut warnings = self.warnings.lock().unwrap();
            warning.id = warnings.len() as i64 + 1;
            warnings.push(warning.clone());
            Ok(warning)
        }

        async fn list(&self, guild_id: u64, user_id: u64) -> Result<Vec<Warning>, ModerationError> {
            Ok(self
                .warnings
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|w| w.guild_id == guild_id && w.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn count(&self, guild_id: u64, user_id: u64) -> Result<u32, ModerationError> {
            Ok(self.list(guild_id, user_id).await?.len() as u32)
        }

        async fn delete(&self, guild_id: u64, id: i64) -> Result<bool, ModerationError> {
            let mut warnings = self.warnings.lock().unwrap();
            let before = warnings.len();
            warnings.retain(|w| !(w.guild_id == guild_id && w.id == id));
            Ok(warnings.len() != before)
        }

        async fn clear(&self, guild_id: u64, user_id: u64) -> Result<u64, ModerationError> {
            let mut warnings = self.warnings.lock().unwrap();
            let before = warnings.len();
            warnings.retain(|w| !(w.guild_id == guild_id && w.user_id == user_id));
            Ok((before - warnings.len()) as u64)
        }
    }

    fn service() -> WarningService<MockWarningStore> {
        WarningService::new(MockWarningStore {
            warnings: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn threshold_is_flagged() {
        let service = service();
        let now = Utc::now();

        let first = service.warn(1, 10, 99, "rude", 2, now).await.unwrap();
        assert_eq!(first.total, 1);
        assert!(!first.threshold_reached);

        let second = service.warn(1, 10, 99, "rude again", 2, now).await.unwrap();
        assert_eq!(second.total, 2);
        assert!(second.threshold_reached);

        // Threshold 0 disables alerts
        let third = service.warn(1, 10, 99, "still", 0, now).await.unwrap();
        assert!(!third.threshold_reached);
    }

    #[tokio::test]
    async fn rejects_self_and_empty_reason() {
        let service = service();
        let now = Utc::now();
        assert_eq!(
            service.warn(1, 10, 10, "x", 3, now).await,
            Err(ModerationError::SelfTarget)
        );
        assert_eq!(
            service.warn(1, 10, 99, "  ", 3, now).await,
            Err(ModerationError::EmptyReason)
        );
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let service = service();
        let now = Utc::now();
        let a = service.warn(1, 10, 99, "a", 3, now).await.unwrap();
        service.warn(1, 10, 99, "b", 3, now).await.unwrap();
        service.warn(1, 11, 99, "c", 3, now).await.unwrap();

        service.remove(1, a.warning.id).await.unwrap();
        assert_eq!(
            service.remove(1, a.warning.id).await,
            Err(ModerationError::WarningNotFound(a.warning.id))
        );
        assert_eq!(service.count(1, 10).await.unwrap(), 1);

        assert_eq!(service.clear(1, 10).await.unwrap(), 1);
        assert_eq!(service.count(1, 10).await.unwrap(), 0);
        assert_eq!(service.count(1, 11).await.unwrap(), 1);
    }
}
