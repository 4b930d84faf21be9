// Per-member notification preferences. Members without a stored entry get
// the defaults.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    /// DMs when a responsibility you belong to is called.
    pub call_dms: bool,
    /// DM when your streak is about to expire.
    pub streak_reminders: bool,
    /// DMs about your down, vacation, and promotion status.
    pub status_dms: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            call_dms: true,
            streak_reminders: false,
            status_dms: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    CallDms,
    StreakReminders,
    StatusDms,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 3] = [
        NotificationKind::CallDms,
        NotificationKind::StreakReminders,
        NotificationKind::StatusDms,
    ];

    pub fn label(self) -> &'static str {
        match self {
            NotificationKind::CallDms => "Responsibility calls",
            NotificationKind::StreakReminders => "Streak reminders",
            NotificationKind::StatusDms => "Status updates",
        }
    }
}

impl NotificationPrefs {
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::CallDms => self.call_dms,
            NotificationKind::StreakReminders => self.streak_reminders,
            NotificationKind::StatusDms => self.status_dms,
        }
    }

    fn set(&mut self, kind: NotificationKind, enabled: bool) {
        match kind {
            NotificationKind::CallDms => self.call_dms = enabled,
            NotificationKind::StreakReminders => self.streak_reminders = enabled,
            NotificationKind::StatusDms => self.status_dms = enabled,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum NotificationError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn get(&self, user_id: u64) -> Result<Option<NotificationPrefs>, NotificationError>;

    async fn save(&self, user_id: u64, prefs: NotificationPrefs) -> Result<(), NotificationError>;
}

pub struct NotificationService<S: NotificationStore> {
    store: S,
}

impl<S: NotificationStore> NotificationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn prefs(&self, user_id: u64) -> Result<NotificationPrefs, NotificationError> {
        Ok(self.store.get(user_id).await?.unwrap_or_default())
    }

    pub async fn set(
        &self,
        user_id: u64,
        kind: NotificationKind,
        enabled: bool,
    ) -> Result<NotificationPrefs, NotificationError> {
        let mut prefs = self.prefs(user_id).await?;
        prefs.set(kind, enabled);
        self.store.save(user_id, prefs).await?;
        Ok(prefs)
    }

    /// Flip one preference, returning the new value.
    pub async fn toggle(
        &self,
        user_id: u64,
        kind: NotificationKind,
    ) -> Result<bool, NotificationError> {
        let enabled = !self.prefs(user_id).await?.allows(kind);
        self.set(user_id, kind, enabled).await?;
        Ok(enabled)
    }

    /// Whether a DM of this kind may be sent. Storage failures fall back to
    /// the default preference.
    pub async fn allows(&self, user_id: u64, kind: NotificationKind) -> bool {
        match self.prefs(user_id).await {
            Ok(prefs) => prefs.allows(kind),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to load notification prefs");
                NotificationPrefs::default().allows(kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    struct MockNotificationStore {
        prefs: DashMap<u64, NotificationPrefs>,
    }

    #[async_trait]
    impl NotificationStore for MockNotificationStore {
        async fn get(&self, user_id: u64) -> Result<Option<NotificationPrefs>, NotificationError> {
            Ok(self.prefs.get(&user_id).map(|p| *p))
        }

        async fn save(
            &self,
            user_id: u64,
            prefs: NotificationPrefs,
        ) -> Result<(), NotificationError> {
            self.prefs.insert(user_id, prefs);
            Ok(())
        }
    }

    fn service() -> NotificationService<MockNotificationStore> {
        NotificationService::new(MockNotificationStore {
            prefs: DashMap::new(),
        })
    }

    #[tokio::test]
    async fn defaults_apply_to_new_members() {
        let service = service();
        assert!(service.allows(1, NotificationKind::CallDms).await);
        assert!(!service.allows(1, NotificationKind::StreakReminders).await);
        assert!(service.allows(1, NotificationKind::StatusDms).await);
    }

    #[tokio::test]
    async fn toggle_flips_one_preference() {
        let service = service();
        assert!(service.toggle(1, NotificationKind::StreakReminders).await.unwrap());
        assert!(!service.toggle(1, NotificationKind::CallDms).await.unwrap());

        let prefs = service.prefs(1).await.unwrap();
        assert!(prefs.streak_reminders);
        assert!(!prefs.call_dms);
        assert!(prefs.status_dms);

        service.set(1, NotificationKind::CallDms, true).await.unwrap();
        assert!(service.allows(1, NotificationKind::CallDms).await);
    }
}
