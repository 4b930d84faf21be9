// Per-guild settings. Every other feature reads its knobs from here
// (admin roles, channels, timezone, cooldowns, limits).

use async_trait::async_trait;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

pub const DEFAULT_TIMEZONE: &str = "Asia/Riyadh";
pub const MAX_VACATION_DAYS: u64 = 365;
/// One week.
pub const MAX_CALL_COOLDOWN_SECS: u64 = 7 * 86400;

/// Configuration for a single guild.
///
/// Missing fields in older JSON files fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    pub guild_id: u64,
    /// Roles considered "administrative". Down and vacation strip these.
    pub admin_role_ids: Vec<u64>,
    pub log_channel_id: Option<u64>,
    pub approvals_channel_id: Option<u64>,
    pub streak_channel_id: Option<u64>,
    pub streak_require_media: bool,
    /// Local hour at which at-risk streak holders get a reminder DM.
    pub streak_reminder_hour: Option<u32>,
    pub timezone: String,
    pub points_per_claim: i64,
    pub call_cooldown_secs: u64,
    pub max_vacation_days: u32,
    pub rooms_category_id: Option<u64>,
    pub warnings_before_alert: u32,
    pub restore_window_days: u32,
    pub max_restores_per_month: u32,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self::defaults(0)
    }
}

impl GuildSettings {
    pub fn defaults(guild_id: u64) -> Self {
        Self {
            guild_id,
            admin_role_ids: Vec::new(),
            log_channel_id: None,
            approvals_channel_id: None,
            streak_channel_id: None,
            streak_require_media: false,
            streak_reminder_hour: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            points_per_claim: 1,
            call_cooldown_secs: 300,
            max_vacation_days: 30,
            rooms_category_id: None,
            warnings_before_alert: 3,
            restore_window_days: 3,
            max_restores_per_month: 2,
        }
    }

    /// Parsed timezone; invalid names fall back to UTC.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    pub fn is_admin_role(&self, role_id: u64) -> bool {
        self.admin_role_ids.contains(&role_id)
    }

    /// Channel used for approval requests, falling back to the log channel.
    pub fn approvals_target(&self) -> Option<u64> {
        self.approvals_channel_id.or(self.log_channel_id)
    }
}

/// Numeric knobs adjustable through `/settings tune`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knob {
    PointsPerClaim,
    CallCooldownSecs,
    MaxVacationDays,
    WarningsBeforeAlert,
    RestoreWindowDays,
    MaxRestoresPerMonth,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, guild_id: u64) -> Result<Option<GuildSettings>, SettingsError>;
    async fn save(&self, settings: GuildSettings) -> Result<(), SettingsError>;
    async fn all(&self) -> Result<Vec<GuildSettings>, SettingsError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct SettingsService<S: SettingsStore> {
    store: S,
    default_timezone: String,
}

impl<S: SettingsStore> SettingsService<S> {
    pub fn new(store: S, default_timezone: impl Into<String>) -> Self {
        Self {
            store,
            default_timezone: default_timezone.into(),
        }
    }

    /// Settings for a guild, or defaults if it was never configured.
    pub async fn get(&self, guild_id: u64) -> Result<GuildSettings, SettingsError> {
        Ok(self.store.get(guild_id).await?.unwrap_or_else(|| {
            let mut settings = GuildSettings::defaults(guild_id);
            settings.timezone = self.default_timezone.clone();
            settings
        }))
    }

    pub async fn all(&self) -> Result<Vec<GuildSettings>, SettingsError> {
        self.store.all().await
    }

    async fn update<F>(&self, guild_id: u64, apply: F) -> Result<GuildSettings, SettingsError>
    where
        F: FnOnce(&mut GuildSettings) -> Result<(), SettingsError> + Send,
    {
        let mut settings = self.get(guild_id).await?;
        apply(&mut settings)?;
        self.store.save(settings.clone()).await?;
        Ok(settings)
    }

    /// Returns false if the role was already registered.
    pub async fn add_admin_role(&self, guild_id: u64, role_id: u64) -> Result<bool, SettingsError> {
        let mut added = false;
        self.update(guild_id, |s| {
            if !s.admin_role_ids.contains(&role_id) {
                s.admin_role_ids.push(role_id);
                added = true;
            }
            Ok(())
        })
        .await?;
        Ok(added)
    }

    /// Returns false if the role was not registered.
    pub async fn remove_admin_role(
        &self,
        guild_id: u64,
        role_id: u64,
    ) -> Result<bool, SettingsError> {
        let mut removed = false;
        self.update(guild_id, |s| {
            let before = s.admin_role_ids.len();
            s.admin_role_ids.retain(|r| *r != role_id);
            removed = before != s.admin_role_ids.len();
            Ok(())
        })
        .await?;
        Ok(removed)
    }

    pub async fn set_log_channel(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
    ) -> Result<GuildSettings, SettingsError> {
        self.update(guild_id, |s| {
            s.log_channel_id = channel_id;
            Ok(())
        })
        .await
    }

    pub async fn set_approvals_channel(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
    ) -> Result<GuildSettings, SettingsError> {
        self.update(guild_id, |s| {
            s.approvals_channel_id = channel_id;
            Ok(())
        })
        .await
    }

    pub async fn set_streak_channel(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
        require_media: bool,
    ) -> Result<GuildSettings, SettingsError> {
        self.update(guild_id, |s| {
            s.streak_channel_id = channel_id;
            s.streak_require_media = require_media;
            Ok(())
        })
        .await
    }

    pub async fn set_rooms_category(
        &self,
        guild_id: u64,
        category_id: Option<u64>,
    ) -> Result<GuildSettings, SettingsError> {
        self.update(guild_id, |s| {
            s.rooms_category_id = category_id;
            Ok(())
        })
        .await
    }

    pub async fn set_timezone(
        &self,
        guild_id: u64,
        timezone: &str,
    ) -> Result<GuildSettings, SettingsError> {
        let tz: Tz = timezone
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidTimezone(timezone.to_string()))?;
        self.update(guild_id, |s| {
            s.timezone = tz.name().to_string();
            Ok(())
        })
        .await
    }

    pub async fn set_streak_reminder_hour(
        &self,
        guild_id: u64,
        hour: Option<u32>,
    ) -> Result<GuildSettings, SettingsError> {
        if let Some(h) = hour {
            if h > 23 {
                return Err(SettingsError::InvalidValue(format!(
                    "hour must be between 0 and 23, got {}",
                    h
                )));
            }
        }
        self.update(guild_id, |s| {
            s.streak_reminder_hour = hour;
            Ok(())
        })
        .await
    }

    pub async fn set_knob(
        &self,
        guild_id: u64,
        knob: Knob,
        value: u64,
    ) -> Result<GuildSettings, SettingsError> {
        let as_u32 = |v: u64| {
            u32::try_from(v).map_err(|_| SettingsError::InvalidValue(format!("{} is too large", v)))
        };

        self.update(guild_id, |s| {
            match knob {
                Knob::PointsPerClaim => {
                    if value > 1_000 {
                        return Err(SettingsError::InvalidValue(
                            "points per claim must be at most 1000".to_string(),
                        ));
                    }
                    s.points_per_claim = value as i64;
                }
                Knob::CallCooldownSecs => {
                    if value > MAX_CALL_COOLDOWN_SECS {
                        return Err(SettingsError::InvalidValue(format!(
                            "call cooldown must be at most {} seconds",
                            MAX_CALL_COOLDOWN_SECS
                        )));
                    }
                    s.call_cooldown_secs = value;
                }
                Knob::MaxVacationDays => {
                    if value == 0 || value > MAX_VACATION_DAYS {
                        return Err(SettingsError::InvalidValue(format!(
                            "max vacation days must be between 1 and {}",
                            MAX_VACATION_DAYS
                        )));
                    }
                    s.max_vacation_days = as_u32(value)?;
                }
                Knob::WarningsBeforeAlert => s.warnings_before_alert = as_u32(value)?,
                Knob::RestoreWindowDays => s.restore_window_days = as_u32(value)?,
                Knob::MaxRestoresPerMonth => s.max_restores_per_month = as_u32(value)?,
            }
            Ok(())
        })
        .await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    struct MockSettingsStore {
        data: DashMap<u64, GuildSettings>,
    }

    #[async_trait]
    impl SettingsStore for MockSettingsStore {
        async fn get(&self, guild_id: u64) -> Result<Option<GuildSettings>, SettingsError> {
            Ok(self.data.get(&guild_id).map(|s| s.clone()))
        }

        async fn save(&self, settings: GuildSettings) -> Result<(), SettingsError> {
            self.data.insert(settings.guild_id, settings);
            Ok(())
        }

        async fn all(&self) -> Result<Vec<GuildSettings>, SettingsError> {
            Ok(self.data.iter().map(|e| e.value().clone()).collect())
        }
    }

    fn make_service() -> SettingsService<MockSettingsStore> {
        SettingsService::new(
            MockSettingsStore {
                data: DashMap::new(),
            },
            "Europe/Berlin",
        )
    }

    #[tokio::test]
    async fn unconfigured_guild_gets_defaults() {
        let service = make_service();
        let settings = service.get(42).await.unwrap();
        assert_eq!(settings.guild_id, 42);
        assert_eq!(settings.timezone, "Europe/Berlin");
        assert_eq!(settings.points_per_claim, 1);
        assert!(settings.admin_role_ids.is_empty());
    }

    #[tokio::test]
    async fn admin_roles_are_deduplicated() {
        let service = make_service();
        assert!(service.add_admin_role(1, 10).await.unwrap());
        assert!(!service.add_admin_role(1, 10).await.unwrap());
        assert!(service.add_admin_role(1, 11).await.unwrap());
        assert_eq!(service.get(1).await.unwrap().admin_role_ids, vec![10, 11]);

        assert!(service.remove_admin_role(1, 10).await.unwrap());
        assert!(!service.remove_admin_role(1, 10).await.unwrap());
        assert_eq!(service.get(1).await.unwrap().admin_role_ids, vec![11]);
    }

    #[tokio::test]
    async fn timezone_is_validated() {
        let service = make_service();
        let err = service.set_timezone(1, "Mars/Olympus").await.unwrap_err();
        assert!(matches!(err, SettingsError::InvalidTimezone(_)));

        let settings = service.set_timezone(1, "Asia/Riyadh").await.unwrap();
        assert_eq!(settings.tz(), chrono_tz::Asia::Riyadh);
    }

    #[tokio::test]
    async fn reminder_hour_must_be_in_range() {
        let service = make_service();
        assert!(service.set_streak_reminder_hour(1, Some(24)).await.is_err());
        let s = service.set_streak_reminder_hour(1, Some(21)).await.unwrap();
        assert_eq!(s.streak_reminder_hour, Some(21));
        let s = service.set_streak_reminder_hour(1, None).await.unwrap();
        assert_eq!(s.streak_reminder_hour, None);
    }

    #[tokio::test]
    async fn knobs_reject_bad_values() {
        let service = make_service();
        assert!(service
            .set_knob(1, Knob::MaxVacationDays, 0)
            .await
            .is_err());
        assert!(service
            .set_knob(1, Knob::PointsPerClaim, 5_000)
            .await
            .is_err());
        let s = service.set_knob(1, Knob::PointsPerClaim, 3).await.unwrap();
        assert_eq!(s.points_per_claim, 3);
    }

    #[tokio::test]
    async fn time_knobs_are_bounded() {
        let service = make_service();
        assert!(service
            .set_knob(1, Knob::MaxVacationDays, u64::from(u32::MAX))
            .await
            .is_err());
        assert!(service
            .set_knob(1, Knob::CallCooldownSecs, u64::MAX)
            .await
            .is_err());
        let s = service.get(1).await.unwrap();
        assert_eq!(s.max_vacation_days, GuildSettings::defaults(1).max_vacation_days);
        assert_eq!(s.call_cooldown_secs, GuildSettings::defaults(1).call_cooldown_secs);

        let s = service
            .set_knob(1, Knob::MaxVacationDays, MAX_VACATION_DAYS)
            .await
            .unwrap();
        assert_eq!(s.max_vacation_days, 365);
        let s = service
            .set_knob(1, Knob::CallCooldownSecs, MAX_CALL_COOLDOWN_SECS)
            .await
            .unwrap();
        assert_eq!(s.call_cooldown_secs, MAX_CALL_COOLDOWN_SECS);
    }

    #[test]
    fn approvals_fall_back_to_log_channel() {
        let mut s = GuildSettings::defaults(1);
        assert_eq!(s.approvals_target(), None);
        s.log_channel_id = Some(5);
        assert_eq!(s.approvals_target(), Some(5));
        s.approvals_channel_id = Some(6);
        assert_eq!(s.approvals_target(), Some(6));
    }
}
