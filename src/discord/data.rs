// Shared state handed to every command, event handler and background task.

use std::sync::Arc;

use chrono_tz::Tz;

use crate::core::colors::ColorService;
use crate::core::down::DownService;
use crate::core::moderation::{BlockService, WarningService};
use crate::core::notifications::NotificationService;
use crate::core::points::PointsService;
use crate::core::prayer::PrayerService;
use crate::core::promotion::PromotionService;
use crate::core::responsibility::ResponsibilityService;
use crate::core::rooms::RoomService;
use crate::core::settings::{GuildSettings, SettingsService};
use crate::core::streak::StreakService;
use crate::core::vacation::VacationService;
use crate::infra::colors::JsonColorStore;
use crate::infra::down::JsonDownStore;
use crate::infra::moderation::{JsonBlockStore, SqliteWarningStore};
use crate::infra::notifications::JsonNotificationStore;
use crate::infra::points::SqlitePointsStore;
use crate::infra::prayer::{AladhanClient, JsonPrayerConfigStore};
use crate::infra::promotion::JsonPromotionStore;
use crate::infra::responsibility::JsonResponsibilityStore;
use crate::infra::rooms::JsonRoomStore;
use crate::infra::settings::JsonSettingsStore;
use crate::infra::streak::SqliteStreakStore;
use crate::infra::vacation::JsonVacationStore;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type ApplicationContext<'a> = poise::ApplicationContext<'a, Data, Error>;

/// Guild id of a `guild_only` command.
pub fn require_guild(ctx: Context<'_>) -> Result<u64, Error> {
    Ok(ctx.guild_id().ok_or("Must be used in a server")?.get())
}

/// Cloned into background tasks, so every service sits behind an `Arc`.
#[derive(Clone)]
pub struct Data {
    pub settings: Arc<SettingsService<JsonSettingsStore>>,
    pub responsibilities: Arc<ResponsibilityService<JsonResponsibilityStore>>,
    pub points: Arc<PointsService<SqlitePointsStore>>,
    pub downs: Arc<DownService<JsonDownStore>>,
    pub vacations: Arc<VacationService<JsonVacationStore>>,
    pub promotions: Arc<PromotionService<JsonPromotionStore>>,
    pub streaks: Arc<StreakService<SqliteStreakStore>>,
    pub prayer: Arc<PrayerService<JsonPrayerConfigStore, AladhanClient>>,
    pub blocks: Arc<BlockService<JsonBlockStore>>,
    pub warnings: Arc<WarningService<SqliteWarningStore>>,
    pub notifications: Arc<NotificationService<JsonNotificationStore>>,
    pub colors: Arc<ColorService<JsonColorStore>>,
    pub rooms: Arc<RoomService<JsonRoomStore>>,
    /// Used when a guild's stored timezone can't be loaded.
    pub default_timezone: Tz,
}

impl Data {
    /// Guild settings, or defaults when the store fails. Event handlers use
    /// this so a storage hiccup doesn't drop the event entirely.
    pub async fn settings_or_default(&self, guild_id: u64) -> GuildSettings {
        match self.settings.get(guild_id).await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(guild_id, error = %e, "Falling back to default settings");
                let mut settings = GuildSettings::defaults(guild_id);
                settings.timezone = self.default_timezone.name().to_string();
                settings
            }
        }
    }

    pub async fn guild_tz(&self, guild_id: u64) -> Tz {
        self.settings_or_default(guild_id).await.tz()
    }
}
