// Streak day boundaries. Each guild's local date is checked every minute
// (or right after the next local midnight, if that comes sooner). The first
// tick of a new local day expires missed streaks, and the first tick of the
// reminder hour nudges members who haven't posted yet. A day only counts as
// handled once its job succeeded, so a failed run is retried next tick.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Timelike, Utc};
use tokio::time::sleep;

use crate::core::notifications::NotificationKind;
use crate::core::settings::GuildSettings;
use crate::core::streak::{duration_until_next_midnight, local_today};
use crate::discord::audit;
use crate::discord::Data;
use poise::serenity_prelude as serenity;

const TICK: Duration = Duration::from_secs(60);

#[derive(Default)]
struct ClockState {
    expired_through: HashMap<u64, NaiveDate>,
    reminded_on: HashMap<u64, NaiveDate>,
}

impl ClockState {
    /// Run `job` unless it already succeeded for this guild today. The day
    /// is marked done only when `job` reports success.
    async fn once_per_day<F, Fut>(
        map: &mut HashMap<u64, NaiveDate>,
        guild_id: u64,
        today: NaiveDate,
        job: F,
    ) where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        if map.get(&guild_id) == Some(&today) {
            return;
        }
        if job().await {
            map.insert(guild_id, today);
        }
    }
}

fn wants_reminder(settings: &GuildSettings, local_hour: u32) -> bool {
    settings.streak_channel_id.is_some() && settings.streak_reminder_hour == Some(local_hour)
}

pub async fn run(http: Arc<serenity::Http>, data: Data) {
    let mut state = ClockState::default();
    loop {
        let wait = match tick(&http, &data, &mut state).await {
            Some(midnight) => TICK.min(midnight + Duration::from_secs(1)),
            None => TICK,
        };
        sleep(wait).await;
    }
}

/// Returns how long until the soonest local midnight among streak guilds.
async fn tick(http: &serenity::Http, data: &Data, state: &mut ClockState) -> Option<Duration> {
    let guilds = match data.settings.all().await {
        Ok(all) => all,
        Err(e) => {
            tracing::error!("Failed to load guild settings for streak clock: {}", e);
            return None;
        }
    };

    let now = Utc::now();
    let mut soonest: Option<Duration> = None;
    for settings in guilds.iter().filter(|s| s.streak_channel_id.is_some()) {
        let tz = settings.tz();
        let today = local_today(now, tz);
        let until_midnight = duration_until_next_midnight(now, tz);
        soonest = Some(soonest.map_or(until_midnight, |d| d.min(until_midnight)));

        ClockState::once_per_day(&mut state.expired_through, settings.guild_id, today, || {
            expire(http, data, settings, today)
        })
        .await;

        let local_hour = now.with_timezone(&tz).hour();
        if wants_reminder(settings, local_hour) {
            ClockState::once_per_day(&mut state.reminded_on, settings.guild_id, today, || {
                remind(http, data, settings.guild_id, today)
            })
            .await;
        }
    }
    soonest
}

/// False if the expiry pass failed and should run again.
async fn expire(
    http: &serenity::Http,
    data: &Data,
    settings: &GuildSettings,
    today: NaiveDate,
) -> bool {
    let expired = match data.streaks.expire_missed(settings.guild_id, today).await {
        Ok(expired) => expired,
        Err(e) => {
            tracing::error!(guild_id = settings.guild_id, "Failed to expire streaks: {}", e);
            return false;
        }
    };
    if expired.is_empty() {
        return true;
    }
    tracing::info!(guild_id = settings.guild_id, count = expired.len(), %today, "Streaks expired");

    for record in expired.iter().filter(|r| r.lost_streak > 0) {
        audit::notify(
            http,
            data,
            record.user_id,
            NotificationKind::StreakReminders,
            serenity::CreateMessage::new().content(format!(
                "💤 Your {}-day streak ended. Use `/streak restore` within {} day(s) to ask for it back.",
                record.lost_streak, settings.restore_window_days
            )),
        )
        .await;
    }
    true
}

async fn remind(http: &serenity::Http, data: &Data, guild_id: u64, today: NaiveDate) -> bool {
    let at_risk = match data.streaks.at_risk(guild_id, today).await {
        Ok(list) => list,
        Err(e) => {
            tracing::error!(guild_id, "Failed to load at-risk streaks: {}", e);
            return false;
        }
    };

    let mut sent = 0;
    for record in at_risk {
        let delivered = audit::notify(
            http,
            data,
            record.user_id,
            NotificationKind::StreakReminders,
            serenity::CreateMessage::new().content(format!(
                "⏰ Your {}-day streak ends at midnight. Post today to keep it!",
                record.current
            )),
        )
        .await;
        if delivered {
            sent += 1;
        }
    }
    tracing::info!(guild_id, sent, "Streak reminders sent");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    async fn run_job(
        map: &mut HashMap<u64, NaiveDate>,
        guild_id: u64,
        today: NaiveDate,
        ok: bool,
    ) -> bool {
        let mut ran = false;
        ClockState::once_per_day(map, guild_id, today, || {
            ran = true;
            async move { ok }
        })
        .await;
        ran
    }

    #[tokio::test]
    async fn job_runs_once_per_day() {
        let mut map = HashMap::new();
        assert!(run_job(&mut map, 1, day(1), true).await);
        assert!(!run_job(&mut map, 1, day(1), true).await);
        assert!(run_job(&mut map, 2, day(1), true).await);
        assert!(run_job(&mut map, 1, day(2), true).await);
    }

    #[tokio::test]
    async fn failed_job_is_retried_next_tick() {
        let mut map = HashMap::new();
        assert!(run_job(&mut map, 1, day(1), false).await);
        // The storage error cleared; the same day runs again
        assert!(run_job(&mut map, 1, day(1), true).await);
        assert!(!run_job(&mut map, 1, day(1), true).await);
    }

    #[test]
    fn reminders_need_a_channel_and_matching_hour() {
        let mut settings = GuildSettings::defaults(1);
        settings.streak_reminder_hour = Some(20);
        assert!(!wants_reminder(&settings, 20));

        settings.streak_channel_id = Some(5);
        assert!(wants_reminder(&settings, 20));
        assert!(!wants_reminder(&settings, 19));

        settings.streak_reminder_hour = None;
        assert!(!wants_reminder(&settings, 20));
    }
}
