// Prayer reminder scheduling. Times are fetched once per guild per day and
// cached; each reminder fires at most once, inside a short window after
// `time - lead_minutes`, so a late tick of the loop still posts it. All
// comparisons happen in the city's own zone, not the guild's.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use dashmap::{DashMap, DashSet};

use super::prayer_models::{
    DueReminder, Prayer, PrayerConfig, PrayerError, PrayerTimes, MAX_LEAD_MINUTES, MAX_METHOD,
};

/// How long after its fire time a reminder is still sent.
const REMINDER_WINDOW_MINUTES: i64 = 10;

#[async_trait]
pub trait PrayerTimesSource: Send + Sync {
    async fn fetch(
        &self,
        city: &str,
        country: &str,
        method: u8,
        date: NaiveDate,
    ) -> Result<PrayerTimes, PrayerError>;
}

#[async_trait]
pub trait PrayerConfigStore: Send + Sync {
    async fn get(&self, guild_id: u64) -> Result<Option<PrayerConfig>, PrayerError>;

    async fn save(&self, config: PrayerConfig) -> Result<(), PrayerError>;

    async fn remove(&self, guild_id: u64) -> Result<bool, PrayerError>;

    async fn all(&self) -> Result<Vec<PrayerConfig>, PrayerError>;
}

pub struct PrayerService<C: PrayerConfigStore, P: PrayerTimesSource> {
    configs: C,
    source: P,
    cache: DashMap<u64, PrayerTimes>,
    /// City zone per guild, learned from fetched times.
    zones: DashMap<u64, Tz>,
    sent: DashSet<(u64, NaiveDate, Prayer)>,
}

impl<C: PrayerConfigStore, P: PrayerTimesSource> PrayerService<C, P> {
    pub fn new(configs: C, source: P) -> Self {
        Self {
            configs,
            source,
            cache: DashMap::new(),
            zones: DashMap::new(),
            sent: DashSet::new(),
        }
    }

    pub async fn setup(&self, mut config: PrayerConfig) -> Result<PrayerConfig, PrayerError> {
        config.city = config.city.trim().to_string();
        config.country = config.country.trim().to_string();
        if config.city.is_empty() || config.country.is_empty() {
            return Err(PrayerError::InvalidLocation);
        }
        if config.lead_minutes > MAX_LEAD_MINUTES {
            return Err(PrayerError::InvalidLead);
        }
        if config.method > MAX_METHOD {
            return Err(PrayerError::InvalidMethod);
        }

        self.cache.remove(&config.guild_id);
        self.zones.remove(&config.guild_id);
        self.configs.save(config.clone()).await?;
        Ok(config)
    }

    pub async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<PrayerConfig, PrayerError> {
        let mut config = self
            .configs
            .get(guild_id)
            .await?
            .ok_or(PrayerError::NotConfigured)?;
        config.enabled = enabled;
        self.configs.save(config.clone()).await?;
        Ok(config)
    }

    pub async fn remove(&self, guild_id: u64) -> Result<(), PrayerError> {
        self.cache.remove(&guild_id);
        self.zones.remove(&guild_id);
        if self.configs.remove(guild_id).await? {
            Ok(())
        } else {
            Err(PrayerError::NotConfigured)
        }
    }

    pub async fn config(&self, guild_id: u64) -> Result<Option<PrayerConfig>, PrayerError> {
        self.configs.get(guild_id).await
    }

    pub async fn enabled_configs(&self) -> Result<Vec<PrayerConfig>, PrayerError> {
        Ok(self
            .configs
            .all()
            .await?
            .into_iter()
            .filter(|c| c.enabled)
            .collect())
    }

    /// Today's times for the guild, from cache when the date matches.
    pub async fn times(&self, guild_id: u64, date: NaiveDate) -> Result<PrayerTimes, PrayerError> {
        if let Some(cached) = self.cache.get(&guild_id) {
            if cached.date == date {
                return Ok(cached.clone());
            }
        }

        let config = self
            .configs
            .get(guild_id)
            .await?
            .ok_or(PrayerError::NotConfigured)?;
        let times = self
            .source
            .fetch(&config.city, &config.country, config.method, date)
            .await?;

        tracing::debug!(guild_id, %date, city = %config.city, "Fetched prayer times");
        if let Some(tz) = times.timezone {
            self.zones.insert(guild_id, tz);
        }
        self.cache.insert(guild_id, times.clone());
        Ok(times)
    }

    /// Wall-clock time in the configured city at `now`. `fallback` is used
    /// when the times source never reported the city's zone.
    pub async fn city_now(
        &self,
        guild_id: u64,
        now: DateTime<Utc>,
        fallback: Tz,
    ) -> Result<NaiveDateTime, PrayerError> {
        if let Some(tz) = self.zones.get(&guild_id).map(|z| *z) {
            return Ok(now.with_timezone(&tz).naive_local());
        }
        let times = self
            .times(guild_id, now.with_timezone(&fallback).date_naive())
            .await?;
        let tz = times.timezone.unwrap_or(fallback);
        Ok(now.with_timezone(&tz).naive_local())
    }

    /// The city's local time and that day's prayer times.
    pub async fn today(
        &self,
        guild_id: u64,
        now: DateTime<Utc>,
        fallback: Tz,
    ) -> Result<(NaiveDateTime, PrayerTimes), PrayerError> {
        let local = self.city_now(guild_id, now, fallback).await?;
        let times = self.times(guild_id, local.date()).await?;
        Ok((local, times))
    }

    /// Reminders to post at local time `now`. Each one is returned once.
    pub async fn due_reminders(
        &self,
        config: &PrayerConfig,
        now: NaiveDateTime,
    ) -> Result<Vec<DueReminder>, PrayerError> {
        if !config.enabled {
            return Ok(Vec::new());
        }
        let today = now.date();
        let times = self.times(config.guild_id, today).await?;

        // Forget markers from earlier days
        self.sent
            .retain(|(guild, date, _)| *guild != config.guild_id || *date == today);

        let lead = Duration::minutes(i64::from(config.lead_minutes));
        let window = Duration::minutes(REMINDER_WINDOW_MINUTES);
        let mut due = Vec::new();

        for (prayer, time) in times.iter() {
            let fire_at = today.and_time(time) - lead;
            if now < fire_at || now >= fire_at + window {
                continue;
            }
            if !self.sent.insert((config.guild_id, today, prayer)) {
                continue;
            }
            due.push(DueReminder {
                guild_id: config.guild_id,
                channel_id: config.channel_id,
                mention_role_id: config.mention_role_id,
                prayer,
                time,
                city: config.city.clone(),
            });
        }

        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockConfigStore {
        configs: DashMap<u64, PrayerConfig>,
    }

    #[async_trait]
    impl PrayerConfigStore for MockConfigStore {
        async fn get(&self, guild_id: u64) -> Result<Option<PrayerConfig>, PrayerError> {
            Ok(self.configs.get(&guild_id).map(|c| c.clone()))
        }

        async fn save(&self, config: PrayerConfig) -> Result<(), PrayerError> {
            self.configs.insert(config.guild_id, config);
            Ok(())
        }

        async fn remove(&self, guild_id: u64) -> Result<bool, PrayerError> {
            Ok(self.configs.remove(&guild_id).is_some())
        }

        async fn all(&self) -> Result<Vec<PrayerConfig>, PrayerError> {
            Ok(self.configs.iter().map(|c| c.value().clone()).collect())
        }
    }

    struct FixedSource {
        calls: AtomicUsize,
        timezone: Option<Tz>,
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[async_trait]
    impl PrayerTimesSource for FixedSource {
        async fn fetch(
            &self,
            _city: &str,
            _country: &str,
            _method: u8,
            date: NaiveDate,
        ) -> Result<PrayerTimes, PrayerError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(PrayerTimes {
                date,
                fajr: t(4, 50),
                dhuhr: t(12, 5),
                asr: t(15, 25),
                maghrib: t(17, 55),
                isha: t(19, 25),
                timezone: self.timezone,
            })
        }
    }

    fn service() -> PrayerService<MockConfigStore, FixedSource> {
        service_in(None)
    }

    fn service_in(timezone: Option<Tz>) -> PrayerService<MockConfigStore, FixedSource> {
        PrayerService::new(
            MockConfigStore {
                configs: DashMap::new(),
            },
            FixedSource {
                calls: AtomicUsize::new(0),
                timezone,
            },
        )
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        at(d, h, m).and_utc()
    }

    fn config(lead_minutes: u32) -> PrayerConfig {
        PrayerConfig {
            guild_id: 1,
            channel_id: 50,
            city: " Riyadh ".into(),
            country: "Saudi Arabia".into(),
            method: 4,
            mention_role_id: None,
            lead_minutes,
            enabled: true,
        }
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_time(t(h, m))
    }

    #[tokio::test]
    async fn setup_validates_input() {
        let service = service();
        let mut bad = config(5);
        bad.city = "  ".into();
        assert_eq!(service.setup(bad).await, Err(PrayerError::InvalidLocation));
        assert_eq!(service.setup(config(90)).await, Err(PrayerError::InvalidLead));

        let saved = service.setup(config(5)).await.unwrap();
        assert_eq!(saved.city, "Riyadh");
    }

    #[tokio::test]
    async fn times_are_cached_per_day() {
        let service = service();
        service.setup(config(0)).await.unwrap();
        let day1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        service.times(1, day1).await.unwrap();
        service.times(1, day1).await.unwrap();
        assert_eq!(service.source.calls.load(Ordering::Relaxed), 1);

        service.times(1, day2).await.unwrap();
        assert_eq!(service.source.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn reminders_fire_once_inside_window() {
        let service = service();
        let cfg = service.setup(config(10)).await.unwrap();

        // Dhuhr 12:05 with a 10-minute lead fires from 11:55
        assert!(service.due_reminders(&cfg, at(1, 11, 54)).await.unwrap().is_empty());

        let due = service.due_reminders(&cfg, at(1, 11, 57)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].prayer, Prayer::Dhuhr);
        assert_eq!(due[0].time, t(12, 5));

        assert!(service.due_reminders(&cfg, at(1, 11, 58)).await.unwrap().is_empty());
        // Past the window, nothing is sent
        assert!(service.due_reminders(&cfg, at(1, 15, 30)).await.unwrap().is_empty());

        // Next day the same prayer fires again
        assert_eq!(service.due_reminders(&cfg, at(2, 11, 55)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reminders_follow_the_city_zone_not_the_guild_zone() {
        let service = service_in(Some(chrono_tz::Asia::Tokyo));
        let cfg = service.setup(config(10)).await.unwrap();

        // 02:56 UTC is 11:56 in Tokyo, inside Dhuhr's 11:55 window
        let now = service.city_now(1, utc(1, 2, 56), chrono_tz::UTC).await.unwrap();
        assert_eq!(now, at(1, 11, 56));
        let due = service.due_reminders(&cfg, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].prayer, Prayer::Dhuhr);

        // 20:00 UTC on the 1st is already the 2nd in Tokyo
        let (local, times) = service.today(1, utc(1, 20, 0), chrono_tz::UTC).await.unwrap();
        assert_eq!(local, at(2, 5, 0));
        assert_eq!(times.date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[tokio::test]
    async fn guild_zone_is_the_fallback_without_a_city_zone() {
        let service = service();
        service.setup(config(0)).await.unwrap();
        let now = service
            .city_now(1, utc(1, 9, 0), chrono_tz::Asia::Riyadh)
            .await
            .unwrap();
        assert_eq!(now, at(1, 12, 0));
    }

    #[tokio::test]
    async fn disabled_and_removed_configs() {
        let service = service();
        service.setup(config(0)).await.unwrap();
        let cfg = service.set_enabled(1, false).await.unwrap();
        assert!(service.due_reminders(&cfg, at(1, 12, 5)).await.unwrap().is_empty());
        assert!(service.enabled_configs().await.unwrap().is_empty());

        service.remove(1).await.unwrap();
        assert_eq!(service.remove(1).await, Err(PrayerError::NotConfigured));
        assert_eq!(
            service.set_enabled(1, true).await.unwrap_err(),
            PrayerError::NotConfigured
        );
    }
}
