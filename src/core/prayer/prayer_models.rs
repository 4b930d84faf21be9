// Prayer reminder domain types. Times are local to the configured city.

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aladhan's default calculation method (Umm Al-Qura, Makkah).
pub const DEFAULT_METHOD: u8 = 4;

/// Largest calculation method id the API accepts.
pub const MAX_METHOD: u8 = 23;

pub const MAX_LEAD_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Prayer {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    pub const ALL: [Prayer; 5] = [
        Prayer::Fajr,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }
}

impl std::fmt::Display for Prayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One day of prayer times.
#[derive(Debug, Clone, PartialEq)]
pub struct PrayerTimes {
    pub date: NaiveDate,
    pub fajr: NaiveTime,
    pub dhuhr: NaiveTime,
    pub asr: NaiveTime,
    pub maghrib: NaiveTime,
    pub isha: NaiveTime,
    /// The city's zone, when the source reports one.
    pub timezone: Option<Tz>,
}

impl PrayerTimes {
    pub fn get(&self, prayer: Prayer) -> NaiveTime {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Prayer, NaiveTime)> + '_ {
        Prayer::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

/// Per-guild reminder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerConfig {
    pub guild_id: u64,
    pub channel_id: u64,
    pub city: String,
    pub country: String,
    #[serde(default = "default_method")]
    pub method: u8,
    pub mention_role_id: Option<u64>,
    /// Minutes before the prayer time to post the reminder.
    #[serde(default)]
    pub lead_minutes: u32,
    pub enabled: bool,
}

fn default_method() -> u8 {
    DEFAULT_METHOD
}

/// A reminder that should be posted now.
#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub guild_id: u64,
    pub channel_id: u64,
    pub mention_role_id: Option<u64>,
    pub prayer: Prayer,
    pub time: NaiveTime,
    pub city: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum PrayerError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Prayer reminders are not set up in this server")]
    NotConfigured,

    #[error("City and country are required")]
    InvalidLocation,

    #[error("Lead time must be between 0 and 60 minutes")]
    InvalidLead,

    #[error("Calculation method must be between 0 and 23")]
    InvalidMethod,

    #[error("Could not fetch prayer times: {0}")]
    Fetch(String),

    #[error("Unexpected prayer time format: {0}")]
    Parse(String),
}

/// Parse an API time like "04:12" or "04:12 (+03)".
pub fn parse_time(raw: &str) -> Result<NaiveTime, PrayerError> {
    let clock = raw.split_whitespace().next().unwrap_or_default();
    NaiveTime::parse_from_str(clock, "%H:%M").map_err(|_| PrayerError::Parse(raw.to_string()))
}

/// The next prayer after `now` today, if any remain.
pub fn next_prayer(times: &PrayerTimes, now: NaiveTime) -> Option<(Prayer, NaiveTime)> {
    times.iter().find(|(_, time)| *time > now)
}
