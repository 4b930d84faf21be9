// Prayer module - daily prayer times and channel reminders

mod prayer_models;
mod prayer_service;

pub use prayer_models::{
    next_prayer, parse_time, DueReminder, Prayer, PrayerConfig, PrayerError, PrayerTimes,
    DEFAULT_METHOD,
};
pub use prayer_service::{PrayerConfigStore, PrayerService, PrayerTimesSource};
