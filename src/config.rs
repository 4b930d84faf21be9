// Process-level configuration loaded from `.env` and the environment.
// Per-guild settings live in the settings service instead.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

use crate::core::settings::DEFAULT_TIMEZONE;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PRAYER_API_BASE: &str = "https://api.aladhan.com/v1";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub data_dir: PathBuf,
    /// Register commands in this guild only (instant updates while developing).
    pub dev_guild_id: Option<u64>,
    pub default_timezone: Tz,
    pub prayer_api_base: String,
    pub sweep_interval: Duration,
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DISCORD_TOKEN`
    ///
    /// Optional:
    /// - `DATA_DIR` (default `data`)
    /// - `DEV_GUILD_ID`
    /// - `DEFAULT_TIMEZONE` (default `Asia/Riyadh`)
    /// - `PRAYER_API_BASE` (default Aladhan v1)
    /// - `SWEEP_INTERVAL_SECS` (default 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let data_dir = PathBuf::from(get("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into()));

        let dev_guild_id = match get("DEV_GUILD_ID") {
            Some(raw) => Some(parse_id("DEV_GUILD_ID", &raw)?),
            None => None,
        };

        let tz_raw = get("DEFAULT_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.into());
        let default_timezone = tz_raw.trim().parse::<Tz>().map_err(|_| ConfigError::Invalid {
            var: "DEFAULT_TIMEZONE",
            value: tz_raw.clone(),
        })?;

        let prayer_api_base = get("PRAYER_API_BASE")
            .unwrap_or_else(|| DEFAULT_PRAYER_API_BASE.into())
            .trim_end_matches('/')
            .to_string();

        let sweep_secs = match get("SWEEP_INTERVAL_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    var: "SWEEP_INTERVAL_SECS",
                    value: raw,
                })?,
            None => DEFAULT_SWEEP_INTERVAL_SECS,
        };

        Ok(Self {
            discord_token,
            data_dir,
            dev_guild_id,
            default_timezone,
            prayer_api_base,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

fn parse_id(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn token_is_required() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing("DISCORD_TOKEN")
        );
        assert_eq!(
            load(&[("DISCORD_TOKEN", "  ")]).unwrap_err(),
            ConfigError::Missing("DISCORD_TOKEN")
        );
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = load(&[("DISCORD_TOKEN", "abc")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.dev_guild_id, None);
        assert_eq!(config.default_timezone, chrono_tz::Asia::Riyadh);
        assert_eq!(config.prayer_api_base, "https://api.aladhan.com/v1");
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.data_file("downs.json"), PathBuf::from("data/downs.json"));
    }

    #[test]
    fn parses_overrides() {
        let config = load(&[
            ("DISCORD_TOKEN", "abc"),
            ("DATA_DIR", "/var/lib/bot"),
            ("DEV_GUILD_ID", "123456789"),
            ("DEFAULT_TIMEZONE", "Europe/Berlin"),
            ("PRAYER_API_BASE", "http://localhost:8080/"),
            ("SWEEP_INTERVAL_SECS", "15"),
        ])
        .unwrap();
        assert_eq!(config.dev_guild_id, Some(123456789));
        assert_eq!(config.default_timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.prayer_api_base, "http://localhost:8080");
        assert_eq!(config.sweep_interval, Duration::from_secs(15));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            load(&[("DISCORD_TOKEN", "abc"), ("DEV_GUILD_ID", "nope")]),
            Err(ConfigError::Invalid { var: "DEV_GUILD_ID", .. })
        ));
        assert!(matches!(
            load(&[("DISCORD_TOKEN", "abc"), ("DEFAULT_TIMEZONE", "Mars/Base")]),
            Err(ConfigError::Invalid { var: "DEFAULT_TIMEZONE", .. })
        ));
        assert!(matches!(
            load(&[("DISCORD_TOKEN", "abc"), ("SWEEP_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { var: "SWEEP_INTERVAL_SECS", .. })
        ));
    }
}
