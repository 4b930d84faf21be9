// Human duration parsing shared by down, vacation, and promotion commands.
//
// Accepts compact ("30m", "2h", "1d", "1w", "45s") and verbose
// ("30 minutes", "2 hours", "1 day") forms.

use std::time::Duration;

/// Longest length a timed action may have (10 years).
pub const MAX_DURATION: Duration = Duration::from_secs(3650 * 86400);

/// How long a timed action (down, promotion, ban) should last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Permanent,
    For(Duration),
}

impl Length {
    /// Expiry time relative to `now`, or `None` for permanent actions.
    pub fn expires_at(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            Length::Permanent => None,
            Length::For(d) => chrono::Duration::from_std((*d).min(MAX_DURATION))
                .ok()
                .and_then(|d| now.checked_add_signed(d)),
        }
    }
}

/// Parse a length argument. Missing input or "perm"/"permanent"/"forever"
/// means permanent.
pub fn parse_length(input: Option<&str>) -> Option<Length> {
    match input.map(|s| s.trim().to_lowercase()) {
        None => Some(Length::Permanent),
        Some(s) if s.is_empty() => Some(Length::Permanent),
        Some(s) if matches!(s.as_str(), "perm" | "permanent" | "forever" | "∞") => {
            Some(Length::Permanent)
        }
        Some(s) => parse_duration(&s).map(Length::For),
    }
}

/// Parse a duration string like "30 minutes", "2h", "1 day" into a Duration.
/// Zero and anything past `MAX_DURATION` are rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();

    let parsed = parse_compact_format(&input).or_else(|| parse_verbose_format(&input))?;
    if parsed.is_zero() || parsed > MAX_DURATION {
        return None;
    }
    Some(parsed)
}

fn parse_compact_format(input: &str) -> Option<Duration> {
    let unit = input.chars().last()?;
    let multiplier = match unit {
        's' => 1u64,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 604800,
        _ => return None,
    };

    let num_str = input[..input.len() - unit.len_utf8()].trim();
    if num_str.is_empty() || !num_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let number: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(number.checked_mul(multiplier)?))
}

fn parse_verbose_format(input: &str) -> Option<Duration> {
    let parts: Vec<&str> = input.split_whitespace().collect();

    if parts.len() != 2 {
        return None;
    }

    let number: u64 = parts[0].parse().ok()?;
    let multiplier = match parts[1] {
        "second" | "seconds" | "sec" | "secs" => 1,
        "minute" | "minutes" | "min" | "mins" => 60,
        "hour" | "hours" | "hr" | "hrs" => 3600,
        "day" | "days" => 86400,
        "week" | "weeks" => 604800,
        _ => return None,
    };

    Some(Duration::from_secs(number.checked_mul(multiplier)?))
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Format a Duration into a human-readable string.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{} second{}", total_secs, plural(total_secs))
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, plural(mins))
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins > 0 {
            format!(
                "{} hour{} and {} minute{}",
                hours,
                plural(hours),
                mins,
                plural(mins)
            )
        } else {
            format!("{} hour{}", hours, plural(hours))
        }
    } else {
        let days = total_secs / 86400;
        let hours = (total_secs % 86400) / 3600;
        if hours > 0 {
            format!(
                "{} day{} and {} hour{}",
                days,
                plural(days),
                hours,
                plural(hours)
            )
        } else {
            format!("{} day{}", days, plural(days))
        }
    }
}

/// Render an optional expiry as a Discord relative timestamp.
pub fn describe_expiry(expires_at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    match expires_at {
        Some(at) => format!("<t:{}:R>", at.timestamp()),
        None => "Permanent".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compact_units() {
        assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86400)));
        assert_eq!(parse_duration("1w"), Some(Duration::from_secs(604800)));
    }

    #[test]
    fn parses_verbose_units() {
        assert_eq!(parse_duration("30 minutes"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("1 Day"), Some(Duration::from_secs(86400)));
        assert_eq!(parse_duration("3 hrs"), Some(Duration::from_secs(10800)));
    }

    #[test]
    fn rejects_garbage_and_zero() {
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration("0h"), None);
        assert_eq!(parse_duration("5 fortnights"), None);
    }

    #[test]
    fn length_defaults_to_permanent() {
        assert_eq!(parse_length(None), Some(Length::Permanent));
        assert_eq!(parse_length(Some("perm")), Some(Length::Permanent));
        assert_eq!(
            parse_length(Some("2d")),
            Some(Length::For(Duration::from_secs(172800)))
        );
        assert_eq!(parse_length(Some("nope")), None);
    }

    #[test]
    fn length_expiry() {
        let now = chrono::Utc::now();
        assert_eq!(Length::Permanent.expires_at(now), None);
        let at = Length::For(Duration::from_secs(60)).expires_at(now).unwrap();
        assert_eq!((at - now).num_seconds(), 60);
    }

    #[test]
    fn oversized_lengths_are_rejected_not_permanent() {
        assert_eq!(parse_length(Some("1000000000w")), None);
        assert_eq!(parse_length(Some("20000000000000w")), None);
        assert_eq!(parse_duration("99999999 days"), None);
        assert_eq!(
            parse_length(Some("3650d")),
            Some(Length::For(MAX_DURATION))
        );
    }

    #[test]
    fn huge_length_expiry_is_clamped() {
        let now = chrono::Utc::now();
        let at = Length::For(Duration::from_secs(u64::MAX))
            .expires_at(now)
            .unwrap();
        assert_eq!((at - now).num_days(), 3650);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(1)), "1 second");
        assert_eq!(format_duration(Duration::from_secs(120)), "2 minutes");
        assert_eq!(
            format_duration(Duration::from_secs(3900)),
            "1 hour and 5 minutes"
        );
        assert_eq!(format_duration(Duration::from_secs(86400 * 3)), "3 days");
    }
}
