use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::core::prayer::{parse_time, PrayerError, PrayerTimes, PrayerTimesSource};

/// Client for the Aladhan prayer-times API (`/timingsByCity`).
pub struct AladhanClient {
    client: Client,
    base_url: String,
}

impl AladhanClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PrayerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("CommunityBot/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PrayerError::Fetch(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn map_response(body: ApiResponse, date: NaiveDate) -> Result<PrayerTimes, PrayerError> {
        if body.code != 200 {
            return Err(PrayerError::Fetch(format!(
                "API answered with code {}",
                body.code
            )));
        }
        let timezone = body
            .data
            .meta
            .and_then(|meta| meta.timezone.parse::<Tz>().ok());
        let t = body.data.timings;
        Ok(PrayerTimes {
            date,
            fajr: parse_time(&t.fajr)?,
            dhuhr: parse_time(&t.dhuhr)?,
            asr: parse_time(&t.asr)?,
            maghrib: parse_time(&t.maghrib)?,
            isha: parse_time(&t.isha)?,
            timezone,
        })
    }
}

#[async_trait]
impl PrayerTimesSource for AladhanClient {
    async fn fetch(
        &self,
        city: &str,
        country: &str,
        method: u8,
        date: NaiveDate,
    ) -> Result<PrayerTimes, PrayerError> {
        let url = format!(
            "{}/timingsByCity/{}",
            self.base_url,
            date.format("%d-%m-%Y")
        );

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("city", city),
                ("country", country),
                ("method", &method.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PrayerError::Fetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PrayerError::Fetch(format!("HTTP {}", resp.status())));
        }

        let body: ApiResponse = resp
            .json()
            .await
            .map_err(|e| PrayerError::Fetch(e.to_string()))?;

        Self::map_response(body, date)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: u16,
    data: ApiData,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    timings: ApiTimings,
    meta: Option<ApiMeta>,
}

#[derive(Debug, Deserialize)]
struct ApiMeta {
    timezone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiTimings {
    fajr: String,
    dhuhr: String,
    asr: String,
    maghrib: String,
    isha: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    const SAMPLE: &str = r#"{
        "code": 200,
        "status": "OK",
        "data": {
            "timings": {
                "Fajr": "04:51 (+03)",
                "Sunrise": "06:09 (+03)",
                "Dhuhr": "12:06 (+03)",
                "Asr": "15:27 (+03)",
                "Sunset": "18:03 (+03)",
                "Maghrib": "18:03 (+03)",
                "Isha": "19:33 (+03)",
                "Imsak": "04:41 (+03)",
                "Midnight": "00:06 (+03)"
            },
            "date": { "readable": "01 Mar 2024" },
            "meta": { "timezone": "Asia/Riyadh", "method": { "id": 4 } }
        }
    }"#;

    #[test]
    fn maps_sample_response() {
        let body: ApiResponse = serde_json::from_str(SAMPLE).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let times = AladhanClient::map_response(body, date).unwrap();

        assert_eq!(times.date, date);
        assert_eq!(times.fajr, NaiveTime::from_hms_opt(4, 51, 0).unwrap());
        assert_eq!(times.isha, NaiveTime::from_hms_opt(19, 33, 0).unwrap());
        assert_eq!(times.timezone, Some(chrono_tz::Asia::Riyadh));
    }

    #[test]
    fn missing_or_unknown_zone_is_none() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let unknown = SAMPLE.replace("Asia/Riyadh", "Mars/Olympus");
        let body: ApiResponse = serde_json::from_str(&unknown).unwrap();
        assert_eq!(AladhanClient::map_response(body, date).unwrap().timezone, None);

        let mut without_meta: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        without_meta["data"].as_object_mut().unwrap().remove("meta");
        let body: ApiResponse = serde_json::from_value(without_meta).unwrap();
        assert_eq!(AladhanClient::map_response(body, date).unwrap().timezone, None);
    }

    #[test]
    fn non_ok_code_is_an_error() {
        let body: ApiResponse = serde_json::from_str(&SAMPLE.replace("\"code\": 200", "\"code\": 400")).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(matches!(
            AladhanClient::map_response(body, date),
            Err(PrayerError::Fetch(_))
        ));
    }
}
