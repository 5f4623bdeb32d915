//! Nager.Date public holiday API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Holiday, Res},
};

use super::{GenericHolidayClient, HolidayClient};

impl HolidayClient {
    /// Creates a Nager.Date backed holiday client, if a holiday API is configured.
    pub fn nager(config: &Config) -> Res<Option<Self>> {
        let Some(base_url) = config.holiday_api_url.as_deref().filter(|url| !url.is_empty()) else {
            return Ok(None);
        };

        let client = NagerHolidayClient::new(base_url, &config.holiday_region, config.holiday_api_timeout)?;

        Ok(Some(Self { inner: Arc::new(client) }))
    }
}

/// A single entry of the `PublicHolidays` endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NagerHoliday {
    date: NaiveDate,
    local_name: Option<String>,
    name: String,
    #[serde(default)]
    counties: Option<Vec<String>>,
}

/// Nager.Date client implementation.
pub struct NagerHolidayClient {
    client: reqwest::Client,
    base_url: String,
    country: String,
    region: String,
}

impl NagerHolidayClient {
    pub fn new(base_url: &str, region: &str, timeout: std::time::Duration) -> Res<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let country = region.split('-').next().unwrap_or(region).to_uppercase();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            country,
            region: region.to_uppercase(),
        })
    }
}

#[async_trait]
impl GenericHolidayClient for NagerHolidayClient {
    #[instrument(name = "NagerHolidayClient::get_public_holidays", skip(self))]
    async fn get_public_holidays(&self, year: i32) -> Res<Vec<Holiday>> {
        let url = format!("{}/api/v3/PublicHolidays/{year}/{}", self.base_url, self.country);

        let entries: Vec<NagerHoliday> = self.client.get(&url).send().await?.error_for_status()?.json().await?;
        let holidays = filter_region(entries, &self.region);

        if holidays.is_empty() {
            return Err(anyhow::anyhow!("Holiday API returned no holidays for {year}."));
        }

        info!("Fetched {} holidays for {} in {year}.", holidays.len(), self.region);

        Ok(holidays)
    }
}

/// Keeps nationwide holidays and the ones that apply to `region`.
fn filter_region(entries: Vec<NagerHoliday>, region: &str) -> Vec<Holiday> {
    entries
        .into_iter()
        .filter(|entry| match &entry.counties {
            None => true,
            Some(counties) => counties.iter().any(|county| county.eq_ignore_ascii_case(region)),
        })
        .map(|entry| Holiday {
            date: entry.date,
            name: entry.local_name.filter(|name| !name.is_empty()).unwrap_or(entry.name),
        })
        .collect()
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_region_keeps_national_and_matching_counties() {
        let entries: Vec<NagerHoliday> = serde_json::from_value(serde_json::json!([
            { "date": "2025-01-01", "localName": "New Year's Day", "name": "New Year's Day", "counties": null },
            { "date": "2025-03-03", "localName": "Labour Day", "name": "Labour Day", "counties": ["AU-WA"] },
            { "date": "2025-05-05", "localName": "Labour Day", "name": "Labour Day", "counties": ["AU-QLD", "AU-NT"] },
        ]))
        .unwrap();

        let holidays = filter_region(entries, "AU-QLD");

        assert_eq!(holidays.len(), 2);
        assert_eq!(holidays[1].date, NaiveDate::from_ymd_opt(2025, 5, 5).unwrap());
    }

    #[test]
    fn test_nager_is_disabled_without_url() {
        let config = Config::from(crate::base::config::ConfigInner::default());

        assert!(HolidayClient::nager(&config).unwrap().is_none());
    }
}
