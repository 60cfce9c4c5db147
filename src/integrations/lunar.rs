//! Lunar calendar conversion service

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use crate::{Error, Result};

/// A date in the Vietnamese lunar calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LunarDate {
    pub day: u32,
    pub month: u32,
    pub year: i32,
    /// The month is an intercalary (leap) month
    #[serde(default)]
    pub leap: bool,
}

/// Converts solar dates to lunar dates
#[async_trait]
pub trait LunarCalendar: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the conversion service fails
    async fn to_lunar(&self, date: NaiveDate) -> Result<LunarDate>;
}

/// Client for an HTTP conversion service answering `GET {url}?date=YYYY-MM-DD`
#[derive(Debug, Clone)]
pub struct LunarClient {
    client: Client,
    url: String,
}

impl LunarClient {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl LunarCalendar for LunarClient {
    async fn to_lunar(&self, date: NaiveDate) -> Result<LunarDate> {
        let day = date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[("date", day.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Lunar(format!("lunar service error: {status} - {body}")));
        }

        let lunar: LunarDate = response.json().await?;
        if !(1..=30).contains(&lunar.day) || !(1..=12).contains(&lunar.month) {
            return Err(Error::Lunar(format!(
                "implausible lunar date {}/{} for {day}",
                lunar.day, lunar.month
            )));
        }
        Ok(lunar)
    }
}
