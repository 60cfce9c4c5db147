//! WeatherAPI.com integration
//!
//! Current conditions come from `current.json`; tomorrow's outlook from
//! `forecast.json?days=2`, summarizing the second forecast day.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{Error, Result};

/// Conditions spoken back to the user
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// Place name as the service resolved it
    pub location: String,
    /// Localized condition text (e.g. "Trời nắng")
    pub condition: String,
    pub temp_c: f64,
    pub feels_like_c: f64,
    pub uv: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

/// A source of weather reports
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Conditions right now
    ///
    /// # Errors
    ///
    /// Returns error if the service cannot be reached or the place is unknown
    async fn current(&self, location: &str) -> Result<WeatherReport>;

    /// Expected conditions tomorrow
    ///
    /// # Errors
    ///
    /// Returns error if the service cannot be reached or the place is unknown
    async fn forecast(&self, location: &str) -> Result<WeatherReport>;
}

/// Client for WeatherAPI.com
#[derive(Debug)]
pub struct WeatherApiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl WeatherApiClient {
    /// Create a new weather client
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root (e.g., <https://api.weatherapi.com/v1>)
    /// * `api_key` - WeatherAPI.com key
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn get(&self, endpoint: &str, location: &str, extra: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}/{endpoint}", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.expose_secret()),
                ("q", location),
                ("lang", "vi"),
            ])
            .query(extra)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Weather(format!("WeatherAPI error: {status} - {body}")));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    async fn current(&self, location: &str) -> Result<WeatherReport> {
        tracing::debug!(location = %location, "fetching current weather");
        let body = self.get("current.json", location, &[]).await?;
        parse_current(&body)
    }

    async fn forecast(&self, location: &str) -> Result<WeatherReport> {
        tracing::debug!(location = %location, "fetching weather forecast");
        let body = self.get("forecast.json", location, &[("days", "2")]).await?;
        parse_forecast(&body)
    }
}

#[derive(Deserialize)]
struct Condition {
    text: String,
}

#[derive(Deserialize)]
struct Place {
    name: String,
}

#[derive(Deserialize)]
struct CurrentResponse {
    location: Place,
    current: Current,
}

#[derive(Deserialize)]
struct Current {
    temp_c: f64,
    feelslike_c: f64,
    uv: f64,
    humidity: f64,
    condition: Condition,
}

#[derive(Deserialize)]
struct ForecastResponse {
    location: Place,
    forecast: Forecast,
}

#[derive(Deserialize)]
struct Forecast {
    forecastday: Vec<ForecastDay>,
}

#[derive(Deserialize)]
struct ForecastDay {
    day: Day,
    #[serde(default)]
    hour: Vec<Hour>,
}

#[derive(Deserialize)]
struct Day {
    avgtemp_c: f64,
    avghumidity: f64,
    uv: f64,
    condition: Condition,
}

#[derive(Deserialize)]
struct Hour {
    feelslike_c: f64,
}

/// Build a report from a `current.json` body
///
/// # Errors
///
/// Returns error if the body is not a current-conditions response
pub fn parse_current(body: &str) -> Result<WeatherReport> {
    let response: CurrentResponse = serde_json::from_str(body)?;
    let c = response.current;
    Ok(WeatherReport {
        location: response.location.name,
        condition: c.condition.text,
        temp_c: c.temp_c,
        feels_like_c: c.feelslike_c,
        uv: c.uv,
        humidity: c.humidity,
    })
}

/// Build tomorrow's report from a `forecast.json?days=2` body
///
/// Feels-like is the mean of the hourly values, or the average temperature
/// when the day has no hourly data.
///
/// # Errors
///
/// Returns error if the body is malformed or has no second day
pub fn parse_forecast(body: &str) -> Result<WeatherReport> {
    let response: ForecastResponse = serde_json::from_str(body)?;
    let tomorrow = response
        .forecast
        .forecastday
        .into_iter()
        .nth(1)
        .ok_or_else(|| Error::Weather("forecast has no entry for tomorrow".to_string()))?;

    let day = tomorrow.day;
    #[allow(clippy::cast_precision_loss)]
    let feels_like_c = if tomorrow.hour.is_empty() {
        day.avgtemp_c
    } else {
        tomorrow.hour.iter().map(|h| h.feelslike_c).sum::<f64>() / tomorrow.hour.len() as f64
    };

    Ok(WeatherReport {
        location: response.location.name,
        condition: day.condition.text,
        temp_c: day.avgtemp_c,
        feels_like_c,
        uv: day.uv,
        humidity: day.avghumidity,
    })
}
