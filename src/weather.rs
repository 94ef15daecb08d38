use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("weather service returned {0}")]
    Status(reqwest::StatusCode),
    #[error("forecast has no hourly precipitation value")]
    MissingPrecipitation,
}

#[derive(Deserialize)]
struct ForecastResponse {
    hourly: Option<HourlyForecast>,
}

#[derive(Deserialize)]
struct HourlyForecast {
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
}

/// Client for the Open-Meteo hourly forecast. Every call is bounded by the
/// timeout given at construction and is never retried.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Precipitation (mm) for the first forecast hour at the given point.
    pub async fn hourly_precipitation(&self, lat: f64, lon: f64) -> Result<f64, WeatherError> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("hourly", "precipitation".to_string()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(WeatherError::Status(resp.status()));
        }
        let forecast: ForecastResponse = resp.json().await?;
        first_hour(forecast)
    }
}

fn first_hour(forecast: ForecastResponse) -> Result<f64, WeatherError> {
    forecast
        .hourly
        .and_then(|h| h.precipitation.into_iter().next().flatten())
        .ok_or(WeatherError::MissingPrecipitation)
}
