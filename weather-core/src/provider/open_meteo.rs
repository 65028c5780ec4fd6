use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{
    error::WeatherError,
    model::{CurrentConditions, CurrentUnits, HourlySeries, HourlyUnits, WeatherSnapshot},
    provider::{ForecastRequest, truncate_body},
};

use super::WeatherProvider;

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,surface_pressure,wind_speed_10m,weather_code";
const HOURLY_FIELDS: &str = "temperature_2m,weather_code";

/// Forecast client for the Open-Meteo `/v1/forecast` endpoint.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    endpoint: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create forecast HTTP client")?;

        Ok(Self {
            endpoint: format!("{}/v1/forecast", base_url.trim_end_matches('/')),
            http,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: String,
    interval: i64,
    temperature_2m: f64,
    relative_humidity_2m: u8,
    surface_pressure: f64,
    wind_speed_10m: f64,
    weather_code: i32,
}

#[derive(Debug, Deserialize)]
struct OmCurrentUnits {
    time: String,
    interval: String,
    temperature_2m: String,
    relative_humidity_2m: String,
    surface_pressure: String,
    wind_speed_10m: String,
    weather_code: String,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    temperature_2m: Vec<f64>,
    weather_code: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct OmHourlyUnits {
    time: String,
    temperature_2m: String,
    weather_code: String,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    latitude: f64,
    longitude: f64,
    generationtime_ms: f64,
    utc_offset_seconds: i32,
    timezone: String,
    timezone_abbreviation: String,
    elevation: f64,
    current: Option<OmCurrent>,
    current_units: Option<OmCurrentUnits>,
    hourly: Option<OmHourly>,
    hourly_units: Option<OmHourlyUnits>,
}

impl TryFrom<OmForecastResponse> for WeatherSnapshot {
    type Error = WeatherError;

    fn try_from(parsed: OmForecastResponse) -> Result<Self, Self::Error> {
        let (current, current_units) = match (parsed.current, parsed.current_units) {
            (Some(c), Some(u)) => (
                Some(CurrentConditions {
                    time: c.time,
                    interval: c.interval,
                    temperature: c.temperature_2m,
                    relative_humidity: c.relative_humidity_2m,
                    surface_pressure: c.surface_pressure,
                    wind_speed: c.wind_speed_10m,
                    weather_code: c.weather_code,
                }),
                Some(CurrentUnits {
                    time: u.time,
                    interval: u.interval,
                    temperature: u.temperature_2m,
                    relative_humidity: u.relative_humidity_2m,
                    surface_pressure: u.surface_pressure,
                    wind_speed: u.wind_speed_10m,
                    weather_code: u.weather_code,
                }),
            ),
            (None, None) => (None, None),
            _ => {
                return Err(WeatherError::generic(
                    "Forecast response has current conditions without matching units",
                ));
            }
        };

        let hourly = parsed
            .hourly
            .map(|h| HourlySeries::new(h.time, h.temperature_2m, h.weather_code))
            .transpose()
            .map_err(|e| WeatherError::generic(format!("Malformed forecast response: {e}")))?;

        let hourly_units = parsed.hourly_units.map(|u| HourlyUnits {
            time: u.time,
            temperature: u.temperature_2m,
            weather_code: u.weather_code,
        });

        Ok(WeatherSnapshot {
            latitude: parsed.latitude,
            longitude: parsed.longitude,
            timezone: parsed.timezone,
            timezone_abbreviation: parsed.timezone_abbreviation,
            utc_offset_seconds: parsed.utc_offset_seconds,
            elevation: parsed.elevation,
            generation_time_ms: parsed.generationtime_ms,
            current,
            current_units,
            hourly,
            hourly_units,
            city: None,
            cached: false,
            last_sync: Utc::now(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn forecast(&self, request: &ForecastRequest) -> Result<WeatherSnapshot, WeatherError> {
        debug!(
            latitude = request.coordinates.latitude,
            longitude = request.coordinates.longitude,
            units = ?request.units,
            timezone = %request.timezone,
            "Requesting forecast"
        );

        let res = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("latitude", request.coordinates.latitude.to_string().as_str()),
                ("longitude", request.coordinates.longitude.to_string().as_str()),
                ("current", CURRENT_FIELDS),
                ("hourly", HOURLY_FIELDS),
                ("temperature_unit", request.units.temperature.key()),
                ("wind_speed_unit", request.units.wind_speed.key()),
                ("timezone", request.timezone.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(WeatherError::generic(format!(
                "Forecast request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: OmForecastResponse = serde_json::from_str(&body).map_err(|e| {
            WeatherError::generic(format!("Failed to parse forecast JSON: {e}"))
        })?;

        parsed.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> OmForecastResponse {
        serde_json::from_value(json).unwrap()
    }

    fn base() -> serde_json::Value {
        serde_json::json!({
            "latitude": 52.52,
            "longitude": 13.419998,
            "generationtime_ms": 0.05,
            "utc_offset_seconds": 7200,
            "timezone": "Europe/Berlin",
            "timezone_abbreviation": "CEST",
            "elevation": 38.0
        })
    }

    #[test]
    fn bare_response_has_no_sections() {
        let snapshot = WeatherSnapshot::try_from(response(base())).unwrap();
        assert!(snapshot.current.is_none());
        assert!(snapshot.hourly.is_none());
        assert!(!snapshot.cached);
        assert_eq!(snapshot.timezone_abbreviation, "CEST");
    }

    #[test]
    fn current_without_units_is_rejected() {
        let mut json = base();
        json["current"] = serde_json::json!({
            "time": "2024-05-01T12:00",
            "interval": 900,
            "temperature_2m": 20.1,
            "relative_humidity_2m": 40,
            "surface_pressure": 1012.3,
            "wind_speed_10m": 8.2,
            "weather_code": 1
        });

        let err = WeatherSnapshot::try_from(response(json)).unwrap_err();
        assert!(err.to_string().contains("without matching units"));
    }

    #[test]
    fn mismatched_hourly_arrays_are_rejected() {
        let mut json = base();
        json["hourly"] = serde_json::json!({
            "time": ["2024-05-01T00:00", "2024-05-01T01:00"],
            "temperature_2m": [10.0],
            "weather_code": [0, 0]
        });

        let err = WeatherSnapshot::try_from(response(json)).unwrap_err();
        assert!(err.to_string().contains("Malformed forecast response"));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let provider =
            OpenMeteoProvider::new("http://localhost:1234/", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:1234/v1/forecast");
    }
}
