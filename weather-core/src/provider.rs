use crate::{
    Config,
    error::WeatherError,
    model::{CityRecord, Coordinates, WeatherSnapshot},
    provider::{geocoding::GeocodingClient, open_meteo::OpenMeteoProvider},
    units::UnitPreferences,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod geocoding;
pub mod open_meteo;

/// Parameters of a single forecast fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub coordinates: Coordinates,
    pub units: UnitPreferences,
    pub timezone: String,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn forecast(&self, request: &ForecastRequest) -> Result<WeatherSnapshot, WeatherError>;
}

/// Forward and reverse city lookup.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn reverse(&self, coordinates: Coordinates) -> Result<Vec<CityRecord>, WeatherError>;

    async fn search(&self, query: &str) -> Result<Vec<CityRecord>, WeatherError>;
}

/// Construct the forecast client from config.
pub fn weather_provider_from_config(config: &Config) -> anyhow::Result<OpenMeteoProvider> {
    OpenMeteoProvider::new(&config.api.forecast_base_url, config.api.timeout())
}

const MISSING_GEOCODING_KEY: &str = "No API key configured for geocoding.\n\
     Hint: run `weather configure` and enter your API key.";

/// Construct the geocoding client from config. Fails when no API key is set.
pub fn geocoder_from_config(config: &Config) -> anyhow::Result<GeocodingClient> {
    let api_key = config
        .geocoding_api_key()
        .ok_or_else(|| anyhow::anyhow!(MISSING_GEOCODING_KEY))?;

    GeocodingClient::new(
        &config.api.geocoding_base_url,
        api_key.to_owned(),
        config.api.timeout(),
    )
}

/// Stands in for the geocoding client while no API key is configured.
/// Every lookup fails with the configuration hint.
#[derive(Debug, Default)]
pub struct UnconfiguredGeocoder;

#[async_trait]
impl Geocoder for UnconfiguredGeocoder {
    async fn reverse(&self, _: Coordinates) -> Result<Vec<CityRecord>, WeatherError> {
        Err(WeatherError::generic(MISSING_GEOCODING_KEY))
    }

    async fn search(&self, _: &str) -> Result<Vec<CityRecord>, WeatherError> {
        Err(WeatherError::generic(MISSING_GEOCODING_KEY))
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geocoder_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = geocoder_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured for geocoding"));
        assert!(err.to_string().contains("Hint: run `weather configure`"));
    }

    #[test]
    fn geocoder_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_geocoding_api_key("KEY".to_string());
        assert!(geocoder_from_config(&cfg).is_ok());
    }

    #[tokio::test]
    async fn unconfigured_geocoder_fails_every_lookup_with_hint() {
        let err = UnconfiguredGeocoder.search("Berlin").await.unwrap_err();
        assert!(err.user_message().contains("Hint: run `weather configure`"));

        let err = UnconfiguredGeocoder
            .reverse(Coordinates::new(52.5, 13.4))
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Api(_)));
    }

    #[test]
    fn weather_provider_from_default_config() {
        assert!(weather_provider_from_config(&Config::default()).is_ok());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(150);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);

        assert_eq!(truncate_body("short"), "short");
    }
}
