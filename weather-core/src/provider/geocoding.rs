use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{
    error::WeatherError,
    model::{CityRecord, Coordinates},
    provider::truncate_body,
};

use super::Geocoder;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for the `/v1/geocoding` and `/v1/reversegeocoding` endpoints.
#[derive(Debug, Clone)]
pub struct GeocodingClient {
    base_url: String,
    api_key: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct GeoCity {
    name: String,
    country: String,
    #[serde(default)]
    state: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl From<GeoCity> for CityRecord {
    fn from(city: GeoCity) -> Self {
        CityRecord {
            country: city.country,
            name: city.name,
            state: city.state,
            latitude: city.latitude,
            longitude: city.longitude,
        }
    }
}

impl GeocodingClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create geocoding HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    async fn fetch_cities(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<Vec<CityRecord>, WeatherError> {
        let res = request.header(API_KEY_HEADER, &self.api_key).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(WeatherError::generic(format!(
                "{} request failed with status {}: {}",
                what,
                status,
                truncate_body(&body),
            )));
        }

        let parsed: Vec<GeoCity> = serde_json::from_str(&body)
            .map_err(|e| WeatherError::generic(format!("Failed to parse {what} JSON: {e}")))?;

        Ok(parsed.into_iter().map(CityRecord::from).collect())
    }
}

#[async_trait]
impl Geocoder for GeocodingClient {
    async fn reverse(&self, coordinates: Coordinates) -> Result<Vec<CityRecord>, WeatherError> {
        debug!(
            latitude = coordinates.latitude,
            longitude = coordinates.longitude,
            "Reverse geocoding"
        );

        let request = self
            .http
            .get(format!("{}/v1/reversegeocoding", self.base_url))
            .query(&[
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
            ]);

        self.fetch_cities(request, "Reverse geocoding").await
    }

    async fn search(&self, query: &str) -> Result<Vec<CityRecord>, WeatherError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        debug!(query, "Geocoding city name");

        let request = self
            .http
            .get(format!("{}/v1/geocoding", self.base_url))
            .query(&[("city", query)]);

        self.fetch_cities(request, "Geocoding").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_optional() {
        let cities: Vec<GeoCity> = serde_json::from_str(
            r#"[{"name":"Monaco","country":"MC","latitude":43.73,"longitude":7.42}]"#,
        )
        .unwrap();

        let city = CityRecord::from(cities.into_iter().next().unwrap());
        assert_eq!(city.name, "Monaco");
        assert!(city.state.is_none());
    }

    #[tokio::test]
    async fn blank_search_skips_the_network() {
        let timeout = Duration::from_secs(1);
        let client = GeocodingClient::new("http://127.0.0.1:1", "KEY".into(), timeout).unwrap();
        assert!(client.search("   ").await.unwrap().is_empty());
    }
}
