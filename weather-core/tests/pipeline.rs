//! End-to-end pipeline: real HTTP clients against a mock server, real store.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use weather_core::{
    ApiErrorKind, Coordinates, FixedLocation, LoadRequest, LoadState, LocalStore,
    UnitPreferences, WeatherError, WeatherOrchestrator,
    provider::{geocoding::GeocodingClient, open_meteo::OpenMeteoProvider},
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn forecast_body() -> serde_json::Value {
    serde_json::json!({
        "latitude": 47.6,
        "longitude": -122.33,
        "generationtime_ms": 0.03,
        "utc_offset_seconds": -25200,
        "timezone": "America/Los_Angeles",
        "timezone_abbreviation": "PDT",
        "elevation": 56.0,
        "current_units": {
            "time": "iso8601", "interval": "seconds", "temperature_2m": "°C",
            "relative_humidity_2m": "%", "surface_pressure": "hPa",
            "wind_speed_10m": "km/h", "weather_code": "wmo code"
        },
        "current": {
            "time": "2024-05-01T09:00", "interval": 900, "temperature_2m": 11.2,
            "relative_humidity_2m": 81, "surface_pressure": 1002.4,
            "wind_speed_10m": 14.0, "weather_code": 61
        }
    })
}

async fn mount_geocoder(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/reversegeocoding"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "Seattle", "latitude": 47.60, "longitude": -122.33, "country": "US", "state": "Washington" }
        ])))
        .mount(server)
        .await;
}

fn orchestrator(server: &MockServer, store: Arc<LocalStore>) -> WeatherOrchestrator {
    let timeout = Duration::from_secs(5);
    WeatherOrchestrator::new(
        Arc::new(OpenMeteoProvider::new(&server.uri(), timeout).unwrap()),
        Arc::new(GeocodingClient::new(&server.uri(), "KEY".into(), timeout).unwrap()),
        Arc::new(FixedLocation::new(Some(Coordinates::new(47.6062, -122.3321)))),
        store,
    )
}

async fn final_state(orch: &WeatherOrchestrator) -> LoadState {
    let (tx, _rx) = mpsc::channel(4);
    orch.run(
        &LoadRequest {
            city: None,
            units: UnitPreferences::default(),
            timezone: "auto".into(),
        },
        &tx,
    )
    .await
}

#[tokio::test]
async fn test_fresh_fetch_then_cached_fallback() {
    let mock_server = MockServer::start().await;
    mount_geocoder(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let store = Arc::new(LocalStore::in_memory().unwrap());
    let orch = orchestrator(&mock_server, store.clone());

    let LoadState::Success(fresh) = final_state(&orch).await else {
        panic!("first fetch should succeed");
    };
    assert!(!fresh.cached);
    assert_eq!(fresh.city.as_ref().unwrap().name, "Seattle");
    orch.save_weather(&fresh).unwrap();

    let LoadState::Success(cached) = final_state(&orch).await else {
        panic!("second fetch should fall back to cache");
    };
    assert!(cached.cached);
    assert_eq!(cached.current, fresh.current);
    assert_eq!(cached.last_sync, fresh.last_sync);
}

#[tokio::test]
async fn test_failure_without_cache_is_terminal() {
    let mock_server = MockServer::start().await;
    mount_geocoder(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(forecast_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let timeout = Duration::from_millis(100);
    let geocoder =
        GeocodingClient::new(&mock_server.uri(), "KEY".into(), Duration::from_secs(5)).unwrap();
    let orch = WeatherOrchestrator::new(
        Arc::new(OpenMeteoProvider::new(&mock_server.uri(), timeout).unwrap()),
        Arc::new(geocoder),
        Arc::new(FixedLocation::new(Some(Coordinates::new(47.6062, -122.3321)))),
        Arc::new(LocalStore::in_memory().unwrap()),
    );

    let state = final_state(&orch).await;
    let LoadState::Failure(WeatherError::Api(kind)) = state else {
        panic!("expected api failure");
    };
    assert_eq!(kind, ApiErrorKind::Timeout);
    assert_eq!(kind.message(), "timeout");
}
