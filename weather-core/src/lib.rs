//! Core library for the `weather` client.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Forecast and geocoding clients behind provider traits
//! - The local SQLite store for cached weather and saved cities
//! - Persisted unit preferences with change notification
//! - The orchestrator that ties them together with cache fallback
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod settings;
pub mod store;
pub mod units;

pub use config::{ApiConfig, Config};
pub use error::{ApiErrorKind, WeatherError};
pub use location::{FixedLocation, LocationProvider};
pub use model::{
    CityRecord, Coordinates, CurrentConditions, CurrentUnits, HourlySeries, HourlyUnits,
    WeatherCondition, WeatherSnapshot,
};
pub use orchestrator::{LoadRequest, LoadState, WeatherOrchestrator};
pub use provider::{ForecastRequest, Geocoder, WeatherProvider};
pub use settings::SettingsStore;
pub use store::LocalStore;
pub use units::{TemperatureUnit, UnitPreferences, WindSpeedUnit};
