use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A city as returned by the geocoding API and kept in the saved-city list.
/// `(country, name)` identifies a city in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub country: String,
    pub name: String,
    pub state: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl CityRecord {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// "Name, State, CC" for display.
    pub fn label(&self) -> String {
        match self.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) => format!("{}, {}, {}", self.name, state, self.country),
            None => format!("{}, {}", self.name, self.country),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub time: String,
    pub interval: i64,
    pub temperature: f64,
    pub relative_humidity: u8,
    pub surface_pressure: f64,
    pub wind_speed: f64,
    pub weather_code: i32,
}

impl CurrentConditions {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.weather_code)
    }
}

/// Unit strings for the fields of [`CurrentConditions`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentUnits {
    pub time: String,
    pub interval: String,
    pub temperature: String,
    pub relative_humidity: String,
    pub surface_pressure: String,
    pub wind_speed: String,
    pub weather_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("hourly series length mismatch: {time} times, {temperature} temperatures, {weather_code} weather codes")]
pub struct SeriesLengthMismatch {
    pub time: usize,
    pub temperature: usize,
    pub weather_code: usize,
}

/// Hourly forecast as parallel arrays of equal length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlySeries {
    time: Vec<String>,
    temperature: Vec<f64>,
    weather_code: Vec<i32>,
}

/// One row of an [`HourlySeries`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyEntry<'a> {
    pub time: &'a str,
    pub temperature: f64,
    pub weather_code: i32,
}

impl HourlySeries {
    pub fn new(
        time: Vec<String>,
        temperature: Vec<f64>,
        weather_code: Vec<i32>,
    ) -> Result<Self, SeriesLengthMismatch> {
        if time.len() != temperature.len() || time.len() != weather_code.len() {
            return Err(SeriesLengthMismatch {
                time: time.len(),
                temperature: temperature.len(),
                weather_code: weather_code.len(),
            });
        }
        Ok(Self { time, temperature, weather_code })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[String] {
        &self.time
    }

    pub fn temperature(&self) -> &[f64] {
        &self.temperature
    }

    pub fn weather_code(&self) -> &[i32] {
        &self.weather_code
    }

    pub fn entries(&self) -> impl Iterator<Item = HourlyEntry<'_>> + '_ {
        self.time
            .iter()
            .zip(&self.temperature)
            .zip(&self.weather_code)
            .map(|((time, temperature), weather_code)| HourlyEntry {
                time: time.as_str(),
                temperature: *temperature,
                weather_code: *weather_code,
            })
    }
}

/// Unit strings for the arrays of [`HourlySeries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyUnits {
    pub time: String,
    pub temperature: String,
    pub weather_code: String,
}

/// One fetched or cached weather result for a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub timezone_abbreviation: String,
    pub utc_offset_seconds: i32,
    pub elevation: f64,
    pub generation_time_ms: f64,
    pub current: Option<CurrentConditions>,
    pub current_units: Option<CurrentUnits>,
    pub hourly: Option<HourlySeries>,
    pub hourly_units: Option<HourlyUnits>,
    pub city: Option<CityRecord>,
    /// Served from the local store rather than freshly fetched.
    pub cached: bool,
    pub last_sync: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn with_city(mut self, city: CityRecord) -> Self {
        self.city = Some(city);
        self
    }

    pub fn into_cached(mut self) -> Self {
        self.cached = true;
        self
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Weather condition categories mapped from WMO codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
    Unknown,
}

impl WeatherCondition {
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 | 66 | 67 => Self::Sleet,
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_series_rejects_mismatched_lengths() {
        let err = HourlySeries::new(vec!["00:00".into(), "01:00".into()], vec![1.0], vec![0, 1])
            .unwrap_err();
        assert_eq!(err.time, 2);
        assert_eq!(err.temperature, 1);
    }

    #[test]
    fn hourly_entries_zip_in_order() {
        let series = HourlySeries::new(
            vec!["2024-05-01T00:00".into(), "2024-05-01T01:00".into()],
            vec![12.5, 11.0],
            vec![0, 61],
        )
        .unwrap();

        let entries: Vec<_> = series.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].time, "2024-05-01T01:00");
        assert_eq!(entries[1].temperature, 11.0);
        assert_eq!(entries[1].weather_code, 61);
    }

    #[test]
    fn city_label_skips_empty_state() {
        let mut city = CityRecord {
            country: "DE".into(),
            name: "Berlin".into(),
            state: Some(String::new()),
            latitude: 52.52,
            longitude: 13.41,
        };
        assert_eq!(city.label(), "Berlin, DE");

        city.state = Some("Berlin".into());
        assert_eq!(city.label(), "Berlin, Berlin, DE");
    }

    #[test]
    fn wmo_codes() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_wmo_code(48), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_wmo_code(66), WeatherCondition::Sleet);
        assert_eq!(WeatherCondition::from_wmo_code(82), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_wmo_code(86), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_wmo_code(99), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_wmo_code(999), WeatherCondition::Unknown);
    }
}
