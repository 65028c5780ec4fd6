use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Persistence key; also the forecast API `temperature_unit` value.
    pub fn key(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        }
    }

    /// Unit string as reported by the forecast API.
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|u| u.key() == key)
    }

    pub const fn all() -> &'static [TemperatureUnit] {
        &[TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit]
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TemperatureUnit {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "celsius" | "c" | "°c" => Ok(TemperatureUnit::Celsius),
            "fahrenheit" | "f" | "°f" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(anyhow::anyhow!(
                "Unknown temperature unit '{value}'. Supported units: celsius, fahrenheit."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindSpeedUnit {
    #[serde(rename = "ms")]
    MetersPerSecond,
    #[serde(rename = "mph")]
    MilesPerHour,
    #[default]
    #[serde(rename = "kmh")]
    KilometersPerHour,
}

impl WindSpeedUnit {
    /// Persistence key; also the forecast API `wind_speed_unit` value.
    pub fn key(&self) -> &'static str {
        match self {
            WindSpeedUnit::MetersPerSecond => "ms",
            WindSpeedUnit::MilesPerHour => "mph",
            WindSpeedUnit::KilometersPerHour => "kmh",
        }
    }

    /// Unit string as reported by the forecast API.
    pub fn symbol(&self) -> &'static str {
        match self {
            WindSpeedUnit::MetersPerSecond => "m/s",
            WindSpeedUnit::MilesPerHour => "mp/h",
            WindSpeedUnit::KilometersPerHour => "km/h",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|u| u.key() == key)
    }

    pub const fn all() -> &'static [WindSpeedUnit] {
        &[
            WindSpeedUnit::MetersPerSecond,
            WindSpeedUnit::MilesPerHour,
            WindSpeedUnit::KilometersPerHour,
        ]
    }
}

impl fmt::Display for WindSpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for WindSpeedUnit {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ms" | "m/s" => Ok(WindSpeedUnit::MetersPerSecond),
            "mph" | "mp/h" => Ok(WindSpeedUnit::MilesPerHour),
            "kmh" | "km/h" | "kph" => Ok(WindSpeedUnit::KilometersPerHour),
            _ => Err(anyhow::anyhow!(
                "Unknown wind speed unit '{value}'. Supported units: ms, mph, kmh."
            )),
        }
    }
}

/// The user's measurement preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitPreferences {
    pub temperature: TemperatureUnit,
    pub wind_speed: WindSpeedUnit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_roundtrip() {
        for unit in TemperatureUnit::all() {
            assert_eq!(TemperatureUnit::from_key(unit.key()), Some(*unit));
        }
        for unit in WindSpeedUnit::all() {
            assert_eq!(WindSpeedUnit::from_key(unit.key()), Some(*unit));
        }
    }

    #[test]
    fn unknown_key_is_none() {
        assert_eq!(TemperatureUnit::from_key("kelvin"), None);
        assert_eq!(WindSpeedUnit::from_key("knots"), None);
    }

    #[test]
    fn defaults() {
        let prefs = UnitPreferences::default();
        assert_eq!(prefs.temperature, TemperatureUnit::Celsius);
        assert_eq!(prefs.wind_speed, WindSpeedUnit::KilometersPerHour);
    }

    #[test]
    fn parse_aliases() {
        assert_eq!("F".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Fahrenheit);
        assert_eq!("m/s".parse::<WindSpeedUnit>().unwrap(), WindSpeedUnit::MetersPerSecond);
        assert_eq!("km/h".parse::<WindSpeedUnit>().unwrap(), WindSpeedUnit::KilometersPerHour);

        let err = "kelvin".parse::<TemperatureUnit>().unwrap_err();
        assert!(err.to_string().contains("Unknown temperature unit"));
    }
}
