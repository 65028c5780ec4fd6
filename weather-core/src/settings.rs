//! Unit preferences persisted to a small key-value file.
//!
//! Readers either take a one-off value with [`SettingsStore::preferences`] or
//! keep a [`watch::Receiver`] from [`SettingsStore::subscribe`], which sees
//! every later write without re-subscribing.

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::units::{TemperatureUnit, UnitPreferences, WindSpeedUnit};

const TEMPERATURE_KEY: &str = "temperature_unit";
const WIND_SPEED_KEY: &str = "wind_speed_unit";

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    tx: watch::Sender<UnitPreferences>,
}

impl SettingsStore {
    /// Open the preference file at `path`; a missing file means all defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let prefs = read_preferences(&path)?;
        debug!(path = %path.display(), ?prefs, "Loaded unit preferences");

        let (tx, _rx) = watch::channel(prefs);
        Ok(Self { path, tx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> UnitPreferences {
        *self.tx.borrow()
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.preferences().temperature
    }

    pub fn wind_speed_unit(&self) -> WindSpeedUnit {
        self.preferences().wind_speed
    }

    pub fn subscribe(&self) -> watch::Receiver<UnitPreferences> {
        self.tx.subscribe()
    }

    pub fn set_temperature_unit(&self, unit: TemperatureUnit) -> Result<()> {
        self.update(|prefs| prefs.temperature = unit)
    }

    pub fn set_wind_speed_unit(&self, unit: WindSpeedUnit) -> Result<()> {
        self.update(|prefs| prefs.wind_speed = unit)
    }

    /// Persist `prefs`, then publish them to every subscriber.
    pub fn set_preferences(&self, prefs: UnitPreferences) -> Result<()> {
        self.update(|current| *current = prefs)
    }

    /// Read, persist and publish under the channel's write lock.
    fn update(&self, change: impl FnOnce(&mut UnitPreferences)) -> Result<()> {
        let mut result = Ok(());
        self.tx.send_if_modified(|current| {
            let mut next = *current;
            change(&mut next);
            result = write_preferences(&self.path, next);
            if result.is_ok() {
                *current = next;
            }
            result.is_ok()
        });
        result
    }
}

fn read_preferences(path: &Path) -> Result<UnitPreferences> {
    if !path.exists() {
        return Ok(UnitPreferences::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

    let values: BTreeMap<String, String> = match toml::from_str(&contents) {
        Ok(values) => values,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Ignoring unreadable settings file");
            return Ok(UnitPreferences::default());
        }
    };

    let temperature = values
        .get(TEMPERATURE_KEY)
        .and_then(|v| TemperatureUnit::from_key(v))
        .unwrap_or_default();
    let wind_speed = values
        .get(WIND_SPEED_KEY)
        .and_then(|v| WindSpeedUnit::from_key(v))
        .unwrap_or_default();

    Ok(UnitPreferences { temperature, wind_speed })
}

fn write_preferences(path: &Path, prefs: UnitPreferences) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create settings directory: {}", parent.display())
        })?;
    }

    let values = BTreeMap::from([
        (TEMPERATURE_KEY, prefs.temperature.key()),
        (WIND_SPEED_KEY, prefs.wind_speed.key()),
    ]);
    let toml = toml::to_string(&values).context("Failed to serialize settings to TOML")?;

    fs::write(path, toml)
        .with_context(|| format!("Failed to write settings file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.toml")).unwrap();

        assert_eq!(store.preferences(), UnitPreferences::default());
    }

    #[test]
    fn unrecognized_values_fall_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "temperature_unit = \"kelvin\"\nwind_speed_unit = \"mph\"\n").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.temperature_unit(), TemperatureUnit::Celsius);
        assert_eq!(store.wind_speed_unit(), WindSpeedUnit::MilesPerHour);
    }

    #[test]
    fn garbage_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "this is [not toml").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.preferences(), UnitPreferences::default());
    }

    #[test]
    fn writes_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let store = SettingsStore::open(&path).unwrap();
        store.set_temperature_unit(TemperatureUnit::Fahrenheit).unwrap();
        store.set_wind_speed_unit(WindSpeedUnit::MetersPerSecond).unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.temperature_unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(reopened.wind_speed_unit(), WindSpeedUnit::MetersPerSecond);
    }

    #[test]
    fn setting_one_unit_keeps_the_other() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.toml")).unwrap();

        store.set_wind_speed_unit(WindSpeedUnit::MilesPerHour).unwrap();
        store.set_temperature_unit(TemperatureUnit::Fahrenheit).unwrap();

        assert_eq!(store.wind_speed_unit(), WindSpeedUnit::MilesPerHour);
    }

    #[test]
    fn concurrent_setters_keep_both_changes() {
        let dir = tempfile::tempdir().unwrap();

        for round in 0..100 {
            let path = dir.path().join(format!("settings-{round}.toml"));
            let store = SettingsStore::open(&path).unwrap();

            std::thread::scope(|s| {
                s.spawn(|| store.set_temperature_unit(TemperatureUnit::Fahrenheit).unwrap());
                s.spawn(|| store.set_wind_speed_unit(WindSpeedUnit::MilesPerHour).unwrap());
            });

            let expected = UnitPreferences {
                temperature: TemperatureUnit::Fahrenheit,
                wind_speed: WindSpeedUnit::MilesPerHour,
            };
            assert_eq!(store.preferences(), expected);
            assert_eq!(SettingsStore::open(&path).unwrap().preferences(), expected);
        }
    }

    #[tokio::test]
    async fn active_subscriber_observes_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.toml")).unwrap();

        let mut rx = store.subscribe();
        assert_eq!(rx.borrow_and_update().temperature, TemperatureUnit::Celsius);

        store.set_temperature_unit(TemperatureUnit::Fahrenheit).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().temperature, TemperatureUnit::Fahrenheit);

        store.set_temperature_unit(TemperatureUnit::Celsius).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().temperature, TemperatureUnit::Celsius);
    }
}
