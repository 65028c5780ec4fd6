//! Human-readable output.

use chrono::Local;
use std::fmt::Write;
use weather_core::{CityRecord, WeatherCondition, WeatherSnapshot};

const HOURS_SHOWN: usize = 12;

pub fn snapshot(snapshot: &WeatherSnapshot) -> String {
    let mut out = String::new();

    let place = snapshot
        .city
        .as_ref()
        .map(CityRecord::label)
        .unwrap_or_else(|| format!("{:.4}, {:.4}", snapshot.latitude, snapshot.longitude));
    let _ = writeln!(
        out,
        "{place}  ({:.2}, {:.2} · {}, {:.0} m)",
        snapshot.latitude, snapshot.longitude, snapshot.timezone_abbreviation, snapshot.elevation
    );

    if let (Some(current), Some(units)) = (&snapshot.current, &snapshot.current_units) {
        let _ = writeln!(
            out,
            "  {}  {:.1} {}",
            current.condition().description(),
            current.temperature,
            units.temperature
        );
        let _ = writeln!(
            out,
            "  Humidity {} {}   Pressure {:.1} {}   Wind {:.1} {}",
            current.relative_humidity,
            units.relative_humidity,
            current.surface_pressure,
            units.surface_pressure,
            current.wind_speed,
            units.wind_speed
        );
        let _ = writeln!(out, "  Observed {}", current.time);
    }

    if let Some(hourly) = &snapshot.hourly {
        let from = snapshot.current.as_ref().map(|c| c.time.as_str()).unwrap_or("");
        let unit = snapshot
            .hourly_units
            .as_ref()
            .map(|u| u.temperature.as_str())
            .unwrap_or("");

        let upcoming: Vec<_> = hourly
            .entries()
            .filter(|e| e.time >= from)
            .take(HOURS_SHOWN)
            .collect();
        if !upcoming.is_empty() {
            let _ = writeln!(out, "Next hours:");
            for entry in upcoming {
                let _ = writeln!(
                    out,
                    "  {}  {:>6.1} {}  {}",
                    entry.time,
                    entry.temperature,
                    unit,
                    WeatherCondition::from_wmo_code(entry.weather_code).description()
                );
            }
        }
    }

    out
}

pub fn stale_warning(snapshot: &WeatherSnapshot) -> String {
    format!(
        "Warning: could not refresh, showing cached weather from {}",
        snapshot.last_sync.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    )
}

pub fn city_line(city: &CityRecord) -> String {
    format!("{}  ({:.4}, {:.4})", city.label(), city.latitude, city.longitude)
}

pub fn saved_city_line(city: &CityRecord, cached: Option<&WeatherSnapshot>) -> String {
    let summary = cached.and_then(|s| {
        let current = s.current.as_ref()?;
        let unit = s.current_units.as_ref().map(|u| u.temperature.as_str()).unwrap_or("");
        Some(format!(
            "{:.1} {}, {}",
            current.temperature,
            unit,
            current.condition().description()
        ))
    });

    match summary {
        Some(summary) => format!("{}  [{}]", city.label(), summary),
        None => city.label(),
    }
}
