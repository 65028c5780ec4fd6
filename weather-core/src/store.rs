//! SQLite-backed local store for weather snapshots and saved cities.
//!
//! Snapshots are keyed by their city's `(country, name)`; saving a snapshot
//! replaces whatever was stored for that city, sub-records included.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::{path::Path, sync::Mutex};
use tracing::debug;

use crate::model::{
    CityRecord, CurrentConditions, CurrentUnits, HourlySeries, HourlyUnits, WeatherSnapshot,
};

#[derive(Debug)]
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("Local store lock poisoned"))
    }

    #[cfg(test)]
    pub(crate) fn lock_connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Replace the stored snapshot for the snapshot's city.
    pub fn save_weather(&self, snapshot: &WeatherSnapshot) -> Result<()> {
        let city = snapshot
            .city
            .as_ref()
            .ok_or_else(|| anyhow!("Cannot save a weather snapshot without a city"))?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        delete_weather_rows(&tx, &city.country, &city.name)?;
        insert_weather_rows(&tx, city, snapshot)?;
        tx.commit()?;

        debug!(city = %city.label(), "Saved weather snapshot");
        Ok(())
    }

    /// The most recently synced snapshot, whatever its city.
    pub fn latest_weather(&self) -> Result<Option<WeatherSnapshot>> {
        let conn = self.conn()?;
        let key: Option<(String, String)> = conn
            .query_row(
                "SELECT city_country, city_name FROM weather
                 ORDER BY last_sync DESC, rowid DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match key {
            Some((country, name)) => read_snapshot(&conn, &country, &name),
            None => Ok(None),
        }
    }

    pub fn weather_for_city(&self, name: &str, country: &str) -> Result<Option<WeatherSnapshot>> {
        let conn = self.conn()?;
        read_snapshot(&conn, country, name)
    }

    /// Every stored snapshot, most recently synced first.
    pub fn all_weather(&self) -> Result<Vec<WeatherSnapshot>> {
        let conn = self.conn()?;
        let keys = {
            let mut stmt = conn.prepare(
                "SELECT city_country, city_name FROM weather ORDER BY last_sync DESC, rowid DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut snapshots = Vec::with_capacity(keys.len());
        for (country, name) in keys {
            if let Some(snapshot) = read_snapshot(&conn, &country, &name)? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    /// Insert or replace a saved city; `(country, name)` is unique.
    pub fn save_city(&self, city: &CityRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO city (country, name, state, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![city.country, city.name, city.state, city.latitude, city.longitude],
        )?;
        Ok(())
    }

    pub fn list_cities(&self) -> Result<Vec<CityRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT country, name, state, latitude, longitude FROM city ORDER BY name, country",
        )?;
        let rows = stmt.query_map([], row_to_city)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Failed to read saved cities: {}", e))
    }

    /// Case-insensitive lookup by name, optionally narrowed by country.
    pub fn find_city(&self, name: &str, country: Option<&str>) -> Result<Option<CityRecord>> {
        let conn = self.conn()?;
        let city = conn
            .query_row(
                "SELECT country, name, state, latitude, longitude FROM city
                 WHERE name = ?1 COLLATE NOCASE
                   AND (?2 IS NULL OR country = ?2 COLLATE NOCASE)
                 ORDER BY country LIMIT 1",
                params![name, country],
                row_to_city,
            )
            .optional()?;
        Ok(city)
    }

    /// Remove a saved city and its cached weather. Returns whether it existed.
    pub fn delete_city(&self, name: &str, country: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM city WHERE country = ?1 AND name = ?2",
            params![country, name],
        )?;
        delete_weather_rows(&tx, country, name)?;
        tx.commit()?;
        Ok(removed > 0)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS weather (
            city_country TEXT NOT NULL,
            city_name TEXT NOT NULL,
            city_state TEXT,
            city_latitude REAL NOT NULL,
            city_longitude REAL NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            timezone TEXT NOT NULL,
            timezone_abbreviation TEXT NOT NULL,
            utc_offset_seconds INTEGER NOT NULL,
            elevation REAL NOT NULL,
            generation_time_ms REAL NOT NULL,
            has_hourly INTEGER NOT NULL,
            cached INTEGER NOT NULL,
            last_sync TEXT NOT NULL,
            PRIMARY KEY (city_country, city_name)
        );

        CREATE TABLE IF NOT EXISTS current_conditions (
            city_country TEXT NOT NULL,
            city_name TEXT NOT NULL,
            time TEXT NOT NULL,
            interval INTEGER NOT NULL,
            temperature REAL NOT NULL,
            relative_humidity INTEGER NOT NULL,
            surface_pressure REAL NOT NULL,
            wind_speed REAL NOT NULL,
            weather_code INTEGER NOT NULL,
            PRIMARY KEY (city_country, city_name)
        );

        CREATE TABLE IF NOT EXISTS current_units (
            city_country TEXT NOT NULL,
            city_name TEXT NOT NULL,
            time TEXT NOT NULL,
            interval TEXT NOT NULL,
            temperature TEXT NOT NULL,
            relative_humidity TEXT NOT NULL,
            surface_pressure TEXT NOT NULL,
            wind_speed TEXT NOT NULL,
            weather_code TEXT NOT NULL,
            PRIMARY KEY (city_country, city_name)
        );

        CREATE TABLE IF NOT EXISTS hourly (
            city_country TEXT NOT NULL,
            city_name TEXT NOT NULL,
            idx INTEGER NOT NULL,
            time TEXT NOT NULL,
            temperature REAL NOT NULL,
            weather_code INTEGER NOT NULL,
            PRIMARY KEY (city_country, city_name, idx)
        );

        CREATE TABLE IF NOT EXISTS hourly_units (
            city_country TEXT NOT NULL,
            city_name TEXT NOT NULL,
            time TEXT NOT NULL,
            temperature TEXT NOT NULL,
            weather_code TEXT NOT NULL,
            PRIMARY KEY (city_country, city_name)
        );

        CREATE TABLE IF NOT EXISTS city (
            country TEXT NOT NULL,
            name TEXT NOT NULL,
            state TEXT,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            PRIMARY KEY (country, name)
        );

        CREATE INDEX IF NOT EXISTS idx_weather_last_sync ON weather(last_sync);
        "#,
    )?;
    Ok(())
}

fn delete_weather_rows(tx: &Transaction<'_>, country: &str, name: &str) -> Result<()> {
    for table in ["weather", "current_conditions", "current_units", "hourly", "hourly_units"] {
        tx.execute(
            &format!("DELETE FROM {table} WHERE city_country = ?1 AND city_name = ?2"),
            params![country, name],
        )?;
    }
    Ok(())
}

fn insert_weather_rows(
    tx: &Transaction<'_>,
    city: &CityRecord,
    snapshot: &WeatherSnapshot,
) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO weather
        (city_country, city_name, city_state, city_latitude, city_longitude, latitude, longitude,
         timezone, timezone_abbreviation, utc_offset_seconds, elevation, generation_time_ms,
         has_hourly, cached, last_sync)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            city.country,
            city.name,
            city.state,
            city.latitude,
            city.longitude,
            snapshot.latitude,
            snapshot.longitude,
            snapshot.timezone,
            snapshot.timezone_abbreviation,
            snapshot.utc_offset_seconds,
            snapshot.elevation,
            snapshot.generation_time_ms,
            snapshot.hourly.is_some(),
            snapshot.cached,
            format_sync_time(snapshot.last_sync),
        ],
    )?;

    if let Some(current) = &snapshot.current {
        tx.execute(
            r#"
            INSERT INTO current_conditions
            (city_country, city_name, time, interval, temperature, relative_humidity,
             surface_pressure, wind_speed, weather_code)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                city.country,
                city.name,
                current.time,
                current.interval,
                current.temperature,
                current.relative_humidity,
                current.surface_pressure,
                current.wind_speed,
                current.weather_code,
            ],
        )?;
    }

    if let Some(units) = &snapshot.current_units {
        tx.execute(
            r#"
            INSERT INTO current_units
            (city_country, city_name, time, interval, temperature, relative_humidity,
             surface_pressure, wind_speed, weather_code)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                city.country,
                city.name,
                units.time,
                units.interval,
                units.temperature,
                units.relative_humidity,
                units.surface_pressure,
                units.wind_speed,
                units.weather_code,
            ],
        )?;
    }

    if let Some(hourly) = &snapshot.hourly {
        let mut stmt = tx.prepare(
            "INSERT INTO hourly (city_country, city_name, idx, time, temperature, weather_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (idx, entry) in hourly.entries().enumerate() {
            stmt.execute(params![
                city.country,
                city.name,
                idx as i64,
                entry.time,
                entry.temperature,
                entry.weather_code,
            ])?;
        }
    }

    if let Some(units) = &snapshot.hourly_units {
        tx.execute(
            "INSERT INTO hourly_units (city_country, city_name, time, temperature, weather_code)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![city.country, city.name, units.time, units.temperature, units.weather_code],
        )?;
    }

    Ok(())
}

struct WeatherRow {
    city: CityRecord,
    latitude: f64,
    longitude: f64,
    timezone: String,
    timezone_abbreviation: String,
    utc_offset_seconds: i32,
    elevation: f64,
    generation_time_ms: f64,
    has_hourly: bool,
    cached: bool,
    last_sync: String,
}

fn read_snapshot(conn: &Connection, country: &str, name: &str) -> Result<Option<WeatherSnapshot>> {
    let Some(row) = conn
        .query_row(
            r#"
            SELECT city_country, city_name, city_state, city_latitude, city_longitude,
                   latitude, longitude, timezone, timezone_abbreviation, utc_offset_seconds,
                   elevation, generation_time_ms, has_hourly, cached, last_sync
            FROM weather WHERE city_country = ?1 AND city_name = ?2
            "#,
            params![country, name],
            |row| {
                Ok(WeatherRow {
                    city: CityRecord {
                        country: row.get(0)?,
                        name: row.get(1)?,
                        state: row.get(2)?,
                        latitude: row.get(3)?,
                        longitude: row.get(4)?,
                    },
                    latitude: row.get(5)?,
                    longitude: row.get(6)?,
                    timezone: row.get(7)?,
                    timezone_abbreviation: row.get(8)?,
                    utc_offset_seconds: row.get(9)?,
                    elevation: row.get(10)?,
                    generation_time_ms: row.get(11)?,
                    has_hourly: row.get(12)?,
                    cached: row.get(13)?,
                    last_sync: row.get(14)?,
                })
            },
        )
        .optional()?
    else {
        return Ok(None);
    };

    let current = conn
        .query_row(
            "SELECT time, interval, temperature, relative_humidity, surface_pressure, wind_speed,
                    weather_code
             FROM current_conditions WHERE city_country = ?1 AND city_name = ?2",
            params![country, name],
            |row| {
                Ok(CurrentConditions {
                    time: row.get(0)?,
                    interval: row.get(1)?,
                    temperature: row.get(2)?,
                    relative_humidity: row.get(3)?,
                    surface_pressure: row.get(4)?,
                    wind_speed: row.get(5)?,
                    weather_code: row.get(6)?,
                })
            },
        )
        .optional()?;

    let current_units = conn
        .query_row(
            "SELECT time, interval, temperature, relative_humidity, surface_pressure, wind_speed,
                    weather_code
             FROM current_units WHERE city_country = ?1 AND city_name = ?2",
            params![country, name],
            |row| {
                Ok(CurrentUnits {
                    time: row.get(0)?,
                    interval: row.get(1)?,
                    temperature: row.get(2)?,
                    relative_humidity: row.get(3)?,
                    surface_pressure: row.get(4)?,
                    wind_speed: row.get(5)?,
                    weather_code: row.get(6)?,
                })
            },
        )
        .optional()?;

    let hourly = if row.has_hourly {
        let mut stmt = conn.prepare(
            "SELECT time, temperature, weather_code FROM hourly
             WHERE city_country = ?1 AND city_name = ?2 ORDER BY idx",
        )?;
        let mut time: Vec<String> = Vec::new();
        let mut temperature: Vec<f64> = Vec::new();
        let mut weather_code: Vec<i32> = Vec::new();
        let mut rows = stmt.query(params![country, name])?;
        while let Some(r) = rows.next()? {
            time.push(r.get(0)?);
            temperature.push(r.get(1)?);
            weather_code.push(r.get(2)?);
        }
        Some(HourlySeries::new(time, temperature, weather_code)?)
    } else {
        None
    };

    let hourly_units = conn
        .query_row(
            "SELECT time, temperature, weather_code FROM hourly_units
             WHERE city_country = ?1 AND city_name = ?2",
            params![country, name],
            |row| {
                Ok(HourlyUnits {
                    time: row.get(0)?,
                    temperature: row.get(1)?,
                    weather_code: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(Some(WeatherSnapshot {
        latitude: row.latitude,
        longitude: row.longitude,
        timezone: row.timezone,
        timezone_abbreviation: row.timezone_abbreviation,
        utc_offset_seconds: row.utc_offset_seconds,
        elevation: row.elevation,
        generation_time_ms: row.generation_time_ms,
        current,
        current_units,
        hourly,
        hourly_units,
        city: Some(row.city),
        cached: row.cached,
        last_sync: parse_sync_time(&row.last_sync)?,
    }))
}

fn row_to_city(row: &rusqlite::Row) -> rusqlite::Result<CityRecord> {
    Ok(CityRecord {
        country: row.get(0)?,
        name: row.get(1)?,
        state: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
    })
}

// Fixed-width so that text ordering matches time ordering.
fn format_sync_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_sync_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid last_sync timestamp in store: {raw}"))
}
