use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, CustomType, Password, PasswordDisplayMode, Select, Text};
use tokio::sync::mpsc;
use weather_core::{
    CityRecord, Config, Coordinates, FixedLocation, Geocoder, LoadRequest, LoadState, LocalStore,
    SettingsStore, TemperatureUnit, WeatherOrchestrator, WeatherSnapshot, WindSpeedUnit,
    provider::{UnconfiguredGeocoder, geocoder_from_config, weather_provider_from_config},
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the geocoding API key, default location and timezone.
    Configure,

    /// Show weather for the current location or a city.
    Show(ShowArgs),

    /// Search cities by name.
    Search {
        /// City name to look up.
        query: String,

        /// Save a result to the saved-city list.
        #[arg(long)]
        save: bool,
    },

    /// Manage saved cities.
    #[command(subcommand)]
    Cities(CitiesCommand),

    /// Show or change measurement units.
    #[command(subcommand)]
    Units(UnitsCommand),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// City name; saved cities are matched first, then the geocoding API.
    #[arg(long)]
    city: Option<String>,

    /// Country code to disambiguate --city.
    #[arg(long, requires = "city")]
    country: Option<String>,

    /// Latitude of the current location (overrides the config).
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of the current location (overrides the config).
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Print the snapshot as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum CitiesCommand {
    /// List saved cities.
    List,

    /// Remove a saved city and its cached weather.
    Remove {
        name: String,

        #[arg(long)]
        country: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum UnitsCommand {
    /// Print the current unit preferences.
    Show,

    /// Change unit preferences.
    Set {
        /// celsius | fahrenheit
        #[arg(long)]
        temperature: Option<TemperatureUnit>,

        /// ms | mph | kmh
        #[arg(long)]
        wind: Option<WindSpeedUnit>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config),
            Command::Show(args) => show(&config, args).await,
            Command::Search { query, save } => search(&config, &query, save).await,
            Command::Cities(cmd) => cities(&config, cmd),
            Command::Units(cmd) => units(&config, cmd),
        }
    }
}

/// Saved cities and forecasts work without a geocoding key; only lookups that
/// need the geocoding API fail when it is missing.
fn orchestrator(
    config: &Config,
    location: Option<Coordinates>,
) -> anyhow::Result<Arc<WeatherOrchestrator>> {
    let geocoder: Arc<dyn Geocoder> = if config.is_geocoding_configured() {
        Arc::new(geocoder_from_config(config)?)
    } else {
        tracing::debug!("No geocoding API key configured");
        Arc::new(UnconfiguredGeocoder)
    };

    Ok(Arc::new(WeatherOrchestrator::new(
        Arc::new(weather_provider_from_config(config)?),
        geocoder,
        Arc::new(FixedLocation::new(location.or(config.location))),
        Arc::new(LocalStore::open(config.database_path()?)?),
    )))
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let path = Config::config_file_path()?;
    println!("Configuring weather ({})", path.display());

    let api_key = Password::new("Geocoding API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.set_geocoding_api_key(api_key.trim().to_string());
    }

    let set_location = Confirm::new("Set a default location?")
        .with_default(config.location.is_some())
        .prompt()?;
    if set_location {
        let current = config.location.unwrap_or(Coordinates::new(0.0, 0.0));
        let latitude = CustomType::<f64>::new("Latitude:")
            .with_default(current.latitude)
            .prompt()?;
        let longitude = CustomType::<f64>::new("Longitude:")
            .with_default(current.longitude)
            .prompt()?;
        config.location = Some(Coordinates::new(latitude, longitude));
    } else {
        config.location = None;
    }

    config.timezone = Text::new("Timezone:")
        .with_default(&config.timezone)
        .with_help_message("\"auto\" lets the forecast service decide")
        .prompt()?;

    config.save()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn show(config: &Config, args: ShowArgs) -> anyhow::Result<()> {
    let location = args.lat.zip(args.lon).map(|(lat, lon)| Coordinates::new(lat, lon));
    let orchestrator = orchestrator(config, location)?;
    let settings = SettingsStore::open(config.settings_path()?)?;

    let city = match &args.city {
        Some(name) => Some(resolve_city(&orchestrator, name, args.country.as_deref()).await?),
        None => None,
    };

    let request = LoadRequest {
        city,
        units: settings.preferences(),
        timezone: config.timezone.clone(),
    };

    let mut states = orchestrator.clone().load(request);
    let snapshot = finish_load(&orchestrator, &mut states).await?;
    if snapshot.cached {
        eprintln!("{}", render::stale_warning(&snapshot));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", render::snapshot(&snapshot));
    }
    Ok(())
}

/// Drain the state stream down to its final snapshot. Fresh snapshots are
/// saved; cached ones came from the store and are left as they are.
async fn finish_load(
    orchestrator: &WeatherOrchestrator,
    states: &mut mpsc::Receiver<LoadState>,
) -> anyhow::Result<WeatherSnapshot> {
    let mut outcome = None;
    while let Some(state) = states.recv().await {
        match state {
            LoadState::Loading => eprintln!("Loading weather..."),
            LoadState::Failure(err) => {
                tracing::debug!(error = %err, "Load failed");
                outcome = Some(Err(err));
            }
            LoadState::Success(snapshot) => outcome = Some(Ok(snapshot)),
        }
    }

    let snapshot = match outcome {
        Some(Ok(snapshot)) => snapshot,
        Some(Err(err)) => bail!(err.user_message()),
        None => bail!("Weather loading stopped unexpectedly"),
    };

    if !snapshot.cached {
        orchestrator
            .save_weather(&snapshot)
            .context("Failed to save weather to the local store")?;
    }
    Ok(snapshot)
}

/// Saved cities first, then the first geocoding match.
async fn resolve_city(
    orchestrator: &WeatherOrchestrator,
    name: &str,
    country: Option<&str>,
) -> anyhow::Result<CityRecord> {
    if let Some(city) = orchestrator.store().find_city(name, country)? {
        return Ok(city);
    }

    let found = orchestrator
        .search_cities(name)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    found
        .into_iter()
        .find(|c| country.is_none_or(|cc| c.country.eq_ignore_ascii_case(cc)))
        .ok_or_else(|| anyhow::anyhow!("No city named '{name}' found"))
}

async fn search(config: &Config, query: &str, save: bool) -> anyhow::Result<()> {
    let orchestrator = orchestrator(config, None)?;
    let found = orchestrator
        .search_cities(query)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if found.is_empty() {
        println!("No cities found for '{query}'.");
        return Ok(());
    }

    for (idx, city) in found.iter().enumerate() {
        println!("{:>2}. {}", idx + 1, render::city_line(city));
    }

    if save {
        let city = if found.len() == 1 {
            &found[0]
        } else {
            let labels: Vec<String> = found.iter().map(CityRecord::label).collect();
            let picked = Select::new("Save which city?", labels).raw_prompt()?;
            &found[picked.index]
        };
        orchestrator.save_city(city)?;
        println!("Saved {}", city.label());
    }

    Ok(())
}

fn cities(config: &Config, cmd: CitiesCommand) -> anyhow::Result<()> {
    let orchestrator = orchestrator(config, None)?;

    match cmd {
        CitiesCommand::List => {
            let saved = orchestrator.saved_cities()?;
            if saved.is_empty() {
                println!("No saved cities. Use `weather search <name> --save` to add one.");
            }
            for city in &saved {
                let cached = orchestrator.store().weather_for_city(&city.name, &city.country)?;
                println!("{}", render::saved_city_line(city, cached.as_ref()));
            }
        }
        CitiesCommand::Remove { name, country } => {
            let city = orchestrator
                .store()
                .find_city(&name, country.as_deref())?
                .ok_or_else(|| anyhow::anyhow!("'{name}' is not a saved city"))?;
            orchestrator.remove_city(&city.name, &city.country)?;
            println!("Removed {}", city.label());
        }
    }

    Ok(())
}

fn units(config: &Config, cmd: UnitsCommand) -> anyhow::Result<()> {
    let settings = SettingsStore::open(config.settings_path()?)?;

    match cmd {
        UnitsCommand::Show => {}
        UnitsCommand::Set { temperature, wind } => {
            if temperature.is_none() && wind.is_none() {
                bail!("Nothing to set. Pass --temperature and/or --wind.");
            }
            let mut prefs = settings.preferences();
            if let Some(unit) = temperature {
                prefs.temperature = unit;
            }
            if let Some(unit) = wind {
                prefs.wind_speed = unit;
            }
            settings.set_preferences(prefs)?;
        }
    }

    let prefs = settings.preferences();
    println!("Temperature: {} ({})", prefs.temperature, prefs.temperature.symbol());
    println!("Wind speed:  {} ({})", prefs.wind_speed, prefs.wind_speed.symbol());
    Ok(())
}
