//! The weather pipeline: resolve location, resolve city, fetch the forecast,
//! and fall back to the last cached snapshot when any of that fails.

use std::sync::Arc;
use tokio::{sync::mpsc, task};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::WeatherError,
    location::LocationProvider,
    model::{CityRecord, WeatherSnapshot},
    provider::{ForecastRequest, Geocoder, WeatherProvider},
    store::LocalStore,
    units::UnitPreferences,
};

/// What to load. `city: None` means "use the device location".
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub city: Option<CityRecord>,
    pub units: UnitPreferences,
    pub timezone: String,
}

/// States emitted while loading: `Loading` first, then `Success` or
/// `Failure`. A `Failure` may be followed by a cached `Success`.
#[derive(Debug, Clone)]
pub enum LoadState {
    Loading,
    Success(WeatherSnapshot),
    Failure(WeatherError),
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Loading)
    }
}

#[derive(Debug, Clone)]
pub struct WeatherOrchestrator {
    weather: Arc<dyn WeatherProvider>,
    geocoder: Arc<dyn Geocoder>,
    location: Arc<dyn LocationProvider>,
    store: Arc<LocalStore>,
}

impl WeatherOrchestrator {
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        geocoder: Arc<dyn Geocoder>,
        location: Arc<dyn LocationProvider>,
        store: Arc<LocalStore>,
    ) -> Self {
        Self { weather, geocoder, location, store }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Spawn [`run`](Self::run) on the runtime and return the state stream.
    pub fn load(self: Arc<Self>, request: LoadRequest) -> mpsc::Receiver<LoadState> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            self.run(&request, &tx).await;
        });
        rx
    }

    /// Emit every state to `tx` and return the terminal one. At most three
    /// states are sent; a dropped receiver does not stop the pipeline.
    #[instrument(skip_all, fields(city = ?request.city.as_ref().map(|c| c.label())))]
    pub async fn run(&self, request: &LoadRequest, tx: &mpsc::Sender<LoadState>) -> LoadState {
        let _ = tx.send(LoadState::Loading).await;

        let mut resolved_city = request.city.clone();
        let err = match self.fetch(request, &mut resolved_city).await {
            Ok(snapshot) => {
                info!(
                    city = ?snapshot.city.as_ref().map(|c| c.label()),
                    "Fetched fresh weather"
                );
                return emit(tx, LoadState::Success(snapshot)).await;
            }
            Err(err) => err,
        };

        warn!(error = %err, "Weather fetch failed, trying cache");
        let cached = self.cached_snapshot(resolved_city).await;

        match cached {
            Some(snapshot) => {
                let _ = tx.send(LoadState::Failure(err)).await;
                emit(tx, LoadState::Success(snapshot.into_cached())).await
            }
            None => emit(tx, LoadState::Failure(err)).await,
        }
    }

    async fn fetch(
        &self,
        request: &LoadRequest,
        resolved_city: &mut Option<CityRecord>,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let coordinates = match &request.city {
            Some(city) => city.coordinates(),
            None => self.location.current_location().await?,
        };

        if resolved_city.is_none() {
            let city = self
                .geocoder
                .reverse(coordinates)
                .await
                .map_err(|err| {
                    debug!(error = %err, "Reverse geocoding failed");
                    WeatherError::CityNotFound
                })?
                .into_iter()
                .next()
                .ok_or(WeatherError::CityNotFound)?;
            info!(city = %city.label(), "Resolved city from location");
            *resolved_city = Some(city);
        }

        let forecast = ForecastRequest {
            coordinates,
            units: request.units,
            timezone: request.timezone.clone(),
        };
        let snapshot = self.weather.forecast(&forecast).await?;

        Ok(match resolved_city.clone() {
            Some(city) => snapshot.with_city(city),
            None => snapshot,
        })
    }

    /// Cached snapshot for `city`, or the latest one overall when the city
    /// never got resolved. Store errors count as "no cache".
    async fn cached_snapshot(&self, city: Option<CityRecord>) -> Option<WeatherSnapshot> {
        let store = Arc::clone(&self.store);
        let lookup = task::spawn_blocking(move || match &city {
            Some(city) => store.weather_for_city(&city.name, &city.country),
            None => store.latest_weather(),
        })
        .await;

        match lookup {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(err)) => {
                warn!(error = %err, "Failed to read cached weather");
                None
            }
            Err(err) => {
                warn!(error = %err, "Cache lookup task failed");
                None
            }
        }
    }

    /// Persist a fetched snapshot, replacing the row for its city.
    pub fn save_weather(&self, snapshot: &WeatherSnapshot) -> anyhow::Result<()> {
        self.store.save_weather(snapshot)
    }

    pub async fn search_cities(&self, query: &str) -> Result<Vec<CityRecord>, WeatherError> {
        self.geocoder.search(query).await
    }

    pub fn save_city(&self, city: &CityRecord) -> anyhow::Result<()> {
        info!(city = %city.label(), "Saving city");
        self.store.save_city(city)
    }

    pub fn saved_cities(&self) -> anyhow::Result<Vec<CityRecord>> {
        self.store.list_cities()
    }

    /// Drop a saved city along with its cached weather. Returns whether it existed.
    pub fn remove_city(&self, name: &str, country: &str) -> anyhow::Result<bool> {
        info!(city = %name, country = %country, "Removing city");
        self.store.delete_city(name, country)
    }
}

async fn emit(tx: &mpsc::Sender<LoadState>, state: LoadState) -> LoadState {
    let _ = tx.send(state.clone()).await;
    state
}
