use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::WeatherError, model::Coordinates};

/// Source of the device position. A single one-shot read per call.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn current_location(&self) -> Result<Coordinates, WeatherError>;
}

/// Position taken from CLI flags or the `[location]` config table.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    coordinates: Option<Coordinates>,
}

impl FixedLocation {
    pub fn new(coordinates: Option<Coordinates>) -> Self {
        Self { coordinates }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Result<Coordinates, WeatherError> {
        self.coordinates.ok_or(WeatherError::LocationUnavailable)
    }
}
